use crate::{
    sync::{AtomicBool, AtomicUsize, Ordering},
    task::Executable,
    types::NodeId,
};
use derive_more::Display;

/// What a node does when it is dispatched.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// No work; exists to fan in or fan out edges.
    Placeholder,
    /// Runs to completion, then releases every successor.
    Action,
    /// Runs, then continues with exactly one successor chosen by index.
    Branch,
}

#[must_use]
#[derive(Debug)]
pub(crate) struct Node {
    work: Option<Executable>,
    /// Nodes that depend on this one. For a branch node this is the indexed
    /// table its return value selects from.
    pub(super) successors: Vec<NodeId>,
    /// Nodes this one depends on.
    pub(super) predecessors: Vec<NodeId>,
    join: JoinSlot,
}

/// Readiness bookkeeping owned by whichever plan currently drives the node.
#[must_use]
#[derive(Debug)]
#[repr(align(128))]
struct JoinSlot {
    /// Number of predecessors that are not branch nodes.
    parents_static: AtomicUsize,
    /// Number of static predecessors that haven't finished in this round.
    parents_left: AtomicUsize,
    /// Whether some predecessor is a branch node.
    after_branch: AtomicBool,
}

impl Node {
    pub(super) fn new(work: Option<Executable>) -> Self {
        Self {
            work,
            successors: Vec::new(),
            predecessors: Vec::new(),
            join: JoinSlot {
                parents_static: AtomicUsize::new(0),
                parents_left: AtomicUsize::new(0),
                after_branch: AtomicBool::new(false),
            },
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        match self.work {
            None => NodeKind::Placeholder,
            Some(Executable::Branch(_)) => NodeKind::Branch,
            Some(_) => NodeKind::Action,
        }
    }

    pub(crate) fn work(&self) -> Option<&Executable> {
        self.work.as_ref()
    }

    /// Replaces the bound callable, dropping the previous one.
    pub(super) fn rebind(&mut self, work: Option<Executable>) {
        if let Some(work) = &work {
            assert!(
                !matches!(work, Executable::Predicate(_)),
                "predicates cannot be bound to nodes"
            );
        }
        self.work = work;
    }

    pub(crate) fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    pub(crate) fn predecessors(&self) -> &[NodeId] {
        &self.predecessors
    }

    /// Prepares the node for a plan: records how many predecessors must
    /// finish before it is ready and whether a branch can also reach it.
    pub(crate) fn arm(&self, parents_static: usize, after_branch: bool) {
        let JoinSlot {
            parents_static: total,
            parents_left,
            after_branch: flag,
        } = &self.join;
        total.store(parents_static, Ordering::Relaxed);
        flag.store(after_branch, Ordering::Relaxed);
        parents_left.store(parents_static, Ordering::Relaxed);
    }

    /// Whether only branch nodes lead here. Such a node is never released,
    /// only continued by the branch that selects it.
    pub(crate) fn branch_only(&self) -> bool {
        self.join.after_branch.load(Ordering::Relaxed)
            && self.join.parents_static.load(Ordering::Relaxed) == 0
    }

    /// Restores the readiness counter for the next round.
    pub(crate) fn rearm(&self) {
        if self.branch_only() {
            return;
        }
        let JoinSlot {
            parents_static,
            parents_left,
            after_branch: _,
        } = &self.join;
        parents_left.store(parents_static.load(Ordering::Relaxed), Ordering::Relaxed);
    }

    /// Signals that one static predecessor finished. Returns `true` for the
    /// caller that observed the last one, which then owns the node's
    /// dispatch.
    pub(crate) fn release(&self) -> bool {
        let left = self.join.parents_left.fetch_sub(1, Ordering::AcqRel);
        assert_ne!(left, 0, "Node::release: readiness counter underflow");
        left == 1
    }

    #[cfg(all(test, not(feature = "loom")))]
    pub(crate) fn readiness(&self) -> (usize, usize, bool) {
        let JoinSlot {
            parents_static,
            parents_left,
            after_branch,
        } = &self.join;
        (
            parents_static.load(Ordering::Relaxed),
            parents_left.load(Ordering::Relaxed),
            after_branch.load(Ordering::Relaxed),
        )
    }
}
