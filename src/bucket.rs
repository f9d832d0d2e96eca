mod node;
mod parallel;
mod topology;

pub use crate::bucket::{node::NodeKind, topology::BucketError};
pub(crate) use crate::bucket::node::Node;
use crate::{
    sync::{Mutex, lock},
    task::{Executable, Task},
    types::{BucketId, NodeId},
};
use derive_more::Debug;

/// A reusable task-graph template.
///
/// A bucket owns its nodes arena-style: nodes are appended, addressed by
/// [`NodeId`], and freed only when the bucket is dropped. The graph is wired
/// through `&mut self`, so once the bucket is shared with a
/// [`Plan`](crate::plan::Plan) (which holds it in an `Arc`) its topology can
/// no longer change. Rebinding between runs goes through `Arc::get_mut`.
///
/// The graph must be acyclic. The executor does not look for cycles: a
/// cyclic bucket has nodes that never become ready and its plans never
/// finish. Use [`Bucket::topological_order`] to check a bucket up front.
///
/// Readiness counters live in the nodes, so only one executor may drive a
/// bucket at a time. Submitting a plan of a bucket that still has plans on
/// another executor panics.
#[must_use]
#[derive(Debug)]
pub struct Bucket {
    id: BucketId,
    nodes: Vec<Node>,
    #[debug(skip)]
    driver: Mutex<Driver>,
}

/// The executor whose plans currently use the bucket.
#[derive(Default)]
struct Driver {
    executor: u64,
    plans: usize,
}

impl Default for Bucket {
    fn default() -> Self {
        Self::new()
    }
}

impl Bucket {
    /// Creates an empty bucket.
    pub fn new() -> Self {
        Self {
            id: BucketId::next(),
            nodes: Vec::new(),
            driver: Mutex::new(Driver::default()),
        }
    }

    /// Process-unique identity of this bucket.
    #[must_use]
    pub fn id(&self) -> BucketId {
        self.id
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the bucket has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a node bound to `task`. Closures returning `()` become action
    /// nodes, closures returning `usize` become branch nodes.
    pub fn emplace<M>(&mut self, task: impl Task<M>) -> NodeId {
        self.push(Node::new(Some(task.into_executable())))
    }

    /// Appends an unbound node used purely for structure.
    pub fn placeholder(&mut self) -> NodeId {
        self.push(Node::new(None))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Rebinds `node`, dropping whatever it ran before. The node's kind
    /// follows the new callable.
    ///
    /// # Panics
    /// If `node` does not belong to this bucket.
    pub fn bind<M>(&mut self, node: NodeId, task: impl Task<M>) {
        self.node_mut(node).rebind(Some(task.into_executable()));
    }

    /// Drops the callable of `node`, turning it into a placeholder.
    ///
    /// # Panics
    /// If `node` does not belong to this bucket.
    pub fn unbind(&mut self, node: NodeId) {
        self.node_mut(node).rebind(None);
    }

    /// Makes every node in `successors` depend on `node`.
    ///
    /// For action and placeholder nodes this adds edges, ignoring ones that
    /// already exist. For a branch node the successors form the indexed table
    /// its return value selects from: the first call fixes the table's size
    /// and later calls replace the whole table with one of the same size.
    ///
    /// # Panics
    /// On a self-edge, on a node from another bucket, on an empty branch
    /// table, or when a branch table is replaced with one of a different
    /// size.
    pub fn precede(&mut self, node: NodeId, successors: impl IntoIterator<Item = NodeId>) {
        let successors: Vec<NodeId> = successors.into_iter().collect();
        for &successor in &successors {
            self.check_edge(node, successor);
        }
        if self.node(node).kind() == NodeKind::Branch {
            self.replace_branch_table(node, successors);
        } else {
            for successor in successors {
                self.link(node, successor);
            }
        }
    }

    /// Makes `node` depend on every node in `predecessors`.
    ///
    /// # Panics
    /// On a self-edge, on a node from another bucket, or when a predecessor
    /// is a branch node (branch tables are wired with [`Bucket::precede`]).
    pub fn depend_on(&mut self, node: NodeId, predecessors: impl IntoIterator<Item = NodeId>) {
        for predecessor in predecessors {
            self.check_edge(predecessor, node);
            assert_ne!(
                self.node(predecessor).kind(),
                NodeKind::Branch,
                "Branch node {predecessor} must be wired with `precede`"
            );
            self.link(predecessor, node);
        }
    }

    fn check_edge(&self, from: NodeId, to: NodeId) {
        assert_ne!(from, to, "Node {from} cannot depend on itself");
        let _ = (self.node(from), self.node(to));
    }

    fn link(&mut self, from: NodeId, to: NodeId) {
        if self.node(from).successors.contains(&to) {
            return;
        }
        self.node_mut(from).successors.push(to);
        self.node_mut(to).predecessors.push(from);
    }

    fn replace_branch_table(&mut self, branch: NodeId, table: Vec<NodeId>) {
        assert!(
            !table.is_empty(),
            "Branch node {branch} needs at least one outcome"
        );
        let previous = core::mem::take(&mut self.node_mut(branch).successors);
        if !previous.is_empty() {
            assert_eq!(
                previous.len(),
                table.len(),
                "Branch node {branch} has {} outcome(s) and cannot be rewired with {}",
                previous.len(),
                table.len()
            );
        }
        for successor in previous {
            let predecessors = &mut self.node_mut(successor).predecessors;
            if let Some(pos) = predecessors.iter().position(|&p| p == branch) {
                predecessors.remove(pos);
            }
        }
        for &successor in &table {
            let predecessors = &mut self.node_mut(successor).predecessors;
            if !predecessors.contains(&branch) {
                predecessors.push(branch);
            }
        }
        self.node_mut(branch).successors = table;
    }

    /// Kind of `node`.
    ///
    /// # Panics
    /// If `node` does not belong to this bucket.
    #[must_use]
    pub fn kind(&self, node: NodeId) -> NodeKind {
        self.node(node).kind()
    }

    /// Nodes that depend on `node`, in wiring order.
    ///
    /// # Panics
    /// If `node` does not belong to this bucket.
    #[must_use]
    pub fn successors(&self, node: NodeId) -> &[NodeId] {
        self.node(node).successors()
    }

    /// Nodes `node` depends on, in wiring order.
    ///
    /// # Panics
    /// If `node` does not belong to this bucket.
    #[must_use]
    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        self.node(node).predecessors()
    }

    /// Nodes without predecessors: the first frontier of every round.
    pub fn entries(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids()
            .filter(|&id| self.node(id).predecessors.is_empty())
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId::from_index)
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.nodes
            .get(id.index())
            .unwrap_or_else(|| panic!("Node {id} does not belong to {}", self.id))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        let bucket = self.id;
        self.nodes
            .get_mut(id.index())
            .unwrap_or_else(|| panic!("Node {id} does not belong to {bucket}"))
    }

    /// Prepares every node for a newly admitted plan.
    ///
    /// Branch predecessors do not count towards readiness: a branch fires at
    /// most one of its edges, so no node can wait for it.
    pub(crate) fn arm(&self) {
        for node in &self.nodes {
            let mut parents_static = 0;
            let mut after_branch = false;
            for &parent in node.predecessors() {
                if self.node(parent).kind() == NodeKind::Branch {
                    after_branch = true;
                } else {
                    parents_static += 1;
                }
            }
            node.arm(parents_static, after_branch);
        }
    }

    /// Registers a plan of `executor` on this bucket. Returns `false`, and
    /// registers nothing, while another executor still has plans on it.
    pub(crate) fn claim(&self, executor: u64) -> bool {
        let mut driver = lock(&self.driver);
        if driver.plans != 0 && driver.executor != executor {
            return false;
        }
        driver.executor = executor;
        driver.plans += 1;
        true
    }

    /// Unregisters a plan registered with [`Bucket::claim`]. Called once the
    /// plan no longer touches any node.
    pub(crate) fn unclaim(&self) {
        let mut driver = lock(&self.driver);
        driver.plans = driver
            .plans
            .checked_sub(1)
            .expect("Bucket::unclaim: [1]");
    }

    /// Restores every readiness counter before a new round.
    pub(crate) fn rearm(&self) {
        for node in &self.nodes {
            node.rearm();
        }
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn edges_are_added_in_pairs() {
        let mut bucket = Bucket::new();
        let a = bucket.emplace(|| {});
        let b = bucket.emplace(|| {});
        let c = bucket.placeholder();
        bucket.precede(a, [b, c]);
        bucket.depend_on(c, [b, a]);

        assert_eq!(bucket.successors(a), &[b, c]);
        assert_eq!(bucket.successors(b), &[c]);
        assert_eq!(bucket.predecessors(c), &[a, b]);
        assert_eq!(bucket.predecessors(b), &[a]);
        assert_eq!(bucket.entries().collect::<Vec<_>>(), vec![a]);
        assert_eq!(bucket.kind(c), NodeKind::Placeholder);
    }

    #[test]
    fn branch_table_is_replaced_not_grown() {
        let mut bucket = Bucket::new();
        let branch = bucket.emplace(|| 0_usize);
        let [s0, s1, t0, t1] = [(); 4].map(|()| bucket.placeholder());
        bucket.precede(branch, [s0, s1]);
        bucket.precede(branch, [t0, t1]);

        assert_eq!(bucket.kind(branch), NodeKind::Branch);
        assert_eq!(bucket.successors(branch), &[t0, t1]);
        assert!(bucket.predecessors(s0).is_empty());
        assert!(bucket.predecessors(s1).is_empty());
        assert_eq!(bucket.predecessors(t1), &[branch]);
    }

    #[test]
    #[should_panic(expected = "has 2 outcome(s) and cannot be rewired with 3")]
    fn branch_table_size_is_fixed() {
        let mut bucket = Bucket::new();
        let branch = bucket.emplace(|| 1_usize);
        let nodes = [(); 3].map(|()| bucket.placeholder());
        bucket.precede(branch, nodes[..2].iter().copied());
        bucket.precede(branch, nodes);
    }

    #[test]
    #[should_panic(expected = "needs at least one outcome")]
    fn empty_branch_table_is_rejected() {
        let mut bucket = Bucket::new();
        let branch = bucket.emplace(|| 0_usize);
        bucket.precede(branch, []);
    }

    #[test]
    #[should_panic(expected = "must be wired with `precede`")]
    fn branch_predecessor_via_depend_on_panics() {
        let mut bucket = Bucket::new();
        let branch = bucket.emplace(|| 0_usize);
        let node = bucket.placeholder();
        bucket.depend_on(node, [branch]);
    }

    #[test]
    #[should_panic(expected = "cannot depend on itself")]
    fn self_edge_panics() {
        let mut bucket = Bucket::new();
        let a = bucket.placeholder();
        bucket.precede(a, [a]);
    }

    #[test]
    #[should_panic(expected = "does not belong to")]
    fn foreign_node_panics() {
        let mut other = Bucket::new();
        let _ = other.placeholder();
        let foreign = other.placeholder();
        let mut bucket = Bucket::new();
        let a = bucket.placeholder();
        bucket.precede(a, [foreign]);
    }

    #[test]
    fn arming_skips_branch_predecessors() {
        let mut bucket = Bucket::new();
        let branch = bucket.emplace(|| 0_usize);
        let action = bucket.emplace(|| {});
        let join = bucket.placeholder();
        let other = bucket.placeholder();
        bucket.precede(branch, [join, other]);
        bucket.precede(action, [join]);
        bucket.arm();

        assert_eq!(bucket.node(join).readiness(), (1, 1, true));
        assert_eq!(bucket.node(other).readiness(), (0, 0, true));
        assert_eq!(bucket.node(action).readiness(), (0, 0, false));
        assert!(bucket.node(other).branch_only());
        assert!(!bucket.node(join).branch_only());
        assert!(!bucket.node(action).branch_only());
        assert!(!bucket.node(branch).branch_only());

        assert!(bucket.node(join).release());
        assert_eq!(bucket.node(join).readiness().1, 0);
        bucket.rearm();
        assert_eq!(bucket.node(join).readiness(), (1, 1, true));
    }

    #[test]
    fn one_executor_drives_a_bucket_at_a_time() {
        let bucket = Bucket::new();
        assert!(bucket.claim(1));
        assert!(bucket.claim(1));
        assert!(!bucket.claim(2));
        bucket.unclaim();
        assert!(!bucket.claim(2));
        bucket.unclaim();
        assert!(bucket.claim(2));
        assert!(!bucket.claim(1));
    }

    #[test]
    fn rebinding_changes_kind() {
        let mut bucket = Bucket::new();
        let node = bucket.emplace(|| {});
        assert_eq!(bucket.kind(node), NodeKind::Action);
        bucket.bind(node, || 3_usize);
        assert_eq!(bucket.kind(node), NodeKind::Branch);
        bucket.unbind(node);
        assert_eq!(bucket.kind(node), NodeKind::Placeholder);
    }
}
