use crate::{bucket::Bucket, types::NodeId};
use std::collections::VecDeque;
use thiserror::Error;

/// Error kind for bucket validation.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum BucketError {
    /// The bucket's graph contains cycle(s); `stuck` nodes never become
    /// ready.
    #[error("graph contains cycle(s) through {} node(s)", .stuck.len())]
    Cycle {
        /// Nodes that are on, or only reachable through, a cycle.
        stuck: Vec<NodeId>,
    },
}

impl Bucket {
    /// Orders the nodes so that every node comes after all its predecessors.
    ///
    /// The executor never calls this: it is an opt-in check for graphs built
    /// from untrusted shapes. Branch edges count like any other edge.
    ///
    /// # Errors
    /// If the graph contains cycle(s).
    pub fn topological_order(&self) -> Result<Vec<NodeId>, BucketError> {
        // Kahn's algorithm: `parents_left[i]` counts the predecessors of `i`
        // that are not placed yet; a node is placed once it reaches zero.
        let mut parents_left: Vec<usize> = self
            .ids()
            .map(|id| self.predecessors(id).len())
            .collect();
        let mut ready: VecDeque<NodeId> = self.entries().collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);
            let successors = self.successors(id);
            for (at, &child) in successors.iter().enumerate() {
                // A branch table may name the same node twice.
                if successors[..at].contains(&child) {
                    continue;
                }
                let left = &mut parents_left[child.index()];
                *left = left.checked_sub(1).expect("Bucket::topological_order: [1]");
                if *left == 0 {
                    ready.push_back(child);
                }
            }
        }

        // Whatever never reached zero sits on, or behind, a cycle.
        if order.len() != self.len() {
            let stuck = self
                .ids()
                .filter(|id| parents_left[id.index()] != 0)
                .collect();
            return Err(BucketError::Cycle { stuck });
        }
        Ok(order)
    }
}
