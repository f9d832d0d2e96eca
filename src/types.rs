use core::sync::atomic::{AtomicU64, Ordering};
use derive_more::{Debug, Display, From};
use indexmap::IndexMap as _IndexMap;
use rustc_hash::FxBuildHasher;
use std::collections::HashSet as _HashSet;

/// Handle of a node inside the [`Bucket`](crate::bucket::Bucket) that created
/// it.
///
/// Handles are plain arena indices. They stay valid for the whole life of the
/// bucket because nodes are never removed, and they mean nothing to any other
/// bucket.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[debug("NodeId({_0})")]
#[display("#{_0}")]
#[repr(transparent)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Position of the node in its bucket, in creation order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index.try_into().expect("NodeId::from_index: bucket is full"))
    }
}

/// Process-unique identity of a bucket, used by the executor to keep two
/// plans of the same bucket from running at once.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
#[display("bucket-{_0}")]
#[repr(transparent)]
pub struct BucketId(u64);

impl BucketId {
    pub(crate) fn next() -> Self {
        // Not routed through `sync`: identities are not part of any model.
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity the executor assigns to each submitted plan.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash, From)]
#[display("plan-{_0}")]
#[repr(transparent)]
pub struct PlanId(u64);

/// Resource-tag bitmask of a plan. Two plans whose masks intersect are never
/// admitted at the same time.
pub type ResourceMask = u64;

pub(crate) type HashSet<T> = _HashSet<T, FxBuildHasher>;
pub(crate) type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
