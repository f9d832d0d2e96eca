use crate::{
    bucket::Bucket,
    sync::{Arc, AtomicUsize, Condvar, Mutex, Ordering, lock, wait, wait_timeout},
    task::Executable,
    types::{BucketId, NodeId, PlanId, ResourceMask},
};
use core::{fmt, time::Duration};
use derive_more::Debug;
use std::time::Instant;

/// One execution instance of a [`Bucket`].
///
/// A plan caches the bucket's entry nodes when it is created and carries
/// everything that varies per run: the continuation predicate, the prepare
/// and done hooks, the resource tag and the completion signal. Plans are
/// consumed by [`Executor::submit`](crate::executor::Executor::submit).
///
/// Without a predicate a plan runs exactly one round.
#[must_use]
#[derive(Debug)]
pub struct Plan {
    bucket: Arc<Bucket>,
    entries: Vec<NodeId>,
    predicate: Option<Executable>,
    on_prepare: Option<Executable>,
    on_done: Option<Executable>,
    tag: ResourceMask,
    completion: Completion,
}

impl Plan {
    /// Creates a plan over `bucket`, computing its entry nodes once.
    pub fn new(bucket: Arc<Bucket>) -> Self {
        let entries = bucket.entries().collect();
        Self {
            bucket,
            entries,
            predicate: None,
            on_prepare: None,
            on_done: None,
            tag: 0,
            completion: Completion::new(),
        }
    }

    /// Runs another round whenever `f` returns `true` at the end of one.
    pub fn predicate(mut self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Executable::predicate(f));
        self
    }

    /// Runs exactly `n` rounds (at least one).
    pub fn do_n(self, n: usize) -> Self {
        let remaining = core::sync::atomic::AtomicUsize::new(n);
        self.predicate(move || {
            let before = remaining
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |left| {
                    Some(left.saturating_sub(1))
                })
                .unwrap_or_default();
            before > 1
        })
    }

    /// Calls `f` once, when the plan is admitted and before its first round.
    pub fn on_prepare(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_prepare = Some(Executable::action(f));
        self
    }

    /// Calls `f` once, after the last round and before the completion signal
    /// is published.
    pub fn on_done(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_done = Some(Executable::action(f));
        self
    }

    /// Adds resource bits. Plans whose tags intersect never run at the same
    /// time.
    pub fn tag(mut self, mask: ResourceMask) -> Self {
        self.tag |= mask;
        self
    }

    /// Handle that completes once the plan has finished its last round.
    #[must_use]
    pub fn future(&self) -> Completion {
        self.completion.clone()
    }

    /// The bucket this plan runs.
    #[must_use]
    pub fn bucket(&self) -> &Arc<Bucket> {
        &self.bucket
    }

    /// Entry nodes cached at construction.
    #[must_use]
    pub fn entries(&self) -> &[NodeId] {
        &self.entries
    }

    /// Accumulated resource tag.
    #[must_use]
    pub fn tag_mask(&self) -> ResourceMask {
        self.tag
    }

    pub(crate) fn into_instance(self, id: PlanId) -> Instance {
        let Self {
            bucket,
            entries,
            predicate,
            on_prepare,
            on_done,
            tag,
            completion,
        } = self;
        Instance {
            id,
            bucket,
            entries: entries.into_boxed_slice(),
            predicate,
            on_prepare,
            on_done,
            tag,
            completion,
            in_flight: AtomicUsize::new(0),
            round: AtomicUsize::new(0),
        }
    }
}

/// Completion signal of a submitted plan.
///
/// Cheap to clone; every clone observes the same signal.
#[derive(Clone)]
pub struct Completion(Arc<Signal>);

struct Signal {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self(Arc::new(Signal {
            done: Mutex::new(false),
            cond: Condvar::new(),
        }))
    }

    /// Blocks until the plan has finished.
    pub fn wait(&self) {
        let Signal { done, cond } = &*self.0;
        let mut done_guard = lock(done);
        while !*done_guard {
            done_guard = wait(cond, done_guard);
        }
    }

    /// Blocks until the plan has finished or `timeout` elapsed. Returns
    /// whether the plan finished.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            // No representable deadline: the caller is prepared to wait forever.
            self.wait();
            return true;
        };
        let Signal { done, cond } = &*self.0;
        let mut done_guard = lock(done);
        while !*done_guard {
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            done_guard = wait_timeout(cond, done_guard, left);
        }
        *done_guard
    }

    /// Whether the plan has finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        *lock(&self.0.done)
    }

    pub(crate) fn signal(&self) {
        let Signal { done, cond } = &*self.0;
        *lock(done) = true;
        cond.notify_all();
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Completion")
            .field(&self.is_complete())
            .finish()
    }
}

/// A submitted plan as the executor drives it.
#[derive(Debug)]
pub(crate) struct Instance {
    pub(crate) id: PlanId,
    pub(crate) bucket: Arc<Bucket>,
    pub(crate) entries: Box<[NodeId]>,
    pub(crate) predicate: Option<Executable>,
    pub(crate) on_prepare: Option<Executable>,
    pub(crate) on_done: Option<Executable>,
    pub(crate) tag: ResourceMask,
    pub(crate) completion: Completion,
    /// Nodes of the current round that are ready or running.
    in_flight: AtomicUsize,
    /// Number of the current round, starting at 1.
    round: AtomicUsize,
}

impl Instance {
    pub(crate) fn bucket_id(&self) -> BucketId {
        self.bucket.id()
    }

    /// Arms the bucket for this plan and opens the first round.
    pub(crate) fn arm(&self) -> usize {
        self.bucket.arm();
        self.open_round()
    }

    /// Rearms the bucket and opens the next round.
    pub(crate) fn renew(&self) -> usize {
        self.bucket.rearm();
        self.open_round()
    }

    fn open_round(&self) -> usize {
        self.in_flight.store(self.entries.len(), Ordering::Relaxed);
        self.round.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn round(&self) -> usize {
        self.round.load(Ordering::Relaxed)
    }

    /// Counts a node that became ready in the current round.
    pub(crate) fn track(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// Uncounts a node that finished. Returns `true` for the caller that
    /// finished the round.
    pub(crate) fn settle(&self) -> bool {
        let left = self.in_flight.fetch_sub(1, Ordering::AcqRel);
        assert_ne!(left, 0, "Instance::settle: in-flight counter underflow");
        left == 1
    }
}
