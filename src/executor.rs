mod execute;
mod schedule;
mod setup;

/// Error returned by `Executor::new` / `Executor::with_config` when the pool
/// cannot be built.
pub use crate::executor::setup::ExecutorError;
use crate::{
    config::ExecutorConfig,
    executor::schedule::Schedule,
    plan::{Completion, Instance, Plan},
    queue::WorkQueue,
    sync::{Arc, Condvar, Mutex, lock, thread, wait},
    types::{NodeId, PlanId},
};
use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::{debug, error, info};

/// Fixed pool of worker threads that runs plans.
///
/// Key responsibilities:
/// - Admits submitted plans, deferring any plan whose bucket is already
///   running or whose resource tag intersects a running plan's tag.
/// - Dispatches ready nodes from a shared FIFO to the workers. A worker that
///   makes successors ready keeps the first one for itself and queues the
///   rest.
/// - Ends a round when its last node finishes, then either starts the next
///   round or finalizes the plan and admits waiting plans in submission
///   order.
///
/// Dropping the executor waits for every submitted plan and joins the
/// workers, like [`Executor::shutdown`].
#[must_use]
pub struct Executor {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
}

/// State shared between the executor handle and its workers.
pub(crate) struct Shared {
    queue: WorkQueue<Job>,
    /// Admitted and waiting plans. Touched only at submission and at the end
    /// of a plan, never per node.
    schedule: Mutex<Schedule>,
    /// Signalled whenever the schedule becomes idle.
    idle: Condvar,
    /// Process-unique identity, used to keep buckets on one executor.
    id: u64,
    next_plan: AtomicU64,
}

/// A ready node of an admitted plan.
pub(crate) struct Job {
    plan: Arc<Instance>,
    node: NodeId,
}

impl Executor {
    /// Starts a pool of `workers` threads with default settings otherwise.
    ///
    /// # Errors
    /// If `workers` is zero or a thread cannot be spawned.
    pub fn new(workers: usize) -> Result<Self, ExecutorError> {
        Self::with_config(ExecutorConfig::default().workers(workers))
    }

    /// Submits `plan` and returns its completion handle.
    ///
    /// The plan starts immediately unless an admitted plan shares its bucket
    /// or any resource bit, in which case it waits, in submission order,
    /// until it no longer conflicts. A plan without entry nodes completes on
    /// the spot without reaching the queue.
    ///
    /// # Panics
    /// If the plan's bucket still has plans on another executor.
    pub fn submit(&self, plan: Plan) -> Completion {
        let completion = plan.future();
        let id = PlanId::from(self.shared.next_plan.fetch_add(1, Ordering::Relaxed));
        let plan = Arc::new(plan.into_instance(id));
        if plan.entries.is_empty() {
            debug!(plan = %id, bucket = %plan.bucket_id(), "plan has no entry nodes");
            execute::finish(&plan);
            return completion;
        }
        assert!(
            plan.bucket.claim(self.shared.id),
            "{} still has plans on another executor",
            plan.bucket_id()
        );
        let admitted = lock(&self.shared.schedule).submit(plan.clone());
        if admitted {
            self.shared.start(&plan);
        }
        completion
    }

    /// Blocks until no plan is admitted or waiting and the queue is empty.
    pub fn wait_for_all(&self) {
        let mut schedule = lock(&self.shared.schedule);
        while !schedule.is_idle() {
            schedule = wait(&self.shared.idle, schedule);
        }
        debug_assert!(self.shared.queue.is_empty(), "Executor::wait_for_all: [1]");
    }

    /// Waits for every submitted plan, then stops and joins the workers.
    pub fn shutdown(mut self) {
        self.terminate();
    }

    fn terminate(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.wait_for_all();
        self.shared.queue.close();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        info!("executor shut down");
    }

    /// Number of worker threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Number of plans currently admitted.
    #[must_use]
    pub fn admitted(&self) -> usize {
        lock(&self.shared.schedule).admitted()
    }

    /// Number of plans waiting for admission.
    #[must_use]
    pub fn waiting(&self) -> usize {
        lock(&self.shared.schedule).waiting()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schedule = lock(&self.shared.schedule);
        f.debug_struct("Executor")
            .field("workers", &self.workers.len())
            .field("admitted", &schedule.admitted())
            .field("waiting", &schedule.waiting())
            .field("queue", &self.shared.queue)
            .finish()
    }
}
