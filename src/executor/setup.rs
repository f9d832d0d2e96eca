use crate::{
    config::ExecutorConfig,
    executor::{Executor, Shared, schedule::Schedule},
    queue::WorkQueue,
    sync::{Arc, Condvar, Mutex, thread},
};
use core::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::info;

/// Error kind for executor construction failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutorError {
    /// The configuration does not describe a usable pool.
    #[error("invalid executor configuration: {0}")]
    InvalidConfig(&'static str),
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread")]
    Spawn(#[source] std::io::Error),
}

impl Executor {
    /// Starts a pool described by `config`.
    ///
    /// If one worker fails to spawn, the workers already running are stopped
    /// and joined before the error is returned.
    ///
    /// # Errors
    /// If `config` is invalid or a thread cannot be spawned.
    pub fn with_config(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        config.validate()?;
        let ExecutorConfig {
            workers: num_workers,
            queue_capacity,
            overflow_patience,
            thread_name,
        } = config;

        // Not routed through `sync`: identities are not part of any model.
        static NEXT_EXECUTOR: AtomicU64 = AtomicU64::new(1);
        let shared = Arc::new(Shared {
            queue: WorkQueue::new(queue_capacity, overflow_patience),
            schedule: Mutex::new(Schedule::default()),
            idle: Condvar::new(),
            id: NEXT_EXECUTOR.fetch_add(1, Ordering::Relaxed),
            next_plan: AtomicU64::new(1),
        });

        let mut workers = Vec::with_capacity(num_workers);
        for index in 0..num_workers {
            let worker_shared = shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("{thread_name}-{index}"))
                .spawn(move || worker_shared.work(index));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    shared.queue.close();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(ExecutorError::Spawn(err));
                }
            }
        }

        info!(
            workers = num_workers,
            queue_capacity = shared.queue.capacity(),
            "executor started"
        );
        Ok(Self { shared, workers })
    }
}
