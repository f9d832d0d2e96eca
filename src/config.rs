use crate::{executor::ExecutorError, utils::hardware_concurrency};
use core::time::Duration;

/// Configuration entry-point for instantiating the executor.
///
/// All knobs have working defaults; only `workers` usually needs a value.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Number of worker threads in the pool.
    pub workers: usize,
    /// Initial capacity of the shared work queue, rounded up to a power of
    /// two. The queue doubles on persistent overflow.
    pub queue_capacity: usize,
    /// How long a producer waits on a full queue before growing it.
    pub overflow_patience: Duration,
    /// Prefix of the worker thread names; workers are named
    /// `"{thread_name}-{index}"`.
    pub thread_name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: hardware_concurrency(),
            queue_capacity: 256,
            overflow_patience: Duration::from_millis(1),
            thread_name: "jobgraph-worker".to_owned(),
        }
    }
}

impl ExecutorConfig {
    /// Sets the number of worker threads.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the initial queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets how long a full queue is given to drain before it grows.
    pub fn overflow_patience(mut self, patience: Duration) -> Self {
        self.overflow_patience = patience;
        self
    }

    /// Sets the worker thread name prefix.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Checks that the configuration describes a usable pool.
    ///
    /// # Errors
    /// [`ExecutorError::InvalidConfig`] for a pool without workers or a
    /// queue without capacity.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.workers == 0 {
            return Err(ExecutorError::InvalidConfig("workers must be > 0"));
        }
        if self.queue_capacity == 0 {
            return Err(ExecutorError::InvalidConfig("queue_capacity must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ExecutorConfig::default();
        assert!(config.workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_pool_and_queue() {
        assert!(matches!(
            ExecutorConfig::default().workers(0).validate(),
            Err(ExecutorError::InvalidConfig("workers must be > 0"))
        ));
        assert!(matches!(
            ExecutorConfig::default().queue_capacity(0).validate(),
            Err(ExecutorError::InvalidConfig("queue_capacity must be > 0"))
        ));
    }

    #[test]
    fn setters_chain() {
        let config = ExecutorConfig::default()
            .workers(3)
            .queue_capacity(10)
            .overflow_patience(Duration::from_micros(50))
            .thread_name("pool");
        assert_eq!(config.workers, 3);
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.overflow_patience, Duration::from_micros(50));
        assert_eq!(config.thread_name, "pool");
    }
}
