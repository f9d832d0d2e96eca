#![allow(dead_code)]

use std::{
    sync::{
        Arc, Condvar, Mutex, Once,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Logs are captured per test and only printed for failing ones unless the
/// tests run with `-- --nocapture`. Enable levels with e.g.
/// `RUST_LOG=jobgraph=trace cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Upper bound for any single wait in the tests, so a hang fails instead of
/// blocking the suite.
pub const PATIENCE: Duration = Duration::from_secs(10);

/// Shared counter handed to node closures.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Append-only event log shared by node closures and hooks.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn recorder(&self, event: &'static str) -> impl Fn() + Send + Sync + 'static {
        let journal = self.clone();
        move || journal.record(event)
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// One-shot latch: closed until `open` is called, then open for good.
#[derive(Debug, Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn open(&self) {
        let (open, cond) = &*self.0;
        *open.lock().unwrap() = true;
        cond.notify_all();
    }

    /// Blocks until the gate opens. Returns `false` if it stayed closed for
    /// [`PATIENCE`].
    pub fn wait(&self) -> bool {
        let (open, cond) = &*self.0;
        let (open, _) = cond
            .wait_timeout_while(open.lock().unwrap(), PATIENCE, |open| !*open)
            .unwrap();
        *open
    }
}
