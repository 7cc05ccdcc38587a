use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Polled by long-running layout loops; a `true` answer aborts the layout.
pub trait CancellationHandler {
    fn is_cancelled(&self) -> bool;

    /// Human-readable cause, used in the resulting error.
    fn reason(&self) -> String;
}

/// Cancels once a wall-clock budget has elapsed.
#[derive(Debug, Clone)]
pub struct TimeoutCancellationHandler {
    started: Instant,
    budget: Duration,
}

impl TimeoutCancellationHandler {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            started: Instant::now(),
            budget: Duration::from_millis(timeout_ms),
        }
    }

    pub fn reset(&mut self) {
        self.started = Instant::now();
    }
}

impl CancellationHandler for TimeoutCancellationHandler {
    fn is_cancelled(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    fn reason(&self) -> String {
        format!("layout timed out after {} ms", self.budget.as_millis())
    }
}

/// Cancels when its shared flag is raised, possibly from another thread.
#[derive(Debug, Clone, Default)]
pub struct FlagCancellationHandler {
    flag: Arc<AtomicBool>,
}

impl FlagCancellationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A shared handle to the flag for the cancelling side.
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

impl CancellationHandler for FlagCancellationHandler {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn reason(&self) -> String {
        "layout cancelled by caller".to_string()
    }
}
