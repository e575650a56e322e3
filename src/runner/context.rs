//! Execution context for task running
//!
//! The context carries the per-invocation settings the executor needs: how
//! many mappings may run at once, and the cancellation flag shared with
//! watch mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Execution context that tracks state during task execution
#[derive(Debug, Clone)]
pub struct Context {
    /// Maximum mappings processed concurrently within one task
    pub jobs: usize,

    /// Set to stop a run at the next mapping boundary
    cancel: Arc<AtomicBool>,
}

impl Context {
    /// Create a new context with default settings
    pub fn new() -> Self {
        Context {
            jobs: default_jobs(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set mapping parallelism (at least one)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Request cancellation of the current run
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Available parallelism, or one when it cannot be determined
pub fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_new() {
        let ctx = Context::new();
        assert!(ctx.jobs >= 1);
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_with_jobs_floor() {
        let ctx = Context::new().with_jobs(0);
        assert_eq!(ctx.jobs, 1);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let ctx = Context::new();
        let flag = ctx.cancel_flag();
        flag.store(true, Ordering::SeqCst);
        assert!(ctx.is_cancelled());

        let other = Context::new();
        other.cancel();
        assert!(other.is_cancelled());
    }
}
