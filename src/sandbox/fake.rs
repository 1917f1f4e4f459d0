//! Scripted fake sandbox for testing without Docker.
//!
//! Returns pre-queued outcomes in order and records how the backend was
//! used: total calls, currently live sandboxes, and the concurrent
//! high-water mark. Tests use it to prove the coordinator never leaks a
//! sandbox and never touches the backend on validation failures.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{ExecutionOutcome, Sandbox, SandboxError};
use crate::language::LanguageAdapter;

/// A sandbox that replays scripted outcomes instead of running code.
#[derive(Debug, Default)]
pub struct FakeSandbox {
    outcomes: Mutex<VecDeque<Result<ExecutionOutcome, SandboxError>>>,
    calls: AtomicU32,
    live: AtomicU32,
    peak_live: AtomicU32,
    delay: Option<Duration>,
}

impl FakeSandbox {
    /// Creates a fake with no scripted outcomes; runs fail until some
    /// are queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fake whose runs hold the sandbox "live" for `delay`,
    /// so tests can observe overlapping executions.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queues an outcome to be returned by the next unanswered `run`.
    pub fn push_outcome(&self, outcome: ExecutionOutcome) {
        self.outcomes
            .lock()
            .expect("outcome queue poisoned")
            .push_back(Ok(outcome));
    }

    /// Queues an error to be returned by the next unanswered `run`.
    pub fn push_error(&self, error: SandboxError) {
        self.outcomes
            .lock()
            .expect("outcome queue poisoned")
            .push_back(Err(error));
    }

    /// Number of times `run` was invoked.
    pub fn run_calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of sandboxes currently live (provisioned, not released).
    pub fn live_sandboxes(&self) -> u32 {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of sandboxes that were ever live at once.
    pub fn peak_live_sandboxes(&self) -> u32 {
        self.peak_live.load(Ordering::SeqCst)
    }
}

/// Releases the live-count on every exit path, mirroring the teardown
/// guarantee of the real backend.
struct LiveGuard<'a>(&'a AtomicU32);

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Sandbox for FakeSandbox {
    async fn run(
        &self,
        _adapter: &LanguageAdapter,
        _source: &str,
        _timeout: Duration,
    ) -> Result<ExecutionOutcome, SandboxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_live.fetch_max(live, Ordering::SeqCst);
        let _guard = LiveGuard(&self.live);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.outcomes
            .lock()
            .expect("outcome queue poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(SandboxError::container_failed(
                    "no scripted outcome queued",
                ))
            })
    }

    async fn cleanup_orphaned(&self) -> Result<u32, SandboxError> {
        Ok(0)
    }
}
