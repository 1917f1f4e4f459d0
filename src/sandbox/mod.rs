//! Container-based isolation for untrusted code execution.
//!
//! Provides disposable, resource-constrained sandboxes: each execution
//! gets a freshly created container that is force-removed before the
//! call returns, on every path. Nothing is shared between executions.

mod docker;
mod error;
mod fake;

pub use docker::DockerSandbox;
pub use error::SandboxError;
pub use fake::FakeSandbox;

use async_trait::async_trait;
use std::time::Duration;

use crate::language::LanguageAdapter;

/// Raw, unscored result of one sandboxed execution.
///
/// Produced exactly once per request. A non-zero exit or a timeout is
/// expected data here, not an error; only infrastructure trouble
/// surfaces as [`SandboxError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Whether the process terminated on its own with a zero status.
    pub exited_cleanly: bool,
    /// Everything written to stdout and stderr, in arrival order.
    ///
    /// The streams are deliberately not separated; the scorer's
    /// heuristics operate on the combined text.
    pub combined_output: String,
    /// Whether the sandbox was forcibly terminated at the timeout.
    pub timed_out: bool,
}

impl ExecutionOutcome {
    /// Outcome for a process that terminated on its own.
    pub fn completed(exit_code: i64, combined_output: String) -> Self {
        Self {
            exited_cleanly: exit_code == 0,
            combined_output,
            timed_out: false,
        }
    }

    /// Outcome for a process that was cut off at the timeout.
    pub fn timed_out(partial_output: String) -> Self {
        Self {
            exited_cleanly: false,
            combined_output: partial_output,
            timed_out: true,
        }
    }
}

/// Trait for sandbox execution backends.
///
/// Implementations must guarantee that whatever they provision for a
/// `run` call is released before the call returns, including on the
/// timeout and error paths.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Executes `source` under the adapter's runtime, bounded by `timeout`.
    ///
    /// On timeout the sandbox process is hard-terminated, not merely
    /// abandoned, and the outcome carries whatever output was captured
    /// up to that point.
    async fn run(
        &self,
        adapter: &LanguageAdapter,
        source: &str,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, SandboxError>;

    /// Removes sandboxes left behind by crashed runs, returning the count.
    async fn cleanup_orphaned(&self) -> Result<u32, SandboxError>;
}
