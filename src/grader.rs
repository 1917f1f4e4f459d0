//! Execution coordinator: owns one grading request end-to-end.
//!
//! `submit` validates the request, resolves its language adapter, runs
//! the sandbox under the configured timeout, and scores the outcome.
//! Validation failures never reach the backend; backend failures are
//! surfaced as infrastructure errors, never scored. A request is
//! consumed by value, so at most one execution per request is
//! guaranteed structurally.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::GraderError;
use crate::language::Registry;
use crate::sandbox::Sandbox;
use crate::score::{self, GradingResult};

/// One code submission to grade. Immutable once accepted.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Requested language identifier (validated against the registry).
    pub language: String,
    /// The submitted source text.
    pub source: String,
    /// Expected output fragments; all must appear for the score bonus.
    pub test_cases: Vec<String>,
}

impl ExecutionRequest {
    /// Creates a request with no test cases.
    pub fn new(language: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source: source.into(),
            test_cases: Vec::new(),
        }
    }

    /// Attaches expected-output test cases.
    #[must_use]
    pub fn with_test_cases(mut self, test_cases: Vec<String>) -> Self {
        self.test_cases = test_cases;
        self
    }
}

/// Lifecycle stage of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Provisioning,
    Running,
    Completed,
    TimedOut,
    Failed,
    Released,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::TimedOut => "timed-out",
            Self::Failed => "failed",
            Self::Released => "released",
        };
        f.write_str(name)
    }
}

/// Per-request bookkeeping: a unique id plus the current stage.
///
/// The sandbox owns the actual resource and releases it internally;
/// this records the transitions so every request's lifecycle is
/// observable in the logs.
struct Execution {
    id: Uuid,
    stage: Stage,
}

impl Execution {
    fn begin(language: &str) -> Self {
        let execution = Self {
            id: Uuid::new_v4(),
            stage: Stage::Idle,
        };
        debug!("[{}] accepted {} submission", execution.id, language);
        execution
    }

    fn advance(&mut self, next: Stage) {
        debug!("[{}] {} -> {}", self.id, self.stage, next);
        self.stage = next;
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        if self.stage != Stage::Released {
            debug!("[{}] released at stage {}", self.id, self.stage);
        }
    }
}

/// Coordinates sandboxed execution and scoring of submissions.
///
/// Holds only read-only state, so a single instance serves unrelated
/// requests concurrently without serializing them against each other.
pub struct Grader {
    registry: Registry,
    sandbox: Arc<dyn Sandbox>,
    timeout: Duration,
}

impl Grader {
    /// Creates a coordinator over the given registry and backend.
    pub fn new(registry: Registry, sandbox: Arc<dyn Sandbox>, timeout: Duration) -> Self {
        Self {
            registry,
            sandbox,
            timeout,
        }
    }

    /// Grades one submission.
    ///
    /// Fails with [`GraderError::UnsupportedLanguage`] or
    /// [`GraderError::InvalidInput`] before any sandbox is created, and
    /// with [`GraderError::BackendUnavailable`] when the isolation
    /// runtime cannot run the code. A submission that errors, exits
    /// non-zero, or times out is a successfully observed outcome and
    /// returns a normal (low-score) result.
    pub async fn submit(&self, request: ExecutionRequest) -> Result<GradingResult, GraderError> {
        if request.source.trim().is_empty() {
            return Err(GraderError::invalid_input("source must not be empty"));
        }
        if self.timeout.is_zero() {
            return Err(GraderError::invalid_input(
                "execution timeout must be positive",
            ));
        }
        let adapter = self.registry.resolve(&request.language)?;

        let mut execution = Execution::begin(&request.language);
        execution.advance(Stage::Provisioning);
        execution.advance(Stage::Running);

        let run_result = self
            .sandbox
            .run(adapter, &request.source, self.timeout)
            .await;

        let terminal = match &run_result {
            Ok(outcome) if outcome.timed_out => Stage::TimedOut,
            Ok(_) => Stage::Completed,
            Err(_) => Stage::Failed,
        };
        execution.advance(terminal);
        // The sandbox has torn down whatever it provisioned by the time
        // `run` returns, on success and failure alike.
        execution.advance(Stage::Released);

        let outcome = run_result?;
        let result = score::score(&outcome, adapter, &request.test_cases);
        info!(
            "[{}] graded {} submission: score {}",
            execution.id, request.language, result.score
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{ExecutionOutcome, FakeSandbox, SandboxError};

    fn grader_with(fake: Arc<FakeSandbox>) -> Grader {
        Grader::new(Registry::with_defaults(), fake, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_unsupported_language_never_touches_backend() {
        let fake = Arc::new(FakeSandbox::new());
        let grader = grader_with(fake.clone());

        let err = grader
            .submit(ExecutionRequest::new("ruby", "puts 1"))
            .await
            .unwrap_err();

        assert!(matches!(err, GraderError::UnsupportedLanguage { .. }));
        assert!(err.to_string().contains("python"));
        assert!(err.to_string().contains("javascript"));
        assert_eq!(fake.run_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_source_never_touches_backend() {
        let fake = Arc::new(FakeSandbox::new());
        let grader = grader_with(fake.clone());

        let err = grader
            .submit(ExecutionRequest::new("python", "   \n"))
            .await
            .unwrap_err();

        assert!(matches!(err, GraderError::InvalidInput { .. }));
        assert_eq!(fake.run_calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_timeout_never_touches_backend() {
        let fake = Arc::new(FakeSandbox::new());
        let grader = Grader::new(Registry::with_defaults(), fake.clone(), Duration::ZERO);

        let err = grader
            .submit(ExecutionRequest::new("python", "print(1)"))
            .await
            .unwrap_err();

        assert!(matches!(err, GraderError::InvalidInput { .. }));
        assert!(err.to_string().contains("timeout must be positive"));
        assert_eq!(fake.run_calls(), 0);
    }

    #[tokio::test]
    async fn test_clean_run_is_scored() {
        let fake = Arc::new(FakeSandbox::new());
        fake.push_outcome(ExecutionOutcome::completed(0, "hello\n".to_string()));
        let grader = grader_with(fake.clone());

        let result = grader
            .submit(ExecutionRequest::new("python", "print('hello')"))
            .await
            .unwrap();

        assert_eq!(result.score, 80);
        assert!(result.feedback.contains("runs successfully"));
        assert_eq!(fake.run_calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_an_outcome_not_an_error() {
        let fake = Arc::new(FakeSandbox::new());
        fake.push_outcome(ExecutionOutcome::timed_out(String::new()));
        let grader = grader_with(fake);

        let result = grader
            .submit(ExecutionRequest::new("python", "while True: pass"))
            .await
            .unwrap();

        assert_eq!(result.score, 0);
        assert!(result.feedback.contains("time limit"));
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_as_infrastructure_error() {
        let fake = Arc::new(FakeSandbox::new());
        fake.push_error(SandboxError::unavailable("daemon down"));
        let grader = grader_with(fake.clone());

        let err = grader
            .submit(ExecutionRequest::new("python", "print(1)"))
            .await
            .unwrap_err();

        assert!(err.is_infrastructure());
        // The sandbox was touched, and released.
        assert_eq!(fake.run_calls(), 1);
        assert_eq!(fake.live_sandboxes(), 0);
    }

    #[tokio::test]
    async fn test_test_cases_flow_through_to_scoring() {
        let fake = Arc::new(FakeSandbox::new());
        fake.push_outcome(ExecutionOutcome::completed(0, "sum=3\n".to_string()));
        let grader = grader_with(fake);

        let request = ExecutionRequest::new("python", "print('sum=3')")
            .with_test_cases(vec!["sum=3".to_string()]);
        let result = grader.submit(request).await.unwrap();

        assert_eq!(result.score, 100);
        assert!(result.feedback.contains("test cases passed"));
    }

    #[tokio::test]
    async fn test_concurrent_requests_run_independently_and_all_release() {
        let fake = Arc::new(FakeSandbox::with_delay(Duration::from_millis(50)));
        for _ in 0..3 {
            fake.push_outcome(ExecutionOutcome::completed(0, "ok\n".to_string()));
        }
        let grader = Arc::new(grader_with(fake.clone()));

        let submits = (0..3).map(|_| {
            let grader = grader.clone();
            tokio::spawn(
                async move { grader.submit(ExecutionRequest::new("python", "print(1)")).await },
            )
        });
        for handle in submits.collect::<Vec<_>>() {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(fake.run_calls(), 3);
        // Unrelated requests overlapped rather than serializing.
        assert!(fake.peak_live_sandboxes() >= 2);
        // Every sandbox was released.
        assert_eq!(fake.live_sandboxes(), 0);
    }
}
