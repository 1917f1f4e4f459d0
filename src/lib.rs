//! Sandboxed execution and grading of untrusted code submissions.
//!
//! The core pipeline: an [`ExecutionRequest`] is validated against the
//! language adapter [`Registry`](language::Registry), run in a
//! disposable container by a [`Sandbox`](sandbox::Sandbox) backend
//! under a hard timeout, and the raw
//! [`ExecutionOutcome`](sandbox::ExecutionOutcome) is turned into a
//! deterministic [`GradingResult`] by the scorer. Callers (typically an
//! HTTP layer) invoke [`Grader::submit`] in-process and persist results
//! through the [`ledger`] seam.

pub mod config;
pub mod error;
pub mod grader;
pub mod language;
pub mod ledger;
pub mod sandbox;
pub mod score;

pub use error::GraderError;
pub use grader::{ExecutionRequest, Grader};
pub use score::GradingResult;
