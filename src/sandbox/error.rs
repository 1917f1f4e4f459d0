//! Domain-specific error types for sandbox operations.
//!
//! Typed errors enable callers to match on specific failure modes
//! rather than parsing error message strings. All variants describe
//! infrastructure trouble; a submission that merely exits non-zero or
//! times out is reported through
//! [`ExecutionOutcome`](super::ExecutionOutcome), never through these.

use crate::error::GraderError;

/// Errors that can occur during sandbox operations.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Docker daemon is not running or not accessible.
    #[error("Docker is not available: {message}")]
    Unavailable { message: String },

    /// Runtime image for the requested language was not found.
    #[error("Container image not found: {image}")]
    ImageNotFound { image: String },

    /// Container operation failed (create, inject, start, wait, etc.).
    #[error("Container operation failed: {message}")]
    ContainerFailed { message: String },
}

impl SandboxError {
    /// Creates an `Unavailable` error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates an `ImageNotFound` error.
    pub fn image_not_found(image: impl Into<String>) -> Self {
        Self::ImageNotFound {
            image: image.into(),
        }
    }

    /// Creates a `ContainerFailed` error.
    pub fn container_failed(message: impl Into<String>) -> Self {
        Self::ContainerFailed {
            message: message.into(),
        }
    }

    /// Returns true if this is a Docker unavailability error.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns true if this is an image not found error.
    pub fn is_image_not_found(&self) -> bool {
        matches!(self, Self::ImageNotFound { .. })
    }
}

/// Every sandbox failure is an infrastructure failure at the grading
/// boundary: the submitted code never got a fair chance to run.
impl From<SandboxError> for GraderError {
    fn from(err: SandboxError) -> Self {
        GraderError::backend_unavailable(err.to_string())
    }
}
