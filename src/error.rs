//! Domain-specific error types for the grading boundary.
//!
//! Typed errors enable callers (e.g. an HTTP layer) to map specific
//! failure modes to distinct responses rather than parsing error
//! message strings: validation failures are the caller's fault,
//! infrastructure failures are ours.

/// Errors surfaced by [`Grader::submit`](crate::grader::Grader::submit).
///
/// A submission whose code fails to run is *not* an error; it flows
/// back as a normal low-score [`GradingResult`](crate::score::GradingResult).
#[derive(Debug, thiserror::Error)]
pub enum GraderError {
    /// The requested language is not in the supported set.
    #[error("unsupported language '{requested}' (supported: {})", .supported.join(", "))]
    UnsupportedLanguage {
        /// The language identifier the caller asked for.
        requested: String,
        /// The languages the registry can resolve.
        supported: Vec<String>,
    },

    /// The request was malformed (e.g. empty source).
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Why the request was rejected.
        reason: String,
    },

    /// The isolation backend could not run the submission at all.
    ///
    /// The submitted code may be perfectly fine; this must never be
    /// presented to the end user as a code defect.
    #[error("execution backend unavailable: {detail}")]
    BackendUnavailable {
        /// What the backend reported.
        detail: String,
    },
}

impl GraderError {
    /// Creates an `UnsupportedLanguage` error.
    pub fn unsupported_language(
        requested: impl Into<String>,
        supported: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::UnsupportedLanguage {
            requested: requested.into(),
            supported: supported.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates an `InvalidInput` error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates a `BackendUnavailable` error.
    pub fn backend_unavailable(detail: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            detail: detail.into(),
        }
    }

    /// Returns true if this is a validation error (caller's fault,
    /// maps to a 4xx-class response at the HTTP boundary).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedLanguage { .. } | Self::InvalidInput { .. }
        )
    }

    /// Returns true if this is an infrastructure error (retryable,
    /// maps to a 5xx-class response at the HTTP boundary).
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}
