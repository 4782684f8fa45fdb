//! Error taxonomy shared by activities and workflows (spec §7).

use serde::{Deserialize, Serialize};

/// Named error category. Unlike a Rust `Error` type, `ErrorKind` crosses the
/// activity/workflow boundary as data — it is what gets serialized into
/// `ActivityError`/`WorkflowError` and inspected by the orchestrator to
/// decide between retry, compensation, and failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input violates a precondition. Non-retryable, surfaced to caller.
    Validation,
    /// Referenced entity absent. Non-retryable in activities.
    NotFound,
    /// Concurrent modification or duplicate in-flight request. Retryable by caller.
    Conflict,
    /// Network/timeout/upstream 5xx. Retried per policy.
    Transient,
    /// Business failure mid-saga that requires rollback.
    Compensatable,
    /// Determinism violation, unknown signal, corrupted history.
    Fatal,
}

impl ErrorKind {
    /// The non-retryable set named in spec §4.2: `Validation` and `NotFound`.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Validation | ErrorKind::NotFound)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transient => "transient",
            ErrorKind::Compensatable => "compensatable",
            ErrorKind::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured error body for the HTTP contract (spec §6.2):
/// `{code, message, details?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_retryable_set_matches_spec() {
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(ErrorKind::Conflict.is_retryable());
        assert!(ErrorKind::Transient.is_retryable());
        assert!(ErrorKind::Compensatable.is_retryable());
        assert!(ErrorKind::Fatal.is_retryable());
    }
}
