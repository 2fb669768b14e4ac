//! Error taxonomy shared by the user and session layers.

use thiserror::Error;

/// Result type used across the user and session APIs.
pub type ApiResult<T> = Result<T, ApiError>;

/// User/session API error.
///
/// Each variant maps to one recovery strategy, so callers can match on the
/// variant alone:
///
/// - `Validation` is a caller bug (bad arguments, missing preconditions) and
///   should never be shown to end users.
/// - `AccessDenied` is a normal, recoverable refusal.
/// - `SessionInvalid` means the presented session evidence did not check out;
///   the session layer recovers internally by falling back to an anonymous
///   context, so this mostly surfaces from flows where a session was a hard
///   precondition.
/// - `TamperDetected` must abort the request; the message is deliberately
///   generic so nothing about the check leaks.
/// - `Store` wraps collaborator failures on their way up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The caller passed arguments that violate the API contract.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The acting user is not allowed to perform the operation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// A session identifier was missing, mismatched or expired.
    #[error("session invalid: {0}")]
    SessionInvalid(String),

    /// Posted form data failed the posting-token check.
    #[error("possible hack attempt detected: the posted form data was rejected")]
    TamperDetected,

    /// A storage or cache collaborator failed.
    #[error("store failure: {0}")]
    Store(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    pub fn session_invalid(msg: impl Into<String>) -> Self {
        Self::SessionInvalid(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}
