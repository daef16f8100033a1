//! Error types for VCD reconciliation.

use std::time::Duration;

use thiserror::Error;

/// Failures reported by the transport collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The API answered with a non-success status. `message` is the text
    /// the remote system put into its error body.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Http { status: 404, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ApiError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Errors returned by the lifecycle entry points.
///
/// A missing remote object is not an error: the reconciler absorbs it and
/// clears local identity instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The declared resource is unusable. Never retried.
    #[error("invalid {kind} definition: {message}")]
    Validation { kind: &'static str, message: String },

    /// An org or VDC named in the resource scope does not exist.
    #[error("{scope} '{name}' not found")]
    ScopeNotFound { scope: &'static str, name: String },

    /// The mutating call was rejected before a task existed.
    #[error("{operation} rejected: {source}")]
    Submission {
        operation: String,
        #[source]
        source: ApiError,
    },

    /// The remote task ran and ended in failure.
    #[error("{operation} failed: {message}")]
    TaskFailed {
        operation: String,
        task: String,
        message: String,
    },

    /// The task did not reach a terminal state in time. Its outcome is unknown.
    #[error("{operation} did not finish within {elapsed:?} (task {task})")]
    Timeout {
        operation: String,
        task: String,
        elapsed: Duration,
    },

    /// The caller stopped waiting for the task.
    #[error("{operation} wait cancelled (task {task})")]
    Cancelled { operation: String, task: String },

    /// The request was accepted but its task could no longer be polled.
    /// Its outcome is unknown.
    #[error("{operation} accepted but not confirmed (task {task}): {source}")]
    Unconfirmed {
        operation: String,
        task: String,
        #[source]
        source: ApiError,
    },

    /// Communication with the API failed while reading state.
    #[error(transparent)]
    Transport(#[from] ApiError),

    /// Update was asked for a resource that is not in local state.
    #[error("{kind} is not tracked in state")]
    NotTracked { kind: &'static str },

    /// Read or delete was asked for a resource with no recorded locator
    /// that cannot be located by name.
    #[error("{kind} '{id}' has no recorded href")]
    MissingLocator { kind: &'static str, id: String },
}

impl Error {
    pub fn validation(kind: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            kind,
            message: message.into(),
        }
    }

    /// Whether repeating the whole operation from scratch is safe: the
    /// mutating call was rejected, or a read failed.
    ///
    /// `Timeout`, `Cancelled` and `Unconfirmed` leave a submitted task with an
    /// unknown outcome. Re-running a create could duplicate the resource, so
    /// those are not retryable; a later `read` settles them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Submission { .. } | Error::Transport(_))
    }

    /// Whether a task was submitted and its outcome is unknown.
    pub fn is_unconfirmed(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Cancelled { .. } | Error::Unconfirmed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
