// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;

/// The result for fallible operations that use the [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// An error produced while executing a request.
///
/// Errors are cheap to clone. A single failed network call can be observed by many callers
/// at once (every caller attached to the same in-flight request receives the same error),
/// so the error carries its sources behind [`Arc`].
///
/// Use [`Error::recovery`] or [`Error::is_retryable`] to decide how to react; the client
/// itself only retries [`Error::Timeout`] and [`Error::TransportFailure`].
///
/// # Examples
///
/// ```
/// use http::StatusCode;
/// use reveille::{Error, RecoveryKind};
///
/// let error = Error::from_status(StatusCode::NOT_FOUND).unwrap();
/// assert!(matches!(error, Error::NotFound));
/// assert_eq!(error.recovery(), RecoveryKind::Never);
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No response arrived within the per-attempt timeout.
    #[error("no response within {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The server rejected the credentials of the request (`401` or `403`).
    #[error("request was not authorized ({0})")]
    Unauthorized(StatusCode),

    /// The requested resource does not exist (`404`).
    #[error("resource not found")]
    NotFound,

    /// The server reported that it cannot serve requests right now (`503`), or the
    /// availability monitor reported the backend as unavailable.
    #[error("service unavailable")]
    ServiceUnavailable,

    /// The request never produced a response, e.g. connection refused or reset.
    #[error("transport failure")]
    TransportFailure(#[source] TransportError),

    /// A response arrived but its body is not a well-formed payload.
    #[error("failed to decode response payload")]
    DecodeFailure(#[source] Arc<serde_json::Error>),

    /// The server answered with a status that has no dedicated variant.
    #[error("unexpected response status {0}")]
    UnexpectedStatus(StatusCode),
}

/// How an [`Error`] can be recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RecoveryKind {
    /// The condition is transient; repeating the request may succeed.
    Retry,

    /// The condition is permanent; repeating the request cannot help.
    Never,

    /// The backend as a whole is not serving requests. Repeating the request right away has
    /// a low chance of success; consult the availability monitor instead.
    Unavailable,
}

impl Error {
    /// Maps a non-success response status to an error.
    ///
    /// Returns `None` for `2xx` statuses.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Option<Self> {
        if status.is_success() {
            return None;
        }

        Some(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(status),
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::SERVICE_UNAVAILABLE => Self::ServiceUnavailable,
            other => Self::UnexpectedStatus(other),
        })
    }

    /// Returns how this error can be recovered from.
    #[must_use]
    pub fn recovery(&self) -> RecoveryKind {
        match self {
            Self::Timeout(_) | Self::TransportFailure(_) => RecoveryKind::Retry,
            Self::ServiceUnavailable => RecoveryKind::Unavailable,
            Self::Unauthorized(_) | Self::NotFound | Self::DecodeFailure(_) | Self::UnexpectedStatus(_) => RecoveryKind::Never,
        }
    }

    /// Returns `true` if the client retries this error on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.recovery() == RecoveryKind::Retry
    }

    /// Returns the response status this error stands for.
    ///
    /// [`Error::ServiceUnavailable`] reports `503` whether the server answered with it or the
    /// client failed fast on an unavailable backend. Errors without a response report `None`.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized(status) | Self::UnexpectedStatus(status) => Some(*status),
            Self::NotFound => Some(StatusCode::NOT_FOUND),
            Self::ServiceUnavailable => Some(StatusCode::SERVICE_UNAVAILABLE),
            Self::Timeout(_) | Self::TransportFailure(_) | Self::DecodeFailure(_) => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        Self::TransportFailure(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::DecodeFailure(Arc::new(error))
    }
}

/// A failure reported by a [`Transport`][crate::Transport] when no response was obtained.
///
/// The underlying error, if any, is kept as the [`source`][std::error::Error::source].
#[derive(Clone)]
pub struct TransportError {
    message: Cow<'static, str>,
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl TransportError {
    /// Creates a transport error that wraps the given source error.
    pub fn new(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            message: Cow::Owned(source.to_string()),
            source: Some(Arc::new(source)),
        }
    }

    /// Creates a transport error from a plain message.
    pub fn message(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

impl Debug for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportError")
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|source| source as &(dyn std::error::Error + 'static))
    }
}
