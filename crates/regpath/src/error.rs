//! Error types for regpath
//!
//! Every failure is one of two things:
//! - a path that names no known root ([`Error::InvalidRoot`]), raised while
//!   parsing and independent of any backend call
//! - an [`OperationError`], classified by operation kind and target kind, and
//!   carrying the native failure that caused it when there is one

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias using regpath's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// regpath error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The first path segment is neither a root name nor a root alias.
    #[error("invalid root key: {0:?}")]
    InvalidRoot(String),

    /// A registry operation failed.
    #[error(transparent)]
    Operation(#[from] OperationError),
}

impl Error {
    /// The operation error, if this is one.
    pub fn as_operation(&self) -> Option<&OperationError> {
        match self {
            Error::Operation(err) => Some(err),
            Error::InvalidRoot(_) => None,
        }
    }
}

/// What the failing call was trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Opening a key, reading a value, or enumerating.
    OnRead,
    /// Creating a key or writing a value that did not exist.
    OnCreate,
    /// Overwriting an existing value.
    OnUpdate,
    /// Deleting a key or a value.
    OnDelete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::OnRead => "read",
            OperationKind::OnCreate => "create",
            OperationKind::OnUpdate => "update",
            OperationKind::OnDelete => "delete",
        };
        f.write_str(s)
    }
}

/// What the failing call was operating on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Subkey,
    Value,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Subkey => f.write_str("subkey"),
            TargetKind::Value => f.write_str("value"),
        }
    }
}

/// Why an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Precondition: the subkey or value is already there.
    AlreadyExists,
    /// Precondition: the subkey or value is missing.
    DoesNotExist,
    /// Non-recursive delete of a key that still has subkeys.
    NotEmpty,
    /// The subkey name has no path segments, so it names the key itself.
    InvalidName,
    /// The backend call failed; see [`OperationError::native`].
    Native,
}

/// A failed registry operation.
///
/// The native failure, when present, is kept as the error source.
#[derive(Error, Debug)]
#[error("{operation} {target} failed: {message}")]
pub struct OperationError {
    operation: OperationKind,
    target: TargetKind,
    reason: FailureReason,
    message: String,
    #[source]
    source: Option<io::Error>,
}

impl OperationError {
    /// Wrap a native failure.
    pub fn native(
        operation: OperationKind,
        target: TargetKind,
        message: impl Into<String>,
        source: io::Error,
    ) -> Self {
        Self {
            operation,
            target,
            reason: FailureReason::Native,
            message: message.into(),
            source: Some(source),
        }
    }

    /// A failure detected by this crate without calling the backend.
    pub fn precondition(
        operation: OperationKind,
        target: TargetKind,
        reason: FailureReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            target,
            reason,
            message: message.into(),
            source: None,
        }
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn target(&self) -> TargetKind {
        self.target
    }

    pub fn reason(&self) -> FailureReason {
        self.reason
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying native failure, if the backend was involved.
    pub fn native_error(&self) -> Option<&io::Error> {
        self.source.as_ref()
    }

    /// True for a "does not exist" precondition or a native not-found failure.
    pub fn is_not_found(&self) -> bool {
        match self.reason {
            FailureReason::DoesNotExist => true,
            FailureReason::Native => self
                .source
                .as_ref()
                .is_some_and(|e| e.kind() == io::ErrorKind::NotFound),
            _ => false,
        }
    }
}
