//! Error types for the `broker` crate.
//!
//! Follows the same pattern as the other layers: a root `Error` struct holding an
//! `error_kind` and an optional `source` for chaining. The `web` layer translates
//! each kind into an HTTP status code.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Categories of errors raised by the broker core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No verifiable peer credential was presented.
    Identity,
    /// The asserted identity failed the identity-vs-host check.
    AuthMismatch,
    /// The identity is already bound to a live connection.
    DuplicateConnection,
    /// Upgrade or send failure at the transport layer.
    Transport,
    /// Subscription state was not installed before it was used.
    NotInitialized,
    NotFound,
    /// Malformed request data (empty namespace, unparseable URN, ...).
    Invalid,
}

impl Error {
    pub fn new(error_kind: ErrorKind, message: &str) -> Self {
        Error {
            source: Some(message.to_string().into()),
            error_kind,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error_kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Broker error ({:?}): {}", self.error_kind, source),
            None => write!(f, "Broker error ({:?})", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Helper function to create identity errors.
pub fn identity_error(message: &str) -> Error {
    Error::new(ErrorKind::Identity, message)
}

/// Helper function to create identity-vs-host mismatch errors.
pub fn auth_mismatch_error(message: &str) -> Error {
    Error::new(ErrorKind::AuthMismatch, message)
}

/// Helper function to create duplicate connection errors.
pub fn duplicate_connection_error(message: &str) -> Error {
    Error::new(ErrorKind::DuplicateConnection, message)
}

/// Helper function to create transport errors, keeping the underlying cause.
pub fn transport_error<E>(source: E) -> Error
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    Error {
        source: Some(source.into()),
        error_kind: ErrorKind::Transport,
    }
}

/// Helper function to create not-initialized errors.
pub fn not_initialized_error(message: &str) -> Error {
    Error::new(ErrorKind::NotInitialized, message)
}

/// Helper function to create not-found errors.
pub fn not_found_error(message: &str) -> Error {
    Error::new(ErrorKind::NotFound, message)
}

/// Helper function to create invalid request errors.
pub fn invalid_error(message: &str) -> Error {
    Error::new(ErrorKind::Invalid, message)
}
