use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for quilt operations.
///
/// Each kind describes one category of failure so that callers can match on
/// the reason for a rejected call. Note that a missing collection is *not* an
/// error kind: reads and removes against an absent collection yield empty
/// results or a zero count, and writes create the collection implicitly.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// An `_id` already exists in the target collection.
    DuplicateKey,
    /// A document failed constraint enforcement at write time. The error
    /// message names the offending path and constraint kind.
    ConstraintViolation,
    /// A `$type` constraint with a different category already exists on the
    /// same path.
    ConstraintConflict,
    /// Malformed query, sort, constraint or path specification.
    InvalidSpec,
    /// Fresh id generation kept colliding and ran out of attempts.
    IdGenerationExhausted,
    /// Internal error (usually indicates a bug).
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::DuplicateKey => write!(f, "Duplicate key"),
            ErrorKind::ConstraintViolation => write!(f, "Constraint violation"),
            ErrorKind::ConstraintConflict => write!(f, "Constraint conflict"),
            ErrorKind::InvalidSpec => write!(f, "Invalid specification"),
            ErrorKind::IdGenerationExhausted => write!(f, "Id generation exhausted"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom quilt error type.
///
/// `QuiltError` carries the error message, its [ErrorKind], an optional cause
/// for error chaining, and a backtrace captured at construction time.
#[derive(Clone)]
pub struct QuiltError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<QuiltError>>,
    backtrace: Atomic<Backtrace>,
}

impl QuiltError {
    /// Creates a new `QuiltError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        QuiltError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `QuiltError` with a cause error attached, preserving the
    /// chain for debugging.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: QuiltError) -> Self {
        QuiltError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&Box<QuiltError>> {
        self.cause.as_ref()
    }
}

impl Display for QuiltError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for QuiltError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for QuiltError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for quilt operations.
///
/// `QuiltResult<T>` is shorthand for `Result<T, QuiltError>`. All fallible
/// operations in this crate return this type.
pub type QuiltResult<T> = Result<T, QuiltError>;

impl From<serde_json::Error> for QuiltError {
    fn from(err: serde_json::Error) -> Self {
        QuiltError::new(&format!("JSON parse error: {}", err), ErrorKind::InvalidSpec)
    }
}

impl From<String> for QuiltError {
    fn from(msg: String) -> Self {
        QuiltError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for QuiltError {
    fn from(msg: &str) -> Self {
        QuiltError::new(msg, ErrorKind::InternalError)
    }
}
