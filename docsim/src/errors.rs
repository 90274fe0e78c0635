use backtrace::Backtrace;
use serde::{de, ser};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for docsim operations.
///
/// Every engine failure falls into one of these categories. Each kind carries a
/// stable numeric code and code name so that the operation boundary can tag
/// replies the same way a document database server would.
///
/// # Examples
///
/// ```rust,ignore
/// use docsim::errors::{DocsimError, ErrorKind, DocsimResult};
///
/// fn example() -> DocsimResult<()> {
///     Err(DocsimError::new("duplicate _id", ErrorKind::DuplicateKey))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Malformed filter, update, pipeline or document
    ValidationError,
    /// Unique `_id` violation
    DuplicateKey,
    /// Operator applied to an incompatible existing value
    TypeMismatch,
    /// Attempt to modify `_id`
    ImmutableField,
    /// Unrecognized `$` operator or pipeline stage
    UnknownOperator,
    /// Inclusion and exclusion mixed in one projection
    ProjectionConflict,
    /// Cursor modifier applied after consumption began, or on a closed cursor
    CursorInUse,
    /// Negative skip/limit, malformed regex and similar bad arguments
    InvalidArgument,
    /// Bad identifier hex string
    InvalidIdentifier,
    /// Index does not exist
    IndexNotFound,
    /// The operation is not valid in the current context
    InvalidOperation,
    /// Error encoding or decoding the interchange form
    EncodingError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl ErrorKind {
    /// Numeric code reported in error replies.
    pub fn code(&self) -> i64 {
        match self {
            ErrorKind::ValidationError => 9,
            ErrorKind::DuplicateKey => 11000,
            ErrorKind::TypeMismatch => 14,
            ErrorKind::ImmutableField => 66,
            ErrorKind::UnknownOperator => 2,
            ErrorKind::ProjectionConflict => 31254,
            ErrorKind::CursorInUse => 17,
            ErrorKind::InvalidArgument => 2,
            ErrorKind::InvalidIdentifier => 9,
            ErrorKind::IndexNotFound => 27,
            ErrorKind::InvalidOperation => 72,
            ErrorKind::EncodingError => 22,
            ErrorKind::InternalError => 1,
        }
    }

    /// Code name reported in error replies.
    pub fn code_name(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "FailedToParse",
            ErrorKind::DuplicateKey => "DuplicateKey",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::ImmutableField => "ImmutableField",
            ErrorKind::UnknownOperator => "BadValue",
            ErrorKind::ProjectionConflict => "Location31254",
            ErrorKind::CursorInUse => "CursorInUse",
            ErrorKind::InvalidArgument => "BadValue",
            ErrorKind::InvalidIdentifier => "InvalidIdentifier",
            ErrorKind::IndexNotFound => "IndexNotFound",
            ErrorKind::InvalidOperation => "InvalidOptions",
            ErrorKind::EncodingError => "InvalidBSON",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::DuplicateKey => write!(f, "Duplicate key error"),
            ErrorKind::TypeMismatch => write!(f, "Type mismatch"),
            ErrorKind::ImmutableField => write!(f, "Immutable field"),
            ErrorKind::UnknownOperator => write!(f, "Unknown operator"),
            ErrorKind::ProjectionConflict => write!(f, "Projection conflict"),
            ErrorKind::CursorInUse => write!(f, "Cursor in use"),
            ErrorKind::InvalidArgument => write!(f, "Invalid argument"),
            ErrorKind::InvalidIdentifier => write!(f, "Invalid identifier"),
            ErrorKind::IndexNotFound => write!(f, "Index not found"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom docsim error type.
///
/// `DocsimError` carries the error message, its kind, an optional cause and the
/// backtrace captured at construction time.
///
/// # Examples
///
/// ```rust,ignore
/// use docsim::errors::{DocsimError, ErrorKind};
///
/// let err = DocsimError::new("unknown operator: $foo", ErrorKind::UnknownOperator);
///
/// let cause = DocsimError::new("bad hex", ErrorKind::InvalidIdentifier);
/// let err = DocsimError::new_with_cause("invalid $oid", ErrorKind::ValidationError, cause);
/// ```
#[derive(Clone)]
pub struct DocsimError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocsimError>>,
    backtrace: Arc<Backtrace>,
}

impl DocsimError {
    /// Creates a new `DocsimError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocsimError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `DocsimError` that keeps `cause` in its error chain.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocsimError) -> Self {
        DocsimError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DocsimError> {
        self.cause.as_deref()
    }
}

impl Display for DocsimError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocsimError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for DocsimError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for docsim operations.
pub type DocsimResult<T> = Result<T, DocsimError>;

impl de::Error for DocsimError {
    fn custom<T: Display>(msg: T) -> Self {
        DocsimError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

impl ser::Error for DocsimError {
    fn custom<T: Display>(msg: T) -> Self {
        DocsimError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

impl From<serde_json::Error> for DocsimError {
    fn from(err: serde_json::Error) -> Self {
        DocsimError::new(&format!("JSON error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<base64::DecodeError> for DocsimError {
    fn from(err: base64::DecodeError) -> Self {
        DocsimError::new(&format!("Base64 decoding error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<std::num::ParseIntError> for DocsimError {
    fn from(err: std::num::ParseIntError) -> Self {
        DocsimError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::InvalidArgument,
        )
    }
}

impl From<regex::Error> for DocsimError {
    fn from(err: regex::Error) -> Self {
        DocsimError::new(&format!("Invalid regular expression: {}", err), ErrorKind::InvalidArgument)
    }
}

impl From<String> for DocsimError {
    fn from(msg: String) -> Self {
        DocsimError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for DocsimError {
    fn from(msg: &str) -> Self {
        DocsimError::new(msg, ErrorKind::InternalError)
    }
}
