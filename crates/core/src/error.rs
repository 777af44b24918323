//! The error taxonomy for generation operations.

use std::error::Error as StdError;
use std::fmt::{self, Display};

use objgen_model::ModelProviderError;

use crate::schema::SchemaError;

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request was malformed; detected before any transport call.
    Configuration,
    /// The transport failed, either with a non-retryable error or
    /// after the retry budget was spent.
    RequestFailed,
    /// The model output did not conform to the requested schema.
    /// Resubmitting the same request is not going to help, so this is
    /// never retried.
    TypeValidation,
    /// A step was submitted while a prior tool call was unresolved.
    MissingToolResult,
    /// The caller aborted the request.
    Aborted,
    /// The request did not complete within the configured deadline.
    Timeout,
}

/// The error type for generation operations.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    raw_text: Option<String>,
    schema_error: Option<SchemaError>,
    tool_call_id: Option<String>,
    source: Option<Box<dyn ModelProviderError>>,
}

impl Error {
    fn bare(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            raw_text: None,
            schema_error: None,
            tool_call_id: None,
            source: None,
        }
    }

    /// Creates a new error with the `Configuration` kind.
    #[inline]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        let mut err = Self::bare(ErrorKind::Configuration);
        err.message = Some(message.into());
        err
    }

    /// Creates a new error with the `RequestFailed` kind, wrapping the
    /// last transport error.
    #[inline]
    pub fn request_failed(source: Box<dyn ModelProviderError>) -> Self {
        let mut err = Self::bare(ErrorKind::RequestFailed);
        err.source = Some(source);
        err
    }

    /// Creates a new error with the `TypeValidation` kind, carrying
    /// the raw model output and the structural mismatch description.
    #[inline]
    pub fn type_validation<S: Into<String>>(
        raw_text: S,
        schema_error: SchemaError,
    ) -> Self {
        let mut err = Self::bare(ErrorKind::TypeValidation);
        err.raw_text = Some(raw_text.into());
        err.schema_error = Some(schema_error);
        err
    }

    /// Creates a new error with the `MissingToolResult` kind, naming
    /// the unresolved tool call.
    #[inline]
    pub fn missing_tool_result<S: Into<String>>(tool_call_id: S) -> Self {
        let mut err = Self::bare(ErrorKind::MissingToolResult);
        err.tool_call_id = Some(tool_call_id.into());
        err
    }

    /// Creates a new error with the `Aborted` kind.
    #[inline]
    pub fn aborted() -> Self {
        Self::bare(ErrorKind::Aborted)
    }

    /// Creates a new error with the `Timeout` kind.
    #[inline]
    pub fn timeout() -> Self {
        Self::bare(ErrorKind::Timeout)
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the raw model output, for `TypeValidation` errors.
    #[inline]
    pub fn raw_text(&self) -> Option<&str> {
        self.raw_text.as_deref()
    }

    /// Returns the structural mismatch description, for
    /// `TypeValidation` errors.
    #[inline]
    pub fn schema_error(&self) -> Option<&SchemaError> {
        self.schema_error.as_ref()
    }

    /// Returns the unresolved tool call id, for `MissingToolResult`
    /// errors.
    #[inline]
    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Configuration => {
                write!(f, "invalid request configuration")?;
            }
            ErrorKind::RequestFailed => {
                write!(f, "request failed")?;
            }
            ErrorKind::TypeValidation => {
                write!(f, "model output failed schema validation")?;
            }
            ErrorKind::MissingToolResult => {
                write!(f, "unresolved tool call")?;
            }
            ErrorKind::Aborted => {
                write!(f, "request aborted by the caller")?;
            }
            ErrorKind::Timeout => {
                write!(f, "request timed out")?;
            }
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(id) = &self.tool_call_id {
            write!(f, ": {id}")?;
        }
        if let Some(schema_error) = &self.schema_error {
            write!(f, ": {schema_error}")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn StdError + 'static))
    }
}
