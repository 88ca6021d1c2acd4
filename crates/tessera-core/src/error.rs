use crate::{codec::CodecError, field::FieldError, model::ModelError};
use std::fmt;
use tessera_config::ConfigError;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Declaration and registry surfaces return this; per-field operations
/// return the narrower `FieldError` and convert at the boundary.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without structured detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a model-origin invariant violation.
    pub(crate) fn model_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Model,
            message.into(),
        )
    }

    /// Borrow the field-level detail, if this error came from a field operation.
    #[must_use]
    pub const fn field_error(&self) -> Option<&FieldError> {
        match &self.detail {
            Some(ErrorDetail::Field(err)) => Some(err),
            _ => None,
        }
    }

    /// Borrow the model-level detail, if this error came from declaration.
    #[must_use]
    pub const fn model_error(&self) -> Option<&ModelError> {
        match &self.detail {
            Some(ErrorDetail::Model(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Codec(CodecError),

    #[error("{0}")]
    Config(ConfigError),

    #[error("{0}")]
    Field(FieldError),

    #[error("{0}")]
    Model(ModelError),
}

impl From<CodecError> for InternalError {
    fn from(err: CodecError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::Codec,
            message: err.to_string(),
            detail: Some(ErrorDetail::Codec(err)),
        }
    }
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self {
            class: ErrorClass::Invalid,
            origin: ErrorOrigin::Config,
            message: err.to_string(),
            detail: Some(ErrorDetail::Config(err)),
        }
    }
}

impl From<FieldError> for InternalError {
    fn from(err: FieldError) -> Self {
        Self {
            class: err.class(),
            origin: err.origin(),
            message: err.to_string(),
            detail: Some(ErrorDetail::Field(err)),
        }
    }
}

impl From<ModelError> for InternalError {
    fn from(err: ModelError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::Model,
            message: err.to_string(),
            detail: Some(ErrorDetail::Model(err)),
        }
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Conflict,
    Internal,
    Invalid,
    InvariantViolation,
    NotFound,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Conflict => "conflict",
            Self::Internal => "internal",
            Self::Invalid => "invalid",
            Self::InvariantViolation => "invariant_violation",
            Self::NotFound => "not_found",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Codec,
    Config,
    Field,
    Lookup,
    Model,
    Record,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Codec => "codec",
            Self::Config => "config",
            Self::Field => "field",
            Self::Lookup => "lookup",
            Self::Model => "model",
            Self::Record => "record",
        };
        write!(f, "{label}")
    }
}
