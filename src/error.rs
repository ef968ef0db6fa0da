// Core error taxonomy shared by auth, query and resource services
use thiserror::Error;

use crate::database::models::ResourceKind;
use crate::database::StoreError;

/// Why a caller could not be authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No credentials at all, or not a Bearer scheme
    MissingCredentials,
    /// Bearer token present but bad signature, malformed, expired, unknown or revoked
    InvalidToken,
    /// Token request with unknown client id or wrong secret
    InvalidClient,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::MissingCredentials => write!(f, "missing bearer credentials"),
            AuthFailure::InvalidToken => write!(f, "invalid or expired access token"),
            AuthFailure::InvalidClient => write!(f, "invalid client credentials"),
        }
    }
}

/// What failed validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    InvalidScope(String),
    InvalidField { field: String, reason: String },
    Rule(String),
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationFailure::InvalidScope(scope) => {
                write!(f, "scope '{}' is not allowed for this client", scope)
            }
            ValidationFailure::InvalidField { field, reason } => write!(f, "{}: {}", field, reason),
            ValidationFailure::Rule(msg) => write!(f, "{}", msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Unauthenticated(AuthFailure),

    #[error("insufficient scope, required: {required}")]
    Forbidden { required: String },

    #[error("{kind} with sourcedId '{id}' not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{kind} with sourcedId '{id}' already exists")]
    Conflict { kind: ResourceKind, id: String },

    #[error("an active {kind} with the same {fields} already exists")]
    DuplicateKey { kind: ResourceKind, fields: String },

    #[error("{0}")]
    ValidationFailed(ValidationFailure),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ValidationFailed(ValidationFailure::InvalidField {
            field: field.into(),
            reason: reason.into(),
        })
    }

    pub fn rule(message: impl Into<String>) -> Self {
        Error::ValidationFailed(ValidationFailure::Rule(message.into()))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        // Duplicate is mapped to Conflict by the caller, which knows the id
        match err {
            StoreError::Rejected(inner) => *inner,
            StoreError::UniqueViolation { kind, fields } => Error::DuplicateKey { kind, fields },
            other => {
                tracing::error!("record store failure: {}", other);
                Error::Internal(other.to_string())
            }
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::error!("token signing failure: {}", err);
        Error::Internal(format!("token signing failed: {}", err))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
