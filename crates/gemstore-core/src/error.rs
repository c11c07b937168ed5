//! Error taxonomy shared by the store, the query builder, and the repositories.
//!
//! Every repository operation returns [`Result`]. The HTTP layer maps the
//! variants onto status codes: [`Error::Validation`] → 400,
//! [`Error::NotFound`] → 404, [`Error::Query`] and [`Error::Store`] → 500.
//!
//! Category-index failures use their own type ([`crate::index::IndexError`])
//! because they are logged and never returned to the caller.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input, detected before any write.
    #[error("{0}")]
    Validation(FieldErrors),

    /// The addressed or referenced document does not exist.
    #[error("{entity} not found")]
    NotFound { entity: String, id: String },

    /// The store rejected the query (bad field path, unsupported ordering).
    #[error("query rejected: {0}")]
    Query(String),

    /// The underlying store call failed.
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Shorthand for a validation failure with no per-field detail.
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::Validation(FieldErrors::new(message))
    }
}

impl From<FieldErrors> for Error {
    fn from(errors: FieldErrors) -> Self {
        Error::Validation(errors)
    }
}

/// A validation failure: a summary message plus optional per-field reasons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl FieldErrors {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: &str, reason: impl Into<String>) -> Self {
        self.fields.insert(field.to_string(), reason.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
