//! Error types for the vigil collaborators.
//!
//! This module provides the errors raised *outside* the dispatch core:
//!
//! - [`BuildError`] - A pipeline could not be built from a policy
//! - [`StoreError`] - A policy could not be read from the store
//! - [`ParseError`] - Raw text could not be decoded into an [`Event`]
//! - [`FieldError`] - A field path could not be written on an event
//!
//! [`Event`]: crate::Event

use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while building a pipeline from a named policy.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The policy could not be read from the store.
    #[error("policy store error: {0}")]
    Store(#[from] StoreError),

    /// A stage references a kind that no factory provides.
    #[error("stage '{stage}' has unknown kind '{kind}'")]
    UnknownStage {
        /// Name of the offending stage.
        stage: String,
        /// The unresolved kind.
        kind: String,
    },

    /// A stage definition carries invalid parameters.
    #[error("stage '{stage}' is invalid: {reason}")]
    InvalidStage {
        /// Name of the offending stage.
        stage: String,
        /// Human readable reason.
        reason: String,
    },

    /// The policy defines no stages at all.
    #[error("policy '{0}' has no stages")]
    EmptyPolicy(String),

    /// A custom builder error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors that can occur while reading policies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No policy with this name exists.
    #[error("policy not found: {0}")]
    NotFound(String),

    /// The stored policy is malformed.
    #[error("policy '{name}' is invalid: {reason}")]
    Invalid {
        /// Policy name.
        name: String,
        /// Human readable reason.
        reason: String,
    },
}

/// Errors that can occur while decoding raw text into an event.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The input was empty or blank.
    #[error("empty event")]
    Empty,

    /// The input does not follow the expected layout.
    #[error("malformed event: {0}")]
    Malformed(String),

    /// The decoded document has no usable subject.
    #[error("event has no subject at '{0}'")]
    MissingSubject(String),

    /// The payload is not valid JSON.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while writing a field on an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The path is not a JSON pointer.
    #[error("invalid field path '{0}'")]
    InvalidPath(String),

    /// An intermediate value is not an object.
    #[error("cannot descend into '{0}': not an object")]
    NotAnObject(String),
}

impl From<BoxError> for BuildError {
    fn from(err: BoxError) -> Self {
        BuildError::Custom(err)
    }
}
