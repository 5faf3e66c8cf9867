//! Normalizer errors.
use displaydoc::Display;
use serde::Serialize;
use thiserror::Error;

use crate::json_ext::Path;

/// Error types for normalization.
///
/// Any of these aborts the whole run: chunks that were already handed to a
/// consumer before the failure must be discarded.
#[derive(Error, Display, Debug, Clone, Serialize, Eq, PartialEq)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum NormalizeError {
    /// response root must be an object, found {found}
    InvalidRoot {
        /// JSON type found at the root.
        found: &'static str,
    },

    /// expected an object at '{path}', found {found}
    ExpectedObject {
        /// Location of the value in the response.
        path: Path,
        /// JSON type found instead.
        found: &'static str,
    },

    /// expected a list at '{path}', found {found}
    ExpectedList {
        /// Location of the value in the response.
        path: Path,
        /// JSON type found instead.
        found: &'static str,
    },

    /// cannot derive an identity at '{path}': {reason}
    InvalidIdentifier {
        /// Location of the object in the response.
        path: Path,
        /// Why the identifier is unusable.
        reason: String,
    },

    /// missing typename at '{path}': the object has no '{field}' and the selection declares no concrete type
    MissingTypename {
        /// Location of the object in the response.
        path: Path,
        /// The typename field that was looked up.
        field: String,
    },

    /// cannot evaluate type condition '{condition}' at '{path}': the response carries no type information
    UndecidableTypeCondition {
        /// The abstract type of the condition.
        condition: String,
        /// Location of the object in the response.
        path: Path,
    },

    /// chunk consumer stopped accepting chunks: {reason}
    Sink {
        /// Why the consumer failed.
        reason: String,
    },

    /// normalization stopped before completing: {reason}
    Interrupted {
        /// Why the run ended early.
        reason: String,
    },
}

impl NormalizeError {
    /// Whether this error describes a response that does not match its selection shape.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(
            self,
            NormalizeError::InvalidRoot { .. }
                | NormalizeError::ExpectedObject { .. }
                | NormalizeError::ExpectedList { .. }
                | NormalizeError::InvalidIdentifier { .. }
                | NormalizeError::MissingTypename { .. }
        )
    }
}

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not deserialize configuration: {0}
    DeserializeConfigError(serde_yaml::Error),
    /// could not read configuration file: {0}
    CannotReadFile(std::io::Error),
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
}
