//! Error types shared by every driver.
//!
//! Each failure kind is a distinct variant so callers can render an
//! actionable message instead of a generic string.

use crate::flags::Dialect;

/// Failure reported by the transport that carries statements to the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The remote side answered with an error, carried verbatim.
    #[error("{0}")]
    Remote(String),

    /// The channel closed before a response was delivered.
    #[error("Transport closed before a response was delivered")]
    Closed,

    /// The request was failed to make room for newer requests.
    #[error("Request {id} was evicted before a response was delivered")]
    Evicted {
        /// Identifier of the evicted request.
        id: u64,
    },
}

/// Errors produced by drivers, introspection, the type catalog and the
/// schema diff engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Catalog rows are missing fields required to build the schema model.
    #[error("Incomplete metadata from {query} query: {message}")]
    IncompleteMetadata {
        /// Name of the catalog query whose rows were malformed.
        query: &'static str,
        /// What was missing or malformed.
        message: String,
    },

    /// The requested schema change cannot be expressed for this dialect.
    #[error("Unsupported operation for {dialect}: {operation}")]
    UnsupportedOperation {
        /// Human-readable description of the rejected operation.
        operation: String,
        /// Dialect that rejected it.
        dialect: Dialect,
    },

    /// A parameterized column type received malformed parameters.
    #[error("Invalid parameter '{parameter}' for type '{type_name}': {message}")]
    InvalidTypeParameter {
        /// Type being parameterized (e.g. `decimal`).
        type_name: String,
        /// Offending parameter name.
        parameter: String,
        /// Why the value was rejected.
        message: String,
    },
}

impl Error {
    /// Builds an [`Error::UnsupportedOperation`].
    pub fn unsupported(dialect: Dialect, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
            dialect,
        }
    }

    /// Builds an [`Error::IncompleteMetadata`].
    pub fn incomplete(query: &'static str, message: impl Into<String>) -> Self {
        Self::IncompleteMetadata {
            query,
            message: message.into(),
        }
    }

    /// Builds an [`Error::InvalidTypeParameter`].
    pub fn invalid_parameter(
        type_name: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidTypeParameter {
            type_name: type_name.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
