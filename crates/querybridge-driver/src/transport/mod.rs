//! Statement transports.
//!
//! A [`Transport`] carries SQL to a database and brings back
//! [`ResultSet`]s. Drivers never talk to a database any other way, so the
//! same driver works over an in-process pool, a message channel to another
//! process, or a scripted fake in tests.

mod channel;
mod sqlite;
mod tracker;

pub use channel::{ChannelTransport, Responder};
pub use sqlite::SqliteTransport;
pub use tracker::RequestTracker;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use querybridge_core::result::ResultSet;
use querybridge_core::TransportError;

/// Carries statements to a database.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Runs one statement.
    async fn query(&self, statement: &str) -> Result<ResultSet, TransportError>;

    /// Runs `statements` as one atomic unit, returning one result per
    /// statement.
    async fn transaction(&self, statements: &[String]) -> Result<Vec<ResultSet>, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn query(&self, statement: &str) -> Result<ResultSet, TransportError> {
        (**self).query(statement).await
    }

    async fn transaction(&self, statements: &[String]) -> Result<Vec<ResultSet>, TransportError> {
        (**self).transaction(statements).await
    }
}

// ================================================================
// Messages
// ================================================================

/// Request sent over a message channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportRequest {
    Query { id: u64, statement: String },
    Transaction { id: u64, statements: Vec<String> },
}

impl TransportRequest {
    /// Correlation id of the request.
    #[must_use]
    pub const fn id(&self) -> u64 {
        match self {
            Self::Query { id, .. } | Self::Transaction { id, .. } => *id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Query { .. } => "query",
            Self::Transaction { .. } => "transaction",
        }
    }
}

/// Payload of a successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    Transaction(Vec<ResultSet>),
    Query(ResultSet),
}

/// Response correlated to a [`TransportRequest`] by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransportResponse {
    #[must_use]
    pub const fn ok(id: u64, data: ResponseData) -> Self {
        Self {
            id,
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Splits the response into its payload or the remote error.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Remote`] carrying the error message, or
    /// describing a response that has neither data nor error.
    pub fn into_result(self) -> Result<ResponseData, TransportError> {
        match (self.error, self.data) {
            (Some(message), _) => Err(TransportError::Remote(message)),
            (None, Some(data)) => Ok(data),
            (None, None) => Err(TransportError::Remote(format!(
                "response {} carries neither data nor error",
                self.id
            ))),
        }
    }
}
