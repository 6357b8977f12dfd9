//! Statement results as delivered by a transport.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Describes one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultHeader {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_type: Option<String>,
}

impl ResultHeader {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            original_type: None,
        }
    }
}

/// Execution statistics for a statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultStat {
    pub rows_affected: u64,
    pub rows_read: Option<u64>,
    pub rows_written: Option<u64>,
    pub query_duration_ms: Option<f64>,
}

/// Result of one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    #[serde(default)]
    pub headers: Vec<ResultHeader>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub stat: ResultStat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_insert_rowid: Option<i64>,
}

impl ResultSet {
    /// Builds a result from JSON objects. Non-object values are skipped.
    #[must_use]
    pub fn from_rows(rows: impl IntoIterator<Item = serde_json::Value>) -> Self {
        let rows: Vec<Row> = rows
            .into_iter()
            .filter_map(|value| match value {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        let headers = rows
            .first()
            .map(|row| row.keys().map(ResultHeader::new).collect())
            .unwrap_or_default();
        Self {
            headers,
            rows,
            ..Self::default()
        }
    }

    /// Decodes every row into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteMetadata`] naming `query` and the missing or
    /// malformed field when a row does not fit `T`.
    pub fn decode_rows<T: DeserializeOwned>(&self, query: &'static str) -> Result<Vec<T>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                serde_json::from_value(serde_json::Value::Object(row.clone()))
                    .map_err(|e| Error::incomplete(query, format!("row {idx}: {e}")))
            })
            .collect()
    }
}
