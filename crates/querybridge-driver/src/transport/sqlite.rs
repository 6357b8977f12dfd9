//! In-process SQLite transport backed by an `sqlx` pool.

use std::time::Instant;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Either, Executor, Row, Sqlite, TypeInfo, ValueRef};
use tracing::debug;

use querybridge_core::result::{ResultHeader, ResultSet};
use querybridge_core::TransportError;

use super::Transport;

/// Runs statements on a SQLite database through an `sqlx` pool.
#[derive(Debug, Clone)]
pub struct SqliteTransport {
    pool: SqlitePool,
}

impl SqliteTransport {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a single-connection pool on `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Remote`] when the database cannot be opened.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(remote)?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[allow(clippy::needless_pass_by_value)]
fn remote(error: sqlx::Error) -> TransportError {
    TransportError::Remote(error.to_string())
}

async fn run<'c, E>(executor: E, statement: &str) -> Result<ResultSet, sqlx::Error>
where
    E: Executor<'c, Database = Sqlite>,
{
    debug!(sql = %statement, "Executing SQL");
    let started = Instant::now();
    let mut result = ResultSet::default();
    let mut stream = executor.fetch_many(sqlx::query(statement));
    while let Some(step) = stream.try_next().await? {
        match step {
            Either::Left(done) => {
                result.stat.rows_affected += done.rows_affected();
                if done.rows_affected() > 0 {
                    result.last_insert_rowid = Some(done.last_insert_rowid());
                }
            }
            Either::Right(row) => {
                if result.headers.is_empty() {
                    result.headers = headers(&row);
                }
                result.rows.push(row_to_json(&row)?);
            }
        }
    }
    result.stat.rows_read = Some(result.rows.len() as u64);
    result.stat.query_duration_ms = Some(started.elapsed().as_secs_f64() * 1000.0);
    Ok(result)
}

fn headers(row: &SqliteRow) -> Vec<ResultHeader> {
    row.columns()
        .iter()
        .map(|column| {
            let mut header = ResultHeader::new(column.name());
            let declared = column.type_info().name();
            if declared != "NULL" {
                header.original_type = Some(declared.to_string());
            }
            header
        })
        .collect()
}

/// Decodes by the storage class of each value, not the declared type.
fn row_to_json(row: &SqliteRow) -> Result<querybridge_core::result::Row, sqlx::Error> {
    let mut object = querybridge_core::result::Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            serde_json::Value::Null
        } else {
            let storage = raw.type_info().name().to_ascii_uppercase();
            match storage.as_str() {
                "INTEGER" | "BOOLEAN" => {
                    serde_json::Value::from(row.try_get_unchecked::<i64, _>(idx)?)
                }
                "REAL" => serde_json::Value::from(row.try_get_unchecked::<f64, _>(idx)?),
                "BLOB" => serde_json::Value::from(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
                _ => serde_json::Value::from(row.try_get_unchecked::<String, _>(idx)?),
            }
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}

#[async_trait]
impl Transport for SqliteTransport {
    async fn query(&self, statement: &str) -> Result<ResultSet, TransportError> {
        run(&self.pool, statement).await.map_err(remote)
    }

    async fn transaction(&self, statements: &[String]) -> Result<Vec<ResultSet>, TransportError> {
        let mut tx = self.pool.begin().await.map_err(remote)?;
        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            // Dropping `tx` on error rolls back.
            results.push(run(&mut *tx, statement).await.map_err(remote)?);
        }
        tx.commit().await.map_err(remote)?;
        Ok(results)
    }
}
