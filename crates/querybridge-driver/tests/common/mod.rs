#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;

use querybridge_driver::prelude::*;

pub async fn sqlite_transport() -> SqliteTransport {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    SqliteTransport::new(pool)
}

pub async fn sqlite_driver() -> SqliteDriver<SqliteTransport> {
    SqliteDriver::new(sqlite_transport().await)
}

pub async fn exec<D: Driver>(driver: &D, sql: &str) -> ResultSet {
    driver
        .query(sql)
        .await
        .unwrap_or_else(|e| panic!("Failed to run: {sql}\nError: {e}"))
}

/// Answers queries from a script keyed by SQL fragments and records every
/// statement it receives.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Vec<(&'static str, ResultSet)>,
    received: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    /// Answers any statement containing `fragment` with `rows`.
    #[must_use]
    pub fn on(mut self, fragment: &'static str, rows: Vec<Value>) -> Self {
        self.script.push((fragment, ResultSet::from_rows(rows)));
        self
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn query(&self, statement: &str) -> Result<ResultSet, TransportError> {
        self.received.lock().unwrap().push(statement.to_string());
        Ok(self
            .script
            .iter()
            .find(|(fragment, _)| statement.contains(fragment))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }

    async fn transaction(&self, statements: &[String]) -> Result<Vec<ResultSet>, TransportError> {
        self.received
            .lock()
            .unwrap()
            .extend(statements.iter().cloned());
        Ok(vec![ResultSet::default(); statements.len()])
    }
}
