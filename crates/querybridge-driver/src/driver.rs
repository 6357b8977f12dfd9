//! The driver contract shared by every dialect.

use async_trait::async_trait;
use tracing::{debug, info};

use querybridge_core::catalog::ColumnTypeSelector;
use querybridge_core::change::DatabaseTableSchemaChange;
use querybridge_core::dialect::SqlDialect;
use querybridge_core::diff::{self, SchemaChangePlan};
use querybridge_core::error::{Error, Result};
use querybridge_core::flags::DriverFlags;
use querybridge_core::result::ResultSet;
use querybridge_core::schema::{DatabaseSchemas, DatabaseTableSchema, DatabaseTriggerSchema};
use querybridge_core::value::SqlValue;

use crate::transport::Transport;

/// A database as seen by a client: statements in, results out, plus
/// catalog introspection and schema-change planning for its dialect.
///
/// Concrete drivers compose a [`Transport`] with a core [`SqlDialect`];
/// the dialect-only operations default to it.
#[async_trait]
pub trait Driver: Send + Sync {
    /// SQL dialect of the database.
    fn dialect(&self) -> &dyn SqlDialect;

    /// Runs one statement. No retries.
    async fn query(&self, statement: &str) -> Result<ResultSet>;

    /// Runs `statements` atomically.
    async fn transaction(&self, statements: &[String]) -> Result<Vec<ResultSet>>;

    /// Every non-system schema with its tables, views and triggers.
    async fn schemas(&self) -> Result<DatabaseSchemas>;

    /// One table with its columns in ordinal order.
    async fn table_schema(
        &self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<DatabaseTableSchema>;

    /// Definition of one trigger.
    async fn trigger(&self, schema_name: &str, name: &str) -> Result<DatabaseTriggerSchema>;

    /// Schema unqualified names resolve against.
    async fn current_schema(&self) -> Result<Option<String>>;

    fn escape_id(&self, identifier: &str) -> String {
        self.dialect().escape_id(identifier)
    }

    fn escape_value(&self, value: &SqlValue) -> String {
        self.dialect().escape_value(value)
    }

    fn flags(&self) -> &DriverFlags {
        self.dialect().flags()
    }

    fn column_type_selector(&self) -> &ColumnTypeSelector {
        self.dialect().column_type_selector()
    }

    /// Plans the DDL for `change` without running it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] when the dialect cannot
    /// express the change.
    fn plan_table_schema_change(
        &self,
        change: &DatabaseTableSchemaChange,
    ) -> Result<SchemaChangePlan> {
        diff::plan_table_schema_change(self.dialect(), change)
    }

    /// The ordered DDL statements for `change`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] when the dialect cannot
    /// express the change.
    fn create_update_table_schema(
        &self,
        change: &DatabaseTableSchemaChange,
    ) -> Result<Vec<String>> {
        self.plan_table_schema_change(change)
            .map(|plan| plan.statements)
    }

    /// Plans `change` and runs the statements in one transaction.
    ///
    /// # Errors
    ///
    /// Returns the planning error, or the transport error when a statement
    /// fails. Nothing is applied in either case.
    async fn apply_table_schema_change(
        &self,
        change: &DatabaseTableSchemaChange,
    ) -> Result<SchemaChangePlan> {
        let plan = self.plan_table_schema_change(change)?;
        let table = change.new_name().unwrap_or_default();
        if plan.is_empty() {
            debug!(table = %table, "Schema change has no statements");
            return Ok(plan);
        }
        for statement in &plan.statements {
            debug!(table = %table, sql = %statement, "Queued schema statement");
        }
        self.transaction(&plan.statements).await?;
        info!(
            table = %table,
            strategy = ?plan.strategy,
            statements = plan.statements.len(),
            "Applied schema change"
        );
        Ok(plan)
    }
}

// ================================================================
// Shared helpers
// ================================================================

pub(crate) async fn run_query<T: Transport + ?Sized>(
    transport: &T,
    statement: &str,
) -> Result<ResultSet> {
    debug!(sql = %statement, "Running catalog query");
    Ok(transport.query(statement).await?)
}

pub(crate) async fn run_transaction<T: Transport + ?Sized>(
    transport: &T,
    statements: &[String],
) -> Result<Vec<ResultSet>> {
    debug!(statements = statements.len(), "Running transaction");
    Ok(transport.transaction(statements).await?)
}

/// Error for a table the catalog does not list.
pub(crate) fn table_not_found(query: &'static str, schema_name: &str, table_name: &str) -> Error {
    Error::incomplete(
        query,
        format!("table '{schema_name}.{table_name}' has no columns or does not exist"),
    )
}
