//! PostgreSQL-family driver.

use async_trait::async_trait;

use querybridge_core::dialect::{PostgresDialect, SqlDialect};
use querybridge_core::error::Result;
use querybridge_core::flags::DriverFlags;
use querybridge_core::introspect::postgres;
use querybridge_core::result::ResultSet;
use querybridge_core::schema::{DatabaseSchemas, DatabaseTableSchema, DatabaseTriggerSchema};

use crate::driver::{run_query, run_transaction, table_not_found, Driver};
use crate::transport::Transport;

/// Driver for PostgreSQL and compatible servers.
#[derive(Debug)]
pub struct PostgresDriver<T> {
    transport: T,
    dialect: PostgresDialect,
}

impl<T: Transport> PostgresDriver<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_flags(transport, DriverFlags::postgres())
    }

    #[must_use]
    pub fn with_flags(transport: T, flags: DriverFlags) -> Self {
        Self {
            transport,
            dialect: PostgresDialect::with_flags(flags),
        }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: Transport> Driver for PostgresDriver<T> {
    fn dialect(&self) -> &dyn SqlDialect {
        &self.dialect
    }

    async fn query(&self, statement: &str) -> Result<ResultSet> {
        run_query(&self.transport, statement).await
    }

    async fn transaction(&self, statements: &[String]) -> Result<Vec<ResultSet>> {
        run_transaction(&self.transport, statements).await
    }

    async fn schemas(&self) -> Result<DatabaseSchemas> {
        let schemas = run_query(&self.transport, &postgres::schemas_sql()).await?;
        let tables = run_query(&self.transport, &postgres::tables_sql()).await?;
        let columns = run_query(&self.transport, &postgres::columns_sql()).await?;
        let primary_keys = run_query(&self.transport, &postgres::primary_keys_sql()).await?;
        let constraints = run_query(&self.transport, &postgres::constraints_sql()).await?;
        let triggers = run_query(&self.transport, &postgres::triggers_sql()).await?;
        postgres::build_schemas(postgres::CatalogListings {
            schemas: &schemas,
            tables: &tables,
            columns: &columns,
            primary_keys: &primary_keys,
            constraints: &constraints,
            triggers: &triggers,
        })
    }

    async fn table_schema(
        &self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<DatabaseTableSchema> {
        let columns = run_query(
            &self.transport,
            &postgres::table_columns_sql(schema_name, table_name),
        )
        .await?;
        let primary_key = run_query(
            &self.transport,
            &postgres::table_primary_key_sql(schema_name, table_name),
        )
        .await?;
        let constraints = run_query(
            &self.transport,
            &postgres::table_constraints_sql(schema_name, table_name),
        )
        .await?;
        let table = postgres::build_table_schema(
            schema_name,
            table_name,
            &columns,
            &primary_key,
            &constraints,
        )?;
        if table.columns.is_empty() {
            return Err(table_not_found(
                postgres::COLUMNS_QUERY,
                schema_name,
                table_name,
            ));
        }
        Ok(table)
    }

    async fn trigger(&self, schema_name: &str, name: &str) -> Result<DatabaseTriggerSchema> {
        let result = run_query(&self.transport, &postgres::trigger_sql(schema_name, name)).await?;
        postgres::build_trigger(&result)
    }

    async fn current_schema(&self) -> Result<Option<String>> {
        let result = run_query(&self.transport, postgres::CURRENT_SCHEMA_SQL).await?;
        postgres::current_schema(&result)
    }
}
