//! MySQL-family driver.

use async_trait::async_trait;

use querybridge_core::dialect::{MySqlDialect, SqlDialect};
use querybridge_core::error::{Error, Result};
use querybridge_core::flags::DriverFlags;
use querybridge_core::introspect::mysql;
use querybridge_core::result::ResultSet;
use querybridge_core::schema::{DatabaseSchemas, DatabaseTableSchema, DatabaseTriggerSchema};

use crate::driver::{run_query, run_transaction, table_not_found, Driver};
use crate::transport::Transport;

/// Driver for MySQL, MariaDB and compatible servers.
#[derive(Debug)]
pub struct MySqlDriver<T> {
    transport: T,
    dialect: MySqlDialect,
}

impl<T: Transport> MySqlDriver<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_flags(transport, DriverFlags::mysql())
    }

    #[must_use]
    pub fn with_flags(transport: T, flags: DriverFlags) -> Self {
        Self {
            transport,
            dialect: MySqlDialect::with_flags(flags),
        }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: Transport> Driver for MySqlDriver<T> {
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
        let schemas = run_query(&self.transport, &mysql::schemas_sql()).await?;
        let tables = run_query(&self.transport, &mysql::tables_sql()).await?;
        let columns = run_query(&self.transport, &mysql::columns_sql()).await?;
        let constraints = run_query(&self.transport, &mysql::constraints_sql()).await?;
        mysql::build_schemas(&schemas, &tables, &columns, &constraints)
    }

    async fn table_schema(
        &self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<DatabaseTableSchema> {
        let columns = run_query(
            &self.transport,
            &mysql::table_columns_sql(schema_name, table_name),
        )
        .await?;
        let constraints = run_query(
            &self.transport,
            &mysql::table_constraints_sql(schema_name, table_name),
        )
        .await?;
        let table = mysql::build_table_schema(schema_name, table_name, &columns, &constraints)?;
        if table.columns.is_empty() {
            return Err(table_not_found(
                mysql::COLUMNS_QUERY,
                schema_name,
                table_name,
            ));
        }
        Ok(table)
    }

    async fn trigger(&self, _schema_name: &str, name: &str) -> Result<DatabaseTriggerSchema> {
        Err(Error::unsupported(
            self.dialect.dialect(),
            format!("read the definition of trigger '{name}'"),
        ))
    }

    async fn current_schema(&self) -> Result<Option<String>> {
        let result = run_query(&self.transport, mysql::CURRENT_SCHEMA_SQL).await?;
        mysql::current_schema(&result)
    }
}
