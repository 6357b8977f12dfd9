//! SQLite-family driver.

use async_trait::async_trait;

use querybridge_core::dialect::{SqlDialect, SqliteDialect};
use querybridge_core::error::Result;
use querybridge_core::flags::DriverFlags;
use querybridge_core::introspect::sqlite::{self, SchemaCatalog, TableColumns};
use querybridge_core::result::ResultSet;
use querybridge_core::schema::{DatabaseSchemas, DatabaseTableSchema, DatabaseTriggerSchema};

use crate::driver::{run_query, run_transaction, table_not_found, Driver};
use crate::transport::Transport;

/// Capabilities of the SQLite engine behind a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteOptions {
    /// Whether `pragma_table_info()` can be joined as a table-valued
    /// function. Without it, columns are read with one `PRAGMA table_info`
    /// per table.
    pub support_pragma_list: bool,
    /// Whether integers beyond 53 bits come back losslessly.
    pub support_big_int: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            support_pragma_list: true,
            support_big_int: false,
        }
    }
}

/// Driver for SQLite, libSQL and compatible engines.
#[derive(Debug)]
pub struct SqliteDriver<T> {
    transport: T,
    dialect: SqliteDialect,
    options: SqliteOptions,
}

impl<T: Transport> SqliteDriver<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_options(transport, SqliteOptions::default())
    }

    #[must_use]
    pub fn with_options(transport: T, options: SqliteOptions) -> Self {
        let flags = DriverFlags::sqlite().with_big_int(options.support_big_int);
        Self {
            transport,
            dialect: SqliteDialect::with_flags(flags),
            options,
        }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub const fn options(&self) -> SqliteOptions {
        self.options
    }

    async fn catalog(&self, schema_name: &str) -> Result<SchemaCatalog> {
        let objects = run_query(&self.transport, &sqlite::objects_sql(schema_name)).await?;
        let columns = if self.options.support_pragma_list {
            TableColumns::Joined(
                run_query(&self.transport, &sqlite::columns_sql(schema_name)).await?,
            )
        } else {
            let mut per_table = Vec::new();
            for table_name in sqlite::table_names(&objects)? {
                let info = run_query(
                    &self.transport,
                    &sqlite::table_info_sql(schema_name, &table_name),
                )
                .await?;
                per_table.push((table_name, info));
            }
            TableColumns::PerTable(per_table)
        };
        Ok(SchemaCatalog {
            schema: schema_name.to_string(),
            objects,
            columns,
        })
    }
}

#[async_trait]
impl<T: Transport> Driver for SqliteDriver<T> {
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
        let databases = run_query(&self.transport, sqlite::DATABASES_SQL).await?;
        let mut catalogs = Vec::new();
        for schema_name in sqlite::schema_names(&databases)? {
            catalogs.push(self.catalog(&schema_name).await?);
        }
        sqlite::build_schemas(&catalogs)
    }

    async fn table_schema(
        &self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<DatabaseTableSchema> {
        let columns = run_query(
            &self.transport,
            &sqlite::table_info_sql(schema_name, table_name),
        )
        .await?;
        let definition = run_query(
            &self.transport,
            &sqlite::table_sql_sql(schema_name, table_name),
        )
        .await?;
        let table = sqlite::build_table_schema(schema_name, table_name, &columns, &definition)?;
        if table.columns.is_empty() {
            return Err(table_not_found(
                sqlite::COLUMNS_QUERY,
                schema_name,
                table_name,
            ));
        }
        Ok(table)
    }

    async fn trigger(&self, schema_name: &str, name: &str) -> Result<DatabaseTriggerSchema> {
        let result = run_query(&self.transport, &sqlite::trigger_sql(schema_name, name)).await?;
        sqlite::build_trigger(schema_name, &result)
    }

    async fn current_schema(&self) -> Result<Option<String>> {
        Ok(Some(self.dialect.flags().default_schema.clone()))
    }
}
