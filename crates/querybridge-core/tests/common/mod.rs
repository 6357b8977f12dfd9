#![allow(dead_code)]

use querybridge_core::prelude::*;

/// `users(id <int> pk auto-increment, name varchar(50))`.
pub fn users(schema: &str, int_type: &str) -> DatabaseTableSchema {
    DatabaseTableSchema::new(schema, "users")
        .column(
            DatabaseTableColumn::new("id", int_type)
                .primary_key()
                .auto_increment(),
        )
        .column(DatabaseTableColumn::new("name", "varchar(50)"))
}

/// Rename `name` to `full_name` and add `email varchar(100) NOT NULL DEFAULT ''`.
pub fn rename_and_add_email(table: &DatabaseTableSchema) -> DatabaseTableSchemaChange {
    DatabaseTableSchemaChange::from_table(table)
        .rename_column("name", "full_name")
        .add_column(
            DatabaseTableColumn::new("email", "varchar(100)")
                .not_null()
                .default_value(""),
        )
}

pub fn plan<D: SqlDialect + ?Sized>(
    dialect: &D,
    change: &DatabaseTableSchemaChange,
) -> SchemaChangePlan {
    plan_table_schema_change(dialect, change)
        .unwrap_or_else(|e| panic!("Failed to plan {change:?}\nError: {e}"))
}

pub fn plan_err<D: SqlDialect + ?Sized>(dialect: &D, change: &DatabaseTableSchemaChange) -> Error {
    match plan_table_schema_change(dialect, change) {
        Ok(plan) => panic!("Expected an error, got {plan:?}"),
        Err(e) => e,
    }
}
