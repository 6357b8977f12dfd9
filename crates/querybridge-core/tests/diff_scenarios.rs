//! End-to-end scenarios for the schema diff engine.
//!
//! Each test starts from a table description, edits it through
//! `DatabaseTableSchemaChange` and checks the exact DDL a dialect emits.

mod common;

use common::{plan, plan_err, rename_and_add_email, users};
use querybridge_core::prelude::*;

// =============================================================================
// MySQL
// =============================================================================

#[test]
fn test_mysql_rename_and_add() {
    let change = rename_and_add_email(&users("", "int"));
    let plan = plan(&MySqlDialect::new(), &change);
    assert_eq!(plan.strategy, ChangeStrategy::Alter);
    assert_eq!(
        plan.statements,
        vec![
            "ALTER TABLE `users` CHANGE `name` `full_name` varchar(50)",
            "ALTER TABLE `users` ADD COLUMN `email` varchar(100) NOT NULL DEFAULT ''",
        ]
    );
    assert!(plan.warnings.is_empty());
}

#[test]
fn test_mysql_full_ordering() {
    let table = users("shop", "int")
        .column(DatabaseTableColumn::new("legacy", "text"))
        .constraint(DatabaseTableConstraint::unique("users_name_key", &["name"]));
    let change = DatabaseTableSchemaChange::from_table(&table)
        .rename_table("members")
        .retype_column("name", "varchar(80)")
        .add_column(DatabaseTableColumn::new("nick", "varchar(20)"))
        .remove_column("legacy")
        .remove_constraint("users_name_key")
        .add_constraint(DatabaseTableConstraint::check(
            "nick_len",
            "char_length(`nick`) > 2",
        ));
    let plan = plan(&MySqlDialect::new(), &change);
    assert_eq!(
        plan.statements,
        vec![
            "ALTER TABLE `shop`.`users` CHANGE `name` `name` varchar(80)",
            "ALTER TABLE `shop`.`users` ADD COLUMN `nick` varchar(20)",
            "ALTER TABLE `shop`.`users` DROP COLUMN `legacy`",
            "ALTER TABLE `shop`.`users` DROP INDEX `users_name_key`",
            "ALTER TABLE `shop`.`users` ADD CONSTRAINT `nick_len` CHECK (char_length(`nick`) > 2)",
            "ALTER TABLE `shop`.`users` RENAME TO `members`",
        ]
    );
}

#[test]
fn test_mysql_primary_key_change() {
    let table = users("", "int").column(DatabaseTableColumn::new("tenant", "int").not_null());
    let change = DatabaseTableSchemaChange::from_table(&table).set_primary_key(&["id", "tenant"]);
    let plan = plan(&MySqlDialect::new(), &change);
    assert_eq!(
        plan.statements,
        vec![
            "ALTER TABLE `users` DROP PRIMARY KEY",
            "ALTER TABLE `users` ADD PRIMARY KEY (`id`, `tenant`)",
        ]
    );
}

// =============================================================================
// SQLite
// =============================================================================

#[test]
fn test_sqlite_rename_and_add_recreates() {
    let change = rename_and_add_email(&users("main", "INTEGER"));
    let plan = plan(&SqliteDialect::new(), &change);
    assert_eq!(plan.strategy, ChangeStrategy::Recreate);
    assert_eq!(
        plan.statements,
        vec![
            "CREATE TABLE \"main\".\"users_new\" (\n  \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n  \"full_name\" varchar(50),\n  \"email\" varchar(100) NOT NULL DEFAULT ''\n)",
            "INSERT INTO \"main\".\"users_new\" (\"id\", \"full_name\") SELECT \"id\", \"name\" FROM \"main\".\"users\"",
            "DROP TABLE \"main\".\"users\"",
            "ALTER TABLE \"main\".\"users_new\" RENAME TO \"users\"",
        ]
    );
    assert_eq!(
        plan.warnings,
        vec![DiffWarning::DependentObjectsDropped {
            table: "users".into()
        }]
    );
}

#[test]
fn test_sqlite_recreate_keeps_constraints_and_renames() {
    let mut table = DatabaseTableSchema::new("main", "lines")
        .column(DatabaseTableColumn::new("order_id", "INTEGER").not_null())
        .column(DatabaseTableColumn::new("sku", "TEXT").not_null())
        .column(DatabaseTableColumn::new("qty", "INTEGER"));
    table.pk = vec!["order_id".into(), "sku".into()];
    let change = DatabaseTableSchemaChange::from_table(&table)
        .rename_table("order_lines")
        .remove_column("qty")
        .add_constraint(DatabaseTableConstraint::foreign_key(
            "lines_order_fk",
            &["order_id"],
            "orders",
            &["id"],
        ));
    let plan = plan(&SqliteDialect::new(), &change);
    assert_eq!(
        plan.statements[0],
        "CREATE TABLE \"main\".\"order_lines_new\" (\n  \"order_id\" INTEGER NOT NULL,\n  \"sku\" TEXT NOT NULL,\n  PRIMARY KEY (\"order_id\", \"sku\"),\n  CONSTRAINT \"lines_order_fk\" FOREIGN KEY (\"order_id\") REFERENCES \"orders\" (\"id\")\n)"
    );
    assert_eq!(
        plan.statements[1],
        "INSERT INTO \"main\".\"order_lines_new\" (\"order_id\", \"sku\") SELECT \"order_id\", \"sku\" FROM \"main\".\"lines\""
    );
    assert_eq!(
        plan.statements[3],
        "ALTER TABLE \"main\".\"order_lines_new\" RENAME TO \"order_lines\""
    );
}

#[test]
fn test_sqlite_rename_only_stays_in_place() {
    let change =
        DatabaseTableSchemaChange::from_table(&users("main", "INTEGER")).rename_table("people");
    let plan = plan(&SqliteDialect::new(), &change);
    assert_eq!(plan.strategy, ChangeStrategy::Alter);
    assert_eq!(
        plan.statements,
        vec!["ALTER TABLE \"main\".\"users\" RENAME TO \"people\""]
    );
}

#[test]
fn test_sqlite_not_null_addition_without_default_recreates() {
    let change = DatabaseTableSchemaChange::from_table(&users("main", "INTEGER"))
        .add_column(DatabaseTableColumn::new("age", "INTEGER").not_null());
    let plan = plan(&SqliteDialect::new(), &change);
    assert_eq!(plan.strategy, ChangeStrategy::Recreate);
    assert!(plan.warnings.contains(&DiffWarning::NotNullWithoutDefault {
        table: "users".into(),
        column: "age".into(),
    }));
}

#[test]
fn test_sqlite_dropping_every_column_copies_nothing() {
    let change = DatabaseTableSchemaChange::from_table(&users("main", "INTEGER"))
        .remove_column("id")
        .remove_column("name")
        .add_column(DatabaseTableColumn::new("fresh", "TEXT"));
    let plan = plan(&SqliteDialect::new(), &change);
    assert_eq!(plan.statements.len(), 3);
    assert!(plan.statements.iter().all(|s| !s.starts_with("INSERT")));
    assert!(plan.warnings.contains(&DiffWarning::NoColumnsCopied {
        table: "users".into()
    }));
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[test]
fn test_postgres_alter_column_ordering() {
    let table = DatabaseTableSchema::new("public", "items")
        .column(
            DatabaseTableColumn::new("id", "integer")
                .not_null()
                .primary_key(),
        )
        .column(DatabaseTableColumn::new("price", "integer").default_value(0));
    let change = DatabaseTableSchemaChange::from_table(&table).update_column("price", |_| {
        DatabaseTableColumn::new("amount", "numeric(10,2)").not_null()
    });
    let plan = plan(&PostgresDialect::new(), &change);
    assert_eq!(
        plan.statements,
        vec![
            "ALTER TABLE \"public\".\"items\" ALTER COLUMN \"price\" TYPE numeric(10,2)",
            "ALTER TABLE \"public\".\"items\" ALTER COLUMN \"price\" SET NOT NULL",
            "ALTER TABLE \"public\".\"items\" ALTER COLUMN \"price\" DROP DEFAULT",
            "ALTER TABLE \"public\".\"items\" RENAME COLUMN \"price\" TO \"amount\"",
        ]
    );
}

#[test]
fn test_postgres_primary_key_swap_uses_constraint_name() {
    let mut table = DatabaseTableSchema::new("public", "items")
        .column(
            DatabaseTableColumn::new("id", "integer")
                .not_null()
                .primary_key(),
        )
        .column(DatabaseTableColumn::new("code", "text").not_null());
    table.pk_constraint_name = Some("items_pkey".into());
    let change = DatabaseTableSchemaChange::from_table(&table).set_primary_key(&["code"]);
    let plan = plan(&PostgresDialect::new(), &change);
    assert_eq!(
        plan.statements,
        vec![
            "ALTER TABLE \"public\".\"items\" DROP CONSTRAINT \"items_pkey\"",
            "ALTER TABLE \"public\".\"items\" ADD PRIMARY KEY (\"code\")",
        ]
    );
}

#[test]
fn test_postgres_create_table() {
    let change = DatabaseTableSchemaChange::create("public", "tags")
        .add_column(
            DatabaseTableColumn::new("id", "bigint")
                .not_null()
                .primary_key()
                .auto_increment(),
        )
        .add_column(
            DatabaseTableColumn::new("label", "text")
                .not_null()
                .unique(),
        );
    let plan = plan(&PostgresDialect::new(), &change);
    assert_eq!(plan.strategy, ChangeStrategy::Create);
    assert_eq!(
        plan.statements,
        vec![
            "CREATE TABLE \"public\".\"tags\" (\n  \"id\" bigint NOT NULL GENERATED BY DEFAULT AS IDENTITY,\n  \"label\" text NOT NULL UNIQUE,\n  PRIMARY KEY (\"id\")\n)"
        ]
    );
}

// =============================================================================
// Fail fast
// =============================================================================

#[test]
fn test_unsupported_emits_nothing() {
    let change = DatabaseTableSchemaChange::from_table(&users("public", "integer"))
        .update_column("id", |c| {
            DatabaseTableColumn::new(c.name, c.column_type).primary_key()
        });
    let err = plan_err(&PostgresDialect::new(), &change);
    assert!(matches!(
        err,
        Error::UnsupportedOperation {
            dialect: Dialect::Postgres,
            ..
        }
    ));
    assert!(err.to_string().contains("identity"));
}

#[test]
fn test_no_create_update_support_names_operation() {
    let dialect = SqliteDialect::with_flags(DriverFlags::sqlite().with_create_update_table(false));
    let change =
        DatabaseTableSchemaChange::from_table(&users("main", "INTEGER")).remove_column("name");
    let err = plan_err(&dialect, &change);
    assert_eq!(
        err.to_string(),
        "Unsupported operation for sqlite: drop column 'name'"
    );
}

#[test]
fn test_malformed_types_emit_nothing() {
    let cases: [(Box<dyn SqlDialect>, &str); 3] = [
        (Box::new(MySqlDialect::new()), "decimal(999,999)"),
        (Box::new(PostgresDialect::new()), "numeric(1001)"),
        (Box::new(SqliteDialect::new()), "BLOB(-1)"),
    ];
    for (dialect, out_of_range) in &cases {
        for column_type in [*out_of_range, "TEXT); DROP TABLE users; --", "int(a)"] {
            let change = DatabaseTableSchemaChange::from_table(&users("main", "INTEGER"))
                .add_column(DatabaseTableColumn::new("x", column_type));
            let err = plan_err(dialect.as_ref(), &change);
            assert!(
                matches!(err, Error::InvalidTypeParameter { .. }),
                "{:?} accepted {column_type}: {err}",
                dialect.dialect()
            );

            let retyped = DatabaseTableSchemaChange::from_table(&users("main", "INTEGER"))
                .retype_column("name", column_type);
            assert!(matches!(
                plan_err(dialect.as_ref(), &retyped),
                Error::InvalidTypeParameter { .. }
            ));
        }
    }
}

#[test]
fn test_dynamic_dialect_matches_static() {
    let change = rename_and_add_email(&users("", "int"));
    let boxed = for_dialect(Dialect::MySql);
    assert_eq!(
        create_update_table_schema(boxed.as_ref(), &change).unwrap(),
        create_update_table_schema(&MySqlDialect::new(), &change).unwrap()
    );
}
