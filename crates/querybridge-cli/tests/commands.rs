//! Tests for the command building blocks.

use std::io::Write;

use sqlx::sqlite::SqlitePoolOptions;
use tempfile::NamedTempFile;

use querybridge_cli::{
    apply_change, load_change, plan_change, type_catalog, validate_type, PlanReport,
};
use querybridge_driver::prelude::*;

fn users() -> DatabaseTableSchema {
    DatabaseTableSchema::new("", "users")
        .column(
            DatabaseTableColumn::new("id", "INTEGER")
                .primary_key()
                .auto_increment(),
        )
        .column(DatabaseTableColumn::new("name", "varchar(50)"))
}

fn write_change(change: &DatabaseTableSchemaChange) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(serde_json::to_string_pretty(change).unwrap().as_bytes())
        .unwrap();
    file
}

#[test]
fn test_plan_from_change_file() {
    let change = DatabaseTableSchemaChange::from_table(&users()).add_column(
        DatabaseTableColumn::new("email", "varchar(100)")
            .not_null()
            .default_value(""),
    );
    let file = write_change(&change);

    let loaded = load_change(file.path()).unwrap();
    assert_eq!(loaded, change);

    let report = plan_change(Dialect::MySql, &loaded).unwrap();
    assert_eq!(
        report,
        PlanReport {
            strategy: "alter",
            statements: vec![
                "ALTER TABLE `users` ADD COLUMN `email` varchar(100) NOT NULL DEFAULT ''"
                    .to_string()
            ],
            warnings: vec![],
        }
    );
}

#[test]
fn test_plan_reports_recreate_warnings() {
    let renamed = DatabaseTableSchemaChange::from_table(&users()).rename_table("people");
    let in_place = plan_change(Dialect::Sqlite, &renamed).unwrap();
    assert_eq!(in_place.strategy, "alter");
    assert!(in_place.warnings.is_empty());

    let change = DatabaseTableSchemaChange::from_table(&users())
        .rename_column("name", "full_name")
        .retype_column("full_name", "TEXT");
    let report = plan_change(Dialect::Sqlite, &change).unwrap();
    assert_eq!(report.strategy, "recreate");
    assert_eq!(report.statements.len(), 4);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("indexes and triggers"));
}

#[test]
fn test_load_change_rejects_garbage() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"{\"columns\": 42}").unwrap();
    let err = load_change(file.path()).unwrap_err();
    assert!(
        err.to_string().contains("Failed to parse table change"),
        "{err}"
    );

    let missing = file.path().with_extension("missing");
    assert!(load_change(&missing).is_err());
}

#[test]
fn test_unsupported_plan_is_an_error() {
    // Postgres cannot drop an identity in place.
    let change = DatabaseTableSchemaChange::from_table(&users()).update_column("id", |c| {
        DatabaseTableColumn::new(c.name, c.column_type).primary_key()
    });
    let err = plan_change(Dialect::Postgres, &change).unwrap_err();
    assert!(err.to_string().contains("Unsupported operation"), "{err}");
}

#[test]
fn test_type_catalog_and_validation() {
    let groups = type_catalog(Dialect::MySql);
    assert!(groups
        .iter()
        .flat_map(|g| g.types.iter())
        .any(|t| t.name == "decimal" && t.parameters.len() == 2));

    assert_eq!(
        validate_type(Dialect::MySql, "decimal(10, 2)").unwrap(),
        "decimal(10,2)"
    );
    assert!(validate_type(Dialect::MySql, "decimal(2, 10)").is_err());

    let json = serde_json::to_value(type_catalog(Dialect::Sqlite)).unwrap();
    assert_eq!(json[0]["group"], "String");
    assert_eq!(json[0]["types"][0]["name"], "TEXT");
}

async fn exec_insert(driver: &SqliteDriver<SqliteTransport>) {
    driver
        .query("INSERT INTO notes (body) VALUES ('hello')")
        .await
        .expect("Failed to insert note");
}

#[tokio::test]
async fn test_apply_change_on_sqlite() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    let driver = SqliteDriver::new(SqliteTransport::new(pool));

    let create = DatabaseTableSchemaChange::create("main", "notes")
        .add_column(
            DatabaseTableColumn::new("id", "INTEGER")
                .primary_key()
                .auto_increment(),
        )
        .add_column(DatabaseTableColumn::new("body", "TEXT"));
    let report = apply_change(&driver, &load_change(write_change(&create).path()).unwrap())
        .await
        .unwrap();
    assert_eq!(report.strategy, "create");

    let notes = driver.table_schema("main", "notes").await.unwrap();
    assert_eq!(notes.pk, vec!["id"]);

    let pinned = DatabaseTableSchemaChange::from_table(&notes)
        .add_column(DatabaseTableColumn::new("pinned", "INTEGER").default_value(0));
    let report = apply_change(&driver, &pinned).await.unwrap();
    assert_eq!(report.strategy, "alter");

    let bad = DatabaseTableSchemaChange::from_table(&notes)
        .rename_column("body", "text")
        .add_column(DatabaseTableColumn::new("owner", "TEXT").not_null());
    exec_insert(&driver).await;
    let err = apply_change(&driver, &bad).await.unwrap_err();
    assert!(
        err.to_string()
            .contains("Failed to apply change to table 'notes'"),
        "{err}"
    );
}
