//! MySQL and PostgreSQL drivers over a scripted transport, plus the
//! channel transport in front of a real SQLite database.

mod common;

use std::sync::Arc;

use common::{sqlite_transport, ScriptedTransport};
use querybridge_driver::prelude::*;
use querybridge_driver::transport::ResponseData;
use serde_json::json;

// =============================================================================
// MySQL
// =============================================================================

fn mysql_users() -> ScriptedTransport {
    ScriptedTransport::default()
        .on("DATABASE()", vec![json!({"db": "shop"})])
        .on(
            "information_schema.COLUMNS",
            vec![
                json!({
                    "TABLE_SCHEMA": "shop", "TABLE_NAME": "users", "COLUMN_NAME": "name",
                    "COLUMN_TYPE": "varchar(50)", "IS_NULLABLE": "YES", "COLUMN_DEFAULT": null,
                    "COLUMN_KEY": "", "EXTRA": "", "ORDINAL_POSITION": 2
                }),
                json!({
                    "TABLE_SCHEMA": "shop", "TABLE_NAME": "users", "COLUMN_NAME": "id",
                    "COLUMN_TYPE": "int", "IS_NULLABLE": "NO", "COLUMN_DEFAULT": null,
                    "COLUMN_KEY": "PRI", "EXTRA": "auto_increment", "ORDINAL_POSITION": 1
                }),
            ],
        )
        .on(
            "TABLE_CONSTRAINTS",
            vec![json!({
                "table_schema": "shop", "table_name": "users", "constraint_name": "users_name_uq",
                "constraint_type": "UNIQUE", "column_name": "name", "key_position": 1,
                "referenced_table": null, "referenced_column": null,
                "on_delete": null, "on_update": null, "check_expression": null
            })],
        )
}

#[tokio::test]
async fn test_mysql_table_schema_and_apply() {
    let driver = MySqlDriver::new(mysql_users());
    assert_eq!(
        driver.current_schema().await.unwrap().as_deref(),
        Some("shop")
    );

    let users = driver.table_schema("shop", "users").await.unwrap();
    assert_eq!(users.pk, vec!["id"]);
    assert!(users.auto_increment);
    assert_eq!(users.columns[0].name, "id");
    assert_eq!(
        users.constraints,
        vec![DatabaseTableConstraint::unique("users_name_uq", &["name"])]
    );

    let change = DatabaseTableSchemaChange::from_table(&users)
        .rename_column("name", "full_name")
        .add_column(
            DatabaseTableColumn::new("email", "varchar(100)")
                .not_null()
                .default_value(""),
        );
    let plan = driver.apply_table_schema_change(&change).await.unwrap();
    assert_eq!(plan.strategy, ChangeStrategy::Alter);

    let received = driver.transport().received();
    assert_eq!(
        &received[received.len() - 2..],
        &[
            "ALTER TABLE `shop`.`users` CHANGE `name` `full_name` varchar(50)".to_string(),
            "ALTER TABLE `shop`.`users` ADD COLUMN `email` varchar(100) NOT NULL DEFAULT ''"
                .to_string(),
        ]
    );
}

#[tokio::test]
async fn test_mysql_drops_introspected_unique_key() {
    let driver = MySqlDriver::new(mysql_users());
    let users = driver.table_schema("shop", "users").await.unwrap();
    let change = DatabaseTableSchemaChange::from_table(&users).remove_constraint("users_name_uq");
    driver.apply_table_schema_change(&change).await.unwrap();
    assert_eq!(
        driver.transport().received().last().map(String::as_str),
        Some("ALTER TABLE `shop`.`users` DROP INDEX `users_name_uq`")
    );
}

#[tokio::test]
async fn test_mysql_escaping_and_missing_table() {
    let driver = MySqlDriver::new(ScriptedTransport::default());
    assert_eq!(driver.escape_id("a`b"), "`a``b`");
    assert_eq!(
        driver.escape_value(&SqlValue::Text("it's \\ here".into())),
        "'it''s \\\\ here'"
    );
    assert_eq!(driver.flags().dialect, Dialect::MySql);

    let err = driver.table_schema("shop", "ghost").await.unwrap_err();
    assert!(matches!(err, Error::IncompleteMetadata { .. }));

    let err = driver.trigger("shop", "users_ai").await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperation { .. }));
}

#[tokio::test]
async fn test_unsupported_change_sends_nothing() {
    let users = DatabaseTableSchema::new("shop", "users")
        .column(DatabaseTableColumn::new("id", "int").primary_key())
        .column(DatabaseTableColumn::new("name", "varchar(50)"));
    let flags = DriverFlags {
        support_modify_column: false,
        support_create_update_table: false,
        ..DriverFlags::mysql()
    };
    let driver = MySqlDriver::with_flags(ScriptedTransport::default(), flags);

    let change = DatabaseTableSchemaChange::from_table(&users).remove_column("name");
    let err = driver.apply_table_schema_change(&change).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperation { .. }), "{err}");
    assert!(driver.transport().received().is_empty());
}

// =============================================================================
// PostgreSQL
// =============================================================================

fn postgres_catalog() -> ScriptedTransport {
    ScriptedTransport::default()
        .on("current_schema()", vec![json!({"current_schema": "public"})])
        .on("pg_namespace WHERE", vec![json!({"schema_name": "public"})])
        .on(
            "information_schema.tables",
            vec![json!({"table_schema": "public", "table_name": "items", "table_type": "BASE TABLE"})],
        )
        .on(
            "contype = 'p'",
            vec![json!({
                "table_schema": "public", "table_name": "items",
                "constraint_name": "items_pkey", "column_name": "id", "key_position": 1
            })],
        )
        .on(
            "contype IN",
            vec![
                json!({
                    "table_schema": "public", "table_name": "items",
                    "constraint_name": "items_label_check", "constraint_type": "c",
                    "column_name": "label", "key_position": 1,
                    "referenced_table": null, "referenced_column": null,
                    "on_delete": " ", "on_update": " ",
                    "check_expression": "(label <> ''::text)"
                }),
                json!({
                    "table_schema": "public", "table_name": "items",
                    "constraint_name": "items_label_key", "constraint_type": "u",
                    "column_name": "label", "key_position": 1,
                    "referenced_table": null, "referenced_column": null,
                    "on_delete": " ", "on_update": " ", "check_expression": null
                }),
            ],
        )
        .on(
            "pg_attrdef",
            vec![
                json!({
                    "table_schema": "public", "table_name": "items", "column_name": "id",
                    "data_type": "integer", "not_null": true, "column_default": null,
                    "identity": "d", "ordinal_position": 1
                }),
                json!({
                    "table_schema": "public", "table_name": "items", "column_name": "label",
                    "data_type": "text", "not_null": false,
                    "column_default": "'none'::text", "identity": "", "ordinal_position": 2
                }),
            ],
        )
        .on(
            "information_schema.triggers",
            vec![json!({
                "trigger_schema": "public", "trigger_name": "items_audit",
                "event_object_table": "items", "action_timing": "AFTER",
                "event_manipulation": "UPDATE",
                "action_statement": "EXECUTE FUNCTION audit()"
            })],
        )
}

#[tokio::test]
async fn test_postgres_introspection() {
    let driver = PostgresDriver::new(postgres_catalog());
    assert_eq!(
        driver.current_schema().await.unwrap().as_deref(),
        Some("public")
    );

    let schemas = driver.schemas().await.unwrap();
    let items = &schemas["public"];
    let table = items
        .iter()
        .find(|i| i.name == "items")
        .and_then(|i| i.table_schema.as_ref())
        .unwrap();
    assert_eq!(table.pk, vec!["id"]);
    assert_eq!(table.pk_constraint_name.as_deref(), Some("items_pkey"));
    assert!(table.auto_increment);
    assert_eq!(
        table.constraints,
        vec![
            DatabaseTableConstraint::check("items_label_check", "(label <> ''::text)"),
            DatabaseTableConstraint::unique("items_label_key", &["label"]),
        ]
    );
    assert!(items
        .iter()
        .any(|i| i.kind == SchemaItemKind::Trigger && i.name == "items_audit"));

    let single = driver.table_schema("public", "items").await.unwrap();
    assert_eq!(&single, table);
    assert_eq!(
        single
            .get_column("label")
            .unwrap()
            .constraint_or_default()
            .default_expression
            .as_deref(),
        Some("'none'::text")
    );

    let trigger = driver.trigger("public", "items_audit").await.unwrap();
    assert_eq!(trigger.when, TriggerTiming::After);
    assert_eq!(trigger.operation, TriggerOperation::Update);
    assert_eq!(trigger.statement, "EXECUTE FUNCTION audit()");
}

#[tokio::test]
async fn test_postgres_create_update_table_schema() {
    let driver = PostgresDriver::new(postgres_catalog());
    let items = driver.table_schema("public", "items").await.unwrap();
    let change = DatabaseTableSchemaChange::from_table(&items).rename_table("products");
    assert_eq!(
        driver.create_update_table_schema(&change).unwrap(),
        vec!["ALTER TABLE \"public\".\"items\" RENAME TO \"products\"".to_string()]
    );

    let change = DatabaseTableSchemaChange::from_table(&items).remove_constraint("items_label_key");
    assert_eq!(
        driver.create_update_table_schema(&change).unwrap(),
        vec!["ALTER TABLE \"public\".\"items\" DROP CONSTRAINT \"items_label_key\"".to_string()]
    );
    assert!(driver.column_type_selector().find("integer").is_some());
}

// =============================================================================
// Channel transport
// =============================================================================

/// Serves requests from `receiver` with a SQLite database, answering each
/// one from its own task so responses may arrive out of order.
fn serve(
    mut receiver: tokio::sync::mpsc::UnboundedReceiver<TransportRequest>,
    responder: Responder,
    database: SqliteTransport,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = receiver.recv().await {
            let responder = responder.clone();
            let database = database.clone();
            tokio::spawn(async move {
                let response = match request {
                    TransportRequest::Query { id, statement } => {
                        match database.query(&statement).await {
                            Ok(result) => TransportResponse::ok(id, ResponseData::Query(result)),
                            Err(e) => TransportResponse::error(id, e.to_string()),
                        }
                    }
                    TransportRequest::Transaction { id, statements } => {
                        match database.transaction(&statements).await {
                            Ok(results) => {
                                TransportResponse::ok(id, ResponseData::Transaction(results))
                            }
                            Err(e) => TransportResponse::error(id, e.to_string()),
                        }
                    }
                };
                responder.deliver(response);
            });
        }
        responder.close();
    })
}

#[tokio::test]
async fn test_sqlite_driver_over_channel_transport() {
    let (transport, receiver, responder) = ChannelTransport::new();
    let server = serve(receiver, responder, sqlite_transport().await);
    let driver = Arc::new(SqliteDriver::new(transport));

    driver
        .query("CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)")
        .await
        .unwrap();

    let inserts = (0..8).map(|i| {
        let driver = Arc::clone(&driver);
        tokio::spawn(async move {
            driver
                .query(&format!("INSERT INTO users (name) VALUES ('user{i}')"))
                .await
        })
    });
    for insert in inserts.collect::<Vec<_>>() {
        insert.await.unwrap().unwrap();
    }

    let count = driver
        .query("SELECT COUNT(*) AS c FROM users")
        .await
        .unwrap();
    assert_eq!(count.rows[0]["c"], 8);

    let users = driver.table_schema("main", "users").await.unwrap();
    let change = DatabaseTableSchemaChange::from_table(&users).rename_column("name", "label");
    driver.apply_table_schema_change(&change).await.unwrap();
    let renamed = driver.table_schema("main", "users").await.unwrap();
    assert!(renamed.get_column("label").is_some());

    let err = driver.query("SELECT * FROM missing").await.unwrap_err();
    match err {
        Error::Transport(TransportError::Remote(message)) => {
            assert!(message.contains("missing"), "{message}");
        }
        other => panic!("Expected a remote error, got {other:?}"),
    }

    drop(driver);
    server.await.unwrap();
}
