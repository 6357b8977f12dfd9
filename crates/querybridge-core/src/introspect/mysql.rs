//! MySQL catalog queries over `information_schema`.

use serde::Deserialize;

use crate::dialect::mysql_text;
use crate::error::{Error, Result};
use crate::result::ResultSet;
use crate::schema::{
    DatabaseColumnConstraint, DatabaseSchemaItem, DatabaseSchemas, DatabaseTableColumn,
    DatabaseTableSchema, SchemaItemKind,
};
use crate::value::SqlValue;

use super::{
    build_constraints, lenient_opt_bool, lenient_opt_i64, lenient_opt_string, orphan_column,
    push_pk, SchemaIndex,
};

const EXCLUDED: &str = "('mysql', 'information_schema', 'performance_schema', 'sys')";

pub const SCHEMAS_QUERY: &str = "schemas";
pub const TABLES_QUERY: &str = "tables";
pub const COLUMNS_QUERY: &str = "columns";
pub const CONSTRAINTS_QUERY: &str = "constraints";
pub const CURRENT_SCHEMA_QUERY: &str = "current schema";

#[must_use]
pub fn schemas_sql() -> String {
    format!(
        "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA WHERE SCHEMA_NAME NOT IN {EXCLUDED}"
    )
}

#[must_use]
pub fn tables_sql() -> String {
    format!(
        "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA NOT IN {EXCLUDED}"
    )
}

const COLUMN_FIELDS: &str = "TABLE_SCHEMA, TABLE_NAME, COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, \
     COLUMN_DEFAULT, COLUMN_KEY, EXTRA, ORDINAL_POSITION";

#[must_use]
pub fn columns_sql() -> String {
    format!(
        "SELECT {COLUMN_FIELDS} FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA NOT IN {EXCLUDED} \
         ORDER BY TABLE_SCHEMA, TABLE_NAME, ORDINAL_POSITION"
    )
}

/// Columns of one table.
#[must_use]
pub fn table_columns_sql(schema: &str, table: &str) -> String {
    format!(
        "SELECT {COLUMN_FIELDS} FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} ORDER BY ORDINAL_POSITION",
        mysql_text(schema),
        mysql_text(table)
    )
}

const CONSTRAINTS_SELECT: &str = "SELECT tc.TABLE_SCHEMA AS table_schema, \
     tc.TABLE_NAME AS table_name, tc.CONSTRAINT_NAME AS constraint_name, \
     tc.CONSTRAINT_TYPE AS constraint_type, kcu.COLUMN_NAME AS column_name, \
     kcu.ORDINAL_POSITION AS key_position, kcu.REFERENCED_TABLE_NAME AS referenced_table, \
     kcu.REFERENCED_COLUMN_NAME AS referenced_column, rc.DELETE_RULE AS on_delete, \
     rc.UPDATE_RULE AS on_update, cc.CHECK_CLAUSE AS check_expression \
     FROM information_schema.TABLE_CONSTRAINTS tc \
     LEFT JOIN information_schema.KEY_COLUMN_USAGE kcu \
     ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
     AND kcu.TABLE_NAME = tc.TABLE_NAME \
     LEFT JOIN information_schema.REFERENTIAL_CONSTRAINTS rc \
     ON rc.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA AND rc.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
     AND rc.TABLE_NAME = tc.TABLE_NAME \
     LEFT JOIN information_schema.CHECK_CONSTRAINTS cc \
     ON cc.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA AND cc.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
     WHERE tc.CONSTRAINT_TYPE IN ('UNIQUE', 'FOREIGN KEY', 'CHECK')";

/// UNIQUE, FOREIGN KEY and CHECK constraints, one row per key column.
#[must_use]
pub fn constraints_sql() -> String {
    format!("{CONSTRAINTS_SELECT} AND tc.TABLE_SCHEMA NOT IN {EXCLUDED}")
}

#[must_use]
pub fn table_constraints_sql(schema: &str, table: &str) -> String {
    format!(
        "{CONSTRAINTS_SELECT} AND tc.TABLE_SCHEMA = {} AND tc.TABLE_NAME = {}",
        mysql_text(schema),
        mysql_text(table)
    )
}

pub const CURRENT_SCHEMA_SQL: &str = "SELECT DATABASE() AS db";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct SchemaRow {
    schema_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct TableRow {
    table_schema: String,
    table_name: String,
    table_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ColumnRow {
    table_schema: String,
    table_name: String,
    column_name: String,
    column_type: String,
    #[serde(default, deserialize_with = "lenient_opt_bool")]
    is_nullable: Option<bool>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    column_default: Option<String>,
    #[serde(default)]
    column_key: Option<String>,
    #[serde(default)]
    extra: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    ordinal_position: Option<i64>,
}

impl ColumnRow {
    fn is_primary_key(&self) -> bool {
        self.column_key.as_deref() == Some("PRI")
    }

    fn is_auto_increment(&self) -> bool {
        self.extra
            .as_deref()
            .is_some_and(|extra| extra.to_ascii_lowercase().contains("auto_increment"))
    }

    fn to_column(&self) -> DatabaseTableColumn {
        let generated_default = self
            .extra
            .as_deref()
            .is_some_and(|extra| extra.to_ascii_uppercase().contains("DEFAULT_GENERATED"));
        let (default_value, default_expression) = match &self.column_default {
            Some(default) if generated_default => (None, Some(default.clone())),
            Some(default) => (Some(SqlValue::Text(default.clone())), None),
            None => (None, None),
        };
        DatabaseTableColumn::new(&self.column_name, &self.column_type).with_constraint(
            DatabaseColumnConstraint {
                not_null: self.is_nullable == Some(false),
                default_value,
                default_expression,
                primary_key: self.is_primary_key(),
                auto_increment: self.is_auto_increment(),
                ..DatabaseColumnConstraint::default()
            },
        )
    }
}

fn attach_column(table: &mut DatabaseTableSchema, row: &ColumnRow) {
    if row.is_primary_key() {
        push_pk(table, &row.column_name);
    }
    if row.is_auto_increment() {
        table.auto_increment = true;
    }
    table.columns.push(row.to_column());
}

fn sorted_columns(columns: &ResultSet) -> Result<Vec<ColumnRow>> {
    let mut rows: Vec<ColumnRow> = columns.decode_rows(COLUMNS_QUERY)?;
    rows.sort_by(|a, b| {
        (&a.table_schema, &a.table_name, a.ordinal_position).cmp(&(
            &b.table_schema,
            &b.table_name,
            b.ordinal_position,
        ))
    });
    Ok(rows)
}

/// Folds the schema, table, column and constraint listings into
/// [`DatabaseSchemas`]. UNIQUE keys, unique indexes included, arrive as
/// named table constraints rather than column flags.
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when a row lacks a required field.
pub fn build_schemas(
    schemas: &ResultSet,
    tables: &ResultSet,
    columns: &ResultSet,
    constraints: &ResultSet,
) -> Result<DatabaseSchemas> {
    let mut index = SchemaIndex::default();
    for row in schemas.decode_rows::<SchemaRow>(SCHEMAS_QUERY)? {
        index.add_schema(&row.schema_name);
    }

    for row in tables.decode_rows::<TableRow>(TABLES_QUERY)? {
        let kind = if row.table_type.eq_ignore_ascii_case("VIEW") {
            SchemaItemKind::View
        } else {
            SchemaItemKind::Table
        };
        index.add_item(DatabaseSchemaItem::table(
            kind,
            &row.table_schema,
            &row.table_name,
        ));
    }

    for row in sorted_columns(columns)? {
        match index.table_mut(&row.table_schema, &row.table_name) {
            Some(table) => attach_column(table, &row),
            None => orphan_column(&row.table_schema, &row.table_name, &row.column_name),
        }
    }

    for ((schema, table), constraint) in build_constraints(CONSTRAINTS_QUERY, constraints)? {
        if let Some(table) = index.table_mut(&schema, &table) {
            table.constraints.push(constraint);
        }
    }

    Ok(index.finish())
}

/// Folds the columns and constraints of one table.
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when a row lacks a required field.
pub fn build_table_schema(
    schema: &str,
    table: &str,
    columns: &ResultSet,
    constraints: &ResultSet,
) -> Result<DatabaseTableSchema> {
    let mut result = DatabaseTableSchema::new(schema, table);
    for row in sorted_columns(columns)? {
        attach_column(&mut result, &row);
    }
    result.constraints.extend(
        build_constraints(CONSTRAINTS_QUERY, constraints)?
            .into_iter()
            .map(|(_, constraint)| constraint),
    );
    Ok(result)
}

#[derive(Debug, Deserialize)]
struct CurrentSchemaRow {
    db: Option<String>,
}

/// Reads the `DATABASE()` row.
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when no row is returned.
pub fn current_schema(result: &ResultSet) -> Result<Option<String>> {
    result
        .decode_rows::<CurrentSchemaRow>(CURRENT_SCHEMA_QUERY)?
        .into_iter()
        .next()
        .map(|row| row.db)
        .ok_or_else(|| Error::incomplete(CURRENT_SCHEMA_QUERY, "no row returned"))
}
