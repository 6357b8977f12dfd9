//! PostgreSQL catalog queries over `pg_catalog` and `information_schema`.

use serde::Deserialize;

use crate::dialect::postgres_text as literal;
use crate::error::{Error, Result};
use crate::result::ResultSet;
use crate::schema::{
    DatabaseColumnConstraint, DatabaseSchemaItem, DatabaseSchemas, DatabaseTableColumn,
    DatabaseTableSchema, DatabaseTriggerSchema, SchemaItemKind, TriggerOperation, TriggerTiming,
};

use super::{build_constraints, lenient_bool, lenient_i64, orphan_column, push_pk, SchemaIndex};

pub const SCHEMAS_QUERY: &str = "schemas";
pub const TABLES_QUERY: &str = "tables";
pub const COLUMNS_QUERY: &str = "columns";
pub const PRIMARY_KEYS_QUERY: &str = "primary keys";
pub const CONSTRAINTS_QUERY: &str = "constraints";
pub const TRIGGERS_QUERY: &str = "triggers";
pub const CURRENT_SCHEMA_QUERY: &str = "current schema";

pub const CURRENT_SCHEMA_SQL: &str = "SELECT current_schema() AS current_schema";

fn not_system(column: &str) -> String {
    format!(
        "{column} NOT IN ('information_schema', 'pg_catalog', 'pg_toast') \
         AND {column} NOT LIKE 'pg\\_temp\\_%' \
         AND {column} NOT LIKE 'pg\\_toast\\_temp\\_%'"
    )
}

#[must_use]
pub fn schemas_sql() -> String {
    format!(
        "SELECT nspname AS schema_name FROM pg_catalog.pg_namespace WHERE {} ORDER BY nspname",
        not_system("nspname")
    )
}

#[must_use]
pub fn tables_sql() -> String {
    format!(
        "SELECT table_schema, table_name, table_type FROM information_schema.tables WHERE {}",
        not_system("table_schema")
    )
}

const COLUMNS_SELECT: &str = "SELECT n.nspname AS table_schema, c.relname AS table_name, \
     a.attname AS column_name, \
     pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type, \
     a.attnotnull AS not_null, \
     pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS column_default, \
     a.attidentity AS identity, \
     a.attnum AS ordinal_position \
     FROM pg_catalog.pg_attribute a \
     JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
     LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
     WHERE a.attnum > 0 AND NOT a.attisdropped AND c.relkind IN ('r', 'p', 'v', 'm', 'f')";

#[must_use]
pub fn columns_sql() -> String {
    format!(
        "{COLUMNS_SELECT} AND {} ORDER BY n.nspname, c.relname, a.attnum",
        not_system("n.nspname")
    )
}

#[must_use]
pub fn table_columns_sql(schema: &str, table: &str) -> String {
    format!(
        "{COLUMNS_SELECT} AND n.nspname = {} AND c.relname = {} ORDER BY a.attnum",
        literal(schema),
        literal(table)
    )
}

const PRIMARY_KEYS_SELECT: &str = "SELECT n.nspname AS table_schema, c.relname AS table_name, \
     con.conname AS constraint_name, a.attname AS column_name, k.ord AS key_position \
     FROM pg_catalog.pg_constraint con \
     JOIN pg_catalog.pg_class c ON c.oid = con.conrelid \
     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
     CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord) \
     JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum \
     WHERE con.contype = 'p'";

#[must_use]
pub fn primary_keys_sql() -> String {
    format!(
        "{PRIMARY_KEYS_SELECT} AND {} ORDER BY n.nspname, c.relname, k.ord",
        not_system("n.nspname")
    )
}

#[must_use]
pub fn table_primary_key_sql(schema: &str, table: &str) -> String {
    format!(
        "{PRIMARY_KEYS_SELECT} AND n.nspname = {} AND c.relname = {} ORDER BY k.ord",
        literal(schema),
        literal(table)
    )
}

const CONSTRAINTS_SELECT: &str = "SELECT n.nspname AS table_schema, c.relname AS table_name, \
     con.conname AS constraint_name, con.contype::text AS constraint_type, \
     a.attname AS column_name, k.ord AS key_position, \
     fc.relname AS referenced_table, fa.attname AS referenced_column, \
     con.confdeltype::text AS on_delete, con.confupdtype::text AS on_update, \
     CASE WHEN con.contype = 'c' THEN pg_catalog.pg_get_expr(con.conbin, con.conrelid) END \
     AS check_expression \
     FROM pg_catalog.pg_constraint con \
     JOIN pg_catalog.pg_class c ON c.oid = con.conrelid \
     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
     LEFT JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, refnum, ord) ON true \
     LEFT JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum \
     LEFT JOIN pg_catalog.pg_class fc ON fc.oid = con.confrelid \
     LEFT JOIN pg_catalog.pg_attribute fa ON fa.attrelid = con.confrelid AND fa.attnum = k.refnum \
     WHERE con.contype IN ('u', 'f', 'c')";

/// UNIQUE, FOREIGN KEY and CHECK constraints, one row per key column.
/// Referenced tables are reported by bare name.
#[must_use]
pub fn constraints_sql() -> String {
    format!(
        "{CONSTRAINTS_SELECT} AND {} ORDER BY n.nspname, c.relname, con.conname, k.ord",
        not_system("n.nspname")
    )
}

#[must_use]
pub fn table_constraints_sql(schema: &str, table: &str) -> String {
    format!(
        "{CONSTRAINTS_SELECT} AND n.nspname = {} AND c.relname = {} ORDER BY con.conname, k.ord",
        literal(schema),
        literal(table)
    )
}

#[must_use]
pub fn triggers_sql() -> String {
    format!(
        "SELECT DISTINCT trigger_schema, trigger_name, event_object_table \
         FROM information_schema.triggers WHERE {}",
        not_system("trigger_schema")
    )
}

#[must_use]
pub fn trigger_sql(schema: &str, name: &str) -> String {
    format!(
        "SELECT trigger_schema, trigger_name, event_object_table, action_timing, \
         event_manipulation, action_statement FROM information_schema.triggers \
         WHERE trigger_schema = {} AND trigger_name = {}",
        literal(schema),
        literal(name)
    )
}

// ================================================================
// Rows
// ================================================================

#[derive(Debug, Deserialize)]
struct SchemaRow {
    schema_name: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    table_schema: String,
    table_name: String,
    table_type: String,
}

#[derive(Debug, Deserialize)]
struct ColumnRow {
    table_schema: String,
    table_name: String,
    column_name: String,
    data_type: String,
    #[serde(deserialize_with = "lenient_bool")]
    not_null: bool,
    #[serde(default)]
    column_default: Option<String>,
    #[serde(default)]
    identity: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    ordinal_position: i64,
}

impl ColumnRow {
    fn is_auto_increment(&self) -> bool {
        matches!(self.identity.as_deref(), Some("a" | "d"))
            || self
                .column_default
                .as_deref()
                .is_some_and(|d| d.starts_with("nextval("))
    }

    fn to_column(&self) -> DatabaseTableColumn {
        DatabaseTableColumn::new(&self.column_name, &self.data_type).with_constraint(
            DatabaseColumnConstraint {
                not_null: self.not_null,
                default_expression: self.column_default.clone(),
                auto_increment: self.is_auto_increment(),
                ..DatabaseColumnConstraint::default()
            },
        )
    }
}

#[derive(Debug, Deserialize)]
struct PrimaryKeyRow {
    table_schema: String,
    table_name: String,
    constraint_name: String,
    column_name: String,
    #[serde(deserialize_with = "lenient_i64")]
    key_position: i64,
}

#[derive(Debug, Deserialize)]
struct TriggerListRow {
    trigger_schema: String,
    trigger_name: String,
    event_object_table: String,
}

#[derive(Debug, Deserialize)]
struct TriggerRow {
    trigger_schema: String,
    trigger_name: String,
    event_object_table: String,
    action_timing: String,
    event_manipulation: String,
    action_statement: String,
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

fn sorted_primary_keys(primary_keys: &ResultSet) -> Result<Vec<PrimaryKeyRow>> {
    let mut rows: Vec<PrimaryKeyRow> = primary_keys.decode_rows(PRIMARY_KEYS_QUERY)?;
    rows.sort_by(|a, b| {
        (&a.table_schema, &a.table_name, a.key_position).cmp(&(
            &b.table_schema,
            &b.table_name,
            b.key_position,
        ))
    });
    Ok(rows)
}

fn attach_column(table: &mut DatabaseTableSchema, row: &ColumnRow) {
    if row.is_auto_increment() {
        table.auto_increment = true;
    }
    table.columns.push(row.to_column());
}

fn attach_primary_key(table: &mut DatabaseTableSchema, row: &PrimaryKeyRow) {
    push_pk(table, &row.column_name);
    table.pk_constraint_name = Some(row.constraint_name.clone());
    if let Some(column) = table.columns.iter_mut().find(|c| c.name == row.column_name) {
        let mut constraint = column.constraint_or_default();
        constraint.primary_key = true;
        column.constraint = constraint.into_option();
    }
}

// ================================================================
// Folding
// ================================================================

/// Catalog listings needed by [`build_schemas`].
#[derive(Debug, Clone, Copy)]
pub struct CatalogListings<'a> {
    pub schemas: &'a ResultSet,
    pub tables: &'a ResultSet,
    pub columns: &'a ResultSet,
    pub primary_keys: &'a ResultSet,
    pub constraints: &'a ResultSet,
    pub triggers: &'a ResultSet,
}

/// Folds the catalog listings into [`DatabaseSchemas`].
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when a row lacks a required field.
pub fn build_schemas(listings: CatalogListings<'_>) -> Result<DatabaseSchemas> {
    let mut index = SchemaIndex::default();
    for row in listings.schemas.decode_rows::<SchemaRow>(SCHEMAS_QUERY)? {
        index.add_schema(&row.schema_name);
    }

    for row in listings.tables.decode_rows::<TableRow>(TABLES_QUERY)? {
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

    for row in sorted_columns(listings.columns)? {
        match index.table_mut(&row.table_schema, &row.table_name) {
            Some(table) => attach_column(table, &row),
            None => orphan_column(&row.table_schema, &row.table_name, &row.column_name),
        }
    }

    for row in sorted_primary_keys(listings.primary_keys)? {
        if let Some(table) = index.table_mut(&row.table_schema, &row.table_name) {
            attach_primary_key(table, &row);
        }
    }

    for ((schema, table), constraint) in build_constraints(CONSTRAINTS_QUERY, listings.constraints)?
    {
        if let Some(table) = index.table_mut(&schema, &table) {
            table.constraints.push(constraint);
        }
    }

    for row in listings
        .triggers
        .decode_rows::<TriggerListRow>(TRIGGERS_QUERY)?
    {
        index.add_item(DatabaseSchemaItem::trigger(
            &row.trigger_schema,
            &row.trigger_name,
            &row.event_object_table,
        ));
    }

    Ok(index.finish())
}

/// Folds the columns, primary key and constraints of one table.
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when a row lacks a required field.
pub fn build_table_schema(
    schema: &str,
    table: &str,
    columns: &ResultSet,
    primary_key: &ResultSet,
    constraints: &ResultSet,
) -> Result<DatabaseTableSchema> {
    let mut result = DatabaseTableSchema::new(schema, table);
    for row in sorted_columns(columns)? {
        attach_column(&mut result, &row);
    }
    for row in sorted_primary_keys(primary_key)? {
        attach_primary_key(&mut result, &row);
    }
    result.constraints.extend(
        build_constraints(CONSTRAINTS_QUERY, constraints)?
            .into_iter()
            .map(|(_, constraint)| constraint),
    );
    Ok(result)
}

/// Builds a trigger from its `information_schema.triggers` rows. A trigger
/// firing on several events yields one row per event; the first is used.
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when no row is returned or the
/// timing or event is not recognized.
pub fn build_trigger(result: &ResultSet) -> Result<DatabaseTriggerSchema> {
    let row = result
        .decode_rows::<TriggerRow>(TRIGGERS_QUERY)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::incomplete(TRIGGERS_QUERY, "trigger not found"))?;
    let when = TriggerTiming::parse(&row.action_timing).ok_or_else(|| {
        Error::incomplete(
            TRIGGERS_QUERY,
            format!("unknown action_timing '{}'", row.action_timing),
        )
    })?;
    let operation = TriggerOperation::parse(&row.event_manipulation).ok_or_else(|| {
        Error::incomplete(
            TRIGGERS_QUERY,
            format!("unknown event_manipulation '{}'", row.event_manipulation),
        )
    })?;
    Ok(DatabaseTriggerSchema {
        name: row.trigger_name,
        schema_name: row.trigger_schema,
        table_name: row.event_object_table,
        when,
        operation,
        statement: row.action_statement,
    })
}

#[derive(Debug, Deserialize)]
struct CurrentSchemaRow {
    current_schema: Option<String>,
}

/// Reads the `current_schema()` row.
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when no row is returned.
pub fn current_schema(result: &ResultSet) -> Result<Option<String>> {
    result
        .decode_rows::<CurrentSchemaRow>(CURRENT_SCHEMA_QUERY)?
        .into_iter()
        .next()
        .map(|row| row.current_schema)
        .ok_or_else(|| Error::incomplete(CURRENT_SCHEMA_QUERY, "no row returned"))
}
