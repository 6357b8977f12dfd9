//! Catalog introspection.
//!
//! Each dialect module holds the catalog queries it needs and pure
//! functions folding their [`ResultSet`](crate::result::ResultSet)s into
//! the schema model. Rows are decoded into typed structs at the boundary;
//! a row that does not fit raises
//! [`Error::IncompleteMetadata`](crate::error::Error::IncompleteMetadata).

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::Result;
use crate::result::ResultSet;
use crate::schema::{
    DatabaseSchemaItem, DatabaseSchemas, DatabaseTableConstraint, DatabaseTableSchema,
    ForeignKeyReference, ReferentialAction, TableConstraintKind,
};

// ================================================================
// Lenient decoders
// ================================================================

/// Transports encode booleans and integers differently (`true`, `1`,
/// `"YES"`, `"t"`, `"1"`); these decoders accept all of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn loose_to_bool<E: serde::de::Error>(value: Loose) -> std::result::Result<bool, E> {
    match value {
        Loose::Bool(b) => Ok(b),
        Loose::Int(i) => Ok(i != 0),
        Loose::Float(f) => Ok(f != 0.0),
        Loose::Text(s) => match s.trim().to_ascii_uppercase().as_str() {
            "YES" | "Y" | "TRUE" | "T" | "1" | "ON" => Ok(true),
            "NO" | "N" | "FALSE" | "F" | "0" | "OFF" | "" => Ok(false),
            other => Err(E::custom(format!("expected a boolean, found '{other}'"))),
        },
    }
}

#[allow(clippy::cast_possible_truncation)]
fn loose_to_i64<E: serde::de::Error>(value: Loose) -> std::result::Result<i64, E> {
    match value {
        Loose::Bool(b) => Ok(i64::from(b)),
        Loose::Int(i) => Ok(i),
        Loose::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
        Loose::Float(f) => Err(E::custom(format!("expected an integer, found {f}"))),
        Loose::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("expected an integer, found '{s}'"))),
    }
}

pub(crate) fn lenient_bool<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<bool, D::Error> {
    loose_to_bool(Loose::deserialize(deserializer)?)
}

pub(crate) fn lenient_opt_bool<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<bool>, D::Error> {
    Option::<Loose>::deserialize(deserializer)?
        .map(loose_to_bool)
        .transpose()
}

pub(crate) fn lenient_i64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<i64, D::Error> {
    loose_to_i64(Loose::deserialize(deserializer)?)
}

pub(crate) fn lenient_opt_i64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    Option::<Loose>::deserialize(deserializer)?
        .map(loose_to_i64)
        .transpose()
}

/// Accepts a string, or a number rendered as a string.
pub(crate) fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        None => None,
        Some(Loose::Text(s)) => Some(s),
        Some(Loose::Int(i)) => Some(i.to_string()),
        Some(Loose::Float(f)) => Some(f.to_string()),
        Some(Loose::Bool(b)) => Some(b.to_string()),
    })
}

// ================================================================
// Schema index
// ================================================================

/// Builds [`DatabaseSchemas`]: schemas first, then tables keyed by
/// `(schema, table)`, then columns attached by that key.
#[derive(Debug, Default)]
pub(crate) struct SchemaIndex {
    schemas: BTreeMap<String, Vec<DatabaseSchemaItem>>,
    tables: BTreeMap<(String, String), usize>,
}

impl SchemaIndex {
    pub(crate) fn add_schema(&mut self, name: &str) {
        self.schemas.entry(name.to_string()).or_default();
    }

    /// Adds an item to an already listed schema. Items of unlisted schemas
    /// are dropped.
    pub(crate) fn add_item(&mut self, item: DatabaseSchemaItem) {
        let Some(items) = self.schemas.get_mut(&item.schema_name) else {
            debug!(
                schema = %item.schema_name,
                name = %item.name,
                "Dropping object of unlisted schema"
            );
            return;
        };
        if item.table_schema.is_some() {
            self.tables
                .insert((item.schema_name.clone(), item.name.clone()), items.len());
        }
        items.push(item);
    }

    pub(crate) fn table_mut(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Option<&mut DatabaseTableSchema> {
        let position = *self.tables.get(&(schema.to_string(), table.to_string()))?;
        self.schemas
            .get_mut(schema)?
            .get_mut(position)?
            .table_schema
            .as_mut()
    }

    /// Finishes the index. Items are ordered by kind, then name.
    pub(crate) fn finish(self) -> DatabaseSchemas {
        self.schemas
            .into_iter()
            .map(|(schema, mut items)| {
                items.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
                (schema, items)
            })
            .collect()
    }
}

/// Logs a column whose table is absent from the index.
pub(crate) fn orphan_column(schema: &str, table: &str, column: &str) {
    debug!(
        schema = %schema,
        table = %table,
        column = %column,
        "Dropping column of unknown table"
    );
}

// ================================================================
// Table constraints
// ================================================================

/// One column of a UNIQUE, FOREIGN KEY or CHECK constraint. Both catalogs
/// are aliased to these names; `constraint_type` is either the
/// `pg_constraint.contype` letter or the `information_schema` spelling.
#[derive(Debug, Deserialize)]
struct ConstraintRow {
    table_schema: String,
    table_name: String,
    constraint_name: String,
    constraint_type: String,
    #[serde(default)]
    column_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    key_position: Option<i64>,
    #[serde(default)]
    referenced_table: Option<String>,
    #[serde(default)]
    referenced_column: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    on_delete: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    on_update: Option<String>,
    #[serde(default)]
    check_expression: Option<String>,
}

/// A referential action, with `NO ACTION` folded into `None`.
fn declared_action(text: Option<&str>) -> Option<ReferentialAction> {
    text.and_then(ReferentialAction::parse)
        .filter(|action| *action != ReferentialAction::NoAction)
}

fn fold_constraint(rows: &[ConstraintRow]) -> Option<DatabaseTableConstraint> {
    let first = rows.first()?;
    let mut columns: Vec<String> = Vec::new();
    let mut referenced: Vec<String> = Vec::new();
    for row in rows {
        if let Some(name) = &row.column_name {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
        if let Some(name) = &row.referenced_column {
            if !referenced.contains(name) {
                referenced.push(name.clone());
            }
        }
    }

    let kind = match first.constraint_type.trim().to_ascii_uppercase().as_str() {
        "U" | "UNIQUE" => TableConstraintKind::Unique { columns },
        "F" | "FOREIGN KEY" => TableConstraintKind::ForeignKey {
            columns,
            references: ForeignKeyReference {
                table: first.referenced_table.clone()?,
                columns: referenced,
                on_delete: declared_action(first.on_delete.as_deref()),
                on_update: declared_action(first.on_update.as_deref()),
            },
        },
        "C" | "CHECK" => TableConstraintKind::Check {
            expression: first.check_expression.clone()?,
        },
        other => {
            debug!(
                table = %first.table_name,
                constraint = %first.constraint_name,
                kind = %other,
                "Skipping constraint of unknown kind"
            );
            return None;
        }
    };
    Some(DatabaseTableConstraint {
        name: Some(first.constraint_name.clone()),
        kind,
    })
}

/// Folds constraint rows into named table constraints keyed by
/// `(schema, table)`, in constraint name order.
pub(crate) fn build_constraints(
    query: &'static str,
    result: &ResultSet,
) -> Result<Vec<((String, String), DatabaseTableConstraint)>> {
    let mut rows: Vec<ConstraintRow> = result.decode_rows(query)?;
    rows.sort_by(|a, b| {
        (
            &a.table_schema,
            &a.table_name,
            &a.constraint_name,
            a.key_position,
        )
            .cmp(&(
                &b.table_schema,
                &b.table_name,
                &b.constraint_name,
                b.key_position,
            ))
    });

    let mut constraints = Vec::new();
    for group in rows.chunk_by(|a, b| {
        (&a.table_schema, &a.table_name, &a.constraint_name)
            == (&b.table_schema, &b.table_name, &b.constraint_name)
    }) {
        if let Some(constraint) = fold_constraint(group) {
            let key = (group[0].table_schema.clone(), group[0].table_name.clone());
            constraints.push((key, constraint));
        }
    }
    Ok(constraints)
}

/// Pushes `name` onto `pk` unless already present.
pub(crate) fn push_pk(table: &mut DatabaseTableSchema, name: &str) {
    if !table.pk.iter().any(|pk| pk == name) {
        table.pk.push(name.to_string());
    }
}
