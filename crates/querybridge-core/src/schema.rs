//! Schema model shared by every dialect.
//!
//! These types describe what introspection found and what the user wants a
//! table to look like. They serialize in camelCase so a UI can consume them
//! directly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::SqlValue;

/// All schemas of a database, keyed by schema name.
pub type DatabaseSchemas = BTreeMap<String, Vec<DatabaseSchemaItem>>;

/// What a foreign key does when the referenced row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    /// Parses catalog spellings such as `SET NULL`, `CASCADE` or the
    /// one-letter `pg_constraint` codes.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "NO ACTION" | "A" => Some(Self::NoAction),
            "RESTRICT" | "R" => Some(Self::Restrict),
            "CASCADE" | "C" => Some(Self::Cascade),
            "SET NULL" | "N" => Some(Self::SetNull),
            "SET DEFAULT" | "D" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        })
    }
}

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyReference {
    /// Referenced table.
    pub table: String,
    /// Referenced columns. Empty means the referenced primary key.
    pub columns: Vec<String>,
    /// `None` leaves the database default, `NO ACTION`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKeyReference {
    /// Reference to `columns` of `table` without referential actions.
    #[must_use]
    pub fn new(table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            table: table.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            on_delete: None,
            on_update: None,
        }
    }

    #[must_use]
    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    #[must_use]
    pub const fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

/// Column-level constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseColumnConstraint {
    pub not_null: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<SqlValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyReference>,
    pub unique: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_expression: Option<String>,
}

impl DatabaseColumnConstraint {
    /// Returns `true` when a DEFAULT clause would be rendered.
    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.default_value.is_some() || self.default_expression.is_some()
    }

    /// Returns `None` when every attribute has its default value.
    #[must_use]
    pub fn into_option(self) -> Option<Self> {
        (self != Self::default()).then_some(self)
    }
}

/// A column of a table or view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTableColumn {
    pub name: String,
    /// Type string, opaque to the model (e.g. `varchar(50)`).
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<DatabaseColumnConstraint>,
}

impl DatabaseTableColumn {
    /// Creates a nullable column without constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            constraint: None,
        }
    }

    /// Replaces the column's constraints, dropping an all-default value.
    #[must_use]
    pub fn with_constraint(mut self, constraint: DatabaseColumnConstraint) -> Self {
        self.constraint = constraint.into_option();
        self
    }

    fn constraint_mut(&mut self) -> &mut DatabaseColumnConstraint {
        self.constraint.get_or_insert_with(Default::default)
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.constraint_mut().not_null = true;
        self
    }

    /// Sets a literal default.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<SqlValue>) -> Self {
        self.constraint_mut().default_value = Some(value.into());
        self
    }

    /// Sets a default expression rendered verbatim.
    #[must_use]
    pub fn default_expression(mut self, expression: impl Into<String>) -> Self {
        self.constraint_mut().default_expression = Some(expression.into());
        self
    }

    /// Marks the column as (part of) the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.constraint_mut().primary_key = true;
        self
    }

    /// Marks the column auto-incrementing.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.constraint_mut().auto_increment = true;
        self
    }

    /// Marks the column UNIQUE.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.constraint_mut().unique = true;
        self
    }

    /// Adds a CHECK expression.
    #[must_use]
    pub fn check(mut self, expression: impl Into<String>) -> Self {
        self.constraint_mut().check_expression = Some(expression.into());
        self
    }

    /// Adds a foreign key reference.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, columns: &[&str]) -> Self {
        self.constraint_mut().foreign_key = Some(ForeignKeyReference::new(table, columns));
        self
    }

    /// Returns the constraints, or the all-default constraint.
    #[must_use]
    pub fn constraint_or_default(&self) -> DatabaseColumnConstraint {
        self.constraint.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn is_not_null(&self) -> bool {
        self.constraint.as_ref().is_some_and(|c| c.not_null)
    }

    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.constraint.as_ref().is_some_and(|c| c.primary_key)
    }

    #[must_use]
    pub fn is_auto_increment(&self) -> bool {
        self.constraint.as_ref().is_some_and(|c| c.auto_increment)
    }

    #[must_use]
    pub fn has_default(&self) -> bool {
        self.constraint
            .as_ref()
            .is_some_and(DatabaseColumnConstraint::has_default)
    }

    /// Compares two columns, treating a missing constraint as the
    /// all-default constraint.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.name == other.name
            && self.column_type == other.column_type
            && self.constraint_or_default() == other.constraint_or_default()
    }
}

/// Kind of a table-level constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TableConstraintKind {
    Unique {
        columns: Vec<String>,
    },
    ForeignKey {
        columns: Vec<String>,
        references: ForeignKeyReference,
    },
    Check {
        expression: String,
    },
}

/// A table-level constraint other than the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTableConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: TableConstraintKind,
}

impl DatabaseTableConstraint {
    /// Named UNIQUE constraint over `columns`.
    #[must_use]
    pub fn unique(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: Some(name.into()),
            kind: TableConstraintKind::Unique {
                columns: columns.iter().map(|c| (*c).to_string()).collect(),
            },
        }
    }

    /// Named CHECK constraint.
    #[must_use]
    pub fn check(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            kind: TableConstraintKind::Check {
                expression: expression.into(),
            },
        }
    }

    /// Named FOREIGN KEY constraint.
    #[must_use]
    pub fn foreign_key(
        name: impl Into<String>,
        columns: &[&str],
        table: impl Into<String>,
        referenced: &[&str],
    ) -> Self {
        Self {
            name: Some(name.into()),
            kind: TableConstraintKind::ForeignKey {
                columns: columns.iter().map(|c| (*c).to_string()).collect(),
                references: ForeignKeyReference::new(table, referenced),
            },
        }
    }
}

/// Full description of a table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTableSchema {
    pub schema_name: String,
    pub table_name: String,
    /// Columns in ordinal order.
    pub columns: Vec<DatabaseTableColumn>,
    /// Primary key column names in key order.
    #[serde(default)]
    pub pk: Vec<String>,
    #[serde(default)]
    pub auto_increment: bool,
    /// Name of the primary key constraint, when the catalog exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk_constraint_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<DatabaseTableConstraint>,
    /// Clauses of the table definition the model cannot express, such as
    /// `COLLATE` or `WITHOUT ROWID`. A table carrying any cannot be
    /// recreated without losing them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opaque_clauses: Vec<String>,
}

impl DatabaseTableSchema {
    /// Creates an empty table description.
    #[must_use]
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Appends a column. A column flagged as primary key joins `pk`.
    #[must_use]
    pub fn column(mut self, column: DatabaseTableColumn) -> Self {
        if column.is_primary_key() {
            self.pk.push(column.name.clone());
        }
        if column.is_auto_increment() {
            self.auto_increment = true;
        }
        self.columns.push(column);
        self
    }

    /// Appends a table-level constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: DatabaseTableConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&DatabaseTableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Kind of an object listed in a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaItemKind {
    Table,
    View,
    Trigger,
}

/// An object listed in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSchemaItem {
    #[serde(rename = "type")]
    pub kind: SchemaItemKind,
    pub name: String,
    pub schema_name: String,
    /// Table a trigger belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Column information for tables and views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_schema: Option<DatabaseTableSchema>,
}

impl DatabaseSchemaItem {
    /// A table item carrying an empty table description.
    #[must_use]
    pub fn table(kind: SchemaItemKind, schema_name: &str, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            schema_name: schema_name.to_string(),
            table_name: None,
            table_schema: Some(DatabaseTableSchema::new(schema_name, name)),
        }
    }

    /// A trigger item attached to `table_name`.
    #[must_use]
    pub fn trigger(schema_name: &str, name: &str, table_name: &str) -> Self {
        Self {
            kind: SchemaItemKind::Trigger,
            name: name.to_string(),
            schema_name: schema_name.to_string(),
            table_name: Some(table_name.to_string()),
            table_schema: None,
        }
    }
}

/// When a trigger fires relative to its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

impl TriggerTiming {
    /// Parses catalog spellings such as `BEFORE` or `INSTEAD OF`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "BEFORE" => Some(Self::Before),
            "AFTER" => Some(Self::After),
            "INSTEAD OF" => Some(Self::InsteadOf),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Before => "BEFORE",
            Self::After => "AFTER",
            Self::InsteadOf => "INSTEAD OF",
        })
    }
}

/// Data change that fires a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerOperation {
    Insert,
    Update,
    Delete,
}

impl TriggerOperation {
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        })
    }
}

/// Description of a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTriggerSchema {
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub when: TriggerTiming,
    pub operation: TriggerOperation,
    /// Trigger body.
    pub statement: String,
}
