//! Requested changes to a table.
//!
//! A [`DatabaseTableSchemaChange`] pairs every column (and table constraint)
//! before and after the edit. The key of each entry is its identity: it
//! survives renames, which is what lets the diff engine tell a rename from a
//! drop followed by an add.

use serde::{Deserialize, Serialize};

use crate::schema::{DatabaseTableColumn, DatabaseTableConstraint, DatabaseTableSchema};

/// How one entry of a change differs between its old and new side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Unchanged,
    Added,
    Removed,
    Changed,
}

/// Old and new table name. A missing `new` keeps the old name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableNameChange {
    /// `None` when the table is being created.
    #[serde(default)]
    pub old: Option<String>,
    #[serde(default)]
    pub new: Option<String>,
}

/// Before/after pair for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTableColumnChange {
    /// Stable identity of the column within this change.
    pub key: String,
    #[serde(default)]
    pub old: Option<DatabaseTableColumn>,
    #[serde(default)]
    pub new: Option<DatabaseTableColumn>,
}

impl DatabaseTableColumnChange {
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match (&self.old, &self.new) {
            (None, Some(_)) => ChangeKind::Added,
            (Some(_), None) => ChangeKind::Removed,
            (Some(old), Some(new)) if !old.same_definition(new) => ChangeKind::Changed,
            _ => ChangeKind::Unchanged,
        }
    }
}

/// Before/after pair for one table-level constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTableConstraintChange {
    pub key: String,
    #[serde(default)]
    pub old: Option<DatabaseTableConstraint>,
    #[serde(default)]
    pub new: Option<DatabaseTableConstraint>,
}

impl DatabaseTableConstraintChange {
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match (&self.old, &self.new) {
            (None, Some(_)) => ChangeKind::Added,
            (Some(_), None) => ChangeKind::Removed,
            (Some(old), Some(new)) if old != new => ChangeKind::Changed,
            _ => ChangeKind::Unchanged,
        }
    }
}

/// A requested change to one table.
///
/// The new primary key is derived from the `primary_key` flag of each new
/// column; the old one comes from `original.pk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTableSchemaChange {
    pub schema_name: String,
    pub name: TableNameChange,
    /// Table as introspected before the edit. `None` for a new table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<DatabaseTableSchema>,
    pub columns: Vec<DatabaseTableColumnChange>,
    #[serde(default)]
    pub constraints: Vec<DatabaseTableConstraintChange>,
}

impl DatabaseTableSchemaChange {
    /// Starts an edit of an existing table with every column unchanged.
    #[must_use]
    pub fn from_table(table: &DatabaseTableSchema) -> Self {
        let columns = table
            .columns
            .iter()
            .map(|column| {
                let mut column = column.clone();
                if table.pk.contains(&column.name) && !column.is_primary_key() {
                    column = column.primary_key();
                }
                DatabaseTableColumnChange {
                    key: column.name.clone(),
                    old: Some(column.clone()),
                    new: Some(column),
                }
            })
            .collect();
        let constraints = table
            .constraints
            .iter()
            .enumerate()
            .map(|(idx, constraint)| DatabaseTableConstraintChange {
                key: constraint
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("constraint:{idx}")),
                old: Some(constraint.clone()),
                new: Some(constraint.clone()),
            })
            .collect();
        let mut original = table.clone();
        for column in &mut original.columns {
            if original.pk.contains(&column.name) && !column.is_primary_key() {
                *column = column.clone().primary_key();
            }
        }
        Self {
            schema_name: table.schema_name.clone(),
            name: TableNameChange {
                old: Some(table.table_name.clone()),
                new: Some(table.table_name.clone()),
            },
            original: Some(original),
            columns,
            constraints,
        }
    }

    /// Starts the definition of a new table.
    #[must_use]
    pub fn create(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            name: TableNameChange {
                old: None,
                new: Some(table_name.into()),
            },
            original: None,
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Current name before the edit, if the table exists.
    #[must_use]
    pub fn old_name(&self) -> Option<&str> {
        self.name.old.as_deref()
    }

    /// Name after the edit.
    #[must_use]
    pub fn new_name(&self) -> Option<&str> {
        self.name.new.as_deref().or(self.name.old.as_deref())
    }

    fn column_mut(&mut self, name: &str) -> Option<&mut DatabaseTableColumn> {
        self.columns
            .iter_mut()
            .filter_map(|c| c.new.as_mut())
            .find(|c| c.name == name)
    }

    /// Renames the table.
    #[must_use]
    pub fn rename_table(mut self, new_name: impl Into<String>) -> Self {
        self.name.new = Some(new_name.into());
        self
    }

    /// Appends a new column.
    #[must_use]
    pub fn add_column(mut self, column: DatabaseTableColumn) -> Self {
        let key = format!("added:{}", self.columns.len());
        self.columns.push(DatabaseTableColumnChange {
            key,
            old: None,
            new: Some(column),
        });
        self
    }

    /// Drops the column currently named `name`. Unknown names are ignored.
    #[must_use]
    pub fn remove_column(mut self, name: &str) -> Self {
        if let Some(change) = self
            .columns
            .iter_mut()
            .find(|c| c.new.as_ref().is_some_and(|n| n.name == name))
        {
            change.new = None;
        }
        self
    }

    /// Renames the column currently named `from`.
    #[must_use]
    pub fn rename_column(mut self, from: &str, to: impl Into<String>) -> Self {
        if let Some(column) = self.column_mut(from) {
            column.name = to.into();
        }
        self
    }

    /// Changes the type of the column currently named `name`.
    #[must_use]
    pub fn retype_column(mut self, name: &str, column_type: impl Into<String>) -> Self {
        if let Some(column) = self.column_mut(name) {
            column.column_type = column_type.into();
        }
        self
    }

    /// Edits the column currently named `name` in place, keeping its
    /// identity.
    #[must_use]
    pub fn update_column(
        mut self,
        name: &str,
        edit: impl FnOnce(DatabaseTableColumn) -> DatabaseTableColumn,
    ) -> Self {
        if let Some(current) = self.column_mut(name) {
            *current = edit(current.clone());
        }
        self
    }

    /// Sets the primary key to the columns currently named in `columns`.
    #[must_use]
    pub fn set_primary_key(mut self, columns: &[&str]) -> Self {
        for change in &mut self.columns {
            if let Some(column) = change.new.as_mut() {
                let wanted = columns.contains(&column.name.as_str());
                if wanted != column.is_primary_key() {
                    let mut constraint = column.constraint_or_default();
                    constraint.primary_key = wanted;
                    column.constraint = constraint.into_option();
                }
            }
        }
        self
    }

    /// Adds a table-level constraint.
    #[must_use]
    pub fn add_constraint(mut self, constraint: DatabaseTableConstraint) -> Self {
        let key = format!("added-constraint:{}", self.constraints.len());
        self.constraints.push(DatabaseTableConstraintChange {
            key,
            old: None,
            new: Some(constraint),
        });
        self
    }

    /// Drops the table-level constraint named `name`.
    #[must_use]
    pub fn remove_constraint(mut self, name: &str) -> Self {
        if let Some(change) = self
            .constraints
            .iter_mut()
            .find(|c| c.new.as_ref().and_then(|n| n.name.as_deref()) == Some(name))
        {
            change.new = None;
        }
        self
    }

    /// Columns as they exist after the edit, in order.
    pub fn new_columns(&self) -> impl Iterator<Item = &DatabaseTableColumn> {
        self.columns.iter().filter_map(|c| c.new.as_ref())
    }

    /// Primary key names after the edit. Columns already in the key keep
    /// their key order; the others follow in column order.
    #[must_use]
    pub fn new_primary_key(&self) -> Vec<String> {
        let old_order: Vec<&str> = self
            .original
            .as_ref()
            .map(|table| table.pk.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let mut ranked: Vec<(usize, &DatabaseTableColumn)> = self
            .columns
            .iter()
            .filter_map(|change| {
                let new = change.new.as_ref().filter(|c| c.is_primary_key())?;
                let rank = change
                    .old
                    .as_ref()
                    .and_then(|old| old_order.iter().position(|pk| *pk == old.name))
                    .unwrap_or(usize::MAX);
                Some((rank, new))
            })
            .collect();
        ranked.sort_by_key(|(rank, _)| *rank);
        ranked.into_iter().map(|(_, c)| c.name.clone()).collect()
    }

    /// Primary key identities before the edit.
    #[must_use]
    pub fn old_primary_key_keys(&self) -> Vec<&str> {
        let old_pk: Vec<&str> = match &self.original {
            Some(table) => table.pk.iter().map(String::as_str).collect(),
            None => self
                .columns
                .iter()
                .filter_map(|c| c.old.as_ref())
                .filter(|c| c.is_primary_key())
                .map(|c| c.name.as_str())
                .collect(),
        };
        self.columns
            .iter()
            .filter(|c| {
                c.old
                    .as_ref()
                    .is_some_and(|o| old_pk.contains(&o.name.as_str()))
            })
            .map(|c| c.key.as_str())
            .collect()
    }

    /// Primary key identities after the edit.
    #[must_use]
    pub fn new_primary_key_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| {
                c.new
                    .as_ref()
                    .is_some_and(DatabaseTableColumn::is_primary_key)
            })
            .map(|c| c.key.as_str())
            .collect()
    }

    /// Whether the set of primary key columns changes.
    #[must_use]
    pub fn primary_key_changed(&self) -> bool {
        let mut old = self.old_primary_key_keys();
        let mut new = self.new_primary_key_keys();
        old.sort_unstable();
        new.sort_unstable();
        old != new
    }

    /// Whether the table is renamed.
    #[must_use]
    pub fn is_renamed(&self) -> bool {
        matches!((self.old_name(), self.new_name()), (Some(old), Some(new)) if old != new)
    }

    /// The table as it should look after the edit.
    #[must_use]
    pub fn target(&self) -> DatabaseTableSchema {
        let columns: Vec<DatabaseTableColumn> = self.new_columns().cloned().collect();
        DatabaseTableSchema {
            schema_name: self.schema_name.clone(),
            table_name: self.new_name().unwrap_or_default().to_string(),
            auto_increment: columns.iter().any(DatabaseTableColumn::is_auto_increment),
            pk: self.new_primary_key(),
            columns,
            pk_constraint_name: None,
            constraints: self
                .constraints
                .iter()
                .filter_map(|c| c.new.clone())
                .collect(),
            opaque_clauses: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> DatabaseTableSchema {
        DatabaseTableSchema::new("main", "users")
            .column(
                DatabaseTableColumn::new("id", "INTEGER")
                    .primary_key()
                    .auto_increment(),
            )
            .column(DatabaseTableColumn::new("name", "varchar(50)"))
    }

    #[test]
    fn test_from_table_is_unchanged() {
        let change = DatabaseTableSchemaChange::from_table(&users());
        assert!(change
            .columns
            .iter()
            .all(|c| c.kind() == ChangeKind::Unchanged));
        assert!(!change.primary_key_changed());
        assert!(!change.is_renamed());
    }

    #[test]
    fn test_from_table_flags_pk_columns() {
        let mut table = users();
        table.columns[0].constraint = None;
        let change = DatabaseTableSchemaChange::from_table(&table);
        assert!(change.columns[0].new.as_ref().unwrap().is_primary_key());
        assert!(!change.primary_key_changed());
    }

    #[test]
    fn test_rename_keeps_identity() {
        let change =
            DatabaseTableSchemaChange::from_table(&users()).rename_column("name", "full_name");
        let entry = &change.columns[1];
        assert_eq!(entry.key, "name");
        assert_eq!(entry.kind(), ChangeKind::Changed);
        assert_eq!(entry.new.as_ref().unwrap().name, "full_name");
    }

    #[test]
    fn test_add_and_remove() {
        let change = DatabaseTableSchemaChange::from_table(&users())
            .remove_column("name")
            .add_column(DatabaseTableColumn::new("name", "text"));
        assert_eq!(change.columns[1].kind(), ChangeKind::Removed);
        assert_eq!(change.columns[2].kind(), ChangeKind::Added);
        assert_ne!(change.columns[1].key, change.columns[2].key);
    }

    #[test]
    fn test_primary_key_rename_is_not_a_pk_change() {
        let change = DatabaseTableSchemaChange::from_table(&users()).rename_column("id", "user_id");
        assert!(!change.primary_key_changed());
        assert_eq!(change.new_primary_key(), vec!["user_id"]);
    }

    #[test]
    fn test_set_primary_key() {
        let change = DatabaseTableSchemaChange::from_table(&users()).set_primary_key(&["name"]);
        assert!(change.primary_key_changed());
        assert_eq!(change.target().pk, vec!["name"]);
    }

    #[test]
    fn test_target() {
        let change = DatabaseTableSchemaChange::from_table(&users())
            .rename_table("people")
            .add_column(DatabaseTableColumn::new("email", "text"));
        let target = change.target();
        assert_eq!(target.table_name, "people");
        assert_eq!(
            target
                .columns
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>(),
            vec!["id", "name", "email"]
        );
        assert!(change.is_renamed());
    }

    #[test]
    fn test_deserializes_from_json() {
        let change: DatabaseTableSchemaChange = serde_json::from_value(serde_json::json!({
            "schemaName": "main",
            "name": { "old": null, "new": "t" },
            "columns": [
                { "key": "a", "new": { "name": "a", "type": "INTEGER" } }
            ]
        }))
        .unwrap();
        assert_eq!(change.old_name(), None);
        assert_eq!(change.columns[0].kind(), ChangeKind::Added);
    }
}
