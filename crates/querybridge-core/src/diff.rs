//! Schema diff engine.
//!
//! Turns a [`DatabaseTableSchemaChange`] into the ordered DDL statements
//! that reshape one table. Dialects able to modify columns get a list of
//! ALTER statements; the others get a recreate migration that copies rows
//! into a freshly created table. Either the whole plan is produced or an
//! error is returned: no partial statement lists.

use std::fmt;

use tracing::{debug, warn};

use crate::change::{ChangeKind, DatabaseTableSchemaChange};
use crate::dialect::SqlDialect;
use crate::error::{Error, Result};
use crate::schema::{DatabaseTableColumn, DatabaseTableConstraint, TableConstraintKind};

// ================================================================
// Plan types
// ================================================================

/// Caller-visible caveats of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffWarning {
    /// A NOT NULL column without a default is added; this fails on a
    /// non-empty table.
    NotNullWithoutDefault {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// The table is recreated; its indexes and triggers are dropped with
    /// it and must be re-created by the caller.
    DependentObjectsDropped {
        /// Table name.
        table: String,
    },
    /// No column survives the recreate, so no rows are copied.
    NoColumnsCopied {
        /// Table name.
        table: String,
    },
}

impl fmt::Display for DiffWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotNullWithoutDefault { table, column } => write!(
                f,
                "column '{column}' of '{table}' is NOT NULL without a default; this fails if the table has rows"
            ),
            Self::DependentObjectsDropped { table } => write!(
                f,
                "table '{table}' is recreated; its indexes and triggers must be re-created"
            ),
            Self::NoColumnsCopied { table } => {
                write!(f, "no column of '{table}' survives; existing rows are discarded")
            }
        }
    }
}

/// How a plan reshapes the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStrategy {
    /// Nothing to do.
    Empty,
    /// The table does not exist yet.
    Create,
    /// In-place ALTER statements.
    Alter,
    /// Copy into a new table, drop the original, rename.
    Recreate,
}

/// Result of planning a table change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChangePlan {
    pub strategy: ChangeStrategy,
    /// Complete, independently executable statements, in order.
    pub statements: Vec<String>,
    pub warnings: Vec<DiffWarning>,
}

impl SchemaChangePlan {
    const fn new(strategy: ChangeStrategy) -> Self {
        Self {
            strategy,
            statements: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Returns `true` when there are no statements to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

// ================================================================
// Partitioning
// ================================================================

#[derive(Default)]
struct ColumnPartition<'a> {
    added: Vec<&'a DatabaseTableColumn>,
    removed: Vec<&'a DatabaseTableColumn>,
    changed: Vec<(&'a DatabaseTableColumn, &'a DatabaseTableColumn)>,
}

impl<'a> ColumnPartition<'a> {
    fn new(change: &'a DatabaseTableSchemaChange) -> Self {
        let mut partition = Self::default();
        for entry in &change.columns {
            match (entry.kind(), &entry.old, &entry.new) {
                (ChangeKind::Added, _, Some(new)) => partition.added.push(new),
                (ChangeKind::Removed, Some(old), _) => partition.removed.push(old),
                (ChangeKind::Changed, Some(old), Some(new)) => partition.changed.push((old, new)),
                _ => {}
            }
        }
        partition
    }

    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[derive(Default)]
struct ConstraintPartition<'a> {
    dropped: Vec<&'a DatabaseTableConstraint>,
    added: Vec<&'a DatabaseTableConstraint>,
}

impl<'a> ConstraintPartition<'a> {
    fn new(change: &'a DatabaseTableSchemaChange) -> Self {
        let mut partition = Self::default();
        for entry in &change.constraints {
            match entry.kind() {
                ChangeKind::Unchanged => {}
                _ => {
                    partition.dropped.extend(entry.old.as_ref());
                    partition.added.extend(entry.new.as_ref());
                }
            }
        }
        partition
    }

    fn is_empty(&self) -> bool {
        self.dropped.is_empty() && self.added.is_empty()
    }
}

fn lacks_default(column: &DatabaseTableColumn) -> bool {
    column.is_not_null() && !column.has_default() && !column.is_auto_increment()
}

// ================================================================
// Entry point
// ================================================================

/// Plans the DDL for `change` under `dialect`.
///
/// # Errors
///
/// Returns [`Error::InvalidTypeParameter`] when a new or retyped column
/// carries a type the dialect's catalog rejects, and
/// [`Error::UnsupportedOperation`] naming the first change the dialect
/// cannot express. No statements are produced in either case.
pub fn plan_table_schema_change<D: SqlDialect + ?Sized>(
    dialect: &D,
    change: &DatabaseTableSchemaChange,
) -> Result<SchemaChangePlan> {
    validate_column_types(dialect, change)?;
    let plan = match change.old_name() {
        None => plan_create(dialect, change)?,
        Some(old_name) => plan_existing(dialect, change, old_name)?,
    };

    let table = change.new_name().unwrap_or_default();
    debug!(
        table = %table,
        strategy = ?plan.strategy,
        statements = plan.statements.len(),
        "Planned schema change"
    );
    for warning in &plan.warnings {
        warn!(table = %table, "{warning}");
    }
    Ok(plan)
}

/// Convenience wrapper returning only the statements.
///
/// # Errors
///
/// See [`plan_table_schema_change`].
pub fn create_update_table_schema<D: SqlDialect + ?Sized>(
    dialect: &D,
    change: &DatabaseTableSchemaChange,
) -> Result<Vec<String>> {
    plan_table_schema_change(dialect, change).map(|plan| plan.statements)
}

/// Runs the type of every added or retyped column through the catalog.
/// Types already in the table are left alone, as are typeless columns.
fn validate_column_types<D: SqlDialect + ?Sized>(
    dialect: &D,
    change: &DatabaseTableSchemaChange,
) -> Result<()> {
    let selector = dialect.column_type_selector();
    for entry in &change.columns {
        let Some(new) = &entry.new else {
            continue;
        };
        let unchanged = matches!(&entry.old, Some(old) if old.column_type == new.column_type);
        if !unchanged && !new.column_type.trim().is_empty() {
            selector.validate(&new.column_type)?;
        }
    }
    Ok(())
}

fn plan_existing<D: SqlDialect + ?Sized>(
    dialect: &D,
    change: &DatabaseTableSchemaChange,
    old_name: &str,
) -> Result<SchemaChangePlan> {
    let flags = dialect.flags();
    let columns = ColumnPartition::new(change);
    let constraints = ConstraintPartition::new(change);
    let pk_changed = change.primary_key_changed();

    if columns.is_empty() && constraints.is_empty() && !pk_changed && !change.is_renamed() {
        return Ok(SchemaChangePlan::new(ChangeStrategy::Empty));
    }

    if flags.support_modify_column {
        plan_alter(
            dialect,
            change,
            old_name,
            &columns,
            &constraints,
            pk_changed,
        )
    } else if additions_only(&columns, &constraints, pk_changed) {
        Ok(plan_in_place_additions(dialect, change, old_name, &columns))
    } else if flags.support_create_update_table {
        plan_recreate(dialect, change, old_name, &columns)
    } else {
        Err(Error::unsupported(
            dialect.dialect(),
            describe_first_change(change, &columns, &constraints, pk_changed),
        ))
    }
}

fn describe_first_change(
    change: &DatabaseTableSchemaChange,
    columns: &ColumnPartition<'_>,
    constraints: &ConstraintPartition<'_>,
    pk_changed: bool,
) -> String {
    if let Some((old, new)) = columns
        .changed
        .iter()
        .find(|(old, new)| old.is_primary_key() && old.name != new.name)
    {
        return format!("rename primary key column '{}' to '{}'", old.name, new.name);
    }
    if pk_changed {
        return format!(
            "change the primary key to ({})",
            change.new_primary_key().join(", ")
        );
    }
    if let Some((old, _)) = columns.changed.first() {
        return format!("modify column '{}'", old.name);
    }
    if let Some(old) = columns.removed.first() {
        return format!("drop column '{}'", old.name);
    }
    if let Some(new) = columns.added.first() {
        return format!("add column '{}'", new.name);
    }
    if !constraints.is_empty() {
        return String::from("change table constraints");
    }
    String::from("rename table")
}

// ================================================================
// CREATE TABLE
// ================================================================

fn plan_create<D: SqlDialect + ?Sized>(
    dialect: &D,
    change: &DatabaseTableSchemaChange,
) -> Result<SchemaChangePlan> {
    let Some(name) = change.new_name() else {
        return Err(Error::unsupported(
            dialect.dialect(),
            "create a table without a name",
        ));
    };
    if !dialect.flags().support_create_update_table {
        return Err(Error::unsupported(
            dialect.dialect(),
            format!("create table '{name}'"),
        ));
    }
    let target = change.target();
    if target.columns.is_empty() {
        return Err(Error::unsupported(
            dialect.dialect(),
            format!("create table '{name}' without columns"),
        ));
    }

    let mut plan = SchemaChangePlan::new(ChangeStrategy::Create);
    plan.statements
        .push(dialect.create_table(&dialect.table_ref(&change.schema_name, name), &target));
    Ok(plan)
}

// ================================================================
// In-place ALTER
// ================================================================

fn plan_alter<D: SqlDialect + ?Sized>(
    dialect: &D,
    change: &DatabaseTableSchemaChange,
    old_name: &str,
    columns: &ColumnPartition<'_>,
    constraints: &ConstraintPartition<'_>,
    pk_changed: bool,
) -> Result<SchemaChangePlan> {
    let table_ref = dialect.table_ref(&change.schema_name, old_name);
    let mut plan = SchemaChangePlan::new(ChangeStrategy::Alter);

    // (i) renamed and retyped columns
    for (old, new) in &columns.changed {
        plan.statements
            .extend(dialect.alter_column(&table_ref, old, new)?);
    }

    // (ii) new columns
    for column in &columns.added {
        if lacks_default(column) {
            plan.warnings.push(DiffWarning::NotNullWithoutDefault {
                table: old_name.to_string(),
                column: column.name.clone(),
            });
        }
        plan.statements.push(dialect.add_column(&table_ref, column));
    }

    // (iii) dropped columns
    for column in &columns.removed {
        plan.statements
            .push(dialect.drop_column(&table_ref, &column.name));
    }

    // (iv) keys and constraints
    if pk_changed {
        let old_pk = change.old_primary_key_keys();
        let pk_column_survives = change
            .columns
            .iter()
            .any(|c| c.new.is_some() && old_pk.contains(&c.key.as_str()));
        // Dropping every key column already took the key with it.
        if pk_column_survives {
            plan.statements
                .push(dialect.drop_primary_key(&table_ref, change.original.as_ref())?);
        }
        let new_pk = change.new_primary_key();
        if !new_pk.is_empty() {
            plan.statements
                .push(dialect.add_primary_key(&table_ref, &new_pk));
        }
    }
    for constraint in &constraints.dropped {
        plan.statements
            .push(dialect.drop_table_constraint(&table_ref, constraint)?);
    }
    for (old, new) in &columns.changed {
        for constraint in column_key_changes(dialect, old, new)? {
            plan.statements
                .push(dialect.add_table_constraint(&table_ref, &constraint));
        }
    }
    for constraint in &constraints.added {
        plan.statements
            .push(dialect.add_table_constraint(&table_ref, constraint));
    }

    // (v) table rename
    if change.is_renamed() {
        if let Some(new_name) = change.new_name() {
            plan.statements
                .push(dialect.rename_table(&table_ref, new_name));
        }
    }

    Ok(plan)
}

/// Table constraints to add for column-level UNIQUE, REFERENCES and CHECK
/// attributes gained by an existing column. Losing one is unsupported
/// because such constraints carry no name to drop them by.
fn column_key_changes<D: SqlDialect + ?Sized>(
    dialect: &D,
    old: &DatabaseTableColumn,
    new: &DatabaseTableColumn,
) -> Result<Vec<DatabaseTableConstraint>> {
    let (before, after) = (old.constraint_or_default(), new.constraint_or_default());
    let mut added = Vec::new();

    if before.unique != after.unique {
        if before.unique {
            return Err(Error::unsupported(
                dialect.dialect(),
                format!(
                    "drop the unnamed UNIQUE constraint of column '{}'",
                    old.name
                ),
            ));
        }
        added.push(DatabaseTableConstraint {
            name: None,
            kind: TableConstraintKind::Unique {
                columns: vec![new.name.clone()],
            },
        });
    }

    if before.foreign_key != after.foreign_key {
        if before.foreign_key.is_some() {
            return Err(Error::unsupported(
                dialect.dialect(),
                format!("drop the unnamed foreign key of column '{}'", old.name),
            ));
        }
        if let Some(references) = after.foreign_key {
            added.push(DatabaseTableConstraint {
                name: None,
                kind: TableConstraintKind::ForeignKey {
                    columns: vec![new.name.clone()],
                    references,
                },
            });
        }
    }

    if before.check_expression != after.check_expression {
        if before.check_expression.is_some() {
            return Err(Error::unsupported(
                dialect.dialect(),
                format!("drop the unnamed CHECK constraint of column '{}'", old.name),
            ));
        }
        if let Some(expression) = after.check_expression {
            added.push(DatabaseTableConstraint {
                name: None,
                kind: TableConstraintKind::Check { expression },
            });
        }
    }

    Ok(added)
}

// ================================================================
// In-place additions
// ================================================================

fn additions_only(
    columns: &ColumnPartition<'_>,
    constraints: &ConstraintPartition<'_>,
    pk_changed: bool,
) -> bool {
    columns.changed.is_empty()
        && columns.removed.is_empty()
        && constraints.is_empty()
        && !pk_changed
        && columns.added.iter().all(|column| {
            let constraint = column.constraint_or_default();
            !constraint.primary_key
                && !constraint.unique
                && !constraint.auto_increment
                && constraint.default_expression.is_none()
                && !lacks_default(column)
        })
}

fn plan_in_place_additions<D: SqlDialect + ?Sized>(
    dialect: &D,
    change: &DatabaseTableSchemaChange,
    old_name: &str,
    columns: &ColumnPartition<'_>,
) -> SchemaChangePlan {
    let table_ref = dialect.table_ref(&change.schema_name, old_name);
    let mut plan = SchemaChangePlan::new(ChangeStrategy::Alter);
    for column in &columns.added {
        plan.statements.push(dialect.add_column(&table_ref, column));
    }
    if change.is_renamed() {
        if let Some(new_name) = change.new_name() {
            plan.statements
                .push(dialect.rename_table(&table_ref, new_name));
        }
    }
    plan
}

// ================================================================
// Recreate migration
// ================================================================

fn plan_recreate<D: SqlDialect + ?Sized>(
    dialect: &D,
    change: &DatabaseTableSchemaChange,
    old_name: &str,
    columns: &ColumnPartition<'_>,
) -> Result<SchemaChangePlan> {
    if let Some(clause) = change
        .original
        .as_ref()
        .and_then(|table| table.opaque_clauses.first())
    {
        return Err(Error::unsupported(
            dialect.dialect(),
            format!("recreate table '{old_name}' without losing its {clause}"),
        ));
    }

    let mut target = change.target();
    let new_name = target.table_name.clone();

    let mut temp_name = format!("{new_name}_new");
    while temp_name == old_name {
        temp_name.push_str("_new");
    }
    target.table_name.clone_from(&temp_name);

    let schema = &change.schema_name;
    let temp_ref = dialect.table_ref(schema, &temp_name);
    let original_ref = dialect.table_ref(schema, old_name);
    let mut plan = SchemaChangePlan::new(ChangeStrategy::Recreate);

    plan.statements
        .push(dialect.create_table(&temp_ref, &target));

    // Surviving columns, paired by identity, in new column order.
    let (new_names, old_names): (Vec<String>, Vec<String>) = change
        .columns
        .iter()
        .filter_map(|entry| match (&entry.old, &entry.new) {
            (Some(old), Some(new)) => Some((new.name.clone(), old.name.clone())),
            _ => None,
        })
        .unzip();
    if new_names.is_empty() {
        plan.warnings.push(DiffWarning::NoColumnsCopied {
            table: old_name.to_string(),
        });
    } else {
        plan.statements.push(format!(
            "INSERT INTO {temp_ref} ({}) SELECT {} FROM {original_ref}",
            dialect.column_list(&new_names),
            dialect.column_list(&old_names)
        ));
    }

    for column in &columns.added {
        if lacks_default(column) {
            plan.warnings.push(DiffWarning::NotNullWithoutDefault {
                table: old_name.to_string(),
                column: column.name.clone(),
            });
        }
    }

    plan.statements.push(format!("DROP TABLE {original_ref}"));
    plan.statements
        .push(dialect.rename_table(&temp_ref, &new_name));
    plan.warnings.push(DiffWarning::DependentObjectsDropped {
        table: old_name.to_string(),
    });
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect, SqliteDialect};
    use crate::flags::DriverFlags;
    use crate::schema::DatabaseTableSchema;

    fn users(schema: &str) -> DatabaseTableSchema {
        DatabaseTableSchema::new(schema, "users")
            .column(
                DatabaseTableColumn::new("id", "int")
                    .not_null()
                    .primary_key()
                    .auto_increment(),
            )
            .column(DatabaseTableColumn::new("name", "varchar(50)"))
    }

    #[test]
    fn test_unchanged_table_is_empty() {
        let change = DatabaseTableSchemaChange::from_table(&users(""));
        let plan = plan_table_schema_change(&MySqlDialect::new(), &change).unwrap();
        assert_eq!(plan.strategy, ChangeStrategy::Empty);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_not_null_without_default_warns() {
        let change = DatabaseTableSchemaChange::from_table(&users(""))
            .add_column(DatabaseTableColumn::new("age", "int").not_null());
        let plan = plan_table_schema_change(&MySqlDialect::new(), &change).unwrap();
        assert_eq!(
            plan.warnings,
            vec![DiffWarning::NotNullWithoutDefault {
                table: "users".into(),
                column: "age".into(),
            }]
        );
        assert_eq!(plan.statements.len(), 1);
    }

    #[test]
    fn test_sqlite_nullable_addition_stays_in_place() {
        let change = DatabaseTableSchemaChange::from_table(&users("main"))
            .add_column(DatabaseTableColumn::new("bio", "TEXT"));
        let plan = plan_table_schema_change(&SqliteDialect::new(), &change).unwrap();
        assert_eq!(plan.strategy, ChangeStrategy::Alter);
        assert_eq!(
            plan.statements,
            vec!["ALTER TABLE \"main\".\"users\" ADD COLUMN \"bio\" TEXT"]
        );
    }

    #[test]
    fn test_temp_name_never_collides_with_original() {
        let mut table = users("main");
        table.table_name = "users_new".into();
        let change = DatabaseTableSchemaChange::from_table(&table)
            .rename_table("users")
            .retype_column("name", "TEXT");
        let plan = plan_table_schema_change(&SqliteDialect::new(), &change).unwrap();
        assert!(plan.statements[0].starts_with("CREATE TABLE \"main\".\"users_new_new\""));
        assert_eq!(
            plan.statements.last().unwrap(),
            "ALTER TABLE \"main\".\"users_new_new\" RENAME TO \"users\""
        );
    }

    #[test]
    fn test_no_create_support_fails_fast() {
        let dialect =
            SqliteDialect::with_flags(DriverFlags::sqlite().with_create_update_table(false));
        let change =
            DatabaseTableSchemaChange::from_table(&users("main")).rename_column("id", "user_id");
        let err = plan_table_schema_change(&dialect, &change).unwrap_err();
        assert_eq!(
            err,
            Error::unsupported(
                crate::flags::Dialect::Sqlite,
                "rename primary key column 'id' to 'user_id'"
            )
        );
    }

    #[test]
    fn test_postgres_pk_change_without_constraint_name_fails() {
        let change = DatabaseTableSchemaChange::from_table(&users("public"))
            .set_primary_key(&["id", "name"]);
        assert!(matches!(
            plan_table_schema_change(&PostgresDialect::new(), &change),
            Err(Error::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_gaining_unique_adds_constraint_last() {
        let change = DatabaseTableSchemaChange::from_table(&users(""))
            .update_column("name", DatabaseTableColumn::unique)
            .add_column(DatabaseTableColumn::new("bio", "text"));
        let plan = plan_table_schema_change(&MySqlDialect::new(), &change).unwrap();
        assert_eq!(
            plan.statements,
            vec![
                "ALTER TABLE `users` ADD COLUMN `bio` text",
                "ALTER TABLE `users` ADD UNIQUE (`name`)",
            ]
        );
    }

    #[test]
    fn test_losing_unique_is_unsupported() {
        let table = DatabaseTableSchema::new("", "t")
            .column(DatabaseTableColumn::new("code", "text").unique());
        let change = DatabaseTableSchemaChange::from_table(&table)
            .update_column("code", |c| DatabaseTableColumn::new(c.name, c.column_type));
        assert!(plan_table_schema_change(&MySqlDialect::new(), &change).is_err());
    }

    #[test]
    fn test_column_types_go_through_the_catalog() {
        let too_wide = DatabaseTableSchemaChange::from_table(&users(""))
            .add_column(DatabaseTableColumn::new("price", "decimal(999,999)"));
        assert!(matches!(
            plan_table_schema_change(&MySqlDialect::new(), &too_wide),
            Err(Error::InvalidTypeParameter { .. })
        ));

        let smuggled = DatabaseTableSchemaChange::from_table(&users("main"))
            .add_column(DatabaseTableColumn::new("y", "TEXT); DROP TABLE t; --"));
        assert!(matches!(
            plan_table_schema_change(&SqliteDialect::new(), &smuggled),
            Err(Error::InvalidTypeParameter { .. })
        ));

        let retyped = DatabaseTableSchemaChange::from_table(&users("public"))
            .retype_column("name", "varchar(x)");
        assert!(plan_table_schema_change(&PostgresDialect::new(), &retyped).is_err());

        // Types already in the table are not re-validated.
        let mut legacy = users("");
        legacy.columns[1].column_type = "enum('a','b')".into();
        let renamed = DatabaseTableSchemaChange::from_table(&legacy).rename_column("name", "label");
        assert_eq!(
            create_update_table_schema(&MySqlDialect::new(), &renamed).unwrap(),
            vec!["ALTER TABLE `users` CHANGE `name` `label` enum('a','b')"]
        );
    }

    #[test]
    fn test_recreate_refuses_opaque_clauses() {
        let mut table = users("main");
        table.opaque_clauses.push("COLLATE on column 'name'".into());
        let change = DatabaseTableSchemaChange::from_table(&table).retype_column("name", "TEXT");
        let err = plan_table_schema_change(&SqliteDialect::new(), &change).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
        assert!(
            err.to_string().contains("COLLATE on column 'name'"),
            "{err}"
        );

        // In-place additions keep the clause.
        let added = DatabaseTableSchemaChange::from_table(&table)
            .add_column(DatabaseTableColumn::new("bio", "TEXT"));
        assert_eq!(
            plan_table_schema_change(&SqliteDialect::new(), &added)
                .unwrap()
                .strategy,
            ChangeStrategy::Alter
        );
    }

    #[test]
    fn test_create_without_columns_fails() {
        let change = DatabaseTableSchemaChange::create("main", "empty");
        assert!(plan_table_schema_change(&SqliteDialect::new(), &change).is_err());
    }
}
