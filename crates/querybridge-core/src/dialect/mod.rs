//! SQL dialects.
//!
//! A dialect knows how to escape identifiers and literals, which types it
//! offers, and how to spell each DDL building block. The diff engine only
//! talks to this trait; dialect-dependent decisions it makes itself read
//! [`DriverFlags`].

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

/// Text literals of [`MySqlDialect::escape_value`], for catalog queries.
pub(crate) use mysql::escape_string as mysql_text;
/// Text literals of [`PostgresDialect::escape_value`], for catalog queries.
pub(crate) use postgres::escape_string as postgres_text;

use crate::catalog::ColumnTypeSelector;
use crate::error::{Error, Result};
use crate::flags::{Dialect, DriverFlags};
use crate::schema::{
    DatabaseColumnConstraint, DatabaseTableColumn, DatabaseTableConstraint, DatabaseTableSchema,
    ForeignKeyReference, TableConstraintKind,
};
use crate::value::SqlValue;

/// Where a column definition is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnContext {
    /// Inside CREATE TABLE. `inline_primary_key` renders `PRIMARY KEY` on
    /// the column itself.
    Create { inline_primary_key: bool },
    /// In `ALTER TABLE ... ADD COLUMN`.
    Add,
    /// In an in-place column modification. Key constraints are left out.
    Modify,
}

/// Returns a dialect implementation for `dialect` with its default flags.
#[must_use]
pub fn for_dialect(dialect: Dialect) -> Box<dyn SqlDialect> {
    match dialect {
        Dialect::MySql => Box::new(MySqlDialect::new()),
        Dialect::Postgres => Box::new(PostgresDialect::new()),
        Dialect::Sqlite => Box::new(SqliteDialect::new()),
    }
}

/// Dialect-specific SQL generation.
pub trait SqlDialect: Send + Sync {
    /// Capability flags of the dialect.
    fn flags(&self) -> &DriverFlags;

    /// Escapes an identifier by wrapping it in the dialect's quote.
    fn escape_id(&self, identifier: &str) -> String;

    /// Renders a literal.
    fn escape_value(&self, value: &SqlValue) -> String;

    /// Type catalog of the dialect.
    fn column_type_selector(&self) -> &ColumnTypeSelector;

    /// Clause appended to an auto-increment column, if any.
    fn auto_increment_clause(
        &self,
        column: &DatabaseTableColumn,
        inline_primary_key: bool,
    ) -> Option<&'static str>;

    /// Dialect family.
    fn dialect(&self) -> Dialect {
        self.flags().dialect
    }

    /// Qualified table reference. The schema is omitted when empty.
    fn table_ref(&self, schema_name: &str, table_name: &str) -> String {
        if schema_name.is_empty() {
            self.escape_id(table_name)
        } else {
            format!(
                "{}.{}",
                self.escape_id(schema_name),
                self.escape_id(table_name)
            )
        }
    }

    /// Comma-separated escaped identifiers.
    fn column_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|name| self.escape_id(name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Column whose definition carries `PRIMARY KEY` inline in CREATE TABLE.
    fn inline_primary_key<'t>(&self, _table: &'t DatabaseTableSchema) -> Option<&'t str> {
        None
    }

    /// Renders a default expression for a DEFAULT clause.
    fn default_expression(&self, expression: &str) -> String {
        expression.to_string()
    }

    /// Value of the DEFAULT clause, if any.
    fn default_clause(&self, constraint: &DatabaseColumnConstraint) -> Option<String> {
        constraint
            .default_value
            .as_ref()
            .map(|value| self.escape_value(value))
            .or_else(|| {
                constraint
                    .default_expression
                    .as_deref()
                    .map(|expression| self.default_expression(expression))
            })
    }

    /// `REFERENCES` clause of a foreign key, actions included.
    fn references_clause(&self, fk: &ForeignKeyReference) -> String {
        let mut clause = format!("REFERENCES {}", self.escape_id(&fk.table));
        if !fk.columns.is_empty() {
            clause.push_str(&format!(" ({})", self.column_list(&fk.columns)));
        }
        if let Some(action) = fk.on_delete {
            clause.push_str(&format!(" ON DELETE {action}"));
        }
        if let Some(action) = fk.on_update {
            clause.push_str(&format!(" ON UPDATE {action}"));
        }
        clause
    }

    /// Renders a column definition.
    fn column_definition(&self, column: &DatabaseTableColumn, context: ColumnContext) -> String {
        let constraint = column.constraint_or_default();
        let inline_pk = matches!(
            context,
            ColumnContext::Create {
                inline_primary_key: true
            }
        );
        let mut parts = vec![self.escape_id(&column.name), column.column_type.clone()];

        if inline_pk {
            parts.push("PRIMARY KEY".to_string());
            if constraint.auto_increment {
                if let Some(keyword) = self.auto_increment_clause(column, true) {
                    parts.push(keyword.to_string());
                }
            }
        } else {
            if constraint.not_null {
                parts.push("NOT NULL".to_string());
            }
            if constraint.auto_increment {
                if let Some(keyword) = self.auto_increment_clause(column, false) {
                    parts.push(keyword.to_string());
                }
            }
        }

        if let Some(default) = self.default_clause(&constraint) {
            parts.push(format!("DEFAULT {default}"));
        }

        if context != ColumnContext::Modify {
            if constraint.unique && !inline_pk {
                parts.push("UNIQUE".to_string());
            }
            if let Some(fk) = &constraint.foreign_key {
                parts.push(self.references_clause(fk));
            }
            if let Some(check) = &constraint.check_expression {
                parts.push(format!("CHECK ({check})"));
            }
        }

        parts.join(" ")
    }

    /// Renders a table-level constraint.
    fn table_constraint(&self, constraint: &DatabaseTableConstraint) -> String {
        let body = match &constraint.kind {
            TableConstraintKind::Unique { columns } => {
                format!("UNIQUE ({})", self.column_list(columns))
            }
            TableConstraintKind::ForeignKey {
                columns,
                references,
            } => format!(
                "FOREIGN KEY ({}) {}",
                self.column_list(columns),
                self.references_clause(references)
            ),
            TableConstraintKind::Check { expression } => format!("CHECK ({expression})"),
        };
        match &constraint.name {
            Some(name) => format!("CONSTRAINT {} {body}", self.escape_id(name)),
            None => body,
        }
    }

    /// CREATE TABLE for `table` under the already escaped `table_ref`.
    fn create_table(&self, table_ref: &str, table: &DatabaseTableSchema) -> String {
        let inline = self.inline_primary_key(table);
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                self.column_definition(
                    column,
                    ColumnContext::Create {
                        inline_primary_key: inline == Some(column.name.as_str()),
                    },
                )
            })
            .collect();
        if inline.is_none() && !table.pk.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", self.column_list(&table.pk)));
        }
        lines.extend(table.constraints.iter().map(|c| self.table_constraint(c)));
        format!("CREATE TABLE {table_ref} (\n  {}\n)", lines.join(",\n  "))
    }

    fn add_column(&self, table_ref: &str, column: &DatabaseTableColumn) -> String {
        format!(
            "ALTER TABLE {table_ref} ADD COLUMN {}",
            self.column_definition(column, ColumnContext::Add)
        )
    }

    fn drop_column(&self, table_ref: &str, column_name: &str) -> String {
        format!(
            "ALTER TABLE {table_ref} DROP COLUMN {}",
            self.escape_id(column_name)
        )
    }

    fn rename_table(&self, table_ref: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {table_ref} RENAME TO {}",
            self.escape_id(new_name)
        )
    }

    /// Statements changing `old` into `new` in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] when the dialect cannot
    /// modify columns in place.
    fn alter_column(
        &self,
        _table_ref: &str,
        old: &DatabaseTableColumn,
        _new: &DatabaseTableColumn,
    ) -> Result<Vec<String>> {
        Err(Error::unsupported(
            self.dialect(),
            format!("modify column '{}' in place", old.name),
        ))
    }

    /// Drops the primary key of `original`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] when the constraint name is
    /// unknown.
    fn drop_primary_key(
        &self,
        table_ref: &str,
        original: Option<&DatabaseTableSchema>,
    ) -> Result<String> {
        let name = original
            .and_then(|t| t.pk_constraint_name.as_deref())
            .ok_or_else(|| {
                Error::unsupported(
                    self.dialect(),
                    "drop primary key whose constraint name is unknown",
                )
            })?;
        Ok(format!(
            "ALTER TABLE {table_ref} DROP CONSTRAINT {}",
            self.escape_id(name)
        ))
    }

    fn add_primary_key(&self, table_ref: &str, columns: &[String]) -> String {
        format!(
            "ALTER TABLE {table_ref} ADD PRIMARY KEY ({})",
            self.column_list(columns)
        )
    }

    /// Drops a named table-level constraint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] for unnamed constraints.
    fn drop_table_constraint(
        &self,
        table_ref: &str,
        constraint: &DatabaseTableConstraint,
    ) -> Result<String> {
        let name = constraint_name(self.dialect(), constraint)?;
        Ok(format!(
            "ALTER TABLE {table_ref} DROP CONSTRAINT {}",
            self.escape_id(name)
        ))
    }

    fn add_table_constraint(
        &self,
        table_ref: &str,
        constraint: &DatabaseTableConstraint,
    ) -> String {
        format!(
            "ALTER TABLE {table_ref} ADD {}",
            self.table_constraint(constraint)
        )
    }
}

/// Name of `constraint`, or an error when it has none.
pub(crate) fn constraint_name(
    dialect: Dialect,
    constraint: &DatabaseTableConstraint,
) -> Result<&str> {
    constraint
        .name
        .as_deref()
        .ok_or_else(|| Error::unsupported(dialect, "drop a table constraint that has no name"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ReferentialAction;

    #[test]
    fn test_table_ref_omits_empty_schema() {
        let dialect = MySqlDialect::new();
        assert_eq!(dialect.table_ref("", "users"), "`users`");
        assert_eq!(dialect.table_ref("shop", "users"), "`shop`.`users`");
    }

    #[test]
    fn test_for_dialect() {
        for dialect in [Dialect::MySql, Dialect::Postgres, Dialect::Sqlite] {
            assert_eq!(for_dialect(dialect).dialect(), dialect);
        }
    }

    #[test]
    fn test_table_constraint_rendering() {
        let dialect = PostgresDialect::new();
        let fk = DatabaseTableConstraint::foreign_key("fk_owner", &["owner_id"], "users", &["id"]);
        assert_eq!(
            dialect.table_constraint(&fk),
            "CONSTRAINT \"fk_owner\" FOREIGN KEY (\"owner_id\") REFERENCES \"users\" (\"id\")"
        );
        let unique = DatabaseTableConstraint {
            name: None,
            kind: TableConstraintKind::Unique {
                columns: vec!["a".into(), "b".into()],
            },
        };
        assert_eq!(dialect.table_constraint(&unique), "UNIQUE (\"a\", \"b\")");
        let cascading = DatabaseTableConstraint {
            name: None,
            kind: TableConstraintKind::ForeignKey {
                columns: vec!["owner_id".into()],
                references: ForeignKeyReference::new("users", &[])
                    .on_delete(ReferentialAction::Cascade)
                    .on_update(ReferentialAction::SetNull),
            },
        };
        assert_eq!(
            dialect.table_constraint(&cascading),
            "FOREIGN KEY (\"owner_id\") REFERENCES \"users\" ON DELETE CASCADE ON UPDATE SET NULL"
        );
        assert!(dialect.drop_table_constraint("\"t\"", &unique).is_err());
    }

    #[test]
    fn test_create_table_layout() {
        let dialect = PostgresDialect::new();
        let table = DatabaseTableSchema::new("public", "tags")
            .column(
                DatabaseTableColumn::new("id", "integer")
                    .not_null()
                    .primary_key(),
            )
            .column(DatabaseTableColumn::new("label", "text").unique());
        assert_eq!(
            dialect.create_table("\"public\".\"tags\"", &table),
            "CREATE TABLE \"public\".\"tags\" (\n  \"id\" integer NOT NULL,\n  \"label\" text UNIQUE,\n  PRIMARY KEY (\"id\")\n)"
        );
    }
}
