//! PostgreSQL-family dialect.

use crate::catalog::{
    describe_fixed_point, scale_within_precision, ColumnTypeSelector, TypeDescription,
    TypeParameter, TypeSuggestion,
};
use crate::error::{Error, Result};
use crate::escape::{float_literal, hex, quote_identifier, quote_string};
use crate::flags::DriverFlags;
use crate::schema::{DatabaseColumnConstraint, DatabaseTableColumn};
use crate::value::SqlValue;

use super::SqlDialect;

/// PostgreSQL and compatible engines.
#[derive(Debug, Clone)]
pub struct PostgresDialect {
    flags: DriverFlags,
    types: ColumnTypeSelector,
}

impl PostgresDialect {
    #[must_use]
    pub fn new() -> Self {
        Self::with_flags(DriverFlags::postgres())
    }

    #[must_use]
    pub fn with_flags(flags: DriverFlags) -> Self {
        Self {
            flags,
            types: type_catalog(),
        }
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}

/// String literal, `E'...'` when a backslash is present.
#[must_use]
pub fn escape_string(text: &str) -> String {
    if text.contains('\\') {
        format!("E{}", quote_string(&text.replace('\\', "\\\\")))
    } else {
        quote_string(text)
    }
}

fn non_finite_literal(value: f64) -> &'static str {
    if value.is_nan() {
        "'NaN'"
    } else if value.is_sign_positive() {
        "'Infinity'"
    } else {
        "'-Infinity'"
    }
}

impl SqlDialect for PostgresDialect {
    fn flags(&self) -> &DriverFlags {
        &self.flags
    }

    fn escape_id(&self, identifier: &str) -> String {
        quote_identifier(identifier, '"')
    }

    fn escape_value(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(true) => "TRUE".to_string(),
            SqlValue::Bool(false) => "FALSE".to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => {
                float_literal(*f).unwrap_or_else(|| non_finite_literal(*f).to_string())
            }
            SqlValue::Text(s) => escape_string(s),
            SqlValue::Bytes(b) => format!("decode('{}', 'hex')", hex(b)),
        }
    }

    fn column_type_selector(&self) -> &ColumnTypeSelector {
        &self.types
    }

    fn auto_increment_clause(
        &self,
        _column: &DatabaseTableColumn,
        _inline_primary_key: bool,
    ) -> Option<&'static str> {
        Some("GENERATED BY DEFAULT AS IDENTITY")
    }

    // An identity column cannot also carry its sequence default.
    fn default_clause(&self, constraint: &DatabaseColumnConstraint) -> Option<String> {
        if let Some(value) = &constraint.default_value {
            return Some(self.escape_value(value));
        }
        constraint
            .default_expression
            .as_ref()
            .filter(|expr| !(constraint.auto_increment && expr.starts_with("nextval(")))
            .map(|expr| self.default_expression(expr))
    }

    fn alter_column(
        &self,
        table_ref: &str,
        old: &DatabaseTableColumn,
        new: &DatabaseTableColumn,
    ) -> Result<Vec<String>> {
        let (before, after) = (old.constraint_or_default(), new.constraint_or_default());
        if before.auto_increment != after.auto_increment {
            return Err(Error::unsupported(
                self.dialect(),
                format!("change the identity of existing column '{}'", old.name),
            ));
        }

        let column = self.escape_id(&old.name);
        let mut statements = Vec::new();
        if old.column_type != new.column_type {
            statements.push(format!(
                "ALTER TABLE {table_ref} ALTER COLUMN {column} TYPE {}",
                new.column_type
            ));
        }
        if before.not_null != after.not_null {
            let action = if after.not_null { "SET" } else { "DROP" };
            statements.push(format!(
                "ALTER TABLE {table_ref} ALTER COLUMN {column} {action} NOT NULL"
            ));
        }
        let (old_default, new_default) =
            (self.default_clause(&before), self.default_clause(&after));
        if old_default != new_default {
            statements.push(match new_default {
                Some(default) => {
                    format!("ALTER TABLE {table_ref} ALTER COLUMN {column} SET DEFAULT {default}")
                }
                None => format!("ALTER TABLE {table_ref} ALTER COLUMN {column} DROP DEFAULT"),
            });
        }
        if old.name != new.name {
            statements.push(format!(
                "ALTER TABLE {table_ref} RENAME COLUMN {column} TO {}",
                self.escape_id(&new.name)
            ));
        }
        Ok(statements)
    }
}

fn type_catalog() -> ColumnTypeSelector {
    let precision = || TypeParameter::new("precision", 0, 6).describe("Fractional seconds digits");
    ColumnTypeSelector::default()
        .group(
            "String",
            vec![
                TypeSuggestion::parameterized(
                    "char",
                    TypeDescription::Static("Fixed-length, blank padded"),
                    vec![TypeParameter::new("length", 1, 10_485_760).default(1)],
                ),
                TypeSuggestion::parameterized(
                    "varchar",
                    TypeDescription::Static("Variable-length with limit"),
                    vec![TypeParameter::new("length", 1, 10_485_760).default(255)],
                ),
                TypeSuggestion::plain("text", "Variable unlimited length"),
            ],
        )
        .group(
            "Number",
            vec![
                TypeSuggestion::plain("smallint", "2-byte integer"),
                TypeSuggestion::plain("integer", "4-byte integer"),
                TypeSuggestion::plain("bigint", "8-byte integer"),
                TypeSuggestion::parameterized(
                    "numeric",
                    TypeDescription::Dynamic(describe_fixed_point),
                    vec![
                        TypeParameter::new("precision", 1, 1000).default(10),
                        TypeParameter::new("scale", 0, 1000).default(0),
                    ],
                )
                .with_rule(scale_within_precision),
                TypeSuggestion::plain("real", "6 decimal digits precision"),
                TypeSuggestion::plain("double precision", "15 decimal digits precision"),
                TypeSuggestion::plain("smallserial", "Autoincrementing 2-byte integer"),
                TypeSuggestion::plain("serial", "Autoincrementing 4-byte integer"),
                TypeSuggestion::plain("bigserial", "Autoincrementing 8-byte integer"),
            ],
        )
        .group(
            "Date & Time",
            vec![
                TypeSuggestion::plain("date", "Calendar date"),
                TypeSuggestion::parameterized(
                    "time",
                    TypeDescription::Static("Time of day without time zone"),
                    vec![precision()],
                ),
                TypeSuggestion::parameterized(
                    "timestamp",
                    TypeDescription::Static("Date and time without time zone"),
                    vec![precision()],
                ),
                TypeSuggestion::parameterized(
                    "timestamptz",
                    TypeDescription::Static("Date and time with time zone"),
                    vec![precision()],
                ),
                TypeSuggestion::plain("interval", "Time span"),
            ],
        )
        .group(
            "Binary",
            vec![TypeSuggestion::plain(
                "bytea",
                "Variable-length binary string",
            )],
        )
        .group(
            "Other",
            vec![
                TypeSuggestion::plain("boolean", "true or false"),
                TypeSuggestion::plain("uuid", "Universally unique identifier"),
                TypeSuggestion::plain("json", "Textual JSON data"),
                TypeSuggestion::plain("jsonb", "Binary JSON data, decomposed"),
                TypeSuggestion::plain("inet", "IPv4 or IPv6 host address"),
            ],
        )
}
