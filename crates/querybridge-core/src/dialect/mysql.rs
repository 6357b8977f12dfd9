//! MySQL-family dialect.

use crate::catalog::{
    describe_fixed_point, scale_within_precision, ColumnTypeSelector, TypeDescription,
    TypeParameter, TypeSuggestion,
};
use crate::error::Result;
use crate::escape::{float_literal, hex, quote_identifier};
use crate::flags::DriverFlags;
use crate::schema::{
    DatabaseTableColumn, DatabaseTableConstraint, DatabaseTableSchema, TableConstraintKind,
};
use crate::value::SqlValue;

use super::{constraint_name, ColumnContext, SqlDialect};

/// MySQL, MariaDB and compatible engines.
///
/// String literals escape backslashes, which assumes the server runs
/// without `NO_BACKSLASH_ESCAPES`.
#[derive(Debug, Clone)]
pub struct MySqlDialect {
    flags: DriverFlags,
    types: ColumnTypeSelector,
}

impl MySqlDialect {
    #[must_use]
    pub fn new() -> Self {
        Self::with_flags(DriverFlags::mysql())
    }

    /// Uses `flags` in place of the MySQL defaults.
    #[must_use]
    pub fn with_flags(flags: DriverFlags) -> Self {
        Self {
            flags,
            types: type_catalog(),
        }
    }
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

/// String literal with MySQL's backslash escapes.
#[must_use]
pub fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("''"),
            '\0' => out.push_str("\\0"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// `CURRENT_TIMESTAMP` and its synonyms, with an optional precision.
fn is_current_timestamp(expression: &str) -> bool {
    let upper = expression.to_ascii_uppercase();
    ["CURRENT_TIMESTAMP", "LOCALTIMESTAMP", "LOCALTIME", "NOW"]
        .iter()
        .any(|keyword| {
            upper.strip_prefix(keyword).is_some_and(|rest| {
                let rest = rest.trim();
                rest.is_empty()
                    || rest
                        .strip_prefix('(')
                        .and_then(|inner| inner.strip_suffix(')'))
                        .is_some_and(|fsp| fsp.trim().chars().all(|c| c.is_ascii_digit()))
            })
        })
}

impl SqlDialect for MySqlDialect {
    fn flags(&self) -> &DriverFlags {
        &self.flags
    }

    fn escape_id(&self, identifier: &str) -> String {
        quote_identifier(identifier, '`')
    }

    fn escape_value(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(true) => "TRUE".to_string(),
            SqlValue::Bool(false) => "FALSE".to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => float_literal(*f).unwrap_or_else(|| "NULL".to_string()),
            SqlValue::Text(s) => escape_string(s),
            SqlValue::Bytes(b) => format!("X'{}'", hex(b)),
        }
    }

    fn column_type_selector(&self) -> &ColumnTypeSelector {
        &self.types
    }

    // Other expressions need parentheses since 8.0.13.
    fn default_expression(&self, expression: &str) -> String {
        let expression = expression.trim();
        if expression.starts_with('(') || is_current_timestamp(expression) {
            expression.to_string()
        } else {
            format!("({expression})")
        }
    }

    fn auto_increment_clause(
        &self,
        _column: &DatabaseTableColumn,
        _inline_primary_key: bool,
    ) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    fn alter_column(
        &self,
        table_ref: &str,
        old: &DatabaseTableColumn,
        new: &DatabaseTableColumn,
    ) -> Result<Vec<String>> {
        let (before, after) = (old.constraint_or_default(), new.constraint_or_default());
        let reshaped = old.name != new.name
            || old.column_type != new.column_type
            || before.not_null != after.not_null
            || before.default_value != after.default_value
            || before.default_expression != after.default_expression
            || before.auto_increment != after.auto_increment;
        if !reshaped {
            return Ok(Vec::new());
        }
        Ok(vec![format!(
            "ALTER TABLE {table_ref} CHANGE {} {}",
            self.escape_id(&old.name),
            self.column_definition(new, ColumnContext::Modify)
        )])
    }

    fn drop_primary_key(
        &self,
        table_ref: &str,
        _original: Option<&DatabaseTableSchema>,
    ) -> Result<String> {
        Ok(format!("ALTER TABLE {table_ref} DROP PRIMARY KEY"))
    }

    fn drop_table_constraint(
        &self,
        table_ref: &str,
        constraint: &DatabaseTableConstraint,
    ) -> Result<String> {
        let name = self.escape_id(constraint_name(self.dialect(), constraint)?);
        Ok(match constraint.kind {
            TableConstraintKind::Unique { .. } => {
                format!("ALTER TABLE {table_ref} DROP INDEX {name}")
            }
            TableConstraintKind::ForeignKey { .. } => {
                format!("ALTER TABLE {table_ref} DROP FOREIGN KEY {name}")
            }
            TableConstraintKind::Check { .. } => {
                format!("ALTER TABLE {table_ref} DROP CHECK {name}")
            }
        })
    }
}

fn type_catalog() -> ColumnTypeSelector {
    let fsp = || TypeParameter::new("fsp", 0, 6).describe("Fractional seconds precision");
    ColumnTypeSelector::default()
        .group(
            "String",
            vec![
                TypeSuggestion::parameterized(
                    "char",
                    TypeDescription::Static("Fixed-length string"),
                    vec![TypeParameter::new("length", 0, 255).default(1)],
                ),
                TypeSuggestion::parameterized(
                    "varchar",
                    TypeDescription::Static("Variable-length string"),
                    vec![TypeParameter::new("length", 0, 65_535)
                        .default(255)
                        .required()],
                ),
                TypeSuggestion::plain("tinytext", "String up to 255 bytes"),
                TypeSuggestion::plain("text", "String up to 64 KiB"),
                TypeSuggestion::plain("mediumtext", "String up to 16 MiB"),
                TypeSuggestion::plain("longtext", "String up to 4 GiB"),
            ],
        )
        .group(
            "Number",
            vec![
                TypeSuggestion::plain("tinyint", "Integer from -128 to 127"),
                TypeSuggestion::plain("smallint", "Integer from -32768 to 32767"),
                TypeSuggestion::plain("mediumint", "Integer from -8388608 to 8388607"),
                TypeSuggestion::plain("int", "Integer from -2147483648 to 2147483647"),
                TypeSuggestion::plain("bigint", "64-bit integer"),
                TypeSuggestion::parameterized(
                    "decimal",
                    TypeDescription::Dynamic(describe_fixed_point),
                    vec![
                        TypeParameter::new("precision", 1, 65).default(10),
                        TypeParameter::new("scale", 0, 30).default(0),
                    ],
                )
                .with_rule(scale_within_precision),
                TypeSuggestion::plain("float", "Single-precision floating point"),
                TypeSuggestion::plain("double", "Double-precision floating point"),
                TypeSuggestion::parameterized(
                    "bit",
                    TypeDescription::Static("Bit-field"),
                    vec![TypeParameter::new("length", 1, 64).default(1)],
                ),
            ],
        )
        .group(
            "Date & Time",
            vec![
                TypeSuggestion::plain("date", "Date from 1000-01-01 to 9999-12-31"),
                TypeSuggestion::parameterized(
                    "datetime",
                    TypeDescription::Static("Date and time"),
                    vec![fsp()],
                ),
                TypeSuggestion::parameterized(
                    "timestamp",
                    TypeDescription::Static("UTC timestamp from 1970 to 2038"),
                    vec![fsp()],
                ),
                TypeSuggestion::parameterized(
                    "time",
                    TypeDescription::Static("Time of day or duration"),
                    vec![fsp()],
                ),
                TypeSuggestion::plain("year", "Year from 1901 to 2155"),
            ],
        )
        .group(
            "Binary",
            vec![
                TypeSuggestion::parameterized(
                    "binary",
                    TypeDescription::Static("Fixed-length binary string"),
                    vec![TypeParameter::new("length", 0, 255).default(1)],
                ),
                TypeSuggestion::parameterized(
                    "varbinary",
                    TypeDescription::Static("Variable-length binary string"),
                    vec![TypeParameter::new("length", 0, 65_535)
                        .default(255)
                        .required()],
                ),
                TypeSuggestion::plain("tinyblob", "Binary up to 255 bytes"),
                TypeSuggestion::plain("blob", "Binary up to 64 KiB"),
                TypeSuggestion::plain("mediumblob", "Binary up to 16 MiB"),
                TypeSuggestion::plain("longblob", "Binary up to 4 GiB"),
            ],
        )
        .group(
            "Other",
            vec![
                TypeSuggestion::plain("json", "JSON document"),
                TypeSuggestion::plain("boolean", "Alias of tinyint(1)"),
            ],
        )
}
