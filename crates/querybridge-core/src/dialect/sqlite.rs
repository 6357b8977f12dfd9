//! SQLite-family dialect.

use crate::catalog::{ColumnTypeSelector, TypeSuggestion};
use crate::escape::{float_literal, hex, quote_identifier, quote_string};
use crate::flags::DriverFlags;
use crate::schema::{DatabaseTableColumn, DatabaseTableSchema};
use crate::value::SqlValue;

use super::SqlDialect;

/// SQLite, libSQL and compatible engines.
#[derive(Debug, Clone)]
pub struct SqliteDialect {
    flags: DriverFlags,
    types: ColumnTypeSelector,
}

impl SqliteDialect {
    #[must_use]
    pub fn new() -> Self {
        Self::with_flags(DriverFlags::sqlite())
    }

    #[must_use]
    pub fn with_flags(flags: DriverFlags) -> Self {
        Self {
            flags,
            types: type_catalog(),
        }
    }
}

impl Default for SqliteDialect {
    fn default() -> Self {
        Self::new()
    }
}

fn is_integer_type(column: &DatabaseTableColumn) -> bool {
    column.column_type.trim().eq_ignore_ascii_case("INTEGER")
}

impl SqlDialect for SqliteDialect {
    fn flags(&self) -> &DriverFlags {
        &self.flags
    }

    fn escape_id(&self, identifier: &str) -> String {
        quote_identifier(identifier, '"')
    }

    fn escape_value(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => String::from(if *b { "1" } else { "0" }),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => float_literal(*f).unwrap_or_else(|| "NULL".to_string()),
            SqlValue::Text(s) => quote_string(s),
            SqlValue::Bytes(b) => format!("X'{}'", hex(b)),
        }
    }

    fn column_type_selector(&self) -> &ColumnTypeSelector {
        &self.types
    }

    // `table_info` reports expressions without their parentheses, and only
    // literals and CURRENT_* keywords may appear bare.
    fn default_expression(&self, expression: &str) -> String {
        format!("({expression})")
    }

    // AUTOINCREMENT is only legal right after an inline INTEGER PRIMARY KEY.
    fn auto_increment_clause(
        &self,
        column: &DatabaseTableColumn,
        inline_primary_key: bool,
    ) -> Option<&'static str> {
        (inline_primary_key && is_integer_type(column)).then_some("AUTOINCREMENT")
    }

    fn inline_primary_key<'t>(&self, table: &'t DatabaseTableSchema) -> Option<&'t str> {
        let [pk] = table.pk.as_slice() else {
            return None;
        };
        table
            .get_column(pk)
            .filter(|c| c.is_auto_increment() && is_integer_type(c))
            .map(|c| c.name.as_str())
    }
}

fn type_catalog() -> ColumnTypeSelector {
    ColumnTypeSelector::default()
        .group(
            "String",
            vec![TypeSuggestion::plain(
                "TEXT",
                "Text stored using the database encoding",
            )],
        )
        .group(
            "Number",
            vec![
                TypeSuggestion::plain("INTEGER", "Signed integer stored in 1 to 8 bytes"),
                TypeSuggestion::plain("REAL", "8-byte IEEE floating point"),
                TypeSuggestion::plain("NUMERIC", "Integer or real, whichever is exact"),
            ],
        )
        .group(
            "Date & Time",
            vec![
                TypeSuggestion::plain("DATE", "ISO-8601 date stored as TEXT"),
                TypeSuggestion::plain("DATETIME", "ISO-8601 date and time stored as TEXT"),
            ],
        )
        .group(
            "Binary",
            vec![TypeSuggestion::plain(
                "BLOB",
                "Bytes stored exactly as input",
            )],
        )
        .group(
            "Other",
            vec![
                TypeSuggestion::plain("BOOLEAN", "Stored as INTEGER 0 or 1"),
                TypeSuggestion::plain("JSON", "JSON document stored as TEXT"),
            ],
        )
}
