//! Driver capability flags.
//!
//! Every dialect-dependent decision made by the diff engine reads one of
//! these fields. A driver copies its flags at construction and only ever
//! hands out shared references, so they stay fixed for its lifetime.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A family of SQL engines sharing catalog structure and DDL syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL, MariaDB, Dolt and other MySQL wire-compatible engines.
    #[serde(rename = "mysql")]
    MySql,
    /// PostgreSQL and compatible engines.
    Postgres,
    /// SQLite, libSQL and compatible engines.
    Sqlite,
}

impl Dialect {
    /// Returns the lowercase dialect name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a dialect (and the connection behind a driver) supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverFlags {
    /// Schema selected when the user has not picked one.
    pub default_schema: String,
    /// Whether schemas are optional (not a first-class concept) for the UI.
    pub optional_schema: bool,
    /// Whether integers beyond 53 bits are returned losslessly.
    pub support_big_int: bool,
    /// Whether columns can be renamed/retyped in place.
    pub support_modify_column: bool,
    /// Whether the driver can author CREATE TABLE statements, which the
    /// recreate migration depends on.
    pub support_create_update_table: bool,
    /// Whether row mismatches after edits should be detected.
    pub mismatch_detection: bool,
    /// Dialect family.
    pub dialect: Dialect,
    /// Whether `USE <schema>` switches the current schema.
    pub support_use_statement: bool,
    /// Whether tables expose an implicit row id.
    pub support_row_id: bool,
    /// Whether `INSERT ... RETURNING` is available.
    pub support_insert_returning: bool,
    /// Whether `UPDATE ... RETURNING` is available.
    pub support_update_returning: bool,
}

impl DriverFlags {
    /// Flags for MySQL-family engines.
    #[must_use]
    pub fn mysql() -> Self {
        Self {
            default_schema: String::new(),
            optional_schema: false,
            support_big_int: false,
            support_modify_column: true,
            support_create_update_table: true,
            mismatch_detection: false,
            dialect: Dialect::MySql,
            support_use_statement: true,
            support_row_id: false,
            support_insert_returning: false,
            support_update_returning: false,
        }
    }

    /// Flags for PostgreSQL-family engines.
    #[must_use]
    pub fn postgres() -> Self {
        Self {
            default_schema: String::from("public"),
            optional_schema: false,
            support_big_int: false,
            support_modify_column: true,
            support_create_update_table: true,
            mismatch_detection: false,
            dialect: Dialect::Postgres,
            support_use_statement: false,
            support_row_id: false,
            support_insert_returning: true,
            support_update_returning: true,
        }
    }

    /// Flags for SQLite-family engines.
    #[must_use]
    pub fn sqlite() -> Self {
        Self {
            default_schema: String::from("main"),
            optional_schema: true,
            support_big_int: false,
            support_modify_column: false,
            support_create_update_table: true,
            mismatch_detection: false,
            dialect: Dialect::Sqlite,
            support_use_statement: false,
            support_row_id: true,
            support_insert_returning: true,
            support_update_returning: true,
        }
    }

    /// Returns the flags with big-integer support toggled.
    #[must_use]
    pub const fn with_big_int(mut self, enabled: bool) -> Self {
        self.support_big_int = enabled;
        self
    }

    /// Returns the flags with CREATE/UPDATE TABLE support toggled.
    #[must_use]
    pub const fn with_create_update_table(mut self, enabled: bool) -> Self {
        self.support_create_update_table = enabled;
        self
    }
}
