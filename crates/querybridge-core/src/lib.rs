//! Dialect-aware schema model and schema diff engine.
//!
//! `querybridge-core` holds everything a database client needs to reason
//! about a schema without talking to the database itself:
//! - A schema model (`DatabaseSchemas`, `DatabaseTableSchema`, ...) shared by
//!   every dialect
//! - Escaping of identifiers and values per dialect
//! - A per-dialect type catalog with parameter validation
//! - Catalog introspection folds turning raw query results into the model
//! - A diff engine turning a `DatabaseTableSchemaChange` into ordered DDL
//!
//! # Example
//!
//! ```rust
//! use querybridge_core::prelude::*;
//!
//! let users = DatabaseTableSchema::new("shop", "users")
//!     .column(DatabaseTableColumn::new("id", "int").primary_key().auto_increment())
//!     .column(DatabaseTableColumn::new("name", "varchar(50)"));
//!
//! let change = DatabaseTableSchemaChange::from_table(&users)
//!     .add_column(DatabaseTableColumn::new("email", "varchar(255)"));
//!
//! let statements = create_update_table_schema(&MySqlDialect::new(), &change).unwrap();
//! assert_eq!(
//!     statements,
//!     vec!["ALTER TABLE `shop`.`users` ADD COLUMN `email` varchar(255)".to_string()]
//! );
//! ```

pub mod catalog;
pub mod change;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod escape;
pub mod flags;
pub mod introspect;
pub mod result;
pub mod schema;
pub mod value;

pub use error::{Error, Result, TransportError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::catalog::{
        ColumnTypeSelector, TypeDescription, TypeParameter, TypeSuggestion, TypeSuggestionGroup,
    };
    pub use crate::change::{
        ChangeKind, DatabaseTableColumnChange, DatabaseTableConstraintChange,
        DatabaseTableSchemaChange, TableNameChange,
    };
    pub use crate::dialect::{
        for_dialect, ColumnContext, MySqlDialect, PostgresDialect, SqlDialect, SqliteDialect,
    };
    pub use crate::diff::{
        create_update_table_schema, plan_table_schema_change, ChangeStrategy, DiffWarning,
        SchemaChangePlan,
    };
    pub use crate::error::{Error, TransportError};
    pub use crate::flags::{Dialect, DriverFlags};
    pub use crate::result::{ResultHeader, ResultSet, ResultStat, Row};
    pub use crate::schema::{
        DatabaseColumnConstraint, DatabaseSchemaItem, DatabaseSchemas, DatabaseTableColumn,
        DatabaseTableConstraint, DatabaseTableSchema, DatabaseTriggerSchema, ForeignKeyReference,
        ReferentialAction, SchemaItemKind, TableConstraintKind, TriggerOperation, TriggerTiming,
    };
    pub use crate::value::SqlValue;
}
