//! Async database drivers for `querybridge`.
//!
//! A driver pairs a [`Transport`](transport::Transport), which moves
//! statements and results, with a dialect from `querybridge-core`, which
//! knows how to escape, introspect and plan schema changes. Drivers exist for
//! the MySQL, PostgreSQL and SQLite families.
//!
//! # Example
//!
//! ```rust,no_run
//! use querybridge_driver::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = SqliteTransport::connect("sqlite::memory:").await?;
//! let driver = SqliteDriver::new(transport);
//!
//! driver.query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)").await?;
//! let users = driver.table_schema("main", "users").await?;
//! let change = DatabaseTableSchemaChange::from_table(&users)
//!     .rename_column("name", "full_name");
//! driver.apply_table_schema_change(&change).await?;
//! # Ok(())
//! # }
//! ```

mod driver;
pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod transport;

pub use driver::Driver;
pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;
pub use sqlite::{SqliteDriver, SqliteOptions};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::transport::{
        ChannelTransport, RequestTracker, Responder, SqliteTransport, Transport, TransportRequest,
        TransportResponse,
    };
    pub use crate::{Driver, MySqlDriver, PostgresDriver, SqliteDriver, SqliteOptions};
    pub use querybridge_core::prelude::*;
}
