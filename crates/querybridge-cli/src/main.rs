//! querybridge CLI
//!
//! Inspects a SQLite database and plans or applies table changes.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use querybridge_cli::{
    apply_change, load_change, plan_change, type_catalog, validate_type, DialectArg,
};
use querybridge_driver::prelude::*;

/// Inspect databases and plan schema changes.
#[derive(Parser)]
#[command(name = "querybridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Read column listings with one query per table instead of
    /// `pragma_table_info()`.
    #[arg(long)]
    no_pragma_list: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List schemas with their tables, views and triggers.
    Schemas,

    /// Show one table.
    Table {
        /// Schema name.
        schema: String,

        /// Table name.
        table: String,
    },

    /// Show the DDL for a table change without running it.
    Plan {
        /// JSON file holding the table change.
        change: PathBuf,

        /// Dialect to plan for.
        #[arg(short = 'D', long, value_enum, default_value_t = DialectArg::Sqlite)]
        dialect: DialectArg,
    },

    /// Apply a table change to the database.
    Apply {
        /// JSON file holding the table change.
        change: PathBuf,
    },

    /// List the column types of a dialect.
    Types {
        /// Dialect whose catalog to list.
        #[arg(short = 'D', long, value_enum, default_value_t = DialectArg::Sqlite)]
        dialect: DialectArg,

        /// Validate a type string instead of listing the catalog.
        #[arg(long)]
        validate: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect(cli: &Cli) -> anyhow::Result<SqliteDriver<SqliteTransport>> {
    debug!(database = %cli.database, "Connecting");
    let transport = SqliteTransport::connect(&cli.database).await?;
    let options = SqliteOptions {
        support_pragma_list: !cli.no_pragma_list,
        ..SqliteOptions::default()
    };
    Ok(SqliteDriver::with_options(transport, options))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Schemas => {
            let driver = connect(&cli).await?;
            print_json(&driver.schemas().await?)?;
        }

        Commands::Table { schema, table } => {
            let driver = connect(&cli).await?;
            print_json(&driver.table_schema(schema, table).await?)?;
        }

        Commands::Plan { change, dialect } => {
            let change = load_change(change)?;
            print_json(&plan_change((*dialect).into(), &change)?)?;
        }

        Commands::Apply { change } => {
            let change = load_change(change)?;
            let driver = connect(&cli).await?;
            print_json(&apply_change(&driver, &change).await?)?;
        }

        Commands::Types { dialect, validate } => match validate {
            Some(type_string) => {
                print_json(&validate_type((*dialect).into(), type_string)?)?;
            }
            None => print_json(&type_catalog((*dialect).into()))?,
        },
    }

    Ok(())
}
