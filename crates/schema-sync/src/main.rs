//! schema-sync CLI
//!
//! Reconciles a database with a table description file.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use schema_sync::prelude::*;

/// Reconciles live SQL tables with a table description.
#[derive(Parser)]
#[command(name = "schema-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (`sqlite:` path or `mysql://` connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:schema.sqlite3")]
    database: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Keep live columns that are no longer described.
    #[arg(long)]
    keep_columns: bool,

    /// Keep live indexes that are no longer described.
    #[arg(long)]
    keep_indexes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a description file to the database.
    Apply {
        /// Description file.
        file: PathBuf,
    },

    /// Show the SQL a description file would run, without executing it.
    Plan {
        /// Description file.
        file: PathBuf,
    },

    /// Parse a description file and print the model as JSON.
    Inspect {
        /// Description file.
        file: PathBuf,
    },

    /// Print the live structure of a table as JSON.
    Introspect {
        /// Table name.
        table: String,
    },
}

impl Cli {
    fn options(&self) -> ReconcileOptions {
        let mut options = ReconcileOptions::new();
        if self.keep_columns {
            options = options.keep_columns();
        }
        if self.keep_indexes {
            options = options.keep_indexes();
        }
        options
    }
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
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parsing needs no database.
    if let Commands::Inspect { file } = &cli.command {
        return print_model(file);
    }

    match Dialect::from_url(&cli.database) {
        Some(Dialect::Sqlite) => {
            let conn = SqliteConnection::connect(&cli.database).await?;
            run(conn, &cli).await
        }
        Some(Dialect::MySql) => {
            let conn = MySqlConnection::connect(&cli.database).await?;
            run(conn, &cli).await
        }
        Some(Dialect::Chai) => Err(SyncError::UnsupportedDialect(
            "chai has no bundled driver".to_string(),
        )
        .into()),
        None => Err(SyncError::UnsupportedDialect(cli.database.clone()).into()),
    }
}

fn read_description(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

fn print_model(path: &Path) -> anyhow::Result<()> {
    let groups = parse_description(&read_description(path)?)?;
    println!("{}", serde_json::to_string_pretty(&groups)?);
    Ok(())
}

async fn run<C: Connection>(conn: C, cli: &Cli) -> anyhow::Result<()> {
    let options = cli.options();
    info!(dialect = %conn.dialect(), "Connected");

    match &cli.command {
        Commands::Apply { file } => {
            let text = read_description(file)?;
            let mut reconciler = Reconciler::with_options(conn, options);
            let reports = reconciler.reconcile_document(&text).await?;
            let changed = reports.iter().filter(|r| r.outcome.is_changed()).count();
            info!(tables = reports.len(), changed, "Reconciliation complete");
        }

        Commands::Plan { file } => {
            let text = read_description(file)?;
            let mut reconciler = Reconciler::with_options(conn, options.dry_run(true));
            for report in reconciler.reconcile_document(&text).await? {
                if report.outcome.is_changed() {
                    println!("-- {}/{}", report.group, report.table);
                    for sql in report.outcome.statements() {
                        println!("{};", sql);
                    }
                    println!();
                }
            }
        }

        Commands::Introspect { table } => {
            let mut conn = conn;
            match introspect(&mut conn, table).await? {
                Some(live) => println!("{}", serde_json::to_string_pretty(&live)?),
                None => info!(table = %table, "Table does not exist"),
            }
        }

        Commands::Inspect { file } => print_model(file)?,
    }

    Ok(())
}
