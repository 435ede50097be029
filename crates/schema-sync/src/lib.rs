//! Declarative schema reconciliation for SQL tables.
//!
//! `schema-sync` brings a live table in line with a dialect-independent
//! description, emitting only the changes needed and applying them in one
//! transaction per table. Running it twice in a row is a no-op.
//!
//! # Architecture
//!
//! - **Schema** - `Table`, `Column` and `ErGroup` describing the desired state
//! - **Parser** - Builds the schema from the line-oriented description language
//! - **Dialect** - Per-backend quoting, rendering and capability flags
//! - **Introspect** - Reads the live structure of a table
//! - **Plan** - Diffs desired against live state into ordered actions
//! - **Executor** - Applies a plan atomically
//!
//! # Description language
//!
//! ```text
//! // Accounts
//! user            // registered users
//! id      ubi AI
//! name    v30 U
//! shop    i   I2
//! code    v20 I2
//! created dt  ct
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use schema_sync::prelude::*;
//!
//! let conn = SqliteConnection::connect("sqlite:app.sqlite3").await?;
//! let mut reconciler = Reconciler::new(conn);
//! for report in reconciler.reconcile_document(&text).await? {
//!     println!("{}: {:?}", report.table, report.outcome);
//! }
//! ```

pub mod connection;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod parser;
pub mod plan;
pub mod reconcile;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::connection::{Connection, MySqlConnection, Row, SqliteConnection};
    pub use crate::dialect::{ChaiDialect, Dialect, MySqlDialect, SchemaDialect, SqliteDialect};
    pub use crate::error::{Result, SyncError};
    pub use crate::executor::{Outcome, PlanExecutor};
    pub use crate::introspect::{introspect, LiveColumn, LiveTable, PRIMARY_KEY_INDEX};
    pub use crate::parser::parse_description;
    pub use crate::plan::{Action, Plan, PlanOptions, Planner, Position};
    pub use crate::reconcile::{
        plan_table, reconcile_table, ReconcileOptions, Reconciler, TableReport,
    };
    pub use crate::schema::{Column, ErGroup, IndexDef, IndexKind, IndexRole, Table};
}
