//! Table reconciliation.
//!
//! Ties introspection, planning and execution together. Each table is an
//! independent unit of work with its own transaction.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::{Result, SyncError};
use crate::executor::{Outcome, PlanExecutor};
use crate::introspect::introspect;
use crate::parser::parse_description;
use crate::plan::{Plan, PlanOptions, Planner};
use crate::schema::{ErGroup, Table};

/// Options for reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Render and log statements without executing them.
    pub dry_run: bool,
    /// Drop live columns absent from the description.
    pub drop_columns: bool,
    /// Drop live indexes absent from the description.
    pub drop_indexes: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            drop_columns: true,
            drop_indexes: true,
        }
    }
}

impl ReconcileOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables dry-run mode.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Keeps live columns that are no longer described.
    #[must_use]
    pub fn keep_columns(mut self) -> Self {
        self.drop_columns = false;
        self
    }

    /// Keeps live indexes that are no longer described.
    #[must_use]
    pub fn keep_indexes(mut self) -> Self {
        self.drop_indexes = false;
        self
    }

    /// Returns the planner options.
    #[must_use]
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            drop_columns: self.drop_columns,
            drop_indexes: self.drop_indexes,
        }
    }
}

/// Outcome of one table within a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    /// Group the table was declared in.
    pub group: String,
    /// Table name.
    pub table: String,
    /// What happened.
    pub outcome: Outcome,
}

/// Computes the plan for `table` against the live database.
pub async fn plan_table<C>(conn: &mut C, table: &Table, options: PlanOptions) -> Result<Plan>
where
    C: Connection + ?Sized,
{
    table.validate()?;
    let live = introspect(conn, &table.name).await?;
    Ok(Planner::with_options(conn.dialect(), options).plan(table, live.as_ref()))
}

/// Brings the live `table` in line with its description.
pub async fn reconcile_table<C>(
    conn: &mut C,
    table: &Table,
    options: ReconcileOptions,
) -> Result<Outcome>
where
    C: Connection + ?Sized,
{
    let plan = plan_table(conn, table, options.plan_options()).await?;
    let outcome = PlanExecutor::new()
        .dry_run(options.dry_run)
        .apply(conn, &plan)
        .await?;

    info!(
        table = %table.name,
        created = plan.is_create(),
        statements = outcome.statements().len(),
        "Table reconciled"
    );
    Ok(outcome)
}

/// Reconciles tables over one connection.
#[derive(Debug)]
pub struct Reconciler<C: Connection> {
    conn: C,
    options: ReconcileOptions,
}

impl<C: Connection> Reconciler<C> {
    /// Creates a reconciler with default options.
    pub fn new(conn: C) -> Self {
        Self::with_options(conn, ReconcileOptions::default())
    }

    /// Creates a reconciler with custom options.
    pub fn with_options(conn: C, options: ReconcileOptions) -> Self {
        Self { conn, options }
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// Returns the connection's dialect.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.conn.dialect()
    }

    /// Returns the connection.
    pub fn connection(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Consumes the reconciler and returns the connection.
    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Computes the plan for `table` without applying it.
    pub async fn plan_table(&mut self, table: &Table) -> Result<Plan> {
        plan_table(&mut self.conn, table, self.options.plan_options()).await
    }

    /// Reconciles one table.
    pub async fn reconcile_table(&mut self, table: &Table) -> Result<Outcome> {
        reconcile_table(&mut self.conn, table, self.options).await
    }

    /// Reconciles every table of every group, in order.
    ///
    /// A failed table does not stop the others; all failures are returned
    /// together.
    pub async fn reconcile_groups(&mut self, groups: &[ErGroup]) -> Result<Vec<TableReport>> {
        let mut reports = Vec::new();
        let mut errors = Vec::new();

        for group in groups {
            for table in &group.tables {
                match self.reconcile_table(table).await {
                    Ok(outcome) => reports.push(TableReport {
                        group: group.name.clone(),
                        table: table.name.clone(),
                        outcome,
                    }),
                    Err(err) => {
                        error!(group = %group.name, table = %table.name, error = %err, "Table reconciliation failed");
                        errors.push(err);
                    }
                }
            }
        }

        match errors.len() {
            0 => Ok(reports),
            1 => Err(errors.remove(0)),
            _ => Err(SyncError::Multiple(errors)),
        }
    }

    /// Parses a description document and reconciles all its tables.
    pub async fn reconcile_document(&mut self, text: &str) -> Result<Vec<TableReport>> {
        let groups = parse_description(text)?;
        self.reconcile_groups(&groups).await
    }
}
