//! Transactional plan execution.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::Result;
use crate::plan::Plan;

/// Result of executing one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The plan was empty; no transaction was opened.
    Unchanged,
    /// All statements ran and the transaction was committed.
    Applied {
        /// Executed statements, in order.
        statements: Vec<String>,
    },
    /// Statements were rendered and logged but not executed.
    DryRun {
        /// Statements that would run, in order.
        statements: Vec<String>,
    },
}

impl Outcome {
    /// Statements executed or planned, empty when unchanged.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        match self {
            Self::Unchanged => &[],
            Self::Applied { statements } | Self::DryRun { statements } => statements,
        }
    }

    /// Returns whether the database was (or would be) changed.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        !self.statements().is_empty()
    }
}

/// Applies plans inside a transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanExecutor {
    dry_run: bool,
}

impl PlanExecutor {
    /// Creates a new executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables dry-run mode (SQL is logged but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns whether dry-run mode is enabled.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Executes `plan` on `conn`.
    ///
    /// All statements run in one transaction. On the first failure the
    /// transaction is rolled back and the statement's error is returned.
    pub async fn apply<C>(&self, conn: &mut C, plan: &Plan) -> Result<Outcome>
    where
        C: Connection + ?Sized,
    {
        let statements = plan.to_sql(conn.dialect());
        if statements.is_empty() {
            debug!(table = %plan.table, "Nothing to apply");
            return Ok(Outcome::Unchanged);
        }

        if self.dry_run {
            for sql in &statements {
                info!(table = %plan.table, sql = %sql, "Dry run");
            }
            return Ok(Outcome::DryRun { statements });
        }

        conn.begin().await?;
        for sql in &statements {
            info!(table = %plan.table, sql = %sql, "Executing SQL");
            if let Err(err) = conn.execute(sql).await {
                warn!(table = %plan.table, sql = %sql, error = %err, "Statement failed, rolling back");
                if let Err(rollback_err) = conn.rollback().await {
                    warn!(table = %plan.table, error = %rollback_err, "Rollback failed");
                }
                return Err(err);
            }
        }
        conn.commit().await?;

        info!(
            table = %plan.table,
            statements = statements.len(),
            "Plan applied successfully"
        );
        Ok(Outcome::Applied { statements })
    }
}
