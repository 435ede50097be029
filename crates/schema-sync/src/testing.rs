//! Scripted connection used by unit tests.
//!
//! Serves canned rows for queries by SQL prefix and records every executed
//! statement and transaction call. MySQL-like and chai paths have no
//! in-process engine, so their tests run against this double.

use async_trait::async_trait;

use crate::connection::{Connection, Row};
use crate::dialect::Dialect;
use crate::error::{Result, SyncError};

/// Recorded call on a [`ScriptedConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Begin,
    Execute(String),
    Commit,
    Rollback,
}

#[derive(Debug)]
pub(crate) struct ScriptedConnection {
    dialect: Dialect,
    responses: Vec<(String, Vec<Row>)>,
    fail_on: Option<usize>,
    statements: usize,
    pub(crate) queries: Vec<String>,
    pub(crate) events: Vec<Event>,
}

impl ScriptedConnection {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            responses: Vec::new(),
            fail_on: None,
            statements: 0,
            queries: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Serves `rows` for queries starting with `prefix`.
    pub(crate) fn respond(mut self, prefix: &str, rows: Vec<Row>) -> Self {
        self.responses.push((prefix.to_string(), rows));
        self
    }

    /// Fails the `n`-th executed statement (1-based).
    pub(crate) fn fail_on(mut self, n: usize) -> Self {
        self.fail_on = Some(n);
        self
    }

    /// Statements executed so far, in order.
    pub(crate) fn executed(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Execute(sql) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn fetch_rows(&mut self, sql: &str, _binds: &[&str]) -> Result<Vec<Row>> {
        self.queries.push(sql.to_string());
        Ok(self
            .responses
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.statements += 1;
        if self.fail_on == Some(self.statements) {
            return Err(SyncError::Database(sqlx::Error::Protocol(format!(
                "scripted failure on: {sql}"
            ))));
        }
        self.events.push(Event::Execute(sql.to_string()));
        Ok(0)
    }

    async fn begin(&mut self) -> Result<()> {
        self.events.push(Event::Begin);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.events.push(Event::Commit);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.events.push(Event::Rollback);
        Ok(())
    }
}
