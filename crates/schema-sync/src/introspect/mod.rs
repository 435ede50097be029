//! Live schema introspection.
//!
//! Reads the current structure of one table through a [`Connection`]. A
//! table that does not exist is reported as `Ok(None)`, which is how the
//! planner tells "create" from "alter".

mod chai;
mod mysql;
mod sqlite;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::Result;

/// Reserved index name under which the live primary key is reported.
pub const PRIMARY_KEY_INDEX: &str = "PRIMARY";

/// A column as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveColumn {
    /// Column name.
    pub name: String,
    /// Native type as reported by the catalog.
    pub sql_type: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Raw default, `None` when the catalog reports none.
    pub default: Option<String>,
    /// Extra clause, e.g. `auto_increment`.
    pub extra: String,
    /// Column comment, empty where unsupported.
    pub comment: String,
    /// Preceding column, empty for the first column or where order is not
    /// tracked.
    pub after: String,
}

/// A table as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveTable {
    /// Table name.
    pub name: String,
    /// Table comment, empty where unsupported.
    pub comment: String,
    /// Columns in table order.
    pub columns: Vec<LiveColumn>,
    /// Index name to ordered member columns, primary key under
    /// [`PRIMARY_KEY_INDEX`].
    pub indexes: BTreeMap<String, Vec<String>>,
}

impl LiveTable {
    /// Creates an empty live table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            columns: Vec::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Gets a column by name, case-insensitively.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Gets the members of an index by name, case-insensitively.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&[String]> {
        self.indexes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, members)| members.as_slice())
    }

    /// Primary-key columns, empty when the table has none.
    #[must_use]
    pub fn primary_key(&self) -> &[String] {
        self.indexes
            .get(PRIMARY_KEY_INDEX)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Secondary indexes in name order.
    pub fn secondary_indexes(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.indexes
            .iter()
            .filter(|(name, _)| name.as_str() != PRIMARY_KEY_INDEX)
    }

    /// Fills `after` from column order.
    pub(crate) fn link_positions(&mut self) {
        let mut previous = String::new();
        for column in &mut self.columns {
            column.after = std::mem::replace(&mut previous, column.name.clone());
        }
    }

    /// Appends `column` to the member list of `index`.
    pub(crate) fn push_index_member(&mut self, index: &str, column: impl Into<String>) {
        self.indexes
            .entry(index.to_string())
            .or_default()
            .push(column.into());
    }
}

/// Reads the live structure of `table`, or `None` if it does not exist.
pub async fn introspect<C>(conn: &mut C, table: &str) -> Result<Option<LiveTable>>
where
    C: Connection + ?Sized,
{
    let live = match conn.dialect() {
        Dialect::MySql => mysql::introspect(conn, table).await?,
        Dialect::Sqlite => sqlite::introspect(conn, table).await?,
        Dialect::Chai => chai::introspect(conn, table).await?,
    };

    match &live {
        Some(found) => debug!(
            table = %table,
            columns = found.columns.len(),
            indexes = found.indexes.len(),
            "Introspected table"
        ),
        None => debug!(table = %table, "Table does not exist"),
    }
    Ok(live)
}
