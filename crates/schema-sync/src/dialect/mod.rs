//! Database dialect adapters.
//!
//! Each dialect knows how to quote, render and alter tables for one backend
//! and exposes the capability flags the planner branches on. Adding a
//! backend means implementing [`SchemaDialect`]; the planner is untouched.

mod chai;
mod mysql;
mod sqlite;

use std::fmt;
use std::str::FromStr;

pub use chai::ChaiDialect;
pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::introspect::LiveColumn;
use crate::plan::{Action, Plan};
use crate::schema::{Column, IndexDef, IndexKind, Table};

/// Closed set of supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// MySQL-like server.
    MySql,
    /// SQLite-like embedded engine.
    Sqlite,
    /// Simplified embedded engine with a `__chai_catalog` catalog.
    Chai,
}

impl Dialect {
    /// Returns the adapter implementing this dialect.
    #[must_use]
    pub fn adapter(self) -> &'static dyn SchemaDialect {
        match self {
            Self::MySql => &MySqlDialect,
            Self::Sqlite => &SqliteDialect,
            Self::Chai => &ChaiDialect,
        }
    }

    /// Infers the dialect from a connection URL scheme.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "chai" => Some(Self::Chai),
            _ => None,
        }
    }

    /// Returns the dialect name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.adapter().name()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            "chai" => Ok(Self::Chai),
            other => Err(SyncError::UnsupportedDialect(other.to_string())),
        }
    }
}

/// How secondary indexes are declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStyle {
    /// `KEY` clauses inside CREATE TABLE / ALTER TABLE.
    Inline,
    /// Separate `CREATE INDEX` statements.
    Standalone,
}

/// Returns whether a raw default is an expression that must not be quoted.
#[must_use]
pub fn is_expression_default(value: &str) -> bool {
    let upper = value.to_ascii_uppercase();
    upper.contains("CURRENT_TIMESTAMP") || upper.contains("()") || upper.contains("SYSTIMESTAMP")
}

const ON_UPDATE_SUFFIX: &str = " ON UPDATE CURRENT_TIMESTAMP";

/// Trait for backend-specific rendering and capabilities.
pub trait SchemaDialect: Send + Sync + fmt::Debug {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns whether an existing column can be altered in place.
    fn supports_alter_column(&self) -> bool;

    /// Returns whether columns can be dropped.
    fn supports_drop_column(&self) -> bool;

    /// Returns whether a primary key can be added or dropped after creation.
    fn supports_add_constraint(&self) -> bool;

    /// Returns whether table and column comments exist.
    fn supports_comments(&self) -> bool;

    /// Returns whether column order is tracked and controllable.
    fn supports_column_position(&self) -> bool;

    /// Returns whether full-text indexes exist.
    fn supports_fulltext(&self) -> bool;

    /// Returns how secondary indexes are declared.
    fn index_style(&self) -> IndexStyle;

    /// Returns whether all alterations go into one multi-clause ALTER TABLE.
    fn combines_alter_clauses(&self) -> bool {
        false
    }

    /// Returns whether an index of `kind` can be created.
    fn supports_index(&self, kind: IndexKind) -> bool {
        kind != IndexKind::FullText || self.supports_fulltext()
    }

    /// Quotes an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quotes a string literal.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Returns the rendered type of a column.
    fn type_name(&self, column: &Column) -> String {
        column.sql_type.clone()
    }

    /// Returns the collation clause for a column, if any.
    fn collation(&self, _column: &Column) -> Option<&'static str> {
        None
    }

    /// Returns the rendered extra clause for a column, if any.
    fn extra_clause(&self, column: &Column) -> Option<String> {
        (!column.extra.is_empty()).then(|| column.extra.clone())
    }

    /// Returns the default this dialect can express for a column.
    ///
    /// `ON UPDATE CURRENT_TIMESTAMP` only exists on MySQL-like servers.
    fn effective_default<'a>(&self, column: &'a Column) -> &'a str {
        let default = column.default.as_str();
        match default.to_ascii_uppercase().find(ON_UPDATE_SUFFIX) {
            Some(pos) => default[..pos].trim_end(),
            None => default,
        }
    }

    /// Renders a raw default value.
    fn render_default(&self, value: &str) -> String {
        if is_expression_default(value) {
            value.to_string()
        } else {
            self.quote_literal(value)
        }
    }

    /// Generates the column declaration (the column's descriptor).
    fn column_definition(&self, column: &Column) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.type_name(column)
        );

        if let Some(collation) = self.collation(column) {
            sql.push_str(" COLLATE ");
            sql.push_str(collation);
        }

        if let Some(extra) = self.extra_clause(column) {
            sql.push(' ');
            sql.push_str(&extra);
        }

        sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });

        let default = self.effective_default(column);
        if !default.is_empty() {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_default(default));
        }

        if self.supports_comments() && !column.comment.is_empty() {
            sql.push_str(" COMMENT ");
            sql.push_str(&self.quote_literal(&column.comment));
        }

        sql
    }

    /// Generates the declaration used by ADD COLUMN.
    fn add_column_definition(&self, column: &Column) -> String {
        self.column_definition(column)
    }

    /// Normalizes an introspected type for comparison.
    fn normalize_live_type(&self, sql_type: &str) -> String {
        sql_type.trim().replace(" (", "(")
    }

    /// Normalizes an introspected default for comparison with a desired one.
    fn normalize_live_default(&self, live: &LiveColumn) -> String {
        let raw = live.default.as_deref().unwrap_or("").trim();
        if raw.eq_ignore_ascii_case("NULL") {
            return String::new();
        }
        match raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
            Some(inner) => inner.replace("''", "'"),
            None => raw.to_string(),
        }
    }

    /// Columns covered by the table-level PRIMARY KEY clause.
    fn primary_key_clause_columns<'a>(&self, table: &'a Table) -> Vec<&'a str> {
        table.primary_key()
    }

    /// Table options appended after the CREATE TABLE column list.
    fn table_options(&self, _table: &Table) -> String {
        String::new()
    }

    /// Generates an index clause for CREATE TABLE or ALTER TABLE.
    fn inline_index_clause(&self, index: &IndexDef) -> String {
        let keyword = match index.kind {
            IndexKind::Unique => "UNIQUE KEY",
            IndexKind::FullText => "FULLTEXT KEY",
            IndexKind::Plain => "KEY",
        };
        let mut sql = format!(
            "{} {} ({})",
            keyword,
            self.quote_identifier(&index.name),
            self.quote_list(&index.columns)
        );
        if self.supports_comments() {
            sql.push_str(" COMMENT ");
            sql.push_str(&self.quote_literal(&index.comment));
        }
        sql
    }

    /// Generates a standalone CREATE INDEX statement.
    fn create_index_sql(&self, table: &str, index: &IndexDef) -> String {
        let unique = if index.kind == IndexKind::Unique {
            "UNIQUE "
        } else {
            ""
        };
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            unique,
            self.quote_identifier(&index.name),
            self.quote_identifier(table),
            self.quote_list(&index.columns)
        )
    }

    /// Quotes and comma-joins a list of identifiers.
    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Generates the statements creating `table` with its keys and indexes.
    fn create_table_sql(&self, table: &Table) -> Vec<String> {
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();

        let pk: Vec<String> = self
            .primary_key_clause_columns(table)
            .into_iter()
            .map(str::to_string)
            .collect();
        if !pk.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", self.quote_list(&pk)));
        }

        let indexes: Vec<IndexDef> = table
            .indexes()
            .into_iter()
            .filter(|i| self.supports_index(i.kind))
            .collect();

        let mut statements = Vec::new();
        match self.index_style() {
            IndexStyle::Inline => {
                lines.extend(indexes.iter().map(|i| self.inline_index_clause(i)));
                statements.push(self.create_table_statement(table, &lines));
            }
            IndexStyle::Standalone => {
                statements.push(self.create_table_statement(table, &lines));
                statements.extend(indexes.iter().map(|i| self.create_index_sql(&table.name, i)));
            }
        }
        statements
    }

    /// Wraps column and key lines in a CREATE TABLE statement.
    fn create_table_statement(&self, table: &Table, lines: &[String]) -> String {
        format!(
            "CREATE TABLE {} (\n  {}\n){}",
            self.quote_identifier(&table.name),
            lines.join(",\n  "),
            self.table_options(table)
        )
    }

    /// Generates one clause of a combined ALTER TABLE statement.
    fn alter_clause(&self, _action: &Action) -> Option<String> {
        None
    }

    /// Generates a standalone statement for one alter action.
    fn action_sql(&self, table: &str, action: &Action) -> Option<String> {
        let table_sql = self.quote_identifier(table);
        match action {
            Action::DropIndex { name } => Some(format!("DROP INDEX {}", self.quote_identifier(name))),
            Action::AddColumn(column) => Some(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                table_sql,
                self.add_column_definition(column)
            )),
            Action::DropColumn { name } if self.supports_drop_column() => Some(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                table_sql,
                self.quote_identifier(name)
            )),
            Action::AddIndex(index) if self.supports_index(index.kind) => {
                Some(self.create_index_sql(table, index))
            }
            _ => None,
        }
    }

    /// Renders a whole plan into the statements to execute, in order.
    fn plan_sql(&self, plan: &Plan) -> Vec<String> {
        if let Some(table) = plan.created_table() {
            return self.create_table_sql(table);
        }
        if plan.is_empty() {
            return Vec::new();
        }
        if self.combines_alter_clauses() {
            let clauses: Vec<String> = plan
                .actions
                .iter()
                .filter_map(|a| self.alter_clause(a))
                .collect();
            if clauses.is_empty() {
                return Vec::new();
            }
            return vec![format!(
                "ALTER TABLE {}\n  {}",
                self.quote_identifier(&plan.table),
                clauses.join(",\n  ")
            )];
        }
        plan.actions
            .iter()
            .filter_map(|a| self.action_sql(&plan.table, a))
            .collect()
    }
}
