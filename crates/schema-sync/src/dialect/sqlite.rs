//! SQLite-like dialect.

use tracing::debug;

use super::{is_expression_default, IndexStyle, SchemaDialect};
use crate::schema::{Column, IndexRole, Table};

/// SQLite-like embedded dialect.
///
/// Columns cannot be altered in place and primary keys are fixed at
/// creation. A lone auto-increment key is declared inline as
/// `integer PRIMARY KEY AUTOINCREMENT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Column declaration rules shared by the embedded dialects.
pub(super) fn embedded_type_name(column: &Column) -> String {
    if column.is_auto_increment() {
        "integer".to_string()
    } else {
        column.sql_type.clone()
    }
}

pub(super) fn embedded_extra_clause(column: &Column) -> Option<String> {
    column
        .is_auto_increment()
        .then(|| "PRIMARY KEY AUTOINCREMENT".to_string())
}

pub(super) fn embedded_primary_key<'a>(table: &'a Table) -> Vec<&'a str> {
    table
        .columns
        .iter()
        .filter(|c| c.index == IndexRole::PrimaryKey && !c.is_auto_increment())
        .map(|c| c.name.as_str())
        .collect()
}

/// Relaxes a column so that ADD COLUMN is accepted on an existing table.
///
/// NOT NULL needs a default and the default must be a constant.
pub(super) fn relax_for_add(dialect: &dyn SchemaDialect, column: &Column) -> String {
    let mut relaxed = column.clone();
    let default = dialect.effective_default(column).to_string();
    relaxed.default = if is_expression_default(&default) {
        debug!(column = %column.name, default = %default, "Dropping non-constant default on added column");
        String::new()
    } else {
        default
    };
    if !relaxed.nullable && relaxed.default.is_empty() {
        debug!(column = %column.name, "Adding NOT NULL column without default as nullable");
        relaxed.nullable = true;
    }
    dialect.column_definition(&relaxed)
}

impl SchemaDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn supports_alter_column(&self) -> bool {
        false
    }

    fn supports_drop_column(&self) -> bool {
        true
    }

    fn supports_add_constraint(&self) -> bool {
        false
    }

    fn supports_comments(&self) -> bool {
        false
    }

    fn supports_column_position(&self) -> bool {
        false
    }

    fn supports_fulltext(&self) -> bool {
        false
    }

    fn index_style(&self) -> IndexStyle {
        IndexStyle::Standalone
    }

    fn type_name(&self, column: &Column) -> String {
        embedded_type_name(column)
    }

    fn extra_clause(&self, column: &Column) -> Option<String> {
        embedded_extra_clause(column)
    }

    fn add_column_definition(&self, column: &Column) -> String {
        relax_for_add(self, column)
    }

    fn primary_key_clause_columns<'a>(&self, table: &'a Table) -> Vec<&'a str> {
        embedded_primary_key(table)
    }
}
