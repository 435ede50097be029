//! Embedded-simplified ("chai") dialect.

use super::sqlite::{embedded_extra_clause, embedded_primary_key, embedded_type_name, relax_for_add};
use super::{IndexStyle, SchemaDialect};
use crate::schema::{Column, Table};

/// Simplified embedded dialect.
///
/// Shares the SQLite-like declaration rules but cannot drop columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaiDialect;

impl ChaiDialect {
    /// Creates a new chai dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SchemaDialect for ChaiDialect {
    fn name(&self) -> &'static str {
        "chai"
    }

    fn supports_alter_column(&self) -> bool {
        false
    }

    fn supports_drop_column(&self) -> bool {
        false
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Action, Plan};

    #[test]
    fn test_drop_column_is_skipped() {
        let plan = Plan {
            table: "items".to_string(),
            actions: vec![
                Action::AddColumn(Column::new("sku", "varchar(20)")),
                Action::DropColumn {
                    name: "legacy".to_string(),
                },
            ],
        };

        assert_eq!(
            ChaiDialect::new().plan_sql(&plan),
            vec!["ALTER TABLE \"items\" ADD COLUMN \"sku\" varchar(20) NULL"]
        );
    }

    #[test]
    fn test_create_table_with_unique_index() {
        let table = Table::new("items")
            .column(Column::new("id", "int").primary_key())
            .column(Column::new("sku", "varchar(20)").not_null().unique());

        assert_eq!(
            ChaiDialect::new().create_table_sql(&table),
            vec![
                "CREATE TABLE \"items\" (\n  \"id\" int NOT NULL,\n  \"sku\" varchar(20) NOT NULL,\n  PRIMARY KEY (\"id\")\n)",
                "CREATE UNIQUE INDEX \"uk_items_sku\" ON \"items\" (\"sku\")",
            ]
        );
    }
}
