//! Schema description types.
//!
//! These types describe the desired structure of a table. They are built by
//! the description parser or by callers directly, and are consumed read-only
//! by the planner and by external generators.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::dialect::SchemaDialect;
use crate::error::{Result, SyncError};

/// Name of the group that collects tables declared before any group header.
pub const DEFAULT_GROUP: &str = "Default";

/// Extra clause marking an auto-increment column.
pub const AUTO_INCREMENT: &str = "AUTO_INCREMENT";

/// Index membership of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexRole {
    /// Not part of any index.
    #[default]
    None,
    /// Member of the primary key.
    PrimaryKey,
    /// Member of a unique index.
    Unique,
    /// Member of a full-text index.
    FullText,
    /// Member of a plain index.
    Index,
}

impl IndexRole {
    /// Returns the secondary index kind for this role, if any.
    #[must_use]
    pub fn index_kind(self) -> Option<IndexKind> {
        match self {
            Self::Unique => Some(IndexKind::Unique),
            Self::FullText => Some(IndexKind::FullText),
            Self::Index => Some(IndexKind::Plain),
            Self::None | Self::PrimaryKey => None,
        }
    }
}

/// Kind of a secondary (non primary-key) index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// UNIQUE index.
    Unique,
    /// FULLTEXT index.
    FullText,
    /// Plain index.
    Plain,
}

impl IndexKind {
    /// Prefix used when generating the index name.
    #[must_use]
    pub fn name_prefix(self) -> &'static str {
        match self {
            Self::Unique => "uk",
            Self::FullText => "tk",
            Self::Plain => "ik",
        }
    }
}

/// A derived secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDef {
    /// Generated index name.
    pub name: String,
    /// Index kind.
    pub kind: IndexKind,
    /// Member columns in declaration order.
    pub columns: Vec<String>,
    /// Comment of the first member column.
    pub comment: String,
}

/// Desired definition of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Dialect-native type, e.g. `varchar(100)` or `bigint unsigned`.
    pub sql_type: String,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Raw default value, empty for none.
    pub default: String,
    /// Free-form extra clause such as `AUTO_INCREMENT`.
    pub extra: String,
    /// Column comment.
    pub comment: String,
    /// Index membership.
    pub index: IndexRole,
    /// Label merging several columns into one composite index.
    pub index_group: Option<String>,
}

impl Column {
    /// Creates a nullable column with no default, extra or index.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            default: String::new(),
            extra: String::new(),
            comment: String::new(),
            index: IndexRole::None,
            index_group: None,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the raw default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = value.into();
        self
    }

    /// Sets the extra clause.
    #[must_use]
    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Marks the column as a primary-key member.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.index = IndexRole::PrimaryKey;
        self.nullable = false;
        self
    }

    /// Marks the column as auto-increment, which implies primary-key membership.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.extra = AUTO_INCREMENT.to_string();
        self.primary_key()
    }

    /// Makes the column a member of a unique index.
    #[must_use]
    pub fn unique(self) -> Self {
        self.indexed(IndexRole::Unique, None)
    }

    /// Makes the column a member of the grouped unique index `group`.
    #[must_use]
    pub fn unique_in(self, group: impl Into<String>) -> Self {
        self.indexed(IndexRole::Unique, Some(group.into()))
    }

    /// Makes the column a member of a plain index.
    #[must_use]
    pub fn index(self) -> Self {
        self.indexed(IndexRole::Index, None)
    }

    /// Makes the column a member of the grouped plain index `group`.
    #[must_use]
    pub fn index_in(self, group: impl Into<String>) -> Self {
        self.indexed(IndexRole::Index, Some(group.into()))
    }

    /// Makes the column a member of a full-text index.
    #[must_use]
    pub fn full_text(self) -> Self {
        self.indexed(IndexRole::FullText, None)
    }

    fn indexed(mut self, role: IndexRole, group: Option<String>) -> Self {
        self.index = role;
        self.index_group = group;
        self
    }

    /// Returns whether the column auto-increments.
    #[must_use]
    pub fn is_auto_increment(&self) -> bool {
        self.extra.eq_ignore_ascii_case(AUTO_INCREMENT)
    }

    /// Renders the column declaration for `dialect`.
    ///
    /// The descriptor is always derived from the current attributes and is
    /// never stored.
    #[must_use]
    pub fn descriptor(&self, dialect: &dyn SchemaDialect) -> String {
        dialect.column_definition(self)
    }
}

/// Desired definition of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Table comment.
    pub comment: String,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            columns: Vec::new(),
        }
    }

    /// Sets the table comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary-key columns in declaration order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.index == IndexRole::PrimaryKey)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Derives the secondary indexes.
    ///
    /// Columns sharing a role and a group label collapse into one composite
    /// index whose members follow declaration order.
    #[must_use]
    pub fn indexes(&self) -> Vec<IndexDef> {
        let mut indexes: Vec<IndexDef> = Vec::new();
        for column in &self.columns {
            let Some(kind) = column.index.index_kind() else {
                continue;
            };
            let label = column.index_group.as_deref().unwrap_or(&column.name);
            let name = format!("{}_{}_{}", kind.name_prefix(), self.name, label);

            match indexes.iter_mut().find(|i| i.name == name) {
                Some(existing) => existing.columns.push(column.name.clone()),
                None => indexes.push(IndexDef {
                    name,
                    kind,
                    columns: vec![column.name.clone()],
                    comment: column.comment.clone(),
                }),
            }
        }
        indexes
    }

    /// Checks the table invariants.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SyncError::invalid_table("", "table name is empty"));
        }
        if self.columns.is_empty() {
            return Err(SyncError::invalid_table(&self.name, "table has no columns"));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(SyncError::invalid_table(
                    &self.name,
                    format!("duplicate column '{}'", column.name),
                ));
            }
        }
        Ok(())
    }
}

/// A named section of a description document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErGroup {
    /// Group name; not required to be unique.
    pub name: String,
    /// Tables in declaration order.
    pub tables: Vec<Table>,
}

impl ErGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Table {
        Table::new("orders")
            .column(Column::new("id", "bigint unsigned").auto_increment())
            .column(Column::new("shop", "int").not_null().unique_in("2"))
            .column(Column::new("code", "varchar(20)").not_null().unique_in("2"))
            .column(Column::new("buyer", "int").index())
            .column(Column::new("note", "text").full_text())
    }

    #[test]
    fn test_column_builder() {
        let col = Column::new("id", "bigint").auto_increment();

        assert!(col.is_auto_increment());
        assert_eq!(col.index, IndexRole::PrimaryKey);
        assert!(!col.nullable);
    }

    #[test]
    fn test_primary_key_columns() {
        let table = Table::new("links")
            .column(Column::new("a", "int").primary_key())
            .column(Column::new("label", "text"))
            .column(Column::new("b", "int").primary_key());

        assert_eq!(table.primary_key(), vec!["a", "b"]);
    }

    #[test]
    fn test_grouped_unique_columns_form_one_index() {
        let indexes = orders().indexes();
        let unique: Vec<_> = indexes
            .iter()
            .filter(|i| i.kind == IndexKind::Unique)
            .collect();

        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].name, "uk_orders_2");
        assert_eq!(unique[0].columns, vec!["shop", "code"]);
    }

    #[test]
    fn test_index_names() {
        let names: Vec<String> = orders().indexes().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["uk_orders_2", "ik_orders_buyer", "tk_orders_note"]);
    }

    #[test]
    fn test_composite_primary_key_adds_no_prefix_indexes() {
        let table = Table::new("memberships")
            .column(Column::new("group_id", "int").primary_key())
            .column(Column::new("user_id", "int").primary_key())
            .column(Column::new("role", "int"));

        assert_eq!(table.primary_key(), vec!["group_id", "user_id"]);
        assert!(table.indexes().is_empty());
    }

    #[test]
    fn test_validate_rejects_duplicate_columns() {
        let table = Table::new("t")
            .column(Column::new("a", "int"))
            .column(Column::new("A", "int"));

        assert!(matches!(
            table.validate(),
            Err(SyncError::InvalidTable { .. })
        ));
        assert!(orders().validate().is_ok());
    }
}
