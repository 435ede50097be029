//! MySQL-like dialect.

use std::sync::LazyLock;

use regex::Regex;

use super::{IndexStyle, SchemaDialect};
use crate::introspect::LiveColumn;
use crate::plan::{Action, Position};
use crate::schema::{Column, Table};

const COLLATION: &str = "utf8mb4_general_ci";

/// Integer display width, as echoed by MariaDB and older MySQL servers.
static DISPLAY_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b((?:tiny|small|medium|big)?int)\(\d+\)")
        .expect("valid display width regex")
});

/// `current_timestamp()` and `current_timestamp(N)` spellings.
static CURRENT_TIMESTAMP_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^current_timestamp(?:\(\d*\))?$").expect("valid timestamp regex")
});

/// MySQL-like server dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SchemaDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn supports_alter_column(&self) -> bool {
        true
    }

    fn supports_drop_column(&self) -> bool {
        true
    }

    fn supports_add_constraint(&self) -> bool {
        true
    }

    fn supports_comments(&self) -> bool {
        true
    }

    fn supports_column_position(&self) -> bool {
        true
    }

    fn supports_fulltext(&self) -> bool {
        true
    }

    fn index_style(&self) -> IndexStyle {
        IndexStyle::Inline
    }

    fn combines_alter_clauses(&self) -> bool {
        true
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn collation(&self, column: &Column) -> Option<&'static str> {
        let lower = column.sql_type.to_ascii_lowercase();
        (lower.contains("char") || lower.contains("text")).then_some(COLLATION)
    }

    fn effective_default<'a>(&self, column: &'a Column) -> &'a str {
        &column.default
    }

    fn normalize_live_type(&self, sql_type: &str) -> String {
        let spaced = sql_type.trim().replace(" (", "(");
        DISPLAY_WIDTH.replace_all(&spaced, "$1").into_owned()
    }

    fn normalize_live_default(&self, live: &LiveColumn) -> String {
        let raw = live.default.as_deref().unwrap_or("").trim();
        if raw.eq_ignore_ascii_case("NULL") {
            return String::new();
        }
        if !CURRENT_TIMESTAMP_CALL.is_match(raw) {
            return raw.to_string();
        }
        if live
            .extra
            .to_ascii_lowercase()
            .contains("on update current_timestamp")
        {
            return "CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP".to_string();
        }
        "CURRENT_TIMESTAMP".to_string()
    }

    fn table_options(&self, table: &Table) -> String {
        format!(
            " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE={} COMMENT={}",
            COLLATION,
            self.quote_literal(&table.comment)
        )
    }

    fn alter_clause(&self, action: &Action) -> Option<String> {
        let clause = match action {
            Action::CreateTable(_) => return None,
            Action::DropIndex { name } => format!("DROP KEY {}", self.quote_identifier(name)),
            Action::DropPrimaryKey => "DROP PRIMARY KEY".to_string(),
            Action::AddColumn(column) => {
                format!("ADD COLUMN {}", self.add_column_definition(column))
            }
            Action::ChangeColumn { column, position } => {
                let mut clause = format!(
                    "CHANGE {} {}",
                    self.quote_identifier(&column.name),
                    self.column_definition(column)
                );
                match position {
                    Some(Position::First) => clause.push_str(" FIRST"),
                    Some(Position::After(prev)) => {
                        clause.push_str(" AFTER ");
                        clause.push_str(&self.quote_identifier(prev));
                    }
                    None => {}
                }
                clause
            }
            Action::DropColumn { name } => format!("DROP COLUMN {}", self.quote_identifier(name)),
            Action::AddPrimaryKey { columns } => {
                format!("ADD PRIMARY KEY ({})", self.quote_list(columns))
            }
            Action::AddIndex(index) => format!("ADD {}", self.inline_index_clause(index)),
            Action::SetComment(comment) => format!("COMMENT {}", self.quote_literal(comment)),
        };
        Some(clause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Plan;
    use crate::schema::IndexDef;
    use crate::schema::IndexKind;

    fn users() -> Table {
        Table::new("users")
            .comment("registered users")
            .column(Column::new("id", "bigint unsigned").auto_increment())
            .column(Column::new("name", "varchar(30)").not_null().comment("login"))
            .column(Column::new("shop", "int").not_null().unique_in("2"))
            .column(Column::new("code", "varchar(20)").not_null().unique_in("2"))
            .column(
                Column::new("created", "datetime")
                    .not_null()
                    .default_value("CURRENT_TIMESTAMP"),
            )
    }

    #[test]
    fn test_column_definition() {
        let dialect = MySqlDialect::new();
        let table = users();

        assert_eq!(
            dialect.column_definition(table.get_column("id").unwrap()),
            "`id` bigint unsigned AUTO_INCREMENT NOT NULL"
        );
        assert_eq!(
            dialect.column_definition(table.get_column("name").unwrap()),
            "`name` varchar(30) COLLATE utf8mb4_general_ci NOT NULL COMMENT 'login'"
        );
        assert_eq!(
            dialect.column_definition(table.get_column("created").unwrap()),
            "`created` datetime NOT NULL DEFAULT CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_literal_default_is_quoted() {
        let col = Column::new("status", "varchar(10)").default_value("o'k");
        assert_eq!(
            MySqlDialect::new().column_definition(&col),
            "`status` varchar(10) COLLATE utf8mb4_general_ci NULL DEFAULT 'o''k'"
        );
    }

    #[test]
    fn test_create_table() {
        let statements = MySqlDialect::new().create_table_sql(&users());

        assert_eq!(statements.len(), 1);
        let sql = &statements[0];
        assert!(sql.starts_with("CREATE TABLE `users` (\n  `id` bigint unsigned"));
        assert!(sql.contains("PRIMARY KEY (`id`)"));
        assert!(sql.contains("UNIQUE KEY `uk_users_2` (`shop`, `code`) COMMENT ''"));
        assert!(sql.ends_with(
            ") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_general_ci COMMENT='registered users'"
        ));
    }

    #[test]
    fn test_combined_alter() {
        let plan = Plan {
            table: "users".to_string(),
            actions: vec![
                Action::DropIndex {
                    name: "ik_users_old".to_string(),
                },
                Action::ChangeColumn {
                    column: Column::new("age", "int").not_null(),
                    position: Some(Position::After("name".to_string())),
                },
                Action::AddIndex(IndexDef {
                    name: "ik_users_age".to_string(),
                    kind: IndexKind::Plain,
                    columns: vec!["age".to_string()],
                    comment: String::new(),
                }),
                Action::SetComment("people".to_string()),
            ],
        };

        let statements = MySqlDialect::new().plan_sql(&plan);
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE `users`\n  DROP KEY `ik_users_old`,\n  CHANGE `age` `age` int NOT NULL AFTER `name`,\n  ADD KEY `ik_users_age` (`age`) COMMENT '',\n  COMMENT 'people'"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_change_first() {
        let clause = MySqlDialect::new()
            .alter_clause(&Action::ChangeColumn {
                column: Column::new("id", "int").not_null(),
                position: Some(Position::First),
            })
            .unwrap();
        assert_eq!(clause, "CHANGE `id` `id` int NOT NULL FIRST");
    }

    #[test]
    fn test_live_on_update_default_is_folded() {
        let live = LiveColumn {
            name: "updated".to_string(),
            sql_type: "datetime".to_string(),
            nullable: false,
            default: Some("CURRENT_TIMESTAMP".to_string()),
            extra: "DEFAULT_GENERATED on update CURRENT_TIMESTAMP".to_string(),
            comment: String::new(),
            after: "created".to_string(),
        };
        assert_eq!(
            MySqlDialect::new().normalize_live_default(&live),
            "CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_display_width_is_dropped() {
        let dialect = MySqlDialect::new();
        assert_eq!(dialect.normalize_live_type("int(11)"), "int");
        assert_eq!(dialect.normalize_live_type("bigint(20) unsigned"), "bigint unsigned");
        assert_eq!(dialect.normalize_live_type("TINYINT(3) UNSIGNED"), "TINYINT UNSIGNED");
        assert_eq!(dialect.normalize_live_type("varchar(30)"), "varchar(30)");
        assert_eq!(dialect.normalize_live_type("decimal(10,2)"), "decimal(10,2)");
        assert_eq!(dialect.normalize_live_type("point(1)"), "point(1)");
    }

    #[test]
    fn test_timestamp_call_default_is_canonical() {
        let dialect = MySqlDialect::new();
        let mut live = LiveColumn {
            name: "at".to_string(),
            sql_type: "datetime".to_string(),
            nullable: false,
            default: Some("current_timestamp()".to_string()),
            extra: String::new(),
            comment: String::new(),
            after: String::new(),
        };
        assert_eq!(dialect.normalize_live_default(&live), "CURRENT_TIMESTAMP");

        live.default = Some("current_timestamp(3)".to_string());
        live.extra = "on update current_timestamp(3)".to_string();
        assert_eq!(
            dialect.normalize_live_default(&live),
            "CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP"
        );

        live.default = Some("current_timestamp_x".to_string());
        assert_eq!(dialect.normalize_live_default(&live), "current_timestamp_x");
    }
}
