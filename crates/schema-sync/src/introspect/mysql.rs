//! MySQL-like catalog reader.

use super::{LiveColumn, LiveTable};
use crate::connection::Connection;
use crate::error::Result;

const TABLE_INFO: &str = "SELECT TABLE_NAME AS name, TABLE_COMMENT AS comment \
     FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

pub(super) async fn introspect<C>(conn: &mut C, table: &str) -> Result<Option<LiveTable>>
where
    C: Connection + ?Sized,
{
    let Some(info) = conn.fetch_rows(TABLE_INFO, &[table]).await?.into_iter().next() else {
        return Ok(None);
    };

    let mut live = LiveTable::new(table);
    live.comment = info.get_or_empty("comment").to_string();

    let quoted = conn.quote(table);
    for row in conn
        .fetch_rows(&format!("SHOW FULL COLUMNS FROM {quoted}"), &[])
        .await?
    {
        live.columns.push(LiveColumn {
            name: row.get_or_empty("Field").to_string(),
            sql_type: row.get_or_empty("Type").to_string(),
            nullable: row.get_or_empty("Null").eq_ignore_ascii_case("YES"),
            default: row.get("Default").map(str::to_string),
            extra: row.get_or_empty("Extra").to_string(),
            comment: row.get_or_empty("Comment").to_string(),
            after: String::new(),
        });
    }
    live.link_positions();

    let mut members: Vec<(String, u32, String)> = conn
        .fetch_rows(&format!("SHOW INDEX FROM {quoted}"), &[])
        .await?
        .iter()
        .map(|row| {
            (
                row.get_or_empty("Key_name").to_string(),
                row.get_or_empty("Seq_in_index").parse().unwrap_or(0),
                row.get_or_empty("Column_name").to_string(),
            )
        })
        .collect();
    members.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    for (index, _, column) in members {
        live.push_index_member(&index, column);
    }

    Ok(Some(live))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Row;
    use crate::dialect::Dialect;
    use crate::introspect::PRIMARY_KEY_INDEX;
    use crate::testing::ScriptedConnection;

    fn column(field: &str, sql_type: &str, null: &str, default: Option<&str>, extra: &str) -> Row {
        let row = Row::new()
            .with("Field", field)
            .with("Type", sql_type)
            .with("Null", null);
        let row = match default {
            Some(value) => row.with("Default", value),
            None => row.with_null("Default"),
        };
        row.with("Extra", extra).with("Comment", "")
    }

    fn key(name: &str, seq: &str, column: &str) -> Row {
        Row::new()
            .with("Key_name", name)
            .with("Seq_in_index", seq)
            .with("Column_name", column)
    }

    #[tokio::test]
    async fn test_missing_table() {
        let mut conn = ScriptedConnection::new(Dialect::MySql);
        assert!(introspect(&mut conn, "ghost").await.unwrap().is_none());
        assert_eq!(conn.queries.len(), 1);
    }

    #[tokio::test]
    async fn test_reads_columns_and_indexes() {
        let mut conn = ScriptedConnection::new(Dialect::MySql)
            .respond(
                "SELECT TABLE_NAME",
                vec![Row::new().with("name", "users").with("comment", "people")],
            )
            .respond(
                "SHOW FULL COLUMNS FROM `users`",
                vec![
                    column("id", "bigint unsigned", "NO", None, "auto_increment"),
                    column("shop", "int", "NO", Some("0"), ""),
                    column("code", "varchar(20)", "YES", None, ""),
                    column(
                        "updated",
                        "datetime",
                        "NO",
                        Some("CURRENT_TIMESTAMP"),
                        "DEFAULT_GENERATED on update CURRENT_TIMESTAMP",
                    ),
                ],
            )
            .respond(
                "SHOW INDEX FROM `users`",
                vec![
                    key("uk_users_2", "2", "code"),
                    key("PRIMARY", "1", "id"),
                    key("uk_users_2", "1", "shop"),
                ],
            );

        let live = introspect(&mut conn, "users").await.unwrap().unwrap();

        assert_eq!(live.comment, "people");
        let after: Vec<&str> = live.columns.iter().map(|c| c.after.as_str()).collect();
        assert_eq!(after, vec!["", "id", "shop", "code"]);
        assert!(live.get_column("code").unwrap().nullable);
        assert_eq!(live.get_column("code").unwrap().default, None);
        assert_eq!(live.get_column("shop").unwrap().default.as_deref(), Some("0"));

        assert_eq!(live.indexes[PRIMARY_KEY_INDEX], vec!["id"]);
        assert_eq!(live.indexes["uk_users_2"], vec!["shop", "code"]);

        assert_eq!(conn.queries.len(), 3);
        assert!(conn.queries[0].contains("information_schema.TABLES"));
        assert_eq!(conn.queries[1], "SHOW FULL COLUMNS FROM `users`");
        assert_eq!(conn.queries[2], "SHOW INDEX FROM `users`");
    }
}
