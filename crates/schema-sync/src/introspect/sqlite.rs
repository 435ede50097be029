//! SQLite-like catalog reader.

use super::{LiveColumn, LiveTable, PRIMARY_KEY_INDEX};
use crate::connection::Connection;
use crate::error::Result;

const TABLE_EXISTS: &str = "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?";
const TABLE_INFO: &str =
    "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid";
const INDEX_LIST: &str = "SELECT name, origin FROM pragma_index_list(?)";
const INDEX_INFO: &str = "SELECT name FROM pragma_index_info(?) ORDER BY seqno";

pub(super) async fn introspect<C>(conn: &mut C, table: &str) -> Result<Option<LiveTable>>
where
    C: Connection + ?Sized,
{
    if conn.fetch_rows(TABLE_EXISTS, &[table]).await?.is_empty() {
        return Ok(None);
    }

    let mut live = LiveTable::new(table);
    let mut primary: Vec<(u32, String)> = Vec::new();

    for row in conn.fetch_rows(TABLE_INFO, &[table]).await? {
        let name = row.get_or_empty("name").to_string();
        let pk: u32 = row.get_or_empty("pk").parse().unwrap_or(0);
        if pk > 0 {
            primary.push((pk, name.clone()));
        }
        live.columns.push(LiveColumn {
            name,
            sql_type: row.get_or_empty("type").to_string(),
            nullable: !row.flag("notnull"),
            default: row.get("dflt_value").map(str::to_string),
            extra: String::new(),
            comment: String::new(),
            after: String::new(),
        });
    }

    primary.sort_by_key(|(seq, _)| *seq);
    for (_, column) in primary {
        live.push_index_member(PRIMARY_KEY_INDEX, column);
    }

    // Only explicitly created indexes; UNIQUE and PRIMARY KEY constraints
    // produce automatic ones.
    for index in conn.fetch_rows(INDEX_LIST, &[table]).await? {
        if index.get_or_empty("origin") != "c" {
            continue;
        }
        let name = index.get_or_empty("name").to_string();
        for member in conn.fetch_rows(INDEX_INFO, &[name.as_str()]).await? {
            live.push_index_member(&name, member.get_or_empty("name"));
        }
    }

    Ok(Some(live))
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::connection::SqliteConnection;

    async fn connection() -> SqliteConnection {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteConnection::new(pool)
    }

    #[tokio::test]
    async fn test_missing_table() {
        let mut conn = connection().await;
        assert!(introspect(&mut conn, "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_columns_and_indexes() {
        let mut conn = connection().await;
        conn.execute(
            "CREATE TABLE \"items\" (\"shop\" int NOT NULL, \"sku\" varchar(20) NOT NULL DEFAULT 'none', \"note\" text NULL, \"code\" int UNIQUE, PRIMARY KEY (\"sku\", \"shop\"))",
        )
        .await
        .unwrap();
        conn.execute("CREATE INDEX \"ik_items_pair\" ON \"items\" (\"note\", \"shop\")")
            .await
            .unwrap();

        let live = introspect(&mut conn, "items").await.unwrap().unwrap();

        let names: Vec<&str> = live.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["shop", "sku", "note", "code"]);

        let sku = live.get_column("sku").unwrap();
        assert_eq!(sku.sql_type, "varchar(20)");
        assert!(!sku.nullable);
        assert_eq!(sku.default.as_deref(), Some("'none'"));
        assert!(live.get_column("note").unwrap().nullable);

        assert_eq!(live.primary_key(), ["sku", "shop"]);
        assert_eq!(live.index("ik_items_pair").unwrap(), ["note", "shop"]);
        // Automatic indexes for UNIQUE and PRIMARY KEY constraints are hidden.
        assert_eq!(live.indexes.len(), 2);
    }
}
