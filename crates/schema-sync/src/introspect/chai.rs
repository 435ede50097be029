//! Embedded-simplified catalog reader.
//!
//! The engine only exposes its catalog as stored DDL text in
//! `__chai_catalog`, so columns and indexes are recovered by parsing the
//! `CREATE TABLE` and `CREATE INDEX` statements.

use std::sync::LazyLock;

use regex::Regex;

use super::{LiveColumn, LiveTable, PRIMARY_KEY_INDEX};
use crate::connection::Connection;
use crate::error::Result;

const TABLE_SQL: &str =
    "SELECT name, sql FROM __chai_catalog WHERE type = 'table' AND name = ?";
const INDEX_SQL: &str = "SELECT name, sql FROM __chai_catalog WHERE type = 'index'";

static TABLE_DDL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?\S+?\s*\((.*)\)\s*;?\s*$")
        .expect("valid table DDL pattern")
});

static INDEX_DDL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*CREATE\s+(?:UNIQUE\s+)?INDEX\s+(?:IF\s+NOT\s+EXISTS\s+)?\S+\s+ON\s+(\S+?)\s*\((.*)\)\s*;?\s*$",
    )
    .expect("valid index DDL pattern")
});

static COLUMN_CONSTRAINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s(NOT\s+NULL|NULL|DEFAULT|PRIMARY\s+KEY|UNIQUE|CHECK|REFERENCES|COLLATE|CONSTRAINT)\b")
        .expect("valid column constraint pattern")
});

static NOT_NULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bNOT\s+NULL\b").expect("valid NOT NULL pattern"));

static PRIMARY_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPRIMARY\s+KEY\b").expect("valid PRIMARY KEY pattern"));

static DEFAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bDEFAULT\s+('(?:[^']|'')*'|\([^)]*\)|[^\s,]+)").expect("valid DEFAULT pattern")
});

pub(super) async fn introspect<C>(conn: &mut C, table: &str) -> Result<Option<LiveTable>>
where
    C: Connection + ?Sized,
{
    let Some(row) = conn.fetch_rows(TABLE_SQL, &[table]).await?.into_iter().next() else {
        return Ok(None);
    };

    let mut live = LiveTable::new(table);
    parse_table_ddl(&mut live, row.get_or_empty("sql"));

    for index in conn.fetch_rows(INDEX_SQL, &[]).await? {
        if let Some((owner, members)) = parse_index_ddl(index.get_or_empty("sql")) {
            if owner.eq_ignore_ascii_case(table) {
                let name = index.get_or_empty("name");
                for member in members {
                    live.push_index_member(name, member);
                }
            }
        }
    }

    Ok(Some(live))
}

/// Fills columns and the primary key of `live` from a stored CREATE TABLE.
pub(crate) fn parse_table_ddl(live: &mut LiveTable, ddl: &str) {
    let Some(body) = TABLE_DDL.captures(ddl).and_then(|c| c.get(1)) else {
        return;
    };

    for part in split_top_level(body.as_str()) {
        let upper = part.to_ascii_uppercase();
        if upper.starts_with("PRIMARY KEY")
            || (upper.starts_with("CONSTRAINT") && PRIMARY_KEY.is_match(part))
        {
            for member in member_list(part) {
                live.push_index_member(PRIMARY_KEY_INDEX, member);
            }
            continue;
        }
        if ["CONSTRAINT", "UNIQUE", "CHECK", "FOREIGN"]
            .iter()
            .any(|k| upper.starts_with(k))
        {
            continue;
        }

        let (name, rest) = match part.find(char::is_whitespace) {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        let name = unquote(name);
        let sql_type = match COLUMN_CONSTRAINT.find(rest) {
            Some(m) => &rest[..m.start()],
            None => rest,
        };
        if PRIMARY_KEY.is_match(rest) {
            live.push_index_member(PRIMARY_KEY_INDEX, name.clone());
        }
        live.columns.push(LiveColumn {
            name,
            sql_type: sql_type.trim().to_string(),
            nullable: !NOT_NULL.is_match(rest),
            default: DEFAULT
                .captures(rest)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string()),
            extra: String::new(),
            comment: String::new(),
            after: String::new(),
        });
    }
}

/// Returns the owning table and ordered members of a stored CREATE INDEX.
pub(crate) fn parse_index_ddl(ddl: &str) -> Option<(String, Vec<String>)> {
    let caps = INDEX_DDL.captures(ddl)?;
    let owner = unquote(caps.get(1)?.as_str());
    let members = split_top_level(caps.get(2)?.as_str())
        .into_iter()
        .filter_map(|m| m.split_whitespace().next().map(unquote))
        .collect();
    Some((owner, members))
}

/// Splits on commas outside parentheses and quotes.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in body.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(body[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Member names of the first parenthesized list in `clause`.
fn member_list(clause: &str) -> Vec<String> {
    let Some(open) = clause.find('(') else {
        return Vec::new();
    };
    let close = clause.rfind(')').unwrap_or(clause.len());
    if close <= open {
        return Vec::new();
    }
    split_top_level(&clause[open + 1..close])
        .into_iter()
        .filter_map(|m| m.split_whitespace().next().map(unquote))
        .collect()
}

fn unquote(ident: &str) -> String {
    ident
        .trim()
        .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Row;
    use crate::dialect::Dialect;
    use crate::testing::ScriptedConnection;

    #[test]
    fn test_parse_table_ddl() {
        let mut live = LiveTable::new("items");
        parse_table_ddl(
            &mut live,
            "CREATE TABLE items (id INTEGER NOT NULL, sku TEXT NOT NULL DEFAULT 'a,b', \
             price DOUBLE, label varchar(20) DEFAULT \"x\", CONSTRAINT items_pk PRIMARY KEY (id))",
        );

        let names: Vec<&str> = live.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "sku", "price", "label"]);

        let sku = live.get_column("sku").unwrap();
        assert_eq!(sku.sql_type, "TEXT");
        assert!(!sku.nullable);
        assert_eq!(sku.default.as_deref(), Some("'a,b'"));

        assert!(live.get_column("price").unwrap().nullable);
        assert_eq!(live.get_column("label").unwrap().sql_type, "varchar(20)");
        assert_eq!(live.primary_key(), ["id"]);
    }

    #[test]
    fn test_inline_primary_key() {
        let mut live = LiveTable::new("t");
        parse_table_ddl(&mut live, "CREATE TABLE \"t\" (\"id\" integer PRIMARY KEY, \"v\" int)");

        assert_eq!(live.primary_key(), ["id"]);
        assert_eq!(live.columns[0].sql_type, "integer");
    }

    #[test]
    fn test_parse_index_ddl() {
        let (owner, members) =
            parse_index_ddl("CREATE UNIQUE INDEX \"uk_items_2\" ON \"items\" (\"shop\", \"sku\" DESC)")
                .unwrap();

        assert_eq!(owner, "items");
        assert_eq!(members, vec!["shop", "sku"]);
        assert!(parse_index_ddl("CREATE TABLE x (a int)").is_none());
    }

    #[tokio::test]
    async fn test_introspect_from_catalog() {
        let mut conn = ScriptedConnection::new(Dialect::Chai)
            .respond(
                "SELECT name, sql FROM __chai_catalog WHERE type = 'table'",
                vec![Row::new()
                    .with("name", "items")
                    .with("sql", "CREATE TABLE items (id INTEGER NOT NULL, sku TEXT, PRIMARY KEY (id))")],
            )
            .respond(
                "SELECT name, sql FROM __chai_catalog WHERE type = 'index'",
                vec![
                    Row::new()
                        .with("name", "ik_items_sku")
                        .with("sql", "CREATE INDEX ik_items_sku ON items (sku)"),
                    Row::new()
                        .with("name", "ik_other_sku")
                        .with("sql", "CREATE INDEX ik_other_sku ON other (sku)"),
                ],
            );

        let live = introspect(&mut conn, "items").await.unwrap().unwrap();

        assert_eq!(live.columns.len(), 2);
        assert_eq!(live.primary_key(), ["id"]);
        assert_eq!(live.index("ik_items_sku").unwrap(), ["sku"]);
        assert!(live.index("ik_other_sku").is_none());
    }
}
