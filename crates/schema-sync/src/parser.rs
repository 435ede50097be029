//! Parser for the line-oriented table description language.
//!
//! ```text
//! // Accounts
//! user            // registered users
//! id      ubi AI
//! name    v30 U
//! shop    i U2
//! code    v20 U2
//! created dt ct
//! ```
//!
//! A blank line carrying a `//` comment opens a new group, a single token
//! declares a table and two or more tokens declare a column of the current
//! table. Column tags are listed in [`type_for_tag`] and [`apply_tag`].

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, SyncError};
use crate::schema::{Column, ErGroup, IndexRole, Table, AUTO_INCREMENT, DEFAULT_GROUP};

static TOKEN_SPLITTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid token splitter"));

static SIZED_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z]+)([0-9]+)$").expect("valid sized tag pattern"));

/// Maps a short type tag to its SQL type name.
#[must_use]
pub fn type_for_tag(tag: &str) -> Option<&'static str> {
    let sql_type = match tag {
        "c" => "char",
        "v" => "varchar",
        "dt" => "datetime",
        "d" => "date",
        "tm" => "time",
        "i" => "int",
        "ui" => "int unsigned",
        "ti" => "tinyint",
        "uti" | "b" => "tinyint unsigned",
        "bi" => "bigint",
        "ubi" => "bigint unsigned",
        "f" => "float",
        "uf" => "float unsigned",
        "ff" => "double",
        "uff" => "double unsigned",
        "si" => "smallint",
        "usi" => "smallint unsigned",
        "mi" => "mediumint",
        "umi" => "mediumint unsigned",
        "t" => "text",
        "bb" => "blob",
        _ => return None,
    };
    Some(sql_type)
}

/// Parses a description document into groups of tables.
///
/// Fails when the document never declares a table.
pub fn parse_description(text: &str) -> Result<Vec<ErGroup>> {
    let mut groups: Vec<ErGroup> = Vec::new();
    let mut has_table = false;

    for raw in text.lines() {
        let (line, comment) = split_comment(raw);

        if line.is_empty() {
            if !comment.is_empty() {
                groups.push(ErGroup::new(comment));
            }
            continue;
        }

        let tokens: Vec<&str> = TOKEN_SPLITTER.split(line).collect();
        if tokens.len() == 1 {
            if groups.is_empty() {
                groups.push(ErGroup::new(DEFAULT_GROUP));
            }
            if let Some(group) = groups.last_mut() {
                group
                    .tables
                    .push(Table::new(tokens[0]).comment(comment));
                has_table = true;
            }
            continue;
        }

        // Column lines before the first table are ignored.
        let Some(table) = groups.last_mut().and_then(|g| g.tables.last_mut()) else {
            continue;
        };
        table.columns.push(parse_column(&tokens, comment));
    }

    if !has_table {
        return Err(SyncError::Parse("no table declared".to_string()));
    }
    Ok(groups)
}

/// Splits a line into its content and trailing `//` comment, both trimmed.
fn split_comment(raw: &str) -> (&str, &str) {
    let line = raw.trim();
    match line.split_once("//") {
        Some((content, comment)) => (content.trim(), comment.trim()),
        None => (line, ""),
    }
}

/// Builds a column from its name token and modifier tags.
///
/// Columns are NOT NULL unless tagged `n`.
#[must_use]
pub fn parse_column(tokens: &[&str], comment: &str) -> Column {
    let mut column = Column::new(tokens[0], "").not_null().comment(comment);
    for token in &tokens[1..] {
        apply_tag(&mut column, token);
    }
    column
}

/// Applies one modifier tag to `column`.
///
/// A trailing number sets the length of a type tag (`v30`) or the group
/// label of an index tag (`U2`). Unknown tags are taken as the literal type.
pub fn apply_tag(column: &mut Column, token: &str) {
    let (tag, size) = match SIZED_TAG.captures(token) {
        Some(caps) => (
            caps.get(1).map_or(token, |m| m.as_str()),
            caps.get(2)
                .map(|m| m.as_str())
                .filter(|digits| digits.parse::<u32>().map_or(true, |n| n > 0)),
        ),
        None => (token, None),
    };

    match tag {
        "PK" => {
            column.index = IndexRole::PrimaryKey;
            column.nullable = false;
        }
        "AI" => {
            column.extra = AUTO_INCREMENT.to_string();
            column.index = IndexRole::PrimaryKey;
            column.nullable = false;
        }
        "U" => set_index(column, IndexRole::Unique, size),
        "I" => set_index(column, IndexRole::Index, size),
        "TI" => set_index(column, IndexRole::FullText, size),
        "ct" => column.default = "CURRENT_TIMESTAMP".to_string(),
        "ctu" => column.default = "CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP".to_string(),
        "n" => column.nullable = true,
        "nn" => column.nullable = false,
        _ => {
            column.sql_type = type_for_tag(tag).unwrap_or(tag).to_string();
            if let Some(size) = size {
                column.sql_type.push_str(&format!("({size})"));
            }
        }
    }
}

fn set_index(column: &mut Column, role: IndexRole, group: Option<&str>) {
    column.index = role;
    column.index_group = group.map(str::to_string);
}
