//! Diff and plan generation.
//!
//! The planner compares a desired [`Table`] with its live counterpart and
//! produces the ordered list of [`Action`]s that makes them match. It never
//! touches the database; rendering is left to the dialect adapter.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dialect::{Dialect, SchemaDialect};
use crate::introspect::{LiveColumn, LiveTable};
use crate::schema::{Column, IndexDef, Table};

/// Explicit placement of a changed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// First column of the table.
    First,
    /// Immediately after the named column.
    After(String),
}

/// One atomic schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Create the table with its keys and indexes.
    CreateTable(Table),
    /// Drop a secondary index.
    DropIndex {
        /// Index name.
        name: String,
    },
    /// Drop the primary key.
    DropPrimaryKey,
    /// Add a column at the end of the table.
    AddColumn(Column),
    /// Redeclare an existing column.
    ChangeColumn {
        /// Full new definition.
        column: Column,
        /// Explicit placement, for dialects tracking column order.
        position: Option<Position>,
    },
    /// Drop a column.
    DropColumn {
        /// Column name.
        name: String,
    },
    /// Add the primary key.
    AddPrimaryKey {
        /// Member columns in declaration order.
        columns: Vec<String>,
    },
    /// Add a secondary index.
    AddIndex(IndexDef),
    /// Set the table comment.
    SetComment(String),
}

/// Ordered actions reconciling one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Table name.
    pub table: String,
    /// Actions in execution order.
    pub actions: Vec<Action>,
}

impl Plan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            actions: Vec::new(),
        }
    }

    /// Returns whether the live table already matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the table to create when this is a new-table plan.
    #[must_use]
    pub fn created_table(&self) -> Option<&Table> {
        match self.actions.first() {
            Some(Action::CreateTable(table)) => Some(table),
            _ => None,
        }
    }

    /// Returns whether this plan creates the table.
    #[must_use]
    pub fn is_create(&self) -> bool {
        self.created_table().is_some()
    }

    /// Renders the statements to execute for `dialect`.
    #[must_use]
    pub fn to_sql(&self, dialect: Dialect) -> Vec<String> {
        dialect.adapter().plan_sql(self)
    }
}

/// Options for the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOptions {
    /// Drop live columns absent from the desired table.
    pub drop_columns: bool,
    /// Drop live indexes absent from the desired table.
    pub drop_indexes: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            drop_columns: true,
            drop_indexes: true,
        }
    }
}

impl PlanOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps live columns that are no longer described.
    #[must_use]
    pub fn keep_columns(mut self) -> Self {
        self.drop_columns = false;
        self
    }

    /// Keeps live indexes that are no longer described.
    #[must_use]
    pub fn keep_indexes(mut self) -> Self {
        self.drop_indexes = false;
        self
    }
}

/// Computes reconciliation plans for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct Planner {
    dialect: Dialect,
    options: PlanOptions,
}

impl Planner {
    /// Creates a planner with default options.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self::with_options(dialect, PlanOptions::default())
    }

    /// Creates a planner with custom options.
    #[must_use]
    pub fn with_options(dialect: Dialect, options: PlanOptions) -> Self {
        Self { dialect, options }
    }

    /// Returns the target dialect.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Compares `desired` with `live` and returns the actions turning one
    /// into the other. A missing live table yields a single create action.
    #[must_use]
    pub fn plan(&self, desired: &Table, live: Option<&LiveTable>) -> Plan {
        let mut plan = Plan::new(&desired.name);
        let Some(live) = live else {
            plan.actions.push(Action::CreateTable(desired.clone()));
            return plan;
        };

        let adapter = self.dialect.adapter();
        let actions = &mut plan.actions;

        let desired_indexes: Vec<IndexDef> = desired
            .indexes()
            .into_iter()
            .filter(|index| {
                let supported = adapter.supports_index(index.kind);
                if !supported {
                    debug!(table = %desired.name, index = %index.name, "Skipping unsupported index");
                }
                supported
            })
            .collect();
        let desired_by_name: HashMap<String, &IndexDef> = desired_indexes
            .iter()
            .map(|i| (i.name.to_ascii_lowercase(), i))
            .collect();

        // Orphaned or changed indexes go first so that dropped columns
        // are no longer referenced.
        for (name, members) in live.secondary_indexes() {
            match desired_by_name.get(&name.to_ascii_lowercase()) {
                Some(index) if same_members(&index.columns, members) => {}
                Some(_) => actions.push(Action::DropIndex { name: name.clone() }),
                None if self.options.drop_indexes => {
                    actions.push(Action::DropIndex { name: name.clone() });
                }
                None => debug!(table = %desired.name, index = %name, "Keeping undescribed index"),
            }
        }

        let desired_pk: Vec<String> = desired
            .primary_key()
            .into_iter()
            .map(str::to_string)
            .collect();
        let live_pk = live.primary_key();
        let pk_changed = !same_member_set(&desired_pk, live_pk);
        let rebuild_pk = pk_changed && adapter.supports_add_constraint();
        if pk_changed && !rebuild_pk {
            warn!(
                table = %desired.name,
                dialect = %self.dialect,
                "Primary key differs but cannot be changed after creation"
            );
        }
        if rebuild_pk && !live_pk.is_empty() {
            actions.push(Action::DropPrimaryKey);
        }

        let live_columns: HashMap<String, &LiveColumn> = live
            .columns
            .iter()
            .map(|c| (c.name.to_ascii_lowercase(), c))
            .collect();

        let mut previous: Option<&str> = None;
        for column in &desired.columns {
            match live_columns.get(&column.name.to_ascii_lowercase()) {
                None => actions.push(Action::AddColumn(column.clone())),
                Some(live_column) => {
                    let drift = column_drift(adapter, column, live_column, previous);
                    if !drift.is_empty() {
                        if adapter.supports_alter_column() {
                            actions.push(Action::ChangeColumn {
                                column: column.clone(),
                                position: drift.position,
                            });
                        } else {
                            debug!(
                                table = %desired.name,
                                column = %column.name,
                                dialect = %self.dialect,
                                "Tolerating column drift"
                            );
                        }
                    }
                }
            }
            previous = Some(&column.name);
        }

        let described: HashSet<String> = desired
            .columns
            .iter()
            .map(|c| c.name.to_ascii_lowercase())
            .collect();
        for live_column in &live.columns {
            if described.contains(&live_column.name.to_ascii_lowercase()) {
                continue;
            }
            if !self.options.drop_columns {
                debug!(table = %desired.name, column = %live_column.name, "Keeping undescribed column");
            } else if adapter.supports_drop_column() {
                actions.push(Action::DropColumn {
                    name: live_column.name.clone(),
                });
            } else {
                warn!(
                    table = %desired.name,
                    column = %live_column.name,
                    dialect = %self.dialect,
                    "Cannot drop column"
                );
            }
        }

        if rebuild_pk && !desired_pk.is_empty() {
            actions.push(Action::AddPrimaryKey {
                columns: desired_pk,
            });
        }

        for index in desired_indexes {
            let unchanged = live
                .index(&index.name)
                .is_some_and(|members| same_members(&index.columns, members));
            if !unchanged {
                actions.push(Action::AddIndex(index));
            }
        }

        if adapter.supports_comments() && desired.comment != live.comment {
            actions.push(Action::SetComment(desired.comment.clone()));
        }

        if !plan.is_empty() {
            debug!(table = %plan.table, actions = plan.actions.len(), "Computed plan");
        }
        plan
    }
}

/// What differs between a desired column and its live counterpart.
#[derive(Debug, Default)]
struct Drift {
    attributes: bool,
    position: Option<Position>,
}

impl Drift {
    fn is_empty(&self) -> bool {
        !self.attributes && self.position.is_none()
    }
}

fn column_drift(
    adapter: &dyn SchemaDialect,
    desired: &Column,
    live: &LiveColumn,
    previous: Option<&str>,
) -> Drift {
    let type_differs = !adapter
        .normalize_live_type(&desired.sql_type)
        .eq_ignore_ascii_case(&adapter.normalize_live_type(&live.sql_type));
    let default_differs = !adapter
        .effective_default(desired)
        .eq_ignore_ascii_case(&adapter.normalize_live_default(live));
    let null_differs = desired.nullable != live.nullable;
    let comment_differs =
        adapter.supports_comments() && !desired.comment.eq_ignore_ascii_case(&live.comment);

    let position = if adapter.supports_column_position()
        && !live.after.eq_ignore_ascii_case(previous.unwrap_or(""))
    {
        Some(match previous {
            None => Position::First,
            Some(prev) => Position::After(prev.to_string()),
        })
    } else {
        None
    };

    Drift {
        attributes: type_differs || default_differs || null_differs || comment_differs,
        position,
    }
}

/// Compares ordered member lists case-insensitively.
fn same_members(desired: &[String], live: &[String]) -> bool {
    desired.len() == live.len()
        && desired
            .iter()
            .zip(live)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
}

/// Compares member lists as case-insensitive sets.
fn same_member_set(desired: &[String], live: &[String]) -> bool {
    let lowered = |members: &[String]| -> BTreeSet<String> {
        members.iter().map(|m| m.to_ascii_lowercase()).collect()
    };
    lowered(desired) == lowered(live)
}
