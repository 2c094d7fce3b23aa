//! Operations backing the interactive review of a session table.
//!
//! All of them take a snapshot of the table and return new values, persisting the result is
//! up to the caller.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::expand::{expand_window, TimeWindow};
use crate::topology::PathResolver;
use crate::tree::{build_tree, TopologyTree};
use crate::types::{
    time_point_to_utc_string, Alarm, AlarmTable, Classification, GroupId, COLUMN_GROUP_ID_EDITED,
    COLUMN_INDEX, COLUMN_RCA_RESULT_EDITED,
};

/// Groups computed for alarms whose `First` is inside the window.
pub fn interval(table: &AlarmTable, window: TimeWindow) -> Vec<GroupId> {
    let groups: BTreeSet<&GroupId> = table
        .alarms
        .iter()
        .filter(|alarm| window.contains(alarm.first) && !alarm.group_id.is_empty())
        .map(|alarm| &alarm.group_id)
        .collect();
    groups.into_iter().cloned().collect()
}

/// Topology of one group, for display.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Analysis {
    pub topo: TopologyTree,
    pub table: Vec<Alarm>,
    /// Sources of the group's alarms, highlighted in the tree.
    pub orange: Vec<String>,
}

/// Current members of the group, a group without members doesn't exist.
fn members_of<'a>(table: &'a AlarmTable, group: &str) -> Result<Vec<&'a Alarm>> {
    let members = table.group_members(group);
    if members.is_empty() {
        return Err(Error::GroupNotFound(group.to_string()));
    }
    Ok(members)
}

fn distinct_sources<'a>(alarms: impl IntoIterator<Item = &'a Alarm>) -> Vec<String> {
    let sources: BTreeSet<&str> = alarms
        .into_iter()
        .map(|alarm| alarm.alarm_source.as_str())
        .collect();
    sources.into_iter().map(str::to_string).collect()
}

pub fn analyze(table: &AlarmTable, group: &str, resolver: &PathResolver) -> Result<Analysis> {
    let members = members_of(table, group)?;
    let paths = resolver.resolve_all(members.iter().map(|alarm| alarm.alarm_source.as_str()));

    Ok(Analysis {
        topo: build_tree(&paths),
        orange: distinct_sources(members.iter().copied()),
        table: members.into_iter().cloned().collect(),
    })
}

/// Result of widening a group's time window.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Expansion {
    pub topo: TopologyTree,
    /// Unassigned alarms inside the widened window.
    pub table: Vec<Alarm>,
    /// Sources of included alarms that were computed into some other group.
    pub yellow: Vec<String>,
    /// Every alarm whose topology intersects the group.
    pub included: Vec<Alarm>,
    pub window: TimeWindow,
}

pub fn expand(
    table: &AlarmTable,
    group: &str,
    margin_minutes: u32,
    resolver: &PathResolver,
) -> Result<Expansion> {
    let members = members_of(table, group)?;
    let paths = resolver.resolve_all(members.iter().map(|alarm| alarm.alarm_source.as_str()));

    let expansion = expand_window(
        group,
        &members,
        &paths,
        margin_minutes,
        &table.alarms,
        resolver,
    )?;

    tracing::info!(
        group,
        margin_minutes,
        window_start = %time_point_to_utc_string(expansion.window.start),
        window_end = %time_point_to_utc_string(expansion.window.end),
        included = expansion.included.len(),
        "expanded group"
    );

    Ok(Expansion {
        topo: build_tree(&expansion.paths),
        yellow: distinct_sources(
            expansion
                .included
                .iter()
                .filter(|alarm| alarm.group_id != group),
        ),
        table: expansion.candidates,
        included: expansion.included,
        window: expansion.window,
    })
}

/// Edits the operator made to one row.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct RowEdit {
    pub index: u64,
    /// Pairs of (column, new value).
    pub changes: Vec<(String, String)>,
}

/// Edits as sent by the review frontend: parallel lists of rows, columns and values.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct ConfirmRequest {
    pub row: Vec<u64>,
    pub columns: Vec<Vec<String>>,
    pub values: Vec<Vec<String>>,
}

impl ConfirmRequest {
    pub fn into_edits(self) -> Result<Vec<RowEdit>> {
        if self.row.len() != self.columns.len() || self.row.len() != self.values.len() {
            return Err(Error::schema(
                "row",
                "`row`, `columns` and `values` must have the same length",
            ));
        }
        self.row
            .into_iter()
            .zip(self.columns)
            .zip(self.values)
            .map(|((index, columns), values)| {
                if columns.len() != values.len() {
                    return Err(Error::schema(
                        "columns",
                        format!(
                            "index {index}: {} columns but {} values",
                            columns.len(),
                            values.len()
                        ),
                    ));
                }
                Ok(RowEdit {
                    index,
                    changes: columns.into_iter().zip(values).collect(),
                })
            })
            .collect()
    }
}

/// Apply operator edits and return the new table.
///
/// Only `RcaResult_Edited` and `GroupId_Edited` can be edited, the new group must be one of
/// the computed groups of the batch. After editing, a row is confirmed exactly when it is
/// assigned to a group. Either every edit is applied or none.
pub fn confirm(table: &AlarmTable, edits: &[RowEdit]) -> Result<AlarmTable> {
    let known_groups = table.group_ids();
    let mut edited = table.clone();

    for edit in edits {
        let Some(alarm) = edited.find_by_index_mut(edit.index) else {
            return Err(Error::schema(
                COLUMN_INDEX,
                format!("no alarm with index {}", edit.index),
            ));
        };

        for (column, value) in &edit.changes {
            match column.as_str() {
                COLUMN_RCA_RESULT_EDITED => {
                    alarm.rca_result_edited = Classification::parse(value).map_err(|reason| {
                        Error::schema(
                            COLUMN_RCA_RESULT_EDITED,
                            format!("index {}: {reason}", edit.index),
                        )
                    })?;
                }
                COLUMN_GROUP_ID_EDITED => {
                    let value = value.trim();
                    if value.is_empty() {
                        alarm.group_id_edited = None;
                    } else if known_groups.contains(value) {
                        alarm.group_id_edited = Some(value.to_string());
                    } else {
                        return Err(Error::GroupNotFound(value.to_string()));
                    }
                }
                other => {
                    return Err(Error::schema(other, "column can't be edited"));
                }
            }
        }

        alarm.confirmed = alarm.group_id_edited.is_some();
    }

    tracing::info!(rows = edits.len(), "applied review edits");
    Ok(edited)
}
