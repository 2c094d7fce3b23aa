//! Growing a group with alarms that happened around the same time on related topology.

use std::collections::{BTreeSet, HashSet};

use crate::error::{Error, Result};
use crate::topology::{node_set, PathResolver, TopologyPath};
use crate::types::{time_span, Alarm, TimePoint, SECONDS_PER_MINUTE};

/// Closed time interval.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct TimeWindow {
    pub start: TimePoint,
    pub end: TimePoint,
}

impl TimeWindow {
    pub fn contains(&self, time: TimePoint) -> bool {
        self.start <= time && time <= self.end
    }

    /// Widen the window by `margin_minutes` on both sides.
    pub fn widened(&self, margin_minutes: u32) -> TimeWindow {
        let margin = margin_minutes as f64 * SECONDS_PER_MINUTE;
        TimeWindow {
            start: self.start - margin,
            end: self.end + margin,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowExpansion {
    /// The widened window that candidates were taken from.
    pub window: TimeWindow,
    /// Unassigned alarms inside the window, whether they were included or not.
    pub candidates: Vec<Alarm>,
    /// Candidates whose path touches the group's topology.
    pub included: Vec<Alarm>,
    /// Group paths together with the paths of the included candidates.
    pub paths: BTreeSet<TopologyPath>,
}

impl WindowExpansion {
    pub fn is_unchanged(&self) -> bool {
        self.included.is_empty()
    }
}

/// Expand a group over a time window widened by `margin_minutes`.
///
/// Candidates are alarms from the pool with `First` inside the window that aren't assigned
/// to any group yet (no `GroupId_Edited`). A candidate is included when its path shares a
/// node with the group's current paths. Only the group's own nodes are tested, nodes added
/// by other candidates in the same call don't pull in further candidates.
///
/// When nothing intersects the returned paths are `current_paths` and `included` is empty.
pub fn expand_window(
    group: &str,
    members: &[&Alarm],
    current_paths: &BTreeSet<TopologyPath>,
    margin_minutes: u32,
    candidate_pool: &[Alarm],
    resolver: &PathResolver,
) -> Result<WindowExpansion> {
    let Some((first, last)) = time_span(members.iter().copied()) else {
        return Err(Error::GroupNotFound(group.to_string()));
    };
    let window = TimeWindow {
        start: first,
        end: last,
    }
    .widened(margin_minutes);

    let member_indices: HashSet<u64> = members.iter().map(|alarm| alarm.index).collect();
    let group_nodes = node_set(current_paths);

    let mut paths = current_paths.clone();
    let mut candidates = Vec::new();
    let mut included = Vec::new();

    for alarm in candidate_pool {
        if !window.contains(alarm.first)
            || alarm.group_id_edited.is_some()
            || member_indices.contains(&alarm.index)
        {
            continue;
        }
        candidates.push(alarm.clone());

        let path = resolver.resolve(&alarm.alarm_source);
        if path.intersects(&group_nodes) {
            paths.insert(path);
            included.push(alarm.clone());
        }
    }

    tracing::debug!(
        group,
        margin_minutes,
        candidates = candidates.len(),
        included = included.len(),
        "expanded group window"
    );

    Ok(WindowExpansion {
        window,
        candidates,
        included,
        paths,
    })
}
