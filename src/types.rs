use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

/// Seconds since epoch
/// TODO: make nicer, f64 isn't great for this
pub type TimePoint = f64;

pub const SECONDS_PER_MINUTE: f64 = 60.0;

/// Identifier of a group of alarms. Ids are only unique within one batch.
pub type GroupId = String;

pub const COLUMN_INDEX: &str = "Index";
pub const COLUMN_ALARM_SOURCE: &str = "AlarmSource";
pub const COLUMN_FIRST: &str = "First";
pub const COLUMN_RCA_RESULT: &str = "RcaResult";
pub const COLUMN_RCA_RESULT_EDITED: &str = "RcaResult_Edited";
pub const COLUMN_GROUP_ID: &str = "GroupId";
pub const COLUMN_GROUP_ID_EDITED: &str = "GroupId_Edited";
pub const COLUMN_CONFIRMED: &str = "Confirmed";

/// Columns of the canonical alarm table, in the order they are written.
pub const CANONICAL_COLUMNS: [&str; 8] = [
    COLUMN_INDEX,
    COLUMN_ALARM_SOURCE,
    COLUMN_FIRST,
    COLUMN_RCA_RESULT,
    COLUMN_RCA_RESULT_EDITED,
    COLUMN_GROUP_ID,
    COLUMN_GROUP_ID_EDITED,
    COLUMN_CONFIRMED,
];

pub const CONFIRMED_FLAG: &str = "1";

pub fn time_point_from_unix_seconds(seconds: i64) -> TimePoint {
    seconds as f64
}

/// Layout of `First` in stored tables. Keeps fractional seconds, prints none for whole ones.
pub const STORED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// `None` when the time point is outside the range chrono can represent.
pub fn time_point_to_date_time(time: TimePoint) -> Option<chrono::DateTime<chrono::Utc>> {
    if !time.is_finite() {
        return None;
    }
    let seconds = time.floor();
    let nanos = (((time - seconds) * 1e9).round() as u32).min(999_999_999);
    if seconds < i64::MIN as f64 || seconds > i64::MAX as f64 {
        return None;
    }
    chrono::DateTime::from_timestamp(seconds as i64, nanos)
}

pub fn time_point_to_utc_string(time: TimePoint) -> String {
    format_time_point(time, "%Y-%m-%d %H:%M:%S%.3f")
}

/// Format a time point with a chrono format string, in UTC. Time points chrono can't
/// represent are written as plain unix seconds, which parse back unchanged.
pub fn format_time_point(time: TimePoint, format: &str) -> String {
    match time_point_to_date_time(time) {
        Some(date_time) => date_time.format(format).to_string(),
        None => time.to_string(),
    }
}

/// Parse a `First` cell. Accepts plain unix seconds, RFC 3339, the configured format and a
/// couple of common layouts. Timestamps without an offset are taken as UTC.
pub fn parse_time_point(text: &str, format: &str) -> Option<TimePoint> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(seconds) = text.parse::<f64>() {
        return seconds.is_finite().then_some(seconds);
    }
    if let Ok(date_time) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(naive_to_time_point(date_time.naive_utc()));
    }
    for layout in [
        format,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S",
    ] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, layout) {
            return Some(naive_to_time_point(naive));
        }
    }
    None
}

fn naive_to_time_point(naive: chrono::NaiveDateTime) -> TimePoint {
    let utc = naive.and_utc();
    utc.timestamp() as f64 + utc.timestamp_subsec_nanos() as f64 / 1_000_000_000.0
}

/// Root cause analysis verdict for one alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Classification {
    /// The alarm is the root of the problem.
    #[serde(rename = "P")]
    Problem,
    /// The alarm is a consequence of some other alarm.
    #[serde(rename = "C")]
    Consequence,
}

impl Classification {
    /// Parse a cell value. An empty cell means "unclassified".
    pub fn parse(text: &str) -> std::result::Result<Option<Classification>, String> {
        match text.trim() {
            "" => Ok(None),
            "P" => Ok(Some(Classification::Problem)),
            "C" => Ok(Some(Classification::Consequence)),
            other => Err(format!("expected `P`, `C` or empty, got `{}`", other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Problem => "P",
            Classification::Consequence => "C",
        }
    }
}

pub fn classification_to_text(classification: Option<Classification>) -> &'static str {
    classification.map(|c| c.as_str()).unwrap_or("")
}

/// One row of the canonical alarm table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Alarm {
    #[serde(rename = "Index")]
    pub index: u64,
    #[serde(rename = "AlarmSource")]
    pub alarm_source: String,
    #[serde(rename = "First")]
    pub first: TimePoint,
    /// Classification delivered with the upload, never edited.
    #[serde(rename = "RcaResult")]
    pub rca_result: Option<Classification>,
    #[serde(rename = "RcaResult_Edited")]
    pub rca_result_edited: Option<Classification>,
    /// Group computed by the clusterer.
    #[serde(rename = "GroupId")]
    pub group_id: GroupId,
    /// Group assigned by the operator, `None` means unassigned.
    #[serde(rename = "GroupId_Edited")]
    pub group_id_edited: Option<GroupId>,
    #[serde(rename = "Confirmed")]
    pub confirmed: bool,
    /// Columns of the uploaded table that the engine doesn't interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Alarm {
    pub fn new(index: u64, alarm_source: impl Into<String>, first: TimePoint) -> Alarm {
        Alarm {
            index,
            alarm_source: alarm_source.into(),
            first,
            rca_result: None,
            rca_result_edited: None,
            group_id: GroupId::new(),
            group_id_edited: None,
            confirmed: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn is_member_of(&self, group: &str) -> bool {
        self.group_id_edited.as_deref() == Some(group)
    }
}

/// Whole alarm table of one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmTable {
    pub alarms: Vec<Alarm>,
    /// Names of the non-canonical columns, in the order they were first seen.
    pub extra_columns: Vec<String>,
}

impl AlarmTable {
    pub fn new(alarms: Vec<Alarm>) -> AlarmTable {
        let mut extra_columns: Vec<String> = Vec::new();
        for alarm in &alarms {
            for column in alarm.extra.keys() {
                if !extra_columns.contains(column) {
                    extra_columns.push(column.clone());
                }
            }
        }
        AlarmTable {
            alarms,
            extra_columns,
        }
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    /// Alarms currently assigned to the group by the operator.
    pub fn group_members(&self, group: &str) -> Vec<&Alarm> {
        self.alarms
            .iter()
            .filter(|alarm| alarm.is_member_of(group))
            .collect()
    }

    /// Distinct computed group ids.
    pub fn group_ids(&self) -> BTreeSet<GroupId> {
        self.alarms
            .iter()
            .filter(|alarm| !alarm.group_id.is_empty())
            .map(|alarm| alarm.group_id.clone())
            .collect()
    }

    /// Distinct operator assigned group ids.
    pub fn edited_group_ids(&self) -> BTreeSet<GroupId> {
        self.alarms
            .iter()
            .filter_map(|alarm| alarm.group_id_edited.clone())
            .collect()
    }

    pub fn find_by_index_mut(&mut self, index: u64) -> Option<&mut Alarm> {
        self.alarms.iter_mut().find(|alarm| alarm.index == index)
    }

    /// Earliest and latest `First` in the table.
    pub fn time_span(&self) -> Option<(TimePoint, TimePoint)> {
        time_span(self.alarms.iter())
    }

    pub(crate) fn check_unique_indices(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for alarm in &self.alarms {
            if !seen.insert(alarm.index) {
                return Err(Error::schema(
                    COLUMN_INDEX,
                    format!("duplicate index {}", alarm.index),
                ));
            }
        }
        Ok(())
    }
}

pub fn time_span<'a>(alarms: impl IntoIterator<Item = &'a Alarm>) -> Option<(TimePoint, TimePoint)> {
    let mut span: Option<(TimePoint, TimePoint)> = None;
    for alarm in alarms {
        span = Some(match span {
            None => (alarm.first, alarm.first),
            Some((min, max)) => (min.min(alarm.first), max.max(alarm.first)),
        });
    }
    span
}
