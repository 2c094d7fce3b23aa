//! Turning uploaded tables into the canonical alarm table.
//!
//! Uploads come in two flavours. A table that already has a `Confirmed` column was exported
//! by this tool before and is taken as is. Any other table is a raw export and gets the
//! edited columns initialised from the delivered values. Both flavours need at least the
//! `AlarmSource` and `First` columns, every column the engine doesn't know is carried along.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use crate::cluster::{batch_seed, cluster};
use crate::error::{Error, Result};
use crate::task_timer::TaskTimer;
use crate::topology::PathResolver;
use crate::types::{
    parse_time_point, Alarm, AlarmTable, Classification, CANONICAL_COLUMNS, COLUMN_ALARM_SOURCE,
    COLUMN_CONFIRMED, COLUMN_FIRST, COLUMN_GROUP_ID, COLUMN_GROUP_ID_EDITED, COLUMN_INDEX,
    COLUMN_RCA_RESULT, COLUMN_RCA_RESULT_EDITED,
};

pub const REQUIRED_COLUMNS: [&str; 2] = [COLUMN_ALARM_SOURCE, COLUMN_FIRST];

/// A table as read from CSV, without any interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn from_reader<R: Read>(reader: R) -> std::result::Result<RawTable, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|header| header.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(RawTable { headers, rows })
    }

    pub fn from_path(path: &Path) -> Result<RawTable> {
        let file = std::fs::File::open(path).map_err(|e| Error::persistence(path, e))?;
        RawTable::from_reader(file).map_err(|e| Error::persistence(path, e))
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn is_canonical(&self) -> bool {
        self.column(COLUMN_CONFIRMED).is_some()
    }

    /// Reject the table if a required column is missing.
    pub fn check_columns(&self) -> Result<()> {
        for required in REQUIRED_COLUMNS {
            if self.column(required).is_none() {
                return Err(Error::schema(required, "required column is missing"));
            }
        }
        Ok(())
    }
}

/// Parsed row, before indices are settled.
struct ParsedRow {
    index: Option<u64>,
    alarm: Alarm,
}

fn cell<'a>(row: &'a [String], column: Option<usize>) -> &'a str {
    column
        .and_then(|column| row.get(column))
        .map(|value| value.trim())
        .unwrap_or("")
}

fn parse_classification(
    text: &str,
    field: &str,
    row_number: usize,
) -> Result<Option<Classification>> {
    Classification::parse(text)
        .map_err(|reason| Error::schema(field, format!("row {row_number}: {reason}")))
}

fn parse_confirmed(text: &str) -> bool {
    matches!(text, "1" | "1.0" | "true" | "True")
}

fn optional(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

fn parse_rows(raw: &RawTable, time_format: &str) -> Result<Vec<ParsedRow>> {
    raw.check_columns()?;

    let index_column = raw.column(COLUMN_INDEX);
    let source_column = raw.column(COLUMN_ALARM_SOURCE);
    let first_column = raw.column(COLUMN_FIRST);
    let rca_column = raw.column(COLUMN_RCA_RESULT);
    let rca_edited_column = raw.column(COLUMN_RCA_RESULT_EDITED);
    let group_column = raw.column(COLUMN_GROUP_ID);
    let group_edited_column = raw.column(COLUMN_GROUP_ID_EDITED);
    let confirmed_column = raw.column(COLUMN_CONFIRMED);
    let canonical = raw.is_canonical();

    let extra_columns: Vec<(usize, &String)> = raw
        .headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !CANONICAL_COLUMNS.contains(&header.as_str()))
        .collect();

    let mut parsed = Vec::with_capacity(raw.rows.len());
    for (row_number, row) in raw.rows.iter().enumerate() {
        let first_text = cell(row, first_column);
        let first = parse_time_point(first_text, time_format).ok_or_else(|| {
            Error::schema(
                COLUMN_FIRST,
                format!("row {row_number}: can't parse timestamp `{first_text}`"),
            )
        })?;

        let mut alarm = Alarm::new(0, cell(row, source_column), first);
        alarm.rca_result =
            parse_classification(cell(row, rca_column), COLUMN_RCA_RESULT, row_number)?;
        alarm.group_id = cell(row, group_column).to_string();

        if canonical {
            alarm.rca_result_edited = parse_classification(
                cell(row, rca_edited_column),
                COLUMN_RCA_RESULT_EDITED,
                row_number,
            )?;
            alarm.group_id_edited = optional(cell(row, group_edited_column));
            alarm.confirmed = parse_confirmed(cell(row, confirmed_column));
        } else {
            alarm.rca_result_edited = alarm.rca_result;
            alarm.group_id_edited = optional(&alarm.group_id);
        }

        alarm.extra = extra_columns
            .iter()
            .map(|(column, header)| ((*header).clone(), cell(row, Some(*column)).to_string()))
            .collect::<BTreeMap<String, String>>();

        let index = cell(row, index_column).parse::<u64>().ok();
        parsed.push(ParsedRow { index, alarm });
    }

    Ok(parsed)
}

/// Give every row its index. Indices from the input are kept when every row has one and
/// they are all distinct, otherwise all rows are renumbered from 0.
fn settle_indices(rows: Vec<ParsedRow>) -> Vec<Alarm> {
    let mut seen = BTreeSet::new();
    let keep = rows
        .iter()
        .all(|row| row.index.is_some_and(|index| seen.insert(index)));

    rows.into_iter()
        .enumerate()
        .map(|(position, row)| {
            let mut alarm = row.alarm;
            alarm.index = match (keep, row.index) {
                (true, Some(index)) => index,
                _ => position as u64,
            };
            alarm
        })
        .collect()
}

/// Parse a canonical table, as written by the session store.
pub fn table_from_raw(raw: &RawTable, time_format: &str) -> Result<AlarmTable> {
    let rows = parse_rows(raw, time_format)?;
    let table = AlarmTable::new(settle_indices(rows));
    table.check_unique_indices()?;
    Ok(table)
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub resolver: PathResolver,
    pub time_format: String,
    /// Seed for shuffling group ids, derived from the batch when unset.
    pub group_seed: Option<u64>,
}

/// Merge two uploaded tables into one canonical alarm table.
///
/// If any row comes without a `GroupId` the whole batch is clustered again and both
/// `GroupId` and `GroupId_Edited` are reset to the computed groups.
pub fn ingest(first: &RawTable, second: &RawTable, options: &IngestOptions) -> Result<AlarmTable> {
    let task_timer = TaskTimer::new("Ingesting uploads");

    let mut rows = parse_rows(first, &options.time_format)?;
    rows.extend(parse_rows(second, &options.time_format)?);
    let mut alarms = settle_indices(rows);

    if alarms.iter().any(|alarm| alarm.group_id.is_empty()) {
        if alarms.iter().any(|alarm| alarm.confirmed) {
            tracing::warn!("uploads mix grouped and ungrouped rows, confirmations are reset");
        }
        let seed = options.group_seed.unwrap_or_else(|| batch_seed(&alarms));
        let groups = cluster(&alarms, &options.resolver, seed);
        for (alarm, group) in alarms.iter_mut().zip(groups) {
            alarm.group_id_edited = Some(group.clone());
            alarm.group_id = group;
            alarm.confirmed = false;
        }
    }

    let table = AlarmTable::new(alarms);
    let known_groups = table.group_ids();
    for alarm in &table.alarms {
        if let Some(group) = &alarm.group_id_edited {
            if !known_groups.contains(group) {
                tracing::warn!(index = alarm.index, %group, "edited group is not in the batch");
                return Err(Error::GroupNotFound(group.clone()));
            }
        }
    }

    tracing::info!(
        rows = table.len(),
        groups = known_groups.len(),
        extra_columns = table.extra_columns.len(),
        "ingested uploads"
    );
    task_timer.stop();

    Ok(table)
}
