//! Review progress of an alarm table.

use std::collections::BTreeMap;

use crate::types::{AlarmTable, Classification, GroupId, TimePoint};

/// Summary of how far the operator got with reviewing the table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Score {
    /// Share of alarms with an edited classification, between 0 and 1.
    pub accuracy: f64,
    pub total_alarm: usize,
    pub p_count: usize,
    pub c_count: usize,
    /// Alarms without an edited classification.
    pub x_count: usize,
    /// Distinct operator assigned groups.
    pub group_count: usize,
    pub confirmed: usize,
    pub unconfirmed: usize,
    /// Time span of the table, `None` for an empty table.
    pub start: Option<TimePoint>,
    pub end: Option<TimePoint>,
}

/// Groups split by whether every member has been confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GroupConfirmation {
    pub confirmed: Vec<GroupId>,
    pub unconfirmed: Vec<GroupId>,
}

/// A group counts as confirmed only when all alarms assigned to it are confirmed.
pub fn group_confirmation(table: &AlarmTable) -> GroupConfirmation {
    // group -> (members, confirmed members)
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for alarm in &table.alarms {
        let Some(group) = alarm.group_id_edited.as_deref() else {
            continue;
        };
        let entry = counts.entry(group).or_default();
        entry.0 += 1;
        if alarm.confirmed {
            entry.1 += 1;
        }
    }

    let mut result = GroupConfirmation::default();
    for (group, (members, confirmed)) in counts {
        if members == confirmed {
            result.confirmed.push(group.to_string());
        } else {
            result.unconfirmed.push(group.to_string());
        }
    }
    result
}

pub fn score(table: &AlarmTable) -> Score {
    let total_alarm = table.len();
    let mut p_count = 0;
    let mut c_count = 0;
    for alarm in &table.alarms {
        match alarm.rca_result_edited {
            Some(Classification::Problem) => p_count += 1,
            Some(Classification::Consequence) => c_count += 1,
            None => {}
        }
    }
    let x_count = total_alarm - p_count - c_count;

    let accuracy = if total_alarm == 0 {
        0.0
    } else {
        (p_count + c_count) as f64 / total_alarm as f64
    };

    let confirmation = group_confirmation(table);
    let confirmed = confirmation.confirmed.len();
    let group_count = confirmed + confirmation.unconfirmed.len();
    let span = table.time_span();

    Score {
        accuracy,
        total_alarm,
        p_count,
        c_count,
        x_count,
        group_count,
        confirmed,
        unconfirmed: group_count - confirmed,
        start: span.map(|(start, _)| start),
        end: span.map(|(_, end)| end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Alarm;
    use approx::assert_abs_diff_eq;

    fn row(index: u64, group: &str, confirmed: bool, rca: Option<Classification>) -> Alarm {
        let mut alarm = Alarm::new(index, "a.b", index as f64);
        alarm.group_id = group.to_string();
        alarm.group_id_edited = Some(group.to_string());
        alarm.confirmed = confirmed;
        alarm.rca_result_edited = rca;
        alarm
    }

    #[test]
    fn empty_table() {
        let score = score(&AlarmTable::default());
        assert_eq!(score.total_alarm, 0);
        assert_eq!(score.accuracy, 0.0);
        assert_eq!(score.start, None);
    }

    #[test]
    fn counts_and_accuracy() {
        let table = AlarmTable::new(vec![
            row(1, "1", true, Some(Classification::Problem)),
            row(2, "1", true, Some(Classification::Consequence)),
            row(3, "2", false, None),
            row(4, "2", true, Some(Classification::Consequence)),
        ]);
        let score = score(&table);
        assert_eq!((score.p_count, score.c_count, score.x_count), (1, 2, 1));
        assert_abs_diff_eq!(score.accuracy, 0.75);
        assert_eq!(score.group_count, 2);
        assert_eq!(score.confirmed, 1);
        assert_eq!(score.unconfirmed, 1);
        assert_eq!(score.start, Some(1.0));
        assert_eq!(score.end, Some(4.0));
    }

    #[test]
    fn unassigned_alarms_belong_to_no_group() {
        let mut alarm = row(1, "1", false, None);
        alarm.group_id_edited = None;
        let confirmation = group_confirmation(&AlarmTable::new(vec![alarm]));
        assert!(confirmation.confirmed.is_empty());
        assert!(confirmation.unconfirmed.is_empty());
    }
}
