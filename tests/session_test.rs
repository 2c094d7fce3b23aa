use alarmtopo::ingest::{ingest, IngestOptions, RawTable};
use alarmtopo::review::{self, RowEdit};
use alarmtopo::scoring::{group_confirmation, score};
use alarmtopo::store::SessionStore;
use alarmtopo::topology::PathResolver;
use alarmtopo::types::{COLUMN_GROUP_ID_EDITED, COLUMN_RCA_RESULT_EDITED};
use alarmtopo::Error;

use test_helpers::write_file;

const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ALARMS: &str = "\
AlarmSource,First,Severity
rootA.site1.dev1,2024-03-01 10:00:00,major
rootA.site1.dev2,2024-03-01 10:01:00,minor
rootB.site2.dev9,2024-03-01 11:00:00,major
";

const MORE_ALARMS: &str = "\
AlarmSource,First
rootA.site1.dev3,2024-03-01 10:30:00
";

fn options() -> IngestOptions {
    IngestOptions {
        resolver: PathResolver::default(),
        time_format: FORMAT.to_string(),
        group_seed: Some(99),
    }
}

/// Upload two exports, review one group and check that the stored table follows the edits.
#[test]
fn test_upload_review_and_persist() {
    let dir = tempfile::tempdir().unwrap();
    let first = RawTable::from_path(&write_file(dir.path(), "a.csv", ALARMS)).unwrap();
    let second = RawTable::from_path(&write_file(dir.path(), "b.csv", MORE_ALARMS)).unwrap();

    let store = SessionStore::new(dir.path().join("uploads"), "alarm_format.csv", FORMAT);
    let session = store.create().unwrap();
    let table = ingest(&first, &second, &options()).unwrap();
    store.save_table(session, &table).unwrap();

    let table = store.load_table(session).unwrap();
    assert_eq!(table.len(), 4);
    let group_a = table.alarms[0].group_id.clone();
    let group_b = table.alarms[2].group_id.clone();
    assert_eq!(table.alarms[3].group_id, group_a);
    assert_ne!(group_a, group_b);

    let initial = score(&table);
    assert_eq!(initial.group_count, 2);
    assert_eq!(initial.confirmed, 0);
    assert_eq!(initial.unconfirmed, 2);
    assert_eq!(initial.x_count, 4);

    // Analyze the big group
    let analysis = review::analyze(&table, &group_a, &PathResolver::default()).unwrap();
    assert_eq!(analysis.table.len(), 3);
    assert_eq!(analysis.topo.name, "rootA");
    assert_eq!(
        analysis.orange,
        vec!["rootA.site1.dev1", "rootA.site1.dev2", "rootA.site1.dev3"]
    );

    // Confirm every member of group A, one of them as the root cause
    let edits: Vec<RowEdit> = [0u64, 1, 3]
        .iter()
        .map(|&index| RowEdit {
            index,
            changes: vec![
                (COLUMN_GROUP_ID_EDITED.to_string(), group_a.clone()),
                (
                    COLUMN_RCA_RESULT_EDITED.to_string(),
                    if index == 0 { "P" } else { "C" }.to_string(),
                ),
            ],
        })
        .collect();
    let table = review::confirm(&table, &edits).unwrap();
    store.save_table(session, &table).unwrap();

    let table = store.load_table(session).unwrap();
    let reviewed = score(&table);
    assert_eq!(reviewed.p_count, 1);
    assert_eq!(reviewed.c_count, 2);
    assert_eq!(reviewed.confirmed, 1);
    assert_eq!(reviewed.unconfirmed, 1);
    assert_eq!(table.alarms[0].extra["Severity"], "major");

    let detail = group_confirmation(&table);
    assert_eq!(detail.confirmed, vec![group_a.clone()]);
    assert_eq!(detail.unconfirmed, vec![group_b]);

    // An unassigned alarm is no longer a member, the rest of the group stays confirmed
    let unassign = vec![RowEdit {
        index: 1,
        changes: vec![(COLUMN_GROUP_ID_EDITED.to_string(), String::new())],
    }];
    let table = review::confirm(&table, &unassign).unwrap();
    let detail = group_confirmation(&table);
    assert_eq!(detail.confirmed, vec![group_a.clone()]);

    // The unassigned alarm becomes an expansion candidate of its old group
    let expansion = review::expand(&table, &group_a, 5, &PathResolver::default()).unwrap();
    let included: Vec<u64> = expansion.included.iter().map(|a| a.index).collect();
    assert_eq!(included, vec![1]);
    // It was computed into the same group, so it isn't highlighted as new
    assert!(expansion.yellow.is_empty());
}

/// A group that is confirmed loses that status when one member row is unconfirmed.
#[test]
fn test_confirmation_needs_every_member() {
    let table = ingest(
        &RawTable::from_reader(ALARMS.as_bytes()).unwrap(),
        &RawTable::from_reader(MORE_ALARMS.as_bytes()).unwrap(),
        &options(),
    )
    .unwrap();
    let group_a = table.alarms[0].group_id.clone();

    let confirm_all: Vec<RowEdit> = [0u64, 1, 3]
        .iter()
        .map(|&index| RowEdit {
            index,
            changes: vec![(COLUMN_GROUP_ID_EDITED.to_string(), group_a.clone())],
        })
        .collect();
    let mut table = review::confirm(&table, &confirm_all).unwrap();
    assert_eq!(group_confirmation(&table).confirmed, vec![group_a.clone()]);

    table.alarms[3].confirmed = false;
    let detail = group_confirmation(&table);
    assert!(detail.confirmed.is_empty());
    assert!(detail.unconfirmed.contains(&group_a));
}

#[test]
fn test_upload_without_required_column() {
    let err = ingest(
        &RawTable::from_reader("Source,First\na,2024-03-01 10:00:00\n".as_bytes()).unwrap(),
        &RawTable::from_reader(MORE_ALARMS.as_bytes()).unwrap(),
        &options(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Schema { ref field, .. } if field == "AlarmSource"));
}
