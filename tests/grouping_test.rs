use approx::assert_abs_diff_eq;
use proptest::prelude::*;

use alarmtopo::cluster::{cluster, partition};
use alarmtopo::expand::expand_window;
use alarmtopo::scoring::score;
use alarmtopo::topology::PathResolver;
use alarmtopo::tree::build_tree;
use alarmtopo::TopologyPath;

use test_helpers::{three_alarm_scenario, AlarmConfig, ScenarioBuilder};

/// A and B share `rootA` and `rootA.site1` so they end up together, C is on its own.
/// The tree of {A, B} is rootA -> site1 -> {dev1, dev2}.
#[test]
fn test_three_alarm_scenario() {
    let resolver = PathResolver::default();
    let scenario = three_alarm_scenario();
    let alarms = scenario.alarms();

    let groups = cluster(alarms, &resolver, 11);
    assert_eq!(groups[0], groups[1]);
    assert_ne!(groups[0], groups[2]);

    let paths = resolver.resolve_all(alarms[..2].iter().map(|a| a.alarm_source.as_str()));
    let tree = build_tree(&paths);
    assert_eq!(tree.name, "rootA");
    assert_eq!(tree.children.len(), 1);
    let site = &tree.children[0];
    assert_eq!(site.name, "site1");
    let leaves: Vec<&str> = site.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(leaves, vec!["dev1", "dev2"]);
    assert!(site.children.iter().all(|c| c.children.is_empty()));

    let score = score(&scenario.build());
    assert_abs_diff_eq!(score.accuracy, 0.0);
    assert_eq!(score.p_count, 0);
    assert_eq!(score.c_count, 0);
    assert_eq!(score.p_count + score.c_count + score.x_count, score.total_alarm);
}

/// Group {A, B} expanded by 60 minutes picks up D (same site) but not E (unrelated root),
/// even though E is closer in time.
#[test]
fn test_expand_scenario() {
    let resolver = PathResolver::default();
    let mut builder = ScenarioBuilder::new();
    builder.add_alarm(AlarmConfig::in_group("rootA.site1.dev1", 100.0, "g"));
    builder.add_alarm(AlarmConfig::in_group("rootA.site1.dev2", 110.0, "g"));
    let d = builder.add_alarm(AlarmConfig::new("rootA.site1.dev3", 150.0));
    builder.add_alarm(AlarmConfig::new("rootC.x", 105.0));
    let table = builder.build();

    let members = table.group_members("g");
    let current = resolver.resolve_all(members.iter().map(|a| a.alarm_source.as_str()));
    let expansion = expand_window("g", &members, &current, 60, &table.alarms, &resolver).unwrap();

    let included: Vec<u64> = expansion.included.iter().map(|a| a.index).collect();
    assert_eq!(included, vec![d]);
    assert_eq!(expansion.candidates.len(), 2);
    assert_eq!(expansion.paths.len(), 3);

    let tree = build_tree(&expansion.paths);
    assert_eq!(tree.children[0].children.len(), 3);
}

/// With no margin and no candidates exactly at the group's bounds nothing is included.
#[test]
fn test_zero_margin_includes_nothing_outside_bounds() {
    let resolver = PathResolver::default();
    let mut builder = ScenarioBuilder::new();
    builder.add_alarm(AlarmConfig::in_group("r.a", 100.0, "g"));
    builder.add_alarm(AlarmConfig::in_group("r.b", 200.0, "g"));
    builder.add_alarm(AlarmConfig::new("r.c", 99.0));
    builder.add_alarm(AlarmConfig::new("r.d", 201.0));
    let table = builder.build();

    let members = table.group_members("g");
    let current = resolver.resolve_all(members.iter().map(|a| a.alarm_source.as_str()));
    let expansion = expand_window("g", &members, &current, 0, &table.alarms, &resolver).unwrap();
    assert!(expansion.is_unchanged());
    assert_eq!(expansion.paths, current);
}

/// Alarms anywhere under the same root end up in one group.
#[test]
fn test_alarms_under_one_root_are_grouped() {
    let mut builder = ScenarioBuilder::new();
    for source in ["x.1", "y.1", "x.2", "y.2", "z", "", "bad..id", "x"] {
        builder.add_alarm(AlarmConfig::new(source, 0.0));
    }
    let groups = cluster(builder.alarms(), &PathResolver::default(), 3);

    assert_eq!(groups[0], groups[2]);
    assert_eq!(groups[0], groups[7]);
    assert_eq!(groups[1], groups[3]);
    assert_ne!(groups[0], groups[1]);
    // z, the empty source and the malformed one are all singletons
    for singleton in [4, 5, 6] {
        let members = groups.iter().filter(|g| **g == groups[singleton]).count();
        assert_eq!(members, 1, "alarm {singleton} should be alone");
    }
}

fn path_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[abc](\\.[xyz]){0,3}", 1..12)
}

/// Groups as sorted lists of sources, so partitions can be compared across input orders.
fn source_groups(sources: &[String]) -> Vec<Vec<String>> {
    let mut builder = ScenarioBuilder::new();
    for source in sources {
        builder.add_alarm(AlarmConfig::new(source, 0.0));
    }
    let mut groups: Vec<Vec<String>> = partition(builder.alarms(), &PathResolver::default())
        .into_iter()
        .map(|members| {
            let mut group: Vec<String> = members.into_iter().map(|i| sources[i].clone()).collect();
            group.sort();
            group
        })
        .collect();
    groups.sort();
    groups
}

proptest! {
    #[test]
    fn prop_tree_does_not_depend_on_path_order(sources in path_strategy(), seed in any::<u64>()) {
        let resolver = PathResolver::default();
        let paths: Vec<TopologyPath> = sources.iter().map(|s| resolver.resolve(s)).collect();

        let mut shuffled = paths.clone();
        // Deterministic permutation driven by the seed
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();

        prop_assert_eq!(build_tree(&paths), build_tree(&shuffled));
        prop_assert_eq!(build_tree(&paths), build_tree(&paths));
    }

    #[test]
    fn prop_partition_does_not_depend_on_alarm_order(
        (sources, shuffled) in path_strategy()
            .prop_flat_map(|sources| (Just(sources.clone()), Just(sources).prop_shuffle()))
    ) {
        prop_assert_eq!(source_groups(&sources), source_groups(&shuffled));
    }

    #[test]
    fn prop_intersecting_paths_share_a_group(sources in path_strategy()) {
        let resolver = PathResolver::default();
        let mut builder = ScenarioBuilder::new();
        for source in &sources {
            builder.add_alarm(AlarmConfig::new(source, 0.0));
        }
        let groups = cluster(builder.alarms(), &resolver, 5);
        for i in 0..sources.len() {
            for j in 0..sources.len() {
                let a = resolver.resolve(&sources[i]);
                let b = resolver.resolve(&sources[j]);
                if a.intersects_path(&b) {
                    prop_assert_eq!(&groups[i], &groups[j]);
                }
            }
        }
    }
}
