//! Grouping alarms by shared topology.
//!
//! Two alarms are related when their topology paths share a node. Groups are the connected
//! components of that relation, so relatedness is transitive: if A shares a node with B and
//! B shares a node with C, all three end up in one group even if A and C share nothing.
//! Alarms without topology membership are groups of their own.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use sha2::Digest;

use crate::task_timer::TaskTimer;
use crate::topology::{NodeId, PathResolver};
use crate::types::{Alarm, GroupId};

/// Disjoint set forest over alarm positions.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> DisjointSet {
        DisjointSet {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, i: usize, j: usize) {
        let pi = self.find(i);
        let pj = self.find(j);
        if pi == pj {
            return;
        }
        match self.rank[pi].cmp(&self.rank[pj]) {
            std::cmp::Ordering::Less => self.parent[pi] = pj,
            std::cmp::Ordering::Greater => self.parent[pj] = pi,
            std::cmp::Ordering::Equal => {
                self.parent[pj] = pi;
                self.rank[pi] += 1;
            }
        }
    }
}

/// Partition the alarms into groups of positions.
///
/// Groups are listed in order of their first member and members keep the input order,
/// so the partition only depends on the input.
pub fn partition(alarms: &[Alarm], resolver: &PathResolver) -> Vec<Vec<usize>> {
    let mut components = DisjointSet::new(alarms.len());
    // First alarm seen on each topology node
    let mut node_owner: HashMap<NodeId, usize> = HashMap::new();

    for (position, alarm) in alarms.iter().enumerate() {
        let path = resolver.resolve(&alarm.alarm_source);
        for node_id in path.node_ids() {
            match node_owner.get(node_id) {
                Some(&owner) => components.union(owner, position),
                None => {
                    node_owner.insert(node_id.clone(), position);
                }
            }
        }
    }

    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for position in 0..alarms.len() {
        let root = components.find(position);
        let group = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(position);
    }
    groups
}

/// Derive a shuffling seed from the contents of the batch, used when no seed is configured.
pub fn batch_seed(alarms: &[Alarm]) -> u64 {
    let mut hasher = sha2::Sha256::new();
    for alarm in alarms {
        hasher.update(alarm.alarm_source.as_bytes());
        hasher.update([0u8]);
        hasher.update(alarm.first.to_le_bytes());
    }
    let digest: [u8; 32] = hasher.finalize().into();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[0..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Assign a group id to every alarm, returned in input order.
///
/// Ids are the numbers `1..=group_count` in a shuffled order, so they are unique within the
/// batch and don't leak the order in which groups were found.
pub fn cluster(alarms: &[Alarm], resolver: &PathResolver, seed: u64) -> Vec<GroupId> {
    let task_timer = TaskTimer::new("Clustering alarms");

    let groups = partition(alarms, resolver);

    let mut ids: Vec<usize> = (1..=groups.len()).collect();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    ids.shuffle(&mut rng);

    let mut assignments = vec![GroupId::new(); alarms.len()];
    for (group, id) in groups.iter().zip(ids) {
        for &position in group {
            assignments[position] = id.to_string();
        }
    }

    tracing::info!(
        alarms = alarms.len(),
        groups = groups.len(),
        "clustered alarms by topology"
    );
    task_timer.stop();

    assignments
}
