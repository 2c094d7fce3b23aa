pub mod cluster;
pub mod config;
pub mod error;
pub mod expand;
pub mod ingest;
pub mod review;
pub mod scoring;
pub mod store;
pub mod task_timer;
pub mod topology;
pub mod tree;
pub mod types;

pub use error::{Error, Result};
pub use topology::{PathResolver, TopologyPath};
pub use tree::{build_tree, TopologyTree};
pub use types::{Alarm, AlarmTable, Classification, GroupId, TimePoint};
