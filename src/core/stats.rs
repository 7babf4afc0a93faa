use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::core::types::GroupId;
use crate::group::orchestrator::GroupState;

/// Counters for one field group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupStats {
    pub group: GroupId,
    pub state: GroupState,
    pub keys_assigned: u64,
    pub keys_shared: u64,
    pub collisions: u64,
    pub rebuilds: u64,
    pub last_rebuild: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub pending: usize,
    pub processed: u64,
    pub failed: u64,
    pub poisoned: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub groups: Vec<GroupStats>,
    pub scheduler: SchedulerStats,
}
