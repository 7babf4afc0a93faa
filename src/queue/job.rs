use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::error::Result;
use crate::core::types::{FieldValue, GroupId, ObjectId};

/// Work queued for one field group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PendingJob {
    AssignKey { object_id: ObjectId, value: FieldValue },
    RebuildAll,
}

impl PendingJob {
    pub fn assign(object_id: ObjectId, value: FieldValue) -> Self {
        PendingJob::AssignKey { object_id, value }
    }

    pub fn is_rebuild(&self) -> bool {
        matches!(self, PendingJob::RebuildAll)
    }
}

/// Wire form of a queued job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub group: GroupId,
    pub job: PendingJob,
    pub enqueued_at: DateTime<Utc>,
}

impl JobEnvelope {
    pub fn new(group: GroupId, job: PendingJob) -> Self {
        JobEnvelope { group, job, enqueued_at: Utc::now() }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}
