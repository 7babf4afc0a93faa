use std::time::Duration;
use uuid::Uuid;
use crate::core::error::Result;
use crate::core::types::GroupId;

/// A leased message; the group stays locked until ack, release or lease expiry
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub group: GroupId,
    pub message_id: Uuid,
    pub lease: Uuid,
    pub attempt: u32,
    pub payload: Vec<u8>,
}

/// Ordered multi-group queue adapter.
///
/// At most one message per group is leased at a time, system-wide. Messages of a
/// group are delivered in send order. An unacknowledged lease expires after the
/// visibility timeout and the message becomes deliverable again.
pub trait GroupQueue: Send + Sync {
    fn send(&self, group: &GroupId, payload: Vec<u8>) -> Result<()>;

    /// Waits up to `wait` for a message of an unlocked group
    fn receive(&self, wait: Duration) -> Result<Option<Delivery>>;

    /// `false` when the lease already expired and was handed to someone else
    fn ack(&self, delivery: &Delivery) -> Result<bool>;

    /// Unlocks the group and keeps the message for redelivery
    fn release(&self, delivery: &Delivery) -> Result<()>;

    /// Drops queued messages of a group that are not currently leased
    fn purge(&self, group: &GroupId) -> Result<usize>;

    /// Backlog across all groups, in-flight messages included
    fn pending_count(&self) -> Result<usize>;
}
