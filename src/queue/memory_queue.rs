use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::GroupId;
use crate::queue::group_queue::{Delivery, GroupQueue};

struct Message {
    id: Uuid,
    payload: Vec<u8>,
    attempts: u32,
}

struct Lease {
    token: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
struct GroupEntry {
    messages: VecDeque<Message>,
    lease: Option<Lease>,
}

#[derive(Default)]
struct QueueState {
    groups: HashMap<GroupId, GroupEntry>,
    // Round-robin order over groups with queued messages
    order: VecDeque<GroupId>,
}

impl QueueState {
    fn expire_leases(&mut self, now: Instant, prefix: &str) {
        for (group, entry) in self.groups.iter_mut() {
            if entry.lease.as_ref().map_or(false, |lease| lease.expires_at <= now) {
                warn!(queue = prefix, group = %group, "visibility timeout elapsed, message will be redelivered");
                entry.lease = None;
            }
        }
    }

    fn next_expiry(&self) -> Option<Instant> {
        self.groups
            .values()
            .filter_map(|entry| entry.lease.as_ref().map(|lease| lease.expires_at))
            .min()
    }

    fn lease_next(&mut self, visibility_timeout: Duration) -> Option<Delivery> {
        for _ in 0..self.order.len() {
            let group = self.order.pop_front()?;
            self.order.push_back(group.clone());

            let entry = match self.groups.get_mut(&group) {
                Some(entry) if entry.lease.is_none() => entry,
                _ => continue,
            };
            let message = match entry.messages.front_mut() {
                Some(message) => message,
                None => continue,
            };

            message.attempts += 1;
            let token = Uuid::new_v4();
            let delivery = Delivery {
                group: group.clone(),
                message_id: message.id,
                lease: token,
                attempt: message.attempts,
                payload: message.payload.clone(),
            };
            entry.lease = Some(Lease { token, expires_at: Instant::now() + visibility_timeout });
            return Some(delivery);
        }
        None
    }

    fn holds_lease(&self, delivery: &Delivery) -> bool {
        self.groups
            .get(&delivery.group)
            .and_then(|entry| entry.lease.as_ref())
            .map_or(false, |lease| lease.token == delivery.lease)
    }

    fn drop_if_idle(&mut self, group: &GroupId) {
        let idle = self
            .groups
            .get(group)
            .map_or(false, |entry| entry.messages.is_empty() && entry.lease.is_none());
        if idle {
            self.groups.remove(group);
            self.order.retain(|g| g != group);
        }
    }
}

/// In-process group-serialized queue with visibility timeouts
pub struct MemoryGroupQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    visibility_timeout: Duration,
    prefix: String,
}

impl MemoryGroupQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self::with_prefix(visibility_timeout, "sortfield")
    }

    pub fn with_prefix(visibility_timeout: Duration, prefix: &str) -> Self {
        MemoryGroupQueue {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            visibility_timeout,
            prefix: prefix.to_string(),
        }
    }

    /// Visibility timeout and log prefix taken from `Config`
    pub fn from_config(config: &Config) -> Self {
        Self::with_prefix(config.visibility_timeout(), &config.key_prefix)
    }

    /// Messages queued for one group, leased head included
    pub fn group_len(&self, group: &GroupId) -> usize {
        self.state.lock().groups.get(group).map_or(0, |entry| entry.messages.len())
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().groups.values().filter(|entry| entry.lease.is_some()).count()
    }
}

impl GroupQueue for MemoryGroupQueue {
    fn send(&self, group: &GroupId, payload: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock();
        if !state.groups.contains_key(group) {
            state.order.push_back(group.clone());
        }
        state.groups.entry(group.clone()).or_default().messages.push_back(Message {
            id: Uuid::new_v4(),
            payload,
            attempts: 0,
        });
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    fn receive(&self, wait: Duration) -> Result<Option<Delivery>> {
        let deadline = Instant::now() + wait;
        let mut state = self.state.lock();
        loop {
            let now = Instant::now();
            state.expire_leases(now, &self.prefix);
            if let Some(delivery) = state.lease_next(self.visibility_timeout) {
                if delivery.attempt > 1 {
                    debug!(queue = %self.prefix, group = %delivery.group, attempt = delivery.attempt, "redelivering message");
                }
                return Ok(Some(delivery));
            }
            if now >= deadline {
                return Ok(None);
            }
            let wake = state.next_expiry().map_or(deadline, |expiry| expiry.min(deadline));
            self.available.wait_until(&mut state, wake);
        }
    }

    fn ack(&self, delivery: &Delivery) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.holds_lease(delivery) {
            return Ok(false);
        }
        if let Some(entry) = state.groups.get_mut(&delivery.group) {
            if entry.messages.front().map_or(false, |m| m.id == delivery.message_id) {
                entry.messages.pop_front();
            }
            entry.lease = None;
        }
        state.drop_if_idle(&delivery.group);
        drop(state);
        self.available.notify_one();
        Ok(true)
    }

    fn release(&self, delivery: &Delivery) -> Result<()> {
        let mut state = self.state.lock();
        if state.holds_lease(delivery) {
            if let Some(entry) = state.groups.get_mut(&delivery.group) {
                entry.lease = None;
            }
        }
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    fn purge(&self, group: &GroupId) -> Result<usize> {
        let mut state = self.state.lock();
        let removed = match state.groups.get_mut(group) {
            Some(entry) => {
                let keep = usize::from(entry.lease.is_some());
                let removed = entry.messages.len().saturating_sub(keep);
                entry.messages.truncate(keep);
                removed
            }
            None => 0,
        };
        state.drop_if_idle(group);
        Ok(removed)
    }

    fn pending_count(&self) -> Result<usize> {
        Ok(self.state.lock().groups.values().map(|entry| entry.messages.len()).sum())
    }
}
