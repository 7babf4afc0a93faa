use std::cmp::Ordering as ValueOrder;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::GroupStats;
use crate::core::types::{FieldValue, GroupId, ObjectId};
use crate::group::field_group::FieldGroup;
use crate::key::sort_key::SortKey;
use crate::locate::locator::locate;
use crate::queue::job::PendingJob;
use crate::queue::scheduler::GroupScheduler;
use crate::rebuild::engine::{rebuild_all, RebuildReport};
use crate::storage::store::{DocumentStore, Filter, Projection, WriteOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupState {
    Cold,
    Reconciling,
    Steady,
    Rebuilding,
}

/// What a committed write did to a document, as seen by one field group
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    /// Source field changed to this value
    Source(FieldValue),
    /// Only the sort field was written, normally by this crate
    SortField,
    Unrelated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePlan {
    Rebuild { purged: usize },
    Incremental { enqueued: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignOutcome {
    Assigned(SortKey),
    /// Reused the key of a document with an equal value
    Shared(SortKey),
    /// Document vanished before the key was written
    Dropped,
}

/// When a full rebuild beats per-document assignment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RebuildPolicy {
    pub count_floor: usize,
    pub fraction_threshold: f64,
}

impl RebuildPolicy {
    pub fn from_config(config: &Config) -> Self {
        RebuildPolicy {
            count_floor: config.rebuild_count_floor,
            fraction_threshold: config.rebuild_fraction_threshold,
        }
    }

    pub fn should_rebuild(&self, total: usize, missing: usize) -> bool {
        if total < self.count_floor {
            return true;
        }
        total > 0 && missing as f64 / total as f64 > self.fraction_threshold
    }
}

/// Maintains the sort field of one field group
pub struct Orchestrator {
    group: FieldGroup,
    store: Arc<dyn DocumentStore>,
    scheduler: Arc<GroupScheduler>,
    policy: RebuildPolicy,
    collision_retry_limit: usize,
    quiet: bool,
    state: RwLock<GroupState>,
    last_rebuild: RwLock<Option<DateTime<Utc>>>,
    keys_assigned: AtomicU64,
    keys_shared: AtomicU64,
    collisions: AtomicU64,
    rebuilds: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        group: FieldGroup,
        store: Arc<dyn DocumentStore>,
        scheduler: Arc<GroupScheduler>,
        config: &Config,
    ) -> Self {
        Orchestrator {
            group,
            store,
            scheduler,
            policy: RebuildPolicy::from_config(config),
            collision_retry_limit: config.collision_retry_limit,
            quiet: config.quiet,
            state: RwLock::new(GroupState::Cold),
            last_rebuild: RwLock::new(None),
            keys_assigned: AtomicU64::new(0),
            keys_shared: AtomicU64::new(0),
            collisions: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
        }
    }

    pub fn group(&self) -> &FieldGroup {
        &self.group
    }

    pub fn id(&self) -> &GroupId {
        &self.group.id
    }

    pub fn state(&self) -> GroupState {
        *self.state.read()
    }

    fn set_state(&self, state: GroupState) {
        *self.state.write() = state;
    }

    /// Cold-start pass: one rebuild, or one assignment per unkeyed document
    pub fn reconcile(&self) -> Result<ReconcilePlan> {
        self.set_state(GroupState::Reconciling);
        let result = self.plan_reconcile();
        self.set_state(if result.is_ok() { GroupState::Steady } else { GroupState::Cold });
        result
    }

    fn plan_reconcile(&self) -> Result<ReconcilePlan> {
        let missing_filter = Filter::missing(&self.group.sort_field);
        let total = self.store.count(&Filter::All)?;
        let missing = self.store.count(&missing_filter)?;

        if self.policy.should_rebuild(total, missing) {
            // Per-document jobs queued earlier are redundant once a rebuild is queued
            let purged = self.scheduler.purge(&self.group.id)?;
            self.scheduler.send(&self.group.id, PendingJob::RebuildAll)?;
            info!(group = %self.group.id, total, missing, purged, "queued full rebuild");
            return Ok(ReconcilePlan::Rebuild { purged });
        }

        let unkeyed = self
            .store
            .find_all(&missing_filter, &Projection::of(&[self.group.source_field.as_str()]))?;
        for doc in &unkeyed {
            let value = doc.get_field(&self.group.source_field).cloned().unwrap_or(FieldValue::Null);
            self.scheduler.send(&self.group.id, PendingJob::assign(doc.id, value))?;
        }
        info!(group = %self.group.id, total, missing, enqueued = unkeyed.len(), "queued incremental backfill");
        Ok(ReconcilePlan::Incremental { enqueued: unkeyed.len() })
    }

    pub fn on_create(&self, object_id: ObjectId, value: FieldValue) -> Result<()> {
        self.scheduler.send(&self.group.id, PendingJob::assign(object_id, value))
    }

    pub fn on_update(&self, object_id: ObjectId, old_key_present: bool, write: FieldWrite) -> Result<()> {
        match write {
            FieldWrite::Source(value) => {
                // A stale key must not anchor searches while the new one is pending
                if old_key_present {
                    self.store.update_field(object_id, &self.group.sort_field, FieldValue::Null)?;
                }
                self.scheduler.send(&self.group.id, PendingJob::assign(object_id, value))
            }
            FieldWrite::SortField | FieldWrite::Unrelated => Ok(()),
        }
    }

    /// Returns the number of documents queued for reassignment
    pub fn on_bulk_update(&self, filter: &Filter, write: FieldWrite) -> Result<usize> {
        let value = match write {
            FieldWrite::Source(value) => value,
            FieldWrite::SortField | FieldWrite::Unrelated => return Ok(0),
        };
        let sort_field = self.group.sort_field.as_str();
        let affected = self.store.find_all(filter, &Projection::of(&[sort_field]))?;
        for doc in &affected {
            if doc.sort_key(sort_field).is_some() {
                self.store.update_field(doc.id, sort_field, FieldValue::Null)?;
            }
        }
        for doc in &affected {
            self.scheduler.send(&self.group.id, PendingJob::assign(doc.id, value.clone()))?;
        }
        Ok(affected.len())
    }

    pub fn handle(&self, job: PendingJob) -> Result<()> {
        match job {
            PendingJob::AssignKey { object_id, .. } => self.assign_key(object_id).map(|_| ()),
            PendingJob::RebuildAll => self.rebuild().map(|_| ()),
        }
    }

    /// Locates the stored source value among keyed documents and writes a key
    /// between its neighbours.
    ///
    /// The value carried by a queued job may predate a later rename, so the
    /// document is re-read and its current source value is what gets placed.
    pub fn assign_key(&self, object_id: ObjectId) -> Result<AssignOutcome> {
        let started = Instant::now();
        let sort_field = self.group.sort_field.as_str();

        let current = self.store.find_all(
            &Filter::Ids(vec![object_id]),
            &Projection::of(&[self.group.source_field.as_str(), sort_field]),
        )?;
        let doc = match current.into_iter().next() {
            Some(doc) => doc,
            None => {
                debug!(group = %self.group.id, object_id = %object_id, "document gone, dropping job");
                return Ok(AssignOutcome::Dropped);
            }
        };
        let target = self.group.document_ref(&doc)?.value;

        // Redelivered jobs find their own earlier key; take it out of the search space.
        // A failure past this point leaves the document unkeyed until the job is redelivered.
        if doc.sort_key(sort_field).is_some() {
            self.store.update_field(object_id, sort_field, FieldValue::Null)?;
        }

        for attempt in 0..=self.collision_retry_limit {
            let bounds = locate(self.store.as_ref(), &self.group, &target)?;
            let key = self
                .group
                .keys
                .average(bounds.predecessor.as_ref(), bounds.successor.as_ref())?;

            if bounds.exact {
                self.store.update_field(object_id, sort_field, FieldValue::Key(key.clone()))?;
                self.keys_shared.fetch_add(1, Ordering::Relaxed);
                self.log_assigned(object_id, &key, bounds.probes, started, true);
                return Ok(AssignOutcome::Shared(key));
            }

            match self.store.set_key_if_unclaimed(object_id, sort_field, &key)? {
                WriteOutcome::Written => {
                    self.keys_assigned.fetch_add(1, Ordering::Relaxed);
                    self.log_assigned(object_id, &key, bounds.probes, started, false);
                    return Ok(AssignOutcome::Assigned(key));
                }
                WriteOutcome::Missing => return Ok(AssignOutcome::Dropped),
                WriteOutcome::Collision { holder } => {
                    if self.holds_equal_value(holder, &target)? {
                        self.store.update_field(object_id, sort_field, FieldValue::Key(key.clone()))?;
                        self.keys_shared.fetch_add(1, Ordering::Relaxed);
                        return Ok(AssignOutcome::Shared(key));
                    }
                    self.collisions.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        group = %self.group.id,
                        object_id = %object_id,
                        holder = %holder,
                        attempt,
                        "sort key collision, recomputing against fresh neighbours"
                    );
                }
            }
        }

        Err(Error::new(
            ErrorKind::Collision,
            format!(
                "{}: key for document {} still collides after {} retries",
                self.group.id, object_id, self.collision_retry_limit
            ),
        ))
    }

    fn holds_equal_value(&self, holder: ObjectId, target: &str) -> Result<bool> {
        let docs = self.store.find_all(
            &Filter::Ids(vec![holder]),
            &Projection::of(&[self.group.source_field.as_str()]),
        )?;
        match docs.first() {
            Some(doc) => {
                let value = self.group.document_ref(doc)?.value;
                Ok(self.group.compare(&value, target) == ValueOrder::Equal)
            }
            None => Ok(false),
        }
    }

    fn log_assigned(&self, object_id: ObjectId, key: &SortKey, probes: usize, started: Instant, shared: bool) {
        if self.quiet {
            return;
        }
        debug!(
            group = %self.group.id,
            object_id = %object_id,
            key = %key,
            probes,
            shared,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "assigned sort key"
        );
    }

    /// Rewrites every key of the group; holds the group for its whole duration
    pub fn rebuild(&self) -> Result<RebuildReport> {
        self.set_state(GroupState::Rebuilding);
        let result = rebuild_all(self.store.as_ref(), &self.group);
        self.set_state(GroupState::Steady);
        let report = result?;

        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        *self.last_rebuild.write() = Some(Utc::now());
        if !self.quiet {
            info!(
                group = %self.group.id,
                documents = report.documents,
                distinct_keys = report.distinct_keys,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "rebuilt sort keys"
            );
        }
        Ok(report)
    }

    pub fn stats(&self) -> GroupStats {
        GroupStats {
            group: self.group.id.clone(),
            state: self.state(),
            keys_assigned: self.keys_assigned.load(Ordering::Relaxed),
            keys_shared: self.keys_shared.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            last_rebuild: *self.last_rebuild.read(),
        }
    }
}
