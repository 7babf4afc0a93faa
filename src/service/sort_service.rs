use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::RwLock;
use tracing::{info, warn};
use crate::core::config::{Config, GroupOptions};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::ServiceStats;
use crate::core::types::{Document, FieldValue, GroupId, ObjectId};
use crate::group::comparator::Comparator;
use crate::group::field_group::FieldGroup;
use crate::group::orchestrator::{FieldWrite, Orchestrator, ReconcilePlan};
use crate::queue::group_queue::GroupQueue;
use crate::queue::job::PendingJob;
use crate::queue::scheduler::{ConsumerHandle, GroupScheduler, JobHandler};
use crate::rebuild::engine::RebuildReport;
use crate::storage::store::{DocumentStore, Filter};

/// Routes delivered jobs to the orchestrator of their group
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<GroupId, Arc<Orchestrator>>>,
}

impl GroupRegistry {
    pub fn get(&self, id: &GroupId) -> Option<Arc<Orchestrator>> {
        self.groups.read().get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<Orchestrator>> {
        let mut groups: Vec<_> = self.groups.read().values().cloned().collect();
        groups.sort_by(|a, b| a.id().cmp(b.id()));
        groups
    }
}

impl JobHandler for GroupRegistry {
    fn handle(&self, group: &GroupId, job: PendingJob) -> Result<()> {
        match self.get(group) {
            Some(orchestrator) => orchestrator.handle(job),
            None => {
                // Leftover job of a group that is no longer registered
                warn!(group = %group, "no field group registered for job, discarding");
                Ok(())
            }
        }
    }
}

/// Process-wide entry point: one store, one scheduler, many field groups
pub struct SortService {
    config: Config,
    store: Arc<dyn DocumentStore>,
    scheduler: Arc<GroupScheduler>,
    registry: Arc<GroupRegistry>,
}

impl SortService {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>, queue: Arc<dyn GroupQueue>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::new(ErrorKind::Registration, e.context))?;
        let scheduler = Arc::new(GroupScheduler::new(queue, &config));
        Ok(SortService {
            config,
            store,
            scheduler,
            registry: Arc::new(GroupRegistry::default()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<GroupScheduler> {
        &self.scheduler
    }

    /// Registering the same mapping twice returns the existing group id; the first
    /// registration's comparator and options stay in effect
    pub fn register_field_group(
        &self,
        collection: &str,
        source_field: &str,
        sort_field: &str,
        comparator: Arc<dyn Comparator>,
        options: GroupOptions,
    ) -> Result<GroupId> {
        let group = FieldGroup::new(collection, source_field, sort_field, comparator, &self.config, &options)?;
        let id = group.id.clone();

        let mut groups = self.registry.groups.write();
        if let Some(existing) = groups.get(&id) {
            if !existing.group().same_settings(&group) {
                warn!(
                    group = %id,
                    registered = ?existing.group(),
                    ignored = ?group,
                    "field group already registered with different options, keeping the original"
                );
            }
            return Ok(id);
        }
        if let Some(clash) = groups
            .values()
            .find(|o| o.group().collection == collection && o.group().sort_field == sort_field)
        {
            return Err(Error::new(
                ErrorKind::Registration,
                format!("sort field '{}' of '{}' is already maintained by {}", sort_field, collection, clash.id()),
            ));
        }
        let orchestrator = Orchestrator::new(group, self.store.clone(), self.scheduler.clone(), &self.config);
        groups.insert(id.clone(), Arc::new(orchestrator));
        info!(group = %id, "registered field group");
        Ok(id)
    }

    pub fn group(&self, id: &GroupId) -> Result<Arc<Orchestrator>> {
        self.registry
            .get(id)
            .ok_or_else(|| Error::new(ErrorKind::Registration, format!("field group {} is not registered", id)))
    }

    pub fn groups(&self) -> Vec<Arc<Orchestrator>> {
        self.registry.all()
    }

    pub fn on_create(&self, id: &GroupId, object_id: ObjectId, value: FieldValue) -> Result<()> {
        self.group(id)?.on_create(object_id, value)
    }

    pub fn on_update(&self, id: &GroupId, object_id: ObjectId, old_key_present: bool, write: FieldWrite) -> Result<()> {
        self.group(id)?.on_update(object_id, old_key_present, write)
    }

    pub fn on_bulk_update(&self, id: &GroupId, filter: &Filter, write: FieldWrite) -> Result<usize> {
        self.group(id)?.on_bulk_update(filter, write)
    }

    /// Fans a newly stored document out to every group of its collection
    pub fn on_document_created(&self, collection: &str, doc: &Document) -> Result<usize> {
        let mut notified = 0;
        for orchestrator in self.registry.all() {
            let group = orchestrator.group();
            if group.collection != collection {
                continue;
            }
            let value = doc.get_field(&group.source_field).cloned().unwrap_or(FieldValue::Null);
            orchestrator.on_create(doc.id, value)?;
            notified += 1;
        }
        Ok(notified)
    }

    /// Cold-start reconciliation of every registered group
    pub fn reconcile_all(&self) -> Result<Vec<(GroupId, ReconcilePlan)>> {
        self.registry
            .all()
            .into_iter()
            .map(|o| o.reconcile().map(|plan| (o.id().clone(), plan)))
            .collect()
    }

    pub fn start(&self) -> Result<ConsumerHandle> {
        let handler: Arc<dyn JobHandler> = self.registry.clone();
        self.scheduler.consume(handler, self.config.consumer_concurrency)
    }

    /// Synchronous rebuild outside the queue; callers must not run consumers for this group meanwhile
    pub fn rebuild_now(&self, id: &GroupId) -> Result<RebuildReport> {
        self.group(id)?.rebuild()
    }

    pub fn pending_count(&self) -> Result<usize> {
        self.scheduler.pending_count()
    }

    pub fn wait_idle(&self, timeout: Duration) -> Result<bool> {
        self.scheduler.wait_idle(timeout)
    }

    pub fn stats(&self) -> Result<ServiceStats> {
        Ok(ServiceStats {
            groups: self.registry.all().iter().map(|o| o.stats()).collect(),
            scheduler: self.scheduler.stats()?,
        })
    }
}
