pub mod core;
pub mod key;
pub mod storage;
pub mod group;
pub mod locate;
pub mod rebuild;
pub mod queue;
pub mod service;

pub use crate::core::config::{Config, GroupOptions};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{Document, FieldValue, GroupId, ObjectId};
pub use crate::group::comparator::{Comparator, PlainText};
pub use crate::group::orchestrator::{FieldWrite, GroupState, ReconcilePlan};
pub use crate::key::sort_key::SortKey;
pub use crate::queue::job::PendingJob;
pub use crate::service::sort_service::SortService;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                            SORTFIELD STRUCT ARCHITECTURE                                    │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── SERVICE LAYER ──────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                              struct SortService                                     │    │
│  │  config: Config                      // radix, rebuild policy, worker settings     │    │
│  │  store: Arc<dyn DocumentStore>       // backing store adapter                      │    │
│  │  scheduler: Arc<GroupScheduler>      // group-serialized job queue                 │    │
│  │  registry: Arc<GroupRegistry>        // GroupId -> Orchestrator, JobHandler        │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── GROUP LAYER ────────────────────────────────────────┐
│                                                                                              │
│  struct Orchestrator                         struct FieldGroup                               │
│    group: FieldGroup                           id: GroupId  "collection::source::sort"       │
│    store / scheduler (shared)                  comparator: Arc<dyn Comparator>               │
│    policy: RebuildPolicy                       case_insensitive: bool                        │
│    state: Cold|Reconciling|Steady|Rebuilding   keys: KeySpace                                │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────── ALGORITHM LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  KeySpace::average/half/add      Locator::locate                rebuild_all                  │
│  (fractional digit strings,      (rank-based binary search,     (sort once, evenly spaced    │
│   saturation growth)              O(log n) decrypts)             keys, equal values share)   │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────── ADAPTER LAYER ───────────────────────────────────────────┐
│                                                                                              │
│  trait DocumentStore ──impl──> MemoryStore                                                   │
│  trait GroupQueue    ──impl──> MemoryGroupQueue (one lease per group, visibility timeout)    │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────── RELATIONSHIPS ────────────────────────────────────────────┐
│                                                                                              │
│  write notification ──> Orchestrator::on_* ──send──> GroupScheduler ──> GroupQueue          │
│                                                                                              │
│  worker thread ──receive──> GroupQueue ──delivers──> GroupRegistry ──routes──> Orchestrator │
│                                                          │                                  │
│                          AssignKey ──> Locator ──> KeySpace::average ──> conditional write  │
│                          RebuildAll ──> rebuild_all ──> update_field per document          │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
