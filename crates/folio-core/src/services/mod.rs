//! Use-case services over the repository ports.

pub mod activity;
pub mod counters;
pub mod integrity;
pub mod likes;
pub mod locks;
pub mod store;

use std::sync::Arc;

pub use activity::{ActivityAggregator, ActivityConfig, merge_desc};
pub use counters::{CounterMaintenance, ReconcileReport};
pub use integrity::{CascadePlan, IntegrityManager};
pub use likes::LikeToggle;
pub use locks::KeyedLocks;
pub use store::{ContentStore, PostDetail};

use crate::ports::{ContentRepository, UserRepository};
use crate::query::{QueryBuilder, QueryLimits};

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    pub limits: QueryLimits,
    pub activity: ActivityConfig,
}

/// All services wired over one pair of repositories.
#[derive(Clone)]
pub struct ContentEngine {
    pub store: ContentStore,
    pub likes: LikeToggle,
    pub activity: ActivityAggregator,
    pub counters: CounterMaintenance,
}

impl ContentEngine {
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        users: Arc<dyn UserRepository>,
        config: EngineConfig,
    ) -> Self {
        let counters = CounterMaintenance::new(repo.clone());
        let store = ContentStore::new(
            repo.clone(),
            users.clone(),
            IntegrityManager::new(repo.clone()),
            counters.clone(),
            QueryBuilder::new(config.limits),
        );
        Self {
            store,
            likes: LikeToggle::new(repo.clone(), users.clone(), counters.clone()),
            activity: ActivityAggregator::new(repo, users, config.activity),
            counters,
        }
    }
}
