//! Worker pool management.
//!
//! # Responsibilities
//! - Hold the ordered workers of one balancer
//! - Build every configured balancer at load time
//! - Look up balancers by name for routing and the admin API

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::BalancerConfig;
use crate::load_balancer::worker::Worker;

/// An ordered set of workers behind one balancer name.
///
/// Declaration order matters: exact ties go to the earlier worker.
#[derive(Debug)]
pub struct WorkerPool {
    pub name: String,
    pub workers: Vec<Arc<Worker>>,
}

impl WorkerPool {
    pub fn new(name: impl Into<String>, workers: Vec<Arc<Worker>>) -> Self {
        Self {
            name: name.into(),
            workers,
        }
    }

    /// Build a pool from configuration. Workers with an unusable URL are
    /// left out with a warning.
    pub fn from_config(config: &BalancerConfig) -> Self {
        let mut workers = Vec::with_capacity(config.workers.len());
        for worker_config in &config.workers {
            match Worker::from_config(worker_config) {
                Ok(worker) => workers.push(Arc::new(worker)),
                Err(e) => {
                    tracing::warn!(balancer = %config.name, error = %e, "Skipping invalid worker");
                }
            }
        }
        Self::new(config.name.clone(), workers)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn worker(&self, index: usize) -> Option<&Arc<Worker>> {
        self.workers.get(index)
    }
}

/// All balancers of the running configuration, by name.
#[derive(Debug, Default)]
pub struct BalancerRegistry {
    pools: HashMap<String, Arc<WorkerPool>>,
}

impl BalancerRegistry {
    /// Create the registry from configuration. Counters start from zero.
    pub fn new(configs: &[BalancerConfig]) -> Self {
        let mut pools = HashMap::new();
        for config in configs {
            let pool = WorkerPool::from_config(config);
            tracing::info!(balancer = %pool.name, workers = pool.len(), "Balancer ready");
            pools.insert(config.name.clone(), Arc::new(pool));
        }
        Self { pools }
    }

    pub fn get(&self, name: &str) -> Option<Arc<WorkerPool>> {
        self.pools.get(name).cloned()
    }

    /// All pools, sorted by name.
    pub fn pools(&self) -> Vec<Arc<WorkerPool>> {
        let mut pools: Vec<_> = self.pools.values().cloned().collect();
        pools.sort_by(|a, b| a.name.cmp(&b.name));
        pools
    }
}
