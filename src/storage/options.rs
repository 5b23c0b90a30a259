use std::sync::Arc;

use super::backend::{ExternalStorage, GraphIndex, MemoryStorage, NoopIndex};
use super::layout::Schema;
use super::metrics::StorageMetrics;

/// Default number of nodes evicted per backpressure pass.
pub const DEFAULT_EVICTION_BATCH: usize = 64;

/// Configuration options supplied when opening a [`super::Graph`].
#[derive(Clone)]
pub struct GraphOptions {
    /// Node and edge layouts.
    pub schema: Arc<Schema>,
    /// Where evicted and flushed node bodies are persisted.
    pub storage: Arc<dyn ExternalStorage>,
    /// Graph-wide index notified of property changes and node removal.
    pub indexes: Arc<dyn GraphIndex>,
    /// Optional metrics collection implementation
    pub metrics: Option<Arc<dyn StorageMetrics>>,
    /// Resident node bodies tolerated before backpressure evicts; `None`
    /// disables backpressure.
    pub max_resident_nodes: Option<usize>,
    /// Maximum number of bodies evicted by one backpressure pass.
    pub eviction_batch: usize,
}

impl GraphOptions {
    /// Creates options with in-memory storage, no index and no eviction.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
            storage: Arc::new(MemoryStorage::new()),
            indexes: Arc::new(NoopIndex),
            metrics: None,
            max_resident_nodes: None,
            eviction_batch: DEFAULT_EVICTION_BATCH,
        }
    }

    /// Sets the external storage backend.
    pub fn storage(mut self, storage: Arc<dyn ExternalStorage>) -> Self {
        self.storage = storage;
        self
    }

    /// Sets the graph-wide index.
    pub fn indexes(mut self, indexes: Arc<dyn GraphIndex>) -> Self {
        self.indexes = indexes;
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn StorageMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enables backpressure once more than `max` bodies are resident.
    pub fn max_resident_nodes(mut self, max: usize) -> Self {
        self.max_resident_nodes = Some(max);
        self
    }

    /// Sets the per-pass eviction limit (at least one).
    pub fn eviction_batch(mut self, batch: usize) -> Self {
        self.eviction_batch = batch.max(1);
        self
    }
}
