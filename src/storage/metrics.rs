use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hooks for counting adjacency storage activity.
///
/// Implementations must be cheap: every hook is invoked on the hot path,
/// outside node body locks.
pub trait StorageMetrics: Send + Sync {
    /// Records the construction of a new node.
    fn node_created(&self);

    /// Records the removal of a node from the graph.
    fn node_removed(&self);

    /// Records a node body being reloaded from external storage.
    fn node_loaded(&self);

    /// Records a node body being dropped from memory.
    fn node_evicted(&self);

    /// Records a dirty node body being persisted.
    fn node_flushed(&self);

    /// Records the creation of a new edge (both sides written).
    fn edge_created(&self);

    /// Records the removal of an edge (both sides turned into holes).
    fn edge_removed(&self);

    /// Records a buffer growth.
    ///
    /// # Parameters
    /// * `additional` - Slots added to the buffer.
    fn buffer_grown(&self, additional: usize);

    /// Records a trim with the buffer length before and after.
    fn buffer_trimmed(&self, old_len: usize, new_len: usize);

    /// Records an adjacency scan.
    ///
    /// # Parameters
    /// * `direction` - "out" or "in".
    fn adjacency_scan(&self, direction: &'static str);
}

/// A [`StorageMetrics`] implementation that discards everything.
#[derive(Default)]
pub struct NoopMetrics;

impl StorageMetrics for NoopMetrics {
    fn node_created(&self) {}
    fn node_removed(&self) {}
    fn node_loaded(&self) {}
    fn node_evicted(&self) {}
    fn node_flushed(&self) {}
    fn edge_created(&self) {}
    fn edge_removed(&self) {}
    fn buffer_grown(&self, _additional: usize) {}
    fn buffer_trimmed(&self, _old_len: usize, _new_len: usize) {}
    fn adjacency_scan(&self, _direction: &'static str) {}
}

/// [`StorageMetrics`] sink keeping one relaxed atomic counter per event.
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of nodes created.
    pub nodes_created: AtomicU64,

    /// Number of nodes removed.
    pub nodes_removed: AtomicU64,

    /// Number of node bodies reloaded.
    pub nodes_loaded: AtomicU64,

    /// Number of node bodies evicted.
    pub nodes_evicted: AtomicU64,

    /// Number of dirty node bodies persisted.
    pub nodes_flushed: AtomicU64,

    /// Number of edges created.
    pub edges_created: AtomicU64,

    /// Number of edges removed.
    pub edges_removed: AtomicU64,

    /// Number of buffer growths.
    pub growths: AtomicU64,

    /// Total slots added by growth.
    pub slots_grown: AtomicU64,

    /// Total slots reclaimed by trim.
    pub slots_trimmed: AtomicU64,

    /// OUT-side block scans.
    pub adjacency_scans_out: AtomicU64,

    /// IN-side block scans.
    pub adjacency_scans_in: AtomicU64,
}

/// Point-in-time copy of a [`CounterMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub nodes_created: u64,
    pub nodes_removed: u64,
    pub nodes_loaded: u64,
    pub nodes_evicted: u64,
    pub nodes_flushed: u64,
    pub edges_created: u64,
    pub edges_removed: u64,
    pub growths: u64,
    pub slots_grown: u64,
    pub slots_trimmed: u64,
    pub adjacency_scans_out: u64,
    pub adjacency_scans_in: u64,
}

impl CounterMetrics {
    /// Reads every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            nodes_created: load(&self.nodes_created),
            nodes_removed: load(&self.nodes_removed),
            nodes_loaded: load(&self.nodes_loaded),
            nodes_evicted: load(&self.nodes_evicted),
            nodes_flushed: load(&self.nodes_flushed),
            edges_created: load(&self.edges_created),
            edges_removed: load(&self.edges_removed),
            growths: load(&self.growths),
            slots_grown: load(&self.slots_grown),
            slots_trimmed: load(&self.slots_trimmed),
            adjacency_scans_out: load(&self.adjacency_scans_out),
            adjacency_scans_in: load(&self.adjacency_scans_in),
        }
    }
}

impl StorageMetrics for CounterMetrics {
    fn node_created(&self) {
        self.nodes_created.fetch_add(1, Ordering::Relaxed);
    }

    fn node_removed(&self) {
        self.nodes_removed.fetch_add(1, Ordering::Relaxed);
    }

    fn node_loaded(&self) {
        self.nodes_loaded.fetch_add(1, Ordering::Relaxed);
    }

    fn node_evicted(&self) {
        self.nodes_evicted.fetch_add(1, Ordering::Relaxed);
    }

    fn node_flushed(&self) {
        self.nodes_flushed.fetch_add(1, Ordering::Relaxed);
    }

    fn edge_created(&self) {
        self.edges_created.fetch_add(1, Ordering::Relaxed);
    }

    fn edge_removed(&self) {
        self.edges_removed.fetch_add(1, Ordering::Relaxed);
    }

    fn buffer_grown(&self, additional: usize) {
        self.growths.fetch_add(1, Ordering::Relaxed);
        self.slots_grown.fetch_add(additional as u64, Ordering::Relaxed);
    }

    fn buffer_trimmed(&self, old_len: usize, new_len: usize) {
        let reclaimed = old_len.saturating_sub(new_len) as u64;
        self.slots_trimmed.fetch_add(reclaimed, Ordering::Relaxed);
    }

    fn adjacency_scan(&self, direction: &'static str) {
        match direction {
            "out" => {
                self.adjacency_scans_out.fetch_add(1, Ordering::Relaxed);
            }
            "in" => {
                self.adjacency_scans_in.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}

/// Sink used when no metrics are configured.
pub fn default_metrics() -> Arc<dyn StorageMetrics> {
    Arc::new(NoopMetrics)
}
