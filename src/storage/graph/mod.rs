use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use super::backend::{ExternalStorage, GraphIndex};
use super::layout::{NodeLayout, Schema};
use super::metrics::{default_metrics, StorageMetrics};
use super::node::NodeBody;
use super::options::GraphOptions;
use crate::types::{NodeId, Result, StoreError};

mod adjacency_ops;
mod edge_ops;
mod eviction;
mod node_ops;

pub use adjacency_ops::{AdjacentNodes, Edges};

use eviction::{EvictMode, EvictOutcome, ReferenceManager};

/// Registry of nodes sharing one schema, storage backend and index.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

pub(crate) struct GraphInner {
    schema: Arc<Schema>,
    entries: RwLock<FxHashMap<NodeId, Arc<NodeEntry>>>,
    next_id: AtomicU64,
    storage: Arc<dyn ExternalStorage>,
    indexes: Arc<dyn GraphIndex>,
    metrics: Arc<dyn StorageMetrics>,
    refs: ReferenceManager,
}

/// Identity of a node plus its (possibly evicted) body. Bodies never point
/// back at their entry.
pub(crate) struct NodeEntry {
    id: NodeId,
    layout: Arc<NodeLayout>,
    body: RwLock<Option<Arc<NodeBody>>>,
    removed: AtomicBool,
}

/// Handle to a node. Survives eviction of the node's body, which is
/// reloaded on next access. Equality and hashing use the node id only.
#[derive(Clone)]
pub struct NodeRef {
    graph: Arc<GraphInner>,
    entry: Arc<NodeEntry>,
}

impl Graph {
    /// Opens an empty graph.
    pub fn open(opts: GraphOptions) -> Self {
        let GraphOptions {
            schema,
            storage,
            indexes,
            metrics,
            max_resident_nodes,
            eviction_batch,
        } = opts;
        info!(?max_resident_nodes, eviction_batch, "graph.open");
        Self {
            inner: Arc::new(GraphInner {
                schema,
                entries: RwLock::new(FxHashMap::default()),
                next_id: AtomicU64::new(1),
                storage,
                indexes,
                metrics: metrics.unwrap_or_else(default_metrics),
                refs: ReferenceManager::new(max_resident_nodes, eviction_batch),
            }),
        }
    }

    /// Schema the graph was opened with.
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// Metrics sink in use.
    pub fn metrics(&self) -> &Arc<dyn StorageMetrics> {
        &self.inner.metrics
    }

    /// Number of nodes in the registry, resident or not.
    pub fn node_count(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Number of node bodies currently held in memory.
    pub fn resident_count(&self) -> usize {
        self.inner
            .entries
            .read()
            .values()
            .filter(|entry| entry.body.read().is_some())
            .count()
    }

    /// Persists every resident dirty node and marks it clean. Returns the
    /// number of nodes written.
    pub fn flush(&self) -> Result<usize> {
        let entries: Vec<Arc<NodeEntry>> = self.inner.entries.read().values().cloned().collect();
        let mut flushed = 0;
        for entry in entries {
            let body = entry.body.read().clone();
            if let Some(body) = body {
                if self.inner.flush_body(&body)? {
                    flushed += 1;
                }
            }
        }
        info!(flushed, "graph.flush");
        Ok(flushed)
    }

    /// Drops the body of `id` from memory. Fails with
    /// [`StoreError::DirtyEviction`] when the node has unpersisted
    /// mutations; returns `false` when the body is not resident or is
    /// borrowed by another caller.
    pub fn evict(&self, id: NodeId) -> Result<bool> {
        self.inner.entry(id)?;
        let outcome = self.inner.evict_entry(id, EvictMode::Explicit)?;
        if outcome == EvictOutcome::Evicted {
            self.inner.refs.forget(id);
        }
        Ok(outcome == EvictOutcome::Evicted)
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.node_count())
            .field("resident", &self.inner.refs.len())
            .finish()
    }
}

impl GraphInner {
    fn entry(&self, id: NodeId) -> Result<Arc<NodeEntry>> {
        self.entries
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NodeNotFound(id))
    }

    fn node_ref(self: &Arc<Self>, id: NodeId) -> Result<NodeRef> {
        Ok(NodeRef {
            graph: Arc::clone(self),
            entry: self.entry(id)?,
        })
    }

    fn flush_body(&self, body: &NodeBody) -> Result<bool> {
        let flushed = body.flush_with(|image| self.storage.persist_node(image))?;
        if flushed {
            self.metrics.node_flushed();
            debug!(node = %body.id(), "graph.flush_node");
        }
        Ok(flushed)
    }

    /// Resident body of `entry`, reloading it from external storage when it
    /// was evicted. A reload counts as a construction for backpressure.
    fn body_of(&self, entry: &NodeEntry) -> Result<Arc<NodeBody>> {
        if entry.removed.load(Ordering::Acquire) {
            return Err(StoreError::NodeRemoved(entry.id));
        }
        if let Some(body) = entry.body.read().as_ref() {
            self.refs.touch(entry.id);
            return Ok(Arc::clone(body));
        }
        let body = {
            let mut slot = entry.body.write();
            if let Some(body) = slot.as_ref() {
                return Ok(Arc::clone(body));
            }
            if entry.removed.load(Ordering::Acquire) {
                return Err(StoreError::NodeRemoved(entry.id));
            }
            let image = self
                .storage
                .load_node(entry.id)?
                .ok_or(StoreError::NodeNotFound(entry.id))?;
            if image.id != entry.id {
                return Err(StoreError::Corruption("stored image belongs to another node"));
            }
            let body = Arc::new(NodeBody::from_image(Arc::clone(&entry.layout), image)?);
            *slot = Some(Arc::clone(&body));
            body
        };
        self.metrics.node_loaded();
        debug!(node = %entry.id, label = entry.layout.label(), "graph.reload");
        self.refs
            .notify_node_created(entry.id, |candidate| self.evict_entry(candidate, EvictMode::Pressure));
        Ok(body)
    }
}

impl NodeEntry {
    fn new(id: NodeId, layout: Arc<NodeLayout>, body: NodeBody) -> Self {
        Self {
            id,
            layout,
            body: RwLock::new(Some(Arc::new(body))),
            removed: AtomicBool::new(false),
        }
    }
}

impl NodeRef {
    /// Node id.
    pub fn id(&self) -> NodeId {
        self.entry.id
    }

    /// Node type label.
    pub fn label(&self) -> &str {
        self.entry.layout.label()
    }

    /// Layout of the node type.
    pub fn layout(&self) -> &Arc<NodeLayout> {
        &self.entry.layout
    }

    /// Resolves the node body, reloading it if it was evicted.
    pub fn body(&self) -> Result<Arc<NodeBody>> {
        self.graph.body_of(&self.entry)
    }

    /// Whether the body is currently in memory.
    pub fn is_resident(&self) -> bool {
        self.entry.body.read().is_some()
    }

    /// Whether the node was removed from the graph.
    pub fn is_removed(&self) -> bool {
        self.entry.removed.load(Ordering::Acquire)
    }

    /// Whether the node has unpersisted mutations. Evicted nodes are clean.
    pub fn is_dirty(&self) -> bool {
        self.entry
            .body
            .read()
            .as_ref()
            .is_some_and(|body| body.is_dirty())
    }

    pub(crate) fn metrics(&self) -> &dyn StorageMetrics {
        self.graph.metrics.as_ref()
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.label(), self.id())
    }
}
