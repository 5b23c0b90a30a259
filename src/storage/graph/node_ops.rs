use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, trace};

use super::eviction::EvictMode;
use super::{Graph, NodeEntry, NodeRef};
use crate::storage::adjacency::TrimStats;
use crate::storage::edge::Edge;
use crate::storage::node::{NodeBody, RESERVED_KEYS};
use crate::storage::value::Value;
use crate::types::{NodeId, Result, StoreError};

impl Graph {
    /// Creates a node of type `label` with the given initial properties.
    ///
    /// Reserved keys are ignored; any other key must be declared by the node
    /// type. The new node is dirty until first persisted, and its
    /// construction may evict other nodes when backpressure is configured.
    pub fn create_node(&self, label: &str, properties: &[(&str, Value)]) -> Result<NodeRef> {
        let layout = self
            .inner
            .schema
            .node(label)
            .cloned()
            .ok_or_else(|| StoreError::InvalidSchema(format!("unknown node type {label}")))?;
        let properties: Vec<&(&str, Value)> = properties
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(key))
            .collect();
        for (key, _) in &properties {
            if layout.property_position(key).is_none() {
                return Err(StoreError::UnknownProperty {
                    node_type: label.to_owned(),
                    key: (*key).to_owned(),
                });
            }
        }

        let id = NodeId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let body = NodeBody::new(id, Arc::clone(&layout));
        for (key, value) in &properties {
            body.set_property(key, value.clone())?;
        }
        body.mark_dirty();
        let entry = Arc::new(NodeEntry::new(id, layout, body));
        self.inner.entries.write().insert(id, Arc::clone(&entry));
        for (key, value) in &properties {
            if !value.is_null() {
                self.inner.indexes.put_if_indexed(key, value, id);
            }
        }
        self.inner.metrics.node_created();
        trace!(node = %id, label, "graph.create_node");

        let inner = &self.inner;
        inner
            .refs
            .notify_node_created(id, |candidate| inner.evict_entry(candidate, EvictMode::Pressure));
        Ok(NodeRef {
            graph: Arc::clone(&self.inner),
            entry,
        })
    }

    /// Handle to node `id`.
    pub fn node(&self, id: NodeId) -> Result<NodeRef> {
        self.inner.node_ref(id)
    }

    /// Handles to every node, ordered by id.
    pub fn nodes(&self) -> Vec<NodeRef> {
        let mut entries: Vec<Arc<NodeEntry>> = self.inner.entries.read().values().cloned().collect();
        entries.sort_by_key(|entry| entry.id);
        entries
            .into_iter()
            .map(|entry| NodeRef {
                graph: Arc::clone(&self.inner),
                entry,
            })
            .collect()
    }
}

impl NodeRef {
    /// Node property `key`, if declared and set.
    pub fn property(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.body()?.property(key))
    }

    /// Every set node property.
    pub fn property_map(&self) -> Result<BTreeMap<String, Value>> {
        Ok(self.body()?.property_map())
    }

    /// Sets node property `key` (`Value::Null` clears it) and notifies the
    /// graph index under the node's write lock, so concurrent writers leave
    /// the index and the body holding the same value. Returns the previous
    /// value.
    pub fn set_property(&self, key: &str, value: Value) -> Result<Option<Value>> {
        let id = self.id();
        let indexes = &self.graph.indexes;
        self.body()?
            .set_property_with(key, value, |value| indexes.put_if_indexed(key, value, id))
    }

    /// Clears node property `key`, returning the removed value.
    pub fn remove_property(&self, key: &str) -> Result<Option<Value>> {
        self.set_property(key, Value::Null)
    }

    /// Repacks the node's adjacency buffer with zero slack.
    pub fn trim(&self) -> Result<TrimStats> {
        let stats = self.body()?.trim();
        self.graph.metrics.buffer_trimmed(stats.old_len, stats.new_len);
        debug!(node = %self.id(), old_len = stats.old_len, new_len = stats.new_len, "graph.trim");
        Ok(stats)
    }

    /// Removes the node: every incident edge is removed from both endpoints,
    /// the index and external storage forget it, and the handle (like every
    /// other handle to it) becomes stale.
    pub fn remove(&self) -> Result<()> {
        let id = self.id();
        let body = self.body()?;
        let mut removed_edges = 0usize;
        for block in self.layout().blocks() {
            let label = block.edge.label();
            let strides: Vec<_> = body.strides(block.direction, label).collect();
            for stride in strides {
                let other = self.graph.node_ref(stride.node)?;
                Edge::from_side(label, self.clone(), block.direction, stride.block_offset, other).remove()?;
                removed_edges += 1;
            }
        }

        self.graph.indexes.remove_element(id);
        body.mark_dirty();
        self.entry.removed.store(true, Ordering::Release);
        *self.entry.body.write() = None;
        self.graph.entries.write().remove(&id);
        self.graph.refs.forget(id);
        self.graph.storage.remove_node(id)?;
        self.graph.metrics.node_removed();
        debug!(node = %id, removed_edges, "graph.remove_node");
        Ok(())
    }
}
