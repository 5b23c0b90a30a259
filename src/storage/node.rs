//! Per-node storage engine.
//!
//! A [`NodeBody`] owns the offset table and adjacency buffer of one node
//! (see [`Adjacency`] for how snapshots share it), its scalar properties and
//! its dirty flag. Every mutation takes the node's write lock; readers only
//! hold the read lock long enough to clone the current snapshot, so a growth
//! that reallocates the buffer is published atomically.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::adjacency::{Adjacency, Insertion, Strides, TrimStats};
use super::image::NodeImage;
use super::layout::NodeLayout;
use super::offsets::OffsetTable;
use super::value::Value;
use crate::types::{Direction, NodeId, Result, StoreError};

/// Property keys carried by element-construction key/value lists that are
/// never stored as edge properties.
pub const RESERVED_KEYS: [&str; 2] = ["~id", "~label"];

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

#[derive(Debug)]
struct NodeState {
    adjacency: Adjacency,
    properties: Vec<Option<Value>>,
}

/// A stride validated against the layout but not yet written.
#[derive(Clone, Debug)]
pub(crate) struct PendingStride {
    layout: Arc<NodeLayout>,
    block: usize,
    properties: Vec<(usize, Value)>,
}

/// In-memory body of one node.
#[derive(Debug)]
pub struct NodeBody {
    id: NodeId,
    layout: Arc<NodeLayout>,
    state: RwLock<NodeState>,
    dirty: AtomicBool,
}

impl NodeBody {
    /// Fresh, clean body: all-zero offset table, empty buffer, no properties.
    pub fn new(id: NodeId, layout: Arc<NodeLayout>) -> Self {
        let state = NodeState {
            adjacency: Adjacency::new(layout.block_count()),
            properties: vec![None; layout.property_keys().len()],
        };
        Self {
            id,
            layout,
            state: RwLock::new(state),
            dirty: AtomicBool::new(false),
        }
    }

    /// Rebuilds a clean body from a persisted image.
    pub fn from_image(layout: Arc<NodeLayout>, image: NodeImage) -> Result<Self> {
        if image.label != layout.label() {
            return Err(StoreError::Corruption("node image label does not match layout"));
        }
        if image.offsets.len() != 2 * layout.block_count() {
            return Err(StoreError::Corruption("offset table size does not match layout"));
        }
        if image.properties.len() != layout.property_keys().len() {
            return Err(StoreError::Corruption("property count does not match layout"));
        }
        let offsets = OffsetTable::from_entries(&image.offsets)?;
        let adjacency = Adjacency::from_parts(&layout, offsets, image.slots)?;
        debug!(node = %image.id, label = layout.label(), slots = adjacency.capacity(), "node.from_image");
        Ok(Self {
            id: image.id,
            layout,
            state: RwLock::new(NodeState {
                adjacency,
                properties: image.properties,
            }),
            dirty: AtomicBool::new(false),
        })
    }

    /// Snapshot of the current offset table, buffer and properties.
    pub fn image(&self) -> NodeImage {
        let state = self.state.read();
        Self::image_of(self.id, &self.layout, &state)
    }

    fn image_of(id: NodeId, layout: &NodeLayout, state: &NodeState) -> NodeImage {
        NodeImage {
            id,
            label: layout.label().to_owned(),
            offsets: state.adjacency.offsets().to_entries(),
            slots: state.adjacency.to_slots(),
            properties: state.properties.clone(),
        }
    }

    /// Node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node type label.
    pub fn label(&self) -> &str {
        self.layout.label()
    }

    /// Layout the body was built against.
    pub fn layout(&self) -> &Arc<NodeLayout> {
        &self.layout
    }

    /// Current adjacency snapshot. Its shape is fixed; in-place writes to
    /// strides it covers stay visible until the next growth or trim.
    pub fn adjacency(&self) -> Adjacency {
        self.state.read().adjacency.clone()
    }

    /// Whether the body has mutations not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Flags the body as having unpersisted mutations.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Records that the current state has been persisted.
    pub fn mark_clean(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Hands the current image to `persist` while mutations are held off and
    /// marks the body clean on success. Returns `false` when already clean.
    pub fn flush_with<F>(&self, persist: F) -> Result<bool>
    where
        F: FnOnce(&NodeImage) -> Result<()>,
    {
        let state = self.state.write();
        if !self.is_dirty() {
            return Ok(false);
        }
        persist(&Self::image_of(self.id, &self.layout, &state))?;
        self.mark_clean();
        Ok(true)
    }

    fn block_for(&self, direction: Direction, label: &str) -> Result<usize> {
        self.layout.require_position(direction, label)
    }

    /// Validates an insertion into the (direction, label) block without
    /// writing anything. Reserved keys are dropped; any other undeclared
    /// key fails with [`StoreError::UnknownEdgeProperty`].
    pub(crate) fn prepare_insert(
        &self,
        direction: Direction,
        label: &str,
        properties: &[(&str, Value)],
    ) -> Result<PendingStride> {
        let block = self.block_for(direction, label)?;
        let edge = &self.layout.block(block).edge;
        let mut resolved = Vec::with_capacity(properties.len());
        for (key, value) in properties {
            if is_reserved(key) {
                continue;
            }
            let offset = edge
                .property_offset(key)
                .ok_or_else(|| StoreError::UnknownEdgeProperty {
                    label: label.to_owned(),
                    key: (*key).to_owned(),
                })?;
            resolved.push((offset, value.clone()));
        }
        Ok(PendingStride {
            layout: Arc::clone(&self.layout),
            block,
            properties: resolved,
        })
    }

    /// Writes a stride prepared by [`NodeBody::prepare_insert`] referencing
    /// `other`, then marks the body dirty.
    pub(crate) fn apply_insert(&self, pending: &PendingStride, other: NodeId) -> Result<Insertion> {
        if !Arc::ptr_eq(&pending.layout, &self.layout) {
            return Err(StoreError::integrity(format!(
                "stride prepared for {} applied to {}",
                pending.layout.label(),
                self.layout.label()
            )));
        }
        let mut state = self.state.write();
        let insertion = state
            .adjacency
            .insert(&self.layout, pending.block, other, &pending.properties)?;
        self.mark_dirty();
        Ok(insertion)
    }

    /// Single-sided insertion: appends a stride referencing `other` to the
    /// (direction, label) block.
    pub fn add_adjacent(
        &self,
        direction: Direction,
        label: &str,
        other: NodeId,
        properties: &[(&str, Value)],
    ) -> Result<Insertion> {
        let pending = self.prepare_insert(direction, label, properties)?;
        self.apply_insert(&pending, other)
    }

    /// Turns the stride at `block_offset` into a hole. Returns whether it was
    /// occupied.
    pub fn remove_adjacent(&self, direction: Direction, label: &str, block_offset: usize) -> Result<bool> {
        let block = self.block_for(direction, label)?;
        let mut state = self.state.write();
        let removed = state.adjacency.remove(&self.layout, block, block_offset)?;
        self.mark_dirty();
        Ok(removed)
    }

    /// Adjacent node of the stride at `block_offset`, or `None` for holes,
    /// invalid offsets and undeclared (direction, label) pairs.
    pub fn adjacent_node(&self, direction: Direction, label: &str, block_offset: usize) -> Option<NodeId> {
        let block = self.layout.position(direction, label)?;
        self.state.read().adjacency.adjacent_node(&self.layout, block, block_offset)
    }

    /// Edge property `key` of the stride at `block_offset`; absent rather than
    /// an error for every kind of miss.
    pub fn edge_property(&self, direction: Direction, label: &str, block_offset: usize, key: &str) -> Option<Value> {
        let block = self.layout.position(direction, label)?;
        self.state
            .read()
            .adjacency
            .property(&self.layout, block, block_offset, key)
    }

    /// Every set edge property of the stride at `block_offset`.
    pub fn edge_property_map(&self, direction: Direction, label: &str, block_offset: usize) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        let Some(block) = self.layout.position(direction, label) else {
            return map;
        };
        let state = self.state.read();
        for key in self.layout.block(block).edge.property_keys() {
            if let Some(value) = state.adjacency.property(&self.layout, block, block_offset, key) {
                map.insert(key.clone(), value);
            }
        }
        map
    }

    /// Overwrites one edge property of an occupied stride. `Value::Null`
    /// clears it.
    pub fn set_edge_property(
        &self,
        direction: Direction,
        label: &str,
        block_offset: usize,
        key: &str,
        value: Value,
    ) -> Result<()> {
        let block = self.block_for(direction, label)?;
        let offset = self
            .layout
            .block(block)
            .edge
            .property_offset(key)
            .ok_or_else(|| StoreError::UnknownEdgeProperty {
                label: label.to_owned(),
                key: key.to_owned(),
            })?;
        let mut state = self.state.write();
        state
            .adjacency
            .set_property(&self.layout, block, block_offset, offset, value)?;
        self.mark_dirty();
        trace!(node = %self.id, label, block_offset, key, "node.set_edge_property");
        Ok(())
    }

    /// Lazy iterator over the non-hole strides of the (direction, label)
    /// block; empty when the pair is not declared.
    pub fn strides(&self, direction: Direction, label: &str) -> Strides {
        let block = self.layout.position(direction, label);
        Strides::new(self.adjacency(), &self.layout, block)
    }

    /// Number of non-hole strides in the (direction, label) block.
    pub fn degree(&self, direction: Direction, label: &str) -> usize {
        match self.layout.position(direction, label) {
            Some(block) => self.state.read().adjacency.degree(&self.layout, block),
            None => 0,
        }
    }

    /// See [`Adjacency::block_offset_to_occurrence`].
    pub fn block_offset_to_occurrence(
        &self,
        direction: Direction,
        label: &str,
        other: NodeId,
        block_offset: usize,
    ) -> Result<usize> {
        let block = self.block_for(direction, label)?;
        self.state
            .read()
            .adjacency
            .block_offset_to_occurrence(&self.layout, block, other, block_offset)
    }

    /// See [`Adjacency::occurrence_to_block_offset`].
    pub fn occurrence_to_block_offset(
        &self,
        direction: Direction,
        label: &str,
        other: NodeId,
        occurrence: usize,
    ) -> Result<usize> {
        let block = self.block_for(direction, label)?;
        self.state
            .read()
            .adjacency
            .occurrence_to_block_offset(&self.layout, block, other, occurrence)
    }

    /// Repacks the buffer with zero slack. The logical content is unchanged,
    /// so the dirty flag is left alone.
    pub fn trim(&self) -> TrimStats {
        let mut state = self.state.write();
        state.adjacency.trim()
    }

    /// Node property `key`, if declared and set.
    pub fn property(&self, key: &str) -> Option<Value> {
        let idx = self.layout.property_position(key)?;
        self.state.read().properties[idx].clone()
    }

    /// Every set node property.
    pub fn property_map(&self) -> BTreeMap<String, Value> {
        let state = self.state.read();
        self.layout
            .property_keys()
            .iter()
            .zip(&state.properties)
            .filter_map(|(key, value)| value.as_ref().map(|v| (key.clone(), v.clone())))
            .collect()
    }

    /// Sets node property `key`; `Value::Null` clears it. Returns the
    /// previous value.
    pub fn set_property(&self, key: &str, value: Value) -> Result<Option<Value>> {
        self.set_property_with(key, value, |_| {})
    }

    /// Like [`NodeBody::set_property`], but hands the new value to `notify`
    /// while the write lock is held, so observers see writes to this node in
    /// the order they were applied.
    pub fn set_property_with<F>(&self, key: &str, value: Value, notify: F) -> Result<Option<Value>>
    where
        F: FnOnce(&Value),
    {
        let idx = self
            .layout
            .property_position(key)
            .ok_or_else(|| StoreError::UnknownProperty {
                node_type: self.layout.label().to_owned(),
                key: key.to_owned(),
            })?;
        let mut state = self.state.write();
        notify(&value);
        let new = if value.is_null() { None } else { Some(value) };
        let previous = std::mem::replace(&mut state.properties[idx], new);
        self.mark_dirty();
        Ok(previous)
    }

    /// Clears node property `key`, returning the removed value.
    pub fn remove_property(&self, key: &str) -> Result<Option<Value>> {
        self.set_property(key, Value::Null)
    }
}
