//! The per-node adjacency buffer: one flat slot vector partitioned into one
//! growable block per (direction, label), each block holding strides of
//! `{adjacent node, edge property values...}`.

use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::layout::NodeLayout;
use super::offsets::OffsetTable;
use super::value::Value;
use crate::types::{NodeId, Result, StoreError};

/// Each growth reserves this many times the block's occupancy plus one stride.
pub const GROWTH_FACTOR: usize = 2;

/// One cell of the adjacency buffer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Slot {
    /// Unused capacity, a hole left by removal, or an unset property.
    #[default]
    Empty,
    /// Reference to the adjacent node (offset 0 of a stride).
    Node(NodeId),
    /// Edge property value (offset >= 1 of a stride).
    Value(Value),
}

impl Slot {
    /// Whether the slot is [`Slot::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

/// Outcome of a successful [`Adjacency::insert`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Insertion {
    /// Offset of the new stride relative to its block start.
    pub block_offset: usize,
    /// Slots added by growth, zero when the block had spare capacity.
    pub grown_by: usize,
}

/// Buffer sizes reported by [`Adjacency::trim`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TrimStats {
    /// Buffer length after trimming.
    pub new_len: usize,
    /// Buffer length before trimming.
    pub old_len: usize,
}

type SlotBuffer = Arc<RwLock<Vec<Slot>>>;

/// Offset table plus slot buffer of one node.
///
/// Cloning is cheap: the clone copies the offset table and shares the slot
/// buffer. Writes that fit in the current buffer (insert without growth,
/// remove, property updates) go to the shared buffer in place, so a clone
/// sees them for every stride inside the lengths it recorded. Growth and
/// trim build a fresh buffer and swap it in; clones taken earlier keep the
/// old one. Block starts only move when the buffer is replaced, so every
/// clone sharing a buffer agrees on where each block begins.
#[derive(Clone, Debug)]
pub struct Adjacency {
    offsets: OffsetTable,
    capacity: usize,
    slots: SlotBuffer,
}

impl PartialEq for Adjacency {
    fn eq(&self, other: &Self) -> bool {
        self.offsets == other.offsets
            && (Arc::ptr_eq(&self.slots, &other.slots) || *self.slots.read() == *other.slots.read())
    }
}

impl Adjacency {
    /// Empty buffer with `block_count` zero-length blocks.
    pub fn new(block_count: usize) -> Self {
        Self {
            offsets: OffsetTable::new(block_count),
            capacity: 0,
            slots: Arc::new(RwLock::new(Vec::new())),
        }
    }

    fn with_slots(offsets: OffsetTable, slots: Vec<Slot>) -> Self {
        Self {
            offsets,
            capacity: slots.len(),
            slots: Arc::new(RwLock::new(slots)),
        }
    }

    /// Rebuilds a buffer from persisted parts, validating it against `layout`.
    pub fn from_parts(layout: &NodeLayout, offsets: OffsetTable, slots: Vec<Slot>) -> Result<Self> {
        if offsets.block_count() != layout.block_count() {
            return Err(StoreError::Corruption("offset table does not match layout"));
        }
        let strides: Vec<usize> = layout.blocks().iter().map(|b| b.stride_width()).collect();
        offsets.validate(slots.len(), &strides)?;
        for (block, &stride) in strides.iter().enumerate() {
            let start = offsets.start(block);
            let end = start + offsets.length(block);
            for idx in start..end {
                let at_reference = (idx - start) % stride == 0;
                let ok = match &slots[idx] {
                    Slot::Empty => true,
                    Slot::Node(_) => at_reference,
                    Slot::Value(_) => !at_reference,
                };
                if !ok {
                    return Err(StoreError::Corruption("slot kind does not match stride position"));
                }
            }
        }
        Ok(Self::with_slots(offsets, slots))
    }

    /// The offset table.
    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    /// Copy of the raw slot buffer, including spare capacity.
    pub fn to_slots(&self) -> Vec<Slot> {
        self.slots.read().clone()
    }

    /// Whether `self` and `other` write through the same slot buffer.
    pub fn shares_buffer(&self, other: &Adjacency) -> bool {
        Arc::ptr_eq(&self.slots, &other.slots)
    }

    /// Buffer length in slots (occupied plus spare).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Start and occupied length of `block`.
    pub fn block_bounds(&self, block: usize) -> (usize, usize) {
        (self.offsets.start(block), self.offsets.length(block))
    }

    /// Absolute slot range of the stride at `block_offset`, validated
    /// against the block's stride width and occupied length.
    fn stride_range(&self, layout: &NodeLayout, block: usize, block_offset: usize) -> Result<Range<usize>> {
        let stride = layout.block(block).stride_width();
        let (start, length) = self.block_bounds(block);
        if block_offset % stride != 0 || block_offset + stride > length {
            return Err(StoreError::InvalidOffset {
                label: layout.block(block).edge.label().to_owned(),
                offset: block_offset,
            });
        }
        let begin = start + block_offset;
        Ok(begin..begin + stride)
    }

    /// Adjacent node of the stride at `block_offset`; `None` for holes and
    /// offsets that do not address an occupied stride.
    pub fn adjacent_node(&self, layout: &NodeLayout, block: usize, block_offset: usize) -> Option<NodeId> {
        let range = self.stride_range(layout, block, block_offset).ok()?;
        match self.slots.read()[range.start] {
            Slot::Node(id) => Some(id),
            _ => None,
        }
    }

    /// Edge property `key` of the stride at `block_offset`. Undeclared keys,
    /// holes and unset values all read as `None`.
    pub fn property(&self, layout: &NodeLayout, block: usize, block_offset: usize, key: &str) -> Option<Value> {
        let offset = layout.block(block).edge.property_offset(key)?;
        let range = self.stride_range(layout, block, block_offset).ok()?;
        match &self.slots.read()[range.start + offset] {
            Slot::Value(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Appends a stride to `block`, growing the buffer first when the block
    /// has no room for one more stride. `properties` are pairs of
    /// (offset within stride, value) already resolved against the layout.
    pub fn insert(
        &mut self,
        layout: &NodeLayout,
        block: usize,
        node: NodeId,
        properties: &[(usize, Value)],
    ) -> Result<Insertion> {
        let stride = layout.block(block).stride_width();
        let (start, length) = self.block_bounds(block);
        if length % stride != 0 {
            return Err(StoreError::integrity(format!(
                "block {block} length {length} is not a multiple of stride {stride}"
            )));
        }
        let new_length = length
            .checked_add(stride)
            .ok_or_else(|| StoreError::integrity("block length overflowed usize"))?;
        let mut grown_by = 0;
        if new_length > self.offsets.capacity(block, self.capacity) {
            grown_by = self.grow(block, stride, start + length, length)?;
        }

        let insert_at = start + length;
        {
            let mut slots = self.slots.write();
            let stride_slots = &mut slots[insert_at..insert_at + stride];
            stride_slots[0] = Slot::Node(node);
            for slot in &mut stride_slots[1..] {
                *slot = Slot::Empty;
            }
            for (offset, value) in properties {
                debug_assert!(*offset >= 1 && *offset < stride, "property offset outside stride");
                if !value.is_null() {
                    stride_slots[*offset] = Slot::Value(value.clone());
                }
            }
        }
        self.offsets.set_length(block, new_length);
        trace!(block, block_offset = length, node = %node, "adjacency.insert");
        Ok(Insertion {
            block_offset: length,
            grown_by,
        })
    }

    /// Moves the slots out when no clone shares the buffer, copies them
    /// otherwise.
    fn detach(&mut self) -> Vec<Slot> {
        if let Some(lock) = Arc::get_mut(&mut self.slots) {
            return std::mem::take(lock.get_mut());
        }
        self.slots.read().clone()
    }

    /// Publishes `slots` as a new buffer. Clones keep the previous one.
    fn replace(&mut self, offsets: OffsetTable, slots: Vec<Slot>) {
        self.offsets = offsets;
        self.capacity = slots.len();
        self.slots = Arc::new(RwLock::new(slots));
    }

    /// Reserves `(length + stride) * GROWTH_FACTOR` extra slots at
    /// `insert_at`, shifting every later block forward by that amount.
    fn grow(&mut self, block: usize, stride: usize, insert_at: usize, length: usize) -> Result<usize> {
        let additional = length
            .checked_add(stride)
            .and_then(|n| n.checked_mul(GROWTH_FACTOR))
            .ok_or_else(|| StoreError::integrity("growth size overflowed usize"))?;
        let old_len = self.capacity;
        let new_len = old_len
            .checked_add(additional)
            .ok_or_else(|| StoreError::integrity("buffer length overflowed usize"))?;

        let mut offsets = self.offsets.clone();
        offsets.shift_starts_after(block, additional)?;

        let mut old = self.detach();
        let tail = old.split_off(insert_at);
        let mut grown = Vec::with_capacity(new_len);
        grown.append(&mut old);
        grown.resize(insert_at + additional, Slot::Empty);
        grown.extend(tail);
        self.replace(offsets, grown);
        debug!(block, additional, old_len, new_len, "adjacency.grow");
        Ok(additional)
    }

    /// Overwrites one property slot of an occupied stride.
    pub fn set_property(
        &mut self,
        layout: &NodeLayout,
        block: usize,
        block_offset: usize,
        property_offset: usize,
        value: Value,
    ) -> Result<()> {
        let range = self.stride_range(layout, block, block_offset)?;
        let mut slots = self.slots.write();
        if slots[range.start].is_empty() {
            return Err(StoreError::InvalidOffset {
                label: layout.block(block).edge.label().to_owned(),
                offset: block_offset,
            });
        }
        debug_assert!(property_offset >= 1 && property_offset < range.len());
        slots[range.start + property_offset] = if value.is_null() {
            Slot::Empty
        } else {
            Slot::Value(value)
        };
        Ok(())
    }

    /// Clears every slot of the stride at `block_offset`, leaving a hole.
    /// Length is unchanged. Returns whether the stride was occupied.
    pub fn remove(&mut self, layout: &NodeLayout, block: usize, block_offset: usize) -> Result<bool> {
        let range = self.stride_range(layout, block, block_offset)?;
        let mut slots = self.slots.write();
        let was_occupied = !slots[range.start].is_empty();
        for slot in &mut slots[range] {
            *slot = Slot::Empty;
        }
        trace!(block, block_offset, was_occupied, "adjacency.remove");
        Ok(was_occupied)
    }

    /// Repacks every block back to back with no spare capacity. Holes inside
    /// a block's occupied length are kept so block offsets stay stable.
    pub fn trim(&mut self) -> TrimStats {
        let old_len = self.capacity;
        let new_len = self.offsets.total_length();
        let mut offsets = self.offsets.clone();
        let mut old = self.detach();
        let mut packed = Vec::with_capacity(new_len);
        for block in 0..offsets.block_count() {
            let (start, length) = (offsets.start(block), offsets.length(block));
            offsets.set_start(block, packed.len());
            packed.extend(old[start..start + length].iter_mut().map(std::mem::take));
        }
        self.replace(offsets, packed);
        debug!(old_len, new_len, "adjacency.trim");
        TrimStats { new_len, old_len }
    }

    /// Rank of the stride at `block_offset` among the non-hole strides of
    /// `block` that reference `other`.
    pub fn block_offset_to_occurrence(
        &self,
        layout: &NodeLayout,
        block: usize,
        other: NodeId,
        block_offset: usize,
    ) -> Result<usize> {
        let range = self.stride_range(layout, block, block_offset)?;
        let stride = range.len();
        let (start, _) = self.block_bounds(block);
        let slots = self.slots.read();
        let before = (start..range.start)
            .step_by(stride)
            .filter(|&idx| slots[idx] == Slot::Node(other))
            .count();
        if slots[range.start] != Slot::Node(other) {
            return Err(StoreError::OccurrenceNotFound {
                label: layout.block(block).edge.label().to_owned(),
                node: other,
                occurrence: before,
            });
        }
        Ok(before)
    }

    /// Block offset of the `occurrence`-th non-hole stride of `block` that
    /// references `other`.
    pub fn occurrence_to_block_offset(
        &self,
        layout: &NodeLayout,
        block: usize,
        other: NodeId,
        occurrence: usize,
    ) -> Result<usize> {
        let stride = layout.block(block).stride_width();
        let (start, length) = self.block_bounds(block);
        let slots = self.slots.read();
        (start..start + length)
            .step_by(stride)
            .filter(|&idx| slots[idx] == Slot::Node(other))
            .nth(occurrence)
            .map(|idx| idx - start)
            .ok_or_else(|| StoreError::OccurrenceNotFound {
                label: layout.block(block).edge.label().to_owned(),
                node: other,
                occurrence,
            })
    }

    /// Number of non-hole strides in `block`.
    pub fn degree(&self, layout: &NodeLayout, block: usize) -> usize {
        let stride = layout.block(block).stride_width();
        let (start, length) = self.block_bounds(block);
        let slots = self.slots.read();
        (start..start + length)
            .step_by(stride)
            .filter(|&idx| !slots[idx].is_empty())
            .count()
    }
}

/// A non-hole stride yielded by [`Strides`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Stride {
    /// Offset of the stride relative to its block start.
    pub block_offset: usize,
    /// Adjacent node referenced by the stride.
    pub node: NodeId,
}

/// Lazy forward iterator over the non-hole strides of one block.
///
/// Covers the block length recorded when it was created. Removals made in
/// place afterwards show up as skipped holes; strides appended later and
/// buffers published by growth or trim are not observed.
#[derive(Clone, Debug)]
pub struct Strides {
    adjacency: Adjacency,
    start: usize,
    cursor: usize,
    end: usize,
    stride: usize,
}

impl Strides {
    /// Iterates `block` of `adjacency`; `None` yields an empty iterator.
    pub fn new(adjacency: Adjacency, layout: &NodeLayout, block: Option<usize>) -> Self {
        match block {
            Some(block) => {
                let (start, length) = adjacency.block_bounds(block);
                Self {
                    adjacency,
                    start,
                    cursor: start,
                    end: start + length,
                    stride: layout.block(block).stride_width(),
                }
            }
            None => Self {
                adjacency,
                start: 0,
                cursor: 0,
                end: 0,
                stride: 1,
            },
        }
    }
}

impl Iterator for Strides {
    type Item = Stride;

    fn next(&mut self) -> Option<Stride> {
        if self.cursor >= self.end {
            return None;
        }
        let slots = self.adjacency.slots.read();
        while self.cursor < self.end {
            let idx = self.cursor;
            self.cursor += self.stride;
            if let Slot::Node(node) = slots[idx] {
                return Some(Stride {
                    block_offset: idx - self.start,
                    node,
                });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.cursor).div_ceil(self.stride);
        (0, Some(remaining))
    }
}
