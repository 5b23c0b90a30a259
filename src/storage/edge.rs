//! Non-materialized edge descriptors.
//!
//! An edge exists only as a pair of strides, one in the OUT block of its
//! tail and one in the IN block of its head. An [`Edge`] names both
//! endpoints plus the block offsets of those strides; an offset that is not
//! known yet is resolved on first use by mapping the known side's
//! occurrence onto the other side.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use tracing::trace;

use super::graph::NodeRef;
use super::value::Value;
use crate::types::{Direction, Result};

/// Handle to one logical edge.
#[derive(Clone)]
pub struct Edge {
    label: String,
    out: NodeRef,
    in_: NodeRef,
    out_offset: OnceLock<usize>,
    in_offset: OnceLock<usize>,
}

fn known(offset: Option<usize>) -> OnceLock<usize> {
    let cell = OnceLock::new();
    if let Some(offset) = offset {
        let _ = cell.set(offset);
    }
    cell
}

impl Edge {
    pub(crate) fn new(
        label: &str,
        out: NodeRef,
        in_: NodeRef,
        out_offset: Option<usize>,
        in_offset: Option<usize>,
    ) -> Self {
        Self {
            label: label.to_owned(),
            out,
            in_,
            out_offset: known(out_offset),
            in_offset: known(in_offset),
        }
    }

    /// Descriptor for the stride at `block_offset` in `local`'s
    /// (direction, label) block, whose adjacent node is `other`.
    pub(crate) fn from_side(
        label: &str,
        local: NodeRef,
        direction: Direction,
        block_offset: usize,
        other: NodeRef,
    ) -> Self {
        match direction {
            Direction::Out => Self::new(label, local, other, Some(block_offset), None),
            Direction::In => Self::new(label, other, local, None, Some(block_offset)),
        }
    }

    /// Edge label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Tail of the edge.
    pub fn out_node(&self) -> &NodeRef {
        &self.out
    }

    /// Head of the edge.
    pub fn in_node(&self) -> &NodeRef {
        &self.in_
    }

    /// Endpoint storing the edge under `direction`.
    pub fn node(&self, direction: Direction) -> &NodeRef {
        match direction {
            Direction::Out => &self.out,
            Direction::In => &self.in_,
        }
    }

    /// Block offset of the edge's stride on the tail.
    pub fn out_offset(&self) -> Result<usize> {
        self.offset(Direction::Out)
    }

    /// Block offset of the edge's stride on the head.
    pub fn in_offset(&self) -> Result<usize> {
        self.offset(Direction::In)
    }

    fn cell(&self, direction: Direction) -> &OnceLock<usize> {
        match direction {
            Direction::Out => &self.out_offset,
            Direction::In => &self.in_offset,
        }
    }

    /// Resolves the stride offset on the `direction` side. With the other
    /// side known, its occurrence is mapped across; with neither known the
    /// descriptor addresses the first parallel edge.
    fn offset(&self, direction: Direction) -> Result<usize> {
        if let Some(&offset) = self.cell(direction).get() {
            return Ok(offset);
        }
        let local = self.node(direction);
        let remote = self.node(direction.reverse());
        let occurrence = match self.cell(direction.reverse()).get() {
            Some(&remote_offset) => remote.body()?.block_offset_to_occurrence(
                direction.reverse(),
                &self.label,
                local.id(),
                remote_offset,
            )?,
            None => 0,
        };
        let offset = local
            .body()?
            .occurrence_to_block_offset(direction, &self.label, remote.id(), occurrence)?;
        trace!(label = %self.label, %direction, occurrence, offset, "edge.resolve_offset");
        Ok(*self.cell(direction).get_or_init(|| offset))
    }

    /// Edge property `key`; `None` when unset or not declared for the label.
    pub fn property(&self, key: &str) -> Result<Option<Value>> {
        let offset = self.out_offset()?;
        Ok(self.out.body()?.edge_property(Direction::Out, &self.label, offset, key))
    }

    /// Every set edge property.
    pub fn property_map(&self) -> Result<BTreeMap<String, Value>> {
        let offset = self.out_offset()?;
        Ok(self.out.body()?.edge_property_map(Direction::Out, &self.label, offset))
    }

    /// Writes edge property `key` on both endpoints. `Value::Null` clears it.
    pub fn set_property(&self, key: &str, value: Value) -> Result<()> {
        let out_offset = self.out_offset()?;
        let in_offset = self.in_offset()?;
        self.out
            .body()?
            .set_edge_property(Direction::Out, &self.label, out_offset, key, value.clone())?;
        self.in_
            .body()?
            .set_edge_property(Direction::In, &self.label, in_offset, key, value)
    }

    /// Turns the edge's strides on both endpoints into holes.
    pub fn remove(&self) -> Result<()> {
        let out_offset = self.out_offset()?;
        let in_offset = self.in_offset()?;
        let was_present = self.out.body()?.remove_adjacent(Direction::Out, &self.label, out_offset)?;
        self.in_.body()?.remove_adjacent(Direction::In, &self.label, in_offset)?;
        if was_present {
            self.out.metrics().edge_removed();
        }
        trace!(label = %self.label, tail = %self.out.id(), head = %self.in_.id(), "edge.remove");
        Ok(())
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("label", &self.label)
            .field("out", &self.out)
            .field("in", &self.in_)
            .field("out_offset", &self.out_offset.get())
            .field("in_offset", &self.in_offset.get())
            .finish()
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-[{}]->{}", self.out.id(), self.label, self.in_.id())
    }
}
