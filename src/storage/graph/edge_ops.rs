use tracing::trace;

use super::{Graph, NodeRef};
use crate::storage::edge::Edge;
use crate::storage::value::Value;
use crate::types::{Direction, Result};

impl Graph {
    /// Adds a `label` edge from `out` to `in_`, storing it (with its
    /// properties) on both endpoints, and returns its descriptor.
    pub fn add_edge(&self, label: &str, out: &NodeRef, in_: &NodeRef, properties: &[(&str, Value)]) -> Result<Edge> {
        let (out_offset, in_offset) = insert_both_sides(label, out, in_, properties)?;
        Ok(Edge::new(label, out.clone(), in_.clone(), Some(out_offset), Some(in_offset)))
    }

    /// Like [`Graph::add_edge`] without building a descriptor.
    pub fn add_edge_silent(&self, label: &str, out: &NodeRef, in_: &NodeRef, properties: &[(&str, Value)]) -> Result<()> {
        insert_both_sides(label, out, in_, properties).map(|_| ())
    }

    /// Descriptor for the `label` edge from `out` to `in_` without touching
    /// either buffer. Offsets resolve on first use to the first parallel
    /// edge between the pair.
    pub fn edge(&self, label: &str, out: &NodeRef, in_: &NodeRef) -> Result<Edge> {
        out.layout().require_position(Direction::Out, label)?;
        in_.layout().require_position(Direction::In, label)?;
        Ok(Edge::new(label, out.clone(), in_.clone(), None, None))
    }
}

impl NodeRef {
    /// Adds a `label` edge from this node to `in_`.
    pub fn add_edge(&self, label: &str, in_: &NodeRef, properties: &[(&str, Value)]) -> Result<Edge> {
        let (out_offset, in_offset) = insert_both_sides(label, self, in_, properties)?;
        Ok(Edge::new(label, self.clone(), in_.clone(), Some(out_offset), Some(in_offset)))
    }
}

/// Validates both sides, then writes the OUT stride followed by the IN
/// stride. The two node locks are taken one after the other, never together.
fn insert_both_sides(
    label: &str,
    out: &NodeRef,
    in_: &NodeRef,
    properties: &[(&str, Value)],
) -> Result<(usize, usize)> {
    let out_body = out.body()?;
    let in_body = in_.body()?;
    let out_pending = out_body.prepare_insert(Direction::Out, label, properties)?;
    let in_pending = in_body.prepare_insert(Direction::In, label, properties)?;

    let metrics = out.metrics();
    let out_insert = out_body.apply_insert(&out_pending, in_.id())?;
    let in_insert = in_body.apply_insert(&in_pending, out.id())?;
    for grown in [out_insert.grown_by, in_insert.grown_by] {
        if grown > 0 {
            metrics.buffer_grown(grown);
        }
    }
    metrics.edge_created();
    trace!(
        label,
        tail = %out.id(),
        head = %in_.id(),
        out_offset = out_insert.block_offset,
        in_offset = in_insert.block_offset,
        "graph.add_edge"
    );
    Ok((out_insert.block_offset, in_insert.block_offset))
}
