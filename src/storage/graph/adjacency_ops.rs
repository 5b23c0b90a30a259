//! Lazy adjacency views. These are the only surface traversal code uses;
//! nothing outside this module sees buffer offsets except through [`Edge`].

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::warn;

use super::{GraphInner, NodeRef};
use crate::storage::adjacency::Strides;
use crate::storage::edge::Edge;
use crate::storage::value::Value;
use crate::types::{Dir, Direction, NodeId, Result};

type Scans = SmallVec<[BlockScan; 4]>;

struct BlockScan {
    direction: Direction,
    label: String,
    strides: Strides,
}

/// Iterator over adjacent nodes, produced by [`NodeRef::adjacent`].
///
/// Covers the block lengths recorded when the view was created; edges
/// removed since then are skipped. Adjacent ids that no longer resolve to a
/// node are skipped too.
pub struct AdjacentNodes {
    graph: Arc<GraphInner>,
    scans: smallvec::IntoIter<[BlockScan; 4]>,
    current: Option<BlockScan>,
}

impl Iterator for AdjacentNodes {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        loop {
            if let Some(scan) = self.current.as_mut() {
                if let Some(stride) = scan.strides.next() {
                    match resolve(&self.graph, stride.node) {
                        Some(node) => return Some(node),
                        None => continue,
                    }
                }
            }
            self.current = Some(self.scans.next()?);
        }
    }
}

/// Iterator over edge descriptors, produced by [`NodeRef::edges`].
pub struct Edges {
    local: NodeRef,
    scans: smallvec::IntoIter<[BlockScan; 4]>,
    current: Option<BlockScan>,
}

impl Iterator for Edges {
    type Item = Edge;

    fn next(&mut self) -> Option<Edge> {
        loop {
            if let Some(scan) = self.current.as_mut() {
                if let Some(stride) = scan.strides.next() {
                    let Some(other) = resolve(&self.local.graph, stride.node) else {
                        continue;
                    };
                    return Some(Edge::from_side(
                        &scan.label,
                        self.local.clone(),
                        scan.direction,
                        stride.block_offset,
                        other,
                    ));
                }
            }
            self.current = Some(self.scans.next()?);
        }
    }
}

fn resolve(graph: &Arc<GraphInner>, id: NodeId) -> Option<NodeRef> {
    match graph.node_ref(id) {
        Ok(node) => Some(node),
        Err(err) => {
            warn!(node = %id, error = %err, "adjacency.dangling_reference");
            None
        }
    }
}

impl NodeRef {
    /// One scan per requested block: for each direction of `dir` (OUT first),
    /// every label in `labels`, or every declared label in declaration order
    /// when `labels` is empty. Undeclared pairs scan nothing.
    fn scans(&self, dir: Dir, labels: &[&str]) -> Result<Scans> {
        let body = self.body()?;
        let mut scans = Scans::new();
        for &direction in dir.directions() {
            self.graph.metrics.adjacency_scan(direction.as_str());
            if labels.is_empty() {
                for label in self.layout().labels(direction) {
                    scans.push(BlockScan {
                        direction,
                        label: label.clone(),
                        strides: body.strides(direction, label),
                    });
                }
            } else {
                for &label in labels {
                    scans.push(BlockScan {
                        direction,
                        label: label.to_owned(),
                        strides: body.strides(direction, label),
                    });
                }
            }
        }
        Ok(scans)
    }

    /// Adjacent nodes over `dir` and `labels` (empty means every label).
    pub fn adjacent(&self, dir: Dir, labels: &[&str]) -> Result<AdjacentNodes> {
        Ok(AdjacentNodes {
            graph: Arc::clone(&self.graph),
            scans: self.scans(dir, labels)?.into_iter(),
            current: None,
        })
    }

    /// Edges over `dir` and `labels` (empty means every label).
    pub fn edges(&self, dir: Dir, labels: &[&str]) -> Result<Edges> {
        Ok(Edges {
            local: self.clone(),
            scans: self.scans(dir, labels)?.into_iter(),
            current: None,
        })
    }

    /// Nodes this node points at.
    pub fn out(&self, labels: &[&str]) -> Result<AdjacentNodes> {
        self.adjacent(Dir::Out, labels)
    }

    /// Nodes pointing at this node.
    pub fn in_(&self, labels: &[&str]) -> Result<AdjacentNodes> {
        self.adjacent(Dir::In, labels)
    }

    /// Outgoing then incoming neighbours.
    pub fn both(&self, labels: &[&str]) -> Result<AdjacentNodes> {
        self.adjacent(Dir::Both, labels)
    }

    /// Outgoing edges.
    pub fn out_e(&self, labels: &[&str]) -> Result<Edges> {
        self.edges(Dir::Out, labels)
    }

    /// Incoming edges.
    pub fn in_e(&self, labels: &[&str]) -> Result<Edges> {
        self.edges(Dir::In, labels)
    }

    /// Outgoing then incoming edges.
    pub fn both_e(&self, labels: &[&str]) -> Result<Edges> {
        self.edges(Dir::Both, labels)
    }

    /// Number of edges over `dir` and `labels` (empty means every label),
    /// holes excluded.
    pub fn degree(&self, dir: Dir, labels: &[&str]) -> Result<usize> {
        let body = self.body()?;
        let mut degree = 0;
        for &direction in dir.directions() {
            if labels.is_empty() {
                for label in self.layout().labels(direction) {
                    degree += body.degree(direction, label);
                }
            } else {
                for &label in labels {
                    degree += body.degree(direction, label);
                }
            }
        }
        Ok(degree)
    }

    /// Adjacent node of the stride at `block_offset`; `None` for holes,
    /// invalid offsets and undeclared pairs.
    pub fn adjacent_node(&self, direction: Direction, label: &str, block_offset: usize) -> Result<Option<NodeRef>> {
        let adjacent = self.body()?.adjacent_node(direction, label, block_offset);
        adjacent.map(|id| self.graph.node_ref(id)).transpose()
    }

    /// Edge property `key` of the stride at `block_offset`.
    pub fn edge_property(
        &self,
        direction: Direction,
        label: &str,
        block_offset: usize,
        key: &str,
    ) -> Result<Option<Value>> {
        Ok(self.body()?.edge_property(direction, label, block_offset, key))
    }

    /// Occurrence of the stride at `block_offset` among the strides of the
    /// (direction, label) block that reference `other`.
    pub fn block_offset_to_occurrence(
        &self,
        direction: Direction,
        label: &str,
        other: &NodeRef,
        block_offset: usize,
    ) -> Result<usize> {
        self.body()?
            .block_offset_to_occurrence(direction, label, other.id(), block_offset)
    }

    /// Block offset of the `occurrence`-th stride of the (direction, label)
    /// block that references `other`.
    pub fn occurrence_to_block_offset(
        &self,
        direction: Direction,
        label: &str,
        other: &NodeRef,
        occurrence: usize,
    ) -> Result<usize> {
        self.body()?
            .occurrence_to_block_offset(direction, label, other.id(), occurrence)
    }
}
