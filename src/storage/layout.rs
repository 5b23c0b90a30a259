//! Schema-fixed layout information: which adjacency blocks a node type has,
//! how wide each block's strides are, and where each edge property lives
//! inside a stride.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::node::RESERVED_KEYS;
use crate::types::{Direction, Result, StoreError};

/// Rejects repeated keys and keys that element construction reserves.
fn check_property_keys(owner: &str, keys: &[String]) -> Result<()> {
    let mut seen = FxHashSet::default();
    for key in keys {
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(StoreError::InvalidSchema(format!(
                "{owner} declares reserved property key {key}"
            )));
        }
        if !seen.insert(key.as_str()) {
            return Err(StoreError::InvalidSchema(format!(
                "{owner} declares property key {key} twice"
            )));
        }
    }
    Ok(())
}

/// Declared property set of one edge label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeLayout {
    label: String,
    property_keys: Vec<String>,
}

impl EdgeLayout {
    /// Declares an edge label with its ordered property keys.
    pub fn new<I, S>(label: impl Into<String>, property_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            property_keys: property_keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Edge label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Declared property keys in stride order.
    pub fn property_keys(&self) -> &[String] {
        &self.property_keys
    }

    /// Slots per edge: the node reference plus one slot per property.
    pub fn stride_width(&self) -> usize {
        1 + self.property_keys.len()
    }

    /// Offset of `key` relative to the node-reference slot (which is offset 0).
    pub fn property_offset(&self, key: &str) -> Option<usize> {
        self.property_keys
            .iter()
            .position(|candidate| candidate == key)
            .map(|idx| idx + 1)
    }
}

/// One (direction, label) adjacency type of a node layout.
#[derive(Clone, Debug)]
pub struct BlockLayout {
    /// Block direction.
    pub direction: Direction,
    /// Edge layout shared with every other node type using the label.
    pub edge: Arc<EdgeLayout>,
}

impl BlockLayout {
    /// Slots per stride in this block.
    pub fn stride_width(&self) -> usize {
        self.edge.stride_width()
    }
}

/// Layout of one node type ("label"): its property keys and adjacency blocks.
///
/// Blocks are numbered with every OUT label first, in declaration order,
/// followed by every IN label.
#[derive(Debug)]
pub struct NodeLayout {
    label: String,
    property_keys: Vec<String>,
    out_labels: Vec<String>,
    in_labels: Vec<String>,
    blocks: Vec<BlockLayout>,
    out_positions: FxHashMap<String, usize>,
    in_positions: FxHashMap<String, usize>,
}

impl NodeLayout {
    /// Starts declaring a node type.
    pub fn builder(label: impl Into<String>) -> NodeLayoutBuilder {
        NodeLayoutBuilder {
            label: label.into(),
            property_keys: Vec::new(),
            out_labels: Vec::new(),
            in_labels: Vec::new(),
        }
    }

    /// Node type label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Declared node property keys.
    pub fn property_keys(&self) -> &[String] {
        &self.property_keys
    }

    /// Index of `key` among the declared node property keys.
    pub fn property_position(&self, key: &str) -> Option<usize> {
        self.property_keys.iter().position(|candidate| candidate == key)
    }

    /// Declared edge labels for `direction`, in declaration order.
    pub fn labels(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Out => &self.out_labels,
            Direction::In => &self.in_labels,
        }
    }

    /// Number of distinct (direction, label) adjacency types.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Block index for (direction, label), if declared.
    pub fn position(&self, direction: Direction, label: &str) -> Option<usize> {
        match direction {
            Direction::Out => self.out_positions.get(label).copied(),
            Direction::In => self.in_positions.get(label).copied(),
        }
    }

    /// Block layout at `block`. Panics if `block` is out of range.
    pub fn block(&self, block: usize) -> &BlockLayout {
        &self.blocks[block]
    }

    /// All blocks in index order.
    pub fn blocks(&self) -> &[BlockLayout] {
        &self.blocks
    }

    /// Resolves (direction, label) or fails with the unsupported-adjacency error.
    pub fn require_position(&self, direction: Direction, label: &str) -> Result<usize> {
        self.position(direction, label)
            .ok_or_else(|| StoreError::UnsupportedAdjacency {
                node_type: self.label.clone(),
                direction,
                label: label.to_owned(),
            })
    }
}

/// Builder returned by [`NodeLayout::builder`].
#[derive(Clone, Debug)]
pub struct NodeLayoutBuilder {
    label: String,
    property_keys: Vec<String>,
    out_labels: Vec<String>,
    in_labels: Vec<String>,
}

impl NodeLayoutBuilder {
    /// Declares node property keys.
    pub fn properties<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Declares outgoing edge labels.
    pub fn out_edges<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.out_labels.extend(labels.into_iter().map(Into::into));
        self
    }

    /// Declares incoming edge labels.
    pub fn in_edges<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.in_labels.extend(labels.into_iter().map(Into::into));
        self
    }

    fn build(self, edges: &FxHashMap<String, Arc<EdgeLayout>>) -> Result<NodeLayout> {
        check_property_keys(&format!("node type {}", self.label), &self.property_keys)?;
        let mut blocks = Vec::with_capacity(self.out_labels.len() + self.in_labels.len());
        let mut out_positions = FxHashMap::default();
        let mut in_positions = FxHashMap::default();
        for (direction, labels, positions) in [
            (Direction::Out, &self.out_labels, &mut out_positions),
            (Direction::In, &self.in_labels, &mut in_positions),
        ] {
            for label in labels {
                let edge = edges.get(label).ok_or_else(|| {
                    StoreError::InvalidSchema(format!(
                        "node type {} references undeclared edge label {label}",
                        self.label
                    ))
                })?;
                if positions.insert(label.clone(), blocks.len()).is_some() {
                    return Err(StoreError::InvalidSchema(format!(
                        "node type {} declares {direction} label {label} twice",
                        self.label
                    )));
                }
                blocks.push(BlockLayout {
                    direction,
                    edge: Arc::clone(edge),
                });
            }
        }
        Ok(NodeLayout {
            label: self.label,
            property_keys: self.property_keys,
            out_labels: self.out_labels,
            in_labels: self.in_labels,
            blocks,
            out_positions,
            in_positions,
        })
    }
}

/// Layout provider for every node type and edge label of a graph.
#[derive(Debug, Default)]
pub struct Schema {
    nodes: FxHashMap<String, Arc<NodeLayout>>,
    edges: FxHashMap<String, Arc<EdgeLayout>>,
}

impl Schema {
    /// Starts declaring a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Layout of node type `label`.
    pub fn node(&self, label: &str) -> Option<&Arc<NodeLayout>> {
        self.nodes.get(label)
    }

    /// Layout of edge label `label`.
    pub fn edge(&self, label: &str) -> Option<&Arc<EdgeLayout>> {
        self.edges.get(label)
    }
}

/// Builder returned by [`Schema::builder`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    edges: Vec<EdgeLayout>,
    nodes: Vec<NodeLayoutBuilder>,
}

impl SchemaBuilder {
    /// Declares an edge label.
    pub fn edge(mut self, edge: EdgeLayout) -> Self {
        self.edges.push(edge);
        self
    }

    /// Declares a node type.
    pub fn node(mut self, node: NodeLayoutBuilder) -> Self {
        self.nodes.push(node);
        self
    }

    /// Validates cross references and freezes the schema.
    pub fn build(self) -> Result<Schema> {
        let mut edges = FxHashMap::default();
        for edge in self.edges {
            let label = edge.label.clone();
            check_property_keys(&format!("edge label {label}"), &edge.property_keys)?;
            if edges.insert(label.clone(), Arc::new(edge)).is_some() {
                return Err(StoreError::InvalidSchema(format!(
                    "edge label {label} declared twice"
                )));
            }
        }
        let mut nodes = FxHashMap::default();
        for node in self.nodes {
            let layout = node.build(&edges)?;
            let label = layout.label.clone();
            if nodes.insert(label.clone(), Arc::new(layout)).is_some() {
                return Err(StoreError::InvalidSchema(format!(
                    "node type {label} declared twice"
                )));
            }
        }
        Ok(Schema { nodes, edges })
    }
}
