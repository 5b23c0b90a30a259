#![forbid(unsafe_code)]
//! Identifiers, directions and the error type shared by every layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::error;

pub mod checksum;

/// Stable 64-bit node identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

impl From<NodeId> for u64 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

/// Direction of a single adjacency block.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Direction {
    /// Edges leaving the node.
    Out,
    /// Edges arriving at the node.
    In,
}

impl Direction {
    /// Returns the direction the opposite endpoint stores the same edge under.
    pub fn reverse(self) -> Self {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Direction::Out => "out",
            Direction::In => "in",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Out => "OUT",
            Direction::In => "IN",
        })
    }
}

/// Direction selector for adjacency views.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dir {
    /// Outgoing edges only.
    Out,
    /// Incoming edges only.
    In,
    /// Outgoing edges followed by incoming edges.
    Both,
}

impl Dir {
    /// Whether the selector covers outgoing blocks.
    pub fn includes_out(self) -> bool {
        matches!(self, Dir::Out | Dir::Both)
    }

    /// Whether the selector covers incoming blocks.
    pub fn includes_in(self) -> bool {
        matches!(self, Dir::In | Dir::Both)
    }

    /// Block directions covered by the selector, outgoing first.
    pub fn directions(self) -> &'static [Direction] {
        match self {
            Dir::Out => &[Direction::Out],
            Dir::In => &[Direction::In],
            Dir::Both => &[Direction::Out, Direction::In],
        }
    }
}

impl From<Direction> for Dir {
    fn from(value: Direction) -> Self {
        match value {
            Direction::Out => Dir::Out,
            Direction::In => Dir::In,
        }
    }
}

/// Errors raised by the adjacency storage engine.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The (direction, label) pair is not declared for the node type.
    #[error("edge of type {label} with direction {direction} not supported by node type {node_type}")]
    UnsupportedAdjacency {
        /// Label of the node the mutation targeted.
        node_type: String,
        /// Requested block direction.
        direction: Direction,
        /// Requested edge label.
        label: String,
    },
    /// The key is not a declared property of the edge label.
    #[error("edge {label} does not support property `{key}`")]
    UnknownEdgeProperty {
        /// Edge label.
        label: String,
        /// Offending property key.
        key: String,
    },
    /// The key is not a declared property of the node type.
    #[error("node type {node_type} does not support property `{key}`")]
    UnknownProperty {
        /// Node label.
        node_type: String,
        /// Offending property key.
        key: String,
    },
    /// A parallel-edge occurrence could not be located.
    #[error("unable to find occurrence {occurrence} of {label} edge to node {node}")]
    OccurrenceNotFound {
        /// Edge label.
        label: String,
        /// Adjacent node the occurrence refers to.
        node: NodeId,
        /// Requested occurrence.
        occurrence: usize,
    },
    /// A block offset does not address a stride inside the block.
    #[error("offset {offset} does not address a stride of {label}")]
    InvalidOffset {
        /// Edge label.
        label: String,
        /// Offending block offset.
        offset: usize,
    },
    /// The node id is unknown to the graph.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// The node was removed from the graph.
    #[error("node {0} was removed")]
    NodeRemoved(NodeId),
    /// The schema declaration is inconsistent.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Eviction was requested for a node with unpersisted mutations.
    #[error("node {0} is dirty and cannot be evicted")]
    DirtyEviction(NodeId),
    /// Internal offset/length bookkeeping violated an invariant.
    #[error("integrity violation: {0}")]
    Integrity(String),
    /// A node image failed validation.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// The external storage collaborator failed.
    #[error("storage: {0}")]
    Storage(String),
}

impl StoreError {
    /// Builds an [`StoreError::Integrity`] error and logs it loudly.
    pub(crate) fn integrity(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        error!(%msg, "adjacency integrity violation");
        StoreError::Integrity(msg)
    }
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
