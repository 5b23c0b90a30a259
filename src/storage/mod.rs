//! Per-node packed adjacency storage.
//!
//! Every node owns one slot buffer holding all of its adjacencies, grouped
//! into blocks by (direction, label), plus an offset table locating each
//! block. Edges are never materialized; they exist as a stride on each
//! endpoint and are addressed through [`Edge`] descriptors.

/// Slot buffer, growth, removal, trimming and occurrence mapping.
pub mod adjacency;

/// Persistence and index seams plus in-memory implementations.
pub mod backend;

/// Non-materialized edge descriptors.
pub mod edge;

/// Node registry, handles, traversal views and memory backpressure.
pub mod graph;

/// Serialized node images.
pub mod image;

/// Schema: node types, edge labels and block numbering.
pub mod layout;

/// Metrics hooks.
pub mod metrics;

/// Node bodies and their locking discipline.
pub mod node;

/// Packed (start, length) table of a node's blocks.
pub mod offsets;

/// Graph configuration options.
pub mod options;

/// Property values stored on nodes and in stride slots.
pub mod value;

pub use adjacency::{Adjacency, Insertion, Slot, Stride, Strides, TrimStats, GROWTH_FACTOR};
pub use backend::{ExternalStorage, GraphIndex, MemoryStorage, NoopIndex, PropertyIndex};
pub use edge::Edge;
pub use graph::{AdjacentNodes, Edges, Graph, NodeRef};
pub use image::NodeImage;
pub use layout::{BlockLayout, EdgeLayout, NodeLayout, NodeLayoutBuilder, Schema, SchemaBuilder};
pub use metrics::{default_metrics, CounterMetrics, MetricsSnapshot, NoopMetrics, StorageMetrics};
pub use node::{NodeBody, RESERVED_KEYS};
pub use offsets::OffsetTable;
pub use options::{GraphOptions, DEFAULT_EVICTION_BATCH};
pub use value::Value;
