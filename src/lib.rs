//! Stridegraph: a graph store that keeps every node's edges inline, packed
//! into one slot buffer per node, with edges addressed by descriptors
//! rather than stored as objects.
//!
//! ```
//! use stridegraph::{Dir, EdgeLayout, Graph, GraphOptions, NodeLayout, Schema, Value};
//!
//! let schema = Schema::builder()
//!     .edge(EdgeLayout::new("knows", ["since"]))
//!     .node(NodeLayout::builder("Person").properties(["name"]).out_edges(["knows"]).in_edges(["knows"]))
//!     .build()?;
//! let graph = Graph::open(GraphOptions::new(schema));
//! let ada = graph.create_node("Person", &[("name", Value::from("ada"))])?;
//! let bob = graph.create_node("Person", &[])?;
//! let edge = graph.add_edge("knows", &ada, &bob, &[("since", Value::Int(1843))])?;
//! assert_eq!(edge.property("since")?, Some(Value::Int(1843)));
//! assert_eq!(bob.degree(Dir::In, &[])?, 1);
//! # Ok::<(), stridegraph::StoreError>(())
//! ```

#![warn(missing_docs)]

pub mod primitives;
pub mod storage;
pub mod types;

pub use storage::{
    AdjacentNodes, Edge, EdgeLayout, Edges, Graph, GraphOptions, NodeLayout, NodeRef, Schema, Value,
};
pub use types::{Dir, Direction, NodeId, Result, StoreError};
