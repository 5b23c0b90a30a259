#![allow(missing_docs)]

use proptest::prelude::*;
use stridegraph::storage::{image, NodeLayout};
use stridegraph::{Dir, Direction, EdgeLayout, Graph, GraphOptions, NodeRef, Schema, Value};

const NODES: usize = 5;
const LABELS: [&str; 2] = ["a", "b"];

#[derive(Debug, Clone)]
enum Op {
    AddEdge { label: usize, tail: usize, head: usize },
    RemoveNth { node: usize, n: usize },
    Trim { node: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0..LABELS.len(), 0..NODES, 0..NODES)
            .prop_map(|(label, tail, head)| Op::AddEdge { label, tail, head }),
        2 => (0..NODES, any::<usize>()).prop_map(|(node, n)| Op::RemoveNth { node, n }),
        1 => (0..NODES).prop_map(|node| Op::Trim { node }),
    ]
}

/// Live edge as tracked by the model: (label index, tail, head, tag).
type ModelEdge = (usize, usize, usize, i64);

fn schema() -> Schema {
    Schema::builder()
        .edge(EdgeLayout::new("a", ["tag"]))
        .edge(EdgeLayout::new("b", ["extra", "tag"]))
        .node(
            NodeLayout::builder("N")
                .out_edges(LABELS)
                .in_edges(LABELS),
        )
        .build()
        .unwrap()
}

/// Model edges leaving `node`, in the order the unfiltered OUT view yields
/// them: label declaration order, then insertion order.
fn model_out(model: &[ModelEdge], node: usize) -> Vec<ModelEdge> {
    let mut out: Vec<ModelEdge> = model.iter().copied().filter(|e| e.1 == node).collect();
    out.sort_by_key(|e| e.0);
    out
}

fn tag_of(edge: &stridegraph::Edge) -> i64 {
    edge.property("tag").unwrap().and_then(|v| v.as_int()).unwrap()
}

fn index_of(nodes: &[NodeRef], node: &NodeRef) -> usize {
    nodes.iter().position(|n| n == node).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn views_match_a_model_of_live_edges(ops in prop::collection::vec(arb_op(), 1..120)) {
        let graph = Graph::open(GraphOptions::new(schema()));
        let nodes: Vec<NodeRef> = (0..NODES).map(|_| graph.create_node("N", &[]).unwrap()).collect();
        let mut model: Vec<ModelEdge> = Vec::new();
        let mut next_tag = 0i64;

        for op in ops {
            match op {
                Op::AddEdge { label, tail, head } => {
                    let edge = graph
                        .add_edge(LABELS[label], &nodes[tail], &nodes[head], &[("tag", Value::Int(next_tag))])
                        .unwrap();
                    prop_assert_eq!(tag_of(&edge), next_tag);
                    model.push((label, tail, head, next_tag));
                    next_tag += 1;
                }
                Op::RemoveNth { node, n } => {
                    let expected = model_out(&model, node);
                    if expected.is_empty() {
                        continue;
                    }
                    let victim = expected[n % expected.len()];
                    let edge = nodes[node].out_e(&[]).unwrap().nth(n % expected.len()).unwrap();
                    prop_assert_eq!(tag_of(&edge), victim.3);
                    edge.remove().unwrap();
                    model.retain(|e| e.3 != victim.3);
                }
                Op::Trim { node } => {
                    let body = nodes[node].body().unwrap();
                    let occupied = body.adjacency().offsets().total_length();
                    let first = nodes[node].trim().unwrap();
                    let once = body.adjacency();
                    nodes[node].trim().unwrap();
                    let twice = body.adjacency();
                    prop_assert_eq!(first.new_len, occupied);
                    prop_assert_eq!(once.capacity(), occupied);
                    prop_assert_eq!(&once, &twice);
                }
            }
        }

        for (idx, node) in nodes.iter().enumerate() {
            let seen: Vec<i64> = node.out_e(&[]).unwrap().map(|e| tag_of(&e)).collect();
            let expected: Vec<i64> = model_out(&model, idx).iter().map(|e| e.3).collect();
            prop_assert_eq!(seen, expected);

            for edge in node.in_e(&[]).unwrap() {
                let label = edge.label().to_owned();
                let in_side = node
                    .edge_property(Direction::In, &label, edge.in_offset().unwrap(), "tag")
                    .unwrap();
                prop_assert_eq!(in_side, edge.property("tag").unwrap());
                let tail = index_of(&nodes, edge.out_node());
                prop_assert!(model.iter().any(|e| e.1 == tail && e.2 == idx && e.3 == tag_of(&edge)));
            }

            let in_degree = model.iter().filter(|e| e.2 == idx).count();
            prop_assert_eq!(node.degree(Dir::In, &[]).unwrap(), in_degree);

            let image = node.body().unwrap().image();
            prop_assert_eq!(image::decode(&image::encode(&image)).unwrap(), image);
        }
    }

    #[test]
    fn growth_preserves_earlier_strides(counts in prop::collection::vec(1usize..40, LABELS.len())) {
        let graph = Graph::open(GraphOptions::new(schema()));
        let hub = graph.create_node("N", &[]).unwrap();
        let other = graph.create_node("N", &[]).unwrap();
        let mut tag = 0i64;
        let mut written: Vec<Vec<i64>> = vec![Vec::new(); LABELS.len()];
        for round in 0..*counts.iter().max().unwrap() {
            for (label, &count) in counts.iter().enumerate() {
                if round < count {
                    graph
                        .add_edge_silent(LABELS[label], &other, &hub, &[("tag", Value::Int(tag))])
                        .unwrap();
                    written[label].push(tag);
                    tag += 1;
                }
            }
        }
        for (label, tags) in written.iter().enumerate() {
            let seen: Vec<i64> = hub.in_e(&[LABELS[label]]).unwrap().map(|e| tag_of(&e)).collect();
            prop_assert_eq!(&seen, tags);
        }
        let adjacency = hub.body().unwrap().adjacency();
        let offsets = adjacency.offsets();
        for block in 0..offsets.block_count() {
            prop_assert!(offsets.length(block) <= offsets.capacity(block, adjacency.capacity()));
        }
    }
}
