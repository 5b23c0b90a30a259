#![allow(missing_docs)]

use std::sync::{Arc, Barrier};
use std::thread;

use stridegraph::storage::{CounterMetrics, NodeLayout, PropertyIndex};
use stridegraph::{
    Dir, Direction, EdgeLayout, Graph, GraphOptions, NodeRef, Result, Schema, Value,
};

const NUM_THREADS: usize = 8;
const EDGES_PER_THREAD: usize = 200;

fn schema() -> Schema {
    Schema::builder()
        .edge(EdgeLayout::new("calls", ["seq"]))
        .node(
            NodeLayout::builder("Fn")
                .properties(["hits"])
                .out_edges(["calls"])
                .in_edges(["calls"]),
        )
        .build()
        .unwrap()
}

#[test]
fn writers_and_readers_share_a_hub() -> Result<()> {
    let graph = Graph::open(GraphOptions::new(schema()));
    let hub = graph.create_node("Fn", &[])?;
    let callers: Vec<NodeRef> = (0..NUM_THREADS)
        .map(|_| graph.create_node("Fn", &[]))
        .collect::<Result<_>>()?;

    let barrier = Arc::new(Barrier::new(NUM_THREADS * 2));
    let mut handles = Vec::new();
    for caller in callers.iter().cloned() {
        let graph = graph.clone();
        let hub = hub.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || -> Result<()> {
            barrier.wait();
            for seq in 0..EDGES_PER_THREAD as i64 {
                graph.add_edge_silent("calls", &caller, &hub, &[("seq", Value::Int(seq))])?;
            }
            Ok(())
        }));
    }
    for _ in 0..NUM_THREADS {
        let hub = hub.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || -> Result<()> {
            barrier.wait();
            let mut last = 0;
            for _ in 0..50 {
                let seen = hub.in_(&["calls"])?.count();
                assert!(seen >= last, "snapshot went backwards: {seen} < {last}");
                assert!(seen <= NUM_THREADS * EDGES_PER_THREAD);
                last = seen;
            }
            Ok(())
        }));
    }
    for handle in handles {
        handle.join().unwrap()?;
    }

    assert_eq!(hub.degree(Dir::In, &[])?, NUM_THREADS * EDGES_PER_THREAD);
    for caller in &callers {
        assert_eq!(caller.degree(Dir::Out, &[])?, EDGES_PER_THREAD);
        let seqs: Vec<Option<Value>> = caller
            .out_e(&["calls"])?
            .map(|edge| edge.property("seq"))
            .collect::<Result<_>>()?;
        let expected: Vec<Option<Value>> = (0..EDGES_PER_THREAD as i64).map(|n| Some(Value::Int(n))).collect();
        assert_eq!(seqs, expected);
    }
    for edge in hub.in_e(&[])?.step_by(97) {
        let on_hub = hub.edge_property(Direction::In, "calls", edge.in_offset()?, "seq")?;
        assert_eq!(on_hub, edge.property("seq")?);
    }
    Ok(())
}

#[test]
fn concurrent_property_writes_keep_one_value() -> Result<()> {
    let graph = Graph::open(GraphOptions::new(schema()));
    let node = graph.create_node("Fn", &[])?;
    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let handles: Vec<_> = (0..NUM_THREADS as i64)
        .map(|n| {
            let node = node.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || -> Result<()> {
                barrier.wait();
                for _ in 0..100 {
                    node.set_property("hits", Value::Int(n))?;
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap()?;
    }
    let hits = node.property("hits")?.and_then(|v| v.as_int()).unwrap();
    assert!((0..NUM_THREADS as i64).contains(&hits));
    assert!(node.is_dirty());
    Ok(())
}

#[test]
fn indexed_property_races_leave_index_and_body_in_step() -> Result<()> {
    let index = Arc::new(PropertyIndex::new(["hits"]));
    let graph = Graph::open(GraphOptions::new(schema()).indexes(index.clone()));
    let node = graph.create_node("Fn", &[])?;
    for _ in 0..20 {
        let barrier = Arc::new(Barrier::new(NUM_THREADS));
        let handles: Vec<_> = (0..NUM_THREADS as i64)
            .map(|n| {
                let node = node.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || -> Result<()> {
                    barrier.wait();
                    for round in 0..25 {
                        node.set_property("hits", Value::Int(n * 100 + round))?;
                    }
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap()?;
        }
        let hits = node.property("hits")?.unwrap();
        assert_eq!(index.lookup("hits", &hits), vec![node.id()]);
    }
    Ok(())
}

#[test]
fn backpressure_under_contention_loses_nothing() -> Result<()> {
    let metrics = Arc::new(CounterMetrics::default());
    let graph = Graph::open(
        GraphOptions::new(schema())
            .metrics(metrics.clone())
            .max_resident_nodes(8)
            .eviction_batch(2),
    );
    let nodes: Vec<NodeRef> = (0..64)
        .map(|_| graph.create_node("Fn", &[]))
        .collect::<Result<_>>()?;
    let nodes = Arc::new(nodes);

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|t| {
            let graph = graph.clone();
            let nodes = Arc::clone(&nodes);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || -> Result<()> {
                barrier.wait();
                for i in 0..EDGES_PER_THREAD {
                    let tail = &nodes[(t * 7 + i) % nodes.len()];
                    let head = &nodes[(t * 13 + i * 3) % nodes.len()];
                    graph.add_edge_silent("calls", tail, head, &[])?;
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap()?;
    }

    let out: usize = nodes
        .iter()
        .map(|n| n.degree(Dir::Out, &[]))
        .sum::<Result<usize>>()?;
    let in_: usize = nodes
        .iter()
        .map(|n| n.degree(Dir::In, &[]))
        .sum::<Result<usize>>()?;
    assert_eq!(out, NUM_THREADS * EDGES_PER_THREAD);
    assert_eq!(in_, NUM_THREADS * EDGES_PER_THREAD);
    assert!(metrics.snapshot().nodes_evicted > 0);
    assert_eq!(metrics.snapshot().edges_created as usize, NUM_THREADS * EDGES_PER_THREAD);
    Ok(())
}
