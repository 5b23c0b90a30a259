#![allow(missing_docs)]

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use stridegraph::storage::{image, CounterMetrics, ExternalStorage, MemoryStorage, NodeLayout};
use stridegraph::{
    Dir, Direction, EdgeLayout, Graph, GraphOptions, NodeRef, Result, Schema, StoreError, Value,
};

fn schema() -> Schema {
    Schema::builder()
        .edge(EdgeLayout::new("road", ["km"]))
        .node(
            NodeLayout::builder("City")
                .properties(["name"])
                .out_edges(["road"])
                .in_edges(["road"]),
        )
        .build()
        .unwrap()
}

fn total_km(node: &NodeRef) -> Result<i64> {
    let mut km = 0;
    for edge in node.out_e(&[])? {
        km += edge.property("km")?.and_then(|v| v.as_int()).unwrap_or(0);
    }
    Ok(km)
}

#[test]
fn flushed_nodes_reload_identically() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let graph = Graph::open(GraphOptions::new(schema()).storage(storage.clone()));
    let a = graph.create_node("City", &[("name", Value::from("a"))])?;
    let b = graph.create_node("City", &[("name", Value::from("b"))])?;
    for km in 1..=5 {
        graph.add_edge_silent("road", &a, &b, &[("km", Value::Int(km))])?;
    }
    graph.edge("road", &a, &b)?.remove()?;

    let before = a.body()?.image();
    graph.flush()?;
    assert!(graph.evict(a.id())?);
    assert!(!a.is_resident());
    let after = a.body()?.image();
    assert_eq!(before, after);
    assert_eq!(total_km(&a)?, 2 + 3 + 4 + 5);

    let stored = storage.load_node(b.id())?.unwrap();
    assert_eq!(stored.label, "City");
    assert_eq!(stored.id, b.id());
    Ok(())
}

#[test]
fn eviction_is_refused_while_dirty() -> Result<()> {
    let graph = Graph::open(GraphOptions::new(schema()));
    let a = graph.create_node("City", &[])?;
    graph.flush()?;
    a.set_property("name", Value::from("renamed"))?;
    assert!(matches!(graph.evict(a.id()), Err(StoreError::DirtyEviction(id)) if id == a.id()));
    assert!(a.is_resident());
    graph.flush()?;
    assert!(graph.evict(a.id())?);
    assert_eq!(a.property("name")?, Some(Value::from("renamed")));
    Ok(())
}

#[test]
fn corrupted_image_is_reported_on_reload() -> Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let graph = Graph::open(GraphOptions::new(schema()).storage(storage.clone()));
    let a = graph.create_node("City", &[("name", Value::from("a"))])?;
    graph.flush()?;
    assert!(graph.evict(a.id())?);

    let mut bytes = storage.raw(a.id()).unwrap();
    let last = bytes.len() - 5;
    bytes[last] ^= 0xFF;
    storage.put_raw(a.id(), bytes);
    assert!(matches!(a.property("name"), Err(StoreError::Corruption(_))));
    assert!(!a.is_resident());
    Ok(())
}

#[test]
fn image_codec_survives_a_round_trip() -> Result<()> {
    let graph = Graph::open(GraphOptions::new(schema()));
    let a = graph.create_node("City", &[("name", Value::from("a"))])?;
    let b = graph.create_node("City", &[])?;
    graph.add_edge_silent("road", &a, &b, &[("km", Value::Int(-12))])?;
    graph.add_edge_silent("road", &b, &a, &[])?;
    let image = a.body()?.image();
    let decoded = image::decode(&image::encode(&image))?;
    assert_eq!(decoded, image);
    assert!(matches!(image::decode(&[]), Err(StoreError::Corruption(_))));
    Ok(())
}

#[test]
fn random_workload_under_backpressure_keeps_every_edge() -> Result<()> {
    let metrics = Arc::new(CounterMetrics::default());
    let graph = Graph::open(
        GraphOptions::new(schema())
            .metrics(metrics.clone())
            .max_resident_nodes(16)
            .eviction_batch(4),
    );
    let cities: Vec<NodeRef> = (0..128)
        .map(|n: i64| graph.create_node("City", &[("name", Value::from(n.to_string()))]))
        .collect::<Result<_>>()?;

    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
    let mut expected_out = vec![0i64; cities.len()];
    let mut expected_degree = vec![0usize; cities.len()];
    for _ in 0..1_000 {
        let tail = rng.gen_range(0..cities.len());
        let head = rng.gen_range(0..cities.len());
        let km = rng.gen_range(1..100);
        graph.add_edge_silent("road", &cities[tail], &cities[head], &[("km", Value::Int(km))])?;
        expected_out[tail] += km;
        expected_degree[tail] += 1;
        expected_degree[head] += 1;
    }

    assert!(metrics.snapshot().nodes_evicted > 0);
    assert!(metrics.snapshot().nodes_loaded > 0);
    for (idx, city) in cities.iter().enumerate() {
        assert_eq!(total_km(city)?, expected_out[idx]);
        assert_eq!(city.degree(Dir::Both, &[])?, expected_degree[idx]);
        assert_eq!(city.property("name")?, Some(Value::from(idx.to_string())));
    }
    assert!(graph.resident_count() <= 16 + 4);

    let sampled = &cities[3];
    if let Some(edge) = sampled.out_e(&["road"])?.next() {
        let head = edge.in_node();
        assert_eq!(
            head.edge_property(Direction::In, "road", edge.in_offset()?, "km")?,
            edge.property("km")?
        );
    }
    Ok(())
}
