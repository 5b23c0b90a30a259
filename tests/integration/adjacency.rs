#![allow(missing_docs)]

use std::sync::Arc;

use stridegraph::storage::{NodeBody, NodeLayout};
use stridegraph::{
    Dir, Direction, EdgeLayout, Graph, GraphOptions, NodeId, NodeRef, Result, Schema, StoreError,
    Value,
};

fn schema() -> Schema {
    Schema::builder()
        .edge(EdgeLayout::new("knows", ["propA", "propB"]))
        .edge(EdgeLayout::new("likes", Vec::<String>::new()))
        .edge(EdgeLayout::new("follows", ["since"]))
        .node(
            NodeLayout::builder("Person")
                .properties(["name", "age"])
                .out_edges(["knows", "likes", "follows"])
                .in_edges(["knows", "likes", "follows"]),
        )
        .build()
        .unwrap()
}

fn open() -> Graph {
    Graph::open(GraphOptions::new(schema()))
}

fn people(graph: &Graph, n: usize) -> Result<Vec<NodeRef>> {
    (0..n).map(|_| graph.create_node("Person", &[])).collect()
}

#[test]
fn edge_properties_round_trip_and_vanish_on_removal() -> Result<()> {
    let graph = open();
    let nodes = people(&graph, 2)?;
    let (u, v) = (&nodes[0], &nodes[1]);
    let edge = graph.add_edge(
        "knows",
        u,
        v,
        &[("propA", Value::Int(1)), ("propB", Value::from("x"))],
    )?;
    let offset = edge.out_offset()?;
    assert_eq!(u.edge_property(Direction::Out, "knows", offset, "propA")?, Some(Value::Int(1)));
    assert_eq!(
        u.edge_property(Direction::Out, "knows", offset, "propB")?,
        Some(Value::from("x"))
    );
    assert_eq!(edge.property_map()?.len(), 2);

    edge.remove()?;
    for key in ["propA", "propB"] {
        assert_eq!(u.edge_property(Direction::Out, "knows", offset, key)?, None);
        assert_eq!(v.edge_property(Direction::In, "knows", edge.in_offset()?, key)?, None);
    }
    assert_eq!(u.adjacent_node(Direction::Out, "knows", offset)?, None);
    assert_eq!(u.degree(Dir::Out, &["knows"])?, 0);
    Ok(())
}

#[test]
fn both_sides_agree_on_every_edge() -> Result<()> {
    let graph = open();
    let nodes = people(&graph, 6)?;
    let mut n = 0i64;
    for tail in &nodes {
        for head in &nodes {
            graph.add_edge_silent("knows", tail, head, &[("propA", Value::Int(n))])?;
            n += 1;
        }
    }
    for node in &nodes {
        for edge in node.out_e(&["knows"])? {
            let out = edge
                .out_node()
                .edge_property(Direction::Out, "knows", edge.out_offset()?, "propA")?;
            let in_ = edge
                .in_node()
                .edge_property(Direction::In, "knows", edge.in_offset()?, "propA")?;
            assert!(out.is_some());
            assert_eq!(out, in_);
        }
    }
    Ok(())
}

#[test]
fn parallel_edges_are_told_apart_by_position() -> Result<()> {
    let graph = open();
    let nodes = people(&graph, 2)?;
    let (u, v) = (&nodes[0], &nodes[1]);
    let edges = (0..3)
        .map(|_| graph.add_edge("knows", u, v, &[]))
        .collect::<Result<Vec<_>>>()?;
    for (occurrence, edge) in edges.iter().enumerate() {
        let out = u.occurrence_to_block_offset(Direction::Out, "knows", v, occurrence)?;
        let in_ = v.occurrence_to_block_offset(Direction::In, "knows", u, occurrence)?;
        assert_eq!(out, edge.out_offset()?);
        assert_eq!(in_, edge.in_offset()?);
        assert_eq!(u.block_offset_to_occurrence(Direction::Out, "knows", v, out)?, occurrence);
    }

    edges[1].remove()?;
    let hole = edges[1].out_offset()?;
    assert_eq!(u.adjacent_node(Direction::Out, "knows", hole)?, None);
    assert_eq!(u.edge_property(Direction::Out, "knows", hole, "propA")?, None);
    let offsets: Vec<usize> = u
        .out_e(&["knows"])?
        .map(|edge| edge.out_offset())
        .collect::<Result<_>>()?;
    assert_eq!(offsets, vec![edges[0].out_offset()?, edges[2].out_offset()?]);
    assert!(matches!(
        u.block_offset_to_occurrence(Direction::Out, "knows", v, hole),
        Err(StoreError::OccurrenceNotFound { .. })
    ));

    let fresh = graph.add_edge("knows", u, v, &[])?;
    assert_ne!(fresh.out_offset()?, hole);
    assert_ne!(fresh.in_offset()?, edges[1].in_offset()?);
    assert_eq!(fresh.out_offset()?, 9);
    Ok(())
}

#[test]
fn growth_keeps_content_and_shifts_later_blocks() -> Result<()> {
    let schema = schema();
    let layout = Arc::clone(schema.node("Person").unwrap());
    let body = NodeBody::new(NodeId(1), Arc::clone(&layout));
    body.add_adjacent(Direction::In, "follows", NodeId(99), &[("since", Value::Int(-1))])?;

    let follows_in = layout.position(Direction::In, "follows").unwrap();
    let likes_out = layout.position(Direction::Out, "likes").unwrap();
    let start_before = body.adjacency().offsets().start(follows_in);

    let mut grown = 0;
    let mut growths = 0;
    for n in 0..40u64 {
        let insertion = body.add_adjacent(Direction::Out, "likes", NodeId(100 + n), &[])?;
        assert_eq!(insertion.block_offset, n as usize);
        if insertion.grown_by > 0 {
            growths += 1;
            grown += insertion.grown_by;
        }
        let adjacency = body.adjacency();
        assert_eq!(adjacency.offsets().start(follows_in), start_before + grown);
        assert_eq!(adjacency.offsets().start(likes_out), 0);
    }
    assert!(growths >= 2);
    for n in 0..40u64 {
        assert_eq!(body.adjacent_node(Direction::Out, "likes", n as usize), Some(NodeId(100 + n)));
    }
    assert_eq!(body.adjacent_node(Direction::In, "follows", 0), Some(NodeId(99)));
    assert_eq!(
        body.edge_property(Direction::In, "follows", 0, "since"),
        Some(Value::Int(-1))
    );
    Ok(())
}

#[test]
fn removing_while_iterating_edits_the_live_buffer() -> Result<()> {
    let graph = open();
    let nodes = people(&graph, 2)?;
    for _ in 0..10 {
        graph.add_edge_silent("likes", &nodes[0], &nodes[1], &[])?;
    }
    let body = nodes[0].body()?;
    let before = body.adjacency();
    let mut removed = 0;
    for edge in nodes[0].out_e(&["likes"])? {
        edge.remove()?;
        removed += 1;
    }
    assert_eq!(removed, 10);
    assert!(body.adjacency().shares_buffer(&before));
    assert_eq!(nodes[0].degree(Dir::Out, &[])?, 0);
    assert_eq!(nodes[1].degree(Dir::In, &["likes"])?, 0);
    assert_eq!(before.offsets().length(likes_out_block(&body)), 10);
    Ok(())
}

fn likes_out_block(body: &NodeBody) -> usize {
    body.layout().position(Direction::Out, "likes").unwrap()
}

#[test]
fn trim_twice_matches_trim_once() -> Result<()> {
    let graph = open();
    let nodes = people(&graph, 4)?;
    for head in &nodes[1..] {
        for _ in 0..3 {
            graph.add_edge_silent("knows", &nodes[0], head, &[("propB", Value::from("b"))])?;
            graph.add_edge_silent("likes", head, &nodes[0], &[])?;
        }
    }
    let victim = nodes[0].out_e(&["knows"])?.nth(4).unwrap();
    victim.remove()?;

    let body = nodes[0].body()?;
    let occupied = body.adjacency().offsets().total_length();
    let first = nodes[0].trim()?;
    let once = body.adjacency();
    let second = nodes[0].trim()?;
    let twice = body.adjacency();

    assert_eq!(first.new_len, occupied);
    assert_eq!(twice.capacity(), occupied);
    assert_eq!(second.old_len, second.new_len);
    assert_eq!(once, twice);
    assert_eq!(twice.offsets().total_length(), occupied);
    assert_eq!(nodes[0].degree(Dir::Both, &[])?, 8 + 9);
    Ok(())
}

#[test]
fn unfiltered_view_is_schema_ordered_union() -> Result<()> {
    let graph = open();
    let nodes = people(&graph, 6)?;
    let u = &nodes[0];
    graph.add_edge_silent("follows", u, &nodes[1], &[])?;
    graph.add_edge_silent("likes", u, &nodes[2], &[])?;
    graph.add_edge_silent("knows", u, &nodes[3], &[])?;
    graph.add_edge_silent("likes", u, &nodes[4], &[])?;
    graph.add_edge_silent("knows", u, &nodes[5], &[])?;
    graph.edge("likes", u, &nodes[2])?.remove()?;

    let seen: Vec<NodeRef> = u.out(&[])?.collect();
    assert_eq!(
        seen,
        vec![
            nodes[3].clone(),
            nodes[5].clone(),
            nodes[4].clone(),
            nodes[1].clone()
        ]
    );
    let filtered: Vec<NodeRef> = u.out(&["follows", "knows"])?.collect();
    assert_eq!(filtered, vec![nodes[1].clone(), nodes[3].clone(), nodes[5].clone()]);
    Ok(())
}

#[test]
fn dirty_flag_follows_mutations() -> Result<()> {
    let schema = schema();
    let layout = Arc::clone(schema.node("Person").unwrap());
    let body = NodeBody::new(NodeId(7), layout);
    assert!(!body.is_dirty());

    body.set_property("name", Value::from("ada"))?;
    assert!(body.is_dirty());
    body.mark_clean();

    let insertion = body.add_adjacent(Direction::Out, "knows", NodeId(8), &[])?;
    assert!(body.is_dirty());
    body.mark_clean();

    body.remove_adjacent(Direction::Out, "knows", insertion.block_offset)?;
    assert!(body.is_dirty());
    body.mark_clean();

    body.trim();
    assert!(!body.is_dirty());
    assert!(body.add_adjacent(Direction::Out, "knows", NodeId(8), &[("weight", Value::Int(1))]).is_err());
    assert!(!body.is_dirty());
    Ok(())
}

#[test]
fn node_properties_are_schema_checked() -> Result<()> {
    let graph = open();
    let ada = graph.create_node("Person", &[("name", Value::from("ada")), ("~id", Value::Int(4))])?;
    assert_eq!(ada.set_property("age", Value::Int(36))?, None);
    assert_eq!(ada.property_map()?.len(), 2);
    assert_eq!(ada.remove_property("age")?, Some(Value::Int(36)));
    assert_eq!(ada.property("age")?, None);
    assert!(matches!(
        ada.set_property("email", Value::from("a@b")),
        Err(StoreError::UnknownProperty { .. })
    ));
    Ok(())
}
