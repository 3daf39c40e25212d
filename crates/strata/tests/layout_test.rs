use strata::{Coord, DagLayout, Decross, LayoutError, Size, Sugiyama};

const FOOTPRINT: Size = Size {
    width: 300.0,
    height: 308.0,
};

fn regular_run() -> (Vec<&'static str>, Vec<(&'static str, &'static str)>) {
    (
        vec![
            "src_orders",
            "src_customers",
            "stg_orders",
            "stg_customers",
            "int_orders",
            "dim_customers",
            "fct_orders",
        ],
        vec![
            ("src_orders", "stg_orders"),
            ("src_customers", "stg_customers"),
            ("stg_orders", "int_orders"),
            ("stg_customers", "dim_customers"),
            ("int_orders", "fct_orders"),
            ("dim_customers", "fct_orders"),
        ],
    )
}

#[test]
fn chain_depth_increases_along_the_path() {
    let layout = Sugiyama::new()
        .layout(
            &["src", "stg", "mart"],
            &[("src", "stg"), ("stg", "mart")],
            FOOTPRINT,
        )
        .expect("layout ok");

    let src = layout.nodes["src"];
    let stg = layout.nodes["stg"];
    let mart = layout.nodes["mart"];
    assert!(stg.y > src.y);
    assert!(mart.y > stg.y);
    assert_eq!(layout.ranks["src"], 0);
    assert_eq!(layout.ranks["stg"], 1);
    assert_eq!(layout.ranks["mart"], 2);
    assert_eq!(layout.layer_count, 3);
}

#[test]
fn depth_is_the_longest_path_from_any_source() {
    let layout = Sugiyama::new()
        .layout(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("a", "d"), ("c", "d")],
            FOOTPRINT,
        )
        .expect("layout ok");
    assert_eq!(layout.ranks["d"], 3);
    assert_eq!(layout.nodes["d"].y, 3.0 * FOOTPRINT.height + FOOTPRINT.height / 2.0);
}

#[test]
fn regular_run_places_the_fact_below_both_parents() {
    let (nodes, edges) = regular_run();
    let layout = Sugiyama::new()
        .layout(&nodes, &edges, FOOTPRINT)
        .expect("layout ok");

    assert_eq!(layout.nodes.len(), 7);
    let fct = layout.nodes["fct_orders"];
    assert!(fct.y > layout.nodes["int_orders"].y);
    assert!(fct.y > layout.nodes["dim_customers"].y);
    assert_eq!(layout.crossings, 0);
}

#[test]
fn nodes_in_a_layer_keep_the_footprint_separation() {
    let (nodes, edges) = regular_run();
    for coord in [Coord::Center, Coord::Smooth { iterations: 8 }] {
        let layout = Sugiyama::new()
            .coord(coord)
            .layout(&nodes, &edges, FOOTPRINT)
            .expect("layout ok");
        let mut by_rank: std::collections::BTreeMap<usize, Vec<f64>> = Default::default();
        for (id, p) in &layout.nodes {
            by_rank.entry(layout.ranks[id]).or_default().push(p.x);
        }
        for xs in by_rank.values_mut() {
            xs.sort_by(f64::total_cmp);
            for pair in xs.windows(2) {
                assert!(pair[1] - pair[0] >= FOOTPRINT.width - 1e-6, "{coord:?}: {xs:?}");
            }
        }
        let min_x = layout
            .nodes
            .values()
            .map(|p| p.x)
            .fold(f64::INFINITY, f64::min);
        assert!(min_x >= FOOTPRINT.width / 2.0 - 1e-6);
        assert!(layout.width >= min_x);
    }
}

#[test]
fn smoothing_centers_a_child_between_its_parents() {
    let layout = Sugiyama::new()
        .layout(&["a", "b", "c"], &[("a", "c"), ("b", "c")], FOOTPRINT)
        .expect("layout ok");
    let a = layout.nodes["a"].x;
    let b = layout.nodes["b"].x;
    let c = layout.nodes["c"].x;
    assert!(((a + b) / 2.0 - c).abs() < 1e-6);
}

#[test]
fn decross_none_keeps_discovery_order() {
    let layout = Sugiyama::new()
        .decross(Decross::None)
        .layout(&["a", "b", "c", "d"], &[("a", "d"), ("b", "c")], FOOTPRINT)
        .expect("layout ok");
    assert_eq!(layout.crossings, 0);
}

#[test]
fn duplicate_edges_are_redundant() {
    let layout = Sugiyama::new()
        .layout(&["a", "b"], &[("a", "b"), ("a", "b")], FOOTPRINT)
        .expect("layout ok");
    assert_eq!(layout.ranks["b"], 1);
}

#[test]
fn invalid_graphs_are_rejected() {
    let layout = Sugiyama::new();
    assert_eq!(
        layout.layout(&["a", "a"], &[], FOOTPRINT).unwrap_err(),
        LayoutError::DuplicateNode { id: "a".to_string() }
    );
    assert!(matches!(
        layout.layout(&["a"], &[("a", "z")], FOOTPRINT),
        Err(LayoutError::UnknownNode { .. })
    ));
    assert!(matches!(
        layout.layout(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")], FOOTPRINT),
        Err(LayoutError::Cycle { .. })
    ));
    assert!(matches!(
        layout.layout(&["a"], &[("a", "a")], FOOTPRINT),
        Err(LayoutError::Cycle { .. })
    ));
}

#[test]
fn empty_graph_has_no_extent() {
    let layout = Sugiyama::new().layout(&[], &[], FOOTPRINT).expect("layout ok");
    assert!(layout.nodes.is_empty());
    assert_eq!(layout.width, 0.0);
    assert_eq!(layout.height, 0.0);
}
