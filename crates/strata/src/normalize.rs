//! Splits edges spanning more than one layer into chains of dummy nodes.

use crate::graph::LayerGraph;
use crate::rank::span;

pub fn split_long_edges(g: &mut LayerGraph) {
    let long: Vec<(usize, usize)> = g.edges().filter(|(v, w)| span(g, *v, *w) > 1).collect();

    for (v, w) in long {
        g.remove_edge(v, w);
        let mut prev = v;
        for rank in g.rank(v) + 1..g.rank(w) {
            let label = format!("_d:{}:{}:{}", g.id(v), g.id(w), rank);
            let dummy = g.add_dummy(label, rank);
            g.add_edge(prev, dummy);
            prev = dummy;
        }
        g.add_edge(prev, w);
    }
}
