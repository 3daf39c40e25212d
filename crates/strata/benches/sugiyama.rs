use criterion::{Criterion, black_box, criterion_group, criterion_main};
use strata::{DagLayout, Size, Sugiyama};

fn layered_graph(layers: usize, width: usize) -> (Vec<String>, Vec<(String, String)>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for l in 0..layers {
        for i in 0..width {
            nodes.push(format!("n{l}_{i}"));
            if l > 0 {
                edges.push((format!("n{}_{}", l - 1, i), format!("n{l}_{i}")));
                edges.push((format!("n{}_{}", l - 1, (i * 7 + 3) % width), format!("n{l}_{i}")));
            }
        }
    }
    (nodes, edges)
}

fn bench_sugiyama(c: &mut Criterion) {
    let (nodes, edges) = layered_graph(12, 24);
    let node_refs: Vec<&str> = nodes.iter().map(String::as_str).collect();
    let edge_refs: Vec<(&str, &str)> = edges
        .iter()
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect();
    let footprint = Size::new(300.0, 308.0);
    let layout = Sugiyama::new();

    c.bench_function("sugiyama_12x24", |b| {
        b.iter(|| {
            let out = layout
                .layout(black_box(&node_refs), black_box(&edge_refs), footprint)
                .expect("layout");
            black_box(out.crossings)
        })
    });
}

criterion_group!(benches, bench_sugiyama);
criterion_main!(benches);
