//! In-layer ordering (crossing reduction).

mod cross_count;

pub use cross_count::cross_count;

use crate::graph::LayerGraph;

/// Initial ordering: depth-first discovery from nodes sorted by `(rank, input order)`.
pub fn init_order(g: &LayerGraph) -> Vec<Vec<usize>> {
    let Some(max_rank) = g.max_rank() else {
        return Vec::new();
    };
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); max_rank + 1];
    let mut visited = vec![false; g.len()];

    let mut start: Vec<usize> = (0..g.len()).collect();
    // Stable sort keeps input order among nodes of the same rank.
    start.sort_by_key(|v| g.rank(*v));

    for v in start {
        if visited[v] {
            continue;
        }
        let mut stack = vec![v];
        while let Some(u) = stack.pop() {
            if visited[u] {
                continue;
            }
            visited[u] = true;
            layers[g.rank(u)].push(u);
            for &w in g.successors(u).iter().rev() {
                if !visited[w] {
                    stack.push(w);
                }
            }
        }
    }

    layers
}

/// Alternating barycenter sweeps. The ordering with the fewest crossings wins; the search
/// stops early once no improvement was seen for four consecutive passes.
pub fn decross(g: &LayerGraph, layers: Vec<Vec<usize>>, passes: usize) -> Vec<Vec<usize>> {
    let mut best_cc = cross_count(g, &layers);
    let mut best = layers.clone();
    let mut current = layers;
    let mut last_best = 0usize;

    for pass in 0..passes {
        if best_cc == 0 || pass.saturating_sub(last_best) >= 4 {
            break;
        }
        sweep(g, &mut current, pass % 2 == 0);
        let cc = cross_count(g, &current);
        if cc < best_cc {
            best_cc = cc;
            best = current.clone();
            last_best = pass;
        }
    }

    best
}

fn sweep(g: &LayerGraph, layers: &mut [Vec<usize>], downward: bool) {
    let n = layers.len();
    if n < 2 {
        return;
    }
    let mut pos = vec![0usize; g.len()];
    for layer in layers.iter() {
        for (i, v) in layer.iter().enumerate() {
            pos[*v] = i;
        }
    }

    let order: Vec<usize> = if downward {
        (1..n).collect()
    } else {
        (0..n - 1).rev().collect()
    };

    for l in order {
        let mut entries: Vec<(f64, usize)> = layers[l]
            .iter()
            .map(|v| {
                let fixed = if downward {
                    g.predecessors(*v)
                } else {
                    g.successors(*v)
                };
                (barycenter(fixed, &pos).unwrap_or(pos[*v] as f64), *v)
            })
            .collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        layers[l] = entries.into_iter().map(|(_, v)| v).collect();
        for (i, v) in layers[l].iter().enumerate() {
            pos[*v] = i;
        }
    }
}

/// Mean position of `fixed` in the adjacent layer.
pub fn barycenter(fixed: &[usize], pos: &[usize]) -> Option<f64> {
    if fixed.is_empty() {
        return None;
    }
    let sum: usize = fixed.iter().map(|u| pos[*u]).sum();
    Some(sum as f64 / fixed.len() as f64)
}
