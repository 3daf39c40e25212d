//! Cross-axis coordinate assignment.
//!
//! Both strategies keep neighbors in a layer at least `separation` apart and return
//! coordinates whose minimum equals `separation / 2`.

use crate::graph::LayerGraph;

/// Centers every layer on the axis of the widest one.
pub fn center(g: &LayerGraph, layers: &[Vec<usize>], separation: f64) -> Vec<f64> {
    let mut xs = vec![0.0; g.len()];
    packed(layers, separation, &mut xs);
    shift_to_origin(&mut xs, separation);
    xs
}

/// Iteratively pulls every node toward the mean of its neighbors.
///
/// Each layer is placed with an isotonic regression: the positions are the least-squares fit
/// to the desired coordinates subject to the ordering and separation constraints. Sweeps
/// alternate downward (parents fixed) and upward (children fixed); a final sweep looks at
/// both sides to balance nodes between their parents and children.
pub fn smooth(g: &LayerGraph, layers: &[Vec<usize>], separation: f64, iterations: usize) -> Vec<f64> {
    let mut xs = vec![0.0; g.len()];
    packed(layers, separation, &mut xs);

    let n = layers.len();
    for _ in 0..iterations {
        for l in 1..n {
            place_layer(&layers[l], separation, &mut xs, |v| g.predecessors(v).to_vec());
        }
        for l in (0..n.saturating_sub(1)).rev() {
            place_layer(&layers[l], separation, &mut xs, |v| g.successors(v).to_vec());
        }
    }
    for layer in layers {
        place_layer(layer, separation, &mut xs, |v| {
            let mut both = g.predecessors(v).to_vec();
            both.extend_from_slice(g.successors(v));
            both
        });
    }

    shift_to_origin(&mut xs, separation);
    xs
}

fn packed(layers: &[Vec<usize>], separation: f64, xs: &mut [f64]) {
    for layer in layers {
        let half = (layer.len().saturating_sub(1)) as f64 * separation / 2.0;
        for (i, v) in layer.iter().enumerate() {
            xs[*v] = i as f64 * separation - half;
        }
    }
}

fn place_layer<F>(layer: &[usize], separation: f64, xs: &mut [f64], neighbors: F)
where
    F: Fn(usize) -> Vec<usize>,
{
    if layer.is_empty() {
        return;
    }
    let desired: Vec<f64> = layer
        .iter()
        .map(|v| {
            let ns = neighbors(*v);
            if ns.is_empty() {
                xs[*v]
            } else {
                ns.iter().map(|u| xs[*u]).sum::<f64>() / ns.len() as f64
            }
        })
        .collect();

    let offsets: Vec<f64> = desired
        .iter()
        .enumerate()
        .map(|(i, d)| d - i as f64 * separation)
        .collect();
    let fitted = isotonic(&offsets);
    for (i, v) in layer.iter().enumerate() {
        xs[*v] = fitted[i] + i as f64 * separation;
    }
}

/// Non-decreasing least-squares fit (pool adjacent violators).
pub fn isotonic(values: &[f64]) -> Vec<f64> {
    let mut blocks: Vec<(f64, usize)> = Vec::with_capacity(values.len());
    for &v in values {
        blocks.push((v, 1));
        while blocks.len() >= 2 {
            let (s2, c2) = blocks[blocks.len() - 1];
            let (s1, c1) = blocks[blocks.len() - 2];
            if s1 / c1 as f64 <= s2 / c2 as f64 {
                break;
            }
            blocks.pop();
            let last = blocks.len() - 1;
            blocks[last] = (s1 + s2, c1 + c2);
        }
    }

    let mut out = Vec::with_capacity(values.len());
    for (sum, count) in blocks {
        let mean = sum / count as f64;
        out.extend(std::iter::repeat_n(mean, count));
    }
    out
}

fn shift_to_origin(xs: &mut [f64], separation: f64) {
    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    if !min.is_finite() {
        return;
    }
    let delta = separation / 2.0 - min;
    for x in xs.iter_mut() {
        *x += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isotonic_pools_violators() {
        assert_eq!(isotonic(&[1.0, 3.0, 2.0]), vec![1.0, 2.5, 2.5]);
        assert_eq!(isotonic(&[3.0, 2.0, 1.0]), vec![2.0, 2.0, 2.0]);
        assert_eq!(isotonic(&[0.0, 1.0]), vec![0.0, 1.0]);
    }
}
