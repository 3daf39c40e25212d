//! Layer assignment.

use crate::graph::LayerGraph;
use crate::{LayoutError, Result};
use std::collections::VecDeque;

/// Longest-path layering measured from the sources: every source sits on layer 0 and every
/// other node one layer below its deepest parent.
///
/// Nodes are processed in topological order (Kahn), ties broken by input order. Fails with
/// [`LayoutError::Cycle`] when some node never becomes ready.
pub fn longest_path(g: &LayerGraph) -> Result<Vec<usize>> {
    let n = g.len();
    let mut indegree: Vec<usize> = (0..n).map(|v| g.predecessors(v).len()).collect();
    let mut ranks = vec![0usize; n];
    let mut queue: VecDeque<usize> = (0..n).filter(|v| indegree[*v] == 0).collect();
    let mut visited = 0usize;

    while let Some(v) = queue.pop_front() {
        visited += 1;
        for &w in g.successors(v) {
            ranks[w] = ranks[w].max(ranks[v] + 1);
            indegree[w] -= 1;
            if indegree[w] == 0 {
                queue.push_back(w);
            }
        }
    }

    if visited < n {
        let stuck = (0..n).find(|v| indegree[*v] > 0).unwrap_or(0);
        return Err(LayoutError::Cycle {
            id: g.id(stuck).to_string(),
        });
    }

    Ok(ranks)
}

/// Rank distance spanned by an edge.
pub fn span(g: &LayerGraph, v: usize, w: usize) -> usize {
    g.rank(w).saturating_sub(g.rank(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_path_puts_sources_on_layer_zero() {
        let g = LayerGraph::build(&["a", "b", "c"], &[("a", "c"), ("b", "c")]).unwrap();
        assert_eq!(longest_path(&g).unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn longest_path_uses_the_deepest_parent() {
        let g = LayerGraph::build(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("a", "d"), ("c", "d")],
        )
        .unwrap();
        assert_eq!(longest_path(&g).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn longest_path_rejects_cycles() {
        let g = LayerGraph::build(&["a", "b"], &[("a", "b"), ("b", "a")]).unwrap();
        assert!(matches!(longest_path(&g), Err(LayoutError::Cycle { .. })));
    }
}
