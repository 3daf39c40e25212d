use crate::graph::LayerGraph;

/// Number of edge crossings between consecutive layers.
pub fn cross_count(g: &LayerGraph, layers: &[Vec<usize>]) -> usize {
    layers
        .windows(2)
        .map(|pair| two_layer_cross_count(g, &pair[0], &pair[1]))
        .sum()
}

/// Bilayer cross counting with an accumulator tree (Barth, Jünger, Mutzel).
fn two_layer_cross_count(g: &LayerGraph, north: &[usize], south: &[usize]) -> usize {
    if south.is_empty() {
        return 0;
    }

    let mut south_pos = vec![usize::MAX; g.len()];
    for (i, v) in south.iter().enumerate() {
        south_pos[*v] = i;
    }

    let mut south_entries: Vec<usize> = Vec::new();
    for v in north {
        let mut entries: Vec<usize> = g
            .successors(*v)
            .iter()
            .map(|w| south_pos[*w])
            .filter(|pos| *pos != usize::MAX)
            .collect();
        entries.sort_unstable();
        south_entries.extend(entries);
    }

    let mut first_index: usize = 1;
    while first_index < south.len() {
        first_index <<= 1;
    }
    let tree_size = 2 * first_index - 1;
    first_index -= 1;
    let mut tree = vec![0usize; tree_size];

    let mut cc = 0usize;
    for pos in south_entries {
        let mut index = pos + first_index;
        tree[index] += 1;
        let mut weight_sum = 0usize;
        while index > 0 {
            if index % 2 == 1 {
                weight_sum += tree[index + 1];
            }
            index = (index - 1) >> 1;
            tree[index] += 1;
        }
        cc += weight_sum;
    }

    cc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_a_single_crossing() {
        let g = LayerGraph::build(&["a", "b", "c", "d"], &[("a", "d"), ("b", "c")]).unwrap();
        assert_eq!(cross_count(&g, &[vec![0, 1], vec![2, 3]]), 1);
        assert_eq!(cross_count(&g, &[vec![0, 1], vec![3, 2]]), 0);
    }

    #[test]
    fn empty_layers_have_no_crossings() {
        let g = LayerGraph::build(&["a"], &[]).unwrap();
        assert_eq!(cross_count(&g, &[vec![0], vec![]]), 0);
    }
}
