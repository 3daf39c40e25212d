//! Index-based adjacency used by the layout passes.
//!
//! Real nodes occupy indices `0..real_len()` in input order; dummy nodes created while
//! splitting long edges are appended after them.

use crate::{LayoutError, Result};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

#[derive(Debug, Clone, Default)]
pub struct LayerGraph {
    ids: Vec<String>,
    real: usize,
    succ: Vec<Vec<usize>>,
    pred: Vec<Vec<usize>>,
    ranks: Vec<usize>,
}

impl LayerGraph {
    pub fn build(nodes: &[&str], edges: &[(&str, &str)]) -> Result<Self> {
        let mut index: HashMap<&str, usize> = HashMap::default();
        for (ix, id) in nodes.iter().enumerate() {
            if index.insert(*id, ix).is_some() {
                return Err(LayoutError::DuplicateNode { id: id.to_string() });
            }
        }

        let mut g = Self {
            ids: nodes.iter().map(|id| id.to_string()).collect(),
            real: nodes.len(),
            succ: vec![Vec::new(); nodes.len()],
            pred: vec![Vec::new(); nodes.len()],
            ranks: Vec::new(),
        };

        let mut seen: HashSet<(usize, usize)> = HashSet::default();
        for (from, to) in edges {
            let lookup = |id: &str| {
                index
                    .get(id)
                    .copied()
                    .ok_or_else(|| LayoutError::UnknownNode {
                        id: id.to_string(),
                        from: from.to_string(),
                        to: to.to_string(),
                    })
            };
            let v = lookup(from)?;
            let w = lookup(to)?;
            if v == w {
                return Err(LayoutError::Cycle {
                    id: from.to_string(),
                });
            }
            // Parallel edges add nothing to a layered drawing.
            if seen.insert((v, w)) {
                g.add_edge(v, w);
            }
        }

        Ok(g)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn real_len(&self) -> usize {
        self.real
    }

    pub fn is_dummy(&self, v: usize) -> bool {
        v >= self.real
    }

    pub fn id(&self, v: usize) -> &str {
        &self.ids[v]
    }

    pub fn successors(&self, v: usize) -> &[usize] {
        &self.succ[v]
    }

    pub fn predecessors(&self, v: usize) -> &[usize] {
        &self.pred[v]
    }

    pub fn rank(&self, v: usize) -> usize {
        self.ranks.get(v).copied().unwrap_or(0)
    }

    pub fn max_rank(&self) -> Option<usize> {
        self.ranks.iter().copied().max()
    }

    pub(crate) fn set_ranks(&mut self, ranks: Vec<usize>) {
        self.ranks = ranks;
    }

    pub(crate) fn add_edge(&mut self, v: usize, w: usize) {
        self.succ[v].push(w);
        self.pred[w].push(v);
    }

    pub(crate) fn remove_edge(&mut self, v: usize, w: usize) {
        self.succ[v].retain(|x| *x != w);
        self.pred[w].retain(|x| *x != v);
    }

    pub(crate) fn add_dummy(&mut self, label: String, rank: usize) -> usize {
        let v = self.ids.len();
        self.ids.push(label);
        self.succ.push(Vec::new());
        self.pred.push(Vec::new());
        self.ranks.push(rank);
        v
    }

    /// Edge list in insertion order of the source nodes.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.succ
            .iter()
            .enumerate()
            .flat_map(|(v, ws)| ws.iter().map(move |w| (v, *w)))
    }
}
