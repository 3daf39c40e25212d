//! Layered DAG layout.
//!
//! `strata` assigns every node of a directed acyclic graph to a layer (its depth), orders
//! the nodes inside each layer to reduce edge crossings, and assigns cross-axis coordinates.
//! Consumers only see the [`DagLayout`] trait: nodes and parent edges go in, two-axis
//! positions come out.
//!
//! Coordinates follow the usual layered-layout convention: `y` grows with depth, `x` runs
//! along a layer. Callers that draw left-to-right swap the axes themselves.

#![forbid(unsafe_code)]

pub mod graph;
pub mod normalize;
pub mod order;
pub mod position;
pub mod rank;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("duplicate node id: {id}")]
    DuplicateNode { id: String },
    #[error("edge {from} -> {to} references unknown node {id}")]
    UnknownNode { id: String, from: String, to: String },
    #[error("graph is not acyclic (cycle through {id})")]
    Cycle { id: String },
}

pub type Result<T> = std::result::Result<T, LayoutError>;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Space reserved for every node: `width` along a layer, `height` between layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    /// Node centers keyed by id, in input order.
    pub nodes: IndexMap<String, Point>,
    /// Depth (layer index) per node, in input order.
    pub ranks: IndexMap<String, usize>,
    pub width: f64,
    pub height: f64,
    pub layer_count: usize,
    pub crossings: usize,
}

/// The layout capability consumed by renderers.
///
/// `edges` are `(parent, child)` pairs; duplicates are tolerated. Implementations must fail
/// with [`LayoutError::Cycle`] instead of looping on cyclic input.
pub trait DagLayout {
    fn layout(&self, nodes: &[&str], edges: &[(&str, &str)], footprint: Size) -> Result<Layout>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layering {
    /// Depth of a node is the length of the longest path from any source to it.
    #[default]
    LongestPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decross {
    /// Keep the DFS discovery order.
    None,
    /// Alternating two-layer barycenter sweeps; the best ordering seen is kept.
    TwoLayer { passes: usize },
}

impl Default for Decross {
    fn default() -> Self {
        Decross::TwoLayer { passes: 24 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Coord {
    /// Center every layer on a shared axis.
    Center,
    /// Pull nodes toward their neighbors while keeping the footprint separation.
    Smooth { iterations: usize },
}

impl Default for Coord {
    fn default() -> Self {
        Coord::Smooth { iterations: 8 }
    }
}

/// Sugiyama-style layered layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sugiyama {
    pub layering: Layering,
    pub decross: Decross,
    pub coord: Coord,
}

impl Sugiyama {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layering(mut self, layering: Layering) -> Self {
        self.layering = layering;
        self
    }

    pub fn decross(mut self, decross: Decross) -> Self {
        self.decross = decross;
        self
    }

    pub fn coord(mut self, coord: Coord) -> Self {
        self.coord = coord;
        self
    }
}

impl DagLayout for Sugiyama {
    fn layout(&self, nodes: &[&str], edges: &[(&str, &str)], footprint: Size) -> Result<Layout> {
        let mut g = graph::LayerGraph::build(nodes, edges)?;
        let real_count = g.len();

        let ranks = match self.layering {
            Layering::LongestPath => rank::longest_path(&g)?,
        };
        g.set_ranks(ranks);
        normalize::split_long_edges(&mut g);

        let mut layers = order::init_order(&g);
        if let Decross::TwoLayer { passes } = self.decross {
            layers = order::decross(&g, layers, passes);
        }
        let crossings = order::cross_count(&g, &layers);

        let xs = match self.coord {
            Coord::Center => position::center(&g, &layers, footprint.width),
            Coord::Smooth { iterations } => {
                position::smooth(&g, &layers, footprint.width, iterations)
            }
        };

        let layer_count = layers.len();
        let mut out_nodes = IndexMap::with_capacity(real_count);
        let mut out_ranks = IndexMap::with_capacity(real_count);
        let mut max_x: f64 = 0.0;
        for v in 0..g.len() {
            max_x = max_x.max(xs[v]);
        }
        for v in 0..real_count {
            let rank = g.rank(v);
            let y = rank as f64 * footprint.height + footprint.height / 2.0;
            out_nodes.insert(g.id(v).to_string(), Point::new(xs[v], y));
            out_ranks.insert(g.id(v).to_string(), rank);
        }

        Ok(Layout {
            nodes: out_nodes,
            ranks: out_ranks,
            width: if g.len() == 0 {
                0.0
            } else {
                max_x + footprint.width / 2.0
            },
            height: layer_count as f64 * footprint.height,
            layer_count,
            crossings,
        })
    }
}
