//! Diagram geometry: node sizes, layout invocation, row alignment, canvas normalization
//! and edge paths.
//!
//! The layout runs top-down (`y` = depth). Diagrams read left-to-right, so every canvas
//! point is the layout point with its axes swapped. Canvas coordinates stored here are
//! *before* the padding offset; [`RenderGeometry::to_canvas`] applies it.

use crate::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use statedag_core::{Node, RowAlignment, Scenario};
use strata::{DagLayout, Point, Size};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub node_width: f64,
    pub node_height: f64,
    /// Added to `node_height` for nodes carrying a column table.
    pub column_extra: f64,
    /// Fixed height of annotation-layer nodes.
    pub annotation_height: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    pub min_width: f64,
    pub min_height: f64,
    /// Added to the tallest node to get the footprint along a layer.
    pub footprint_cross_margin: f64,
    /// Added to the widest node to get the footprint between layers.
    pub footprint_depth_margin: f64,
    /// Distance between an aligned row and its annotation node, as a fraction of the
    /// cross-axis footprint.
    pub annotation_row_offset: f64,
    /// Clearance between an elbow's horizontal run and the annotation node's top edge.
    pub elbow_gap: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            node_width: 248.0,
            node_height: 80.0,
            column_extra: 96.0,
            annotation_height: 148.0,
            padding_x: 150.0,
            padding_y: 210.0,
            min_width: 640.0,
            min_height: 540.0,
            footprint_cross_margin: 220.0,
            footprint_depth_margin: 60.0,
            annotation_row_offset: 0.9,
            elbow_gap: 40.0,
        }
    }
}

impl GeometryConfig {
    pub fn node_height(&self, node: &Node) -> f64 {
        if node.is_annotation() {
            self.annotation_height
        } else if node.has_columns() {
            self.node_height + self.column_extra
        } else {
            self.node_height
        }
    }

    pub fn node_width(&self, node: &Node) -> f64 {
        node.width
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(self.node_width)
    }

    /// Per-node layout footprint: room for the largest node plus margins.
    /// `width` runs along a layer (canvas vertical), `height` between layers.
    pub fn footprint(&self, scenario: &Scenario) -> Size {
        let max_height = scenario
            .nodes
            .iter()
            .map(|n| self.node_height(n))
            .fold(self.node_height, f64::max);
        let max_width = scenario
            .nodes
            .iter()
            .map(|n| self.node_width(n))
            .fold(self.node_width, f64::max);
        Size::new(
            max_height + self.footprint_cross_margin,
            max_width + self.footprint_depth_margin,
        )
    }
}

/// A scenario node with its layout-space position (`x` along a layer, `y` = depth).
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode<'a> {
    pub node: &'a Node,
    pub x: f64,
    pub y: f64,
}

impl LayoutNode<'_> {
    /// Canvas-space point (axes swapped, offset not applied).
    pub fn canvas(&self) -> Point {
        Point::new(self.y, self.x)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeGeometry {
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub annotation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgePath {
    pub source: String,
    pub target: String,
    pub points: Vec<Point>,
    /// Edge ends in an annotation-layer node.
    pub annotation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderGeometry {
    pub nodes: IndexMap<String, NodeGeometry>,
    pub edges: Vec<EdgePath>,
    pub bounds: Bounds,
    pub width: f64,
    pub height: f64,
    pub offset: Point,
    pub footprint: Size,
}

impl RenderGeometry {
    pub fn to_canvas(&self, p: Point) -> Point {
        Point::new(p.x + self.offset.x, p.y + self.offset.y)
    }

    pub fn node(&self, id: &str) -> Option<&NodeGeometry> {
        self.nodes.get(id)
    }
}

/// Runs the layout black box and wraps every scenario node with its position.
pub fn layout_nodes<'a>(
    scenario: &'a Scenario,
    layout: &dyn DagLayout,
    footprint: Size,
) -> Result<Vec<LayoutNode<'a>>> {
    let ids: Vec<&str> = scenario.nodes.iter().map(|n| n.id.as_str()).collect();
    let edges: Vec<(&str, &str)> = scenario
        .links
        .iter()
        .map(|e| (e.source(), e.target()))
        .collect();
    let out = layout.layout(&ids, &edges, footprint)?;

    Ok(scenario
        .nodes
        .iter()
        .map(|node| {
            let p = out.nodes.get(&node.id).copied().unwrap_or_default();
            LayoutNode {
                node,
                x: p.x,
                y: p.y,
            }
        })
        .collect())
}

/// Forces the selected nodes onto one visual row and hangs the annotation node beside it.
///
/// Members get the mean of their cross-axis coordinates. The annotation node is centered on
/// the midpoint of the row's depth span and moved `annotation_row_offset` footprints past
/// the row on the cross axis. No-op when nothing is selected.
pub fn align_row(
    nodes: &mut [LayoutNode<'_>],
    align: &RowAlignment,
    footprint: Size,
    config: &GeometryConfig,
) {
    let members: Vec<usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| align.selects(n.node))
        .map(|(i, _)| i)
        .collect();
    if members.is_empty() {
        return;
    }

    let row_x = members.iter().map(|i| nodes[*i].x).sum::<f64>() / members.len() as f64;
    for i in &members {
        nodes[*i].x = row_x;
    }

    let Some(annotation_id) = align.annotation.as_deref() else {
        return;
    };
    let Some(annotation) = nodes.iter().position(|n| n.node.id == annotation_id) else {
        return;
    };
    let min_y = members
        .iter()
        .map(|i| nodes[*i].y)
        .fold(f64::INFINITY, f64::min);
    let max_y = members
        .iter()
        .map(|i| nodes[*i].y)
        .fold(f64::NEG_INFINITY, f64::max);
    nodes[annotation].y = (min_y + max_y) / 2.0;
    nodes[annotation].x = row_x + footprint.width * config.annotation_row_offset;
}

/// Sizes, bounding box, canvas offset and edge paths for already positioned nodes.
pub fn compute_geometry(
    scenario: &Scenario,
    nodes: &[LayoutNode<'_>],
    footprint: Size,
    config: &GeometryConfig,
) -> RenderGeometry {
    let mut geometry_nodes: IndexMap<String, NodeGeometry> = IndexMap::with_capacity(nodes.len());
    for n in nodes {
        geometry_nodes.insert(
            n.node.id.clone(),
            NodeGeometry {
                center: n.canvas(),
                width: config.node_width(n.node),
                height: config.node_height(n.node),
                annotation: n.node.is_annotation(),
            },
        );
    }

    let bounds = if geometry_nodes.is_empty() {
        Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        }
    } else {
        let mut b = Bounds {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for g in geometry_nodes.values() {
            b.min_x = b.min_x.min(g.center.x);
            b.min_y = b.min_y.min(g.center.y);
            b.max_x = b.max_x.max(g.center.x);
            b.max_y = b.max_y.max(g.center.y);
        }
        b
    };

    let width = config
        .min_width
        .max(bounds.max_x - bounds.min_x + config.padding_x * 2.0);
    let height = config
        .min_height
        .max(bounds.max_y - bounds.min_y + config.padding_y * 2.0);
    let offset = Point::new(
        -bounds.min_x + config.padding_x,
        -bounds.min_y + config.padding_y,
    );

    let edges = scenario
        .links
        .iter()
        .filter_map(|e| {
            let s = geometry_nodes.get(e.source())?;
            let t = geometry_nodes.get(e.target())?;
            Some(edge_path(e.source(), e.target(), s, t, config.elbow_gap))
        })
        .collect();

    RenderGeometry {
        nodes: geometry_nodes,
        edges,
        bounds,
        width,
        height,
        offset,
        footprint,
    }
}

/// Straight for ordinary edges. Edges into annotation nodes are elbows whose horizontal
/// run sits `elbow_gap` above the target's top edge.
pub fn edge_path(
    source: &str,
    target: &str,
    s: &NodeGeometry,
    t: &NodeGeometry,
    elbow_gap: f64,
) -> EdgePath {
    let points = if t.annotation {
        let elbow_y = t.center.y - t.height / 2.0 - elbow_gap.max(0.0);
        vec![
            s.center,
            Point::new(s.center.x, elbow_y),
            Point::new(t.center.x, elbow_y),
            t.center,
        ]
    } else {
        vec![s.center, t.center]
    };
    EdgePath {
        source: source.to_string(),
        target: target.to_string(),
        points,
        annotation: t.annotation,
    }
}

/// One full geometry pass: layout, optional row alignment, normalization.
pub fn build_geometry<'a>(
    scenario: &'a Scenario,
    layout: &dyn DagLayout,
    config: &GeometryConfig,
) -> Result<(Vec<LayoutNode<'a>>, RenderGeometry)> {
    let footprint = config.footprint(scenario);
    let mut nodes = layout_nodes(scenario, layout, footprint)?;
    if let Some(align) = &scenario.align_row {
        align_row(&mut nodes, align, footprint, config);
    }
    let geometry = compute_geometry(scenario, &nodes, footprint, config);
    tracing::debug!(
        scenario = %scenario.id,
        width = geometry.width,
        height = geometry.height,
        "computed geometry"
    );
    Ok((nodes, geometry))
}
