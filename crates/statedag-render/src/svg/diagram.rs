use super::{Element, SvgDocument, XHTML_NS, SVG_NS, fmt};
use crate::geometry::{EdgePath, NodeGeometry, RenderGeometry};
use crate::style::{
    self, ANNOTATION_EDGE_COLOR, DIVIDER_COLOR, EDGE_COLOR, NEW_BADGE_COLOR, NODE_TEXT_COLOR,
    NOTE_COLOR,
};
use crate::text::{TextMeasurer, TextStyle, truncate_to_width};
use crate::RenderOptions;
use statedag_core::{Column, Node, NotePlacement, Scenario, Status};
use strata::Point;

/// Width reserved at the left of ordinary nodes for the layer badge.
const LAYER_WIDTH: f64 = 84.0;
const TEXT_COLUMN: f64 = 96.0;
const ANNOTATION_INSET: f64 = 24.0;
const ICON_SIZE: f64 = 20.0;

const COLUMN_ROW_HEIGHT: f64 = 22.0;
const COLUMN_ROW_GAP: f64 = 2.0;
const COLUMN_ROWS: usize = 3;
/// Distance from a column node's top edge to its first column row.
const COLUMN_TABLE_TOP: f64 = 84.0;

const CALLOUT_WIDTH: f64 = 320.0;

/// Draws one scenario from its computed geometry.
///
/// Pure: the same inputs always give the same document. Nodes missing from the geometry
/// are skipped.
pub fn render_diagram(
    scenario: &Scenario,
    geometry: &RenderGeometry,
    measurer: &dyn TextMeasurer,
    options: &RenderOptions,
) -> SvgDocument {
    let mut root = Element::new("svg")
        .attr("xmlns", SVG_NS)
        .attr(
            "viewBox",
            format!("0 0 {} {}", fmt(geometry.width), fmt(geometry.height)),
        )
        .attr("class", "statedag")
        .attr("data-scenario", &scenario.id)
        .attr("font-family", &options.font_family);

    root.push(Element::new("title").text(scenario.title.as_str()));
    root.push(markers(&scenario.id));
    root.push(edges(&scenario.id, geometry));

    let painter = NodePainter {
        scenario,
        measurer,
        options,
    };
    let mut nodes = Element::new("g").attr("class", "nodes");
    for node in &scenario.nodes {
        let Some(g) = geometry.node(&node.id) else {
            continue;
        };
        nodes.push(painter.node(node, g, geometry.to_canvas(g.center)));
    }
    root.push(nodes);

    if options.trigger_overlay {
        if let Some(callout) = trigger_callout(scenario) {
            root.push(callout);
        }
    }

    SvgDocument::new(root)
}

fn arrow_id(scenario_id: &str) -> String {
    format!("arrowhead-{scenario_id}")
}

fn annotation_arrow_id(scenario_id: &str) -> String {
    format!("arrowhead-test-{scenario_id}")
}

fn markers(scenario_id: &str) -> Element {
    let marker = |id: String, color: &str| {
        Element::new("marker")
            .attr("id", id)
            .attr("viewBox", "0 -5 10 10")
            .attr("refX", 10)
            .attr("refY", 0)
            .attr("markerWidth", 6)
            .attr("markerHeight", 6)
            .attr("orient", "auto")
            .child(
                Element::new("path")
                    .attr("fill", color)
                    .attr("d", "M0,-5L10,0L0,5"),
            )
    };
    Element::new("defs")
        .child(marker(arrow_id(scenario_id), EDGE_COLOR))
        .child(marker(annotation_arrow_id(scenario_id), ANNOTATION_EDGE_COLOR))
}

fn edges(scenario_id: &str, geometry: &RenderGeometry) -> Element {
    let mut group = Element::new("g")
        .attr("class", "edges")
        .attr("fill", "none")
        .attr("stroke-linecap", "round")
        .attr("stroke-linejoin", "round");

    for edge in &geometry.edges {
        let (Some(s), Some(t)) = (geometry.node(&edge.source), geometry.node(&edge.target)) else {
            continue;
        };
        let points: Vec<Point> = clipped_points(edge, s, t)
            .into_iter()
            .map(|p| geometry.to_canvas(p))
            .collect();
        let mut path = Element::new("path")
            .attr("d", path_data(&points))
            .attr("stroke-width", 3.2)
            .attr("data-source", &edge.source)
            .attr("data-target", &edge.target);
        if edge.annotation {
            path.set_attr("stroke", ANNOTATION_EDGE_COLOR);
            path.set_attr("stroke-opacity", 0.95);
            path.set_attr("stroke-dasharray", "12 6");
            path.set_attr(
                "marker-end",
                format!("url(#{})", annotation_arrow_id(scenario_id)),
            );
        } else {
            path.set_attr("stroke", EDGE_COLOR);
            path.set_attr("stroke-opacity", 0.92);
            path.set_attr("marker-end", format!("url(#{})", arrow_id(scenario_id)));
        }
        group.push(path);
    }
    group
}

/// Trims an edge path so it starts and ends on node borders instead of node centers.
///
/// Straight edges are clipped at both ends. The final drop of an elbow edge stops on the
/// target's top edge.
fn clipped_points(edge: &EdgePath, s: &NodeGeometry, t: &NodeGeometry) -> Vec<Point> {
    let mut points = edge.points.clone();
    if points.len() < 2 {
        return points;
    }
    points[0] = clip_to_box(s, points[1]);
    if edge.annotation && points.len() == 4 {
        points[3] = Point::new(t.center.x, t.center.y - t.height / 2.0);
    } else {
        let last = points.len() - 1;
        points[last] = clip_to_box(t, points[last - 1]);
    }
    points
}

/// Point where the ray from the node center toward `toward` leaves the node box.
fn clip_to_box(node: &NodeGeometry, toward: Point) -> Point {
    let c = node.center;
    let dx = toward.x - c.x;
    let dy = toward.y - c.y;
    if dx == 0.0 && dy == 0.0 {
        return c;
    }
    let tx = if dx == 0.0 {
        f64::INFINITY
    } else {
        (node.width / 2.0) / dx.abs()
    };
    let ty = if dy == 0.0 {
        f64::INFINITY
    } else {
        (node.height / 2.0) / dy.abs()
    };
    let t = tx.min(ty);
    if t >= 1.0 {
        return c;
    }
    Point::new(c.x + dx * t, c.y + dy * t)
}

fn path_data(points: &[Point]) -> String {
    let mut d = String::new();
    for (i, p) in points.iter().enumerate() {
        d.push(if i == 0 { 'M' } else { 'L' });
        d.push_str(&fmt(p.x));
        d.push(',');
        d.push_str(&fmt(p.y));
    }
    d
}

struct NodePainter<'a> {
    scenario: &'a Scenario,
    measurer: &'a dyn TextMeasurer,
    options: &'a RenderOptions,
}

impl NodePainter<'_> {
    fn node(&self, node: &Node, g: &NodeGeometry, at: Point) -> Element {
        let status = style::status_style(&node.status);
        let layer = style::layer_style(&node.layer);
        let (w, h) = (g.width, g.height);
        let left = -w / 2.0;
        let top = -h / 2.0;

        let mut group = Element::new("g")
            .attr("class", if g.annotation { "node annotation" } else { "node" })
            .attr("data-id", &node.id)
            .attr("data-status", node.status.as_str())
            .attr("transform", format!("translate({}, {})", fmt(at.x), fmt(at.y)));

        group.push(
            Element::new("rect")
                .attr("class", "node-shape")
                .attr("x", fmt(left))
                .attr("y", fmt(top))
                .attr("width", fmt(w))
                .attr("height", fmt(h))
                .attr("rx", fmt(if g.annotation { 18.0 } else { (h / 2.0).min(40.0) }))
                .attr("fill", status.fill)
                .attr("stroke", status.stroke)
                .attr("stroke-width", 1.4),
        );

        // Vertical anchors for name / status / note.
        let (text_x, name_y, status_y, note_y) = if g.annotation {
            let label_y = top + 24.0;
            group.push(
                Element::new("text")
                    .attr("class", "layer-label")
                    .attr("x", fmt(left + ANNOTATION_INSET))
                    .attr("y", fmt(label_y))
                    .attr("text-anchor", "start")
                    .attr("font-size", 12)
                    .attr("font-weight", 600)
                    .attr("fill", layer.text)
                    .text(layer.label),
            );
            let name_y = label_y + 42.0;
            (left + ANNOTATION_INSET, name_y, name_y + 30.0, name_y + 60.0)
        } else {
            group.push(
                Element::new("rect")
                    .attr("class", "layer-badge")
                    .attr("x", fmt(left + 16.0))
                    .attr("y", fmt(top + 12.0))
                    .attr("width", 64)
                    .attr("height", 32)
                    .attr("rx", 16)
                    .attr("fill", status.fill)
                    .attr("opacity", 0.18),
            );
            group.push(
                Element::new("line")
                    .attr("class", "layer-divider")
                    .attr("x1", fmt(left + LAYER_WIDTH))
                    .attr("x2", fmt(left + LAYER_WIDTH))
                    .attr("y1", fmt(top + 8.0))
                    .attr("y2", fmt(h / 2.0 - 8.0))
                    .attr("stroke", DIVIDER_COLOR)
                    .attr("stroke-width", 1),
            );
            group.push(
                Element::new("text")
                    .attr("class", "layer-label")
                    .attr("x", fmt(left + 48.0))
                    .attr("y", fmt(top + 30.0))
                    .attr("text-anchor", "middle")
                    .attr("font-size", 11)
                    .attr("font-weight", 600)
                    .attr("fill", layer.text)
                    .text(layer.label),
            );
            if node.has_columns() {
                (left + TEXT_COLUMN, top + 36.0, top + 54.0, top + 72.0)
            } else {
                (left + TEXT_COLUMN, -4.0, 14.0, 32.0)
            }
        };

        let text_right = w / 2.0 - 16.0 - self.icon_slots(node) as f64 * (ICON_SIZE + 4.0);
        let name_style = TextStyle::sized(16.0)
            .weight(600)
            .family(self.options.font_family.as_str());
        let name = truncate_to_width(
            self.measurer,
            node.display_label(),
            &name_style,
            (text_right - text_x).max(0.0),
        );
        group.push(
            text_line(text_x, name_y, 16.0)
                .attr("class", "node-name")
                .attr("font-weight", 600)
                .attr("fill", NODE_TEXT_COLOR)
                .text(name),
        );
        group.push(
            text_line(text_x, status_y, 12.0)
                .attr("class", "node-status")
                .attr("font-weight", 500)
                .attr("fill", status.text)
                .text(style::status_label(node)),
        );

        if let Some(note) = node.note.as_deref().filter(|n| !n.is_empty()) {
            let (x, y) = match node.note_placement {
                NotePlacement::Inline => (text_x, note_y),
                NotePlacement::Below => (left + 16.0, h / 2.0 + 20.0),
            };
            group.push(
                text_line(x, y, 11.0)
                    .attr("class", "node-note")
                    .attr("fill", NOTE_COLOR)
                    .text(note),
            );
        }

        let mut icon_x = w / 2.0 - 16.0 - ICON_SIZE;
        if node.status == Status::Reusable {
            group.push(self.icon("reused.svg", icon_x, top + 12.0, ICON_SIZE));
            icon_x -= ICON_SIZE + 4.0;
        }
        if self.touched_by_trigger(node) {
            group.push(self.icon("pull-request.svg", icon_x, top + 12.0, ICON_SIZE));
        }

        if node.has_columns() && !g.annotation {
            group.push(self.column_table(&node.columns, w, top + COLUMN_TABLE_TOP));
        }
        group
    }

    fn touched_by_trigger(&self, node: &Node) -> bool {
        self.scenario
            .trigger
            .as_ref()
            .is_some_and(|t| t.nodes.iter().any(|id| *id == node.id))
    }

    fn icon_slots(&self, node: &Node) -> usize {
        usize::from(node.status == Status::Reusable) + usize::from(self.touched_by_trigger(node))
    }

    fn icon(&self, file: &str, x: f64, y: f64, size: f64) -> Element {
        let base = self.options.icon_base.trim_end_matches('/');
        let href = if base.is_empty() {
            file.to_string()
        } else {
            format!("{base}/{file}")
        };
        Element::new("image")
            .attr("href", href)
            .attr("x", fmt(x))
            .attr("y", fmt(y))
            .attr("width", fmt(size))
            .attr("height", fmt(size))
    }

    /// Pill rows for the first three columns, then a "+N more" row.
    fn column_table(&self, columns: &[Column], w: f64, y0: f64) -> Element {
        let left = -w / 2.0 + 16.0;
        let pill_width = w - 32.0;
        let label_style = TextStyle::sized(12.0)
            .weight(500)
            .family(self.options.font_family.as_str());
        let mut table = Element::new("g").attr("class", "column-table");

        for (i, column) in columns.iter().take(COLUMN_ROWS).enumerate() {
            let y = y0 + i as f64 * (COLUMN_ROW_HEIGHT + COLUMN_ROW_GAP);
            let mid = y + COLUMN_ROW_HEIGHT / 2.0;
            let mut row = Element::new("g")
                .attr("class", "column-row")
                .attr("data-column", &column.name);
            row.push(
                Element::new("rect")
                    .attr("x", fmt(left))
                    .attr("y", fmt(y))
                    .attr("width", fmt(pill_width))
                    .attr("height", fmt(COLUMN_ROW_HEIGHT))
                    .attr("rx", fmt(COLUMN_ROW_HEIGHT / 2.0))
                    .attr("fill", "rgba(255, 255, 255, 0.75)")
                    .attr("stroke", DIVIDER_COLOR),
            );

            let mut label_x = left + 10.0;
            if column.key {
                row.push(
                    self.icon("key.svg", label_x, mid - 6.0, 12.0)
                        .attr("class", "column-key"),
                );
                label_x += 16.0;
            }

            let mut label_right = left + pill_width - 10.0;
            if column.new {
                let cx = label_right - 8.0;
                row.push(
                    Element::new("circle")
                        .attr("class", "column-new")
                        .attr("cx", fmt(cx))
                        .attr("cy", fmt(mid))
                        .attr("r", 8)
                        .attr("fill", NEW_BADGE_COLOR),
                );
                row.push(
                    Element::new("text")
                        .attr("x", fmt(cx))
                        .attr("y", fmt(mid))
                        .attr("text-anchor", "middle")
                        .attr("dominant-baseline", "central")
                        .attr("font-size", 9)
                        .attr("font-weight", 700)
                        .attr("fill", "#ffffff")
                        .text("N"),
                );
                label_right = cx - 14.0;
            }

            let label = truncate_to_width(
                self.measurer,
                &column.name,
                &label_style,
                (label_right - label_x).max(0.0),
            );
            row.push(
                text_line(label_x, mid, 12.0)
                    .attr("class", "column-label")
                    .attr("font-weight", 500)
                    .attr("fill", NODE_TEXT_COLOR)
                    .text(label),
            );
            table.push(row);
        }

        if columns.len() > COLUMN_ROWS {
            let y = y0 + COLUMN_ROWS as f64 * (COLUMN_ROW_HEIGHT + COLUMN_ROW_GAP);
            table.push(
                text_line(left + 10.0, y + COLUMN_ROW_HEIGHT / 2.0, 11.0)
                    .attr("class", "column-more")
                    .attr("fill", NOTE_COLOR)
                    .text(format!("+{} more", columns.len() - COLUMN_ROWS)),
            );
        }
        table
    }
}

fn text_line(x: f64, y: f64, size: f64) -> Element {
    Element::new("text")
        .attr("x", fmt(x))
        .attr("y", fmt(y))
        .attr("text-anchor", "start")
        .attr("alignment-baseline", "middle")
        .attr("font-size", fmt(size))
}

/// Rich HTML callout naming the trigger and the files it changed.
fn trigger_callout(scenario: &Scenario) -> Option<Element> {
    let trigger = scenario.trigger.as_ref()?;
    let height = 48.0 + 20.0 * trigger.files_changed.len() as f64;

    let mut list = Element::new("ul");
    for file in &trigger.files_changed {
        list.push(Element::new("li").text(file.as_str()));
    }
    let body = Element::new("div")
        .attr("xmlns", XHTML_NS)
        .attr("class", "trigger-callout")
        .child(Element::new("strong").text(trigger.label.as_str()))
        .child(list);

    Some(
        Element::new("foreignObject")
            .attr("x", 24)
            .attr("y", 24)
            .attr("width", fmt(CALLOUT_WIDTH))
            .attr("height", fmt(height))
            .child(body),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(x: f64, y: f64, annotation: bool) -> NodeGeometry {
        NodeGeometry {
            center: Point::new(x, y),
            width: 100.0,
            height: 40.0,
            annotation,
        }
    }

    #[test]
    fn straight_edges_stop_at_the_node_borders() {
        let s = geom(0.0, 0.0, false);
        let t = geom(200.0, 0.0, false);
        let edge = EdgePath {
            source: "s".into(),
            target: "t".into(),
            points: vec![s.center, t.center],
            annotation: false,
        };
        let pts = clipped_points(&edge, &s, &t);
        assert_eq!(pts, vec![Point::new(50.0, 0.0), Point::new(150.0, 0.0)]);
    }

    #[test]
    fn elbow_edges_end_on_the_target_top_edge() {
        let s = geom(0.0, 0.0, false);
        let t = geom(200.0, 180.0, true);
        let edge = EdgePath {
            source: "s".into(),
            target: "t".into(),
            points: vec![
                s.center,
                Point::new(0.0, 120.0),
                Point::new(200.0, 120.0),
                t.center,
            ],
            annotation: true,
        };
        let pts = clipped_points(&edge, &s, &t);
        assert_eq!(
            pts,
            vec![
                Point::new(0.0, 20.0),
                Point::new(0.0, 120.0),
                Point::new(200.0, 120.0),
                Point::new(200.0, 160.0),
            ]
        );
    }

    #[test]
    fn path_data_is_compact() {
        let d = path_data(&[Point::new(1.5, 2.0), Point::new(10.0, -3.25)]);
        assert_eq!(d, "M1.5,2L10,-3.25");
    }
}
