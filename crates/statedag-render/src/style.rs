//! Static status / layer style tables.
//!
//! Lookups are total: tags without an entry (`Status::Unknown`, `Layer::Other`) resolve to
//! the fallback entries.

use statedag_core::{Layer, Node, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusStyle {
    pub fill: &'static str,
    pub stroke: &'static str,
    pub text: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerStyle {
    pub label: &'static str,
    pub fill: &'static str,
    pub text: &'static str,
}

pub const FALLBACK_STATUS: StatusStyle = StatusStyle {
    fill: "#ffe7d8",
    stroke: "#fe6703",
    text: "#475569",
    label: "",
};

pub const FALLBACK_LAYER: LayerStyle = LayerStyle {
    label: "Layer",
    fill: "rgba(255, 255, 255, 0.92)",
    text: "#0f172a",
};

fn status_entry(status: &Status) -> Option<StatusStyle> {
    let style = match status {
        Status::Fresh => StatusStyle {
            fill: "#d1fae5",
            text: "#03543f",
            stroke: "#6ee7b7",
            label: "Source fresh",
        },
        Status::Built => StatusStyle {
            fill: "#ffe7d8",
            text: "#7c2d12",
            stroke: "#fe6703",
            label: "Model built",
        },
        Status::Blocked => StatusStyle {
            fill: "#ffe4e6",
            text: "#9f1239",
            stroke: "#fb7185",
            label: "Build blocked",
        },
        Status::Stale => StatusStyle {
            fill: "#fff7d6",
            text: "#92400e",
            stroke: "#fcd34d",
            label: "Source stale",
        },
        Status::SlaOk => StatusStyle {
            fill: "#ede9fe",
            text: "#4338ca",
            stroke: "#c4b5fd",
            label: "Within SLA",
        },
        Status::Warning => StatusStyle {
            fill: "#fef3c7",
            text: "#92400e",
            stroke: "#f59e0b",
            label: "Downstream warning",
        },
        Status::TestPass => StatusStyle {
            fill: "#dbeafe",
            text: "#075985",
            stroke: "#38bdf8",
            label: "Test passed",
        },
        Status::Reusable => StatusStyle {
            fill: "#f8fafc",
            text: "#475569",
            stroke: "#94a3b8",
            label: "Reused",
        },
        Status::Unknown(_) => return None,
    };
    Some(style)
}

const MODEL_LAYER_FILL: &str = "rgba(255, 255, 255, 0.92)";

fn layer_entry(layer: &Layer) -> Option<LayerStyle> {
    let (label, fill, text) = match layer {
        Layer::Source => ("Source", MODEL_LAYER_FILL, "#0f172a"),
        Layer::Staging => ("Staging", MODEL_LAYER_FILL, "#0f172a"),
        Layer::Intermediate => ("Int", MODEL_LAYER_FILL, "#0f172a"),
        Layer::Dim | Layer::Fact => ("Mart", MODEL_LAYER_FILL, "#0f172a"),
        Layer::Test => ("Test", "rgba(219, 234, 254, 0.65)", "#075985"),
        Layer::Other(_) => return None,
    };
    Some(LayerStyle { label, fill, text })
}

pub fn status_style(status: &Status) -> StatusStyle {
    status_entry(status).unwrap_or(FALLBACK_STATUS)
}

pub fn layer_style(layer: &Layer) -> LayerStyle {
    layer_entry(layer).unwrap_or(FALLBACK_LAYER)
}

/// Status line shown under the node name: the node's own override, else the table label,
/// else the raw status tag.
pub fn status_label(node: &Node) -> String {
    if let Some(label) = node.status_label.as_deref() {
        return label.to_string();
    }
    let style = status_style(&node.status);
    if style.label.is_empty() {
        node.status.as_str().to_string()
    } else {
        style.label.to_string()
    }
}

pub const EDGE_COLOR: &str = "#ea580c";
pub const ANNOTATION_EDGE_COLOR: &str = "#38bdf8";
pub const NODE_TEXT_COLOR: &str = "#0f172a";
pub const NOTE_COLOR: &str = "#64748b";
pub const DIVIDER_COLOR: &str = "rgba(15, 23, 42, 0.12)";
pub const NEW_BADGE_COLOR: &str = "#fe6703";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_uses_the_fallback_colors() {
        let style = status_style(&Status::Unknown("exploded".to_string()));
        assert_eq!(style, FALLBACK_STATUS);
        let node = Node::new("x", Layer::Source, Status::Unknown("exploded".to_string()));
        assert_eq!(status_label(&node), "exploded");
    }

    #[test]
    fn unknown_layer_is_labelled_layer() {
        assert_eq!(layer_style(&Layer::Other("snapshot".to_string())).label, "Layer");
        assert_eq!(layer_style(&Layer::Intermediate).label, "Int");
    }

    #[test]
    fn custom_status_label_wins() {
        let mut node = Node::new("x", Layer::Staging, Status::Built);
        assert_eq!(status_label(&node), "Model built");
        node.status_label = Some("Modified, rebuilt".to_string());
        assert_eq!(status_label(&node), "Modified, rebuilt");
    }
}
