//! Scenario data model.
//!
//! Status and layer tags are closed enums with an explicit catch-all variant: unknown tags
//! deserialize successfully and resolve to the documented fallback styles later on.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Fresh,
    Built,
    Blocked,
    Stale,
    SlaOk,
    Warning,
    TestPass,
    Reusable,
    Unknown(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Fresh => "fresh",
            Status::Built => "built",
            Status::Blocked => "blocked",
            Status::Stale => "stale",
            Status::SlaOk => "sla-ok",
            Status::Warning => "warning",
            Status::TestPass => "test-pass",
            Status::Reusable => "reusable",
            Status::Unknown(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for Status {
    fn from(value: &str) -> Self {
        match value.trim() {
            "fresh" => Status::Fresh,
            "built" => Status::Built,
            "blocked" => Status::Blocked,
            "stale" => Status::Stale,
            "sla-ok" => Status::SlaOk,
            "warning" => Status::Warning,
            "test-pass" => Status::TestPass,
            "reusable" => Status::Reusable,
            other => Status::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        Status::from(value.as_str())
    }
}

impl From<Status> for String {
    fn from(value: Status) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Layer {
    Source,
    Staging,
    Intermediate,
    Dim,
    Fact,
    /// Annotation layer (data tests and other non-pipeline artifacts).
    Test,
    Other(String),
}

impl Layer {
    pub fn as_str(&self) -> &str {
        match self {
            Layer::Source => "source",
            Layer::Staging => "staging",
            Layer::Intermediate => "intermediate",
            Layer::Dim => "dim",
            Layer::Fact => "fact",
            Layer::Test => "test",
            Layer::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self, Layer::Test)
    }
}

impl From<&str> for Layer {
    fn from(value: &str) -> Self {
        match value.trim() {
            "source" => Layer::Source,
            "staging" => Layer::Staging,
            "intermediate" => Layer::Intermediate,
            "dim" => Layer::Dim,
            "fact" => Layer::Fact,
            "test" => Layer::Test,
            other => Layer::Other(other.to_string()),
        }
    }
}

impl From<String> for Layer {
    fn from(value: String) -> Self {
        Layer::from(value.as_str())
    }
}

impl From<Layer> for String {
    fn from(value: Layer) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotePlacement {
    #[default]
    Inline,
    Below,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub layer: Layer,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub note_placement: NotePlacement,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl Node {
    pub fn new(id: impl Into<String>, layer: Layer, status: Status) -> Self {
        Self {
            id: id.into(),
            label: None,
            layer,
            status,
            note: None,
            note_placement: NotePlacement::Inline,
            columns: Vec::new(),
            status_label: None,
            width: None,
        }
    }

    /// Display label, falling back to the id.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn is_annotation(&self) -> bool {
        self.layer.is_annotation()
    }

    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// Directed `(source, target)` pair, serialized as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge(pub String, pub String);

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self(source.into(), target.into())
    }

    pub fn source(&self) -> &str {
        &self.0
    }

    pub fn target(&self) -> &str {
        &self.1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    PullRequest,
    Schedule,
    #[default]
    #[serde(other)]
    Manual,
}

/// What started the run pictured by a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub label: String,
    #[serde(default)]
    pub kind: TriggerKind,
    #[serde(default)]
    pub files_changed: Vec<String>,
    /// Nodes touched by the change.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Nodes that must render on one visual row, optionally with an annotation node hung
/// just outside it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowAlignment {
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub annotation: Option<String>,
}

impl RowAlignment {
    pub fn selects(&self, node: &Node) -> bool {
        if self.annotation.as_deref() == Some(node.id.as_str()) {
            return false;
        }
        self.layers.contains(&node.layer) || self.nodes.iter().any(|id| *id == node.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_row: Option<RowAlignment>,
}

impl Scenario {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Parent ids of `id`, in edge order.
    pub fn parents<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.links
            .iter()
            .filter(move |e| e.target() == id)
            .map(Edge::source)
    }

    /// Output file name for an exported artifact, e.g. `all-built.png`.
    pub fn artifact_name(&self, extension: &str) -> String {
        format!("{}.{extension}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tags_deserialize_into_catch_all_variants() {
        let node: Node = serde_json::from_str(
            r#"{"id":"x","layer":"snapshot","status":"exploded"}"#,
        )
        .unwrap();
        assert_eq!(node.layer, Layer::Other("snapshot".to_string()));
        assert_eq!(node.status, Status::Unknown("exploded".to_string()));
        assert_eq!(node.display_label(), "x");
    }

    #[test]
    fn tags_round_trip_through_their_wire_names() {
        for raw in ["sla-ok", "test-pass", "reusable", "fresh"] {
            assert_eq!(Status::from(raw).as_str(), raw);
        }
        assert_eq!(serde_json::to_string(&Layer::Intermediate).unwrap(), "\"intermediate\"");
    }

    #[test]
    fn edges_are_two_element_arrays() {
        let e: Edge = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!((e.source(), e.target()), ("a", "b"));
    }

    #[test]
    fn row_alignment_never_selects_its_annotation() {
        let align = RowAlignment {
            layers: vec![Layer::Test],
            nodes: vec![],
            annotation: Some("t".to_string()),
        };
        assert!(!align.selects(&Node::new("t", Layer::Test, Status::Reusable)));
        assert!(align.selects(&Node::new("u", Layer::Test, Status::Reusable)));
    }
}
