#![forbid(unsafe_code)]

//! Scenario model for build-state DAG diagrams.
//!
//! A scenario is an immutable description of one pipeline run: the nodes (sources, staging
//! models, marts, data tests), the dependency edges between them and the state each node
//! ended up in. Scenarios are defined once, validated, and then only read.

pub mod catalog;
pub mod model;
mod validate;

pub use catalog::{builtin, load_scenarios, parse_scenarios};
pub use model::{
    Column, Edge, Layer, Node, NotePlacement, RowAlignment, Scenario, Status, Trigger,
    TriggerKind,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("scenario {scenario}: duplicate node id {id}")]
    DuplicateNode { scenario: String, id: String },
    #[error("scenario {scenario}: edge {from} -> {to} references unknown node {id}")]
    UnknownEdgeEndpoint {
        scenario: String,
        from: String,
        to: String,
        id: String,
    },
    #[error("scenario {scenario}: {field} references unknown node {id}")]
    UnknownReference {
        scenario: String,
        field: &'static str,
        id: String,
    },
    #[error("duplicate scenario id: {id}")]
    DuplicateScenario { id: String },
    #[error("built-in scenario catalog is invalid: {message}")]
    Catalog { message: String },
    #[error("unsupported scenario file extension: {path}")]
    UnsupportedFormat { path: String },
    #[error("scenario JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("scenario YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
