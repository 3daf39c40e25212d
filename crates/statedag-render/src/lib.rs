#![forbid(unsafe_code)]

//! Geometry engine and SVG renderer for build-state DAG diagrams.
//!
//! `render_scenario` is the whole pipeline for one scenario: lay the DAG out through a
//! [`strata::DagLayout`], apply the optional row alignment, normalize into canvas space and
//! draw the result into an owned [`svg::SvgDocument`].

pub mod geometry;
pub mod style;
pub mod svg;
pub mod text;

pub use geometry::{GeometryConfig, RenderGeometry};
pub use svg::{SvgDocument, render_diagram};
pub use text::{DeterministicTextMeasurer, TextMeasurer};

use serde::{Deserialize, Serialize};
use statedag_core::Scenario;
use strata::DagLayout;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Layout(#[from] strata::LayoutError),
    #[error(transparent)]
    Scenario(#[from] statedag_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Path prefix for icon `href`s, relative to the asset directory.
    pub icon_base: String,
    pub font_family: String,
    /// Draw the rich trigger callout (an HTML `foreignObject`).
    pub trigger_overlay: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            icon_base: "icons".to_string(),
            font_family: "Source Sans 3, Poppins, sans-serif".to_string(),
            trigger_overlay: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedDiagram {
    pub geometry: RenderGeometry,
    pub document: SvgDocument,
}

pub fn render_scenario(
    scenario: &Scenario,
    layout: &dyn DagLayout,
    config: &GeometryConfig,
    measurer: &dyn TextMeasurer,
    options: &RenderOptions,
) -> Result<RenderedDiagram> {
    scenario.validate()?;
    let (_, geometry) = geometry::build_geometry(scenario, layout, config)?;
    let document = render_diagram(scenario, &geometry, measurer, options);
    tracing::debug!(
        scenario = %scenario.id,
        nodes = geometry.nodes.len(),
        edges = geometry.edges.len(),
        "rendered diagram"
    );
    Ok(RenderedDiagram { geometry, document })
}
