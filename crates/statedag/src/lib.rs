#![forbid(unsafe_code)]

//! `statedag` draws build-state DAG diagrams: which sources were fresh, which models were
//! built, reused or blocked, and which tests ran, for one pipeline run per scenario.
//!
//! The crate ties the pieces together:
//! - scenario model and catalog (`statedag-core`, re-exported at the root)
//! - layered DAG layout (`strata`)
//! - geometry and SVG rendering (`statedag-render`, as [`render`])
//! - stylesheet inlining, font loading and PNG export ([`resources`], [`fonts`], [`export`])
//!
//! # Features
//!
//! - `raster` (default): PNG export through `resvg`

pub use statedag_core::*;
pub use strata;

pub mod export;
pub mod fonts;
pub mod resources;

pub mod render {
    pub use statedag_render::geometry::{
        Bounds, EdgePath, LayoutNode, NodeGeometry, align_row, build_geometry,
    };
    pub use statedag_render::style::{LayerStyle, StatusStyle, layer_style, status_style};
    pub use statedag_render::svg::{Element, SvgDocument, SvgNode, escape_attr, escape_text};
    pub use statedag_render::text::{DeterministicTextMeasurer, TextMeasurer, TextStyle};
    pub use statedag_render::{
        Error, GeometryConfig, RenderGeometry, RenderOptions, RenderedDiagram, render_diagram,
        render_scenario,
    };
}

pub use export::{ArtifactSink, DirectorySink, ExportError, ExportOptions, ExportOutcome, Exporter};

use render::{GeometryConfig, RenderOptions, RenderedDiagram, TextMeasurer};

/// Measurer used by [`render_default`]: installed fonts with the `raster` feature, the
/// deterministic estimate without it.
pub fn default_text_measurer() -> &'static dyn TextMeasurer {
    #[cfg(feature = "raster")]
    {
        static MEASURER: std::sync::OnceLock<fonts::FontdbTextMeasurer> =
            std::sync::OnceLock::new();
        MEASURER.get_or_init(fonts::FontdbTextMeasurer::system)
    }
    #[cfg(not(feature = "raster"))]
    {
        static MEASURER: render::DeterministicTextMeasurer = render::DeterministicTextMeasurer {
            char_width_factor: 0.0,
            line_height_factor: 0.0,
            bold_factor: 0.0,
        };
        &MEASURER
    }
}

/// Renders a scenario with the default layout, geometry and text measurement.
pub fn render_default(scenario: &Scenario) -> std::result::Result<RenderedDiagram, render::Error> {
    render::render_scenario(
        scenario,
        &strata::Sugiyama::new(),
        &GeometryConfig::default(),
        default_text_measurer(),
        &RenderOptions::default(),
    )
}
