//! Standalone SVG and PNG export of rendered diagrams.
//!
//! Export never touches the live document: it works on a deep copy that is made
//! namespace-complete, stripped of HTML overlays, sized, and given the inlined stylesheet
//! as an embedded `<style>` block before being serialized (and, for PNG, rasterized).

use crate::fonts::FontMaterializer;
use crate::resources::{FileFetcher, ResourceFetcher, ResourceInliner, StyleCache, directory_url};
use serde::{Deserialize, Serialize};
use statedag_render::SvgDocument;
use statedag_render::svg::{Element, XLINK_NS, SVG_NS};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to decode the intermediate SVG: {message}")]
    Decode { message: String },
    #[error("asset directory {path} cannot be used as a URL base")]
    AssetDir { path: String },
    #[error("failed to deliver {path}: {source}")]
    Deliver {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Device pixel ratio applied to the raster surface.
    pub scale: f32,
    pub background: String,
    /// Used when the document declares neither a viewBox nor a size.
    pub fallback_width: f64,
    pub fallback_height: f64,
    /// Root stylesheet, relative to `asset_dir`.
    pub stylesheet: String,
    pub asset_dir: PathBuf,
    pub default_font_family: String,
    pub load_system_fonts: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            background: "#ffffff".to_string(),
            fallback_width: 640.0,
            fallback_height: 480.0,
            stylesheet: "styles.css".to_string(),
            asset_dir: PathBuf::from("assets"),
            default_font_family: "Source Sans 3".to_string(),
            load_system_fonts: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No diagram was handed in.
    NoDiagram,
    /// The raster surface could not be allocated or encoded.
    EmptyRaster,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Delivered {
        filename: String,
        width: u32,
        height: u32,
        bytes: usize,
    },
    Skipped(SkipReason),
}

/// Destination for finished artifacts.
pub trait ArtifactSink: Send + Sync {
    fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<(), ExportError>;
}

/// Writes artifacts into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<(), ExportError> {
        let path = self.dir.join(filename);
        let deliver_err = |source| ExportError::Deliver {
            path: path.display().to_string(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(deliver_err)?;
        std::fs::write(&path, bytes).map_err(deliver_err)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
        Ok(())
    }
}

/// A deep copy of a diagram made ready for standalone use.
#[derive(Debug, Clone)]
pub struct StandaloneSvg {
    pub xml: String,
    pub width: f64,
    pub height: f64,
    pub css: Arc<str>,
    pub removed_overlays: usize,
}

pub struct Exporter {
    options: ExportOptions,
    inliner: Arc<ResourceInliner>,
    styles: StyleCache,
    fonts: FontMaterializer,
    asset_base: Url,
    #[cfg(feature = "raster")]
    runtime: Arc<crate::fonts::FontdbRuntime>,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("options", &self.options)
            .field("asset_base", &self.asset_base.as_str())
            .field("styles", &self.styles)
            .finish_non_exhaustive()
    }
}

impl Exporter {
    /// Exporter reading assets from `options.asset_dir` on the local filesystem.
    pub fn new(options: ExportOptions) -> Result<Self, ExportError> {
        let asset_base = directory_url(&options.asset_dir).ok_or_else(|| ExportError::AssetDir {
            path: options.asset_dir.display().to_string(),
        })?;
        Ok(Self::with_fetcher(options, Arc::new(FileFetcher), asset_base))
    }

    pub fn with_fetcher(
        options: ExportOptions,
        fetcher: Arc<dyn ResourceFetcher>,
        asset_base: Url,
    ) -> Self {
        #[cfg(feature = "raster")]
        let runtime = Arc::new(crate::fonts::FontdbRuntime::new(
            fetcher.clone(),
            options.load_system_fonts,
        ));
        #[cfg(feature = "raster")]
        let fonts = FontMaterializer::new(Some(runtime.clone()));
        #[cfg(not(feature = "raster"))]
        let fonts = FontMaterializer::new(None);

        Self {
            inliner: Arc::new(ResourceInliner::new(fetcher)),
            styles: StyleCache::new(),
            fonts,
            asset_base,
            #[cfg(feature = "raster")]
            runtime,
            options,
        }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn style_cache(&self) -> &StyleCache {
        &self.styles
    }

    fn stylesheet_url(&self) -> Option<Url> {
        match self.asset_base.join(&self.options.stylesheet) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(stylesheet = %self.options.stylesheet, error = %err, "bad stylesheet path");
                None
            }
        }
    }

    /// The inlined stylesheet, loaded once per exporter.
    pub async fn stylesheet(&self) -> Arc<str> {
        let Some(url) = self.stylesheet_url() else {
            return Arc::from("");
        };
        self.styles.get(self.inliner.clone(), url).await
    }

    /// Text measurer over the fonts the rasterizer will draw with: system fonts (when
    /// enabled), faces declared by the stylesheet and embedded `data:` faces.
    #[cfg(feature = "raster")]
    pub async fn text_measurer(&self) -> crate::fonts::FontdbTextMeasurer {
        use crate::fonts::FontRuntime as _;

        if let Err(err) = self.runtime.ready().await {
            tracing::warn!(error = %err, "measuring text without a loaded font database");
        }
        let css = self.stylesheet().await;
        if !css.is_empty() {
            self.fonts.ensure_fonts_loaded(&css, &self.asset_base).await;
        }
        let mut db = self.runtime.snapshot();
        crate::fonts::register_embedded_faces(&mut db, &css);
        crate::fonts::FontdbTextMeasurer::new(Arc::new(db))
            .with_default_families(&self.options.default_font_family)
    }

    /// Copies `doc`, declares its namespaces, sizes it and embeds the inlined CSS.
    ///
    /// `strip_overlays` removes `foreignObject` regions, which rasterizers cannot draw.
    pub async fn standalone(&self, doc: &SvgDocument, strip_overlays: bool) -> StandaloneSvg {
        let mut clone = doc.clone();
        clone.root.set_attr("xmlns", SVG_NS);
        clone.root.set_attr("xmlns:xlink", XLINK_NS);

        let removed_overlays = if strip_overlays {
            clone.root.remove_descendants("foreignObject")
        } else {
            0
        };

        let (width, height) = doc
            .view_box()
            .or_else(|| doc.declared_size())
            .unwrap_or((self.options.fallback_width, self.options.fallback_height));
        clone.root.set_attr("width", statedag_render::svg::fmt(width));
        clone.root.set_attr("height", statedag_render::svg::fmt(height));

        let css = self.stylesheet().await;
        if !css.is_empty() {
            self.fonts.ensure_fonts_loaded(&css, &self.asset_base).await;
            clone.root.prepend(
                Element::new("style")
                    .attr("type", "text/css")
                    .text(css.to_string()),
            );
        }

        StandaloneSvg {
            xml: clone.to_xml(),
            width,
            height,
            css,
            removed_overlays,
        }
    }

    /// Writes a standalone SVG. HTML overlays are kept: browsers draw them.
    pub async fn export_svg(
        &self,
        diagram: Option<&SvgDocument>,
        filename: &str,
        sink: &dyn ArtifactSink,
    ) -> Result<ExportOutcome, ExportError> {
        let Some(doc) = diagram else {
            tracing::debug!(filename, "no diagram to export");
            return Ok(ExportOutcome::Skipped(SkipReason::NoDiagram));
        };
        let svg = self.standalone(doc, false).await;
        sink.deliver(filename, svg.xml.as_bytes())?;
        Ok(ExportOutcome::Delivered {
            filename: filename.to_string(),
            width: svg.width.ceil() as u32,
            height: svg.height.ceil() as u32,
            bytes: svg.xml.len(),
        })
    }

    /// Rasterizes a diagram to PNG on a white background and hands it to `sink`.
    ///
    /// An absent diagram resolves to `Skipped(NoDiagram)` without fetching anything. A
    /// document the rasterizer cannot decode is an error; a surface that cannot be
    /// allocated or encoded resolves to `Skipped(EmptyRaster)`. Nothing is delivered in
    /// either case.
    #[cfg(feature = "raster")]
    pub async fn export_png(
        &self,
        diagram: Option<&SvgDocument>,
        filename: &str,
        sink: &dyn ArtifactSink,
    ) -> Result<ExportOutcome, ExportError> {
        use crate::fonts::FontRuntime as _;

        let Some(doc) = diagram else {
            tracing::debug!(filename, "no diagram to export");
            return Ok(ExportOutcome::Skipped(SkipReason::NoDiagram));
        };

        if let Err(err) = self.runtime.ready().await {
            tracing::warn!(error = %err, "fonts may not have fully loaded");
        }

        let svg = self.standalone(doc, true).await;
        if svg.removed_overlays > 0 {
            tracing::debug!(count = svg.removed_overlays, "removed HTML overlays before rasterizing");
        }

        let Some(raster) = raster::rasterize(&svg, &self.options, self.runtime.snapshot())? else {
            tracing::warn!(filename, "raster surface was empty; nothing exported");
            return Ok(ExportOutcome::Skipped(SkipReason::EmptyRaster));
        };
        sink.deliver(filename, &raster.png)?;
        Ok(ExportOutcome::Delivered {
            filename: filename.to_string(),
            width: raster.width,
            height: raster.height,
            bytes: raster.png.len(),
        })
    }
}

#[cfg(feature = "raster")]
mod raster {
    use super::{ExportError, ExportOptions, StandaloneSvg};
    use crate::fonts::register_embedded_faces;
    use std::sync::Arc;
    use usvg::fontdb::Database;

    pub(super) struct Raster {
        pub png: Vec<u8>,
        pub width: u32,
        pub height: u32,
    }

    pub(super) fn rasterize(
        svg: &StandaloneSvg,
        options: &ExportOptions,
        mut fontdb: Database,
    ) -> Result<Option<Raster>, ExportError> {
        let embedded = register_embedded_faces(&mut fontdb, &svg.css);
        if embedded > 0 {
            tracing::debug!(faces = embedded, "registered embedded fonts");
        }

        let mut opt = usvg::Options::default();
        opt.resources_dir = Some(options.asset_dir.clone());
        opt.font_family = options.default_font_family.clone();
        opt.fontdb = Arc::new(fontdb);

        let tree = usvg::Tree::from_str(&svg.xml, &opt).map_err(|err| ExportError::Decode {
            message: err.to_string(),
        })?;

        let scale = options.scale;
        let width = (svg.width as f32 * scale).ceil();
        let height = (svg.height as f32 * scale).ceil();
        if !(width.is_finite() && height.is_finite()) || width < 1.0 || height < 1.0 {
            return Ok(None);
        }
        let Some(mut pixmap) = tiny_skia::Pixmap::new(width as u32, height as u32) else {
            return Ok(None);
        };

        pixmap.fill(background_color(&options.background));
        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );

        match pixmap.encode_png() {
            Ok(png) => Ok(Some(Raster {
                png,
                width: pixmap.width(),
                height: pixmap.height(),
            })),
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode PNG");
                Ok(None)
            }
        }
    }

    /// Opaque fill for the raster surface. Translucent colors are composited over white;
    /// unparseable ones fall back to white.
    pub(super) fn background_color(text: &str) -> tiny_skia::Color {
        let Some(color) = parse_color(text) else {
            tracing::warn!(background = text, "unrecognized background color; using white");
            return tiny_skia::Color::WHITE;
        };
        if color.is_opaque() {
            return color;
        }
        let a = color.alpha();
        let over_white = |c: f32| c * a + (1.0 - a);
        tiny_skia::Color::from_rgba(
            over_white(color.red()),
            over_white(color.green()),
            over_white(color.blue()),
            1.0,
        )
        .unwrap_or(tiny_skia::Color::WHITE)
    }

    /// `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa` and a few keywords.
    pub(super) fn parse_color(text: &str) -> Option<tiny_skia::Color> {
        let s = text.trim().to_ascii_lowercase();
        match s.as_str() {
            "transparent" => return Some(tiny_skia::Color::TRANSPARENT),
            "white" => return Some(tiny_skia::Color::WHITE),
            "black" => return Some(tiny_skia::Color::BLACK),
            _ => {}
        }

        let hex = s.strip_prefix('#')?;
        let digit = |c: u8| (c as char).to_digit(16).map(|v| v as u8);
        let pair = |b: &[u8]| Some((digit(b[0])? << 4) | digit(b[1])?);
        let single = |c: u8| digit(c).map(|v| (v << 4) | v);

        let b = hex.as_bytes();
        let (r, g, bl, a) = match b.len() {
            3 => (single(b[0])?, single(b[1])?, single(b[2])?, 255),
            4 => (single(b[0])?, single(b[1])?, single(b[2])?, single(b[3])?),
            6 => (pair(&b[0..2])?, pair(&b[2..4])?, pair(&b[4..6])?, 255),
            8 => (
                pair(&b[0..2])?,
                pair(&b[2..4])?,
                pair(&b[4..6])?,
                pair(&b[6..8])?,
            ),
            _ => return None,
        };
        Some(tiny_skia::Color::from_rgba8(r, g, bl, a))
    }

    #[cfg(test)]
    mod tests {
        use super::{background_color, parse_color};

        #[test]
        fn background_colors_parse() {
            assert_eq!(parse_color("#ffffff"), Some(tiny_skia::Color::WHITE));
            assert_eq!(parse_color("#fff"), Some(tiny_skia::Color::WHITE));
            assert_eq!(
                parse_color("#00000080"),
                Some(tiny_skia::Color::from_rgba8(0, 0, 0, 0x80))
            );
            assert_eq!(parse_color("papayawhip"), None);
            assert_eq!(parse_color("#12345"), None);
        }

        #[test]
        fn raster_backgrounds_are_always_opaque() {
            assert_eq!(background_color("transparent"), tiny_skia::Color::WHITE);
            assert_eq!(background_color("#fe6703"), parse_color("#fe6703").unwrap());
            assert_eq!(background_color("not-a-color"), tiny_skia::Color::WHITE);

            let half_black = background_color("#00000080");
            assert!(half_black.is_opaque());
            assert!((half_black.red() - (1.0 - 128.0 / 255.0)).abs() < 1e-4);
            assert_eq!(half_black.red(), half_black.blue());
        }
    }
}
