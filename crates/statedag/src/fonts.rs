//! `@font-face` materialization.
//!
//! Inlined CSS only declares fonts; something still has to load them before text is
//! shaped. [`FontMaterializer`] walks the declared faces and hands each one, once, to a
//! [`FontRuntime`].

use crate::resources::FetchError;
use futures::future::{BoxFuture, join_all};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no usable font faces in {source_name}")]
    NoFaces { source_name: String },
    #[error("invalid font source {src}")]
    InvalidSource { src: String },
}

/// One `@font-face` block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FontFaceRule {
    pub family: Option<String>,
    /// First `url(...)` of the `src` descriptor.
    pub src: Option<String>,
    pub style: Option<String>,
    pub weight: Option<String>,
    pub stretch: Option<String>,
}

impl FontFaceRule {
    pub fn is_embedded(&self) -> bool {
        self.src.as_deref().is_some_and(|s| s.starts_with("data:"))
    }
}

fn font_face_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)@font-face\s*\{([^}]*)\}").expect("valid regex"))
}

fn src_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).expect("valid regex")
    })
}

fn unquote(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Splits a declaration block on `;`, ignoring semicolons inside `(...)` or quotes
/// (`data:` URIs carry one).
fn declarations(body: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                out.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&body[start..]);
    out
}

pub fn parse_font_faces(css: &str) -> Vec<FontFaceRule> {
    font_face_re()
        .captures_iter(css)
        .filter_map(|caps| caps.get(1))
        .map(|body| {
            let mut rule = FontFaceRule::default();
            for decl in declarations(body.as_str()) {
                let Some((name, value)) = decl.split_once(':') else {
                    continue;
                };
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                match name.trim().to_ascii_lowercase().as_str() {
                    "font-family" => rule.family = Some(unquote(value)),
                    "src" => {
                        rule.src = src_url_re()
                            .captures(value)
                            .and_then(|c| c.get(1))
                            .map(|m| m.as_str().trim().to_string());
                    }
                    "font-style" => rule.style = Some(value.to_ascii_lowercase()),
                    "font-weight" => rule.weight = Some(value.to_ascii_lowercase()),
                    "font-stretch" => rule.stretch = Some(value.to_ascii_lowercase()),
                    _ => {}
                }
            }
            rule
        })
        .collect()
}

/// The dynamic font-loading capability of the rendering backend.
pub trait FontRuntime: Send + Sync {
    /// Loads one face whose `src` resolved to `url`. Returns the number of faces registered.
    fn load<'a>(
        &'a self,
        face: &'a FontFaceRule,
        url: &'a Url,
    ) -> BoxFuture<'a, Result<usize, FontError>>;

    /// Resolves once the runtime's fonts are usable.
    fn ready(&self) -> BoxFuture<'_, Result<(), FontError>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FaceKey {
    family: String,
    style: String,
    weight: String,
    src: String,
}

pub struct FontMaterializer {
    runtime: Option<Arc<dyn FontRuntime>>,
    loaded: Mutex<HashSet<FaceKey>>,
}

impl std::fmt::Debug for FontMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMaterializer")
            .field("has_runtime", &self.runtime.is_some())
            .field("loaded", &self.loaded_count())
            .finish()
    }
}

impl FontMaterializer {
    pub fn new(runtime: Option<Arc<dyn FontRuntime>>) -> Self {
        Self {
            runtime,
            loaded: Mutex::new(HashSet::new()),
        }
    }

    pub fn runtime(&self) -> Option<&Arc<dyn FontRuntime>> {
        self.runtime.as_ref()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Loads every not-yet-loaded `@font-face` of `css`, concurrently.
    ///
    /// Faces without a family or a source are skipped, as are `data:` sources (those are
    /// registered by the rasterizer when it decodes the document). Failures are logged and
    /// do not stop the other loads. Returns how many faces were newly loaded.
    pub async fn ensure_fonts_loaded(&self, css: &str, base: &Url) -> usize {
        let Some(runtime) = self.runtime.as_ref() else {
            return 0;
        };

        let mut pending: Vec<(FaceKey, FontFaceRule, Url)> = Vec::new();
        {
            let loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
            for face in parse_font_faces(css) {
                let (Some(family), Some(src)) = (face.family.clone(), face.src.clone()) else {
                    tracing::debug!(?face, "skipping @font-face without family or src");
                    continue;
                };
                if face.is_embedded() {
                    continue;
                }
                let key = FaceKey {
                    family,
                    style: face.style.clone().unwrap_or_else(|| "normal".to_string()),
                    weight: face.weight.clone().unwrap_or_else(|| "normal".to_string()),
                    src: src.clone(),
                };
                if loaded.contains(&key) || pending.iter().any(|(k, _, _)| *k == key) {
                    continue;
                }
                match base.join(&src) {
                    Ok(url) => pending.push((key, face, url)),
                    Err(err) => tracing::warn!(%src, error = %err, "bad font URL"),
                }
            }
        }
        if pending.is_empty() {
            return 0;
        }

        let results = join_all(pending.iter().map(|(_, face, url)| runtime.load(face, url))).await;

        let mut count = 0;
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        for ((key, _, url), result) in pending.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    loaded.insert(key);
                    count += 1;
                }
                Err(err) => {
                    tracing::warn!(family = %key.family, %url, error = %err, "failed to load font");
                }
            }
        }
        count
    }
}

#[cfg(feature = "raster")]
mod metrics;

#[cfg(feature = "raster")]
pub use self::fontdb_runtime::{FontdbRuntime, register_embedded_faces};
#[cfg(feature = "raster")]
pub use self::metrics::{FontdbTextMeasurer, split_families};

#[cfg(feature = "raster")]
mod fontdb_runtime {
    use super::{FontError, FontFaceRule, FontRuntime, parse_font_faces};
    use crate::resources::ResourceFetcher;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use futures::FutureExt as _;
    use futures::future::BoxFuture;
    use std::sync::{Arc, Mutex, PoisonError};
    use url::Url;
    use usvg::fontdb::{self, Database, Language, Source, Stretch, Style, Weight};

    /// [`FontRuntime`] backed by the `fontdb` database the rasterizer shapes text with.
    pub struct FontdbRuntime {
        db: Mutex<Database>,
        fetcher: Arc<dyn ResourceFetcher>,
        load_system_fonts: bool,
        system_loaded: Mutex<bool>,
    }

    impl std::fmt::Debug for FontdbRuntime {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("FontdbRuntime")
                .field("faces", &self.face_count())
                .field("load_system_fonts", &self.load_system_fonts)
                .finish_non_exhaustive()
        }
    }

    impl FontdbRuntime {
        pub fn new(fetcher: Arc<dyn ResourceFetcher>, load_system_fonts: bool) -> Self {
            Self {
                db: Mutex::new(Database::new()),
                fetcher,
                load_system_fonts,
                system_loaded: Mutex::new(false),
            }
        }

        pub fn face_count(&self) -> usize {
            self.db.lock().unwrap_or_else(PoisonError::into_inner).len()
        }

        /// Copy of the current database, for handing to `usvg::Options`.
        pub fn snapshot(&self) -> Database {
            self.db.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        fn ensure_system_fonts(&self) {
            if !self.load_system_fonts {
                return;
            }
            let mut done = self
                .system_loaded
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !*done {
                let mut db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
                db.load_system_fonts();
                tracing::debug!(faces = db.len(), "loaded system fonts");
                *done = true;
            }
        }
    }

    impl FontRuntime for FontdbRuntime {
        fn load<'a>(
            &'a self,
            face: &'a FontFaceRule,
            url: &'a Url,
        ) -> BoxFuture<'a, Result<usize, FontError>> {
            async move {
                let bytes = self.fetcher.fetch(url).await?;
                let mut db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
                register_face(&mut db, bytes, face, url.as_str())
            }
            .boxed()
        }

        fn ready(&self) -> BoxFuture<'_, Result<(), FontError>> {
            async move {
                self.ensure_system_fonts();
                if self.face_count() == 0 {
                    return Err(FontError::NoFaces {
                        source_name: "font database".to_string(),
                    });
                }
                Ok(())
            }
            .boxed()
        }
    }

    fn style_of(raw: Option<&str>) -> Option<Style> {
        match raw?.split_whitespace().next()? {
            "italic" => Some(Style::Italic),
            "oblique" => Some(Style::Oblique),
            "normal" => Some(Style::Normal),
            _ => None,
        }
    }

    fn weight_of(raw: Option<&str>) -> Option<Weight> {
        let first = raw?.split_whitespace().next()?;
        match first {
            "normal" => Some(Weight::NORMAL),
            "bold" => Some(Weight::BOLD),
            n => n.parse::<u16>().ok().map(Weight),
        }
    }

    fn stretch_of(raw: Option<&str>) -> Option<Stretch> {
        let stretch = match raw?.trim() {
            "ultra-condensed" => Stretch::UltraCondensed,
            "extra-condensed" => Stretch::ExtraCondensed,
            "condensed" => Stretch::Condensed,
            "semi-condensed" => Stretch::SemiCondensed,
            "normal" => Stretch::Normal,
            "semi-expanded" => Stretch::SemiExpanded,
            "expanded" => Stretch::Expanded,
            "extra-expanded" => Stretch::ExtraExpanded,
            "ultra-expanded" => Stretch::UltraExpanded,
            _ => return None,
        };
        Some(stretch)
    }

    /// Loads font bytes and re-registers every face under the CSS family name, with the
    /// CSS descriptors overriding what the font file claims.
    pub(crate) fn register_face(
        db: &mut Database,
        bytes: Vec<u8>,
        face: &FontFaceRule,
        source_name: &str,
    ) -> Result<usize, FontError> {
        let ids = db.load_font_source(Source::Binary(Arc::new(bytes)));
        if ids.is_empty() {
            return Err(FontError::NoFaces {
                source_name: source_name.to_string(),
            });
        }
        let family = face.family.clone().unwrap_or_default();
        for id in ids.iter().copied() {
            let Some(mut info) = db.face(id).cloned() else {
                continue;
            };
            db.remove_face(id);
            if !family.is_empty() {
                info.families.insert(0, (family.clone(), Language::English_UnitedStates));
            }
            if let Some(style) = style_of(face.style.as_deref()) {
                info.style = style;
            }
            if let Some(weight) = weight_of(face.weight.as_deref()) {
                info.weight = weight;
            }
            if let Some(stretch) = stretch_of(face.stretch.as_deref()) {
                info.stretch = stretch;
            }
            db.push_face_info(info);
        }
        Ok(ids.len())
    }

    /// Payload of a base64 `data:` URI.
    fn decode_data_uri(src: &str) -> Option<Vec<u8>> {
        let rest = src.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        if !meta.ends_with(";base64") {
            return None;
        }
        BASE64.decode(payload.trim()).ok()
    }

    /// Registers the `data:` faces of inlined CSS into `db`. Returns the number of faces
    /// added; undecodable faces are logged and skipped.
    pub fn register_embedded_faces(db: &mut fontdb::Database, css: &str) -> usize {
        let mut count = 0;
        for face in parse_font_faces(css) {
            if face.family.is_none() || !face.is_embedded() {
                continue;
            }
            let src = face.src.as_deref().unwrap_or_default();
            let Some(bytes) = decode_data_uri(src) else {
                let err = FontError::InvalidSource {
                    src: src.chars().take(48).collect(),
                };
                tracing::warn!(error = %err, "skipping embedded font");
                continue;
            };
            match register_face(db, bytes, &face, "embedded font") {
                Ok(n) => count += n,
                Err(err) => tracing::warn!(family = ?face.family, error = %err, "skipping embedded font"),
            }
        }
        count
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::resources::FileFetcher;
        use futures::executor::block_on;

        #[test]
        fn descriptors_map_to_fontdb_values() {
            assert_eq!(style_of(Some("italic")), Some(Style::Italic));
            assert_eq!(weight_of(Some("bold")), Some(Weight::BOLD));
            assert_eq!(weight_of(Some("300 700")), Some(Weight(300)));
            assert_eq!(stretch_of(Some("condensed")), Some(Stretch::Condensed));
            assert_eq!(stretch_of(Some("87.5%")), None);
        }

        #[test]
        fn data_uris_decode() {
            assert_eq!(
                decode_data_uri("data:font/woff2;base64,d09GMg=="),
                Some(b"wOF2".to_vec())
            );
            assert_eq!(decode_data_uri("data:font/woff2,raw"), None);
            assert_eq!(decode_data_uri("fonts/a.woff2"), None);
        }

        #[test]
        fn garbage_embedded_fonts_are_skipped() {
            let mut db = Database::new();
            let css = "@font-face { font-family: 'Broken'; src: url(data:font/ttf;base64,d09GMg==); }";
            assert_eq!(register_embedded_faces(&mut db, css), 0);
            assert_eq!(db.len(), 0);
        }

        #[test]
        fn empty_database_is_not_ready() {
            let runtime = FontdbRuntime::new(Arc::new(FileFetcher), false);
            assert!(matches!(
                block_on(runtime.ready()),
                Err(FontError::NoFaces { .. })
            ));
        }

        #[test]
        fn undecodable_font_files_report_no_faces() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("broken.ttf");
            std::fs::write(&path, b"not a font").unwrap();
            let url = Url::from_file_path(&path).unwrap();
            let runtime = FontdbRuntime::new(Arc::new(FileFetcher), false);
            let face = FontFaceRule {
                family: Some("Broken".to_string()),
                src: Some("broken.ttf".to_string()),
                ..Default::default()
            };
            assert!(matches!(
                block_on(runtime.load(&face, &url)),
                Err(FontError::NoFaces { .. })
            ));
            assert_eq!(runtime.face_count(), 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt as _;
    use futures::executor::block_on;

    #[derive(Default)]
    struct RecordingRuntime {
        loads: Mutex<Vec<String>>,
        fail: HashSet<String>,
    }

    impl FontRuntime for RecordingRuntime {
        fn load<'a>(
            &'a self,
            face: &'a FontFaceRule,
            url: &'a Url,
        ) -> BoxFuture<'a, Result<usize, FontError>> {
            async move {
                self.loads.lock().unwrap().push(url.to_string());
                if self.fail.contains(url.as_str()) {
                    return Err(FontError::NoFaces {
                        source_name: face.family.clone().unwrap_or_default(),
                    });
                }
                Ok(1)
            }
            .boxed()
        }

        fn ready(&self) -> BoxFuture<'_, Result<(), FontError>> {
            async { Ok(()) }.boxed()
        }
    }

    const CSS: &str = r#"
        @font-face {
            font-family: "Source Sans 3";
            font-style: normal;
            font-weight: 600;
            src: url('fonts/source-sans-3-600.woff2') format('woff2'), url(fallback.ttf);
        }
        @font-face { font-family: Poppins; src: url(data:font/woff2;base64,AAAA); }
        @font-face { src: url(fonts/nameless.woff2); }
        @font-face { font-family: 'NoSource'; font-weight: bold; }
        .node { font-family: "Source Sans 3"; }
    "#;

    fn base() -> Url {
        Url::parse("https://example.test/assets/styles.css").unwrap()
    }

    #[test]
    fn semicolons_inside_urls_do_not_split_declarations() {
        let decls = declarations("src: url(data:font/woff2;base64,AAAA); font-family: 'a;b'");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[1].trim(), "font-family: 'a;b'");
    }

    #[test]
    fn font_face_blocks_are_parsed() {
        let faces = parse_font_faces(CSS);
        assert_eq!(faces.len(), 4);
        assert_eq!(faces[0].family.as_deref(), Some("Source Sans 3"));
        assert_eq!(faces[0].src.as_deref(), Some("fonts/source-sans-3-600.woff2"));
        assert_eq!(faces[0].weight.as_deref(), Some("600"));
        assert!(faces[1].is_embedded());
        assert_eq!(faces[2].family, None);
        assert_eq!(faces[3].src, None);
    }

    #[test]
    fn without_a_runtime_nothing_happens() {
        let materializer = FontMaterializer::new(None);
        assert_eq!(block_on(materializer.ensure_fonts_loaded(CSS, &base())), 0);
        assert_eq!(materializer.loaded_count(), 0);
    }

    #[test]
    fn each_face_is_loaded_once() {
        let runtime = Arc::new(RecordingRuntime::default());
        let materializer = FontMaterializer::new(Some(runtime.clone()));

        assert_eq!(block_on(materializer.ensure_fonts_loaded(CSS, &base())), 1);
        assert_eq!(block_on(materializer.ensure_fonts_loaded(CSS, &base())), 0);
        assert_eq!(
            *runtime.loads.lock().unwrap(),
            vec!["https://example.test/assets/fonts/source-sans-3-600.woff2".to_string()]
        );
    }

    #[test]
    fn failed_loads_are_retried_later() {
        let mut runtime = RecordingRuntime::default();
        runtime
            .fail
            .insert("https://example.test/assets/fonts/source-sans-3-600.woff2".to_string());
        let runtime = Arc::new(runtime);
        let materializer = FontMaterializer::new(Some(runtime.clone()));

        assert_eq!(block_on(materializer.ensure_fonts_loaded(CSS, &base())), 0);
        assert_eq!(block_on(materializer.ensure_fonts_loaded(CSS, &base())), 0);
        assert_eq!(runtime.loads.lock().unwrap().len(), 2);
        assert_eq!(materializer.loaded_count(), 0);
    }
}
