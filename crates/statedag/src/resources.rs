//! Stylesheet inlining for standalone exports.
//!
//! An exported diagram is rasterized outside of any page context, so every stylesheet it
//! depends on has to travel inside the document: `@import`ed sheets are pulled in and font
//! files referenced by `url(...)` become base64 `data:` URIs.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared, join_all};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("resource not found: {url}")]
    NotFound { url: String },
    #[error("unsupported resource URL: {url}")]
    Unsupported { url: String },
    #[error("failed to read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Asynchronous byte source for stylesheets and font binaries.
pub trait ResourceFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Vec<u8>, FetchError>>;
}

/// Serves `file://` URLs from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl ResourceFetcher for FileFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        async move {
            if url.scheme() != "file" {
                return Err(FetchError::Unsupported {
                    url: url.to_string(),
                });
            }
            let path = url.to_file_path().map_err(|_| FetchError::Unsupported {
                url: url.to_string(),
            })?;
            std::fs::read(&path).map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    FetchError::NotFound {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Io {
                        url: url.to_string(),
                        source,
                    }
                }
            })
        }
        .boxed()
    }
}

/// `file://` URL for a directory, with the trailing slash `Url::join` needs.
pub fn directory_url(dir: &Path) -> Option<Url> {
    let dir = std::path::absolute(dir).ok()?;
    Url::from_directory_path(dir).ok()
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"@import\s+(?:url\(\s*['"]?([^'")]+?)['"]?\s*\)|['"]([^'"]+)['"])[^;]*;"#,
        )
        .expect("valid regex")
    })
}

fn font_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"url\(\s*['"]?([^'")\s]+?\.(?:woff2|woff|ttf)(?:[?#][^'")\s]*)?)['"]?\s*\)"#,
        )
        .expect("valid regex")
    })
}

/// MIME type for a font URL, by extension.
pub fn font_mime(url: &Url) -> &'static str {
    let path = url.path().to_ascii_lowercase();
    if path.ends_with(".woff2") {
        "font/woff2"
    } else if path.ends_with(".woff") {
        "font/woff"
    } else if path.ends_with(".ttf") {
        "font/ttf"
    } else {
        "application/octet-stream"
    }
}

type SharedFont = Shared<BoxFuture<'static, Option<Arc<str>>>>;

pub struct ResourceInliner {
    fetcher: Arc<dyn ResourceFetcher>,
    /// Font `data:` URIs keyed by absolute URL, in flight or resolved. Lives as long as
    /// the inliner; failed entries are dropped so a later pass retries them.
    fonts: Mutex<HashMap<Url, SharedFont>>,
    max_import_depth: usize,
}

impl std::fmt::Debug for ResourceInliner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceInliner")
            .field("max_import_depth", &self.max_import_depth)
            .finish_non_exhaustive()
    }
}

impl ResourceInliner {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            fonts: Mutex::new(HashMap::new()),
            max_import_depth: 8,
        }
    }

    pub fn with_max_import_depth(mut self, depth: usize) -> Self {
        self.max_import_depth = depth;
        self
    }

    /// Fetches the root stylesheet and returns it fully inlined.
    ///
    /// Never fails: an unreachable root yields an empty string, unreachable imports
    /// contribute nothing and unreachable fonts keep their original reference.
    pub async fn inline_stylesheet(&self, root: &Url) -> String {
        self.load_sheet(root.clone(), Vec::new()).await
    }

    /// Inlines imports and fonts of CSS text whose relative URLs resolve against `base`.
    pub async fn inline_css(&self, css: &str, base: &Url) -> String {
        self.expand(css.to_string(), base.clone(), vec![base.clone()])
            .await
    }

    fn load_sheet(&self, url: Url, ancestors: Vec<Url>) -> BoxFuture<'_, String> {
        async move {
            if ancestors.contains(&url) {
                tracing::warn!(%url, "skipping circular stylesheet import");
                return String::new();
            }
            if ancestors.len() > self.max_import_depth {
                tracing::warn!(%url, depth = ancestors.len(), "stylesheet imports nested too deeply");
                return String::new();
            }
            let css = match self.fetcher.fetch(&url).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    tracing::warn!(%url, error = %err, "failed to load stylesheet");
                    return String::new();
                }
            };
            let mut ancestors = ancestors;
            ancestors.push(url.clone());
            self.expand(css, url, ancestors).await
        }
        .boxed()
    }

    /// Replaces `@import` statements with the imported sheets (placed first, in
    /// statement order) and inlines this sheet's own font references.
    async fn expand(&self, css: String, base: Url, ancestors: Vec<Url>) -> String {
        let mut imports = Vec::new();
        for caps in import_re().captures_iter(&css) {
            let Some(href) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            match base.join(href.as_str().trim()) {
                Ok(url) => imports.push(url),
                Err(err) => tracing::warn!(href = href.as_str(), error = %err, "bad import URL"),
            }
        }
        let own = import_re().replace_all(&css, "").into_owned();
        let own = self.inline_fonts(&own, &base).await;

        if imports.is_empty() {
            return own;
        }
        let imported = join_all(
            imports
                .into_iter()
                .map(|url| self.load_sheet(url, ancestors.clone())),
        )
        .await;

        let mut out = String::new();
        for sheet in imported.into_iter().filter(|s| !s.is_empty()) {
            out.push_str(&sheet);
            out.push('\n');
        }
        out.push_str(&own);
        out
    }

    /// Rewrites `.woff`/`.woff2`/`.ttf` references into `data:` URIs.
    pub async fn inline_fonts(&self, css: &str, base: &Url) -> String {
        let mut refs: Vec<(std::ops::Range<usize>, Url)> = Vec::new();
        for caps in font_url_re().captures_iter(css) {
            let (Some(whole), Some(href)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if href.as_str().starts_with("data:") {
                continue;
            }
            if let Ok(url) = base.join(href.as_str()) {
                refs.push((whole.range(), url));
            }
        }
        if refs.is_empty() {
            return css.to_string();
        }

        let mut unique: Vec<Url> = refs.iter().map(|(_, u)| u.clone()).collect();
        unique.sort();
        unique.dedup();
        let encoded: HashMap<Url, Arc<str>> = join_all(
            unique
                .into_iter()
                .map(|url| async move { self.font_data_uri(&url).await.map(|d| (url, d)) }),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        let mut out = String::with_capacity(css.len());
        let mut last = 0;
        for (range, url) in refs {
            let Some(data) = encoded.get(&url) else {
                continue;
            };
            out.push_str(&css[last..range.start]);
            out.push_str("url(");
            out.push_str(data);
            out.push(')');
            last = range.end;
        }
        out.push_str(&css[last..]);
        out
    }

    async fn font_data_uri(&self, url: &Url) -> Option<Arc<str>> {
        let data = self.font_load(url).await;
        if data.is_none() {
            let mut fonts = self.fonts.lock().unwrap_or_else(PoisonError::into_inner);
            if fonts.get(url).is_some_and(|f| f.peek().is_some_and(Option::is_none)) {
                fonts.remove(url);
            }
        }
        data
    }

    /// The shared load for `url`, started on first request.
    fn font_load(&self, url: &Url) -> SharedFont {
        let mut fonts = self.fonts.lock().unwrap_or_else(PoisonError::into_inner);
        fonts
            .entry(url.clone())
            .or_insert_with(|| {
                let fetcher = self.fetcher.clone();
                let url = url.clone();
                async move {
                    match fetcher.fetch(&url).await {
                        Ok(bytes) => Some(Arc::<str>::from(format!(
                            "data:{};base64,{}",
                            font_mime(&url),
                            BASE64.encode(bytes)
                        ))),
                        Err(err) => {
                            tracing::warn!(%url, error = %err, "failed to inline font");
                            None
                        }
                    }
                }
                .boxed()
                .shared()
            })
            .clone()
    }

    /// Number of fonts encoded so far.
    pub fn cached_font_count(&self) -> usize {
        self.fonts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|f| matches!(f.peek(), Some(Some(_))))
            .count()
    }
}

type SharedCss = Shared<BoxFuture<'static, Arc<str>>>;

/// Process-wide inlined stylesheet.
///
/// Lifecycle: uninitialized, then loading (one shared future every caller joins), then
/// loaded. The value never changes once resolved.
#[derive(Default)]
pub struct StyleCache {
    cell: OnceLock<SharedCss>,
}

impl std::fmt::Debug for StyleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleCache")
            .field("started", &self.cell.get().is_some())
            .field("loaded", &self.peek().is_some())
            .finish()
    }
}

impl StyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins (or starts) the load. Only the first call's `root` is used.
    pub async fn get(&self, inliner: Arc<ResourceInliner>, root: Url) -> Arc<str> {
        let shared = self
            .cell
            .get_or_init(|| {
                async move { Arc::<str>::from(inliner.inline_stylesheet(&root).await) }
                    .boxed()
                    .shared()
            })
            .clone();
        shared.await
    }

    /// The resolved stylesheet, without waiting.
    pub fn peek(&self) -> Option<Arc<str>> {
        self.cell.get()?.peek().cloned()
    }
}
