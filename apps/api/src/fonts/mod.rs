// Font provisioning: one Unicode-capable TrueType font, fetched on first run and
// shared read-only by every renderer call for the life of the process.

pub mod metrics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub use metrics::{GlyphMetrics, TtfMetrics};

#[derive(Debug, Error)]
pub enum FontError {
    #[error("Font unavailable at {path}: {reason}")]
    FontUnavailable { path: PathBuf, reason: String },
}

impl FontError {
    fn unavailable(path: &Path, reason: impl Into<String>) -> Self {
        FontError::FontUnavailable {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Ensures the font file exists at `font_path`, downloading it from `url` if it does not.
///
/// Idempotent: an existing file is never re-fetched. A single failed fetch is an error,
/// there is no retry here.
pub async fn ensure_font(
    font_path: &Path,
    url: &str,
    http: &reqwest::Client,
) -> Result<(), FontError> {
    if tokio::fs::try_exists(font_path).await.unwrap_or(false) {
        debug!("Font already present at {}", font_path.display());
        return Ok(());
    }

    info!("Downloading font from {url} to {}", font_path.display());

    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| FontError::unavailable(font_path, format!("download failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FontError::unavailable(
            font_path,
            format!("download failed with status code {}", status.as_u16()),
        ));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FontError::unavailable(font_path, format!("download interrupted: {e}")))?;

    if let Some(parent) = font_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FontError::unavailable(font_path, e.to_string()))?;
    }

    // Write beside the target, then rename: readers never see a half-written font.
    let partial = font_path.with_extension("ttf.part");
    tokio::fs::write(&partial, &bytes)
        .await
        .map_err(|e| FontError::unavailable(font_path, e.to_string()))?;
    tokio::fs::rename(&partial, font_path)
        .await
        .map_err(|e| FontError::unavailable(font_path, e.to_string()))?;

    info!("Downloaded {} bytes to {}", bytes.len(), font_path.display());
    Ok(())
}

/// A parsed, validated TrueType font held in memory.
#[derive(Debug)]
pub struct FontResource {
    pub name: String,
    bytes: Vec<u8>,
}

impl FontResource {
    /// Validates `bytes` as a TrueType face before accepting them.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, String> {
        ttf_parser::Face::parse(&bytes, 0).map_err(|e| format!("not a usable font: {e}"))?;
        Ok(Self {
            name: name.into(),
            bytes,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Glyph metrics borrowed from this font. Parsing was validated at construction.
    pub fn metrics(&self) -> Option<TtfMetrics<'_>> {
        TtfMetrics::parse(&self.bytes).ok()
    }
}

/// Process-wide font holder. The first successful load is kept; failures are not
/// cached so the next render attempt provisions again.
pub struct FontStore {
    path: PathBuf,
    url: String,
    http: reqwest::Client,
    cell: OnceCell<Arc<FontResource>>,
}

impl FontStore {
    pub fn new(path: PathBuf, url: String, http: reqwest::Client) -> Self {
        Self {
            path,
            url,
            http,
            cell: OnceCell::new(),
        }
    }

    /// A store that already holds `font`.
    #[cfg(test)]
    pub fn preloaded(font: FontResource) -> Self {
        Self {
            path: PathBuf::new(),
            url: String::new(),
            http: reqwest::Client::new(),
            cell: OnceCell::new_with(Some(Arc::new(font))),
        }
    }

    pub async fn get(&self) -> Result<Arc<FontResource>, FontError> {
        self.cell
            .get_or_try_init(|| async {
                ensure_font(&self.path, &self.url, &self.http).await?;
                let bytes = tokio::fs::read(&self.path)
                    .await
                    .map_err(|e| FontError::unavailable(&self.path, e.to_string()))?;
                let name = self
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "font".to_string());
                let font = FontResource::from_bytes(name, bytes)
                    .map_err(|reason| FontError::unavailable(&self.path, reason))?;
                info!("Font '{}' loaded from {}", font.name, self.path.display());
                Ok(Arc::new(font))
            })
            .await
            .cloned()
            .inspect_err(|e| warn!("Font provisioning failed: {e}"))
    }
}

/// DejaVu Sans, bundled for tests. License text sits next to it in `testdata/`.
#[cfg(test)]
pub(crate) const TEST_FONT_TTF: &[u8] = include_bytes!("testdata/DejaVuSans.ttf");

#[cfg(test)]
pub(crate) fn test_font() -> FontResource {
    FontResource::from_bytes("DejaVuSans", TEST_FONT_TTF.to_vec()).unwrap()
}
