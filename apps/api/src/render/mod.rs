// Output Renderer: turns model text into downloadable artifacts.
// Every artifact is a fresh in-memory buffer owned by the request that produced it.
// PDF layout is CPU-bound; async callers run `render_pdf` inside spawn_blocking.

pub mod layout;

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use printpdf::{Mm, PdfDocument};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::fonts::{FontResource, GlyphMetrics};
pub use layout::PageConfig;

const REPLACEMENT_CHAR: char = '\u{FFFD}';
const TAB_SPACES: &str = "    ";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Character {0:?} is not supported by the font")]
    UnsupportedGlyph(char),

    #[error("Font is unavailable for rendering")]
    FontUnavailable,

    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

/// What to do with characters the font cannot draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlyphPolicy {
    /// Replace with U+FFFD, or `?` if the font lacks that too.
    #[default]
    Substitute,
    /// Fail with `UnsupportedGlyph`.
    Reject,
}

impl std::str::FromStr for GlyphPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substitute" => Ok(GlyphPolicy::Substitute),
            "reject" => Ok(GlyphPolicy::Reject),
            other => Err(format!("expected 'substitute' or 'reject', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Text,
    Pdf,
}

impl ArtifactKind {
    pub fn mime(&self) -> &'static str {
        match self {
            ArtifactKind::Text => "text/plain",
            ArtifactKind::Pdf => "application/pdf",
        }
    }
}

/// A rendered downloadable file.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub file_name: String,
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.kind.mime(), STANDARD.encode(&self.bytes))
    }

    /// An HTML anchor that downloads this artifact as `file_name`.
    pub fn download_link(&self, label: &str) -> String {
        format!(
            r#"<a href="{}" download="{}">{}</a>"#,
            self.data_uri(),
            escape_html(&self.file_name),
            escape_html(label)
        )
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// UTF-8 bytes of `content`, unchanged.
pub fn render_text(content: &str) -> Vec<u8> {
    content.as_bytes().to_vec()
}

/// Normalises line endings and tabs, drops control characters, and applies `policy` to
/// characters outside the font's glyph set.
pub fn sanitize_for_font(
    content: &str,
    metrics: &dyn GlyphMetrics,
    policy: GlyphPolicy,
) -> Result<String, RenderError> {
    let fallback = if metrics.has_glyph(REPLACEMENT_CHAR) {
        REPLACEMENT_CHAR
    } else {
        '?'
    };

    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(normalized.len());
    for c in normalized.chars() {
        match c {
            '\n' => out.push('\n'),
            '\t' => out.push_str(TAB_SPACES),
            c if c.is_control() => {}
            c if c.is_whitespace() => out.push(' '),
            c if metrics.has_glyph(c) => out.push(c),
            c => match policy {
                GlyphPolicy::Substitute => out.push(fallback),
                GlyphPolicy::Reject => return Err(RenderError::UnsupportedGlyph(c)),
            },
        }
    }
    Ok(out)
}

/// Renders `content` as a paginated, word-wrapped PDF using `font` for all text.
pub fn render_pdf(
    content: &str,
    title: &str,
    font: &FontResource,
    config: &PageConfig,
    policy: GlyphPolicy,
) -> Result<Vec<u8>, RenderError> {
    let metrics = font.metrics().ok_or(RenderError::FontUnavailable)?;
    let text = sanitize_for_font(content, &metrics, policy)?;
    let lines = layout::wrap_text(&text, &metrics, config.text_width_em());
    let pages = layout::paginate(lines, config.lines_per_page());

    let width = Mm(config.page_width_mm);
    let height = Mm(config.page_height_mm);
    let (doc, first_page, first_layer) = PdfDocument::new(title, width, height, "Layer 1");
    let pdf_font = doc
        .add_external_font(Cursor::new(font.bytes().to_vec()))
        .map_err(|e| RenderError::Pdf(format!("font embedding failed: {e}")))?;

    // Baseline sits slightly below the middle of each line cell.
    let font_size_mm = config.font_size_pt * 25.4 / 72.0;
    let baseline_offset = config.line_height_mm / 2.0 + font_size_mm * 0.3;

    for (index, page_lines) in pages.iter().enumerate() {
        let (page, layer) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(width, height, format!("Page {}", index + 1))
        };
        let layer_ref = doc.get_page(page).get_layer(layer);

        for (row, line) in page_lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let y = config.page_height_mm
                - config.margin_top_mm
                - config.line_height_mm * row as f32
                - baseline_offset;
            layer_ref.use_text(
                line.as_str(),
                config.font_size_pt,
                Mm(config.margin_left_mm),
                Mm(y),
                &pdf_font,
            );
        }
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| RenderError::Pdf(e.to_string()))?;

    debug!("Rendered PDF '{title}': {} page(s), {} bytes", pages.len(), bytes.len());
    Ok(bytes)
}
