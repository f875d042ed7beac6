//! Document preprocessor: turns an uploaded resume PDF into the single payload sent
//! to the model.
//!
//! Only page 1 is ever used; later pages are ignored without comment.
//! - `InputMode::Image` rasterizes page 1 and re-encodes it as JPEG (default).
//! - `InputMode::Text` extracts page 1's text layer instead, which keeps wording exact
//!   but loses visual layout. A page whose text cannot be extracted (scans, encodings
//!   the extractor rejects) is sent as an image instead.
//!
//! PDF parsing and JPEG encoding are CPU-bound and run inside `spawn_blocking`.

pub mod extract;
pub mod rasterize;

use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use rasterize::{PageRasterizer, PdftoppmRasterizer};

const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("No document was provided")]
    NoDocumentProvided,

    #[error("The document could not be read: {0}")]
    UnreadableDocument(String),

    #[error("Page rasterizer unavailable: {0}")]
    RasterizerUnavailable(String),
}

/// How a resume is presented to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Image,
    Text,
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(InputMode::Image),
            "text" => Ok(InputMode::Text),
            other => Err(format!("expected 'image' or 'text', got '{other}'")),
        }
    }
}

/// The closed set of payload content types the gateway accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PayloadMime {
    #[serde(rename = "image/jpeg")]
    ImageJpeg,
    #[serde(rename = "text/plain")]
    TextPlain,
}

impl PayloadMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadMime::ImageJpeg => "image/jpeg",
            PayloadMime::TextPlain => "text/plain",
        }
    }
}

/// Encoded document content: exactly one per request, built from page 1 only.
///
/// `data` is base64 for images and raw UTF-8 for extracted text. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedPayload {
    mime_type: PayloadMime,
    data: String,
}

impl EncodedPayload {
    /// Wraps JPEG bytes. Rejects an empty image.
    pub fn jpeg(image_bytes: &[u8]) -> Result<Self, DocumentError> {
        if image_bytes.is_empty() {
            return Err(DocumentError::UnreadableDocument(
                "rasterized page is empty".to_string(),
            ));
        }
        Ok(Self {
            mime_type: PayloadMime::ImageJpeg,
            data: STANDARD.encode(image_bytes),
        })
    }

    /// Wraps extracted page text. Rejects text with no visible characters.
    pub fn text(page_text: String) -> Result<Self, DocumentError> {
        if page_text.trim().is_empty() {
            return Err(DocumentError::UnreadableDocument(
                "first page has no extractable text".to_string(),
            ));
        }
        Ok(Self {
            mime_type: PayloadMime::TextPlain,
            data: page_text,
        })
    }

    pub fn mime_type(&self) -> PayloadMime {
        self.mime_type
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}

/// Converts uploaded resumes into `EncodedPayload`s.
#[derive(Clone)]
pub struct DocumentPreprocessor {
    mode: InputMode,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl DocumentPreprocessor {
    pub fn new(mode: InputMode, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self { mode, rasterizer }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Prepares the payload for one request.
    ///
    /// `None` or an empty upload is `NoDocumentProvided`. A PDF that does not parse or
    /// has no pages is `UnreadableDocument`.
    pub async fn prepare(&self, document: Option<&[u8]>) -> Result<EncodedPayload, DocumentError> {
        let bytes = match document {
            Some(b) if !b.is_empty() => b.to_vec(),
            _ => return Err(DocumentError::NoDocumentProvided),
        };

        let (page_count, bytes) = tokio::task::spawn_blocking(move || {
            extract::page_count(&bytes).map(|count| (count, bytes))
        })
        .await
        .map_err(|e| DocumentError::UnreadableDocument(format!("validation task failed: {e}")))??;

        debug!("Resume has {page_count} page(s); using page 1 only");

        let payload = match self.mode {
            InputMode::Image => self.image_payload(&bytes).await?,
            InputMode::Text => match text_payload(bytes.clone()).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("No usable text on page 1, sending it as an image instead: {e}");
                    self.image_payload(&bytes).await?
                }
            },
        };

        info!(
            "Prepared {} payload ({} chars)",
            payload.mime_type().as_str(),
            payload.data().len()
        );
        Ok(payload)
    }

    async fn image_payload(&self, pdf: &[u8]) -> Result<EncodedPayload, DocumentError> {
        let raster = self.rasterizer.first_page(pdf).await?;
        let jpeg = tokio::task::spawn_blocking(move || rasterize::encode_jpeg(&raster, JPEG_QUALITY))
            .await
            .map_err(|e| DocumentError::UnreadableDocument(format!("encoding task failed: {e}")))??;
        EncodedPayload::jpeg(&jpeg)
    }
}

async fn text_payload(pdf: Vec<u8>) -> Result<EncodedPayload, DocumentError> {
    let text = tokio::task::spawn_blocking(move || extract::first_page_text(&pdf))
        .await
        .map_err(|e| DocumentError::UnreadableDocument(format!("extraction task failed: {e}")))??;
    EncodedPayload::text(text)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rasterizer that returns a small PNG and counts calls.
    pub(crate) struct FakeRasterizer {
        pub calls: AtomicUsize,
    }

    impl FakeRasterizer {
        pub(crate) fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageRasterizer for FakeRasterizer {
        async fn first_page(&self, _pdf: &[u8]) -> Result<Vec<u8>, DocumentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(tiny_png())
        }
    }

    pub(crate) fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_input_mode_parse() {
        assert_eq!("IMAGE".parse::<InputMode>().unwrap(), InputMode::Image);
        assert_eq!(" text ".parse::<InputMode>().unwrap(), InputMode::Text);
        assert!("ocr".parse::<InputMode>().is_err());
    }

    #[test]
    fn test_payload_serializes_with_mime_string() {
        let payload = EncodedPayload::jpeg(&[0xFF, 0xD8, 0xFF]).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["mime_type"], "image/jpeg");
        assert_eq!(json["data"], "/9j/");
    }

    #[test]
    fn test_empty_payloads_rejected() {
        assert!(EncodedPayload::jpeg(&[]).is_err());
        assert!(EncodedPayload::text("  \n".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_prepare_without_document() {
        let pre = DocumentPreprocessor::new(InputMode::Image, Arc::new(FakeRasterizer::new()));
        assert!(matches!(
            pre.prepare(None).await,
            Err(DocumentError::NoDocumentProvided)
        ));
        assert!(matches!(
            pre.prepare(Some(&[])).await,
            Err(DocumentError::NoDocumentProvided)
        ));
    }

    #[tokio::test]
    async fn test_prepare_rejects_corrupt_pdf() {
        let raster = Arc::new(FakeRasterizer::new());
        let pre = DocumentPreprocessor::new(InputMode::Image, raster.clone());
        let err = pre.prepare(Some(b"%PDF-1.4 garbage")).await.unwrap_err();
        assert!(matches!(err, DocumentError::UnreadableDocument(_)));
        assert_eq!(raster.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prepare_two_page_pdf_yields_one_jpeg_payload() {
        let raster = Arc::new(FakeRasterizer::new());
        let pre = DocumentPreprocessor::new(InputMode::Image, raster.clone());
        let pdf = extract::tests::sample_pdf(&["Page one text", "Page two text"]);

        let payload = pre.prepare(Some(&pdf)).await.unwrap();

        assert_eq!(payload.mime_type(), PayloadMime::ImageJpeg);
        assert!(!payload.data().is_empty());
        let jpeg = STANDARD.decode(payload.data()).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "payload must be a JPEG");
        assert_eq!(raster.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prepare_text_mode_uses_first_page_only() {
        let pre = DocumentPreprocessor::new(InputMode::Text, Arc::new(FakeRasterizer::new()));
        let pdf = extract::tests::sample_pdf(&["Alpha resume", "Omega appendix"]);

        let payload = pre.prepare(Some(&pdf)).await.unwrap();

        assert_eq!(payload.mime_type(), PayloadMime::TextPlain);
        assert!(payload.data().contains("Alpha"));
        assert!(!payload.data().contains("Omega"));
    }

    #[tokio::test]
    async fn test_text_mode_falls_back_to_image_for_blank_page() {
        let raster = Arc::new(FakeRasterizer::new());
        let pre = DocumentPreprocessor::new(InputMode::Text, raster.clone());
        let pdf = extract::tests::sample_pdf(&[""]);

        let payload = pre.prepare(Some(&pdf)).await.unwrap();

        assert_eq!(payload.mime_type(), PayloadMime::ImageJpeg);
        assert_eq!(raster.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_text_mode_accepts_own_generated_resume() {
        let font = crate::fonts::test_font();
        let pdf = crate::render::render_pdf(
            "JANE DOE\nRust, Kafka, Postgres",
            "Updated Resume",
            &font,
            &crate::render::PageConfig::a4(),
            crate::render::GlyphPolicy::Substitute,
        )
        .unwrap();
        let pre = DocumentPreprocessor::new(InputMode::Text, Arc::new(FakeRasterizer::new()));

        assert!(pre.prepare(Some(&pdf)).await.is_ok());
    }
}
