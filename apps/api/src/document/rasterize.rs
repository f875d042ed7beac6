use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use tokio::process::Command;
use tracing::debug;

use super::DocumentError;

/// Renders page 1 of a PDF to image bytes (any format the `image` crate can decode).
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn first_page(&self, pdf: &[u8]) -> Result<Vec<u8>, DocumentError>;
}

/// Rasterizes with poppler's `pdftoppm`.
///
/// Input and output live in a per-call `TempDir`, removed when it drops on every path.
pub struct PdftoppmRasterizer {
    binary: PathBuf,
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            binary: binary.into(),
            dpi,
        }
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new("pdftoppm", 150)
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn first_page(&self, pdf: &[u8]) -> Result<Vec<u8>, DocumentError> {
        let workdir = tempfile::tempdir()
            .map_err(|e| DocumentError::RasterizerUnavailable(format!("temp dir: {e}")))?;
        let input = workdir.path().join("resume.pdf");
        let output_prefix = workdir.path().join("page");

        tokio::fs::write(&input, pdf)
            .await
            .map_err(|e| DocumentError::RasterizerUnavailable(format!("temp write: {e}")))?;

        let output = Command::new(&self.binary)
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg("1")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg("-singlefile")
            .arg(&input)
            .arg(&output_prefix)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DocumentError::RasterizerUnavailable(format!(
                    "failed to run {}: {e}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocumentError::UnreadableDocument(format!(
                "page rasterization failed: {}",
                stderr.trim()
            )));
        }

        let image = tokio::fs::read(output_prefix.with_extension("png"))
            .await
            .map_err(|e| {
                DocumentError::UnreadableDocument(format!("rasterizer produced no image: {e}"))
            })?;

        debug!("Rasterized page 1 to {} bytes at {} dpi", image.len(), self.dpi);
        Ok(image)
    }
}

/// Decodes any supported raster and re-encodes it as baseline RGB JPEG.
pub fn encode_jpeg(raster: &[u8], quality: u8) -> Result<Vec<u8>, DocumentError> {
    let decoded = image::load_from_memory(raster)
        .map_err(|e| DocumentError::UnreadableDocument(format!("unreadable page image: {e}")))?;
    // JPEG has no alpha channel.
    let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        .map_err(|e| DocumentError::UnreadableDocument(format!("JPEG encoding failed: {e}")))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::extract::tests::sample_pdf;
    use crate::document::tests::tiny_png;

    #[test]
    fn test_encode_jpeg_from_png() {
        let jpeg = encode_jpeg(&tiny_png(), 85).unwrap();
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
        let back = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((back.width(), back.height()), (4, 4));
    }

    #[test]
    fn test_encode_jpeg_drops_alpha() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 128]));
        let mut png = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        assert!(encode_jpeg(&png.into_inner(), 85).is_ok());
    }

    #[test]
    fn test_encode_jpeg_rejects_non_image() {
        assert!(matches!(
            encode_jpeg(b"plain text", 85),
            Err(DocumentError::UnreadableDocument(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_reported() {
        let rasterizer = PdftoppmRasterizer::new("/nonexistent/pdftoppm", 72);
        let err = rasterizer.first_page(&sample_pdf(&["x"])).await.unwrap_err();
        assert!(matches!(err, DocumentError::RasterizerUnavailable(_)));
    }

    /// Writes a `pdftoppm` stand-in that logs its argv, one per line, and copies a
    /// fixture PNG to `<last arg>.png` the way `-singlefile` names its output.
    #[cfg(unix)]
    fn stub_pdftoppm(dir: &std::path::Path) -> (PathBuf, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let fixture = dir.join("fixture.png");
        std::fs::write(&fixture, tiny_png()).unwrap();
        let argv_log = dir.join("argv.txt");
        let script = dir.join("pdftoppm");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{log}'\nfor last; do :; done\ncp '{png}' \"$last.png\"\n",
                log = argv_log.display(),
                png = fixture.display(),
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script, argv_log)
    }

    #[cfg(unix)]
    fn logged_args(argv_log: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(argv_log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rasterizer_requests_page_one_only() {
        let dir = tempfile::tempdir().unwrap();
        let (binary, argv_log) = stub_pdftoppm(dir.path());
        let rasterizer = PdftoppmRasterizer::new(binary, 96);

        let png = rasterizer
            .first_page(&sample_pdf(&["first page", "second page"]))
            .await
            .unwrap();

        let args = logged_args(&argv_log);
        assert_eq!(&args[..4], ["-f", "1", "-l", "1"]);
        assert!(args.iter().any(|a| a == "-singlefile"));
        assert!(args.windows(2).any(|w| w == ["-r", "96"]));
        assert!(args[args.len() - 2].ends_with("resume.pdf"));

        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_two_page_resume_becomes_single_jpeg_payload() {
        use crate::document::{DocumentPreprocessor, InputMode, PayloadMime};
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let (binary, argv_log) = stub_pdftoppm(dir.path());
        let pre = DocumentPreprocessor::new(
            InputMode::Image,
            Arc::new(PdftoppmRasterizer::new(binary, 150)),
        );

        let payload = pre
            .prepare(Some(&sample_pdf(&["Jane Doe", "References"])))
            .await
            .unwrap();

        assert_eq!(payload.mime_type(), PayloadMime::ImageJpeg);
        let jpeg = STANDARD.decode(payload.data()).unwrap();
        let img = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));
        assert_eq!(&logged_args(&argv_log)[..4], ["-f", "1", "-l", "1"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rasterizer_failure_exit_is_unreadable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("pdftoppm");
        std::fs::write(&script, "#!/bin/sh\necho 'Syntax Error: broken xref' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = PdftoppmRasterizer::new(script, 72)
            .first_page(&sample_pdf(&["x"]))
            .await
            .unwrap_err();
        match err {
            DocumentError::UnreadableDocument(msg) => assert!(msg.contains("broken xref")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_installed_pdftoppm_renders_when_available() {
        let rasterizer = PdftoppmRasterizer::default();
        let pdf = sample_pdf(&["first", "second"]);
        match rasterizer.first_page(&pdf).await {
            Ok(png) => {
                let img = image::load_from_memory(&png).unwrap();
                assert!(img.width() > 0);
            }
            // poppler-utils not installed on this machine
            Err(DocumentError::RasterizerUnavailable(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
