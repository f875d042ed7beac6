use lopdf::Document;

use super::DocumentError;

/// Parses the PDF and returns its page count. Zero pages is unreadable.
pub fn page_count(pdf: &[u8]) -> Result<usize, DocumentError> {
    let doc = Document::load_mem(pdf)
        .map_err(|e| DocumentError::UnreadableDocument(format!("invalid PDF: {e}")))?;
    match doc.get_pages().len() {
        0 => Err(DocumentError::UnreadableDocument(
            "PDF has no pages".to_string(),
        )),
        n => Ok(n),
    }
}

/// Extracts the text layer of page 1.
///
/// Later pages are deleted before extraction so none of their text can leak in.
pub fn first_page_text(pdf: &[u8]) -> Result<String, DocumentError> {
    let mut doc = Document::load_mem(pdf)
        .map_err(|e| DocumentError::UnreadableDocument(format!("invalid PDF: {e}")))?;

    let later: Vec<u32> = doc.get_pages().keys().copied().filter(|n| *n > 1).collect();
    if !later.is_empty() {
        doc.delete_pages(&later);
    }

    let mut single = Vec::new();
    doc.save_to(&mut single)
        .map_err(|e| DocumentError::UnreadableDocument(format!("could not isolate page 1: {e}")))?;

    // pdf-extract panics on some well-formed PDFs (printpdf output among them).
    let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&single))
        .map_err(|_| {
            DocumentError::UnreadableDocument(
                "text layer uses an encoding the extractor cannot decode".to_string(),
            )
        })?
        .map_err(|e| DocumentError::UnreadableDocument(format!("text extraction failed: {e}")))?;

    Ok(normalize_whitespace(&text))
}

/// Collapses runs of blank lines and trims trailing spaces left by the extractor.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines().map(str::trim_end) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Builds an uncompressed PDF with one line of Courier text per page.
    pub(crate) fn sample_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 14.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_extractor_panic_becomes_unreadable() {
        let font = crate::fonts::test_font();
        let pdf = crate::render::render_pdf(
            "Jane Doe\nSenior Backend Engineer",
            "Updated Resume",
            &font,
            &crate::render::PageConfig::a4(),
            crate::render::GlyphPolicy::Substitute,
        )
        .unwrap();

        // Either the text comes out or a typed error does; the panic never escapes.
        if let Err(e) = first_page_text(&pdf) {
            assert!(matches!(e, DocumentError::UnreadableDocument(_)));
        }
    }

    #[test]
    fn test_page_count_multi_page() {
        let pdf = sample_pdf(&["one", "two", "three"]);
        assert_eq!(page_count(&pdf).unwrap(), 3);
    }

    #[test]
    fn test_page_count_rejects_garbage() {
        assert!(matches!(
            page_count(b"not a pdf at all"),
            Err(DocumentError::UnreadableDocument(_))
        ));
    }

    #[test]
    fn test_first_page_text_ignores_later_pages() {
        let pdf = sample_pdf(&["Experience", "References"]);
        let text = first_page_text(&pdf).unwrap();
        assert!(text.contains("Experience"), "got: {text:?}");
        assert!(!text.contains("References"));
    }

    #[test]
    fn test_normalize_whitespace_collapses_blank_runs() {
        let raw = "Name  \n\n\n\nSkills\n   \nRust\n";
        assert_eq!(normalize_whitespace(raw), "Name\n\nSkills\n\nRust");
    }
}
