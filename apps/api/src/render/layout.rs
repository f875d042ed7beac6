//! Line breaking and pagination for generated text.
//!
//! Greedy word-wrap over measured glyph advances, same approach as a plain
//! multi-cell text box: paragraphs come from `\n`, blank lines are kept, and words
//! wider than the line are broken by character.

use crate::fonts::GlyphMetrics;

/// Page geometry in millimetres plus body font size.
#[derive(Debug, Clone)]
pub struct PageConfig {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_left_mm: f32,
    pub margin_top_mm: f32,
    /// Auto page break triggers when the next line would cross this bottom margin.
    pub margin_bottom_mm: f32,
    pub content_width_mm: f32,
    pub line_height_mm: f32,
    pub font_size_pt: f32,
}

const PT_PER_MM: f32 = 72.0 / 25.4;

impl PageConfig {
    /// A4, 10 mm left/top margins, 15 mm bottom break margin, 190 mm text width,
    /// 10 mm line height at 12 pt.
    pub fn a4() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_left_mm: 10.0,
            margin_top_mm: 10.0,
            margin_bottom_mm: 15.0,
            content_width_mm: 190.0,
            line_height_mm: 10.0,
            font_size_pt: 12.0,
        }
    }

    /// Usable text width in em units at the configured font size.
    pub fn text_width_em(&self) -> f32 {
        self.content_width_mm * PT_PER_MM / self.font_size_pt
    }

    /// How many lines fit between the top margin and the bottom break margin.
    pub fn lines_per_page(&self) -> usize {
        let usable = self.page_height_mm - self.margin_top_mm - self.margin_bottom_mm;
        ((usable / self.line_height_mm).floor() as usize).max(1)
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self::a4()
    }
}

/// Wraps every paragraph of `text` to `max_width_em`.
pub fn wrap_text(text: &str, metrics: &dyn GlyphMetrics, max_width_em: f32) -> Vec<String> {
    text.split('\n')
        .flat_map(|paragraph| wrap_paragraph(paragraph, metrics, max_width_em))
        .collect()
}

fn wrap_paragraph(paragraph: &str, metrics: &dyn GlyphMetrics, max_width_em: f32) -> Vec<String> {
    let words: Vec<&str> = paragraph.split_whitespace().collect();
    if words.is_empty() {
        return vec![String::new()];
    }

    let space_w = metrics.measure_str(" ");
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0_f32;

    for word in words {
        let word_w = metrics.measure_str(word);

        if word_w > max_width_em {
            // Flush, then hard-break the oversized word across as many lines as it needs.
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let mut pieces = break_word(word, metrics, max_width_em);
            let last = pieces.pop().unwrap_or_default();
            lines.extend(pieces);
            current_width = metrics.measure_str(&last);
            current = last;
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            current_width = word_w;
        } else if current_width + space_w + word_w > max_width_em {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_width = word_w;
        } else {
            current.push(' ');
            current.push_str(word);
            current_width += space_w + word_w;
        }
    }

    lines.push(current);
    lines
}

fn break_word(word: &str, metrics: &dyn GlyphMetrics, max_width_em: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut width = 0.0_f32;
    for c in word.chars() {
        let w = metrics.advance_em(c).unwrap_or(0.0);
        // Always place at least one char per line, even if it alone is too wide.
        if !piece.is_empty() && width + w > max_width_em {
            pieces.push(std::mem::take(&mut piece));
            width = 0.0;
        }
        piece.push(c);
        width += w;
    }
    pieces.push(piece);
    pieces
}

/// Splits wrapped lines into pages of at most `lines_per_page` lines.
/// Always returns at least one (possibly empty) page.
pub fn paginate(lines: Vec<String>, lines_per_page: usize) -> Vec<Vec<String>> {
    let per_page = lines_per_page.max(1);
    if lines.is_empty() {
        return vec![Vec::new()];
    }
    lines
        .chunks(per_page)
        .map(|chunk| chunk.to_vec())
        .collect()
}
