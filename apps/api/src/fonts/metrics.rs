//! Glyph metrics for line breaking.
//!
//! Widths are in em units (relative to font size), read from the font's horizontal
//! advance table. Kerning is ignored; the wrapper works on whole-word advances, which
//! is accurate to well under one glyph per line for the body text we render.

use ttf_parser::Face;

/// Per-character advance widths for a font.
pub trait GlyphMetrics {
    /// Advance width of `c` in em units, or `None` if the font has no glyph for it.
    fn advance_em(&self, c: char) -> Option<f32>;

    /// Returns true if the font can draw `c`.
    fn has_glyph(&self, c: char) -> bool {
        self.advance_em(c).is_some()
    }

    /// Measures the rendered width of a string in em units.
    ///
    /// Characters without a glyph contribute nothing; callers substitute or reject them
    /// before measuring.
    fn measure_str(&self, s: &str) -> f32 {
        s.chars().filter_map(|c| self.advance_em(c)).sum()
    }
}

/// Metrics backed by a parsed TrueType face.
pub struct TtfMetrics<'a> {
    face: Face<'a>,
    units_per_em: f32,
}

impl<'a> TtfMetrics<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, ttf_parser::FaceParsingError> {
        let face = Face::parse(data, 0)?;
        let units_per_em = f32::from(face.units_per_em().max(1));
        Ok(Self { face, units_per_em })
    }
}

impl GlyphMetrics for TtfMetrics<'_> {
    fn advance_em(&self, c: char) -> Option<f32> {
        let id = self.face.glyph_index(c)?;
        // Glyph 0 is .notdef: the font maps the char to its "missing" box.
        if id.0 == 0 {
            return None;
        }
        let advance = self.face.glyph_hor_advance(id).unwrap_or(0);
        Some(f32::from(advance) / self.units_per_em)
    }
}

/// Fixed-advance metrics covering printable ASCII plus any extra characters.
///
/// Stands in for a real face in layout tests.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MonospaceMetrics {
    pub advance_em: f32,
    pub extra: Vec<char>,
}

#[cfg(test)]
impl MonospaceMetrics {
    pub fn ascii(advance_em: f32) -> Self {
        Self {
            advance_em,
            extra: Vec::new(),
        }
    }
}

#[cfg(test)]
impl GlyphMetrics for MonospaceMetrics {
    fn advance_em(&self, c: char) -> Option<f32> {
        if (' '..='~').contains(&c) || self.extra.contains(&c) {
            Some(self.advance_em)
        } else {
            None
        }
    }
}
