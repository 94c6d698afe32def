//! Font faces, metrics, and glyph rasterization.
//!
//! A [`FontSet`] holds a regular face and an optional bold face. When bold
//! text is requested and no bold face exists, the regular glyph is
//! double-struck one pixel to the right (the classic faux-bold stroke).
//! TTF faces go through fontdue; the built-in bitmap font covers the
//! no-font-supplied case and keeps tests deterministic.

pub mod builtin;

/// Vertical metrics at a given size, measured from the baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    /// Positive distance below the baseline.
    pub descent: f32,
}

/// One rasterized glyph: 8-bit coverage, row-major, top-down.
#[derive(Debug, Clone)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    /// Horizontal offset from the pen position to the bitmap's left edge.
    pub xmin: i32,
    /// Offset from the baseline to the bitmap's bottom edge (negative for
    /// descenders), matching fontdue's convention.
    pub ymin: i32,
    pub advance: f32,
    pub coverage: Vec<u8>,
}

enum Face {
    Ttf(fontdue::Font),
    Builtin,
}

/// The fonts available to layout and rasterization.
pub struct FontSet {
    regular: Face,
    bold: Option<Face>,
}

impl FontSet {
    /// The embedded bitmap font; always succeeds.
    pub fn builtin() -> Self {
        Self {
            regular: Face::Builtin,
            bold: None,
        }
    }

    /// Load caller-supplied TTF bytes. A missing or unparsable bold face
    /// is not an error; bold text is synthesized.
    pub fn from_ttf(regular: &[u8], bold: Option<&[u8]>) -> std::result::Result<Self, String> {
        let regular = fontdue::Font::from_bytes(regular, fontdue::FontSettings::default())?;
        let bold = bold.and_then(|bytes| {
            fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default()).ok()
        });
        Ok(Self {
            regular: Face::Ttf(regular),
            bold: bold.map(Face::Ttf),
        })
    }

    fn face_for(&self, bold: bool) -> (&Face, bool) {
        match (bold, &self.bold) {
            (true, Some(face)) => (face, false),
            (true, None) => (&self.regular, true),
            (false, _) => (&self.regular, false),
        }
    }

    pub fn line_metrics(&self, size: f32) -> LineMetrics {
        match &self.regular {
            Face::Ttf(font) => match font.horizontal_line_metrics(size) {
                Some(lines) => LineMetrics {
                    ascent: lines.ascent,
                    descent: -lines.descent,
                },
                None => fallback_metrics(size),
            },
            Face::Builtin => {
                let scale = builtin::scale_for_size(size) as f32;
                LineMetrics {
                    ascent: builtin::GLYPH_HEIGHT as f32 * scale,
                    descent: 2.0 * scale,
                }
            }
        }
    }

    /// Horizontal advance of one character.
    pub fn advance(&self, ch: char, size: f32, bold: bool) -> f32 {
        let (face, synthesize) = self.face_for(bold);
        let base = match face {
            Face::Ttf(font) => font.metrics(ch, size).advance_width,
            Face::Builtin => {
                (builtin::GLYPH_ADVANCE * builtin::scale_for_size(size)) as f32
            }
        };
        if synthesize { base + 1.0 } else { base }
    }

    /// Width of a whole string at the given style.
    pub fn measure(&self, text: &str, size: f32, bold: bool) -> f32 {
        text.chars().map(|ch| self.advance(ch, size, bold)).sum()
    }

    pub fn space_width(&self, size: f32, bold: bool) -> f32 {
        self.advance(' ', size, bold)
    }

    /// Rasterize one glyph as coverage. Deterministic for a given
    /// (character, size, style) triple.
    pub fn rasterize(&self, ch: char, size: f32, bold: bool) -> GlyphBitmap {
        let (face, synthesize) = self.face_for(bold);
        let glyph = match face {
            Face::Ttf(font) => {
                let (metrics, coverage) = font.rasterize(ch, size);
                GlyphBitmap {
                    width: metrics.width,
                    height: metrics.height,
                    xmin: metrics.xmin,
                    ymin: metrics.ymin,
                    advance: metrics.advance_width,
                    coverage,
                }
            }
            Face::Builtin => rasterize_builtin(ch, size),
        };
        if synthesize { embolden(glyph) } else { glyph }
    }
}

fn fallback_metrics(size: f32) -> LineMetrics {
    LineMetrics {
        ascent: size * 0.8,
        descent: size * 0.2,
    }
}

fn rasterize_builtin(ch: char, size: f32) -> GlyphBitmap {
    let scale = builtin::scale_for_size(size) as usize;
    let rows = builtin::glyph(ch);
    let width = builtin::GLYPH_WIDTH as usize * scale;
    let height = builtin::GLYPH_HEIGHT as usize * scale;
    let mut coverage = vec![0u8; width * height];
    for (row, &bits) in rows.iter().enumerate() {
        for col in 0..builtin::GLYPH_WIDTH as usize {
            let mask = 1u8 << (builtin::GLYPH_WIDTH as usize - 1 - col);
            if bits & mask == 0 {
                continue;
            }
            for dy in 0..scale {
                let y = row * scale + dy;
                for dx in 0..scale {
                    coverage[y * width + col * scale + dx] = 255;
                }
            }
        }
    }
    GlyphBitmap {
        width,
        height,
        xmin: 0,
        // The 5x7 box sits entirely above the baseline.
        ymin: 0,
        advance: (builtin::GLYPH_ADVANCE as usize * scale) as f32,
        coverage,
    }
}

/// Faux bold: widen by one pixel and take the max of the glyph and its
/// right-shifted copy.
fn embolden(glyph: GlyphBitmap) -> GlyphBitmap {
    if glyph.width == 0 || glyph.height == 0 {
        return GlyphBitmap {
            advance: glyph.advance + 1.0,
            ..glyph
        };
    }
    let width = glyph.width + 1;
    let mut coverage = vec![0u8; width * glyph.height];
    for y in 0..glyph.height {
        for x in 0..glyph.width {
            let v = glyph.coverage[y * glyph.width + x];
            let dst = &mut coverage[y * width + x];
            *dst = (*dst).max(v);
            let dst = &mut coverage[y * width + x + 1];
            *dst = (*dst).max(v);
        }
    }
    GlyphBitmap {
        width,
        height: glyph.height,
        xmin: glyph.xmin,
        ymin: glyph.ymin,
        advance: glyph.advance + 1.0,
        coverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_metrics_scale_with_size() {
        let fonts = FontSet::builtin();
        let small = fonts.line_metrics(8.0);
        let large = fonts.line_metrics(24.0);
        assert!(large.ascent > small.ascent);
    }

    #[test]
    fn builtin_advance_is_uniform() {
        let fonts = FontSet::builtin();
        assert_eq!(fonts.advance('a', 22.0, false), fonts.advance('W', 22.0, false));
    }

    #[test]
    fn synthesized_bold_is_wider() {
        let fonts = FontSet::builtin();
        let regular = fonts.rasterize('H', 16.0, false);
        let bold = fonts.rasterize('H', 16.0, true);
        assert_eq!(bold.width, regular.width + 1);
        assert!(bold.advance > regular.advance);
    }

    #[test]
    fn rasterization_is_deterministic() {
        let fonts = FontSet::builtin();
        let a = fonts.rasterize('g', 22.0, false);
        let b = fonts.rasterize('g', 22.0, false);
        assert_eq!(a.coverage, b.coverage);
    }

    #[test]
    fn bad_ttf_bytes_are_rejected() {
        assert!(FontSet::from_ttf(b"not a font", None).is_err());
    }
}
