//! Text measurement and glyph lookup for callout text.
//!
//! Layout only ever needs a width for a string at a given pixel size, so the
//! seam is a single-method trait. The bundled implementation is an 8x8 bitmap
//! font with a fixed advance, which keeps line breaks identical on every
//! machine regardless of installed system fonts.

use font8x8::{UnicodeFonts, BASIC_FONTS};

pub trait FontMetrics: Send + Sync {
    /// Width of `text` in logical units at `size` pixels.
    fn measure(&self, text: &str, size: f32) -> f32;
}

/// Monospaced bitmap font backed by `font8x8`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitmapFont {
    advance_ratio: f32,
}

impl BitmapFont {
    pub const fn new() -> Self {
        Self { advance_ratio: 0.5 }
    }

    /// Horizontal advance of one character at `size` pixels
    pub fn advance(&self, ch: char, size: f32) -> f32 {
        if is_zero_width(ch) {
            0.0
        } else {
            size * self.advance_ratio
        }
    }

    /// Height of one glyph row at `size` pixels (glyphs are 8 rows tall)
    pub fn row_height(&self, size: f32) -> f32 {
        size / 8.0
    }

    /// Distance from the baseline up to the top of the glyph cell
    pub fn ascent(&self, size: f32) -> f32 {
        self.row_height(size) * 7.0
    }

    /// Bitmap rows for `ch`; bit 0 is the leftmost column. Characters outside
    /// the basic set render as their ASCII stand-in or `?`.
    pub fn glyph(&self, ch: char) -> Option<[u8; 8]> {
        if is_zero_width(ch) || ch == ' ' {
            return None;
        }
        BASIC_FONTS
            .get(substitute(ch))
            .or_else(|| BASIC_FONTS.get('?'))
    }
}

impl Default for BitmapFont {
    fn default() -> Self {
        Self::new()
    }
}

impl FontMetrics for BitmapFont {
    fn measure(&self, text: &str, size: f32) -> f32 {
        text.chars().map(|c| self.advance(c, size)).sum()
    }
}

fn is_zero_width(ch: char) -> bool {
    matches!(ch, '\u{FE0E}' | '\u{FE0F}' | '\u{200B}'..='\u{200D}')
}

// Stand-ins for the header icons
fn substitute(ch: char) -> char {
    match ch {
        '\u{2757}' | '\u{2755}' | '\u{26A0}' => '!',
        '\u{1F53C}' | '\u{25B2}' => '^',
        c => c,
    }
}
