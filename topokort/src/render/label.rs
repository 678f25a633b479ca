//! Bitmap text drawing.
//!
//! Labels are drawn from the 8×8 `font8x8` glyphs, scaled up by an integer
//! factor and filled as pixel rectangles so they can be rotated with the
//! rest of the canvas transform.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};

const GLYPH_SIZE: f32 = 8.0;

/// Glyph row treated as the baseline.
const BASELINE_ROW: f32 = 7.0;

/// Horizontal anchor of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// Vertical anchor of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// `y` is the text baseline
    Alphabetic,
    /// `y` is the vertical centre of the glyph box
    Middle,
}

/// Size, weight and colour of drawn text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Pixels per glyph dot
    pub scale: f32,
    pub bold: bool,
    pub color: Color,
}

impl TextStyle {
    pub fn new(scale: f32, color: Color) -> Self {
        Self {
            scale,
            bold: false,
            color,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Advance width of `text`.
    pub fn width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * GLYPH_SIZE * self.scale
    }

    /// Height of the glyph box.
    pub fn height(&self) -> f32 {
        GLYPH_SIZE * self.scale
    }
}

/// Transform that rotates 90° counter-clockwise about `(x, y)`.
pub fn quarter_turn_ccw(x: f32, y: f32) -> Transform {
    Transform::from_row(0.0, -1.0, 1.0, 0.0, x, y)
}

fn glyph(c: char) -> Option<[u8; 8]> {
    BASIC_FONTS.get(c).or_else(|| LATIN_FONTS.get(c))
}

/// Draws `text` anchored at `(x, y)` in the coordinate space of `transform`.
///
/// Characters without a glyph advance the cursor and draw nothing.
pub fn draw_text(
    pixmap: &mut Pixmap,
    text: &str,
    x: f32,
    y: f32,
    align: Align,
    baseline: Baseline,
    style: &TextStyle,
    transform: Transform,
) {
    let s = style.scale;
    let left = match align {
        Align::Left => x,
        Align::Right => x - style.width(text),
    };
    let top = match baseline {
        Baseline::Alphabetic => y - BASELINE_ROW * s,
        Baseline::Middle => y - GLYPH_SIZE * s / 2.0,
    };
    // Bold widens every dot by a third of a dot.
    let dot_w = if style.bold { s * 4.0 / 3.0 } else { s };

    let mut pb = PathBuilder::new();
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else { continue };
        let gx = left + i as f32 * GLYPH_SIZE * s;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..8 {
                if bits & (1 << col) == 0 {
                    continue;
                }
                if let Some(rect) =
                    Rect::from_xywh(gx + col as f32 * s, top + row as f32 * s, dot_w, s)
                {
                    pb.push_rect(rect);
                }
            }
        }
    }
    let Some(path) = pb.finish() else { return };

    let mut paint = Paint::default();
    paint.set_color(style.color);
    paint.anti_alias = false;
    pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
}
