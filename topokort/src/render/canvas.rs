//! Page canvas drawing: grid, colour filters, track and labels.

use tiny_skia::{Color, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use super::label::{draw_text, quarter_turn_ccw, Align, Baseline, TextStyle};
use crate::config::Rgb;
use crate::coord::{Epsg, Point};
use crate::geometry::{format_declination, format_scale_label, BBox};

/// Grid line spacing in metres.
pub const GRID_SPACING_M: f64 = 1000.0;

/// Contrast boost applied after greyscale conversion.
pub const GREYSCALE_CONTRAST: f32 = 1.15;

/// Extra stroke width of the white halo under a greyscale track.
pub const GREYSCALE_HALO_EXTRA: f32 = 3.0;

const LABEL_PAD: f32 = 12.0;
const LABEL_LINE_HEIGHT: f32 = 32.0;
const LABEL_TEXT_INSET: f32 = 9.0;

/// Stroke and label colours of the UTM grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStyle {
    pub line: Color,
    pub width: f32,
    pub label: Color,
}

impl GridStyle {
    /// Cyan grid drawn under the overlays on colour pages.
    pub fn colour() -> Self {
        Self {
            line: Color::from_rgba8(0, 210, 210, 191),
            width: 2.0,
            label: Color::from_rgba8(0x33, 0x33, 0x33, 255),
        }
    }

    /// Light grey grid drawn after greyscale conversion.
    pub fn greyscale() -> Self {
        Self {
            line: Color::from_rgba8(140, 140, 140, 128),
            width: 1.0,
            label: Color::from_rgba8(0x55, 0x55, 0x55, 255),
        }
    }
}

/// Maps planar coordinates inside `bbox` to pixels of a `width`×`height` canvas.
#[derive(Debug, Clone, Copy)]
struct PixelMap {
    bbox: BBox,
    width: f64,
    height: f64,
}

impl PixelMap {
    fn new(bbox: BBox, pixmap: &Pixmap) -> Self {
        Self {
            bbox,
            width: f64::from(pixmap.width()),
            height: f64::from(pixmap.height()),
        }
    }

    fn x(&self, x: f64) -> f64 {
        (x - self.bbox.minx) / self.bbox.width() * self.width
    }

    fn y(&self, y: f64) -> f64 {
        (self.bbox.maxy - y) / self.bbox.height() * self.height
    }
}

/// Grid values `spacing` apart within `[min, max]`.
fn grid_values(min: f64, max: f64, spacing: f64) -> Vec<f64> {
    let start = (min / spacing).ceil() as i64;
    let end = (max / spacing).floor() as i64;
    (start..=end).map(|i| i as f64 * spacing).collect()
}

fn stroke(width: f32) -> Stroke {
    Stroke {
        width,
        ..Stroke::default()
    }
}

fn paint_of(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint
}

/// Draws UTM grid lines every `spacing` metres and their coordinate labels.
///
/// Northing labels are right-aligned against the middle vertical line;
/// easting labels run upwards along each vertical line from the middle
/// horizontal line. Labels too close to the edge are skipped.
pub fn draw_utm_grid(pixmap: &mut Pixmap, bbox: &BBox, spacing: f64, style: &GridStyle) {
    let map = PixelMap::new(*bbox, pixmap);
    let (w, h) = (map.width, map.height);
    let eastings = grid_values(bbox.minx, bbox.maxx, spacing);
    let northings = grid_values(bbox.miny, bbox.maxy, spacing);

    let mut pb = PathBuilder::new();
    for &x in &eastings {
        let px = map.x(x).round() as f32;
        pb.move_to(px, 0.0);
        pb.line_to(px, h as f32);
    }
    for &y in &northings {
        let py = map.y(y).round() as f32;
        pb.move_to(0.0, py);
        pb.line_to(w as f32, py);
    }
    if let Some(path) = pb.finish() {
        pixmap.stroke_path(&path, &paint_of(style.line), &stroke(style.width), Transform::identity(), None);
    }

    // "bold 18px": two dots per glyph row.
    let text = TextStyle::new(2.0, style.label).bold();
    let vertical: Vec<f64> = eastings.iter().map(|x| map.x(*x)).collect();
    let horizontal: Vec<f64> = northings.iter().map(|y| map.y(*y)).collect();
    let mid_v = vertical.get(vertical.len() / 2).copied().unwrap_or(w / 2.0);
    let mid_h = horizontal.get(horizontal.len() / 2).copied().unwrap_or(h / 2.0);

    for (&y, &py) in northings.iter().zip(&horizontal) {
        if py < 20.0 || py > h - 20.0 {
            continue;
        }
        draw_text(
            pixmap,
            &format!("{}m N", y as i64),
            (mid_v - 4.0) as f32,
            py as f32,
            Align::Right,
            Baseline::Middle,
            &text,
            Transform::identity(),
        );
    }
    for (&x, &px) in eastings.iter().zip(&vertical) {
        if px < 40.0 || px > w - 40.0 {
            continue;
        }
        draw_text(
            pixmap,
            &format!("{}m E", x as i64),
            4.0,
            0.0,
            Align::Left,
            Baseline::Middle,
            &text,
            quarter_turn_ccw(px as f32, mid_h as f32),
        );
    }
}

/// Converts the canvas to BT.601 luma in place. Alpha is kept.
pub fn apply_greyscale(pixmap: &mut Pixmap) {
    map_colour(pixmap, |r, g, b| {
        let grey = 0.299 * r + 0.587 * g + 0.114 * b;
        (grey, grey, grey)
    });
}

/// Linear contrast around mid-grey: `factor·c + 128·(1 − factor)`.
pub fn apply_contrast(pixmap: &mut Pixmap, factor: f32) {
    let intercept = 128.0 * (1.0 - factor);
    let adjust = |c: f32| factor * c + intercept;
    map_colour(pixmap, |r, g, b| (adjust(r), adjust(g), adjust(b)));
}

fn map_colour(pixmap: &mut Pixmap, f: impl Fn(f32, f32, f32) -> (f32, f32, f32)) {
    let to_u8 = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    for pixel in pixmap.pixels_mut() {
        if pixel.alpha() == 0 {
            continue;
        }
        let c = pixel.demultiply();
        let (r, g, b) = f(f32::from(c.red()), f32::from(c.green()), f32::from(c.blue()));
        *pixel = tiny_skia::ColorU8::from_rgba(to_u8(r), to_u8(g), to_u8(b), c.alpha()).premultiply();
    }
}

/// Stroke parameters of a track polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPaint {
    pub color: Rgb,
    pub opacity: f32,
    pub width: f32,
}

/// Per-point flags marking the first point of every sub-track.
fn segment_starts(n: usize, breaks: &[usize]) -> Vec<bool> {
    let mut starts = vec![false; n];
    for &i in breaks {
        if let Some(flag) = starts.get_mut(i) {
            *flag = true;
        }
    }
    starts
}

/// Indices of the points that take part in the page's polyline.
///
/// A point is drawn when it lies inside `bbox`, when it neighbours such a
/// point across a non-break edge, or when the segment it starts or ends
/// crosses `bbox`. No segment is ever formed into a break index.
fn visible_points(points: &[Point], starts: &[bool], bbox: &BBox) -> Vec<bool> {
    let n = points.len();
    let is_break = |i: usize| starts.get(i).copied().unwrap_or(false);
    let mut mask = vec![false; n];
    for (i, p) in points.iter().enumerate() {
        if !bbox.contains(*p) {
            continue;
        }
        mask[i] = true;
        if i > 0 && !is_break(i) {
            mask[i - 1] = true;
        }
        if i + 1 < n && !is_break(i + 1) {
            mask[i + 1] = true;
        }
    }
    for i in 0..n.saturating_sub(1) {
        if is_break(i + 1) || (mask[i] && mask[i + 1]) {
            continue;
        }
        if bbox.intersects_segment(points[i], points[i + 1]) {
            mask[i] = true;
            mask[i + 1] = true;
        }
    }
    mask
}

/// Builds the page path of a track, starting a new sub-path at every break
/// and wherever the track leaves the page.
fn track_path(points: &[Point], breaks: &[usize], bbox: &BBox, pixmap: &Pixmap) -> Option<tiny_skia::Path> {
    let map = PixelMap::new(*bbox, pixmap);
    let starts = segment_starts(points.len(), breaks);
    let mask = visible_points(points, &starts, bbox);
    let mut pb = PathBuilder::new();
    let mut started = false;
    for (i, p) in points.iter().enumerate() {
        if starts[i] {
            started = false;
        }
        if !mask[i] {
            started = false;
            continue;
        }
        let (x, y) = (map.x(p.x) as f32, map.y(p.y) as f32);
        if started {
            pb.line_to(x, y);
        } else {
            pb.move_to(x, y);
            started = true;
        }
    }
    pb.finish()
}

/// Strokes the part of a projected track that touches `bbox`.
pub fn draw_track(pixmap: &mut Pixmap, points: &[Point], breaks: &[usize], bbox: &BBox, style: &TrackPaint) {
    let Some(path) = track_path(points, breaks, bbox, pixmap) else {
        return;
    };
    let Rgb(r, g, b) = style.color;
    let alpha = (style.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let stroke = Stroke {
        width: style.width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &paint_of(Color::from_rgba8(r, g, b, alpha)), &stroke, Transform::identity(), None);
}

fn label_colours(greyscale: bool) -> (Color, Color) {
    if greyscale {
        (Color::from_rgba8(255, 255, 255, 204), Color::BLACK)
    } else {
        (Color::from_rgba8(255, 255, 255, 153), Color::from_rgba8(0x11, 0x11, 0x11, 255))
    }
}

/// Text style of the page and declination labels.
fn label_text(color: Color) -> TextStyle {
    TextStyle::new(3.0, color)
}

fn fill_box(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, color: Color) {
    if let Some(rect) = Rect::from_xywh(x, y, w, h) {
        pixmap.fill_rect(rect, &paint_of(color), Transform::identity(), None);
    }
}

/// Text of the page label, `"3 | 1:50.000 | UTM 33"`.
pub fn page_label(page_number: usize, scale: u32, epsg: Epsg) -> String {
    format!("{page_number} | 1:{} | UTM {}", format_scale_label(scale), epsg.zone())
}

/// Stamps the page/scale/zone label in the top-left corner.
pub fn draw_page_label(pixmap: &mut Pixmap, page_number: usize, scale: u32, epsg: Epsg, greyscale: bool) {
    let label = page_label(page_number, scale, epsg);
    let (background, foreground) = label_colours(greyscale);
    let text = label_text(foreground);
    fill_box(
        pixmap,
        LABEL_PAD,
        LABEL_PAD,
        text.width(&label) + LABEL_PAD * 2.0,
        LABEL_LINE_HEIGHT + LABEL_PAD,
        background,
    );
    draw_text(
        pixmap,
        &label,
        LABEL_PAD + LABEL_TEXT_INSET,
        LABEL_PAD + LABEL_LINE_HEIGHT,
        Align::Left,
        Baseline::Alphabetic,
        &text,
        Transform::identity(),
    );
}

/// Lines of the declination label.
///
/// Declination against grid north is the true-north declination minus the
/// grid convergence; it is unknown when either input is.
pub fn declination_lines(declination_true: f64, convergence: f64) -> [String; 2] {
    let grid = if declination_true.is_finite() && convergence.is_finite() {
        declination_true - convergence
    } else {
        f64::NAN
    };
    [
        format!("Mag. decl. (grid): {}", format_declination(grid)),
        format!("Mag. decl. (true north): {}", format_declination(declination_true)),
    ]
}

/// Stamps the two-line declination label in the bottom-left corner.
pub fn draw_declination_label(pixmap: &mut Pixmap, declination_true: f64, convergence: f64, greyscale: bool) {
    let lines = declination_lines(declination_true, convergence);
    let (background, foreground) = label_colours(greyscale);
    let text = label_text(foreground);
    let text_w = lines.iter().map(|l| text.width(l)).fold(0.0, f32::max);
    let box_h = LABEL_LINE_HEIGHT * lines.len() as f32 + LABEL_PAD;
    let box_y = pixmap.height() as f32 - LABEL_PAD - box_h;
    fill_box(pixmap, LABEL_PAD, box_y, text_w + LABEL_PAD * 2.0, box_h, background);
    for (i, line) in lines.iter().enumerate() {
        draw_text(
            pixmap,
            line,
            LABEL_PAD + LABEL_TEXT_INSET,
            box_y + LABEL_LINE_HEIGHT * (i + 1) as f32,
            Align::Left,
            Baseline::Alphabetic,
            &text,
            Transform::identity(),
        );
    }
}
