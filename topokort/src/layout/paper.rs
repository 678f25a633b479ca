//! Paper sizes, orientation and the ground span a printed page covers.

use std::fmt;
use std::str::FromStr;

use crate::coord::ProjectionError;

/// Supported scale denominators.
pub const ALLOWED_SCALES: [u32; 3] = [25_000, 50_000, 100_000];

/// Default print resolution.
pub const DEFAULT_DPI: u32 = 300;

const MM_PER_INCH: f64 = 25.4;
const METRES_PER_INCH: f64 = 0.0254;

/// ISO paper size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Paper {
    A5,
    #[default]
    A4,
    A3,
}

impl Paper {
    /// Portrait `(width, height)` in millimetres.
    pub const fn dimensions_mm(self) -> (f64, f64) {
        match self {
            Paper::A5 => (148.0, 210.0),
            Paper::A4 => (210.0, 297.0),
            Paper::A3 => (297.0, 420.0),
        }
    }

    /// `(width, height)` in millimetres for an orientation.
    pub fn size_mm(self, orientation: Orientation) -> (f64, f64) {
        let (w, h) = self.dimensions_mm();
        match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

impl fmt::Display for Paper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Paper::A5 => "A5",
            Paper::A4 => "A4",
            Paper::A3 => "A3",
        };
        f.write_str(name)
    }
}

impl FromStr for Paper {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A5" => Ok(Paper::A5),
            "A4" => Ok(Paper::A4),
            "A3" => Ok(Paper::A3),
            _ => Err(ProjectionError::UnknownPaper(s.to_string())),
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn toggled(self) -> Self {
        match self {
            Orientation::Portrait => Orientation::Landscape,
            Orientation::Landscape => Orientation::Portrait,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orientation requested by the user; `Auto` lets the layout choose per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrientationChoice {
    #[default]
    Auto,
    Fixed(Orientation),
}

impl fmt::Display for OrientationChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrientationChoice::Auto => f.write_str("auto"),
            OrientationChoice::Fixed(o) => fmt::Display::fmt(o, f),
        }
    }
}

impl FromStr for OrientationChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(OrientationChoice::Auto),
            "portrait" => Ok(OrientationChoice::Fixed(Orientation::Portrait)),
            "landscape" => Ok(OrientationChoice::Fixed(Orientation::Landscape)),
            other => Err(format!("unknown orientation '{other}'")),
        }
    }
}

/// Pixel and ground dimensions of one printed page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMetrics {
    pub orientation: Orientation,
    /// Raster width in pixels
    pub w_px: u32,
    /// Raster height in pixels
    pub h_px: u32,
    /// Ground width in metres
    pub w_m: f64,
    /// Ground height in metres
    pub h_m: f64,
    /// Paper width in millimetres
    pub width_mm: f64,
    /// Paper height in millimetres
    pub height_mm: f64,
}

impl PageMetrics {
    /// Computes the metrics for a paper/scale/dpi/orientation combination.
    pub fn new(scale: u32, dpi: u32, paper: Paper, orientation: Orientation) -> Self {
        let (width_mm, height_mm) = paper.size_mm(orientation);
        let w_px = mm_to_px(width_mm, dpi);
        let h_px = mm_to_px(height_mm, dpi);
        let res = ground_resolution(scale, dpi);
        Self {
            orientation,
            w_px,
            h_px,
            w_m: f64::from(w_px) * res,
            h_m: f64::from(h_px) * res,
            width_mm,
            height_mm,
        }
    }

    /// Page size in PostScript points.
    pub fn size_pt(&self) -> (f32, f32) {
        (
            (self.width_mm / MM_PER_INCH * 72.0) as f32,
            (self.height_mm / MM_PER_INCH * 72.0) as f32,
        )
    }
}

/// Ground metres per pixel at a scale and dpi.
#[inline]
pub fn ground_resolution(scale: u32, dpi: u32) -> f64 {
    f64::from(scale) * METRES_PER_INCH / f64::from(dpi.max(1))
}

#[inline]
fn mm_to_px(mm: f64, dpi: u32) -> u32 {
    (mm / MM_PER_INCH * f64::from(dpi)).round() as u32
}

/// Rejects scale denominators outside [`ALLOWED_SCALES`].
pub fn validate_scale(scale: u32) -> Result<u32, ProjectionError> {
    if ALLOWED_SCALES.contains(&scale) {
        Ok(scale)
    } else {
        Err(ProjectionError::UnsupportedScale(scale))
    }
}
