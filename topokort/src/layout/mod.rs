//! Page layout engine
//!
//! Decides how many pages a track needs and where they go. Three strategies
//! are available:
//!
//! - **Adaptive** - dynamic programming over candidate placements along the
//!   densified track (fewest pages, then best coverage and centering)
//! - **Greedy** - the same candidates without lookahead; also the adaptive
//!   fallback
//! - **Grid** - a regular rows×cols grid over the track's bbox
//!
//! # Example
//!
//! ```ignore
//! use topokort::layout::{compute_layout, LayoutOptions};
//!
//! let layout = compute_layout(&projected_points, &LayoutOptions::default())?;
//! println!("{}", layout.status);
//! ```

mod adaptive;
mod candidates;
mod grid;
mod greedy;
mod page;
mod paper;

pub use adaptive::DENSIFY_STEP_M;
pub use candidates::{cumulative_distances, densify};
pub use grid::{align_to_grid, compute_page_grid, recenter_page, PageGrid};
pub use page::{Page, PageFormat, PageId, PagePlacement, PageSet};
pub use paper::{
    ground_resolution, validate_scale, Orientation, OrientationChoice, PageMetrics, Paper,
    ALLOWED_SCALES, DEFAULT_DPI,
};

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::coord::{Point, ProjectionError};
use crate::geometry::{clamp_margin, clamp_overlap, format_scale_label};

/// Default page overlap fraction.
pub const DEFAULT_OVERLAP: f64 = 0.05;

/// Default page margin fraction.
pub const DEFAULT_MARGIN: f64 = 0.15;

/// Layout strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutMode {
    Adaptive,
    Greedy,
    Grid,
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayoutMode::Adaptive => "adaptive",
            LayoutMode::Greedy => "greedy",
            LayoutMode::Grid => "grid",
        };
        f.write_str(s)
    }
}

impl FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adaptive" | "auto" => Ok(LayoutMode::Adaptive),
            "greedy" => Ok(LayoutMode::Greedy),
            "grid" => Ok(LayoutMode::Grid),
            other => Err(format!("unknown layout mode '{other}'")),
        }
    }
}

/// Options controlling page size and placement.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub paper: Paper,
    pub scale: u32,
    pub dpi: u32,
    pub orientation: OrientationChoice,
    /// Fraction of a page shared with its neighbour, clamped to [0, 0.9]
    pub overlap: f64,
    /// Fraction of a page kept clear of the track edge, clamped to [0, 0.45]
    pub margin: f64,
    /// Explicit strategy; `None` picks adaptive for `auto` orientation and
    /// greedy for a fixed orientation.
    pub mode: Option<LayoutMode>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            paper: Paper::A4,
            scale: 50_000,
            dpi: DEFAULT_DPI,
            orientation: OrientationChoice::Auto,
            overlap: DEFAULT_OVERLAP,
            margin: DEFAULT_MARGIN,
            mode: None,
        }
    }
}

impl LayoutOptions {
    pub fn format(&self) -> PageFormat {
        PageFormat {
            paper: self.paper,
            scale: self.scale,
            dpi: self.dpi,
        }
    }

    /// Strategy that will actually run.
    pub fn resolved_mode(&self) -> LayoutMode {
        self.mode.unwrap_or(match self.orientation {
            OrientationChoice::Auto => LayoutMode::Adaptive,
            OrientationChoice::Fixed(_) => LayoutMode::Greedy,
        })
    }

    fn shapes(&self) -> Vec<PageMetrics> {
        let format = self.format();
        match self.orientation {
            OrientationChoice::Auto => vec![
                format.metrics(Orientation::Portrait),
                format.metrics(Orientation::Landscape),
            ],
            OrientationChoice::Fixed(o) => vec![format.metrics(o)],
        }
    }
}

/// A computed layout.
#[derive(Debug, Clone)]
pub struct Layout {
    pub pages: PageSet,
    pub mode: LayoutMode,
    /// Grid dimensions when the grid strategy ran
    pub grid: Option<(usize, usize)>,
    /// One-line human readable summary
    pub status: String,
}

/// Computes the page layout for a projected track.
pub fn compute_layout(points: &[Point], options: &LayoutOptions) -> Result<Layout, ProjectionError> {
    if points.is_empty() {
        return Err(ProjectionError::EmptyPointSet);
    }
    validate_scale(options.scale)?;
    let overlap = clamp_overlap(options.overlap);
    let margin = clamp_margin(options.margin);
    let inner_fraction = overlap.max(margin);
    let mode = options.resolved_mode();

    let (placements, grid) = match mode {
        LayoutMode::Adaptive => (adaptive::compute(points, options.shapes(), inner_fraction), None),
        LayoutMode::Greedy => (greedy::compute(points, options.shapes(), inner_fraction), None),
        LayoutMode::Grid => {
            let orientation = match options.orientation {
                OrientationChoice::Fixed(o) => o,
                OrientationChoice::Auto => Orientation::Portrait,
            };
            let (placements, rows, cols) =
                grid::compute(points, options.format().metrics(orientation), overlap);
            (placements, Some((rows, cols)))
        }
    };

    let mut pages = PageSet::from_placements(options.format(), placements);
    if mode == LayoutMode::Grid {
        // Grid cells come row by row; print them in the order the track visits them.
        pages.reorder_by_track(points);
    }
    let status = status_line(pages.len(), options, overlap, margin, mode, grid);
    info!(pages = pages.len(), mode = %mode, "{}", status);

    Ok(Layout {
        pages,
        mode,
        grid,
        status,
    })
}

fn status_line(
    count: usize,
    options: &LayoutOptions,
    overlap: f64,
    margin: f64,
    mode: LayoutMode,
    grid: Option<(usize, usize)>,
) -> String {
    let head = match grid {
        Some((rows, cols)) => format!("Pages: {count} ({rows} rows x {cols} cols)"),
        None => format!("Pages: {count}"),
    };
    let tail = match mode {
        LayoutMode::Adaptive => options.orientation.to_string(),
        LayoutMode::Greedy => format!("{} greedy", options.orientation),
        LayoutMode::Grid => "grid".to_string(),
    };
    format!(
        "{head} | {} | 1:{} | overlap {:.1}% | margin {:.0}% | {tail}",
        options.paper,
        format_scale_label(options.scale),
        overlap * 100.0,
        margin * 100.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Vec<Point> {
        (0..50)
            .map(|i| {
                let t = i as f64;
                Point::new(400_000.0 + t * 600.0, 6_700_000.0 + (t / 6.0).sin() * 4000.0)
            })
            .collect()
    }

    #[test]
    fn test_empty_track_is_projection_error() {
        let result = compute_layout(&[], &LayoutOptions::default());
        assert!(matches!(result, Err(ProjectionError::EmptyPointSet)));
    }

    #[test]
    fn test_unsupported_scale_is_rejected() {
        let options = LayoutOptions {
            scale: 10_000,
            ..Default::default()
        };
        assert!(matches!(
            compute_layout(&track(), &options),
            Err(ProjectionError::UnsupportedScale(10_000))
        ));
    }

    #[test]
    fn test_auto_uses_adaptive() {
        let layout = compute_layout(&track(), &LayoutOptions::default()).unwrap();
        assert_eq!(layout.mode, LayoutMode::Adaptive);
        assert!(layout.status.starts_with(&format!("Pages: {}", layout.pages.len())));
        assert!(layout.status.contains("| A4 | 1:50.000 | overlap 5.0% | margin 15% | auto"));
    }

    #[test]
    fn test_fixed_orientation_uses_greedy_with_one_shape() {
        let options = LayoutOptions {
            orientation: OrientationChoice::Fixed(Orientation::Landscape),
            ..Default::default()
        };
        let layout = compute_layout(&track(), &options).unwrap();
        assert_eq!(layout.mode, LayoutMode::Greedy);
        assert!(layout
            .pages
            .pages()
            .iter()
            .all(|p| p.orientation() == Orientation::Landscape));
    }

    #[test]
    fn test_grid_mode_reports_dimensions() {
        let options = LayoutOptions {
            mode: Some(LayoutMode::Grid),
            ..Default::default()
        };
        let layout = compute_layout(&track(), &options).unwrap();
        let (rows, cols) = layout.grid.unwrap();
        assert!(layout.pages.len() <= rows * cols);
        assert!(layout.status.contains("rows x"));
    }

    #[test]
    fn test_grid_mode_orders_pages_by_track() {
        // Runs east along the top row, then back west along the bottom row.
        let mut pts: Vec<Point> = (0..=30).map(|i| Point::new(i as f64 * 1000.0, 20_000.0)).collect();
        pts.extend((0..=30).rev().map(|i| Point::new(i as f64 * 1000.0, 0.0)));
        let options = LayoutOptions {
            mode: Some(LayoutMode::Grid),
            ..Default::default()
        };
        let layout = compute_layout(&pts, &options).unwrap();
        let firsts: Vec<usize> = layout
            .pages
            .pages()
            .iter()
            .map(|p| p.first_track_index(&pts).unwrap())
            .collect();
        assert!(firsts.windows(2).all(|w| w[0] <= w[1]), "{firsts:?}");
        // The bottom row is visited east to west, against cell order.
        let last = layout.pages.pages().last().unwrap();
        assert!(last.bbox.minx < 10_000.0);
    }

    #[test]
    fn test_page_ids_follow_order() {
        let layout = compute_layout(&track(), &LayoutOptions::default()).unwrap();
        for (i, page) in layout.pages.pages().iter().enumerate() {
            assert_eq!(page.id, PageId(i as u64 + 1));
        }
    }

    #[test]
    fn test_union_of_pages_contains_track_bbox() {
        let pts = track();
        for mode in [LayoutMode::Adaptive, LayoutMode::Greedy, LayoutMode::Grid] {
            let options = LayoutOptions {
                mode: Some(mode),
                ..Default::default()
            };
            let layout = compute_layout(&pts, &options).unwrap();
            let pages = layout.pages.pages();
            let union = pages
                .iter()
                .skip(1)
                .fold(pages[0].bbox, |acc, p| acc.union(&p.bbox));
            let extent = crate::geometry::BBox::from_points(&pts).unwrap();
            assert!(union.minx <= extent.minx && union.maxx >= extent.maxx, "{mode}");
            assert!(union.miny <= extent.miny && union.maxy >= extent.maxy, "{mode}");
        }
    }
}
