//! Fixed-grid layout.
//!
//! Covers the track's bbox with a rows×cols grid of equally oriented pages
//! stepping by `span·(1−overlap)`, nudges the grid toward the track, and
//! drops cells the track never enters.

use super::page::PagePlacement;
use super::paper::PageMetrics;
use crate::coord::Point;
use crate::geometry::BBox;

/// Result of the grid computation before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct PageGrid {
    /// Cells in row-major order, north row first
    pub cells: Vec<BBox>,
    pub rows: usize,
    pub cols: usize,
}

/// Cuts `bbox` into a centered grid of page-sized cells.
pub fn compute_page_grid(bbox: &BBox, page_w: f64, page_h: f64, overlap: f64) -> PageGrid {
    let overlap = crate::geometry::clamp_overlap(overlap);
    let step_x = page_w * (1.0 - overlap);
    let step_y = page_h * (1.0 - overlap);
    let cols = count_steps(bbox.width(), step_x);
    let rows = count_steps(bbox.height(), step_y);

    let total_w = page_w + (cols - 1) as f64 * step_x;
    let total_h = page_h + (rows - 1) as f64 * step_y;
    let center = bbox.center();
    let west = center.x - total_w / 2.0;
    let north = center.y + total_h / 2.0;

    let mut cells = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        let maxy = north - row as f64 * step_y;
        for col in 0..cols {
            let minx = west + col as f64 * step_x;
            cells.push(BBox::new(minx, maxy - page_h, minx + page_w, maxy));
        }
    }
    PageGrid { cells, rows, cols }
}

fn count_steps(extent: f64, step: f64) -> usize {
    let n = if step > 0.0 { (extent / step).ceil() } else { 1.0 };
    if n.is_finite() && n > 1.0 {
        n as usize
    } else {
        1
    }
}

/// Centers a page on the extent of the track points it contains. A page
/// containing no points is returned unchanged.
pub fn recenter_page(bbox: &BBox, points: &[Point], page_w: f64, page_h: f64) -> BBox {
    let inside: Vec<Point> = points.iter().copied().filter(|p| bbox.contains(*p)).collect();
    match BBox::from_points(&inside) {
        Some(extent) => {
            let c = extent.center();
            BBox::from_center(c.x, c.y, page_w, page_h)
        }
        None => *bbox,
    }
}

/// Shifts each row by the mean horizontal offset its cells want and each
/// column by the mean vertical offset, so the result stays a regular grid.
pub fn align_to_grid(
    original: &[BBox],
    desired: &[BBox],
    rows: usize,
    cols: usize,
    page_w: f64,
    page_h: f64,
) -> Vec<BBox> {
    if original.is_empty() || desired.is_empty() || rows == 0 || cols == 0 {
        return Vec::new();
    }
    let row_offsets: Vec<f64> = (0..rows)
        .map(|row| {
            (0..cols)
                .map(|col| desired[row * cols + col].minx - original[row * cols + col].minx)
                .sum::<f64>()
                / cols as f64
        })
        .collect();
    let col_offsets: Vec<f64> = (0..cols)
        .map(|col| {
            (0..rows)
                .map(|row| desired[row * cols + col].maxy - original[row * cols + col].maxy)
                .sum::<f64>()
                / rows as f64
        })
        .collect();

    let mut out = Vec::with_capacity(rows * cols);
    for (row, row_offset) in row_offsets.iter().enumerate() {
        for (col, col_offset) in col_offsets.iter().enumerate() {
            let base = original[row * cols + col];
            let minx = base.minx + row_offset;
            let maxy = base.maxy + col_offset;
            out.push(BBox::new(minx, maxy - page_h, minx + page_w, maxy));
        }
    }
    out
}

/// Computes the grid layout for a fixed page shape.
///
/// Returns the non-empty cells in row-major order, plus the grid dimensions
/// for status reporting. Every cell is kept when none contains a point.
pub fn compute(points: &[Point], metrics: PageMetrics, overlap: f64) -> (Vec<PagePlacement>, usize, usize) {
    let Some(extent) = BBox::from_points(points) else {
        return (Vec::new(), 0, 0);
    };
    let grid = compute_page_grid(&extent, metrics.w_m, metrics.h_m, overlap);
    let desired: Vec<BBox> = grid
        .cells
        .iter()
        .map(|cell| recenter_page(cell, points, metrics.w_m, metrics.h_m))
        .collect();
    let aligned = align_to_grid(&grid.cells, &desired, grid.rows, grid.cols, metrics.w_m, metrics.h_m);

    let covers_track = |bbox: &BBox| points.iter().any(|p| bbox.contains(*p));
    let keep_all = !aligned.iter().any(covers_track);
    let placements = aligned
        .into_iter()
        .filter(|bbox| keep_all || covers_track(bbox))
        .map(|bbox| PagePlacement { bbox, metrics })
        .collect();
    (placements, grid.rows, grid.cols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::paper::{Orientation, Paper};

    #[test]
    fn test_grid_steps_are_exact() {
        let bbox = BBox::new(0.0, 0.0, 25_000.0, 12_000.0);
        let grid = compute_page_grid(&bbox, 10_000.0, 14_000.0, 0.1);
        assert_eq!(grid.cols, 3);
        assert_eq!(grid.rows, 1);
        for pair in grid.cells.windows(2) {
            assert!((pair[1].minx - pair[0].minx - 9_000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_grid_covers_bbox() {
        let bbox = BBox::new(100.0, 200.0, 31_000.0, 44_000.0);
        let grid = compute_page_grid(&bbox, 10_000.0, 14_000.0, 0.05);
        let union = grid
            .cells
            .iter()
            .skip(1)
            .fold(grid.cells[0], |acc, c| acc.union(c));
        assert!(union.minx <= bbox.minx && union.maxx >= bbox.maxx);
        assert!(union.miny <= bbox.miny && union.maxy >= bbox.maxy);
        assert_eq!(grid.cells.len(), grid.rows * grid.cols);
    }

    #[test]
    fn test_degenerate_bbox_gives_single_cell() {
        let bbox = BBox::new(5.0, 5.0, 5.0, 5.0);
        let grid = compute_page_grid(&bbox, 1000.0, 2000.0, 0.0);
        assert_eq!((grid.rows, grid.cols), (1, 1));
        assert_eq!(grid.cells[0].center(), Point::new(5.0, 5.0));
    }

    #[test]
    fn test_recenter_without_points_is_unchanged() {
        let cell = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(recenter_page(&cell, &[Point::new(50.0, 50.0)], 10.0, 10.0), cell);
    }

    #[test]
    fn test_recenter_on_contained_points() {
        let cell = BBox::new(0.0, 0.0, 10.0, 10.0);
        let pts = [Point::new(1.0, 1.0), Point::new(3.0, 5.0)];
        let moved = recenter_page(&cell, &pts, 10.0, 10.0);
        assert_eq!(moved.center(), Point::new(2.0, 3.0));
    }

    #[test]
    fn test_align_keeps_row_steps() {
        let original = vec![
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BBox::new(9.0, 0.0, 19.0, 10.0),
        ];
        let desired = vec![
            BBox::new(2.0, 1.0, 12.0, 11.0),
            BBox::new(13.0, -1.0, 23.0, 9.0),
        ];
        let aligned = align_to_grid(&original, &desired, 1, 2, 10.0, 10.0);
        // Row offset is the mean of 2 and 4.
        assert_eq!(aligned[0].minx, 3.0);
        assert_eq!(aligned[1].minx - aligned[0].minx, 9.0);
        assert_eq!(aligned[0].maxy, 11.0);
        assert_eq!(aligned[1].maxy, 9.0);
    }

    #[test]
    fn test_compute_drops_empty_cells() {
        let metrics = PageMetrics::new(50_000, 300, Paper::A4, Orientation::Portrait);
        // An L-shaped track: east along the bottom, then north.
        let mut pts: Vec<Point> = (0..=30).map(|i| Point::new(i as f64 * 1000.0, 0.0)).collect();
        pts.extend((1..=40).map(|i| Point::new(30_000.0, i as f64 * 1000.0)));
        let (pages, rows, cols) = compute(&pts, metrics, 0.05);
        assert!(pages.len() < rows * cols);
        assert!(pages.iter().all(|p| pts.iter().any(|q| p.bbox.contains(*q))));
    }
}
