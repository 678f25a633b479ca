//! Candidate page generation shared by the adaptive and greedy layouts.
//!
//! From a start index the search looks ahead along the track, proposes up
//! to ten page centers, slides each one along the local travel direction,
//! and keeps the placements whose shrunk interior still contains the start
//! point.

use super::paper::PageMetrics;
#[cfg(test)]
use super::paper::Orientation;
use crate::coord::Point;
use crate::geometry::BBox;

/// Look-ahead window as a fraction of the page's longer ground side.
const WINDOW_FACTOR: f64 = 0.9;

/// Minimum look-ahead in points when the window covers none.
const MIN_WINDOW_POINTS: usize = 8;

/// Maximum number of candidate centers per start index.
const MAX_CENTERS: usize = 10;

/// Slide distance as a fraction of the page's longer ground side.
const SLIDE_RANGE_FACTOR: f64 = 0.2;

const SLIDE_STEPS: [f64; 7] = [-1.0, -0.66, -0.33, 0.0, 0.33, 0.66, 1.0];

/// Inserts intermediate points so no segment is longer than `max_step`.
pub fn densify(points: &[Point], max_step: f64) -> Vec<Point> {
    let Some(last) = points.last() else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(points.len());
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let dist = dx.hypot(dy);
        let steps = ((dist / max_step).ceil() as usize).max(1);
        for s in 0..steps {
            let t = s as f64 / steps as f64;
            out.push(Point::new(a.x + dx * t, a.y + dy * t));
        }
    }
    out.push(*last);
    out
}

/// Running distance along the polyline, starting at 0.
pub fn cumulative_distances(points: &[Point]) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            let prev = points[i - 1];
            total += (p.x - prev.x).hypot(p.y - prev.y);
        }
        out.push(total);
    }
    out
}

/// First index at least `window` metres past `start` (or the last index).
fn window_end_index(distances: &[f64], start: usize, window: f64) -> usize {
    let last = distances.len() - 1;
    let mut end = start;
    while end < last && distances[end] < distances[start] + window {
        end += 1;
    }
    if end == start {
        end = (start + MIN_WINDOW_POINTS).min(last);
    }
    end
}

/// Centroid of `points[start..=end]`.
fn mean_point(points: &[Point], start: usize, end: usize) -> Point {
    let slice = &points[start..=end];
    let n = slice.len() as f64;
    let (sx, sy) = slice
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

/// Evenly spaced indices in `start..=end`, always ending at `end`.
fn center_indices(start: usize, end: usize) -> Vec<usize> {
    let step = ((end - start) / MAX_CENTERS).max(1);
    let mut out: Vec<usize> = (start..=end).step_by(step).collect();
    if out.last() != Some(&end) {
        out.push(end);
    }
    out
}

fn unit_vector(dx: f64, dy: f64) -> (f64, f64) {
    let len = dx.hypot(dy);
    if len == 0.0 || !len.is_finite() {
        (1.0, 0.0)
    } else {
        (dx / len, dy / len)
    }
}

/// Last index of the unbroken run of points inside `bbox` starting at `start`.
fn last_index_inside(bbox: &BBox, points: &[Point], start: usize) -> usize {
    let mut last = start;
    for (i, p) in points.iter().enumerate().skip(start) {
        if !bbox.contains(*p) {
            break;
        }
        last = i;
    }
    last
}

/// One proposed page placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub bbox: BBox,
    pub metrics: PageMetrics,
    /// Last track index covered by the shrunk interior
    pub end_index: usize,
    /// Track distance covered from the start index to `end_index`
    pub covered_dist: f64,
    /// Normalized offset between page center and covered-segment centroid
    pub center_penalty: f64,
}

/// Candidate generator over one polyline.
pub struct CandidateSearch<'a> {
    points: &'a [Point],
    distances: Vec<f64>,
    shapes: Vec<PageMetrics>,
    inner_fraction: f64,
}

impl<'a> CandidateSearch<'a> {
    /// `shapes` lists the page metrics to try, in preference order.
    /// `inner_fraction` is `max(overlap, margin)`.
    pub fn new(points: &'a [Point], shapes: Vec<PageMetrics>, inner_fraction: f64) -> Self {
        Self {
            points,
            distances: cumulative_distances(points),
            shapes,
            inner_fraction,
        }
    }

    /// Index of the final track point.
    pub fn max_index(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// All candidates for a start index, shape by shape. Never empty when
    /// there is at least one shape.
    pub fn candidates(&self, start: usize) -> Vec<Candidate> {
        let mut out = Vec::new();
        for metrics in &self.shapes {
            self.push_candidates_for(start, metrics, &mut out);
        }
        out
    }

    fn push_candidates_for(&self, start: usize, metrics: &PageMetrics, out: &mut Vec<Candidate>) {
        let points = self.points;
        let longer = metrics.w_m.max(metrics.h_m);
        let center_end = window_end_index(&self.distances, start, longer * WINDOW_FACTOR);
        let (dir_x, dir_y) = unit_vector(
            points[center_end].x - points[start].x,
            points[center_end].y - points[start].y,
        );
        let slide_range = longer * SLIDE_RANGE_FACTOR;
        let margin_x = metrics.w_m * self.inner_fraction / 2.0;
        let margin_y = metrics.h_m * self.inner_fraction / 2.0;
        let before = out.len();

        for center_idx in center_indices(start, center_end) {
            let base = mean_point(points, start, center_idx);
            for step in SLIDE_STEPS {
                let cx = base.x + dir_x * slide_range * step;
                let cy = base.y + dir_y * slide_range * step;
                let bbox = BBox::from_center(cx, cy, metrics.w_m, metrics.h_m);
                let inner = bbox.shrink(margin_x, margin_y);
                if !inner.contains(points[start]) {
                    continue;
                }
                let end_index = last_index_inside(&inner, points, start);
                let centroid = mean_point(points, start, end_index);
                let off_x = (centroid.x - cx) / (metrics.w_m / 2.0);
                let off_y = (centroid.y - cy) / (metrics.h_m / 2.0);
                out.push(Candidate {
                    bbox,
                    metrics: *metrics,
                    end_index,
                    covered_dist: self.distances[end_index] - self.distances[start],
                    center_penalty: off_x.hypot(off_y),
                });
            }
        }

        if out.len() == before {
            // Nothing kept the start point inside: center on it instead.
            let p = points[start];
            let bbox = BBox::from_center(p.x, p.y, metrics.w_m, metrics.h_m);
            let inner = bbox.shrink(margin_x, margin_y);
            let end_index = last_index_inside(&inner, points, start);
            out.push(Candidate {
                bbox,
                metrics: *metrics,
                end_index,
                covered_dist: self.distances[end_index] - self.distances[start],
                center_penalty: 0.0,
            });
        }
    }
}

/// Portrait first, then landscape.
#[cfg(test)]
pub(crate) fn both_orientations(
    metrics: impl Fn(Orientation) -> PageMetrics,
) -> Vec<PageMetrics> {
    vec![
        metrics(Orientation::Portrait),
        metrics(Orientation::Landscape),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::paper::Paper;

    fn straight_line(n: usize, spacing: f64) -> Vec<Point> {
        (0..n)
            .map(|i| Point::new(i as f64 * spacing, 0.0))
            .collect()
    }

    #[test]
    fn test_densify_limits_step() {
        let pts = [Point::new(0.0, 0.0), Point::new(200.0, 0.0)];
        let dense = densify(&pts, 80.0);
        // ceil(200/80) = 3 steps plus the final point
        assert_eq!(dense.len(), 4);
        assert_eq!(dense[1], Point::new(200.0 / 3.0, 0.0));
        assert_eq!(dense.last(), Some(&Point::new(200.0, 0.0)));
    }

    #[test]
    fn test_densify_keeps_duplicate_points() {
        let pts = [Point::new(5.0, 5.0), Point::new(5.0, 5.0)];
        assert_eq!(densify(&pts, 80.0).len(), 2);
        assert!(densify(&[], 80.0).is_empty());
    }

    #[test]
    fn test_cumulative_distances() {
        let pts = straight_line(4, 10.0);
        assert_eq!(cumulative_distances(&pts), vec![0.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_window_end_index_min_points() {
        let d = vec![0.0, 1000.0, 2000.0];
        assert_eq!(window_end_index(&d, 0, 1500.0), 2);
        assert_eq!(window_end_index(&d, 2, 1500.0), 2);
        let d: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert_eq!(window_end_index(&d, 3, 0.0), 11);
    }

    #[test]
    fn test_center_indices_include_end() {
        assert_eq!(center_indices(0, 3), vec![0, 1, 2, 3]);
        let idx = center_indices(0, 25);
        assert_eq!(idx, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 22, 24, 25]);
        assert_eq!(center_indices(4, 4), vec![4]);
    }

    #[test]
    fn test_unit_vector_fallback() {
        assert_eq!(unit_vector(0.0, 0.0), (1.0, 0.0));
        let (x, y) = unit_vector(3.0, 4.0);
        assert!((x - 0.6).abs() < 1e-12 && (y - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_last_index_inside_stops_at_first_exit() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(2.0, 0.0),
        ];
        let bbox = BBox::new(-5.0, -5.0, 5.0, 5.0);
        assert_eq!(last_index_inside(&bbox, &pts, 0), 1);
        assert_eq!(last_index_inside(&bbox, &pts, 2), 2);
    }

    #[test]
    fn test_candidates_keep_start_inside() {
        let pts = densify(&straight_line(2, 30_000.0), 80.0);
        let shapes = both_orientations(|o| PageMetrics::new(50_000, 300, Paper::A4, o));
        let search = CandidateSearch::new(&pts, shapes, 0.15);
        let cands = search.candidates(0);
        assert!(!cands.is_empty());
        for c in &cands {
            let inner = c.bbox.shrink(
                c.metrics.w_m * 0.15 / 2.0,
                c.metrics.h_m * 0.15 / 2.0,
            );
            assert!(inner.contains(pts[0]) || c.center_penalty == 0.0);
        }
        // Portrait candidates come first.
        assert_eq!(cands[0].metrics.orientation, Orientation::Portrait);
        assert_eq!(
            cands.last().map(|c| c.metrics.orientation),
            Some(Orientation::Landscape)
        );
    }
}
