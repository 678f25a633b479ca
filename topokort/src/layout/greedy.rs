//! Greedy layout: at each step take the page that reaches furthest along
//! the track. No lookahead, always terminates, always covers every point.

use tracing::debug;

use super::candidates::{Candidate, CandidateSearch};
use super::page::PagePlacement;
use super::paper::PageMetrics;
use crate::coord::Point;

/// Strictly better under (end index desc, covered desc, penalty asc).
fn beats(a: &Candidate, b: &Candidate) -> bool {
    a.end_index > b.end_index
        || (a.end_index == b.end_index
            && (a.covered_dist > b.covered_dist
                || (a.covered_dist == b.covered_dist && a.center_penalty < b.center_penalty)))
}

/// Computes the greedy layout over `points` using the given page shapes.
pub fn compute(points: &[Point], shapes: Vec<PageMetrics>, inner_fraction: f64) -> Vec<PagePlacement> {
    if points.is_empty() || shapes.is_empty() {
        return Vec::new();
    }
    let search = CandidateSearch::new(points, shapes, inner_fraction);
    let max_index = search.max_index();
    let mut placements = Vec::new();
    let mut start = 0;

    loop {
        let mut candidates = search.candidates(start).into_iter();
        let Some(mut best) = candidates.next() else {
            break;
        };
        for candidate in candidates {
            if beats(&candidate, &best) {
                best = candidate;
            }
        }
        placements.push(PagePlacement {
            bbox: best.bbox,
            metrics: best.metrics,
        });
        if best.end_index >= max_index {
            break;
        }
        let next = if best.end_index > start {
            best.end_index
        } else {
            start + 1
        };
        start = next.min(max_index);
    }

    debug!(pages = placements.len(), "Greedy layout complete");
    placements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::candidates::both_orientations;
    use crate::layout::paper::{Orientation, Paper};

    #[test]
    fn test_covers_every_input_point() {
        let pts: Vec<Point> = (0..200)
            .map(|i| {
                let t = i as f64 / 20.0;
                Point::new(t * 3000.0, (t * 2.0).sin() * 6000.0)
            })
            .collect();
        let shapes = both_orientations(|o| PageMetrics::new(25_000, 300, Paper::A4, o));
        let pages = compute(&pts, shapes, 0.15);
        assert!(!pages.is_empty());
        for p in &pts {
            assert!(pages.iter().any(|pg| pg.bbox.contains(*p)));
        }
    }

    #[test]
    fn test_sparse_points_still_terminate() {
        // Points much further apart than a page: every page covers only its
        // start point, so the layout advances one index at a time.
        let pts: Vec<Point> = (0..5).map(|i| Point::new(i as f64 * 100_000.0, 0.0)).collect();
        let shapes = vec![PageMetrics::new(50_000, 300, Paper::A4, Orientation::Portrait)];
        let pages = compute(&pts, shapes, 0.15);
        assert_eq!(pages.len(), 5);
        assert!(pages
            .iter()
            .all(|p| p.metrics.orientation == Orientation::Portrait));
    }

    #[test]
    fn test_fixed_orientation_is_respected() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(0.0, 25_000.0)];
        let shapes = vec![PageMetrics::new(50_000, 300, Paper::A5, Orientation::Landscape)];
        let pages = compute(&pts, shapes, 0.1);
        assert!(pages
            .iter()
            .all(|p| p.metrics.orientation == Orientation::Landscape));
    }
}
