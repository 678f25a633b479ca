//! Adaptive layout: minimum-page-count placement by dynamic programming.
//!
//! The track is densified, then a table indexed by start point is filled
//! from the last point backwards. Entry `i` holds the best continuation
//! from point `i`: fewest pages, then most covered distance, then least
//! total center penalty. Every candidate's continuation index is strictly
//! greater than its start, so each entry only reads entries already filled.

use tracing::{debug, warn};

use super::candidates::{densify, Candidate, CandidateSearch};
use super::greedy;
use super::paper::PageMetrics;
use super::page::PagePlacement;
use crate::coord::Point;

/// Densification step in metres.
pub const DENSIFY_STEP_M: f64 = 80.0;

/// Best continuation from one start index.
#[derive(Debug, Clone, Copy)]
struct Entry {
    candidate: Candidate,
    total_pages: usize,
    total_covered: f64,
    total_penalty: f64,
    /// Start index of the next page, `None` when this page ends the track
    next: Option<usize>,
}

impl Entry {
    /// Strictly better under (pages asc, covered desc, penalty asc).
    fn beats(&self, other: &Entry) -> bool {
        self.total_pages < other.total_pages
            || (self.total_pages == other.total_pages
                && (self.total_covered > other.total_covered
                    || (self.total_covered == other.total_covered
                        && self.total_penalty < other.total_penalty)))
    }
}

/// Computes the adaptive layout, falling back to greedy over the densified
/// track when the optimum leaves a densified point uncovered.
///
/// `shapes` are the page metrics to try (portrait first, then landscape).
pub fn compute(points: &[Point], shapes: Vec<PageMetrics>, inner_fraction: f64) -> Vec<PagePlacement> {
    if points.is_empty() || shapes.is_empty() {
        return Vec::new();
    }
    let dense = densify(points, DENSIFY_STEP_M);
    let search = CandidateSearch::new(&dense, shapes.clone(), inner_fraction);
    let placements = solve(&search);

    if let Some(index) = first_uncovered(&dense, &placements) {
        warn!(
            uncovered_index = index,
            "Adaptive layout left a point uncovered; using greedy layout"
        );
        return greedy::compute(&dense, shapes, inner_fraction);
    }

    debug!(
        pages = placements.len(),
        dense_points = dense.len(),
        "Adaptive layout complete"
    );
    placements
}

fn solve(search: &CandidateSearch<'_>) -> Vec<PagePlacement> {
    let max_index = search.max_index();
    let mut table: Vec<Option<Entry>> = vec![None; max_index + 1];

    for start in (0..=max_index).rev() {
        let mut best: Option<Entry> = None;
        for candidate in search.candidates(start) {
            let entry = if candidate.end_index >= max_index {
                Entry {
                    candidate,
                    total_pages: 1,
                    total_covered: candidate.covered_dist,
                    total_penalty: candidate.center_penalty,
                    next: None,
                }
            } else {
                let next = candidate.end_index.max(start + 1).min(max_index);
                let Some(rest) = table[next] else {
                    continue;
                };
                Entry {
                    candidate,
                    total_pages: 1 + rest.total_pages,
                    total_covered: candidate.covered_dist + rest.total_covered,
                    total_penalty: candidate.center_penalty + rest.total_penalty,
                    next: Some(next),
                }
            };
            if best.as_ref().map_or(true, |b| entry.beats(b)) {
                best = Some(entry);
            }
        }
        table[start] = best;
    }

    let mut placements = Vec::new();
    let mut cursor = Some(0);
    while let Some(index) = cursor {
        let Some(entry) = table[index] else {
            break;
        };
        placements.push(PagePlacement {
            bbox: entry.candidate.bbox,
            metrics: entry.candidate.metrics,
        });
        cursor = entry.next;
    }
    placements
}

/// Index of the first point not inside any page bbox.
pub(crate) fn first_uncovered(points: &[Point], placements: &[PagePlacement]) -> Option<usize> {
    points
        .iter()
        .position(|p| !placements.iter().any(|pl| pl.bbox.contains(*p)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::candidates::both_orientations;
    use crate::layout::paper::Paper;

    fn shapes() -> Vec<PageMetrics> {
        both_orientations(|o| PageMetrics::new(50_000, 300, Paper::A4, o))
    }

    #[test]
    fn test_single_point_gives_one_page() {
        let pages = compute(&[Point::new(500_000.0, 6_600_000.0)], shapes(), 0.15);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].bbox.contains(Point::new(500_000.0, 6_600_000.0)));
    }

    #[test]
    fn test_short_track_fits_one_page() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(3000.0, 1000.0)];
        let pages = compute(&pts, shapes(), 0.15);
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_long_east_west_track_page_count() {
        // 40 km due east at 1:50 000 A4. A landscape interior spans about
        // 12.6 km, so four pages are needed and four landscape pages suffice.
        let pts = vec![Point::new(0.0, 0.0), Point::new(40_000.0, 0.0)];
        let pages = compute(&pts, shapes(), 0.15);
        assert!((4..=5).contains(&pages.len()), "got {}", pages.len());
    }

    #[test]
    fn test_first_page_contains_start() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(0.0, 30_000.0)];
        let pages = compute(&pts, shapes(), 0.15);
        assert!(pages[0].bbox.contains(pts[0]));
        assert!(pages.last().unwrap().bbox.contains(pts[1]));
    }

    #[test]
    fn test_covers_every_dense_point() {
        let pts: Vec<Point> = (0..60)
            .map(|i| {
                let t = i as f64 / 10.0;
                Point::new(t * 4000.0, (t * 1.3).sin() * 9000.0)
            })
            .collect();
        let pages = compute(&pts, shapes(), 0.15);
        let dense = densify(&pts, DENSIFY_STEP_M);
        assert_eq!(first_uncovered(&dense, &pages), None);
    }

    #[test]
    fn test_deterministic() {
        let pts: Vec<Point> = (0..40)
            .map(|i| Point::new(i as f64 * 700.0, (i as f64 * 0.4).cos() * 5000.0))
            .collect();
        let a = compute(&pts, shapes(), 0.1);
        let b = compute(&pts, shapes(), 0.1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_never_more_pages_than_greedy() {
        let pts: Vec<Point> = (0..80)
            .map(|i| {
                let t = i as f64 / 8.0;
                Point::new(t.cos() * 12_000.0 + t * 2500.0, t.sin() * 12_000.0)
            })
            .collect();
        let dp = compute(&pts, shapes(), 0.15);
        let dense = densify(&pts, DENSIFY_STEP_M);
        let gr = greedy::compute(&dense, shapes(), 0.15);
        assert!(dp.len() <= gr.len(), "dp {} greedy {}", dp.len(), gr.len());
    }
}
