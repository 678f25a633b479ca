//! Planar bounding-box math and small numeric helpers.
//!
//! All boxes are axis-aligned in a planar CRS (UTM metres) unless stated
//! otherwise. Bounds are inclusive.

use crate::coord::Point;

/// Smallest tolerated segment direction component in the clip test.
const PARALLEL_EPSILON: f64 = 1e-10;

/// Axis-aligned bounding box `[minx, miny, maxx, maxy]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BBox {
    pub const fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    /// Bounding box of a point set, or `None` when empty.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            bbox.minx = bbox.minx.min(p.x);
            bbox.miny = bbox.miny.min(p.y);
            bbox.maxx = bbox.maxx.max(p.x);
            bbox.maxy = bbox.maxy.max(p.y);
        }
        Some(bbox)
    }

    /// Box of the given size centered on `(cx, cy)`.
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        let hw = width / 2.0;
        let hh = height / 2.0;
        Self::new(cx - hw, cy - hh, cx + hw, cy + hh)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    #[inline]
    pub fn center(&self) -> Point {
        Point::new(
            (self.minx + self.maxx) / 2.0,
            (self.miny + self.maxy) / 2.0,
        )
    }

    /// Inclusive containment test.
    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.minx && p.x <= self.maxx && p.y >= self.miny && p.y <= self.maxy
    }

    /// Box shrunk by `mx` on the left and right and `my` on top and bottom.
    pub fn shrink(&self, mx: f64, my: f64) -> Self {
        Self::new(self.minx + mx, self.miny + my, self.maxx - mx, self.maxy - my)
    }

    /// Box grown by `mx`/`my` on each side.
    pub fn expand(&self, mx: f64, my: f64) -> Self {
        self.shrink(-mx, -my)
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BBox) -> Self {
        Self::new(
            self.minx.min(other.minx),
            self.miny.min(other.miny),
            self.maxx.max(other.maxx),
            self.maxy.max(other.maxy),
        )
    }

    /// Corners in `[top-left, top-right, bottom-left, bottom-right]` order.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.minx, self.maxy),
            Point::new(self.maxx, self.maxy),
            Point::new(self.minx, self.miny),
            Point::new(self.maxx, self.miny),
        ]
    }

    /// Whether the segment `a -> b` touches the box (Liang-Barsky clip).
    pub fn intersects_segment(&self, a: Point, b: Point) -> bool {
        if self.contains(a) || self.contains(b) {
            return true;
        }
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let clips = [
            (-dx, a.x - self.minx),
            (dx, self.maxx - a.x),
            (-dy, a.y - self.miny),
            (dy, self.maxy - a.y),
        ];

        let mut t0 = 0.0_f64;
        let mut t1 = 1.0_f64;
        for (p, q) in clips {
            if p.abs() < PARALLEL_EPSILON {
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return false;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return false;
                }
                t1 = t1.min(r);
            }
        }
        t0 <= t1
    }
}

/// Clamps a page overlap fraction to `[0, 0.9]`. Non-finite values become 0.
pub fn clamp_overlap(overlap: f64) -> f64 {
    clamp_finite(overlap, 0.0, 0.9)
}

/// Clamps a page margin fraction to `[0, 0.45]`. Non-finite values become 0.
pub fn clamp_margin(margin: f64) -> f64 {
    clamp_finite(margin, 0.0, 0.45)
}

/// Clamps a lossy encoder quality to `[0.1, 1]`.
pub fn clamp_quality(quality: f64) -> f64 {
    if quality.is_finite() {
        quality.clamp(0.1, 1.0)
    } else {
        1.0
    }
}

fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}

/// Formats a scale denominator with "." thousands separators (`50000` -> `"50.000"`).
pub fn format_scale_label(scale: u32) -> String {
    let digits = scale.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// Formats a declination angle as `"3.4° E"` / `"1.2° W"`.
pub fn format_declination(degrees: f64) -> String {
    if !degrees.is_finite() {
        return "unknown".to_string();
    }
    let direction = if degrees >= 0.0 { "E" } else { "W" };
    format!("{:.1}° {}", degrees.abs(), direction)
}

/// Length of a planar polyline in metres.
pub fn track_length(points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BBox {
        BBox::new(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn test_from_points_empty_is_none() {
        assert!(BBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_from_points_covers_all() {
        let pts = [
            Point::new(3.0, -1.0),
            Point::new(-2.0, 4.0),
            Point::new(5.0, 2.0),
        ];
        assert_eq!(
            BBox::from_points(&pts).unwrap(),
            BBox::new(-2.0, -1.0, 5.0, 4.0)
        );
    }

    #[test]
    fn test_from_center_dimensions() {
        let b = BBox::from_center(100.0, 200.0, 40.0, 60.0);
        assert_eq!(b, BBox::new(80.0, 170.0, 120.0, 230.0));
        assert_eq!(b.center(), Point::new(100.0, 200.0));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let b = unit_box();
        assert!(b.contains(Point::new(0.0, 0.0)));
        assert!(b.contains(Point::new(10.0, 10.0)));
        assert!(!b.contains(Point::new(10.000_001, 5.0)));
    }

    #[test]
    fn test_shrink() {
        assert_eq!(unit_box().shrink(1.0, 2.0), BBox::new(1.0, 2.0, 9.0, 8.0));
    }

    #[test]
    fn test_segment_crossing_box() {
        let b = unit_box();
        assert!(b.intersects_segment(Point::new(-5.0, 5.0), Point::new(15.0, 5.0)));
        assert!(b.intersects_segment(Point::new(-5.0, -5.0), Point::new(15.0, 15.0)));
    }

    #[test]
    fn test_segment_missing_box() {
        let b = unit_box();
        assert!(!b.intersects_segment(Point::new(-5.0, 11.0), Point::new(15.0, 11.0)));
        assert!(!b.intersects_segment(Point::new(-5.0, 4.0), Point::new(4.0, -5.5)));
    }

    #[test]
    fn test_segment_parallel_outside() {
        let b = unit_box();
        assert!(!b.intersects_segment(Point::new(12.0, -5.0), Point::new(12.0, 15.0)));
    }

    #[test]
    fn test_segment_with_endpoint_inside() {
        let b = unit_box();
        assert!(b.intersects_segment(Point::new(5.0, 5.0), Point::new(50.0, 50.0)));
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_overlap(-0.1), 0.0);
        assert_eq!(clamp_overlap(0.95), 0.9);
        assert_eq!(clamp_overlap(f64::NAN), 0.0);
        assert_eq!(clamp_margin(0.5), 0.45);
        assert_eq!(clamp_quality(0.0), 0.1);
        assert_eq!(clamp_quality(2.0), 1.0);
    }

    #[test]
    fn test_format_scale_label() {
        assert_eq!(format_scale_label(25000), "25.000");
        assert_eq!(format_scale_label(100000), "100.000");
        assert_eq!(format_scale_label(1234567), "1.234.567");
        assert_eq!(format_scale_label(999), "999");
    }

    #[test]
    fn test_format_declination() {
        assert_eq!(format_declination(3.44), "3.4° E");
        assert_eq!(format_declination(-1.24), "1.2° W");
        assert_eq!(format_declination(f64::NAN), "unknown");
    }

    #[test]
    fn test_track_length() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(3.0, 10.0),
        ];
        assert_eq!(track_length(&pts), 11.0);
        assert_eq!(track_length(&pts[..1]), 0.0);
    }
}
