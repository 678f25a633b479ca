//! Three-point affine transform solver.

use super::types::{Point, ProjectionError};

/// Affine map `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
///
/// The coefficient layout matches a 2D canvas matrix, so
/// `tiny_skia::Transform::from_row(a, b, c, d, e, f)` applies the same map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Fits the affine map taking each `src[i]` onto `dst[i]`.
    ///
    /// Fails with [`ProjectionError::DegenerateAffine`] when the source
    /// points are collinear.
    pub fn from_points(src: [Point; 3], dst: [Point; 3]) -> Result<Self, ProjectionError> {
        let [s0, s1, s2] = src;
        let det = s0.x * (s1.y - s2.y) - s1.x * (s0.y - s2.y) + s2.x * (s0.y - s1.y);
        if det.abs() < f64::EPSILON || !det.is_finite() {
            return Err(ProjectionError::DegenerateAffine);
        }

        let solve = |d0: f64, d1: f64, d2: f64| -> (f64, f64, f64) {
            let m = (d0 * (s1.y - s2.y) - d1 * (s0.y - s2.y) + d2 * (s0.y - s1.y)) / det;
            let n = (d0 * (s2.x - s1.x) + d1 * (s0.x - s2.x) + d2 * (s1.x - s0.x)) / det;
            let t = (d0 * (s1.x * s2.y - s2.x * s1.y)
                + d1 * (s2.x * s0.y - s0.x * s2.y)
                + d2 * (s0.x * s1.y - s1.x * s0.y))
                / det;
            (m, n, t)
        };

        let (a, c, e) = solve(dst[0].x, dst[1].x, dst[2].x);
        let (b, d, f) = solve(dst[0].y, dst[1].y, dst[2].y);
        Ok(Self { a, b, c, d, e, f })
    }

    /// Applies the map to a point.
    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    /// Pure scale-and-translate map used for axis-aligned crops.
    pub fn scale_translate(sx: f64, sy: f64, tx: f64, ty: f64) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            e: tx,
            f: ty,
        }
    }
}
