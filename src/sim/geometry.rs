//! Plane geometry helpers
//!
//! Polygons are plain vertex rings (`&[Vec2]`), implicitly closed. Nothing in
//! here holds state; terrain generation, decomposition and collision all build
//! on these functions.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tolerance for orientation and degeneracy tests
pub const EPSILON: f32 = 1e-6;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Bounds from a bottom-left corner and a size
    pub fn from_corner(corner: Vec2, size: Vec2) -> Self {
        Self {
            min: corner,
            max: corner + size,
        }
    }

    /// Tightest box around a set of points (zero box for an empty set)
    pub fn from_points(points: &[Vec2]) -> Self {
        let Some(&first) = points.first() else {
            return Self::new(Vec2::ZERO, Vec2::ZERO);
        };
        points.iter().fold(Self::new(first, first), |b, &p| Self {
            min: b.min.min(p),
            max: b.max.max(p),
        })
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn left(&self) -> f32 {
        self.min.x
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.max.x
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.min.y
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.max.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Strict overlap; boxes that only touch do not overlap
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    pub fn translated(&self, offset: Vec2) -> Self {
        Self::new(self.min + offset, self.max + offset)
    }
}

/// Inclusive `[min, max]` interval used to parameterise randomness
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub min: f32,
    pub max: f32,
}

impl FloatRange {
    /// Build a range; the bounds are swapped if given out of order
    pub fn new(a: f32, b: f32) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    /// Both bounds multiplied by `factor`
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.min * factor, self.max * factor)
    }

    /// Uniform sample within the range
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.max - self.min <= f32::EPSILON {
            return self.min;
        }
        rng.random_range(self.min..=self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    /// Bound-wise linear interpolation between two ranges
    pub fn lerp(from: &FloatRange, to: &FloatRange, t: f32) -> Self {
        Self::new(lerp(from.min, to.min, t), lerp(from.max, to.max, t))
    }

    /// Intersection, or `None` if the ranges are disjoint
    pub fn intersect(&self, other: &FloatRange) -> Option<Self> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(Self { min, max })
    }
}

/// A directed segment used while walking cliff edges
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub start: Vec2,
    pub end: Vec2,
}

impl Edge {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    /// Direction angle in degrees, counter-clockwise from +X (90 = straight up)
    pub fn angle_deg(&self) -> f32 {
        let d = self.end - self.start;
        d.y.atan2(d.x).to_degrees()
    }

    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Consecutive vertex pairs of an open chain as edges
pub fn chain_edges(chain: &[Vec2]) -> Vec<Edge> {
    chain.windows(2).map(|w| Edge::new(w[0], w[1])).collect()
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Z component of `(a - o) x (b - o)`; positive for a left turn
#[inline]
pub fn cross(o: Vec2, a: Vec2, b: Vec2) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Inclusive betweenness that accepts the bounds in either order
#[inline]
pub fn is_between(value: f32, a: f32, b: f32) -> bool {
    value >= a.min(b) && value <= a.max(b)
}

/// Shoelace area, positive for counter-clockwise rings
pub fn signed_area(ring: &[Vec2]) -> f32 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum * 0.5
}

pub fn area(ring: &[Vec2]) -> f32 {
    signed_area(ring).abs()
}

/// Area centroid; falls back to the vertex average for degenerate rings
pub fn centroid(ring: &[Vec2]) -> Vec2 {
    let a = signed_area(ring);
    if a.abs() <= EPSILON {
        if ring.is_empty() {
            return Vec2::ZERO;
        }
        return ring.iter().copied().sum::<Vec2>() / ring.len() as f32;
    }
    let mut c = Vec2::ZERO;
    for i in 0..ring.len() {
        let p = ring[i];
        let q = ring[(i + 1) % ring.len()];
        let f = p.x * q.y - q.x * p.y;
        c += (p + q) * f;
    }
    c / (6.0 * a)
}

pub fn min_x(points: &[Vec2]) -> f32 {
    points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min)
}

pub fn max_x(points: &[Vec2]) -> f32 {
    points.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max)
}

/// X of the line through `a` and `b` at height `y`
pub fn line_x_at(a: Vec2, b: Vec2, y: f32) -> f32 {
    let dy = b.y - a.y;
    if dy.abs() <= EPSILON {
        return a.x;
    }
    a.x + (b.x - a.x) * (y - a.y) / dy
}

/// X of an open vertex chain at height `y`, from the first segment straddling it
pub fn chain_x_at(chain: &[Vec2], y: f32) -> Option<f32> {
    chain
        .windows(2)
        .find(|w| is_between(y, w[0].y, w[1].y))
        .map(|w| line_x_at(w[0], w[1], y))
}

/// Whether closed segments `p1p2` and `q1q2` share any point
pub fn segments_intersect(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);

    if ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
    {
        return true;
    }

    let on_segment = |a: Vec2, b: Vec2, p: Vec2| {
        is_between(p.x, a.x, b.x) && is_between(p.y, a.y, b.y)
    };
    (d1.abs() <= EPSILON && on_segment(q1, q2, p1))
        || (d2.abs() <= EPSILON && on_segment(q1, q2, p2))
        || (d3.abs() <= EPSILON && on_segment(p1, p2, q1))
        || (d4.abs() <= EPSILON && on_segment(p1, p2, q2))
}

/// True if no two non-adjacent edges of the ring touch
pub fn is_simple(ring: &[Vec2]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        let a1 = ring[i];
        let a2 = ring[(i + 1) % n];
        for j in (i + 1)..n {
            // Adjacent edges share a vertex by construction
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let b1 = ring[j];
            let b2 = ring[(j + 1) % n];
            if segments_intersect(a1, a2, b1, b2) {
                return false;
            }
        }
    }
    true
}

/// Convexity check that tolerates collinear vertices, for either winding
pub fn is_convex(ring: &[Vec2]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let winding = signed_area(ring).signum();
    (0..n).all(|i| {
        let turn = cross(ring[i], ring[(i + 1) % n], ring[(i + 2) % n]);
        turn * winding >= -EPSILON
    })
}

/// Apply scale, then rotation (radians), then translation
#[inline]
pub fn transform_point(p: Vec2, position: Vec2, rotation: f32, scale: Vec2) -> Vec2 {
    position + Vec2::from_angle(rotation).rotate(p * scale)
}

pub fn transform_vertices(
    vertices: &[Vec2],
    position: Vec2,
    rotation: f32,
    scale: Vec2,
) -> Vec<Vec2> {
    vertices
        .iter()
        .map(|&v| transform_point(v, position, rotation, scale))
        .collect()
}

/// Counter-clockwise rectangle with its bottom-left corner at the origin
pub fn rect_vertices(width: f32, height: f32) -> Vec<Vec2> {
    vec![
        Vec2::new(0.0, 0.0),
        Vec2::new(width, 0.0),
        Vec2::new(width, height),
        Vec2::new(0.0, height),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_signed_area_orientation() {
        let ccw = rect_vertices(2.0, 3.0);
        assert!((signed_area(&ccw) - 6.0).abs() < 1e-5);
        let cw: Vec<Vec2> = ccw.iter().rev().copied().collect();
        assert!((signed_area(&cw) + 6.0).abs() < 1e-5);
        assert!((area(&cw) - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_centroid_of_rectangle() {
        let c = centroid(&rect_vertices(4.0, 2.0));
        assert!((c - Vec2::new(2.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn test_float_range_random_within_bounds() {
        let mut rng = Pcg32::seed_from_u64(7);
        let range = FloatRange::new(5.0, 2.0);
        assert_eq!(range.min, 2.0);
        for _ in 0..500 {
            assert!(range.contains(range.random(&mut rng)));
        }
        let point = FloatRange::new(3.0, 3.0);
        assert_eq!(point.random(&mut rng), 3.0);
    }

    #[test]
    fn test_float_range_lerp_and_intersect() {
        let a = FloatRange::new(5.0, 6.0);
        let b = FloatRange::new(2.0, 3.0);
        let mid = FloatRange::lerp(&a, &b, 0.5);
        assert!((mid.min - 3.5).abs() < 1e-6 && (mid.max - 4.5).abs() < 1e-6);
        assert!(a.intersect(&b).is_none());
        let i = a.intersect(&FloatRange::new(5.5, 9.0)).unwrap();
        assert_eq!((i.min, i.max), (5.5, 6.0));
    }

    #[test]
    fn test_edge_angle() {
        let up = Edge::new(Vec2::ZERO, Vec2::new(0.0, 2.0));
        assert!((up.angle_deg() - 90.0).abs() < 1e-4);
        let diag = Edge::new(Vec2::ZERO, Vec2::new(-1.0, 1.0));
        assert!((diag.angle_deg() - 135.0).abs() < 1e-4);
        assert!((diag.length() - 2f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_chain_x_at() {
        let chain = [Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0), Vec2::new(2.0, 4.0)];
        assert!((chain_x_at(&chain, 1.0).unwrap() - 1.0).abs() < 1e-6);
        assert!((chain_x_at(&chain, 3.0).unwrap() - 2.0).abs() < 1e-6);
        assert!(chain_x_at(&chain, 5.0).is_none());
    }

    #[test]
    fn test_is_simple_detects_bowtie() {
        let bowtie = [
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(0.0, 2.0),
        ];
        assert!(!is_simple(&bowtie));
        assert!(is_simple(&rect_vertices(1.0, 1.0)));
    }

    #[test]
    fn test_is_convex() {
        assert!(is_convex(&rect_vertices(1.0, 1.0)));
        let notch = [
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.5),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
        ];
        assert!(!is_convex(&notch));
    }

    #[test]
    fn test_transform_point_order() {
        // Scale, then rotate a quarter turn, then translate
        let p = transform_point(
            Vec2::new(1.0, 0.0),
            Vec2::new(10.0, 0.0),
            std::f32::consts::FRAC_PI_2,
            Vec2::splat(2.0),
        );
        assert!((p - Vec2::new(10.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn test_bounds_overlap_is_strict() {
        let a = Bounds::from_corner(Vec2::ZERO, Vec2::ONE);
        let touching = Bounds::from_corner(Vec2::new(1.0, 0.0), Vec2::ONE);
        let inside = Bounds::from_corner(Vec2::splat(0.5), Vec2::ONE);
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&inside));
    }
}
