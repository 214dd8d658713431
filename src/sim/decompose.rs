//! Convex decomposition of simple polygons
//!
//! Narrow-phase overlap only works on convex shapes, so every terrain piece
//! and sprite silhouette is split once at creation time. The ring is
//! triangulated by ear clipping, then adjacent pieces are greedily merged
//! back together (Hertel-Mehlhorn) while the union stays convex and under
//! [`MAX_PARTITION_VERTICES`].
//!
//! The output is deterministic for a given input ring and always wound
//! counter-clockwise.

use glam::Vec2;

use super::geometry::{cross, is_convex, is_simple, signed_area};
use crate::error::{Result, SimError};

/// Upper bound on vertices per partition
pub const MAX_PARTITION_VERTICES: usize = 8;

/// Twice the triangle area, relative to its longest side squared, below which
/// three vertices count as collinear
const COLLINEAR_TOLERANCE: f32 = 1e-6;

/// Absolute squared distance below which two vertices are the same point
const DUPLICATE_DIST_SQ: f32 = 1e-10;

/// Split a simple polygon into convex partitions
///
/// Fails with [`SimError::TooFewVertices`] for rings under three vertices and
/// [`SimError::SelfIntersecting`] if any two non-adjacent edges touch. A ring
/// that collapses to zero area (all points collinear) yields no partitions.
pub fn decompose(ring: &[Vec2]) -> Result<Vec<Vec<Vec2>>> {
    if ring.len() < 3 {
        return Err(SimError::TooFewVertices { count: ring.len() });
    }

    let mut points = clean_ring(ring);
    if points.len() < 3 {
        log::debug!("polygon of {} vertices is degenerate, no partitions", ring.len());
        return Ok(Vec::new());
    }
    if !is_simple(&points) {
        return Err(SimError::SelfIntersecting);
    }
    if signed_area(&points) < 0.0 {
        points.reverse();
    }

    let triangles = ear_clip(&points);
    let pieces = merge_convex(triangles, &points);

    let partitions: Vec<Vec<Vec2>> = pieces
        .into_iter()
        .map(|piece| piece.into_iter().map(|i| points[i]).collect::<Vec<_>>())
        .map(|piece| strip_collinear(&piece))
        .filter(|piece| piece.len() >= 3)
        .collect();

    log::debug!(
        "decomposed {}-vertex polygon into {} partitions",
        ring.len(),
        partitions.len()
    );
    Ok(partitions)
}

fn is_collinear(a: Vec2, b: Vec2, c: Vec2) -> bool {
    let longest = a
        .distance_squared(b)
        .max(b.distance_squared(c))
        .max(c.distance_squared(a));
    cross(a, b, c).abs() <= COLLINEAR_TOLERANCE * longest
}

/// Drop repeated points, then vertices lying on the line through their neighbours
fn clean_ring(ring: &[Vec2]) -> Vec<Vec2> {
    let mut points: Vec<Vec2> = Vec::with_capacity(ring.len());
    for &p in ring {
        if points
            .last()
            .is_none_or(|last| last.distance_squared(p) > DUPLICATE_DIST_SQ)
        {
            points.push(p);
        }
    }
    while points.len() > 1
        && points[0].distance_squared(points[points.len() - 1]) <= DUPLICATE_DIST_SQ
    {
        points.pop();
    }
    strip_collinear(&points)
}

fn strip_collinear(ring: &[Vec2]) -> Vec<Vec2> {
    let mut points = ring.to_vec();
    loop {
        let n = points.len();
        if n < 3 {
            return points;
        }
        let flat = (0..n).find(|&i| {
            is_collinear(points[(i + n - 1) % n], points[i], points[(i + 1) % n])
        });
        match flat {
            Some(i) => {
                points.remove(i);
            }
            None => return points,
        }
    }
}

/// Triangulate a counter-clockwise simple ring into index triples
fn ear_clip(points: &[Vec2]) -> Vec<Vec<usize>> {
    let mut remaining: Vec<usize> = (0..points.len()).collect();
    let mut triangles = Vec::with_capacity(points.len().saturating_sub(2));

    while remaining.len() > 3 {
        let m = remaining.len();
        let ear = (0..m).find(|&i| is_ear(points, &remaining, i)).or_else(|| {
            // Numerical dead end: clip the most convex corner instead
            (0..m)
                .map(|i| (i, corner_turn(points, &remaining, i)))
                .filter(|&(_, turn)| turn > 0.0)
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i)
        });
        let Some(i) = ear else {
            log::warn!("ear clipping stalled with {} vertices left", m);
            return triangles;
        };

        let prev = remaining[(i + m - 1) % m];
        let next = remaining[(i + 1) % m];
        if !is_collinear(points[prev], points[remaining[i]], points[next]) {
            triangles.push(vec![prev, remaining[i], next]);
        }
        remaining.remove(i);
    }

    if let [a, b, c] = remaining[..] {
        if !is_collinear(points[a], points[b], points[c]) && cross(points[a], points[b], points[c]) > 0.0
        {
            triangles.push(vec![a, b, c]);
        }
    }
    triangles
}

fn corner_turn(points: &[Vec2], remaining: &[usize], i: usize) -> f32 {
    let m = remaining.len();
    cross(
        points[remaining[(i + m - 1) % m]],
        points[remaining[i]],
        points[remaining[(i + 1) % m]],
    )
}

fn is_ear(points: &[Vec2], remaining: &[usize], i: usize) -> bool {
    let m = remaining.len();
    let ia = remaining[(i + m - 1) % m];
    let ib = remaining[i];
    let ic = remaining[(i + 1) % m];
    let (a, b, c) = (points[ia], points[ib], points[ic]);

    if cross(a, b, c) <= 0.0 || is_collinear(a, b, c) {
        return false;
    }

    remaining
        .iter()
        .filter(|&&j| j != ia && j != ib && j != ic)
        .all(|&j| !in_triangle(points[j], a, b, c))
}

/// Inclusive point-in-triangle for a counter-clockwise triangle
fn in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

/// Greedily merge pieces across shared diagonals while the result stays convex
fn merge_convex(mut pieces: Vec<Vec<usize>>, points: &[Vec2]) -> Vec<Vec<usize>> {
    loop {
        let mut merged = None;
        'search: for i in 0..pieces.len() {
            for j in (i + 1)..pieces.len() {
                if let Some(piece) = try_merge(&pieces[i], &pieces[j], points) {
                    merged = Some((i, j, piece));
                    break 'search;
                }
            }
        }
        match merged {
            Some((i, j, piece)) => {
                pieces[i] = piece;
                pieces.remove(j);
            }
            None => return pieces,
        }
    }
}

fn try_merge(a: &[usize], b: &[usize], points: &[Vec2]) -> Option<Vec<usize>> {
    if a.len() + b.len() - 2 > MAX_PARTITION_VERTICES {
        return None;
    }

    // Shared edge u->v in `a` appears as v->u in `b`
    let (k, l) = (0..a.len()).find_map(|k| {
        let u = a[k];
        let v = a[(k + 1) % a.len()];
        (0..b.len())
            .find(|&l| b[l] == v && b[(l + 1) % b.len()] == u)
            .map(|l| (k, l))
    })?;

    // `a` from v around to u, then `b`'s vertices strictly between u and v
    let mut piece: Vec<usize> = (1..=a.len()).map(|s| a[(k + s) % a.len()]).collect();
    piece.extend((2..b.len()).map(|s| b[(l + s) % b.len()]));

    let ring: Vec<Vec2> = piece.iter().map(|&i| points[i]).collect();
    is_convex(&ring).then_some(piece)
}
