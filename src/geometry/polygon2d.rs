// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Planar polygon predicates and triangulation in local coordinates

use nalgebra::Point2;

/// Where a point lies relative to a closed polygon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLocation {
    Inside,
    On,
    Outside,
}

/// Twice the signed area of triangle (o, a, b); positive when counter-clockwise.
#[inline]
pub fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Signed area of a closed loop; positive when counter-clockwise.
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    0.5 * sum
}

pub fn distance_to_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Classify a point against a loop, treating anything within `tol` of an
/// edge as on the boundary.
pub fn classify_point(p: &Point2<f64>, polygon: &[Point2<f64>], tol: f64) -> PointLocation {
    let n = polygon.len();
    if n < 3 {
        return PointLocation::Outside;
    }
    for i in 0..n {
        if distance_to_segment(p, &polygon[i], &polygon[(i + 1) % n]) <= tol {
            return PointLocation::On;
        }
    }

    // Ray parity along +x
    let mut inside = false;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if x > p.x {
                inside = !inside;
            }
        }
    }
    if inside {
        PointLocation::Inside
    } else {
        PointLocation::Outside
    }
}

/// True when the two segments cross at a single point interior to both.
pub fn segments_cross_properly(
    a0: &Point2<f64>,
    a1: &Point2<f64>,
    b0: &Point2<f64>,
    b1: &Point2<f64>,
    tol: f64,
) -> bool {
    let la = (a1 - a0).norm();
    let lb = (b1 - b0).norm();
    if la <= tol || lb <= tol {
        return false;
    }
    // Heights of each endpoint above the other segment's line
    let d0 = cross(a0, a1, b0) / la;
    let d1 = cross(a0, a1, b1) / la;
    let d2 = cross(b0, b1, a0) / lb;
    let d3 = cross(b0, b1, a1) / lb;
    ((d0 > tol && d1 < -tol) || (d0 < -tol && d1 > tol))
        && ((d2 > tol && d3 < -tol) || (d2 < -tol && d3 > tol))
}

/// Triangulate an outer loop with optional holes.
///
/// Triangle indices refer to the concatenation of `outer` and every hole in
/// order. Returns `None` when earcut fails or produces nothing.
pub fn triangulate(outer: &[Point2<f64>], holes: &[Vec<Point2<f64>>]) -> Option<Vec<[usize; 3]>> {
    let n = outer.len();
    if n < 3 {
        return None;
    }
    if holes.is_empty() && n == 3 {
        return Some(vec![[0, 1, 2]]);
    }

    let total = n + holes.iter().map(|h| h.len()).sum::<usize>();
    let mut vertices = Vec::with_capacity(total * 2);
    for p in outer {
        vertices.push(p.x);
        vertices.push(p.y);
    }
    let mut hole_indices = Vec::with_capacity(holes.len());
    for hole in holes {
        hole_indices.push(vertices.len() / 2);
        for p in hole {
            vertices.push(p.x);
            vertices.push(p.y);
        }
    }

    let indices = earcutr::earcut(&vertices, &hole_indices, 2).ok()?;
    if indices.is_empty() {
        return None;
    }
    Some(
        indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect(),
    )
}

/// A point strictly inside the region: centroid of the largest triangle of
/// its triangulation.
pub fn interior_sample(outer: &[Point2<f64>], holes: &[Vec<Point2<f64>>]) -> Option<Point2<f64>> {
    let all: Vec<Point2<f64>> = outer
        .iter()
        .chain(holes.iter().flatten())
        .copied()
        .collect();
    let triangles = triangulate(outer, holes)?;
    triangles
        .iter()
        .map(|t| {
            let (a, b, c) = (all[t[0]], all[t[1]], all[t[2]]);
            (cross(&a, &b, &c).abs(), Point2::from((a.coords + b.coords + c.coords) / 3.0))
        })
        .filter(|(area, _)| *area > 0.0)
        .max_by(|x, y| x.0.total_cmp(&y.0))
        .map(|(_, centroid)| centroid)
}

/// True when two loops in the same plane share a region of positive area.
/// Touching along edges or at vertices is not an overlap.
pub fn polygons_overlap(a: &[Point2<f64>], b: &[Point2<f64>], tol: f64) -> bool {
    let (na, nb) = (a.len(), b.len());
    if na < 3 || nb < 3 {
        return false;
    }
    for i in 0..na {
        for j in 0..nb {
            if segments_cross_properly(&a[i], &a[(i + 1) % na], &b[j], &b[(j + 1) % nb], tol) {
                return true;
            }
        }
    }
    if a.iter().any(|p| classify_point(p, b, tol) == PointLocation::Inside)
        || b.iter().any(|p| classify_point(p, a, tol) == PointLocation::Inside)
    {
        return true;
    }
    let sample_inside = |from: &[Point2<f64>], other: &[Point2<f64>]| {
        interior_sample(from, &[])
            .map(|s| classify_point(&s, other, tol) == PointLocation::Inside)
            .unwrap_or(false)
    };
    sample_inside(a, b) || sample_inside(b, a)
}
