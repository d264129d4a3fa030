// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Planar polygon-polygon intersection
//!
//! Two non-parallel planar polygons meet along the line shared by their
//! planes. Each polygon covers a set of intervals on that line; the
//! intersection segments are the overlaps of the two interval sets.

use super::frame::polygon_unit_normal;
use super::Range3d;
use nalgebra::{Point3, Vector3};

/// Result of intersecting two planar polygons
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonIntersection {
    /// Segments shared by both polygons (empty when parallel)
    pub segments: Vec<(Point3<f64>, Point3<f64>)>,
    /// Planes are parallel or coincident
    pub parallel: bool,
    /// Unit normal of the first polygon (zero when degenerate)
    pub normal_a: Vector3<f64>,
    /// Unit normal of the second polygon (zero when degenerate)
    pub normal_b: Vector3<f64>,
}

/// Intersection primitive used by the pair tester
pub trait PolygonIntersector: Sync {
    fn intersect(&self, a: &[Point3<f64>], b: &[Point3<f64>]) -> PolygonIntersection;
}

/// Default intersector for planar convex or non-convex loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarPolygonIntersector {
    /// Cross product magnitude of unit normals treated as parallel
    pub parallel_tolerance: f64,
    /// Distance tolerance factor, times the diagonal of both polygons
    pub relative_tolerance: f64,
}

impl Default for PlanarPolygonIntersector {
    fn default() -> Self {
        Self {
            parallel_tolerance: 1e-10,
            relative_tolerance: 1e-10,
        }
    }
}

impl PlanarPolygonIntersector {
    pub fn new(parallel_tolerance: f64) -> Self {
        Self {
            parallel_tolerance,
            ..Default::default()
        }
    }
}

impl PolygonIntersector for PlanarPolygonIntersector {
    fn intersect(&self, a: &[Point3<f64>], b: &[Point3<f64>]) -> PolygonIntersection {
        let mut result = PolygonIntersection::default();
        let (Some(normal_a), Some(normal_b)) = (polygon_unit_normal(a), polygon_unit_normal(b))
        else {
            // Zero-area loops have no plane
            return result;
        };
        result.normal_a = normal_a;
        result.normal_b = normal_b;

        let direction = normal_a.cross(&normal_b);
        if direction.norm() < self.parallel_tolerance {
            result.parallel = true;
            return result;
        }
        let direction = direction.normalize();

        let tol = self.relative_tolerance
            * Range3d::from_points(a)
                .union(&Range3d::from_points(b))
                .diagonal();
        let origin = a[0];

        let intervals_a = line_intervals(a, &normal_b, &b[0], &direction, &origin, tol);
        if intervals_a.is_empty() {
            return result;
        }
        let intervals_b = line_intervals(b, &normal_a, &a[0], &direction, &origin, tol);

        let (mut i, mut j) = (0, 0);
        while i < intervals_a.len() && j < intervals_b.len() {
            let (a0, a1) = intervals_a[i];
            let (b0, b1) = intervals_b[j];
            let t0 = a0.max(b0);
            let t1 = a1.min(b1);
            if t1 - t0 > tol {
                let start = origin + direction * t0;
                let end = origin + direction * t1;
                let start = project_to_line(&start, &normal_a, &a[0], &normal_b, &b[0]);
                let end = project_to_line(&end, &normal_a, &a[0], &normal_b, &b[0]);
                let mid = nalgebra::center(&start, &end);
                if !(on_boundary(&mid, a, tol) && on_boundary(&mid, b, tol)) {
                    result.segments.push((start, end));
                }
            }
            if a1 < b1 {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }
}

/// Sorted disjoint parameter intervals where `polygon` meets the plane
/// (`plane_normal`, `plane_point`), measured along `direction` from `origin`.
///
/// A polygon with vertices strictly on both sides contributes the spans
/// between its boundary crossings; vertices within `tol` of the plane count
/// as positive so every crossing is counted once. A polygon that only
/// touches the plane contributes the edges lying in it.
fn line_intervals(
    polygon: &[Point3<f64>],
    plane_normal: &Vector3<f64>,
    plane_point: &Point3<f64>,
    direction: &Vector3<f64>,
    origin: &Point3<f64>,
    tol: f64,
) -> Vec<(f64, f64)> {
    let heights: Vec<f64> = polygon
        .iter()
        .map(|p| plane_normal.dot(&(p - plane_point)))
        .collect();
    let n = polygon.len();
    let param = |p: &Point3<f64>| direction.dot(&(p - origin));
    let has_positive = heights.iter().any(|h| *h > tol);
    let has_negative = heights.iter().any(|h| *h < -tol);

    if has_positive && has_negative {
        let mut params = Vec::new();
        for i in 0..n {
            let j = (i + 1) % n;
            let (hi, hj) = (heights[i], heights[j]);
            if (hi >= -tol) == (hj >= -tol) {
                continue;
            }
            let crossing = if hi.abs() <= tol {
                polygon[i]
            } else if hj.abs() <= tol {
                polygon[j]
            } else {
                polygon[i] + (polygon[j] - polygon[i]) * (hi / (hi - hj))
            };
            params.push(param(&crossing));
        }
        params.sort_by(f64::total_cmp);
        return params
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
    }

    if !(has_positive || has_negative) {
        return Vec::new();
    }

    let mut touching: Vec<(f64, f64)> = (0..n)
        .filter(|&i| heights[i].abs() <= tol && heights[(i + 1) % n].abs() <= tol)
        .map(|i| {
            let (t0, t1) = (param(&polygon[i]), param(&polygon[(i + 1) % n]));
            (t0.min(t1), t0.max(t1))
        })
        .collect();
    touching.sort_by(|x, y| x.0.total_cmp(&y.0));
    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(touching.len());
    for (t0, t1) in touching {
        match merged.last_mut() {
            Some(last) if t0 <= last.1 => last.1 = last.1.max(t1),
            _ => merged.push((t0, t1)),
        }
    }
    merged
}

/// Pull a point onto the intersection line of two planes.
fn project_to_line(
    point: &Point3<f64>,
    na: &Vector3<f64>,
    pa: &Point3<f64>,
    nb: &Vector3<f64>,
    pb: &Point3<f64>,
) -> Point3<f64> {
    // Solve for the correction in span(na, nb) that zeroes both heights
    let ha = na.dot(&(point - pa));
    let hb = nb.dot(&(point - pb));
    let c = na.dot(nb);
    let det = 1.0 - c * c;
    if det <= 0.0 {
        return *point;
    }
    let alpha = (ha - c * hb) / det;
    let beta = (hb - c * ha) / det;
    point - na * alpha - nb * beta
}

/// Point within `tol` of the polygon's boundary.
fn on_boundary(point: &Point3<f64>, polygon: &[Point3<f64>], tol: f64) -> bool {
    let n = polygon.len();
    (0..n).any(|i| {
        let a = polygon[i];
        let ab = polygon[(i + 1) % n] - a;
        let len2 = ab.norm_squared();
        let t = if len2 == 0.0 {
            0.0
        } else {
            ((point - a).dot(&ab) / len2).clamp(0.0, 1.0)
        };
        (point - (a + ab * t)).norm() <= tol
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square_xy(z: f64, x0: f64, size: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(x0, 0.0, z),
            Point3::new(x0 + size, 0.0, z),
            Point3::new(x0 + size, size, z),
            Point3::new(x0, size, z),
        ]
    }

    #[test]
    fn test_crossing_squares() {
        let a = square_xy(0.0, 0.0, 2.0);
        // Vertical square through x = 1 spanning z in [-1, 1]
        let b = vec![
            Point3::new(1.0, 0.5, -1.0),
            Point3::new(1.0, 1.5, -1.0),
            Point3::new(1.0, 1.5, 1.0),
            Point3::new(1.0, 0.5, 1.0),
        ];
        let result = PlanarPolygonIntersector::default().intersect(&a, &b);
        assert!(!result.parallel);
        assert_eq!(result.segments.len(), 1);
        let (s, e) = result.segments[0];
        assert_relative_eq!((s - e).norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(s.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(s.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_planes() {
        let a = square_xy(0.0, 0.0, 1.0);
        let b = square_xy(0.5, 0.0, 1.0);
        let result = PlanarPolygonIntersector::default().intersect(&a, &b);
        assert!(result.parallel);
        assert!(result.segments.is_empty());
        assert_relative_eq!(result.normal_a, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_non_convex_gives_two_segments() {
        // U shape in the xy plane, cut by the plane y = 1.5
        let u = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(3.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let wall = vec![
            Point3::new(-1.0, 1.5, -1.0),
            Point3::new(4.0, 1.5, -1.0),
            Point3::new(4.0, 1.5, 1.0),
            Point3::new(-1.0, 1.5, 1.0),
        ];
        let result = PlanarPolygonIntersector::default().intersect(&u, &wall);
        assert_eq!(result.segments.len(), 2);
        let total: f64 = result.segments.iter().map(|(s, e)| (e - s).norm()).sum();
        assert_relative_eq!(total, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_edge_on_edge_contact_is_dropped() {
        // Two faces of a cube meeting at a shared edge
        let floor = square_xy(0.0, 0.0, 1.0);
        let wall = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
        ];
        let result = PlanarPolygonIntersector::default().intersect(&floor, &wall);
        assert!(result.segments.is_empty());
    }

    #[test]
    fn test_edge_through_interior_is_kept() {
        // Wall whose bottom edge lies inside the floor square
        let floor = square_xy(0.0, 0.0, 2.0);
        let wall = vec![
            Point3::new(1.0, 0.5, 0.0),
            Point3::new(1.0, 1.5, 0.0),
            Point3::new(1.0, 1.5, 1.0),
            Point3::new(1.0, 0.5, 1.0),
        ];
        let result = PlanarPolygonIntersector::default().intersect(&floor, &wall);
        assert_eq!(result.segments.len(), 1);
    }
}
