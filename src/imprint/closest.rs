// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Closest approach between two meshes

use crate::geometry::polygon2d::{classify_point, PointLocation};
use crate::geometry::{FacetVisitor, LocalFrame, PolyfaceQuery, Range3d};
use crate::range_tree::{IndexedRangeHeap, PairProcessor, PolyfaceRangeTree};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Shortest segment found between facets of two meshes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosestApproach {
    /// Point on mesh A
    pub start: Point3<f64>,
    /// Point on mesh B
    pub end: Point3<f64>,
    pub read_index_a: usize,
    pub read_index_b: usize,
    pub distance: f64,
}

/// Closest points between segments `p0 p1` and `q0 q1`.
pub fn closest_points_segment_segment(
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    q0: &Point3<f64>,
    q1: &Point3<f64>,
) -> (Point3<f64>, Point3<f64>) {
    const EPS: f64 = 1.0e-300;
    let d1 = p1 - p0;
    let d2 = q1 - q0;
    let r = p0 - q0;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    let (s, t) = if a <= EPS && e <= EPS {
        (0.0, 0.0)
    } else if a <= EPS {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e <= EPS {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            let mut s = if denom > EPS {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    (p0 + d1 * s, q0 + d2 * t)
}

/// Projection of `point` onto the planar polygon, if it falls inside it.
fn project_inside(
    point: &Point3<f64>,
    frame: &LocalFrame,
    local_polygon: &[Point2<f64>],
    tol: f64,
) -> Option<Point3<f64>> {
    let local = frame.to_local_xy(point);
    (classify_point(&local, local_polygon, tol) != PointLocation::Outside)
        .then(|| frame.to_world(&local))
}

/// Closest points between two planar polygons: (on a, on b).
pub fn closest_points_polygon_polygon(
    a: &[Point3<f64>],
    b: &[Point3<f64>],
) -> Option<(Point3<f64>, Point3<f64>)> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let mut best: Option<(Point3<f64>, Point3<f64>, f64)> = None;
    let mut offer = |pa: Point3<f64>, pb: Point3<f64>| {
        let d = (pb - pa).norm_squared();
        if best.map_or(true, |(_, _, bd)| d < bd) {
            best = Some((pa, pb, d));
        }
    };

    let (na, nb) = (a.len(), b.len());
    for i in 0..na {
        for j in 0..nb {
            let (pa, pb) =
                closest_points_segment_segment(&a[i], &a[(i + 1) % na], &b[j], &b[(j + 1) % nb]);
            offer(pa, pb);
        }
    }

    let tol = 1.0e-12 * Range3d::from_points(a).union(&Range3d::from_points(b)).diagonal();
    for (from, onto, from_is_a) in [(a, b, true), (b, a, false)] {
        let Some(frame) = LocalFrame::from_polygon(onto) else {
            continue;
        };
        let local: Vec<Point2<f64>> = onto.iter().map(|p| frame.to_local_xy(p)).collect();
        let n = from.len();
        for i in 0..n {
            if let Some(foot) = project_inside(&from[i], &frame, &local, tol) {
                if from_is_a {
                    offer(from[i], foot);
                } else {
                    offer(foot, from[i]);
                }
            }
            // An edge piercing the polygon meets it at distance zero
            let (p, q) = (from[i], from[(i + 1) % n]);
            let (hp, hq) = (frame.to_local(&p).z, frame.to_local(&q).z);
            if (hp > 0.0 && hq < 0.0) || (hp < 0.0 && hq > 0.0) {
                let pierce = p + (q - p) * (hp / (hp - hq));
                if let Some(foot) = project_inside(&pierce, &frame, &local, tol) {
                    offer(foot, foot);
                }
            }
        }
    }

    best.map(|(pa, pb, _)| (pa, pb))
}

struct ClosestApproachSearch<'a, QA: PolyfaceQuery + ?Sized, QB: PolyfaceQuery + ?Sized> {
    tree_a: &'a PolyfaceRangeTree,
    tree_b: &'a PolyfaceRangeTree,
    visitor_a: FacetVisitor<'a, QA>,
    visitor_b: FacetVisitor<'a, QB>,
    max_distance: f64,
    best: Option<ClosestApproach>,
}

impl<QA: PolyfaceQuery + ?Sized, QB: PolyfaceQuery + ?Sized> ClosestApproachSearch<'_, QA, QB> {
    fn cutoff(&self) -> f64 {
        self.best.map_or(self.max_distance, |b| b.distance.min(self.max_distance))
    }
}

impl<QA: PolyfaceQuery + ?Sized, QB: PolyfaceQuery + ?Sized> PairProcessor
    for ClosestApproachSearch<'_, QA, QB>
{
    fn need_processing(
        &mut self,
        range_a: &Range3d,
        _a0: usize,
        _a1: usize,
        range_b: &Range3d,
        _b0: usize,
        _b1: usize,
    ) -> bool {
        let cutoff = self.cutoff();
        range_a.distance_squared_to(range_b) <= cutoff * cutoff
    }

    fn process(&mut self, leaf_a: usize, leaf_b: usize) {
        let (Some(read_a), Some(read_b)) = (
            self.tree_a.try_get_read_index(leaf_a),
            self.tree_b.try_get_read_index(leaf_b),
        ) else {
            return;
        };
        if !self.visitor_a.move_to_read_index(read_a) || !self.visitor_b.move_to_read_index(read_b)
        {
            return;
        }
        let Some((start, end)) =
            closest_points_polygon_polygon(self.visitor_a.points(), self.visitor_b.points())
        else {
            return;
        };
        let distance = (end - start).norm();
        if distance <= self.cutoff() && self.best.map_or(true, |b| distance < b.distance) {
            self.best = Some(ClosestApproach {
                start,
                end,
                read_index_a: read_a,
                read_index_b: read_b,
                distance,
            });
        }
    }

    fn is_complete(&self) -> bool {
        self.best.map_or(false, |b| b.distance == 0.0)
    }
}

/// Shortest segment between facets of `a` and `b` no longer than
/// `max_distance`. The distance cutoff shrinks as closer pairs are found.
pub fn search_closest_approach<QA, QB>(a: &QA, b: &QB, max_distance: f64) -> Option<ClosestApproach>
where
    QA: PolyfaceQuery + ?Sized,
    QB: PolyfaceQuery + ?Sized,
{
    let tree_a = PolyfaceRangeTree::create_for_polyface_xy_sort(a);
    let tree_b = PolyfaceRangeTree::create_for_polyface_xy_sort(b);
    let mut search = ClosestApproachSearch {
        tree_a: &tree_a,
        tree_b: &tree_b,
        visitor_a: FacetVisitor::new(a),
        visitor_b: FacetVisitor::new(b),
        max_distance,
        best: None,
    };
    IndexedRangeHeap::search_pairs(tree_a.heap(), tree_b.heap(), &mut search, 0);
    search.best
}

/// Linestring read as a mesh whose facets are its segments
struct LinestringSegments<'a>(&'a [Point3<f64>]);

impl PolyfaceQuery for LinestringSegments<'_> {
    fn facet_count(&self) -> usize {
        // A single point is one degenerate segment
        self.0.len().saturating_sub(1).max(usize::from(!self.0.is_empty()))
    }

    fn load_facet(&self, read_index: usize, points: &mut Vec<Point3<f64>>) -> bool {
        points.clear();
        if read_index >= self.facet_count() {
            return false;
        }
        let end = (read_index + 1).min(self.0.len() - 1);
        points.push(self.0[read_index]);
        points.push(self.0[end]);
        true
    }
}

/// Shortest segment between a facet of `mesh` and the linestring `points`.
///
/// `start` lies on the mesh and `end` on the linestring; `read_index_b` is
/// the index of the linestring segment, counted from its first point.
pub fn search_closest_approach_to_linestring<Q>(
    mesh: &Q,
    points: &[Point3<f64>],
) -> Option<ClosestApproach>
where
    Q: PolyfaceQuery + ?Sized,
{
    let linestring = LinestringSegments(points);
    let tree_a = PolyfaceRangeTree::create_for_polyface_xy_sort(mesh);
    let tree_b = PolyfaceRangeTree::create_for_polyface_xy_sort(&linestring);
    let mut search = ClosestApproachSearch {
        tree_a: &tree_a,
        tree_b: &tree_b,
        visitor_a: FacetVisitor::new(mesh),
        visitor_b: FacetVisitor::new(&linestring),
        max_distance: f64::INFINITY,
        best: None,
    };
    IndexedRangeHeap::search_pairs(tree_a.heap(), tree_b.heap(), &mut search, 0);
    search.best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_segment_segment() {
        let (p, q) = closest_points_segment_segment(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(2.0, 0.0, 0.0),
            &Point3::new(1.0, -1.0, 1.0),
            &Point3::new(1.0, 1.0, 1.0),
        );
        assert_relative_eq!(p, Point3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(q, Point3::new(1.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_vertex_over_face() {
        let floor = [
            Point3::new(-5.0, -5.0, 0.0),
            Point3::new(5.0, -5.0, 0.0),
            Point3::new(5.0, 5.0, 0.0),
            Point3::new(-5.0, 5.0, 0.0),
        ];
        let tent = [
            Point3::new(0.0, 0.0, 0.5),
            Point3::new(1.0, 0.0, 3.0),
            Point3::new(0.0, 1.0, 3.0),
        ];
        let (pa, pb) = closest_points_polygon_polygon(&floor, &tent).unwrap();
        assert_relative_eq!(pa, Point3::new(0.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(pb, Point3::new(0.0, 0.0, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_separated_cubes() {
        let a = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_polyface();
        let mut b = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_polyface();
        b.translate(&Vector3::new(3.0, 0.25, 0.0));

        let approach = search_closest_approach(&a, &b, 10.0).unwrap();
        assert_relative_eq!(approach.distance, 2.0, epsilon = 1e-12);
        assert_relative_eq!(approach.start.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(approach.end.x, 3.0, epsilon = 1e-12);

        assert!(search_closest_approach(&a, &b, 1.5).is_none());
    }

    #[test]
    fn test_overlapping_cubes_touch() {
        let a = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), false).to_polyface();
        let mut b = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), false).to_polyface();
        b.translate(&Vector3::new(1.0, 1.0, 1.0));
        let approach = search_closest_approach(&a, &b, 1.0).unwrap();
        assert_relative_eq!(approach.distance, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_linestring_above_cube() {
        let cube = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_polyface();
        let path = [
            Point3::new(-2.0, 0.5, 3.0),
            Point3::new(0.25, 0.5, 1.5),
            Point3::new(3.0, 0.5, 4.0),
        ];
        let approach = search_closest_approach_to_linestring(&cube, &path).unwrap();
        assert_relative_eq!(approach.distance, 0.5, epsilon = 1e-12);
        assert_relative_eq!(approach.start, Point3::new(0.25, 0.5, 1.0), epsilon = 1e-12);
        assert_relative_eq!(approach.end, Point3::new(0.25, 0.5, 1.5), epsilon = 1e-12);
        assert!(approach.read_index_b <= 1);
    }

    #[test]
    fn test_linestring_through_cube_and_edge_cases() {
        let cube = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_polyface();
        let through = [Point3::new(0.5, 0.5, -1.0), Point3::new(0.5, 0.5, 2.0)];
        let approach = search_closest_approach_to_linestring(&cube, &through).unwrap();
        assert_relative_eq!(approach.distance, 0.0, epsilon = 1e-12);

        let single = [Point3::new(0.5, 0.5, 3.0)];
        let approach = search_closest_approach_to_linestring(&cube, &single).unwrap();
        assert_relative_eq!(approach.distance, 2.0, epsilon = 1e-12);
        assert_eq!(approach.read_index_b, 0);

        assert!(search_closest_approach_to_linestring(&cube, &[]).is_none());
    }
}
