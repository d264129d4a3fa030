// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric test for candidate facet pairs found by a dual-tree search

use super::segment::{SegmentHistory, TaggedSegment};
use crate::geometry::polygon2d::polygons_overlap;
use crate::geometry::{FacetVisitor, LocalFrame, PolygonIntersector, PolyfaceQuery, Range3d};
use crate::range_tree::{PairProcessor, ReadIndexLookup};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Counters collected while testing pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairStats {
    /// Pairs handed to the intersector
    pub pairs_tested: usize,
    /// Pairs that produced no segment
    pub pairs_rejected: usize,
    pub segments: usize,
}

impl PairStats {
    pub fn absorb(&mut self, other: &PairStats) {
        self.pairs_tested += other.pairs_tested;
        self.pairs_rejected += other.pairs_rejected;
        self.segments += other.segments;
    }
}

/// Pair processor that turns overlapping facet pairs into tagged segments.
pub struct PairTester<'a, QA: PolyfaceQuery + ?Sized, QB: PolyfaceQuery + ?Sized> {
    lookup_a: &'a dyn ReadIndexLookup,
    lookup_b: &'a dyn ReadIndexLookup,
    visitor_a: FacetVisitor<'a, QA>,
    visitor_b: FacetVisitor<'a, QB>,
    intersector: &'a dyn PolygonIntersector,
    coplanar_tolerance: f64,
    segments: Vec<TaggedSegment>,
    stats: PairStats,
}

impl<'a, QA: PolyfaceQuery + ?Sized, QB: PolyfaceQuery + ?Sized> PairTester<'a, QA, QB> {
    /// `coplanar_tolerance` is an absolute distance; callers derive it from
    /// the diagonal of both meshes.
    pub fn new(
        source_a: &'a QA,
        lookup_a: &'a dyn ReadIndexLookup,
        source_b: &'a QB,
        lookup_b: &'a dyn ReadIndexLookup,
        intersector: &'a dyn PolygonIntersector,
        coplanar_tolerance: f64,
    ) -> Self {
        Self {
            lookup_a,
            lookup_b,
            visitor_a: FacetVisitor::new(source_a),
            visitor_b: FacetVisitor::new(source_b),
            intersector,
            coplanar_tolerance,
            segments: Vec::new(),
            stats: PairStats::default(),
        }
    }

    pub fn segments(&self) -> &[TaggedSegment] {
        &self.segments
    }

    pub fn stats(&self) -> PairStats {
        PairStats {
            segments: self.segments.len(),
            ..self.stats
        }
    }

    pub fn into_segments(self) -> (Vec<TaggedSegment>, PairStats) {
        let stats = self.stats();
        (self.segments, stats)
    }

    /// Test one pair of facets given by read index.
    pub fn test_read_indices(&mut self, read_a: usize, read_b: usize) {
        if !self.visitor_a.move_to_read_index(read_a) || !self.visitor_b.move_to_read_index(read_b)
        {
            self.stats.pairs_rejected += 1;
            return;
        }
        self.stats.pairs_tested += 1;
        let before = self.segments.len();

        let points_a = self.visitor_a.points();
        let points_b = self.visitor_b.points();
        let result = self.intersector.intersect(points_a, points_b);
        if !result.parallel {
            self.segments.extend(result.segments.iter().map(|&(start, end)| {
                TaggedSegment::new(start, end, read_a, read_b, SegmentHistory::Transverse)
            }));
        } else {
            let (Some(origin_a), Some(origin_b)) = (points_a.first(), points_b.first()) else {
                self.stats.pairs_rejected += 1;
                return;
            };
            let distance = result.normal_a.dot(&(origin_b - origin_a));
            if distance.abs() < self.coplanar_tolerance
                && coplanar_overlap(points_a, points_b, self.coplanar_tolerance)
            {
                push_edges(&mut self.segments, points_a, read_a, read_b, SegmentHistory::EdgeOfA);
                push_edges(&mut self.segments, points_b, read_a, read_b, SegmentHistory::EdgeOfB);
            }
        }

        if self.segments.len() == before {
            self.stats.pairs_rejected += 1;
        }
    }
}

/// Positive-area overlap of two facets lying in one plane
fn coplanar_overlap(a: &[Point3<f64>], b: &[Point3<f64>], tol: f64) -> bool {
    let Some(frame) = LocalFrame::from_polygon(a) else {
        return false;
    };
    let local_a: Vec<Point2<f64>> = a.iter().map(|p| frame.to_local_xy(p)).collect();
    let local_b: Vec<Point2<f64>> = b.iter().map(|p| frame.to_local_xy(p)).collect();
    polygons_overlap(&local_a, &local_b, tol)
}

fn push_edges(
    out: &mut Vec<TaggedSegment>,
    points: &[Point3<f64>],
    read_a: usize,
    read_b: usize,
    history: SegmentHistory,
) {
    let n = points.len();
    for i in 0..n {
        let (start, end) = (points[i], points[(i + 1) % n]);
        if start != end {
            out.push(TaggedSegment::new(start, end, read_a, read_b, history));
        }
    }
}

impl<QA: PolyfaceQuery + ?Sized, QB: PolyfaceQuery + ?Sized> PairProcessor
    for PairTester<'_, QA, QB>
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
        range_a.intersects(range_b)
    }

    fn process(&mut self, leaf_a: usize, leaf_b: usize) {
        let (Some(read_a), Some(read_b)) = (
            self.lookup_a.try_get_read_index(leaf_a),
            self.lookup_b.try_get_read_index(leaf_b),
        ) else {
            self.stats.pairs_rejected += 1;
            return;
        };
        self.test_read_indices(read_a, read_b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{
        PlanarPolygonIntersector, PolygonIntersection, Polyface, TaggedPolygon,
    };
    use crate::range_tree::PolyfaceRangeTree;

    fn square(z: f64, x0: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(x0, 0.0, z),
            Point3::new(x0 + 1.0, 0.0, z),
            Point3::new(x0 + 1.0, 1.0, z),
            Point3::new(x0, 1.0, z),
        ]
    }

    fn run(a: &Polyface, b: &Polyface, tol: f64) -> (Vec<TaggedSegment>, PairStats) {
        let tree_a = PolyfaceRangeTree::create_for_polyface(a);
        let tree_b = PolyfaceRangeTree::create_for_polyface(b);
        let intersector = PlanarPolygonIntersector::default();
        let mut tester = PairTester::new(a, &tree_a, b, &tree_b, &intersector, tol);
        for leaf_a in 0..tree_a.num_ranges() {
            for leaf_b in 0..tree_b.num_ranges() {
                tester.process(leaf_a, leaf_b);
            }
        }
        tester.into_segments()
    }

    #[test]
    fn test_transverse_pair() {
        let a = Polyface::from_polygons(&[square(0.0, 0.0)]);
        let b = Polyface::from_polygons(&[vec![
            Point3::new(0.5, -1.0, -1.0),
            Point3::new(0.5, 2.0, -1.0),
            Point3::new(0.5, 2.0, 1.0),
            Point3::new(0.5, -1.0, 1.0),
        ]]);
        let (segments, stats) = run(&a, &b, 1e-9);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].history, SegmentHistory::Transverse);
        assert_eq!((segments[0].read_index_a, segments[0].read_index_b), (0, 0));
        assert_eq!(stats.pairs_tested, 1);
        assert_eq!(stats.pairs_rejected, 0);
    }

    #[test]
    fn test_coplanar_overlap_emits_both_boundaries() {
        let a = Polyface::from_polygons(&[square(0.0, 0.0)]);
        let b = Polyface::from_polygons(&[square(0.0, 0.5)]);
        let (segments, _) = run(&a, &b, 1e-9);
        let count = |h| segments.iter().filter(|s| s.history == h).count();
        assert_eq!(count(SegmentHistory::EdgeOfA), 4);
        assert_eq!(count(SegmentHistory::EdgeOfB), 4);
        assert_eq!(count(SegmentHistory::Transverse), 0);
    }

    #[test]
    fn test_parallel_offset_and_touching_are_rejected() {
        let a = Polyface::from_polygons(&[square(0.0, 0.0)]);
        let offset = Polyface::from_polygons(&[square(0.25, 0.0)]);
        let (segments, stats) = run(&a, &offset, 1e-9);
        assert!(segments.is_empty());
        assert_eq!(stats.pairs_rejected, 1);

        // Shares only an edge
        let touching = Polyface::from_polygons(&[square(0.0, 1.0)]);
        let (segments, _) = run(&a, &touching, 1e-9);
        assert!(segments.is_empty());
    }

    #[test]
    fn test_failed_lookup_is_rejected() {
        let a = Polyface::from_polygons(&[square(0.0, 0.0)]);
        let tree = PolyfaceRangeTree::create_for_polyface(&a);
        let intersector = PlanarPolygonIntersector::default();
        let mut tester = PairTester::new(&a, &tree, &a, &tree, &intersector, 1e-9);
        tester.process(0, 5);
        let (segments, stats) = tester.into_segments();
        assert!(segments.is_empty());
        assert_eq!(stats.pairs_tested, 0);
        assert_eq!(stats.pairs_rejected, 1);
    }

    /// Reports every pair as parallel, including empty loops
    struct ParallelEverywhere;

    impl PolygonIntersector for ParallelEverywhere {
        fn intersect(&self, _a: &[Point3<f64>], _b: &[Point3<f64>]) -> PolygonIntersection {
            PolygonIntersection {
                parallel: true,
                ..Default::default()
            }
        }
    }

    #[test]
    fn test_parallel_report_for_empty_facet_is_rejected() {
        let empty = vec![TaggedPolygon::new(Vec::new(), 0)];
        let b = Polyface::from_polygons(&[square(0.0, 0.0)]);
        let tree_a = PolyfaceRangeTree::create_for_polygons(&empty, false, false, false);
        let tree_b = PolyfaceRangeTree::create_for_polyface(&b);
        let intersector = ParallelEverywhere;
        let mut tester = PairTester::new(&empty[..], &tree_a, &b, &tree_b, &intersector, 1e-9);
        tester.test_read_indices(0, 0);
        let (segments, stats) = tester.into_segments();
        assert!(segments.is_empty());
        assert_eq!(stats.pairs_tested, 1);
        assert_eq!(stats.pairs_rejected, 1);
    }
}
