// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Intersection segment search between meshes

use super::pair_tester::{PairStats, PairTester};
use super::segment::TaggedSegment;
use crate::config::{BroadPhase, IntersectionConfig};
use crate::geometry::{PolygonIntersector, PolyfaceQuery, Range3d};
use crate::range_tree::{
    create_ternary_for_polyface, IndexedRangeHeap, PolyfaceRangeTree, TernaryRangeTree,
};
use log::debug;
use rayon::prelude::*;

/// Segments found by a search plus pair counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentSearch {
    pub segments: Vec<TaggedSegment>,
    pub stats: PairStats,
}

impl SegmentSearch {
    fn from_parts((segments, stats): (Vec<TaggedSegment>, PairStats)) -> Self {
        Self { segments, stats }
    }
}

fn coplanar_tolerance(range_a: &Range3d, range_b: &Range3d, config: &IntersectionConfig) -> f64 {
    let union = range_a.union(range_b);
    if union.is_null() {
        return 0.0;
    }
    union.diagonal() * config.coplanar_tolerance_factor
}

fn heap_tree<Q: PolyfaceQuery + ?Sized>(
    source: &Q,
    config: &IntersectionConfig,
) -> PolyfaceRangeTree {
    PolyfaceRangeTree::create_for_polyface_sorted(
        source,
        config.sort_x,
        config.sort_y,
        config.sort_z,
    )
}

fn root_range(tree: &PolyfaceRangeTree) -> Range3d {
    tree.heap().get(0).unwrap_or_else(Range3d::null)
}

/// All intersection segments between facets of `a` and facets of `b`.
pub fn search_intersection_segments<QA, QB>(
    a: &QA,
    b: &QB,
    intersector: &dyn PolygonIntersector,
    config: &IntersectionConfig,
) -> SegmentSearch
where
    QA: PolyfaceQuery + ?Sized,
    QB: PolyfaceQuery + ?Sized,
{
    let search = match config.broad_phase {
        BroadPhase::IndexedHeap => {
            let tree_a = heap_tree(a, config);
            let tree_b = heap_tree(b, config);
            let tol = coplanar_tolerance(&root_range(&tree_a), &root_range(&tree_b), config);
            let mut tester = PairTester::new(a, &tree_a, b, &tree_b, intersector, tol);
            IndexedRangeHeap::search_pairs(tree_a.heap(), tree_b.heap(), &mut tester, 0);
            SegmentSearch::from_parts(tester.into_segments())
        }
        BroadPhase::Ternary => {
            let tree_a = create_ternary_for_polyface(a, config.ternary_max_per_node);
            let tree_b = create_ternary_for_polyface(b, config.ternary_max_per_node);
            let range_a = tree_a.node_union(tree_a.root()).unwrap_or_else(Range3d::null);
            let range_b = tree_b.node_union(tree_b.root()).unwrap_or_else(Range3d::null);
            let tol = coplanar_tolerance(&range_a, &range_b, config);
            let mut tester = PairTester::new(a, &tree_a, b, &tree_b, intersector, tol);
            TernaryRangeTree::search_pairs(&tree_a, &tree_b, &mut tester);
            SegmentSearch::from_parts(tester.into_segments())
        }
    };
    debug!(
        "Segment search: {} pairs tested, {} rejected, {} segments",
        search.stats.pairs_tested, search.stats.pairs_rejected, search.stats.segments
    );
    search
}

/// Same as [`search_intersection_segments`] on the indexed heap, with tree A
/// partitioned at `depth` and each partition searched on the rayon pool.
/// Results are concatenated in partition order.
pub fn search_intersection_segments_parallel<QA, QB>(
    a: &QA,
    b: &QB,
    intersector: &dyn PolygonIntersector,
    config: &IntersectionConfig,
    depth: usize,
) -> SegmentSearch
where
    QA: PolyfaceQuery + ?Sized,
    QB: PolyfaceQuery + ?Sized,
{
    let tree_a = heap_tree(a, config);
    let tree_b = heap_tree(b, config);
    if tree_a.is_empty() || tree_b.is_empty() {
        return SegmentSearch::default();
    }
    let tol = coplanar_tolerance(&root_range(&tree_a), &root_range(&tree_b), config);
    let partitions = tree_a.heap().nodes_at_depth(depth);

    let results: Vec<(Vec<TaggedSegment>, PairStats)> = partitions
        .par_iter()
        .map(|&node| {
            let mut tester = PairTester::new(a, &tree_a, b, &tree_b, intersector, tol);
            IndexedRangeHeap::search_pairs_from_nodes(
                tree_a.heap(),
                node,
                tree_b.heap(),
                0,
                &mut tester,
            );
            tester.into_segments()
        })
        .collect();

    let mut search = SegmentSearch::default();
    for (segments, stats) in results {
        search.segments.extend(segments);
        search.stats.absorb(&stats);
    }
    debug!(
        "Parallel segment search over {} partitions: {} segments",
        partitions.len(),
        search.segments.len()
    );
    search
}

/// Segments between distinct facets of one mesh; each facet pair is tested once.
pub fn search_self_intersection_segments<Q: PolyfaceQuery + ?Sized>(
    mesh: &Q,
    intersector: &dyn PolygonIntersector,
    config: &IntersectionConfig,
) -> SegmentSearch {
    let tree = heap_tree(mesh, config);
    let range = root_range(&tree);
    let tol = coplanar_tolerance(&range, &range, config);
    let mut tester = PairTester::new(mesh, &tree, mesh, &tree, intersector, tol);
    tree.heap().search_self_pairs(&mut tester);
    SegmentSearch::from_parts(tester.into_segments())
}
