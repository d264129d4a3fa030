// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Per-facet range trees over a polyface
//!
//! Facet ranges are optionally reordered for locality before the heap is
//! built. The heap position to read index table is permuted in lock step and
//! owned by the tree, so positions can always be mapped back.

use super::heap::{IndexedRangeHeap, RangeOverlapLeaves};
use super::splitter::best_axis_split;
use super::ternary::TernaryRangeTree;
use super::ReadIndexLookup;
use crate::geometry::{FacetVisitor, PolyfaceQuery, Range3d, TaggedPolygon};

#[derive(Debug, Clone, Copy)]
struct FacetEntry {
    range: Range3d,
    read_index: usize,
    sequence: usize,
}

/// Indexed heap over the facet ranges of one mesh
#[derive(Debug, Clone, Default)]
pub struct PolyfaceRangeTree {
    heap: IndexedRangeHeap,
    ranges: Vec<Range3d>,
    read_indices: Vec<usize>,
    sequences: Vec<usize>,
}

impl PolyfaceRangeTree {
    /// Facets in read-index order, no reordering
    pub fn create_for_polyface<Q: PolyfaceQuery + ?Sized>(source: &Q) -> Self {
        Self::create_for_polyface_sorted(source, false, false, false)
    }

    pub fn create_for_polyface_xy_sort<Q: PolyfaceQuery + ?Sized>(source: &Q) -> Self {
        Self::create_for_polyface_sorted(source, true, true, false)
    }

    pub fn create_for_polyface_sorted<Q: PolyfaceQuery + ?Sized>(
        source: &Q,
        sort_x: bool,
        sort_y: bool,
        sort_z: bool,
    ) -> Self {
        let mut entries = Vec::with_capacity(source.facet_count());
        let mut visitor = FacetVisitor::new(source);
        while visitor.advance() {
            if let Some(read_index) = visitor.read_index() {
                entries.push(FacetEntry {
                    range: visitor.facet_range(),
                    read_index,
                    sequence: entries.len(),
                });
            }
        }
        Self::load(entries, [sort_x, sort_y, sort_z])
    }

    /// Tree over loose polygons; each polygon's tag is its read index.
    pub fn create_for_polygons(
        polygons: &[TaggedPolygon],
        sort_x: bool,
        sort_y: bool,
        sort_z: bool,
    ) -> Self {
        let entries = polygons
            .iter()
            .enumerate()
            .map(|(sequence, polygon)| FacetEntry {
                range: Range3d::from_points(&polygon.points),
                read_index: polygon.tag,
                sequence,
            })
            .collect();
        Self::load(entries, [sort_x, sort_y, sort_z])
    }

    fn load(mut entries: Vec<FacetEntry>, allowed_axes: [bool; 3]) -> Self {
        if entries.is_empty() {
            return Self::default();
        }
        if allowed_axes.iter().any(|&a| a) {
            let shape = IndexedRangeHeap::with_shape(entries.len());
            pseudo_binary_split(&shape, 0, &mut entries, allowed_axes);
        }

        let ranges: Vec<Range3d> = entries.iter().map(|e| e.range).collect();
        Self {
            heap: IndexedRangeHeap::build(&ranges),
            ranges,
            read_indices: entries.iter().map(|e| e.read_index).collect(),
            sequences: entries.iter().map(|e| e.sequence).collect(),
        }
    }

    pub fn heap(&self) -> &IndexedRangeHeap {
        &self.heap
    }

    pub fn num_ranges(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn try_get_range(&self, position: usize) -> Option<Range3d> {
        self.ranges.get(position).copied()
    }

    /// Read index of the facet at heap position `position`
    pub fn try_get_read_index(&self, position: usize) -> Option<usize> {
        self.read_indices.get(position).copied()
    }

    /// Load order of the facet at heap position `position`
    pub fn try_get_sequence(&self, position: usize) -> Option<usize> {
        self.sequences.get(position).copied()
    }

    /// Read indices of facets whose range meets `query` grown by `expansion`
    pub fn collect_in_range(&self, query: &Range3d, expansion: f64) -> Vec<usize> {
        let mut hits = Vec::new();
        let mut processor = RangeOverlapLeaves::new(query.expanded(expansion), |leaf| {
            hits.push(leaf);
        });
        self.heap.search(&mut processor);
        hits.into_iter()
            .filter_map(|leaf| self.try_get_read_index(leaf))
            .collect()
    }

    /// Read indices under every node at `depth`; leaves above that depth
    /// form their own group.
    pub fn collect_read_indices_by_tree_depth(&self, depth: usize) -> Vec<Vec<usize>> {
        self.heap
            .nodes_at_depth(depth)
            .into_iter()
            .filter_map(|node| self.heap.node_span(node))
            .map(|(i0, i1)| self.read_indices[i0..=i1].to_vec())
            .collect()
    }
}

impl ReadIndexLookup for PolyfaceRangeTree {
    fn try_get_read_index(&self, leaf: usize) -> Option<usize> {
        PolyfaceRangeTree::try_get_read_index(self, leaf)
    }
}

impl ReadIndexLookup for TernaryRangeTree {
    fn try_get_read_index(&self, leaf: usize) -> Option<usize> {
        self.try_get_tag(leaf)
    }
}

/// Ternary tree over the facet ranges of a mesh, tagged by read index.
pub fn create_ternary_for_polyface<Q: PolyfaceQuery + ?Sized>(
    source: &Q,
    max_per_node: usize,
) -> TernaryRangeTree {
    let mut tree = TernaryRangeTree::new();
    let mut visitor = FacetVisitor::new(source);
    while visitor.advance() {
        if let Some(read_index) = visitor.read_index() {
            tree.preload(visitor.facet_range(), read_index);
        }
    }
    tree.distribute_preloads(max_per_node);
    tree
}

/// Reorder the span of `node` along its best allowed axis, then recurse
/// into the two child spans of the heap shape.
fn pseudo_binary_split(
    shape: &IndexedRangeHeap,
    node: usize,
    entries: &mut [FacetEntry],
    allowed_axes: [bool; 3],
) {
    let Some((i0, i1)) = shape.node_span(node) else {
        return;
    };
    if i0 == i1 {
        return;
    }
    let span = &mut entries[i0..=i1];
    let ranges: Vec<Range3d> = span.iter().map(|e| e.range).collect();
    if let Some(split) = best_axis_split(&ranges, allowed_axes) {
        let axis = split.axis;
        span.sort_by(|a, b| a.range.center_on(axis).total_cmp(&b.range.center_on(axis)));
    }
    if let (Some(left), Some(right)) = (shape.left_child(node), shape.right_child(node)) {
        pseudo_binary_split(shape, left, entries, allowed_axes);
        pseudo_binary_split(shape, right, entries, allowed_axes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Polyface, Primitive};
    use nalgebra::{Point3, Vector3};

    fn strip(count: usize) -> Polyface {
        // Unit squares along x in reverse order
        let polygons: Vec<Vec<Point3<f64>>> = (0..count)
            .rev()
            .map(|i| {
                let x = i as f64 * 2.0;
                vec![
                    Point3::new(x, 0.0, 0.0),
                    Point3::new(x + 1.0, 0.0, 0.0),
                    Point3::new(x + 1.0, 1.0, 0.0),
                    Point3::new(x, 1.0, 0.0),
                ]
            })
            .collect();
        Polyface::from_polygons(&polygons)
    }

    #[test]
    fn test_unsorted_keeps_read_order() {
        let mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_polyface();
        let tree = PolyfaceRangeTree::create_for_polyface(&mesh);
        assert_eq!(tree.num_ranges(), 6);
        assert_eq!(tree.heap().num_nodes(), 11);
        for position in 0..6 {
            assert_eq!(tree.try_get_read_index(position), Some(position));
            assert_eq!(tree.try_get_sequence(position), Some(position));
        }
        assert_eq!(tree.try_get_read_index(6), None);
        assert_eq!(tree.try_get_range(6), None);
    }

    #[test]
    fn test_sorted_permutes_read_indices() {
        let mesh = strip(8);
        let tree = PolyfaceRangeTree::create_for_polyface_sorted(&mesh, true, false, false);
        let order: Vec<usize> = (0..8).filter_map(|p| tree.try_get_read_index(p)).collect();
        // Facet 7 is leftmost
        assert_eq!(order, vec![7, 6, 5, 4, 3, 2, 1, 0]);
        for position in 0..8 {
            let read_index = tree.try_get_read_index(position).unwrap();
            let points = mesh.facet_points(read_index).unwrap();
            assert_eq!(tree.try_get_range(position), Some(Range3d::from_points(&points)));
        }
    }

    #[test]
    fn test_collect_in_range() {
        let mesh = strip(8);
        let tree = PolyfaceRangeTree::create_for_polyface_xy_sort(&mesh);
        let query = Range3d::new(Point3::new(4.2, 0.2, -1.0), Point3::new(4.8, 0.8, 1.0));
        // x in [4, 5] is facet 5 (reversed order)
        assert_eq!(tree.collect_in_range(&query, 0.0), vec![5]);

        let mut hits = tree.collect_in_range(&query, 1.5);
        hits.sort_unstable();
        assert_eq!(hits, vec![4, 5, 6]);
    }

    #[test]
    fn test_collect_by_depth_partitions_read_indices() {
        let mesh = strip(13);
        let tree = PolyfaceRangeTree::create_for_polyface_xy_sort(&mesh);
        for depth in 0..6 {
            let groups = tree.collect_read_indices_by_tree_depth(depth);
            let mut all: Vec<usize> = groups.into_iter().flatten().collect();
            all.sort_unstable();
            assert_eq!(all, (0..13).collect::<Vec<_>>());
        }
        assert_eq!(tree.collect_read_indices_by_tree_depth(0).len(), 1);
    }

    #[test]
    fn test_polygons_use_tags() {
        let polygons = vec![
            TaggedPolygon::new(
                vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
                42,
            ),
            TaggedPolygon::new(
                vec![
                    Point3::new(5.0, 0.0, 0.0),
                    Point3::new(6.0, 0.0, 0.0),
                    Point3::new(5.0, 1.0, 0.0),
                ],
                7,
            ),
        ];
        let tree = PolyfaceRangeTree::create_for_polygons(&polygons, true, true, true);
        let query = Range3d::new(Point3::new(5.5, 0.1, 0.0), Point3::new(5.6, 0.2, 0.0));
        assert_eq!(tree.collect_in_range(&query, 0.0), vec![7]);
    }

    #[test]
    fn test_empty_source() {
        let tree = PolyfaceRangeTree::create_for_polyface(&Polyface::new());
        assert!(tree.is_empty());
        assert!(tree.heap().is_empty());
        assert!(tree.collect_in_range(&Range3d::universe(), 0.0).is_empty());
        assert!(tree.collect_read_indices_by_tree_depth(2).is_empty());
    }

    #[test]
    fn test_ternary_for_polyface() {
        let mesh = strip(30);
        let tree = create_ternary_for_polyface(&mesh, 4);
        assert_eq!(tree.num_leaves(), 30);
        let query = Range3d::new(Point3::new(10.2, 0.2, 0.0), Point3::new(10.3, 0.3, 0.0));
        // x in [10, 11] is facet 24
        assert_eq!(tree.collect_in_range(&query, 0.0), vec![24]);
    }
}
