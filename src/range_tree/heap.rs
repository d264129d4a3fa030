// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Implicit binary heap of ranges
//!
//! `k` leaf ranges are stored in a complete binary tree of exactly `2k - 1`
//! nodes. Node `i` has children `2i + 1` and `2i + 2`; every internal node
//! has two children and covers an inclusive span `[i0, i1]` of leaf indices.

use crate::geometry::Range3d;

/// Single-tree search callbacks
pub trait SingleProcessor {
    /// Whether to descend into a node covering leaves `[i0, i1]`
    fn need_processing(&mut self, range: &Range3d, i0: usize, i1: usize) -> bool;
    fn process(&mut self, leaf: usize);
    fn is_complete(&self) -> bool {
        false
    }
}

/// Dual-tree search callbacks
pub trait PairProcessor {
    /// Whether to descend into a pair of nodes
    fn need_processing(
        &mut self,
        range_a: &Range3d,
        a0: usize,
        a1: usize,
        range_b: &Range3d,
        b0: usize,
        b1: usize,
    ) -> bool;
    fn process(&mut self, leaf_a: usize, leaf_b: usize);
    /// Stop the search early
    fn is_complete(&self) -> bool {
        false
    }
}

/// Reports overlapping leaf pairs to a closure
pub struct RangeOverlapPairs<F> {
    callback: F,
}

impl<F: FnMut(usize, usize)> RangeOverlapPairs<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: FnMut(usize, usize)> PairProcessor for RangeOverlapPairs<F> {
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
        (self.callback)(leaf_a, leaf_b)
    }
}

/// Reports leaves overlapping a query range to a closure
pub struct RangeOverlapLeaves<F> {
    query: Range3d,
    callback: F,
}

impl<F: FnMut(usize)> RangeOverlapLeaves<F> {
    pub fn new(query: Range3d, callback: F) -> Self {
        Self { query, callback }
    }
}

impl<F: FnMut(usize)> SingleProcessor for RangeOverlapLeaves<F> {
    fn need_processing(&mut self, range: &Range3d, _i0: usize, _i1: usize) -> bool {
        range.intersects(&self.query)
    }

    fn process(&mut self, leaf: usize) {
        (self.callback)(leaf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeapNode {
    pub range: Range3d,
    pub i0: usize,
    pub i1: usize,
}

impl HeapNode {
    pub fn is_leaf(&self) -> bool {
        self.i0 == self.i1
    }

    pub fn leaf_count(&self) -> usize {
        self.i1 - self.i0 + 1
    }
}

/// Binary heap of leaf ranges
#[derive(Debug, Clone, Default)]
pub struct IndexedRangeHeap {
    nodes: Vec<HeapNode>,
    /// Node index of every leaf
    leaf_nodes: Vec<usize>,
}

impl IndexedRangeHeap {
    pub fn build(ranges: &[Range3d]) -> Self {
        Self::build_from(ranges.len(), |i| ranges[i])
    }

    /// Build over `count` leaves whose ranges come from `source`.
    /// Zero leaves gives an empty heap.
    pub fn build_from(count: usize, source: impl Fn(usize) -> Range3d) -> Self {
        if count == 0 {
            return Self::default();
        }
        let node_count = 2 * count - 1;

        // Leaves per node, bottom-up; node i is internal iff i < count - 1
        let mut leaves = vec![1usize; node_count];
        for i in (0..count - 1).rev() {
            leaves[i] = leaves[2 * i + 1] + leaves[2 * i + 2];
        }

        let mut heap = Self {
            nodes: vec![
                HeapNode {
                    range: Range3d::null(),
                    i0: 0,
                    i1: 0,
                };
                node_count
            ],
            leaf_nodes: vec![0; count],
        };
        heap.build_node(0, &source, 0, count - 1, &leaves);
        heap
    }

    /// Heap over `count` null leaves; only the node spans are meaningful.
    pub fn with_shape(count: usize) -> Self {
        Self::build_from(count, |_| Range3d::null())
    }

    fn build_node(
        &mut self,
        index: usize,
        source: &impl Fn(usize) -> Range3d,
        i0: usize,
        i1: usize,
        leaves: &[usize],
    ) -> Range3d {
        let range = if i0 == i1 {
            self.leaf_nodes[i0] = index;
            source(i0)
        } else {
            let split = i0 + leaves[2 * index + 1];
            let left = self.build_node(2 * index + 1, source, i0, split - 1, leaves);
            let right = self.build_node(2 * index + 2, source, split, i1, leaves);
            left.union(&right)
        };
        self.nodes[index] = HeapNode { range, i0, i1 };
        range
    }

    pub fn num_leaves(&self) -> usize {
        self.leaf_nodes.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Range of node `index`; `None` when out of range
    pub fn get(&self, index: usize) -> Option<Range3d> {
        self.nodes.get(index).map(|n| n.range)
    }

    pub fn node(&self, index: usize) -> Option<&HeapNode> {
        self.nodes.get(index)
    }

    pub fn node_span(&self, index: usize) -> Option<(usize, usize)> {
        self.nodes.get(index).map(|n| (n.i0, n.i1))
    }

    /// Range of leaf `leaf`
    pub fn leaf_range(&self, leaf: usize) -> Option<Range3d> {
        self.leaf_nodes.get(leaf).map(|&n| self.nodes[n].range)
    }

    pub fn left_child(&self, index: usize) -> Option<usize> {
        let child = 2 * index + 1;
        (child < self.nodes.len()).then_some(child)
    }

    pub fn right_child(&self, index: usize) -> Option<usize> {
        let child = 2 * index + 2;
        (child < self.nodes.len()).then_some(child)
    }

    pub fn depth_of(index: usize) -> usize {
        (usize::BITS - 1 - (index + 1).leading_zeros()) as usize
    }

    /// Nodes at `depth`, plus leaves that end above it, in leaf order.
    pub fn nodes_at_depth(&self, depth: usize) -> Vec<usize> {
        let mut out = Vec::new();
        if !self.is_empty() {
            self.collect_at_depth(0, depth, &mut out);
        }
        out
    }

    fn collect_at_depth(&self, index: usize, depth: usize, out: &mut Vec<usize>) {
        if Self::depth_of(index) == depth || self.nodes[index].is_leaf() {
            out.push(index);
            return;
        }
        self.collect_at_depth(2 * index + 1, depth, out);
        self.collect_at_depth(2 * index + 2, depth, out);
    }

    /// Single-tree search
    pub fn search(&self, processor: &mut impl SingleProcessor) {
        if !self.is_empty() {
            self.search_node(0, processor);
        }
    }

    fn search_node(&self, index: usize, processor: &mut impl SingleProcessor) {
        if processor.is_complete() {
            return;
        }
        let node = &self.nodes[index];
        if !processor.need_processing(&node.range, node.i0, node.i1) {
            return;
        }
        if node.is_leaf() {
            processor.process(node.i0);
        } else {
            self.search_node(2 * index + 1, processor);
            self.search_node(2 * index + 2, processor);
        }
    }

    /// Dual-tree search starting from every pair of nodes at `start_level`.
    pub fn search_pairs(
        heap_a: &Self,
        heap_b: &Self,
        processor: &mut impl PairProcessor,
        start_level: usize,
    ) {
        if heap_a.is_empty() || heap_b.is_empty() {
            return;
        }
        let starts_a = heap_a.nodes_at_depth(start_level);
        let starts_b = heap_b.nodes_at_depth(start_level);
        for &node_a in &starts_a {
            for &node_b in &starts_b {
                if processor.is_complete() {
                    return;
                }
                Self::search_pairs_from_nodes(heap_a, node_a, heap_b, node_b, processor);
            }
        }
    }

    /// Dual-tree search below one pair of nodes.
    pub fn search_pairs_from_nodes(
        heap_a: &Self,
        node_a: usize,
        heap_b: &Self,
        node_b: usize,
        processor: &mut impl PairProcessor,
    ) {
        if processor.is_complete() {
            return;
        }
        let (Some(a), Some(b)) = (heap_a.nodes.get(node_a), heap_b.nodes.get(node_b)) else {
            return;
        };
        if !processor.need_processing(&a.range, a.i0, a.i1, &b.range, b.i0, b.i1) {
            return;
        }
        match (a.is_leaf(), b.is_leaf()) {
            (true, true) => processor.process(a.i0, b.i0),
            (false, true) => {
                Self::descend_a(heap_a, node_a, heap_b, node_b, processor);
            }
            (true, false) => {
                Self::descend_b(heap_a, node_a, heap_b, node_b, processor);
            }
            (false, false) => {
                if a.leaf_count() >= b.leaf_count() {
                    Self::descend_a(heap_a, node_a, heap_b, node_b, processor);
                } else {
                    Self::descend_b(heap_a, node_a, heap_b, node_b, processor);
                }
            }
        }
    }

    fn descend_a(
        heap_a: &Self,
        node_a: usize,
        heap_b: &Self,
        node_b: usize,
        processor: &mut impl PairProcessor,
    ) {
        Self::search_pairs_from_nodes(heap_a, 2 * node_a + 1, heap_b, node_b, processor);
        Self::search_pairs_from_nodes(heap_a, 2 * node_a + 2, heap_b, node_b, processor);
    }

    fn descend_b(
        heap_a: &Self,
        node_a: usize,
        heap_b: &Self,
        node_b: usize,
        processor: &mut impl PairProcessor,
    ) {
        Self::search_pairs_from_nodes(heap_a, node_a, heap_b, 2 * node_b + 1, processor);
        Self::search_pairs_from_nodes(heap_a, node_a, heap_b, 2 * node_b + 2, processor);
    }

    /// Search a heap against itself. Each unordered pair of distinct leaves
    /// is offered once, as `(i, j)` with `i < j`.
    pub fn search_self_pairs(&self, processor: &mut impl PairProcessor) {
        if !self.is_empty() {
            self.search_self_node(0, processor);
        }
    }

    fn search_self_node(&self, index: usize, processor: &mut impl PairProcessor) {
        if self.nodes[index].is_leaf() || processor.is_complete() {
            return;
        }
        let (left, right) = (2 * index + 1, 2 * index + 2);
        self.search_self_node(left, processor);
        self.search_self_node(right, processor);
        // Left span precedes right span, so every leaf pair is ordered
        Self::search_pairs_from_nodes(self, left, self, right, processor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn unit_box(x: f64) -> Range3d {
        Range3d::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0))
    }

    #[test]
    fn test_shape_for_all_sizes() {
        for k in 1..40 {
            let ranges: Vec<Range3d> = (0..k).map(|i| unit_box(i as f64)).collect();
            let heap = IndexedRangeHeap::build(&ranges);
            assert_eq!(heap.num_nodes(), 2 * k - 1);
            assert_eq!(heap.num_leaves(), k);
            assert_eq!(heap.node_span(0), Some((0, k - 1)));

            for index in 0..heap.num_nodes() {
                let node = heap.node(index).unwrap();
                if let (Some(l), Some(r)) = (heap.left_child(index), heap.right_child(index)) {
                    let (left, right) = (heap.node(l).unwrap(), heap.node(r).unwrap());
                    assert_eq!(left.i0, node.i0);
                    assert_eq!(left.i1 + 1, right.i0);
                    assert_eq!(right.i1, node.i1);
                    assert_eq!(node.range, left.range.union(&right.range));
                } else {
                    assert!(node.is_leaf());
                    assert_eq!(node.range, ranges[node.i0]);
                }
            }
            for leaf in 0..k {
                assert_eq!(heap.leaf_range(leaf), Some(ranges[leaf]));
            }
        }
    }

    #[test]
    fn test_empty_heap_is_noop() {
        let heap = IndexedRangeHeap::build(&[]);
        assert!(heap.is_empty());
        assert_eq!(heap.get(0), None);
        let mut hits = Vec::new();
        heap.search(&mut RangeOverlapLeaves::new(Range3d::universe(), |leaf| hits.push(leaf)));
        IndexedRangeHeap::search_pairs(
            &heap,
            &heap,
            &mut RangeOverlapPairs::new(|a, b| hits.push(a + b)),
            0,
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn test_get_out_of_range() {
        let heap = IndexedRangeHeap::build(&[unit_box(0.0), unit_box(2.0)]);
        assert!(heap.get(2).is_some());
        assert!(heap.get(3).is_none());
        assert!(heap.leaf_range(2).is_none());
    }

    #[test]
    fn test_single_search() {
        let ranges: Vec<Range3d> = (0..17).map(|i| unit_box(2.0 * i as f64)).collect();
        let heap = IndexedRangeHeap::build(&ranges);
        let query = Range3d::new(Point3::new(3.5, 0.5, 0.5), Point3::new(8.5, 0.5, 0.5));
        let mut hits = Vec::new();
        heap.search(&mut RangeOverlapLeaves::new(query, |leaf| hits.push(leaf)));
        assert_eq!(hits, vec![2, 3, 4]);
    }

    #[test]
    fn test_pair_search_matches_brute_force_at_every_start_level() {
        let a: Vec<Range3d> = (0..13).map(|i| unit_box(1.5 * i as f64)).collect();
        let b: Vec<Range3d> = (0..9).map(|i| unit_box(2.2 * i as f64 + 0.3)).collect();
        let mut expected = Vec::new();
        for (i, ra) in a.iter().enumerate() {
            for (j, rb) in b.iter().enumerate() {
                if ra.intersects(rb) {
                    expected.push((i, j));
                }
            }
        }
        let heap_a = IndexedRangeHeap::build(&a);
        let heap_b = IndexedRangeHeap::build(&b);
        for level in 0..6 {
            let mut found = Vec::new();
            IndexedRangeHeap::search_pairs(
                &heap_a,
                &heap_b,
                &mut RangeOverlapPairs::new(|i, j| found.push((i, j))),
                level,
            );
            found.sort_unstable();
            assert_eq!(found, expected, "start level {level}");
        }
    }

    #[test]
    fn test_self_pairs_are_ordered_and_unique() {
        let ranges: Vec<Range3d> = (0..11).map(|i| unit_box(0.6 * i as f64)).collect();
        let heap = IndexedRangeHeap::build(&ranges);
        let mut found = Vec::new();
        heap.search_self_pairs(&mut RangeOverlapPairs::new(|i, j| found.push((i, j))));
        assert!(found.iter().all(|(i, j)| i < j));

        let mut expected = Vec::new();
        for i in 0..ranges.len() {
            for j in (i + 1)..ranges.len() {
                if ranges[i].intersects(&ranges[j]) {
                    expected.push((i, j));
                }
            }
        }
        found.sort_unstable();
        assert_eq!(found, expected);
    }

    struct FirstHit {
        hits: usize,
    }

    impl PairProcessor for FirstHit {
        fn need_processing(
            &mut self,
            a: &Range3d,
            _: usize,
            _: usize,
            b: &Range3d,
            _: usize,
            _: usize,
        ) -> bool {
            a.intersects(b)
        }

        fn process(&mut self, _: usize, _: usize) {
            self.hits += 1;
        }

        fn is_complete(&self) -> bool {
            self.hits > 0
        }
    }

    #[test]
    fn test_early_termination() {
        let ranges: Vec<Range3d> = (0..20).map(|_| unit_box(0.0)).collect();
        let heap = IndexedRangeHeap::build(&ranges);
        let mut processor = FirstHit { hits: 0 };
        IndexedRangeHeap::search_pairs(&heap, &heap, &mut processor, 2);
        assert_eq!(processor.hits, 1);
    }

    #[test]
    fn test_nodes_at_depth_partition_leaves() {
        let ranges: Vec<Range3d> = (0..10).map(|i| unit_box(i as f64)).collect();
        let heap = IndexedRangeHeap::build(&ranges);
        for depth in 0..6 {
            let nodes = heap.nodes_at_depth(depth);
            let covered: usize = nodes
                .iter()
                .map(|&n| heap.node(n).unwrap().leaf_count())
                .sum();
            assert_eq!(covered, 10);
        }
        assert_eq!(IndexedRangeHeap::depth_of(0), 0);
        assert_eq!(IndexedRangeHeap::depth_of(2), 1);
        assert_eq!(IndexedRangeHeap::depth_of(3), 2);
    }
}
