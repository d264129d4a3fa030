// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Ternary range tree
//!
//! Ranges are preloaded onto the root, then distributed in one batch pass.
//! A crowded node is split on one axis into ranges left of the cut, ranges
//! straddling it (mid) and ranges right of it. The mid child may not split
//! on that axis again, since all of its ranges straddle the same cut.

use super::heap::PairProcessor;
use super::splitter::{partition_on_axis, AxisPartition, RangeSide};
use crate::geometry::Range3d;

/// Span passed to [`PairProcessor::need_processing`] for a whole subtree.
/// Leaves are passed as `(leaf, leaf)`.
pub const SUBTREE_SPAN: (usize, usize) = (0, usize::MAX);

const ALL_AXES_BLOCKED: u8 = 0b111;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TernaryLeaf {
    pub range: Range3d,
    pub tag: usize,
    next: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TernaryNode {
    /// Union of every range in the subtree
    pub union: Range3d,
    /// Intersection of the primary list ranges; the universe when empty
    pub intersection: Range3d,
    first: Option<usize>,
    last: Option<usize>,
    count: usize,
    pub left: Option<usize>,
    pub mid: Option<usize>,
    pub right: Option<usize>,
    /// Bit `a` set when axis `a` may not split this node
    pub blocked: u8,
    pub depth: usize,
}

impl TernaryNode {
    fn new(blocked: u8, depth: usize) -> Self {
        Self {
            union: Range3d::null(),
            intersection: Range3d::universe(),
            first: None,
            last: None,
            count: 0,
            left: None,
            mid: None,
            right: None,
            blocked,
            depth,
        }
    }

    fn children(&self) -> impl Iterator<Item = usize> {
        [self.left, self.mid, self.right].into_iter().flatten()
    }
}

/// Three-way range tree over an arena of nodes and leaves
#[derive(Debug, Clone)]
pub struct TernaryRangeTree {
    nodes: Vec<TernaryNode>,
    leaves: Vec<TernaryLeaf>,
}

impl Default for TernaryRangeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TernaryRangeTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![TernaryNode::new(0, 0)],
            leaves: Vec::new(),
        }
    }

    /// Append a range to the root primary list; returns its leaf id
    pub fn preload(&mut self, range: Range3d, tag: usize) -> usize {
        let leaf = self.leaves.len();
        self.leaves.push(TernaryLeaf {
            range,
            tag,
            next: None,
        });
        self.attach(0, leaf);
        leaf
    }

    fn attach(&mut self, node: usize, leaf: usize) {
        let range = self.leaves[leaf].range;
        self.leaves[leaf].next = None;
        let last = self.nodes[node].last;
        match last {
            Some(last) => self.leaves[last].next = Some(leaf),
            None => self.nodes[node].first = Some(leaf),
        }
        let n = &mut self.nodes[node];
        n.last = Some(leaf);
        n.count += 1;
        n.union.extend_range(&range);
        n.intersection = n.intersection.intersection(&range);
    }

    fn take_primary(&mut self, node: usize) -> Vec<usize> {
        let leaves = self.primary_leaves(node).collect();
        let n = &mut self.nodes[node];
        n.first = None;
        n.last = None;
        n.count = 0;
        n.intersection = Range3d::universe();
        leaves
    }

    /// Leaf ids on the primary list of `node`
    pub fn primary_leaves(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        let mut cursor = self.nodes.get(node).and_then(|n| n.first);
        std::iter::from_fn(move || {
            let leaf = cursor?;
            cursor = self.leaves[leaf].next;
            Some(leaf)
        })
    }

    /// Split every node holding more than `max_per_node` ranges.
    pub fn distribute_preloads(&mut self, max_per_node: usize) {
        self.distribute_node(0, max_per_node.max(1));
    }

    fn distribute_node(&mut self, node: usize, max_per_node: usize) {
        let blocked = self.nodes[node].blocked;
        if self.nodes[node].count <= max_per_node || blocked == ALL_AXES_BLOCKED {
            return;
        }
        let leaf_ids: Vec<usize> = self.primary_leaves(node).collect();
        let ranges: Vec<Range3d> = leaf_ids.iter().map(|&l| self.leaves[l].range).collect();

        let mut candidates: Vec<AxisPartition> = (0..3)
            .filter(|axis| blocked & (1 << axis) == 0)
            .filter_map(|axis| partition_on_axis(&ranges, axis))
            .collect();
        // Heaviest first; stable sort keeps axis order on ties
        candidates.sort_by(|a, b| b.split.weight.total_cmp(&a.split.weight));
        let count = ranges.len();
        let Some(partition) = candidates.into_iter().find(|p| {
            let s = &p.split;
            s.num_left != count && s.num_right != count
        }) else {
            return;
        };

        let axis_bit = 1u8 << partition.split.axis;
        let depth = self.nodes[node].depth + 1;
        let moved = self.take_primary(node);
        debug_assert_eq!(moved, leaf_ids);

        for (leaf, side) in leaf_ids.iter().zip(&partition.sides) {
            let child = match side {
                RangeSide::Left => self.nodes[node].left,
                RangeSide::In => self.nodes[node].mid,
                RangeSide::Right => self.nodes[node].right,
            };
            let child = child.unwrap_or_else(|| {
                let mask = if *side == RangeSide::In {
                    blocked | axis_bit
                } else {
                    blocked
                };
                let index = self.nodes.len();
                self.nodes.push(TernaryNode::new(mask, depth));
                match side {
                    RangeSide::Left => self.nodes[node].left = Some(index),
                    RangeSide::In => self.nodes[node].mid = Some(index),
                    RangeSide::Right => self.nodes[node].right = Some(index),
                }
                index
            });
            self.attach(child, *leaf);
        }

        let children: Vec<usize> = self.nodes[node].children().collect();
        for child in children {
            self.distribute_node(child, max_per_node);
        }
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn left_child(&self, node: usize) -> Option<usize> {
        self.nodes.get(node).and_then(|n| n.left)
    }

    pub fn mid_child(&self, node: usize) -> Option<usize> {
        self.nodes.get(node).and_then(|n| n.mid)
    }

    pub fn right_child(&self, node: usize) -> Option<usize> {
        self.nodes.get(node).and_then(|n| n.right)
    }

    pub fn node(&self, node: usize) -> Option<&TernaryNode> {
        self.nodes.get(node)
    }

    pub fn node_union(&self, node: usize) -> Option<Range3d> {
        self.nodes.get(node).map(|n| n.union)
    }

    pub fn node_intersection(&self, node: usize) -> Option<Range3d> {
        self.nodes.get(node).map(|n| n.intersection)
    }

    pub fn primary_count(&self, node: usize) -> usize {
        self.nodes.get(node).map_or(0, |n| n.count)
    }

    pub fn blocked_axes(&self, node: usize) -> u8 {
        self.nodes.get(node).map_or(0, |n| n.blocked)
    }

    pub fn depth_of(&self, node: usize) -> Option<usize> {
        self.nodes.get(node).map(|n| n.depth)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    pub fn try_get_tag(&self, leaf: usize) -> Option<usize> {
        self.leaves.get(leaf).map(|l| l.tag)
    }

    pub fn leaf_range(&self, leaf: usize) -> Option<Range3d> {
        self.leaves.get(leaf).map(|l| l.range)
    }

    /// Append `(range, tag)` for the primary list of `node`, or for its whole
    /// subtree when `recurse` is set.
    pub fn get_ranges_in_node(&self, node: usize, recurse: bool, out: &mut Vec<(Range3d, usize)>) {
        if node >= self.nodes.len() {
            return;
        }
        out.extend(
            self.primary_leaves(node)
                .map(|l| (self.leaves[l].range, self.leaves[l].tag)),
        );
        if recurse {
            for child in self.nodes[node].children() {
                self.get_ranges_in_node(child, true, out);
            }
        }
    }

    /// Tags of ranges overlapping `query` grown by `expansion`.
    pub fn collect_in_range(&self, query: &Range3d, expansion: f64) -> Vec<usize> {
        let query = query.expanded(expansion);
        let mut hits = Vec::new();
        self.collect_node(0, &query, &mut hits);
        hits
    }

    fn collect_node(&self, node: usize, query: &Range3d, hits: &mut Vec<usize>) {
        let n = &self.nodes[node];
        if !n.union.intersects(query) {
            return;
        }
        hits.extend(
            self.primary_leaves(node)
                .filter(|&l| self.leaves[l].range.intersects(query))
                .map(|l| self.leaves[l].tag),
        );
        for child in n.children() {
            self.collect_node(child, query, hits);
        }
    }

    /// Dual-tree search. `process` receives leaf ids; map them with
    /// [`TernaryRangeTree::try_get_tag`].
    pub fn search_pairs(tree_a: &Self, tree_b: &Self, processor: &mut impl PairProcessor) {
        if tree_a.leaves.is_empty() || tree_b.leaves.is_empty() {
            return;
        }
        Self::pair_nodes(tree_a, 0, tree_b, 0, processor);
    }

    fn pair_nodes(
        tree_a: &Self,
        node_a: usize,
        tree_b: &Self,
        node_b: usize,
        processor: &mut impl PairProcessor,
    ) {
        if processor.is_complete() {
            return;
        }
        let (a, b) = (&tree_a.nodes[node_a], &tree_b.nodes[node_b]);
        let (s0, s1) = SUBTREE_SPAN;
        if !processor.need_processing(&a.union, s0, s1, &b.union, s0, s1) {
            return;
        }
        // Primary leaves of A against the whole B subtree
        for leaf_a in tree_a.primary_leaves(node_a) {
            Self::leaf_vs_subtree(tree_a, leaf_a, tree_b, node_b, processor);
        }
        // Primary leaves of B against A's child subtrees
        for leaf_b in tree_b.primary_leaves(node_b) {
            for child_a in a.children() {
                Self::subtree_vs_leaf(tree_a, child_a, tree_b, leaf_b, processor);
            }
        }
        for child_a in a.children() {
            for child_b in b.children() {
                Self::pair_nodes(tree_a, child_a, tree_b, child_b, processor);
            }
        }
    }

    fn leaf_vs_subtree(
        tree_a: &Self,
        leaf_a: usize,
        tree_b: &Self,
        node_b: usize,
        processor: &mut impl PairProcessor,
    ) {
        if processor.is_complete() {
            return;
        }
        let range_a = tree_a.leaves[leaf_a].range;
        let b = &tree_b.nodes[node_b];
        let (s0, s1) = SUBTREE_SPAN;
        if !processor.need_processing(&range_a, leaf_a, leaf_a, &b.union, s0, s1) {
            return;
        }
        for leaf_b in tree_b.primary_leaves(node_b) {
            let range_b = tree_b.leaves[leaf_b].range;
            if processor.need_processing(&range_a, leaf_a, leaf_a, &range_b, leaf_b, leaf_b) {
                processor.process(leaf_a, leaf_b);
            }
        }
        for child_b in b.children() {
            Self::leaf_vs_subtree(tree_a, leaf_a, tree_b, child_b, processor);
        }
    }

    fn subtree_vs_leaf(
        tree_a: &Self,
        node_a: usize,
        tree_b: &Self,
        leaf_b: usize,
        processor: &mut impl PairProcessor,
    ) {
        if processor.is_complete() {
            return;
        }
        let range_b = tree_b.leaves[leaf_b].range;
        let a = &tree_a.nodes[node_a];
        let (s0, s1) = SUBTREE_SPAN;
        if !processor.need_processing(&a.union, s0, s1, &range_b, leaf_b, leaf_b) {
            return;
        }
        for leaf_a in tree_a.primary_leaves(node_a) {
            let range_a = tree_a.leaves[leaf_a].range;
            if processor.need_processing(&range_a, leaf_a, leaf_a, &range_b, leaf_b, leaf_b) {
                processor.process(leaf_a, leaf_b);
            }
        }
        for child_a in a.children() {
            Self::subtree_vs_leaf(tree_a, child_a, tree_b, leaf_b, processor);
        }
    }
}
