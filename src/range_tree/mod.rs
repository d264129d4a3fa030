// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Range trees - axis splitting, indexed heap, ternary tree and per-facet adapters

pub mod facet_tree;
pub mod heap;
pub mod splitter;
pub mod ternary;

pub use facet_tree::{create_ternary_for_polyface, PolyfaceRangeTree};
pub use heap::{
    IndexedRangeHeap, PairProcessor, RangeOverlapLeaves, RangeOverlapPairs, SingleProcessor,
};
pub use splitter::{best_axis_split, AxisPartition, AxisSplit, RangeSide};
pub use ternary::{TernaryRangeTree, SUBTREE_SPAN};

/// Maps a tree leaf position back to the facet read index it stands for
pub trait ReadIndexLookup: Sync {
    fn try_get_read_index(&self, leaf: usize) -> Option<usize>;
}
