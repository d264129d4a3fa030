// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Imprint pipeline - pair testing, facet splitting and shell classification

pub mod closest;
mod engine;
pub mod pair_tester;
pub mod search;
mod segment;
pub mod split;
pub mod volumes;

pub use closest::{
    search_closest_approach, search_closest_approach_to_linestring, ClosestApproach,
};
pub use engine::{ImprintEngine, ImprintReport, ImprintResult, VolumeResult};
pub use pair_tester::{PairStats, PairTester};
pub use search::{
    search_intersection_segments, search_intersection_segments_parallel,
    search_self_intersection_segments, SegmentSearch,
};
pub use segment::{SegmentHistory, TaggedSegment};
pub use split::{copy_facets_with_segment_split_imprint, FacetSplitProcessor, SplitStats};
pub use volumes::{
    merge_and_collect_volumes, merge_and_collect_volumes_multi, merge_and_collect_volumes_with,
    select_meshes_by_volume_sign, signed_volume, stitch_and_collect_volumes_from_imprinted_mesh,
    MergedVolumes, VolumeSignBuckets,
};
