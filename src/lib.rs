// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyface imprint kernel
//!
//! Range-tree search for intersecting facet pairs between polygon meshes,
//! imprinting of the intersection segments onto both meshes, and stitching
//! of the result into shells classified by volume sign.

pub mod config;
pub mod error;
pub mod geometry;
pub mod imprint;
pub mod range_tree;

pub use config::{BroadPhase, IntersectionConfig};
pub use error::{ConfigError, PolyfaceError, Result};
pub use geometry::{Polyface, PolyfaceBuilder, PolyfaceQuery, Primitive, Range3d, TaggedPolygon};
pub use imprint::{ImprintEngine, ImprintReport, SegmentHistory, TaggedSegment, VolumeSignBuckets};
pub use range_tree::{IndexedRangeHeap, PolyfaceRangeTree, TernaryRangeTree};
