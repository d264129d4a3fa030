// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Intersection segments tagged with the facets that produced them

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// How a segment arose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentHistory {
    /// Crossing of two non-parallel facets
    Transverse,
    /// Boundary edge of the facet on mesh A, from a coplanar overlap
    EdgeOfA,
    /// Boundary edge of the facet on mesh B, from a coplanar overlap
    EdgeOfB,
}

/// A 3D segment tagged with its source facet on each mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaggedSegment {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
    pub read_index_a: usize,
    pub read_index_b: usize,
    pub history: SegmentHistory,
}

impl TaggedSegment {
    pub fn new(
        start: Point3<f64>,
        end: Point3<f64>,
        read_index_a: usize,
        read_index_b: usize,
        history: SegmentHistory,
    ) -> Self {
        Self {
            start,
            end,
            read_index_a,
            read_index_b,
            history,
        }
    }

    /// Same segment seen from the other mesh
    pub fn swapped(&self) -> Self {
        let history = match self.history {
            SegmentHistory::Transverse => SegmentHistory::Transverse,
            SegmentHistory::EdgeOfA => SegmentHistory::EdgeOfB,
            SegmentHistory::EdgeOfB => SegmentHistory::EdgeOfA,
        };
        Self {
            read_index_a: self.read_index_b,
            read_index_b: self.read_index_a,
            history,
            ..*self
        }
    }

    /// Read index on mesh A when `by_tag_a`, else on mesh B
    pub fn tag(&self, by_tag_a: bool) -> usize {
        if by_tag_a {
            self.read_index_a
        } else {
            self.read_index_b
        }
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }
}
