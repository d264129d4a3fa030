// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Per-facet re-triangulation along imprinted segments
//!
//! Segments are grouped by the read index of the facet they cut. Each facet
//! with incident segments is moved into its own plane, split by the face
//! splitter and mapped back; every other facet is copied unchanged.

use super::segment::TaggedSegment;
use crate::geometry::{
    FaceSplitter, FacetVisitor, LocalFrame, PlanarGraphSplitter, Polyface, PolyfaceBuilder,
    PolyfaceConstruction, PolyfaceQuery, Range3d,
};
use log::{debug, warn};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Snap distance factor for mapping split vertices back to known points
const SNAP_FACTOR: f64 = 1.0e-9;

/// Facet counts from one split pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStats {
    /// Facets without segments, copied as-is
    pub copied: usize,
    /// Facets replaced by split faces
    pub split: usize,
    /// Facets with segments that had to be copied as-is
    pub fallback: usize,
    /// Polygons emitted to the builder
    pub emitted: usize,
}

impl SplitStats {
    pub fn absorb(&mut self, other: &SplitStats) {
        self.copied += other.copied;
        self.split += other.split;
        self.fallback += other.fallback;
        self.emitted += other.emitted;
    }
}

/// Splits facets of one mesh along the segments that cut them.
pub struct FacetSplitProcessor<'a> {
    splitter: &'a dyn FaceSplitter,
    max_vertices: usize,
}

impl<'a> FacetSplitProcessor<'a> {
    pub fn new(splitter: &'a dyn FaceSplitter, max_vertices: usize) -> Self {
        Self {
            splitter,
            max_vertices: max_vertices.max(3),
        }
    }

    /// Emit every facet of `source` into `builder`, split along the segments
    /// tagged with its read index. Segments are stable-sorted by the tag of
    /// side A (`by_tag_a`) or side B first.
    pub fn process_by_tag<Q: PolyfaceQuery + ?Sized>(
        &self,
        builder: &mut dyn PolyfaceConstruction,
        source: &Q,
        segments: &mut [TaggedSegment],
        by_tag_a: bool,
    ) -> SplitStats {
        segments.sort_by_key(|s| s.tag(by_tag_a));

        let mut stats = SplitStats::default();
        let mut cursor = 0;
        let mut visitor = FacetVisitor::new(source);
        while visitor.advance() {
            let Some(read_index) = visitor.read_index() else {
                continue;
            };
            while cursor < segments.len() && segments[cursor].tag(by_tag_a) < read_index {
                cursor += 1;
            }
            let start = cursor;
            while cursor < segments.len() && segments[cursor].tag(by_tag_a) == read_index {
                cursor += 1;
            }
            let run = &segments[start..cursor];
            let points = visitor.points();

            if run.is_empty() {
                stats.copied += 1;
                stats.emitted += usize::from(builder.add_polygon(points));
                continue;
            }
            match self.split_facet(points, run) {
                Some(faces) => {
                    stats.split += 1;
                    for face in &faces {
                        stats.emitted += usize::from(builder.add_polygon(face));
                    }
                }
                None => {
                    debug!("Facet {} kept unsplit ({} segments)", read_index, run.len());
                    stats.fallback += 1;
                    stats.emitted += usize::from(builder.add_polygon(points));
                }
            }
        }

        if stats.fallback > 0 {
            warn!(
                "{} of {} cut facets could not be split and were copied",
                stats.fallback,
                stats.split + stats.fallback
            );
        }
        stats
    }

    /// Split faces of one facet in world coordinates, `None` to keep it.
    fn split_facet(
        &self,
        points: &[Point3<f64>],
        segments: &[TaggedSegment],
    ) -> Option<Vec<Vec<Point3<f64>>>> {
        let frame = LocalFrame::from_polygon(points)?;
        let boundary: Vec<Point2<f64>> = points.iter().map(|p| frame.to_local_xy(p)).collect();
        let edges: Vec<(Point2<f64>, Point2<f64>)> = segments
            .iter()
            .map(|s| (frame.to_local_xy(&s.start), frame.to_local_xy(&s.end)))
            .collect();

        let faces = self
            .splitter
            .split_faces(&boundary, &edges, self.max_vertices)?;
        if faces.is_empty() {
            return None;
        }

        // Known points in both frames, used to undo projection round-off
        let mut known: Vec<(Point2<f64>, Point3<f64>)> =
            boundary.iter().copied().zip(points.iter().copied()).collect();
        for (segment, (a, b)) in segments.iter().zip(&edges) {
            known.push((*a, segment.start));
            known.push((*b, segment.end));
        }
        let snap = SNAP_FACTOR * Range3d::from_points(points).diagonal();

        Some(
            faces
                .iter()
                .map(|face| {
                    face.iter()
                        .map(|p| {
                            known
                                .iter()
                                .find(|(local, _)| (local - p).norm() <= snap)
                                .map(|(_, world)| *world)
                                .unwrap_or_else(|| frame.to_world(p))
                        })
                        .collect()
                })
                .collect(),
        )
    }
}

/// Copy the facets of `source`, split along `segments`, into a new mesh.
pub fn copy_facets_with_segment_split_imprint<Q: PolyfaceQuery + ?Sized>(
    source: &Q,
    segments: &[TaggedSegment],
    by_tag_a: bool,
    max_vertices: usize,
) -> Polyface {
    let splitter = PlanarGraphSplitter::default();
    let processor = FacetSplitProcessor::new(&splitter, max_vertices);
    let mut builder = PolyfaceBuilder::new();
    let mut segments = segments.to_vec();
    processor.process_by_tag(&mut builder, source, &mut segments, by_tag_a);
    builder.finish()
}
