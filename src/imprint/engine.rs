// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Imprint engine: configured entry points over the whole pipeline

use super::closest::{
    search_closest_approach, search_closest_approach_to_linestring, ClosestApproach,
};
use super::pair_tester::PairStats;
use super::search::{
    search_intersection_segments, search_intersection_segments_parallel,
    search_self_intersection_segments, SegmentSearch,
};
use super::segment::TaggedSegment;
use super::split::{FacetSplitProcessor, SplitStats};
use super::volumes::{
    select_meshes_by_volume_sign, stitch_and_collect_volumes_from_imprinted_mesh,
    VolumeSignBuckets,
};
use crate::config::{BroadPhase, IntersectionConfig};
use crate::error::{PolyfaceError, Result};
use crate::geometry::{
    FaceSplitter, PlanarGraphSplitter, PlanarPolygonIntersector, PolygonIntersector, Polyface,
    PolyfaceBuilder,
};
use log::info;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Summary of one engine run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImprintReport {
    pub pairs: PairStats,
    pub segments: usize,
    pub split_a: SplitStats,
    pub split_b: SplitStats,
    pub positive_shells: usize,
    pub zero_shells: usize,
    pub negative_shells: usize,
    pub elapsed_ms: f64,
}

impl ImprintReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Both meshes with their facets split along the shared segments
#[derive(Debug, Clone)]
pub struct ImprintResult {
    pub imprinted_a: Polyface,
    pub imprinted_b: Polyface,
    pub segments: Vec<TaggedSegment>,
    pub report: ImprintReport,
}

/// Shells of two merged meshes, bucketed by volume sign
#[derive(Debug, Clone)]
pub struct VolumeResult {
    pub shells: VolumeSignBuckets,
    pub report: ImprintReport,
}

/// Intersection pipeline with its collaborators and configuration
pub struct ImprintEngine {
    config: IntersectionConfig,
    intersector: Box<dyn PolygonIntersector>,
    splitter: Box<dyn FaceSplitter>,
}

impl ImprintEngine {
    /// Engine with the default intersector and splitter
    pub fn new(config: IntersectionConfig) -> Result<Self> {
        config.validate()?;
        let intersector = PlanarPolygonIntersector::new(config.parallel_tolerance);
        Ok(Self {
            config,
            intersector: Box::new(intersector),
            splitter: Box::new(PlanarGraphSplitter::default()),
        })
    }

    pub fn with_intersector(mut self, intersector: Box<dyn PolygonIntersector>) -> Self {
        self.intersector = intersector;
        self
    }

    pub fn with_splitter(mut self, splitter: Box<dyn FaceSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn config(&self) -> &IntersectionConfig {
        &self.config
    }

    /// Intersection segments between facets of `a` and `b`
    pub fn search_intersection_segments(
        &self,
        a: &Polyface,
        b: &Polyface,
    ) -> Result<SegmentSearch> {
        a.validate()?;
        b.validate()?;
        Ok(self.search_unchecked(a, b))
    }

    fn search_unchecked(&self, a: &Polyface, b: &Polyface) -> SegmentSearch {
        let intersector = self.intersector.as_ref();
        match (self.config.parallel_depth, self.config.broad_phase) {
            (Some(depth), BroadPhase::IndexedHeap) => {
                search_intersection_segments_parallel(a, b, intersector, &self.config, depth)
            }
            _ => search_intersection_segments(a, b, intersector, &self.config),
        }
    }

    /// Segments between distinct facets of one mesh
    pub fn search_self_intersection_segments(&self, mesh: &Polyface) -> Result<SegmentSearch> {
        mesh.validate()?;
        Ok(search_self_intersection_segments(
            mesh,
            self.intersector.as_ref(),
            &self.config,
        ))
    }

    /// Split the facets of each mesh along the segments it shares with the other
    pub fn imprint(&self, a: &Polyface, b: &Polyface) -> Result<ImprintResult> {
        a.validate()?;
        b.validate()?;
        let start = Instant::now();
        let search = self.search_unchecked(a, b);
        let mut segments = search.segments;
        let processor =
            FacetSplitProcessor::new(self.splitter.as_ref(), self.config.max_vertices_per_face);

        let mut builder_a = PolyfaceBuilder::new();
        let split_a = processor.process_by_tag(&mut builder_a, a, &mut segments, true);
        let mut builder_b = PolyfaceBuilder::new();
        let split_b = processor.process_by_tag(&mut builder_b, b, &mut segments, false);

        let report = ImprintReport {
            pairs: search.stats,
            segments: segments.len(),
            split_a,
            split_b,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            ..Default::default()
        };
        info!(
            "Imprinted {} segments: {} + {} facets split",
            report.segments, split_a.split, split_b.split
        );
        Ok(ImprintResult {
            imprinted_a: builder_a.finish(),
            imprinted_b: builder_b.finish(),
            segments,
            report,
        })
    }

    /// Imprint both meshes, merge them, stitch shells and bucket them by
    /// volume sign
    pub fn merge_and_collect_volumes(&self, a: &Polyface, b: &Polyface) -> Result<VolumeResult> {
        let start = Instant::now();
        let imprint = self.imprint(a, b)?;
        let mut merged = imprint.imprinted_a;
        merged.merge(&imprint.imprinted_b);

        let shells = stitch_and_collect_volumes_from_imprinted_mesh(
            &merged,
            self.config.weld_tolerance_factor,
        );
        let shells = select_meshes_by_volume_sign(shells, self.config.volume_tolerance_factor);
        let report = ImprintReport {
            positive_shells: shells.positive.len(),
            zero_shells: shells.zero.len(),
            negative_shells: shells.negative.len(),
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            ..imprint.report
        };
        info!(
            "Collected {} shells ({} positive) in {:.2}ms",
            shells.len(),
            report.positive_shells,
            report.elapsed_ms
        );
        Ok(VolumeResult { shells, report })
    }

    /// Bucket meshes by volume sign with the configured tolerance
    pub fn select_meshes_by_volume_sign(&self, meshes: Vec<Polyface>) -> Result<VolumeSignBuckets> {
        for mesh in &meshes {
            mesh.validate()?;
        }
        Ok(select_meshes_by_volume_sign(
            meshes,
            self.config.volume_tolerance_factor,
        ))
    }

    pub fn search_closest_approach(
        &self,
        a: &Polyface,
        b: &Polyface,
        max_distance: f64,
    ) -> Result<Option<ClosestApproach>> {
        a.validate()?;
        b.validate()?;
        Ok(search_closest_approach(a, b, max_distance))
    }

    /// Shortest segment from a facet of `mesh` to the linestring `points`
    pub fn search_closest_approach_to_linestring(
        &self,
        mesh: &Polyface,
        points: &[Point3<f64>],
    ) -> Result<Option<ClosestApproach>> {
        mesh.validate()?;
        let non_finite = points
            .iter()
            .position(|p| !p.coords.iter().all(|c| c.is_finite()));
        if let Some(index) = non_finite {
            return Err(PolyfaceError::NonFinitePoint { index });
        }
        Ok(search_closest_approach_to_linestring(mesh, points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = IntersectionConfig {
            max_vertices_per_face: 2,
            ..Default::default()
        };
        let err = ImprintEngine::new(config).err();
        assert_eq!(
            err,
            Some(PolyfaceError::Config(ConfigError::MaxVerticesTooSmall(2)))
        );
    }

    #[test]
    fn test_invalid_mesh_is_rejected() {
        let engine = ImprintEngine::new(IntersectionConfig::default()).unwrap();
        let good = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_polyface();
        let mut bad = good.clone();
        bad.add_facet(vec![0, 1]);
        assert_eq!(
            engine.imprint(&good, &bad).err(),
            Some(PolyfaceError::FacetTooSmall { facet: 6, count: 2 })
        );
    }

    #[test]
    fn test_imprint_report() {
        let engine = ImprintEngine::new(IntersectionConfig::default()).unwrap();
        let a = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), false).to_polyface();
        let b =
            Primitive::block(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 3.0, 3.0)).to_polyface();

        let result = engine.merge_and_collect_volumes(&a, &b).unwrap();
        assert_eq!(result.report.segments, 6);
        assert_eq!(result.report.split_a.split, 3);
        assert_eq!(result.report.split_a.copied, 3);
        assert_eq!(result.report.positive_shells, 1);

        let json = result.report.to_json().unwrap();
        let back: ImprintReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result.report);
    }

    #[test]
    fn test_parallel_depth_gives_same_segments() {
        let a = Primitive::sphere(1.0, 10).to_polyface();
        let mut b = Primitive::sphere(1.0, 10).to_polyface();
        b.translate(&Vector3::new(0.5, 0.2, 0.1));

        let sequential = ImprintEngine::new(IntersectionConfig::default()).unwrap();
        let parallel = ImprintEngine::new(IntersectionConfig {
            parallel_depth: Some(3),
            ..Default::default()
        })
        .unwrap();
        let s = sequential.search_intersection_segments(&a, &b).unwrap();
        let p = parallel.search_intersection_segments(&a, &b).unwrap();
        assert_eq!(s.segments.len(), p.segments.len());
        assert_eq!(s.stats, p.stats);
    }

    struct RefusingSplitter;

    impl FaceSplitter for RefusingSplitter {
        fn split_faces(
            &self,
            _boundary: &[nalgebra::Point2<f64>],
            _edges: &[(nalgebra::Point2<f64>, nalgebra::Point2<f64>)],
            _max_vertices: usize,
        ) -> Option<Vec<Vec<nalgebra::Point2<f64>>>> {
            None
        }
    }

    struct BlindIntersector;

    impl PolygonIntersector for BlindIntersector {
        fn intersect(
            &self,
            _a: &[Point3<f64>],
            _b: &[Point3<f64>],
        ) -> crate::geometry::PolygonIntersection {
            Default::default()
        }
    }

    #[test]
    fn test_custom_collaborators() {
        let a = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), false).to_polyface();
        let b =
            Primitive::block(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 3.0, 3.0)).to_polyface();

        let engine = ImprintEngine::new(IntersectionConfig::default())
            .unwrap()
            .with_splitter(Box::new(RefusingSplitter));
        let result = engine.imprint(&a, &b).unwrap();
        assert_eq!(result.report.segments, 6);
        assert_eq!(result.report.split_a.split, 0);
        assert_eq!(result.report.split_a.fallback, 3);
        assert_eq!(result.imprinted_a.facet_count(), a.facet_count());

        let engine = ImprintEngine::new(IntersectionConfig::default())
            .unwrap()
            .with_intersector(Box::new(BlindIntersector));
        let search = engine.search_intersection_segments(&a, &b).unwrap();
        assert!(search.segments.is_empty());
        assert_eq!(search.stats.pairs_tested, search.stats.pairs_rejected);
    }

    #[test]
    fn test_closest_approach_to_linestring() {
        let engine = ImprintEngine::new(IntersectionConfig::default()).unwrap();
        let cube = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_polyface();
        let path = [Point3::new(3.0, 0.5, 0.5), Point3::new(3.0, 0.5, 4.0)];
        let approach = engine
            .search_closest_approach_to_linestring(&cube, &path)
            .unwrap()
            .unwrap();
        assert!((approach.distance - 2.0).abs() < 1e-12);

        let bad = [Point3::new(0.0, 0.0, 0.0), Point3::new(f64::NAN, 0.0, 0.0)];
        assert_eq!(
            engine.search_closest_approach_to_linestring(&cube, &bad).err(),
            Some(PolyfaceError::NonFinitePoint { index: 1 })
        );
    }
}
