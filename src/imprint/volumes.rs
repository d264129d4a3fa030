// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Shell extraction and volume sign classification

use super::search::search_intersection_segments;
use super::split::{FacetSplitProcessor, SplitStats};
use crate::config::IntersectionConfig;
use crate::geometry::halfedge::weld_points;
use crate::geometry::{
    FaceSplitter, HalfEdgeMesh, PolygonIntersector, Polyface, PolyfaceBuilder,
    PolyfaceConstruction, PolyfaceQuery, Range3d,
};
use log::{debug, warn};
use nalgebra::Point3;
use rayon::prelude::*;

/// Signed volume enclosed by the facets, measured from `origin`.
/// Positive for closed shells with outward facets.
pub fn signed_volume(mesh: &Polyface, origin: &Point3<f64>) -> f64 {
    let mut six_volume = 0.0;
    let mut points = Vec::new();
    for read_index in 0..mesh.facet_count() {
        if !mesh.load_facet(read_index, &mut points) || points.len() < 3 {
            continue;
        }
        let p0 = points[0] - origin;
        for pair in points[1..].windows(2) {
            six_volume += p0.dot(&(pair[0] - origin).cross(&(pair[1] - origin)));
        }
    }
    six_volume / 6.0
}

/// Shells bucketed by the sign of their volume
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeSignBuckets {
    pub negative: Vec<Polyface>,
    pub zero: Vec<Polyface>,
    pub positive: Vec<Polyface>,
}

impl VolumeSignBuckets {
    pub fn len(&self) -> usize {
        self.negative.len() + self.zero.len() + self.positive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bucket shells by volume sign. Volumes are measured from the low corner of
/// the union range; a volume within `diagonal^3 * volume_tolerance_factor`
/// of zero counts as zero.
pub fn select_meshes_by_volume_sign(
    meshes: Vec<Polyface>,
    volume_tolerance_factor: f64,
) -> VolumeSignBuckets {
    let mut range = Range3d::null();
    for mesh in &meshes {
        range.extend_range(&mesh.range());
    }
    let mut buckets = VolumeSignBuckets::default();
    if range.is_null() {
        buckets.zero = meshes;
        return buckets;
    }
    let origin = range.low;
    let tol = range.diagonal().powi(3) * volume_tolerance_factor;

    for mesh in meshes {
        let volume = signed_volume(&mesh, &origin);
        if volume > tol {
            buckets.positive.push(mesh);
        } else if volume < -tol {
            buckets.negative.push(mesh);
        } else {
            buckets.zero.push(mesh);
        }
    }
    buckets
}

/// Weld the imprinted mesh and split it into connected shells, one
/// [`Polyface`] per component of facets joined across shared edges.
pub fn stitch_and_collect_volumes_from_imprinted_mesh(
    mesh: &Polyface,
    weld_tolerance_factor: f64,
) -> Vec<Polyface> {
    let range = mesh.range();
    if mesh.facets.is_empty() || range.is_null() {
        return Vec::new();
    }
    let (map, welded) = weld_points(&mesh.points, range.diagonal() * weld_tolerance_factor);

    let mut faces: Vec<Vec<usize>> = Vec::with_capacity(mesh.facets.len());
    for facet in &mesh.facets {
        let mut face: Vec<usize> = Vec::with_capacity(facet.indices.len());
        for &index in &facet.indices {
            let Some(&welded_index) = map.get(index) else {
                continue;
            };
            if face.last() != Some(&welded_index) {
                face.push(welded_index);
            }
        }
        while face.len() > 1 && face.first() == face.last() {
            face.pop();
        }
        if face.len() >= 3 {
            faces.push(face);
        }
    }

    let he_mesh = HalfEdgeMesh::from_faces(welded, faces);
    let mut open_edges = vec![0usize; he_mesh.face_count()];
    for half_edge in &he_mesh.half_edges {
        if half_edge.twin.is_none() {
            open_edges[half_edge.face] += 1;
        }
    }

    let components = he_mesh.face_components();
    let mut shells = Vec::with_capacity(components.len());
    for (shell_index, component) in components.iter().enumerate() {
        let mut builder = PolyfaceBuilder::new();
        let mut boundary_edges = 0;
        for &face in component {
            let points: Vec<Point3<f64>> = he_mesh.faces[face]
                .iter()
                .map(|&v| he_mesh.vertices[v])
                .collect();
            builder.add_polygon(&points);
            boundary_edges += open_edges[face];
        }
        if boundary_edges > 0 {
            warn!(
                "Shell {} is open: {} boundary edges over {} facets",
                shell_index,
                boundary_edges,
                component.len()
            );
        }
        shells.push(builder.finish());
    }
    if he_mesh.non_manifold_edge_count() > 0 {
        debug!(
            "Stitched mesh has {} non-manifold edges",
            he_mesh.non_manifold_edge_count()
        );
    }
    shells
}

/// Result of imprinting two meshes on each other and collecting shells
#[derive(Debug, Clone, Default)]
pub struct MergedVolumes {
    pub shells: VolumeSignBuckets,
    pub segments: usize,
    pub split_a: SplitStats,
    pub split_b: SplitStats,
}

/// Imprint `a` and `b` on each other, merge them into one mesh, stitch it
/// and classify the resulting shells by volume sign.
pub fn merge_and_collect_volumes_with(
    a: &Polyface,
    b: &Polyface,
    intersector: &dyn PolygonIntersector,
    splitter: &dyn FaceSplitter,
    config: &IntersectionConfig,
) -> MergedVolumes {
    let mut segments = search_intersection_segments(a, b, intersector, config).segments;
    let processor = FacetSplitProcessor::new(splitter, config.max_vertices_per_face);

    let mut builder = PolyfaceBuilder::new();
    let split_a = processor.process_by_tag(&mut builder, a, &mut segments, true);
    let split_b = processor.process_by_tag(&mut builder, b, &mut segments, false);
    let merged = builder.finish();

    let shells =
        stitch_and_collect_volumes_from_imprinted_mesh(&merged, config.weld_tolerance_factor);
    let shells = select_meshes_by_volume_sign(shells, config.volume_tolerance_factor);
    debug!(
        "Merged volumes: {} segments, {} positive, {} zero, {} negative shells",
        segments.len(),
        shells.positive.len(),
        shells.zero.len(),
        shells.negative.len()
    );
    MergedVolumes {
        shells,
        segments: segments.len(),
        split_a,
        split_b,
    }
}

/// Positive-volume shells of `a` and `b` imprinted on each other, with the
/// default collaborators.
pub fn merge_and_collect_volumes(
    a: &Polyface,
    b: &Polyface,
    config: &IntersectionConfig,
) -> Vec<Polyface> {
    let intersector = crate::geometry::PlanarPolygonIntersector::new(config.parallel_tolerance);
    let splitter = crate::geometry::PlanarGraphSplitter::default();
    merge_and_collect_volumes_with(a, b, &intersector, &splitter, config)
        .shells
        .positive
}

/// Imprint every mesh on every other mesh it meets, merge them all and
/// return the positive-volume shells. Mesh pairs are searched on the rayon
/// pool.
pub fn merge_and_collect_volumes_multi(
    meshes: &[Polyface],
    config: &IntersectionConfig,
) -> Vec<Polyface> {
    let intersector = crate::geometry::PlanarPolygonIntersector::new(config.parallel_tolerance);
    let splitter = crate::geometry::PlanarGraphSplitter::default();

    let pairs: Vec<(usize, usize)> = (0..meshes.len())
        .flat_map(|i| (i + 1..meshes.len()).map(move |j| (i, j)))
        .filter(|&(i, j)| meshes[i].range().intersects(&meshes[j].range()))
        .collect();

    // Segments per mesh, each tagged with that mesh on side A
    let found: Vec<(usize, usize, Vec<super::TaggedSegment>)> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let search = search_intersection_segments(&meshes[i], &meshes[j], &intersector, config);
            (i, j, search.segments)
        })
        .collect();
    let mut per_mesh: Vec<Vec<super::TaggedSegment>> = vec![Vec::new(); meshes.len()];
    for (i, j, segments) in found {
        per_mesh[j].extend(segments.iter().map(|s| s.swapped()));
        per_mesh[i].extend(segments);
    }

    let processor = FacetSplitProcessor::new(&splitter, config.max_vertices_per_face);
    let mut builder = PolyfaceBuilder::new();
    for (mesh, segments) in meshes.iter().zip(per_mesh.iter_mut()) {
        processor.process_by_tag(&mut builder, mesh, segments, true);
    }
    let merged = builder.finish();

    let shells =
        stitch_and_collect_volumes_from_imprinted_mesh(&merged, config.weld_tolerance_factor);
    select_meshes_by_volume_sign(shells, config.volume_tolerance_factor).positive
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn unit_cube_at(x: f64) -> Polyface {
        let mut cube = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_polyface();
        cube.translate(&Vector3::new(x, 0.0, 0.0));
        cube
    }

    #[test]
    fn test_signed_volume_is_origin_independent() {
        let cube = Primitive::cube(Vector3::new(2.0, 3.0, 4.0), true).to_polyface();
        assert_relative_eq!(signed_volume(&cube, &Point3::origin()), 24.0, epsilon = 1e-9);
        assert_relative_eq!(
            signed_volume(&cube, &Point3::new(50.0, -20.0, 7.0)),
            24.0,
            epsilon = 1e-9
        );
        let mut inverted = cube.clone();
        inverted.reverse_facets();
        assert_relative_eq!(signed_volume(&inverted, &Point3::origin()), -24.0, epsilon = 1e-9);
    }

    #[test]
    fn test_select_by_sign() {
        let positive = unit_cube_at(0.0);
        let mut negative = unit_cube_at(3.0);
        negative.reverse_facets();
        // Two-sided triangle: closed but encloses nothing
        let triangle = vec![
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(1.0, 0.0, 5.0),
            Point3::new(1.0, 1.0, 5.0),
        ];
        let back: Vec<Point3<f64>> = triangle.iter().rev().copied().collect();
        let flat = Polyface::from_polygons(&[triangle, back]);
        let buckets = select_meshes_by_volume_sign(vec![positive, negative, flat], 1e-10);
        assert_eq!(buckets.positive.len(), 1);
        assert_eq!(buckets.negative.len(), 1);
        assert_eq!(buckets.zero.len(), 1);
        assert_eq!(buckets.len(), 3);
    }

    #[test]
    fn test_stitch_separates_components() {
        let mut mesh = unit_cube_at(0.0);
        mesh.merge(&unit_cube_at(5.0));
        let shells = stitch_and_collect_volumes_from_imprinted_mesh(&mesh, 1e-10);
        assert_eq!(shells.len(), 2);
        for shell in &shells {
            assert_eq!(shell.facet_count(), 6);
            assert_eq!(shell.point_count(), 8);
        }
    }

    #[test]
    fn test_stitch_welds_nearby_points() {
        // Two halves of a box whose shared points differ by round-off
        let low =
            Primitive::block(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).to_polyface();
        let mut high =
            Primitive::block(Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 1.0, 2.0)).to_polyface();
        for point in &mut high.points {
            if point.z < 1.5 {
                point.z += 1e-13;
            }
        }
        let mut mesh = low;
        mesh.merge(&high);
        let shells = stitch_and_collect_volumes_from_imprinted_mesh(&mesh, 1e-10);
        assert_eq!(shells.len(), 1);
        assert_eq!(shells[0].point_count(), 12);
    }

    #[test]
    fn test_merge_overlapping_cubes() {
        let a = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), false).to_polyface();
        let b =
            Primitive::block(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 3.0, 3.0)).to_polyface();
        let config = IntersectionConfig::default();
        let intersector = crate::geometry::PlanarPolygonIntersector::default();
        let splitter = crate::geometry::PlanarGraphSplitter::default();
        let merged = merge_and_collect_volumes_with(&a, &b, &intersector, &splitter, &config);

        assert_eq!(merged.segments, 6);
        assert_eq!(merged.split_a.split, 3);
        assert_eq!(merged.split_b.split, 3);
        assert_eq!(merged.shells.len(), 1);
        assert_eq!(merged.shells.positive.len(), 1);
        // Both closed boxes, overlap counted twice
        let shell = &merged.shells.positive[0];
        assert_relative_eq!(signed_volume(shell, &Point3::origin()), 16.0, epsilon = 1e-9);
    }

    #[test]
    fn test_merge_multi_disjoint() {
        let meshes = vec![unit_cube_at(0.0), unit_cube_at(3.0), unit_cube_at(6.0)];
        let shells = merge_and_collect_volumes_multi(&meshes, &IntersectionConfig::default());
        assert_eq!(shells.len(), 3);
    }
}
