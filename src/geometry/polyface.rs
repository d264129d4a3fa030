// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polygon mesh representation, facet visitor and output builder

use super::Range3d;
use crate::error::{PolyfaceError, Result};
use ahash::AHashMap;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// One polygonal facet: a closed loop of point indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub indices: Vec<usize>,
}

impl Facet {
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices }
    }
}

/// Indexed polygon mesh.
///
/// The read index of a facet is its position in `facets`; it is stable for
/// the lifetime of the mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyface {
    pub points: Vec<Point3<f64>>,
    pub facets: Vec<Facet>,
}

impl Polyface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(point_count: usize, facet_count: usize) -> Self {
        Self {
            points: Vec::with_capacity(point_count),
            facets: Vec::with_capacity(facet_count),
        }
    }

    /// Build a mesh from loose polygons; every polygon gets its own points.
    pub fn from_polygons(polygons: &[Vec<Point3<f64>>]) -> Self {
        let mut mesh = Self::new();
        for polygon in polygons {
            let start = mesh.points.len();
            mesh.points.extend_from_slice(polygon);
            mesh.facets.push(Facet::new((start..mesh.points.len()).collect()));
        }
        mesh
    }

    /// Add a point and return its index
    pub fn add_point(&mut self, point: Point3<f64>) -> usize {
        let index = self.points.len();
        self.points.push(point);
        index
    }

    /// Add a facet and return its read index
    pub fn add_facet(&mut self, indices: Vec<usize>) -> usize {
        let read_index = self.facets.len();
        self.facets.push(Facet::new(indices));
        read_index
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    /// Point loop of one facet, `None` for an unknown read index.
    pub fn facet_points(&self, read_index: usize) -> Option<Vec<Point3<f64>>> {
        let mut points = Vec::new();
        self.load_facet(read_index, &mut points).then_some(points)
    }

    /// Range of all points.
    pub fn range(&self) -> Range3d {
        Range3d::from_points(&self.points)
    }

    /// Check the caller contract: facets reference existing points, have at
    /// least three indices, and all coordinates are finite.
    pub fn validate(&self) -> Result<()> {
        for (index, point) in self.points.iter().enumerate() {
            if !(point.x.is_finite() && point.y.is_finite() && point.z.is_finite()) {
                return Err(PolyfaceError::NonFinitePoint { index });
            }
        }
        for (facet_index, facet) in self.facets.iter().enumerate() {
            if facet.indices.len() < 3 {
                return Err(PolyfaceError::FacetTooSmall {
                    facet: facet_index,
                    count: facet.indices.len(),
                });
            }
            if let Some(&bad) = facet.indices.iter().find(|&&i| i >= self.points.len()) {
                return Err(PolyfaceError::InvalidPointIndex {
                    facet: facet_index,
                    index: bad,
                    point_count: self.points.len(),
                });
            }
        }
        Ok(())
    }

    /// Append another mesh (no welding).
    pub fn merge(&mut self, other: &Polyface) {
        let offset = self.points.len();
        self.points.extend_from_slice(&other.points);
        for facet in &other.facets {
            self.facets.push(Facet::new(
                facet.indices.iter().map(|i| i + offset).collect(),
            ));
        }
    }

    pub fn translate(&mut self, shift: &Vector3<f64>) {
        for point in &mut self.points {
            *point += shift;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for point in &mut self.points {
            point.coords *= factor;
        }
    }

    /// Flip the orientation of every facet.
    pub fn reverse_facets(&mut self) {
        for facet in &mut self.facets {
            facet.indices.reverse();
        }
    }
}

/// Read access to the facets of a mesh.
///
/// Read indices run over `0..facet_count()`. Implementations must be
/// shareable across threads so independent queries can run in parallel.
pub trait PolyfaceQuery: Sync {
    fn facet_count(&self) -> usize;

    /// Replace `points` with the loop of facet `read_index`.
    /// Returns false (leaving `points` empty) for an unknown read index.
    fn load_facet(&self, read_index: usize, points: &mut Vec<Point3<f64>>) -> bool;
}

impl PolyfaceQuery for Polyface {
    fn facet_count(&self) -> usize {
        self.facets.len()
    }

    fn load_facet(&self, read_index: usize, points: &mut Vec<Point3<f64>>) -> bool {
        points.clear();
        let Some(facet) = self.facets.get(read_index) else {
            return false;
        };
        for &index in &facet.indices {
            match self.points.get(index) {
                Some(point) => points.push(*point),
                None => {
                    points.clear();
                    return false;
                }
            }
        }
        true
    }
}

/// A loose polygon carrying a caller tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedPolygon {
    pub points: Vec<Point3<f64>>,
    pub tag: usize,
}

impl TaggedPolygon {
    pub fn new(points: Vec<Point3<f64>>, tag: usize) -> Self {
        Self { points, tag }
    }
}

/// Read index of a tagged polygon is its position in the slice.
impl PolyfaceQuery for [TaggedPolygon] {
    fn facet_count(&self) -> usize {
        self.len()
    }

    fn load_facet(&self, read_index: usize, points: &mut Vec<Point3<f64>>) -> bool {
        points.clear();
        match self.get(read_index) {
            Some(polygon) => {
                points.extend_from_slice(&polygon.points);
                true
            }
            None => false,
        }
    }
}

/// Restartable cursor over the facets of a mesh.
///
/// The visitor owns its point buffer, so each stage that needs facet data
/// creates its own and nothing outlives a single call.
pub struct FacetVisitor<'a, Q: PolyfaceQuery + ?Sized> {
    source: &'a Q,
    next: usize,
    read_index: Option<usize>,
    points: Vec<Point3<f64>>,
}

impl<'a, Q: PolyfaceQuery + ?Sized> FacetVisitor<'a, Q> {
    pub fn new(source: &'a Q) -> Self {
        Self {
            source,
            next: 0,
            read_index: None,
            points: Vec::new(),
        }
    }

    /// Rewind to before the first facet.
    pub fn reset(&mut self) {
        self.next = 0;
        self.read_index = None;
        self.points.clear();
    }

    /// Move to the next facet that loads successfully.
    pub fn advance(&mut self) -> bool {
        while self.next < self.source.facet_count() {
            let read_index = self.next;
            self.next += 1;
            if self.source.load_facet(read_index, &mut self.points) {
                self.read_index = Some(read_index);
                return true;
            }
        }
        self.read_index = None;
        self.points.clear();
        false
    }

    /// Jump to a specific facet. Iteration continues after it.
    pub fn move_to_read_index(&mut self, read_index: usize) -> bool {
        if self.source.load_facet(read_index, &mut self.points) {
            self.read_index = Some(read_index);
            self.next = read_index + 1;
            true
        } else {
            self.read_index = None;
            false
        }
    }

    pub fn read_index(&self) -> Option<usize> {
        self.read_index
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn facet_range(&self) -> Range3d {
        Range3d::from_points(&self.points)
    }
}

/// Sink for emitted polygons.
pub trait PolyfaceConstruction {
    /// Add one polygon; returns false when it was dropped as degenerate.
    fn add_polygon(&mut self, points: &[Point3<f64>]) -> bool;
}

/// Builds a [`Polyface`], sharing bit-identical points between facets.
#[derive(Debug, Default)]
pub struct PolyfaceBuilder {
    polyface: Polyface,
    point_index: AHashMap<[u64; 3], usize>,
}

impl PolyfaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn point_key(point: &Point3<f64>) -> [u64; 3] {
        // +0.0 folds negative zero onto zero
        [
            (point.x + 0.0).to_bits(),
            (point.y + 0.0).to_bits(),
            (point.z + 0.0).to_bits(),
        ]
    }

    pub fn find_or_add_point(&mut self, point: &Point3<f64>) -> usize {
        let key = Self::point_key(point);
        if let Some(&index) = self.point_index.get(&key) {
            return index;
        }
        let index = self.polyface.add_point(*point);
        self.point_index.insert(key, index);
        index
    }

    pub fn facet_count(&self) -> usize {
        self.polyface.facet_count()
    }

    pub fn finish(self) -> Polyface {
        self.polyface
    }
}

impl PolyfaceConstruction for PolyfaceBuilder {
    fn add_polygon(&mut self, points: &[Point3<f64>]) -> bool {
        let mut indices: Vec<usize> = Vec::with_capacity(points.len());
        for point in points {
            let index = self.find_or_add_point(point);
            if indices.last() != Some(&index) {
                indices.push(index);
            }
        }
        while indices.len() > 1 && indices.first() == indices.last() {
            indices.pop();
        }
        if indices.len() < 3 {
            return false;
        }
        self.polyface.add_facet(indices);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;

    #[test]
    fn test_visitor_walks_all_facets() {
        let mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_polyface();
        let mut visitor = FacetVisitor::new(&mesh);
        let mut seen = Vec::new();
        while visitor.advance() {
            assert_eq!(visitor.points().len(), 4);
            seen.push(visitor.read_index().unwrap());
        }
        assert_eq!(seen, (0..6).collect::<Vec<_>>());

        visitor.reset();
        assert!(visitor.advance());
        assert_eq!(visitor.read_index(), Some(0));
        assert!(visitor.move_to_read_index(4));
        assert!(!visitor.move_to_read_index(6));
    }

    #[test]
    fn test_builder_shares_points() {
        let mut builder = PolyfaceBuilder::new();
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(1.0, 1.0, 0.0);
        let d = Point3::new(0.0, 1.0, 0.0);
        assert!(builder.add_polygon(&[a, b, c]));
        assert!(builder.add_polygon(&[a, c, d]));
        assert!(!builder.add_polygon(&[a, b, b, a]));
        let mesh = builder.finish();
        assert_eq!(mesh.point_count(), 4);
        assert_eq!(mesh.facet_count(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_index() {
        let mut mesh = Polyface::new();
        mesh.add_point(Point3::new(0.0, 0.0, 0.0));
        mesh.add_point(Point3::new(1.0, 0.0, 0.0));
        mesh.add_facet(vec![0, 1, 2]);
        assert_eq!(
            mesh.validate(),
            Err(PolyfaceError::InvalidPointIndex {
                facet: 0,
                index: 2,
                point_count: 2
            })
        );
        assert!(mesh.facet_points(0).is_none());
    }

    #[test]
    fn test_tagged_polygons_are_queryable() {
        let polygons = vec![
            TaggedPolygon::new(
                vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
                42,
            ),
        ];
        let mut points = Vec::new();
        assert!(polygons[..].load_facet(0, &mut points));
        assert_eq!(points.len(), 3);
        assert!(!polygons[..].load_facet(1, &mut points));
    }
}
