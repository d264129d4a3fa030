// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Half-edge connectivity for polygon meshes
//! Provides twin lookup, boundary detection and face components for stitching

use super::Polyface;
use ahash::AHashMap;
use nalgebra::Point3;

/// Half-edge in a half-edge mesh
/// Each interior edge has two half-edges, one for each direction
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge {
    /// Next half-edge in the same face
    pub next: usize,
    /// Previous half-edge in the same face
    pub prev: usize,
    /// Twin half-edge (opposite direction, belongs to adjacent face)
    pub twin: Option<usize>,
    /// Vertex this half-edge points to
    pub vertex: usize,
    /// Face this half-edge belongs to
    pub face: usize,
}

/// Half-edge mesh over polygonal faces
#[derive(Debug, Clone, Default)]
pub struct HalfEdgeMesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<Vec<usize>>,
    pub half_edges: Vec<HalfEdge>,
    /// Half-edges grouped by undirected edge; more than two entries marks a
    /// non-manifold edge
    edge_groups: Vec<Vec<usize>>,
}

impl HalfEdgeMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a polyface, sharing vertices by index
    pub fn from_polyface(mesh: &Polyface) -> Self {
        let faces = mesh.facets.iter().map(|f| f.indices.clone()).collect();
        Self::from_faces(mesh.points.clone(), faces)
    }

    pub fn from_faces(vertices: Vec<Point3<f64>>, faces: Vec<Vec<usize>>) -> Self {
        let mut he_mesh = Self {
            vertices,
            faces,
            half_edges: Vec::new(),
            edge_groups: Vec::new(),
        };
        he_mesh.build_topology();
        he_mesh
    }

    /// Build half-edge topology from faces
    fn build_topology(&mut self) {
        self.half_edges.clear();
        for (face_idx, face) in self.faces.iter().enumerate() {
            let n = face.len();
            let first = self.half_edges.len();
            for i in 0..n {
                self.half_edges.push(HalfEdge {
                    next: first + (i + 1) % n,
                    prev: first + (i + n - 1) % n,
                    twin: None,
                    vertex: face[(i + 1) % n],
                    face: face_idx,
                });
            }
        }
        self.build_edge_map();
    }

    /// Group half-edges by undirected edge and pair opposite directions
    fn build_edge_map(&mut self) {
        let mut edge_map: AHashMap<(usize, usize), usize> = AHashMap::new();
        self.edge_groups.clear();

        for he_idx in 0..self.half_edges.len() {
            let (v_from, v_to) = self.endpoints(he_idx);
            let key = (v_from.min(v_to), v_from.max(v_to));
            let group = *edge_map.entry(key).or_insert_with(|| {
                self.edge_groups.push(Vec::new());
                self.edge_groups.len() - 1
            });
            self.edge_groups[group].push(he_idx);
        }

        for group in &self.edge_groups {
            for (i, &he) in group.iter().enumerate() {
                if self.half_edges[he].twin.is_some() {
                    continue;
                }
                let (from, to) = self.endpoints(he);
                let twin = group[i + 1..].iter().copied().find(|&other| {
                    self.half_edges[other].twin.is_none() && self.endpoints(other) == (to, from)
                });
                if let Some(twin) = twin {
                    self.half_edges[he].twin = Some(twin);
                    self.half_edges[twin].twin = Some(he);
                }
            }
        }
    }

    /// (origin, destination) of a half-edge
    pub fn endpoints(&self, he_idx: usize) -> (usize, usize) {
        let he = &self.half_edges[he_idx];
        (self.half_edges[he.prev].vertex, he.vertex)
    }

    /// Half-edges without a twin
    pub fn boundary_edge_count(&self) -> usize {
        self.half_edges.iter().filter(|he| he.twin.is_none()).count()
    }

    /// Undirected edges shared by more than two faces
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_groups.iter().filter(|g| g.len() > 2).count()
    }

    /// Faces grouped into components connected across shared edges, in
    /// order of their lowest face index.
    pub fn face_components(&self) -> Vec<Vec<usize>> {
        let mut parent: Vec<usize> = (0..self.faces.len()).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for group in &self.edge_groups {
            let Some(&first) = group.first() else {
                continue;
            };
            let root = find(&mut parent, self.half_edges[first].face);
            for &he in &group[1..] {
                let other = find(&mut parent, self.half_edges[he].face);
                if other != root {
                    parent[other] = root;
                }
            }
        }

        let mut index_of_root: AHashMap<usize, usize> = AHashMap::new();
        let mut components: Vec<Vec<usize>> = Vec::new();
        for face in 0..self.faces.len() {
            let root = find(&mut parent, face);
            let slot = *index_of_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(face);
        }
        components
    }

    /// Vertex count
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Face count
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// Weld points closer than `tol`.
/// Returns (index map, welded points); the first point of a cluster wins.
pub fn weld_points(points: &[Point3<f64>], tol: f64) -> (Vec<usize>, Vec<Point3<f64>>) {
    let mut map = Vec::with_capacity(points.len());
    let mut welded: Vec<Point3<f64>> = Vec::new();
    let cell_size = if tol > 0.0 { tol } else { f64::MIN_POSITIVE };
    let mut grid: AHashMap<[i64; 3], Vec<usize>> = AHashMap::new();
    let cell = |p: &Point3<f64>| {
        [
            (p.x / cell_size).floor() as i64,
            (p.y / cell_size).floor() as i64,
            (p.z / cell_size).floor() as i64,
        ]
    };

    for point in points {
        let c = cell(point);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = [
                        c[0].saturating_add(dx),
                        c[1].saturating_add(dy),
                        c[2].saturating_add(dz),
                    ];
                    if let Some(ids) = grid.get(&key) {
                        let near = ids.iter().find(|&&id| (welded[id] - point).norm() <= tol);
                        if let Some(&id) = near {
                            found = Some(id);
                            break 'search;
                        }
                    }
                }
            }
        }
        let id = found.unwrap_or_else(|| {
            welded.push(*point);
            grid.entry(c).or_default().push(welded.len() - 1);
            welded.len() - 1
        });
        map.push(id);
    }

    (map, welded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    #[test]
    fn test_halfedge_cube_is_closed() {
        let mesh = Primitive::cube(Vector3::new(10.0, 10.0, 10.0), false).to_polyface();
        let he_mesh = HalfEdgeMesh::from_polyface(&mesh);

        assert_eq!(he_mesh.vertex_count(), 8);
        assert_eq!(he_mesh.face_count(), 6);
        assert_eq!(he_mesh.half_edges.len(), 24);
        assert_eq!(he_mesh.boundary_edge_count(), 0);
        assert_eq!(he_mesh.non_manifold_edge_count(), 0);
        assert_eq!(he_mesh.face_components(), vec![(0..6).collect::<Vec<_>>()]);
    }

    #[test]
    fn test_open_and_disjoint_faces() {
        let mut mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_polyface();
        mesh.facets.pop();
        let mut far = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_polyface();
        far.translate(&Vector3::new(5.0, 0.0, 0.0));
        mesh.merge(&far);

        let he_mesh = HalfEdgeMesh::from_polyface(&mesh);
        assert_eq!(he_mesh.boundary_edge_count(), 4);
        let components = he_mesh.face_components();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].len(), 5);
        assert_eq!(components[1].len(), 6);
    }

    #[test]
    fn test_weld_points() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1e-10, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];

        let (map, welded) = weld_points(&points, 1e-9);

        assert_eq!(map, vec![0, 0, 1]);
        assert_eq!(welded.len(), 2);
    }
}
