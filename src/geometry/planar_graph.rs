// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Planar graph face splitting
//!
//! A facet boundary and the segments imprinted on it are merged into one
//! planar graph: edges are split at crossings, T-junctions and collinear
//! overlaps, vertices are snapped within a tolerance, and dangling edges are
//! pruned. Half-edges sorted by angle at each vertex trace the face loops.
//! Counter-clockwise loops are faces; clockwise loops are outer boundaries of
//! components and become holes of the smallest face that encloses them.

use super::polygon2d::{self, cross, PointLocation};
use ahash::{AHashMap, AHashSet};
use log::debug;
use nalgebra::Point2;

/// Splits a planar boundary loop along extra edges
pub trait FaceSplitter: Sync {
    /// Interior faces of `boundary` cut by `edges`, counter-clockwise, each
    /// with at most `max_vertices` vertices. `None` when the graph cannot be
    /// built; callers then keep the facet unchanged.
    fn split_faces(
        &self,
        boundary: &[Point2<f64>],
        edges: &[(Point2<f64>, Point2<f64>)],
        max_vertices: usize,
    ) -> Option<Vec<Vec<Point2<f64>>>>;
}

/// Default splitter built on a half-edge planar graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarGraphSplitter {
    /// Snap distance factor, times the boundary diagonal
    pub relative_tolerance: f64,
}

impl Default for PlanarGraphSplitter {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-10,
        }
    }
}

impl FaceSplitter for PlanarGraphSplitter {
    fn split_faces(
        &self,
        boundary: &[Point2<f64>],
        edges: &[(Point2<f64>, Point2<f64>)],
        max_vertices: usize,
    ) -> Option<Vec<Vec<Point2<f64>>>> {
        if boundary.len() < 3 {
            return None;
        }
        let mut boundary = boundary.to_vec();
        if polygon2d::signed_area(&boundary) < 0.0 {
            boundary.reverse();
        }
        let size = diagonal(&boundary);
        let tol = self.relative_tolerance * size;
        if !size.is_finite() || tol.is_nan() || tol <= 0.0 {
            return None;
        }

        let n = boundary.len();
        let mut segments: Vec<(Point2<f64>, Point2<f64>)> =
            (0..n).map(|i| (boundary[i], boundary[(i + 1) % n])).collect();
        segments.extend(
            edges
                .iter()
                .filter(|(a, b)| (b - a).norm() > tol)
                .copied(),
        );

        let mut graph = PlanarGraph::from_segments(&segments, tol);
        graph.prune_dangling();
        let loops = graph.trace_loops()?;
        let components = graph.components();

        let area_tol = tol * size;
        let mut faces: Vec<FaceLoop> = Vec::new();
        let mut outers: Vec<Vec<usize>> = Vec::new();
        for vertex_loop in loops {
            let points: Vec<Point2<f64>> = vertex_loop.iter().map(|&v| graph.vertices[v]).collect();
            let area = polygon2d::signed_area(&points);
            if area > area_tol {
                faces.push(FaceLoop {
                    component: components[vertex_loop[0]],
                    points,
                    area,
                    holes: Vec::new(),
                });
            } else if area < -area_tol {
                outers.push(vertex_loop);
            }
        }

        // Each component outline becomes a hole of the smallest enclosing
        // face of another component; the outline of the boundary's own
        // component encloses nothing and is dropped.
        for outer in outers {
            let component = components[outer[0]];
            let probe = graph.vertices[outer[0]];
            let host = faces
                .iter()
                .enumerate()
                .filter(|(_, f)| f.component != component)
                .filter(|(_, f)| {
                    polygon2d::classify_point(&probe, &f.points, tol) == PointLocation::Inside
                })
                .min_by(|(_, x), (_, y)| x.area.total_cmp(&y.area))
                .map(|(i, _)| i);
            if let Some(host) = host {
                faces[host]
                    .holes
                    .push(outer.iter().map(|&v| graph.vertices[v]).collect());
            }
        }

        let mut result = Vec::new();
        for face in faces {
            let Some(sample) = polygon2d::interior_sample(&face.points, &face.holes) else {
                continue;
            };
            if polygon2d::classify_point(&sample, &boundary, tol) != PointLocation::Inside {
                continue;
            }
            if face.holes.is_empty() && face.points.len() <= max_vertices {
                result.push(face.points);
                continue;
            }
            let triangles = if face.holes.is_empty() {
                ear_clip(&face.points, area_tol)
                    .or_else(|| polygon2d::triangulate(&face.points, &[]))
            } else {
                polygon2d::triangulate(&face.points, &face.holes)
            };
            let Some(triangles) = triangles else {
                debug!("triangulation failed for a face of {} vertices", face.points.len());
                return None;
            };
            let all: Vec<Point2<f64>> = face
                .points
                .iter()
                .chain(face.holes.iter().flatten())
                .copied()
                .collect();
            for [a, b, c] in triangles {
                let (a, b, c) = (all[a], all[b], all[c]);
                match cross(&a, &b, &c) {
                    area if area > area_tol => result.push(vec![a, b, c]),
                    area if area < -area_tol => result.push(vec![a, c, b]),
                    _ => {}
                }
            }
        }
        Some(result)
    }
}

struct FaceLoop {
    component: usize,
    points: Vec<Point2<f64>>,
    area: f64,
    holes: Vec<Vec<Point2<f64>>>,
}

fn diagonal(points: &[Point2<f64>]) -> f64 {
    let (mut lo, mut hi) = (
        Point2::new(f64::INFINITY, f64::INFINITY),
        Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
    );
    for p in points {
        lo = lo.inf(p);
        hi = hi.sup(p);
    }
    (hi - lo).norm()
}

/// Snaps points within a tolerance onto shared vertices.
struct VertexPool {
    points: Vec<Point2<f64>>,
    grid: AHashMap<(i64, i64), Vec<usize>>,
    tol: f64,
}

impl VertexPool {
    fn new(tol: f64) -> Self {
        Self {
            points: Vec::new(),
            grid: AHashMap::new(),
            tol,
        }
    }

    fn cell(&self, p: &Point2<f64>) -> (i64, i64) {
        ((p.x / self.tol).floor() as i64, (p.y / self.tol).floor() as i64)
    }

    fn find_or_insert(&mut self, p: &Point2<f64>) -> usize {
        let (cx, cy) = self.cell(p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(ids) = self.grid.get(&(cx + dx, cy + dy)) {
                    let near = ids
                        .iter()
                        .find(|&&id| (self.points[id] - p).norm() <= self.tol);
                    if let Some(&id) = near {
                        return id;
                    }
                }
            }
        }
        let id = self.points.len();
        self.points.push(*p);
        self.grid.entry((cx, cy)).or_default().push(id);
        id
    }
}

/// Undirected planar graph; edge `k` owns half-edges `2k` (a to b) and
/// `2k + 1` (b to a).
struct PlanarGraph {
    vertices: Vec<Point2<f64>>,
    edges: Vec<(usize, usize)>,
}

impl PlanarGraph {
    /// Merge segments, splitting each at every point where another segment
    /// crosses or touches it.
    fn from_segments(segments: &[(Point2<f64>, Point2<f64>)], tol: f64) -> Self {
        let mut cuts: Vec<Vec<(f64, Point2<f64>)>> = segments
            .iter()
            .map(|&(a, b)| vec![(0.0, a), (1.0, b)])
            .collect();

        for i in 0..segments.len() {
            for j in (i + 1)..segments.len() {
                let (p0, p1) = segments[i];
                let (q0, q1) = segments[j];
                let r = p1 - p0;
                let s = q1 - q0;
                let denom = r.x * s.y - r.y * s.x;
                if denom.abs() > f64::EPSILON * r.norm() * s.norm() {
                    let w = q0 - p0;
                    let t = (w.x * s.y - w.y * s.x) / denom;
                    let u = (w.x * r.y - w.y * r.x) / denom;
                    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
                        let point = p0 + r * t;
                        cuts[i].push((t, point));
                        cuts[j].push((u, point));
                    }
                }
                for q in [q0, q1] {
                    if let Some(t) = touch_parameter(&q, &p0, &p1, tol) {
                        cuts[i].push((t, q));
                    }
                }
                for p in [p0, p1] {
                    if let Some(u) = touch_parameter(&p, &q0, &q1, tol) {
                        cuts[j].push((u, p));
                    }
                }
            }
        }

        let mut pool = VertexPool::new(tol);
        let mut seen: AHashSet<(usize, usize)> = AHashSet::new();
        let mut edges = Vec::new();
        for mut list in cuts {
            list.sort_by(|x, y| x.0.total_cmp(&y.0));
            let ids: Vec<usize> = list.iter().map(|(_, p)| pool.find_or_insert(p)).collect();
            for pair in ids.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if a != b && seen.insert((a.min(b), a.max(b))) {
                    edges.push((a, b));
                }
            }
        }

        Self {
            vertices: pool.points,
            edges,
        }
    }

    /// Remove edges ending at a degree-one vertex until none remain.
    fn prune_dangling(&mut self) {
        loop {
            let mut degree = vec![0usize; self.vertices.len()];
            for &(a, b) in &self.edges {
                degree[a] += 1;
                degree[b] += 1;
            }
            let before = self.edges.len();
            self.edges.retain(|&(a, b)| degree[a] > 1 && degree[b] > 1);
            if self.edges.len() == before {
                break;
            }
        }
    }

    fn components(&self) -> Vec<usize> {
        let mut parent: Vec<usize> = (0..self.vertices.len()).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for &(a, b) in &self.edges {
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                parent[ra] = rb;
            }
        }
        (0..self.vertices.len()).map(|v| find(&mut parent, v)).collect()
    }

    /// Vertex loops of every face, including each component's outline.
    fn trace_loops(&self) -> Option<Vec<Vec<usize>>> {
        let half_count = self.edges.len() * 2;
        let origin = |h: usize| {
            let (a, b) = self.edges[h / 2];
            if h % 2 == 0 {
                a
            } else {
                b
            }
        };

        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); self.vertices.len()];
        for h in 0..half_count {
            outgoing[origin(h)].push(h);
        }
        let mut position = vec![0usize; half_count];
        for (v, list) in outgoing.iter_mut().enumerate() {
            let from = self.vertices[v];
            list.sort_by(|&x, &y| {
                let dx = self.vertices[origin(x ^ 1)] - from;
                let dy = self.vertices[origin(y ^ 1)] - from;
                dx.y.atan2(dx.x).total_cmp(&dy.y.atan2(dy.x))
            });
            for (i, &h) in list.iter().enumerate() {
                position[h] = i;
            }
        }

        // Next half-edge around the face on the left: the first edge
        // clockwise from the twin at the destination.
        let next = |h: usize| {
            let twin = h ^ 1;
            let list = &outgoing[origin(twin)];
            list[(position[twin] + list.len() - 1) % list.len()]
        };

        let mut visited = vec![false; half_count];
        let mut loops = Vec::new();
        for start in 0..half_count {
            if visited[start] {
                continue;
            }
            let mut vertex_loop = Vec::new();
            let mut h = start;
            loop {
                if visited[h] || vertex_loop.len() > half_count {
                    return None;
                }
                visited[h] = true;
                vertex_loop.push(origin(h));
                h = next(h);
                if h == start {
                    break;
                }
            }
            loops.push(vertex_loop);
        }
        Some(loops)
    }
}

/// Parameter of `p` along `a -> b` when it lies within `tol` of the open
/// segment.
fn touch_parameter(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>, tol: f64) -> Option<f64> {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return None;
    }
    let t = (p - a).dot(&ab) / len2;
    if t <= 0.0 || t >= 1.0 {
        return None;
    }
    ((p - (a + ab * t)).norm() <= tol).then_some(t)
}

/// Ear clipping that keeps every input vertex, so collinear vertices added by
/// splits stay shared with neighbouring faces.
fn ear_clip(points: &[Point2<f64>], area_tol: f64) -> Option<Vec<[usize; 3]>> {
    let mut remaining: Vec<usize> = (0..points.len()).collect();
    let mut triangles = Vec::with_capacity(points.len().saturating_sub(2));
    while remaining.len() > 3 {
        let n = remaining.len();
        let ear = (0..n).find(|&i| {
            let (ia, ib, ic) = (remaining[(i + n - 1) % n], remaining[i], remaining[(i + 1) % n]);
            let (a, b, c) = (points[ia], points[ib], points[ic]);
            if cross(&a, &b, &c) <= area_tol {
                return false;
            }
            remaining.iter().all(|&k| {
                let p = points[k];
                k == ia
                    || k == ib
                    || k == ic
                    || p == a
                    || p == b
                    || p == c
                    || !(cross(&a, &b, &p) >= -area_tol
                        && cross(&b, &c, &p) >= -area_tol
                        && cross(&c, &a, &p) >= -area_tol)
            })
        })?;
        triangles.push([
            remaining[(ear + n - 1) % n],
            remaining[ear],
            remaining[(ear + 1) % n],
        ]);
        remaining.remove(ear);
    }
    triangles.push([remaining[0], remaining[1], remaining[2]]);
    Some(triangles)
}
