// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Closed polyface primitives with outward facet orientation

use super::Polyface;
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Geometric primitives
pub enum Primitive {
    Cube { size: Vector3<f64>, center: bool },
    Block { low: Point3<f64>, high: Point3<f64> },
    Sphere { r: f64, fn_: u32 },
    Cylinder { h: f64, r: f64, fn_: u32 },
}

impl Primitive {
    pub fn cube(size: Vector3<f64>, center: bool) -> Self {
        Self::Cube { size, center }
    }

    /// Axis-aligned box between two corners
    pub fn block(low: Point3<f64>, high: Point3<f64>) -> Self {
        Self::Block { low, high }
    }

    pub fn sphere(r: f64, fn_: u32) -> Self {
        let segments = if fn_ > 2 { fn_ } else { 32 };
        Self::Sphere { r, fn_: segments }
    }

    pub fn cylinder(h: f64, r: f64, fn_: u32) -> Self {
        let segments = if fn_ > 2 { fn_ } else { 32 };
        Self::Cylinder {
            h,
            r,
            fn_: segments,
        }
    }

    pub fn to_polyface(&self) -> Polyface {
        match self {
            Self::Cube { size, center } => {
                let low = if *center {
                    Point3::from(-size / 2.0)
                } else {
                    Point3::origin()
                };
                generate_block(low, low + size)
            }
            Self::Block { low, high } => generate_block(*low, *high),
            Self::Sphere { r, fn_ } => generate_sphere(*r, *fn_),
            Self::Cylinder { h, r, fn_ } => generate_cylinder(*h, *r, *fn_),
        }
    }
}

fn generate_block(low: Point3<f64>, high: Point3<f64>) -> Polyface {
    let mut mesh = Polyface::with_capacity(8, 6);

    for z in [low.z, high.z] {
        mesh.add_point(Point3::new(low.x, low.y, z));
        mesh.add_point(Point3::new(high.x, low.y, z));
        mesh.add_point(Point3::new(high.x, high.y, z));
        mesh.add_point(Point3::new(low.x, high.y, z));
    }

    // Bottom (z-), top (z+), y-, y+, x-, x+
    mesh.add_facet(vec![0, 3, 2, 1]);
    mesh.add_facet(vec![4, 5, 6, 7]);
    mesh.add_facet(vec![0, 1, 5, 4]);
    mesh.add_facet(vec![3, 7, 6, 2]);
    mesh.add_facet(vec![0, 4, 7, 3]);
    mesh.add_facet(vec![1, 2, 6, 5]);

    mesh
}

/// UV sphere: planar quads between rings, triangle fans at the poles.
fn generate_sphere(radius: f64, segments: u32) -> Polyface {
    let stacks = (segments / 2).max(2) as usize;
    let slices = segments as usize;
    let mut mesh = Polyface::new();

    let north = mesh.add_point(Point3::new(0.0, 0.0, radius));
    let mut rings: Vec<Vec<usize>> = Vec::with_capacity(stacks - 1);
    for k in 1..stacks {
        let phi = PI * k as f64 / stacks as f64;
        let ring = (0..slices)
            .map(|j| {
                let theta = 2.0 * PI * j as f64 / slices as f64;
                mesh.add_point(Point3::new(
                    radius * phi.sin() * theta.cos(),
                    radius * phi.sin() * theta.sin(),
                    radius * phi.cos(),
                ))
            })
            .collect();
        rings.push(ring);
    }
    let south = mesh.add_point(Point3::new(0.0, 0.0, -radius));

    for j in 0..slices {
        let next = (j + 1) % slices;
        mesh.add_facet(vec![north, rings[0][j], rings[0][next]]);
        for pair in rings.windows(2) {
            mesh.add_facet(vec![pair[0][j], pair[1][j], pair[1][next], pair[0][next]]);
        }
        let last = &rings[rings.len() - 1];
        mesh.add_facet(vec![last[j], south, last[next]]);
    }

    mesh
}

/// Cylinder from z=0 to z=h with polygonal caps.
fn generate_cylinder(height: f64, radius: f64, segments: u32) -> Polyface {
    let n = segments as usize;
    let mut mesh = Polyface::with_capacity(2 * n, n + 2);

    for z in [0.0, height] {
        for i in 0..n {
            let angle = 2.0 * PI * i as f64 / n as f64;
            mesh.add_point(Point3::new(radius * angle.cos(), radius * angle.sin(), z));
        }
    }

    mesh.add_facet((0..n).rev().collect());
    mesh.add_facet((n..2 * n).collect());
    for i in 0..n {
        let next = (i + 1) % n;
        mesh.add_facet(vec![i, next, n + next, n + i]);
    }

    mesh
}
