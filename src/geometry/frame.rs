// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Local planar coordinate frames for facets

use nalgebra::{Point2, Point3, Vector3};

/// Area-weighted normal of a closed loop (Newell's method).
/// Its length is twice the loop's area.
pub fn polygon_area_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    let Some(origin) = points.first() else {
        return normal;
    };
    for i in 1..points.len().saturating_sub(1) {
        let a = points[i] - origin;
        let b = points[i + 1] - origin;
        normal += a.cross(&b);
    }
    normal
}

/// Unit normal of a loop, `None` for a zero-area loop.
pub fn polygon_unit_normal(points: &[Point3<f64>]) -> Option<Vector3<f64>> {
    polygon_area_normal(points).try_normalize(f64::MIN_POSITIVE)
}

/// Right-handed orthonormal frame whose z axis is a facet normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    pub origin: Point3<f64>,
    pub x_axis: Vector3<f64>,
    pub y_axis: Vector3<f64>,
    pub z_axis: Vector3<f64>,
}

impl LocalFrame {
    /// Frame on the plane of a polygon: origin at the first point, x along
    /// the first edge that is long relative to the polygon size, z along the
    /// loop normal so the loop is counter-clockwise in local coordinates.
    ///
    /// Returns `None` for collinear, coincident or too-short loops.
    pub fn from_polygon(points: &[Point3<f64>]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let origin = points[0];
        let size = points
            .iter()
            .map(|p| (p - origin).norm())
            .fold(0.0_f64, f64::max);
        if size == 0.0 || !size.is_finite() {
            return None;
        }

        let area_normal = polygon_area_normal(points);
        if area_normal.norm() <= 1.0e-12 * size * size {
            return None;
        }
        let z_axis = area_normal.normalize();

        let x_axis = points.iter().skip(1).find_map(|p| {
            let v = p - origin;
            let in_plane = v - z_axis * v.dot(&z_axis);
            (in_plane.norm() > 1.0e-8 * size).then(|| in_plane.normalize())
        })?;
        let y_axis = z_axis.cross(&x_axis);

        Some(Self {
            origin,
            x_axis,
            y_axis,
            z_axis,
        })
    }

    /// Local coordinates; z is the signed height above the plane.
    pub fn to_local(&self, point: &Point3<f64>) -> Point3<f64> {
        let v = point - self.origin;
        Point3::new(v.dot(&self.x_axis), v.dot(&self.y_axis), v.dot(&self.z_axis))
    }

    pub fn to_local_xy(&self, point: &Point3<f64>) -> Point2<f64> {
        let v = point - self.origin;
        Point2::new(v.dot(&self.x_axis), v.dot(&self.y_axis))
    }

    /// World point on the plane at local (x, y).
    pub fn to_world(&self, point: &Point2<f64>) -> Point3<f64> {
        self.origin + self.x_axis * point.x + self.y_axis * point.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_area_normal_of_square() {
        let square = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        assert_relative_eq!(polygon_area_normal(&square), Vector3::new(0.0, 0.0, 8.0));
    }

    #[test]
    fn test_frame_round_trip_and_orientation() {
        let loop3d = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
        ];
        let frame = LocalFrame::from_polygon(&loop3d).unwrap();
        assert_relative_eq!(frame.z_axis, Vector3::new(1.0, 0.0, 0.0));

        let local: Vec<_> = loop3d.iter().map(|p| frame.to_local_xy(p)).collect();
        let mut area2 = 0.0;
        for i in 0..local.len() {
            let a = local[i];
            let b = local[(i + 1) % local.len()];
            area2 += a.x * b.y - b.x * a.y;
        }
        assert!(area2 > 0.0);

        for (p, q) in loop3d.iter().zip(&local) {
            assert_relative_eq!(frame.to_world(q), *p, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_degenerate_loops_have_no_frame() {
        let collinear = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(2.0, 2.0, 2.0),
        ];
        assert!(LocalFrame::from_polygon(&collinear).is_none());
        let point = [Point3::new(1.0, 1.0, 1.0); 4];
        assert!(LocalFrame::from_polygon(&point).is_none());
    }
}
