// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Axis-aligned range utilities

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding range.
///
/// A range with `low > high` on any axis is null. The null range is the
/// identity for [`Range3d::union`] and intersects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range3d {
    pub low: Point3<f64>,
    pub high: Point3<f64>,
}

impl Range3d {
    pub fn new(low: Point3<f64>, high: Point3<f64>) -> Self {
        Self { low, high }
    }

    pub fn null() -> Self {
        Self {
            low: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            high: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Range covering all of space.
    pub fn universe() -> Self {
        Self {
            low: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            high: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
        }
    }

    pub fn from_points(points: &[Point3<f64>]) -> Self {
        let mut range = Self::null();
        for point in points {
            range.extend_point(point);
        }
        range
    }

    pub fn is_null(&self) -> bool {
        self.low.x > self.high.x || self.low.y > self.high.y || self.low.z > self.high.z
    }

    pub fn extend_point(&mut self, point: &Point3<f64>) {
        self.low.x = self.low.x.min(point.x);
        self.low.y = self.low.y.min(point.y);
        self.low.z = self.low.z.min(point.z);

        self.high.x = self.high.x.max(point.x);
        self.high.y = self.high.y.max(point.y);
        self.high.z = self.high.z.max(point.z);
    }

    pub fn extend_range(&mut self, other: &Range3d) {
        if other.is_null() {
            return;
        }
        self.extend_point(&other.low);
        self.extend_point(&other.high);
    }

    pub fn union(&self, other: &Range3d) -> Range3d {
        let mut result = *self;
        result.extend_range(other);
        result
    }

    /// Intersection of two ranges; null when they are disjoint.
    pub fn intersection(&self, other: &Range3d) -> Range3d {
        Range3d::new(
            Point3::new(
                self.low.x.max(other.low.x),
                self.low.y.max(other.low.y),
                self.low.z.max(other.low.z),
            ),
            Point3::new(
                self.high.x.min(other.high.x),
                self.high.y.min(other.high.y),
                self.high.z.min(other.high.z),
            ),
        )
    }

    /// Closed overlap test: touching ranges intersect.
    pub fn intersects(&self, other: &Range3d) -> bool {
        self.low.x <= other.high.x
            && self.high.x >= other.low.x
            && self.low.y <= other.high.y
            && self.high.y >= other.low.y
            && self.low.z <= other.high.z
            && self.high.z >= other.low.z
    }

    /// Copy of the range grown by `expansion` on every side.
    pub fn expanded(&self, expansion: f64) -> Range3d {
        if self.is_null() {
            return *self;
        }
        let delta = Vector3::new(expansion, expansion, expansion);
        Range3d::new(self.low - delta, self.high + delta)
    }

    /// Low coordinate along `axis` (0 = x, 1 = y, 2 = z).
    pub fn low_on(&self, axis: usize) -> f64 {
        self.low[axis]
    }

    pub fn high_on(&self, axis: usize) -> f64 {
        self.high[axis]
    }

    pub fn center_on(&self, axis: usize) -> f64 {
        0.5 * (self.low[axis] + self.high[axis])
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.low, &self.high)
    }

    pub fn size(&self) -> Vector3<f64> {
        if self.is_null() {
            return Vector3::zeros();
        }
        self.high - self.low
    }

    /// Length of the diagonal, zero for a null range.
    pub fn diagonal(&self) -> f64 {
        self.size().norm()
    }

    /// Squared distance between the closest points of two ranges.
    pub fn distance_squared_to(&self, other: &Range3d) -> f64 {
        let mut sum = 0.0;
        for axis in 0..3 {
            let gap = (other.low[axis] - self.high[axis])
                .max(self.low[axis] - other.high[axis])
                .max(0.0);
            sum += gap * gap;
        }
        sum
    }
}

impl Default for Range3d {
    fn default() -> Self {
        Self::null()
    }
}
