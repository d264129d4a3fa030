// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Axis split heuristic over sets of ranges
//!
//! Every range contributes an open and a close event on the axis. Scanning
//! the sorted events keeps running counts of ranges strictly left of the
//! scan position, straddling it, and strictly right of it. The best split
//! maximizes `max(l,1) * max(i,1) * max(r,1)`. Events at the same coordinate
//! and of the same kind are crossed as one step, so equal ranges always land
//! on the same side. Null ranges have no events; a partition puts them on
//! the left.

use crate::geometry::Range3d;

/// Side of a split a range falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSide {
    Left,
    In,
    Right,
}

/// Best split found on one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSplit {
    pub axis: usize,
    /// Position in the sorted event list after which the split is taken
    pub event_index: usize,
    /// Coordinate of that event
    pub cut: f64,
    pub num_left: usize,
    pub num_in: usize,
    pub num_right: usize,
    pub weight: f64,
}

impl AxisSplit {
    /// True when at least two of the three groups are non-empty
    pub fn separates(&self) -> bool {
        let occupied = [self.num_left, self.num_in, self.num_right]
            .iter()
            .filter(|&&n| n > 0)
            .count();
        occupied > 1
    }
}

/// A split together with the side of every input range
#[derive(Debug, Clone, PartialEq)]
pub struct AxisPartition {
    pub split: AxisSplit,
    pub sides: Vec<RangeSide>,
}

pub fn volume_moment(num_left: usize, num_in: usize, num_right: usize) -> f64 {
    num_left.max(1) as f64 * num_in.max(1) as f64 * num_right.max(1) as f64
}

#[derive(Debug, Clone, Copy)]
struct SplitEvent {
    coordinate: f64,
    /// 0 = close of a range with extent, 1 = open, 2 = close of a flat range
    order: u8,
    id: usize,
}

impl SplitEvent {
    fn is_open(&self) -> bool {
        self.order == 1
    }
}

fn sorted_events(ranges: &[Range3d], axis: usize) -> Vec<SplitEvent> {
    let mut events = Vec::with_capacity(ranges.len() * 2);
    for (id, range) in ranges.iter().enumerate().filter(|(_, r)| !r.is_null()) {
        let (low, high) = (range.low_on(axis), range.high_on(axis));
        events.push(SplitEvent {
            coordinate: low,
            order: 1,
            id,
        });
        events.push(SplitEvent {
            coordinate: high,
            order: if high > low { 0 } else { 2 },
            id,
        });
    }
    // Closes before opens at equal coordinates so touching ranges separate;
    // a flat range still opens before it closes.
    events.sort_by(|a, b| {
        a.coordinate
            .total_cmp(&b.coordinate)
            .then(a.order.cmp(&b.order))
            .then(a.id.cmp(&b.id))
    });
    events
}

/// Best split of `ranges` along `axis`; `None` when no range is non-null.
pub fn split_on_axis(ranges: &[Range3d], axis: usize) -> Option<AxisSplit> {
    let events = sorted_events(ranges, axis);
    best_event(&events, events.len() / 2, axis)
}

fn best_event(events: &[SplitEvent], count: usize, axis: usize) -> Option<AxisSplit> {
    let (mut num_left, mut num_in, mut num_right) = (0usize, 0usize, count);
    let mut best: Option<AxisSplit> = None;
    for (event_index, event) in events.iter().enumerate() {
        if event.is_open() {
            num_right -= 1;
            num_in += 1;
        } else {
            num_in -= 1;
            num_left += 1;
        }
        // Events sharing a coordinate and kind are crossed together
        if let Some(next) = events.get(event_index + 1) {
            if next.coordinate == event.coordinate && next.order == event.order {
                continue;
            }
        }
        let weight = volume_moment(num_left, num_in, num_right);
        if best.map_or(true, |b| weight > b.weight) {
            best = Some(AxisSplit {
                axis,
                event_index,
                cut: event.coordinate,
                num_left,
                num_in,
                num_right,
                weight,
            });
        }
    }
    best
}

/// Best split along `axis` plus the side of every range.
pub fn partition_on_axis(ranges: &[Range3d], axis: usize) -> Option<AxisPartition> {
    let events = sorted_events(ranges, axis);
    let mut split = best_event(&events, events.len() / 2, axis)?;
    split.num_left += ranges.len() - events.len() / 2;

    let mut open_pos = vec![0usize; ranges.len()];
    let mut close_pos = vec![0usize; ranges.len()];
    for (position, event) in events.iter().enumerate() {
        if event.is_open() {
            open_pos[event.id] = position;
        } else {
            close_pos[event.id] = position;
        }
    }
    let k = split.event_index;
    let sides = (0..ranges.len())
        .map(|id| {
            if ranges[id].is_null() || close_pos[id] <= k {
                RangeSide::Left
            } else if open_pos[id] <= k {
                RangeSide::In
            } else {
                RangeSide::Right
            }
        })
        .collect();
    Some(AxisPartition { split, sides })
}

/// Split with the largest weight over the allowed axes; first axis wins ties.
pub fn best_axis_split(ranges: &[Range3d], allowed_axes: [bool; 3]) -> Option<AxisSplit> {
    let mut best: Option<AxisSplit> = None;
    for axis in (0..3).filter(|&a| allowed_axes[a]) {
        if let Some(split) = split_on_axis(ranges, axis) {
            if best.map_or(true, |b| split.weight > b.weight) {
                best = Some(split);
            }
        }
    }
    best
}
