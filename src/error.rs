// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for caller contract violations

use thiserror::Error;

/// Errors raised when input meshes break the caller contract.
///
/// Lookup failures and degenerate geometry are not errors: they change the
/// control path (skip, verbatim copy) and never surface here.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolyfaceError {
    #[error("facet {facet} references point {index} but the mesh has {point_count} points")]
    InvalidPointIndex {
        facet: usize,
        index: usize,
        point_count: usize,
    },

    #[error("facet {facet} has {count} indices, at least 3 are required")]
    FacetTooSmall { facet: usize, count: usize },

    #[error("point {index} has a non-finite coordinate")]
    NonFinitePoint { index: usize },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Invalid values in an [`crate::IntersectionConfig`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("max_vertices_per_face must be at least 3, got {0}")]
    MaxVerticesTooSmall(usize),

    #[error("{name} must be a finite non-negative number, got {value}")]
    InvalidTolerance { name: &'static str, value: f64 },

    #[error("ternary_max_per_node must be at least 1")]
    TernaryNodeSizeZero,
}

pub type Result<T> = std::result::Result<T, PolyfaceError>;
