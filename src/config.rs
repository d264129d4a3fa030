// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Intersection pipeline configuration

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tree structure used for facet-pair discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BroadPhase {
    #[default]
    IndexedHeap,
    Ternary,
}

impl std::str::FromStr for BroadPhase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "indexed_heap" | "heap" => Ok(Self::IndexedHeap),
            "ternary" => Ok(Self::Ternary),
            other => Err(format!("unknown broad phase: {other}")),
        }
    }
}

/// Intersection configuration
///
/// Tolerances are relative: each is multiplied by a size of the input
/// (bounding diagonal, or its cube for volumes) before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionConfig {
    /// Coplanar distance factor, times the global bounding diagonal
    pub coplanar_tolerance_factor: f64,
    /// Cross-product magnitude of unit normals below which planes are parallel
    pub parallel_tolerance: f64,
    /// Largest face emitted without triangulation
    pub max_vertices_per_face: usize,
    /// Pre-sort axes for facet trees
    pub sort_x: bool,
    pub sort_y: bool,
    pub sort_z: bool,
    /// Near-zero volume factor, times the diagonal cubed
    pub volume_tolerance_factor: f64,
    /// Point weld factor for shell stitching, times the diagonal
    pub weld_tolerance_factor: f64,
    /// Ternary tree leaf capacity
    pub ternary_max_per_node: usize,
    pub broad_phase: BroadPhase,
    /// Tree depth used to partition parallel searches (None = sequential)
    pub parallel_depth: Option<usize>,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            coplanar_tolerance_factor: 1e-10,
            parallel_tolerance: 1e-10,
            max_vertices_per_face: 3,
            sort_x: true,
            sort_y: true,
            sort_z: true,
            volume_tolerance_factor: 1e-10,
            weld_tolerance_factor: 1e-10,
            ternary_max_per_node: 8,
            broad_phase: BroadPhase::IndexedHeap,
            parallel_depth: None,
        }
    }
}

impl IntersectionConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: IntersectionConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from("polyface.toml").exists() {
            Self::from_file("polyface.toml")?
        } else {
            Self::default()
        };

        if let Ok(max_vertices) = std::env::var("POLYFACE_MAX_VERTICES_PER_FACE") {
            config.max_vertices_per_face = max_vertices
                .parse()
                .context("POLYFACE_MAX_VERTICES_PER_FACE is not an integer")?;
        }

        if let Ok(tolerance) = std::env::var("POLYFACE_COPLANAR_TOLERANCE") {
            config.coplanar_tolerance_factor = tolerance
                .parse()
                .context("POLYFACE_COPLANAR_TOLERANCE is not a number")?;
        }

        if let Ok(broad_phase) = std::env::var("POLYFACE_BROAD_PHASE") {
            config.broad_phase = broad_phase.parse().map_err(anyhow::Error::msg)?;
        }

        if let Ok(depth) = std::env::var("POLYFACE_PARALLEL_DEPTH") {
            config.parallel_depth = parse_parallel_depth(&depth)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_vertices_per_face < 3 {
            return Err(ConfigError::MaxVerticesTooSmall(self.max_vertices_per_face));
        }
        if self.ternary_max_per_node == 0 {
            return Err(ConfigError::TernaryNodeSizeZero);
        }
        for (name, value) in [
            ("coplanar_tolerance_factor", self.coplanar_tolerance_factor),
            ("parallel_tolerance", self.parallel_tolerance),
            ("volume_tolerance_factor", self.volume_tolerance_factor),
            ("weld_tolerance_factor", self.weld_tolerance_factor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidTolerance { name, value });
            }
        }
        Ok(())
    }

    pub fn any_sort(&self) -> bool {
        self.sort_x || self.sort_y || self.sort_z
    }
}

/// `none` (or an empty value) selects the sequential search
fn parse_parallel_depth(value: &str) -> Result<Option<usize>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let depth = value
        .parse()
        .with_context(|| format!("POLYFACE_PARALLEL_DEPTH is not an integer: {value:?}"))?;
    Ok(Some(depth))
}
