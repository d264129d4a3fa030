// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - polyface representation and planar primitives

pub mod frame;
pub mod halfedge;
pub mod planar_graph;
pub mod planar_intersection;
pub mod polygon2d;
mod polyface;
mod primitives;
mod range;

pub use frame::LocalFrame;
pub use halfedge::HalfEdgeMesh;
pub use planar_graph::{FaceSplitter, PlanarGraphSplitter};
pub use planar_intersection::{PlanarPolygonIntersector, PolygonIntersection, PolygonIntersector};
pub use polyface::{
    Facet, FacetVisitor, Polyface, PolyfaceBuilder, PolyfaceConstruction, PolyfaceQuery,
    TaggedPolygon,
};
pub use primitives::Primitive;
pub use range::Range3d;
