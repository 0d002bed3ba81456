//! Scattered-sample to regular-grid surface interpolation.
//!
//! A `ScatterSet` of at most 100 (x, y, z) samples is interpolated onto a
//! `Grid` with nearest-neighbour, piecewise linear or Clough-Tocher cubic
//! interpolation. Cells outside the convex hull of the samples are
//! `ZValue::Undefined` for the triangulated methods. `RecomputeCoordinator`
//! runs interpolation in the background and keeps only the newest result.

pub mod adapters;
pub mod algorithms;
pub mod cancellation;
pub mod config;
pub mod coordinator;
pub mod cross_section;
pub mod engine;
pub mod errors;
pub mod grid;
pub mod scatter;
pub mod triangulation;
