//! Thin I/O adapters around the core: CSV ingestion of sample points and
//! CSV export of grids and cross-sections.

pub mod export;
pub mod ingest;
