//! External system integrations for piimask.
//!
//! - [`csv`] - delimited file input and output
//! - [`remote`] - remote semantic detection service over HTTP
//!
//! Adapters isolate external formats and services from the core pipeline.
//! The remote adapter implements [`crate::detection::Detector`] so the
//! orchestrator can be tested with in-process detectors.

pub mod csv;
pub mod remote;
