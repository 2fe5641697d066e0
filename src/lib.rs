//! HTTP service stepping co-simulation artifacts for many concurrent callers.

/// REST API: router, handlers, and error mapping.
pub mod api;
/// Techno-economic calculators.
pub mod calc;
pub mod config;
pub mod error;
/// Result export.
pub mod io;
pub mod model;
pub mod realtime;
/// Stepped sessions and their registry.
pub mod session;
/// Simulation clock and batch runs.
pub mod sim;
