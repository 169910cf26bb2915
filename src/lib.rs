//! calrisk: metrology uncertainty budgets and conformance decision risk
//!
//! Reads calibration test points (UUT tolerance, reference standards,
//! manual components) from YAML or JSON, combines them into GUM budgets and
//! evaluates TUR/TAR, false accept/reject risk, guard bands and
//! calibration-interval forecasts.

pub mod analysis;
pub mod cli;
pub mod core;
pub mod entities;
pub mod risk;
pub mod yaml;
