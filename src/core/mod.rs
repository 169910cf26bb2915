//! Core module - units, numerics and configuration

pub mod config;
pub mod expression;
pub mod solver;
pub mod stats;
pub mod units;

pub use config::Config;
