//! CLI command implementations

pub mod budget;
pub mod completions;
pub mod convert;
pub mod lookup;
pub mod risk;
pub mod units;
