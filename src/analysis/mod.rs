//! Uncertainty analysis: unit conversion, tolerance breakdown and GUM budgets

pub mod breakdown;
pub mod combined;
pub mod derived;
pub mod manual;
pub mod matcher;
pub mod ppm;

pub use breakdown::{
    absolute_limits, budget_components, deviation_limits, tolerance_error_summary, tolerance_summary,
    uncertainty_from_tolerance, ToleranceTerm, ToleranceUncertainty,
};
pub use combined::{analyze, combine_direct, UncertaintyResult};
pub use derived::{combine_derived, DerivedInputs};
pub use manual::{manual_component, repeatability, Repeatability};
pub use matcher::{find_instrument_tolerance, find_matching_tolerances, recalculate_tolerance, RangeMatch};
pub use ppm::{convert_ppm_to_unit, convert_to_ppm, convert_to_ppm_explained, Conversion, ConversionError};

use miette::Diagnostic;
use thiserror::Error;

use crate::core::expression::ExpressionError;

/// Errors raised while building an uncertainty budget
#[derive(Debug, Error, Diagnostic)]
pub enum AnalysisError {
    #[error("Missing input: {0}")]
    #[diagnostic(code(calrisk::analysis::missing_input))]
    MissingInput(String),

    #[error("Invalid input: {0}")]
    #[diagnostic(code(calrisk::analysis::invalid_input))]
    InvalidInput(String),

    #[error("Unit '{0}' is not registered or has no SI conversion")]
    #[diagnostic(code(calrisk::analysis::unknown_unit), help("Run `calrisk units` to list supported units"))]
    UnknownUnit(String),

    #[error("Variable '{variable}' has no input type mapping")]
    #[diagnostic(
        code(calrisk::analysis::missing_mapping),
        help("Add '{variable}' to variableMappings, e.g. `{variable}: Voltage`")
    )]
    MissingMapping { variable: String },

    #[error("No reference standard supplies input type(s): {}", types.join(", "))]
    #[diagnostic(
        code(calrisk::analysis::missing_tmde),
        help("Set variableType on a TMDE for each mapped input type")
    )]
    MissingTmde { types: Vec<String> },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Conversion(#[from] ConversionError),
}
