//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::commands::{
    budget::BudgetArgs, completions::CompletionsArgs, convert::ConvertCommands, lookup::LookupArgs, risk::RiskArgs,
    units::UnitsArgs,
};

#[derive(Parser)]
#[command(name = "calrisk")]
#[command(author, version, about = "Metrology uncertainty budgets and conformance risk")]
#[command(long_about = "Builds GUM uncertainty budgets for calibration test points and evaluates \
    the decision risk of accepting them: TUR/TAR, PFA/PFR, guard bands and interval forecasts.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Show skipped components and solver details
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the unit registry, or the units sharing a quantity with UNIT
    Units(UnitsArgs),

    /// Convert between absolute deviations and ppm
    #[command(subcommand)]
    Convert(ConvertCommands),

    /// Uncertainty budget of each test point in a file
    Budget(BudgetArgs),

    /// Conformance-risk report of each test point in a file
    Risk(RiskArgs),

    /// Find the instrument range and tolerance covering a value
    Lookup(LookupArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables on a terminal
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
}

impl OutputFormat {
    /// Resolve `auto` against the configured default format
    pub fn resolve(self, configured: Option<&str>) -> Self {
        if self != OutputFormat::Auto {
            return self;
        }
        configured
            .and_then(|name| OutputFormat::from_str(name, true).ok())
            .unwrap_or(OutputFormat::Auto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_format_resolution() {
        assert_eq!(OutputFormat::Auto.resolve(Some("json")), OutputFormat::Json);
        assert_eq!(OutputFormat::Csv.resolve(Some("json")), OutputFormat::Csv);
        assert_eq!(OutputFormat::Auto.resolve(Some("xml")), OutputFormat::Auto);
        assert_eq!(OutputFormat::Auto.resolve(None), OutputFormat::Auto);
    }
}
