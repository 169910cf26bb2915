//! Shared helper functions for CLI commands

use console::{style, StyledObject};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::analysis::breakdown::to_precision;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::solver::Bisection;
use crate::core::Config;

/// Effective settings of one command run
pub struct Session {
    pub config: Config,
    pub format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
}

impl Session {
    pub fn load(global: &GlobalOpts) -> Self {
        let config = Config::load();
        let format = global.format.resolve(config.default_format.as_deref());
        Self {
            config,
            format,
            quiet: global.quiet,
            verbose: global.verbose && !global.quiet,
        }
    }

    pub fn solver(&self) -> Bisection {
        Bisection {
            max_iterations: self.config.max_iterations(),
            ..Bisection::default()
        }
    }

    /// Progress line on stderr, hidden by `--quiet`
    pub fn info(&self, message: impl std::fmt::Display) {
        if !self.quiet {
            eprintln!("{} {}", style("⚙").cyan(), message);
        }
    }

    /// Detail line on stderr, shown only with `--verbose`
    pub fn detail(&self, message: impl std::fmt::Display) {
        if self.verbose {
            eprintln!("   {}", style(message).dim());
        }
    }

    pub fn warn(&self, message: impl std::fmt::Display) {
        eprintln!("{} {}", style("!").yellow().bold(), message);
    }
}

/// Print a value as YAML or JSON; `false` for the tabular formats
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
            Ok(true)
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(value).into_diagnostic()?);
            Ok(true)
        }
        OutputFormat::Auto | OutputFormat::Csv => Ok(false),
    }
}

/// Four significant figures, or `-` when absent
pub fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| to_precision(v, 4))
}

pub fn fmt_num(value: f64) -> String {
    to_precision(value, 4)
}

/// A fraction as a percentage with three decimals
pub fn fmt_percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3} %", v * 100.0))
}

/// Green when a requirement is met, red when not, dim when unknown
pub fn verdict(ok: Option<bool>) -> StyledObject<&'static str> {
    match ok {
        Some(true) => style("pass").green(),
        Some(false) => style("fail").red().bold(),
        None => style("n/a").dim(),
    }
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_opt() {
        assert_eq!(fmt_opt(None), "-");
        assert_eq!(fmt_opt(Some(10.2042)), "10.20");
    }

    #[test]
    fn test_fmt_percent() {
        assert_eq!(fmt_percent(Some(0.0123456)), "1.235 %");
        assert_eq!(fmt_percent(None), "-");
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("±1 µV", 5), "±1 µV");
    }
}
