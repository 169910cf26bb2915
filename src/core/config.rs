//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::entities::session::RiskRequirements;

/// Calrisk configuration with layered hierarchy
///
/// Percent-valued fields use the same convention as test-point files
/// (`95` means 95 %).
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Coverage probability for expanded uncertainty, percent
    pub confidence: Option<f64>,

    /// Target end-of-period reliability, percent
    pub reliability: Option<f64>,

    /// Calibration interval, in the user's interval unit (months by default)
    pub calibration_interval: Option<f64>,

    /// Assumed observed reliability for interval forecasts, percent
    pub assumed_reliability: Option<f64>,

    /// Required test uncertainty ratio
    pub required_tur: Option<f64>,

    /// Maximum acceptable probability of false accept, percent
    pub required_pfa: Option<f64>,

    /// Iteration budget for guard-band and interval solvers
    pub max_iterations: Option<usize>,

    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut config = Self::load_files(Self::global_config_path().as_deref(), &cwd);
        config.merge(Self::from_env());
        config
    }

    /// Merge the global file and the nearest project file above `start`
    pub fn load_files(global: Option<&Path>, start: &Path) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (applied by the accessors)

        // 2. Global user config (~/.config/calrisk/config.yaml)
        if let Some(global) = global.and_then(Self::read_file) {
            config.merge(global);
        }

        // 3. Project config (.calrisk/config.yaml in this or a parent directory)
        if let Some(project) = Self::discover_project_config(start).and_then(|p| Self::read_file(&p)) {
            config.merge(project);
        }

        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        let contents = std::fs::read_to_string(path).ok()?;
        serde_yml::from_str::<Config>(&contents).ok()
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "calrisk").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Walk up from `start` looking for `.calrisk/config.yaml`
    pub fn discover_project_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.canonicalize().ok()?;
        loop {
            let candidate = current.join(".calrisk").join("config.yaml");
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// 4. Environment variables
    fn from_env() -> Config {
        fn number<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
        }

        Config {
            confidence: number("CALRISK_CONFIDENCE"),
            reliability: number("CALRISK_RELIABILITY"),
            calibration_interval: number("CALRISK_CALIBRATION_INTERVAL"),
            assumed_reliability: number("CALRISK_ASSUMED_RELIABILITY"),
            required_tur: number("CALRISK_REQUIRED_TUR"),
            required_pfa: number("CALRISK_REQUIRED_PFA"),
            max_iterations: number("CALRISK_MAX_ITERATIONS"),
            default_format: std::env::var("CALRISK_FORMAT").ok(),
        }
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Config) {
        if other.confidence.is_some() {
            self.confidence = other.confidence;
        }
        if other.reliability.is_some() {
            self.reliability = other.reliability;
        }
        if other.calibration_interval.is_some() {
            self.calibration_interval = other.calibration_interval;
        }
        if other.assumed_reliability.is_some() {
            self.assumed_reliability = other.assumed_reliability;
        }
        if other.required_tur.is_some() {
            self.required_tur = other.required_tur;
        }
        if other.required_pfa.is_some() {
            self.required_pfa = other.required_pfa;
        }
        if other.max_iterations.is_some() {
            self.max_iterations = other.max_iterations;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
    }

    /// Risk requirements with configured values over the built-in defaults
    pub fn requirements(&self) -> RiskRequirements {
        let defaults = RiskRequirements::default();
        RiskRequirements {
            uncertainty_confidence: self.confidence.unwrap_or(defaults.uncertainty_confidence),
            reliability: self.reliability.unwrap_or(defaults.reliability),
            cal_int: self.calibration_interval.unwrap_or(defaults.cal_int),
            meas_rel_calc_assumed: self.assumed_reliability.unwrap_or(defaults.meas_rel_calc_assumed),
            needed_tur: self.required_tur.unwrap_or(defaults.needed_tur),
            req_pfa: self.required_pfa.unwrap_or(defaults.req_pfa),
        }
    }

    /// Solver iteration budget
    pub fn max_iterations(&self) -> usize {
        self.max_iterations.filter(|n| *n > 0).unwrap_or(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config {
            reliability: Some(80.0),
            required_pfa: Some(2.0),
            ..Default::default()
        };
        base.merge(Config {
            reliability: Some(95.0),
            ..Default::default()
        });
        assert_eq!(base.reliability, Some(95.0));
        assert_eq!(base.required_pfa, Some(2.0));
    }

    #[test]
    fn test_requirements_defaults() {
        let req = Config::default().requirements();
        assert_eq!(req.uncertainty_confidence, 95.0);
        assert_eq!(req.reliability, 85.0);
        assert_eq!(req.needed_tur, 4.0);
        assert_eq!(req.req_pfa, 2.0);
        assert_eq!(Config::default().max_iterations(), 100);
    }

    #[test]
    fn test_project_config_discovered_from_subdirectory() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".calrisk")).unwrap();
        std::fs::write(
            tmp.path().join(".calrisk/config.yaml"),
            "reliability: 90\nrequired_tur: 2.5\n",
        )
        .unwrap();
        let nested = tmp.path().join("points/dcv");
        std::fs::create_dir_all(&nested).unwrap();

        let config = Config::load_files(None, &nested);
        assert_eq!(config.reliability, Some(90.0));
        assert_eq!(config.requirements().needed_tur, 2.5);
    }

    #[test]
    fn test_project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.yaml");
        std::fs::write(&global, "reliability: 70\nconfidence: 99\n").unwrap();
        std::fs::create_dir_all(tmp.path().join(".calrisk")).unwrap();
        std::fs::write(tmp.path().join(".calrisk/config.yaml"), "reliability: 90\n").unwrap();

        let config = Config::load_files(Some(&global), tmp.path());
        assert_eq!(config.reliability, Some(90.0));
        assert_eq!(config.confidence, Some(99.0));
    }

    #[test]
    fn test_malformed_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.yaml");
        std::fs::write(&global, "reliability: [not a number\n").unwrap();
        let config = Config::load_files(Some(&global), tmp.path());
        assert!(config.reliability.is_none());
    }
}
