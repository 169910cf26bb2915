//! Loading test-point and instrument files
//!
//! Files ending in `.json` are read as JSON, everything else as YAML. Errors
//! carry the file contents so the CLI can point at the offending line.

pub mod diagnostics;

pub use diagnostics::{DocumentError, SyntaxError};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

use crate::entities::{Instrument, RequirementOverrides, RiskRequirements, TestPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

/// Top-level layout of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    List,
    Session,
    Single,
}

fn parse<T: DeserializeOwned + 'static>(source: &str, filename: &str, format: Format) -> Result<T, SyntaxError> {
    match format {
        Format::Yaml => serde_yml::from_str(source).map_err(|e| SyntaxError::from_yaml(&e, source, filename)),
        Format::Json => serde_json::from_str(source).map_err(|e| SyntaxError::from_json(&e, source, filename)),
    }
}

fn shape(source: &str, filename: &str, format: Format, list_key: &str) -> Result<Shape, SyntaxError> {
    let value: serde_json::Value = match format {
        Format::Yaml => {
            let v: serde_yml::Value = parse(source, filename, format)?;
            // Shape only needs the top level; non-JSON scalars map to null
            serde_json::to_value(&v).unwrap_or(serde_json::Value::Null)
        }
        Format::Json => parse(source, filename, format)?,
    };
    Ok(match value {
        serde_json::Value::Array(_) => Shape::List,
        serde_json::Value::Object(map) if map.contains_key(list_key) => Shape::Session,
        _ => Shape::Single,
    })
}

fn read(path: &Path) -> Result<(String, String), DocumentError> {
    let source = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok((source, path.display().to_string()))
}

/// Parse one YAML (or JSON) file into `T`
pub fn parse_yaml_file<T: DeserializeOwned + 'static>(path: &Path) -> Result<T, DocumentError> {
    let (source, filename) = read(path)?;
    Ok(parse(&source, &filename, Format::of(path))?)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    test_points: Vec<TestPoint>,
    #[serde(default)]
    unc_req: Option<RequirementOverrides>,
}

/// Test points read from one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestPointSet {
    pub points: Vec<TestPoint>,
    /// File-wide policy overrides, below each point's own
    pub unc_req: Option<RequirementOverrides>,
}

impl TestPointSet {
    /// Policy for `point`: configured base, then file, then point overrides
    pub fn requirements(&self, point: &TestPoint, base: RiskRequirements) -> RiskRequirements {
        let file = match &self.unc_req {
            Some(overrides) => overrides.apply(base),
            None => base,
        };
        point.requirements(file)
    }
}

fn parse_test_points(source: &str, filename: &str, format: Format) -> Result<TestPointSet, DocumentError> {
    let set = match shape(source, filename, format, "testPoints")? {
        Shape::List => TestPointSet {
            points: parse(source, filename, format)?,
            unc_req: None,
        },
        Shape::Session => {
            let session: Session = parse(source, filename, format)?;
            TestPointSet {
                points: session.test_points,
                unc_req: session.unc_req,
            }
        }
        Shape::Single => TestPointSet {
            points: vec![parse(source, filename, format)?],
            unc_req: None,
        },
    };
    if set.points.is_empty() {
        return Err(DocumentError::Empty {
            path: filename.to_string(),
            what: "test points",
        });
    }
    Ok(set)
}

/// Load a test point, a list of them, or a session with `testPoints`
pub fn load_test_points(path: &Path) -> Result<TestPointSet, DocumentError> {
    let (source, filename) = read(path)?;
    parse_test_points(&source, &filename, Format::of(path))
}

/// Load one instrument or a list of instruments
pub fn load_instruments(path: &Path) -> Result<Vec<Instrument>, DocumentError> {
    let (source, filename) = read(path)?;
    let format = Format::of(path);
    let instruments = match shape(&source, &filename, format, "instruments")? {
        Shape::List => parse(&source, &filename, format)?,
        Shape::Session => {
            #[derive(Deserialize)]
            struct Library {
                instruments: Vec<Instrument>,
            }
            parse::<Library>(&source, &filename, format)?.instruments
        }
        Shape::Single => vec![parse(&source, &filename, format)?],
    };
    if instruments.is_empty() {
        return Err(DocumentError::Empty {
            path: filename,
            what: "instruments",
        });
    }
    Ok(instruments)
}
