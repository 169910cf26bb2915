//! Parse error diagnostics pointing into the offending file

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Syntax or shape error in a YAML/JSON input file
#[derive(Debug, Error, Diagnostic)]
#[error("{format} error: {message}")]
#[diagnostic(code(calrisk::yaml::syntax))]
pub struct SyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    format: &'static str,

    message: String,
}

impl SyntaxError {
    pub fn from_yaml(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));
        Self::at(err.to_string(), "YAML", source, filename, line, column)
    }

    pub fn from_json(err: &serde_json::Error, source: &str, filename: &str) -> Self {
        let line = err.line().max(1);
        let column = err.column().max(1);
        Self::at(err.to_string(), "JSON", source, filename, line, column)
    }

    fn at(message: String, format: &'static str, source: &str, filename: &str, line: usize, column: usize) -> Self {
        let offset = line_col_to_offset(source, line, column);
        let help = generate_help(&message);
        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1).min(source.len().max(1))),
            help,
            format,
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure to load an input file
#[derive(Debug, Error, Diagnostic)]
pub enum DocumentError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("Cannot read {path}: {source}")]
    #[diagnostic(code(calrisk::yaml::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} contains no {what}")]
    #[diagnostic(code(calrisk::yaml::empty))]
    Empty { path: String, what: &'static str },
}

/// Byte offset of a 1-based line/column, clamped to the source
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let mut start = 0;
    for _ in 1..line {
        match source[start..].find('\n') {
            Some(i) => start += i + 1,
            None => return source.len().saturating_sub(1),
        }
    }
    let line_text = source[start..].split('\n').next().unwrap_or("");
    let within = line_text
        .char_indices()
        .nth(column.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(line_text.len());
    start + within
}

fn generate_help(message: &str) -> Option<String> {
    let msg = message.to_lowercase();

    if msg.contains("tab") {
        return Some("YAML requires spaces for indentation, not tabs".to_string());
    }
    if msg.contains("duplicate") {
        return Some("Each key can only appear once per record".to_string());
    }
    if msg.contains("mapping values are not allowed") || msg.contains("expected block end") {
        return Some("Check the indentation and the space after ':'".to_string());
    }
    if msg.contains("unknown variant") && (msg.contains("direct") || msg.contains("derived")) {
        return Some("measurementType is either 'direct' or 'derived'".to_string());
    }
    if msg.contains("trailing comma") {
        return Some("JSON does not allow a comma after the last item".to_string());
    }
    if msg.contains("invalid type") {
        return Some("Numeric fields take a number or a numeric string".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_to_offset() {
        let source = "line1\nline2\nline3";
        assert_eq!(line_col_to_offset(source, 1, 1), 0);
        assert_eq!(line_col_to_offset(source, 2, 1), 6);
        assert_eq!(line_col_to_offset(source, 3, 3), 14);
        assert_eq!(line_col_to_offset(source, 9, 1), 16);
    }

    #[test]
    fn test_help_generation() {
        assert!(generate_help("found a tab character").is_some());
        assert!(generate_help("unknown variant `indirect`, expected `direct` or `derived`").is_some());
        assert!(generate_help("some random error").is_none());
    }

    #[test]
    fn test_json_error_location() {
        let source = "{\n  \"a\": 1,\n}";
        let err = serde_json::from_str::<serde_json::Value>(source).unwrap_err();
        let syntax = SyntaxError::from_json(&err, source, "point.json");
        assert!(syntax.message().contains("trailing comma"));
        assert_eq!(syntax.format, "JSON");
    }
}
