//! Tabular output: rounded tables on a terminal, CSV for pipes

use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

/// Rows with a header, rendered as a table or CSV
#[derive(Debug, Clone, Default)]
pub struct Rows {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Rows {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn render(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.headers.clone());
        for row in &self.rows {
            builder.push_record(row.clone());
        }
        builder.build().with(Style::rounded()).to_string()
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers).into_diagnostic()?;
        for row in &self.rows {
            writer.write_record(row).into_diagnostic()?;
        }
        let bytes = writer.into_inner().map_err(|e| miette::miette!("{}", e))?;
        String::from_utf8(bytes).into_diagnostic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_quotes_commas() {
        let mut rows = Rows::new(["name", "value"]);
        rows.push(["a, b", "1"]);
        assert_eq!(rows.to_csv().unwrap(), "name,value\n\"a, b\",1\n");
    }

    #[test]
    fn test_render_contains_cells() {
        let mut rows = Rows::new(["unit", "quantity"]);
        rows.push(["mV", "Voltage"]);
        let text = rows.render();
        assert!(text.contains("mV"));
        assert!(text.contains("quantity"));
        assert_eq!(rows.len(), 1);
    }
}
