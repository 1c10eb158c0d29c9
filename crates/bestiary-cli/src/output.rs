//! Output formatting for the CLI.

use crate::error::Result;
use bestiary_domain::Record;
use bestiary_extractor::{record_to_json, ReconciliationOutcome};
use colored::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format parsed records.
    pub fn format_records(&self, records: &[Record]) -> Result<String> {
        match self.format {
            OutputFormat::Json => format_json(records),
            OutputFormat::Table => Ok(self.format_records_table(records)),
        }
    }

    fn format_records_table(&self, records: &[Record]) -> String {
        if records.is_empty() {
            return self.colorize("No records found.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["Category", "Latin", "German", "Russian"]);
        for record in records {
            builder.push_record([
                &record.category,
                &record.latin,
                &record.german,
                &record.russian,
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        table.to_string()
    }

    /// One-line summary of a reconciliation run.
    pub fn outcome_summary(&self, outcome: &ReconciliationOutcome, expected: usize) -> String {
        let message = format!(
            "{} / {} records reconciled ({} retry rounds, {} missing)",
            outcome.results.len(),
            expected,
            outcome.retry_rounds,
            outcome.missing.len()
        );

        if outcome.cancelled {
            self.warning(&format!("Cancelled: {}", message))
        } else if outcome.is_complete() {
            self.success(&message)
        } else {
            self.warning(&message)
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn format_json(records: &[Record]) -> Result<String> {
    let values: Vec<Value> = records.iter().map(record_to_json).collect();
    Ok(serde_json::to_string_pretty(&values)?)
}

/// Write results as one pretty-printed UTF-8 JSON array.
pub fn write_results(path: &Path, results: &[Value]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(results)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Record> {
        vec![Record::new("Affen", "Pan troglodytes", "Schimpanse", "Шимпанзе")]
    }

    fn outcome(results: usize, missing: Vec<Record>, cancelled: bool) -> ReconciliationOutcome {
        ReconciliationOutcome {
            results: (0..results).map(|i| json!({ "latin": i })).collect(),
            missing,
            retry_rounds: 1,
            batches: Vec::new(),
            cancelled,
        }
    }

    #[test]
    fn test_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_records(&records()).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["german"], "Schimpanse");
    }

    #[test]
    fn test_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_records(&records()).unwrap();
        assert!(output.contains("Latin"));
        assert!(output.contains("Pan troglodytes"));
    }

    #[test]
    fn test_empty_records() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_records(&[]).unwrap();
        assert!(output.contains("No records found"));
    }

    #[test]
    fn test_summary() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(
            formatter.outcome_summary(&outcome(2, Vec::new(), false), 2),
            "✓ 2 / 2 records reconciled (1 retry rounds, 0 missing)"
        );
        assert!(formatter
            .outcome_summary(&outcome(1, records(), false), 2)
            .starts_with("⚠ 1 / 2"));
        assert!(formatter
            .outcome_summary(&outcome(0, records(), true), 1)
            .starts_with("⚠ Cancelled"));
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        let results = vec![json!({"latin": "Panthera leo", "russian": "Лев"})];

        write_results(&path, &results).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("Лев"));
        let parsed: Vec<Value> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, results);
    }
}
