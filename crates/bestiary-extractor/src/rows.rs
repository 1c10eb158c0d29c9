//! Turn raw table rows into catalogue records

use bestiary_domain::Record;
use tracing::debug;

/// Default suffix marking a category header row
pub const DEFAULT_CATEGORY_DELIMITER: char = ':';

/// Parses tabular rows into records, carrying the category from header rows
///
/// Expected column order is `latin, german, russian`. A row whose first
/// non-empty cell ends with the category delimiter starts a new category.
/// Malformed rows degrade to partially empty records; there are no errors.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    delimiter: char,
}

impl RecordExtractor {
    /// Create an extractor with the default `:` delimiter
    pub fn new() -> Self {
        Self {
            delimiter: DEFAULT_CATEGORY_DELIMITER,
        }
    }

    /// Use a different category delimiter
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Extract records from rows of cells
    pub fn extract<R>(&self, rows: impl IntoIterator<Item = R>) -> Vec<Record>
    where
        R: AsRef<[String]>,
    {
        let mut records = Vec::new();
        let mut category = String::new();

        for row in rows {
            let cells = row.as_ref();
            let Some(first) = cells
                .iter()
                .map(|c| c.trim())
                .find(|c| !c.is_empty())
            else {
                continue;
            };

            if first.ends_with(self.delimiter) {
                category = first.trim_end_matches(self.delimiter).trim().to_string();
                debug!("Category header: {}", category);
                continue;
            }

            let cell = |idx: usize| {
                cells
                    .get(idx)
                    .map(|c| c.trim().to_string())
                    .unwrap_or_default()
            };

            let record = Record::new(category.clone(), cell(0), cell(1), cell(2));
            if record.is_blank() {
                continue;
            }
            records.push(record);
        }

        records
    }
}

impl Default for RecordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_category_is_inherited() {
        let input = rows(&[
            &["Affen:"],
            &["Pan troglodytes", "Schimpanse", "Шимпанзе"],
            &["Gorilla gorilla", "Gorilla", "Горилла"],
            &["Raubtiere:", "", ""],
            &["Panthera leo", "Löwe", "Лев"],
        ]);

        let records = RecordExtractor::new().extract(&input);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].category, "Affen");
        assert_eq!(records[1].category, "Affen");
        assert_eq!(records[2].category, "Raubtiere");
        assert_eq!(records[2].russian, "Лев");
    }

    #[test]
    fn test_no_category_before_first_header() {
        let input = rows(&[&["Panthera leo", "Löwe", "Лев"]]);
        let records = RecordExtractor::new().extract(&input);
        assert_eq!(records[0].category, "");
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let input = rows(&[&[], &["", "  ", ""], &["Panthera leo", "", ""]]);
        let records = RecordExtractor::new().extract(&input);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_missing_trailing_cells_default_to_empty() {
        let input = rows(&[&["Pan troglodytes"]]);
        let records = RecordExtractor::new().extract(&input);
        assert_eq!(records[0].latin, "Pan troglodytes");
        assert_eq!(records[0].german, "");
        assert_eq!(records[0].russian, "");
    }

    #[test]
    fn test_cells_are_trimmed() {
        let input = rows(&[&["  Pan troglodytes ", " Schimpanse", "Шимпанзе  ", "extra"]]);
        let records = RecordExtractor::new().extract(&input);
        assert_eq!(
            records[0],
            Record::new("", "Pan troglodytes", "Schimpanse", "Шимпанзе")
        );
    }

    #[test]
    fn test_header_found_in_later_column() {
        let input = rows(&[&["", "Vögel:"], &["Aquila chrysaetos", "Steinadler", "Беркут"]]);
        let records = RecordExtractor::new().extract(&input);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, "Vögel");
    }

    #[test]
    fn test_only_later_columns_filled_is_skipped() {
        let input = rows(&[&["", "", "", "note"]]);
        let records = RecordExtractor::new().extract(&input);
        assert!(records.is_empty());
    }

    #[test]
    fn test_custom_delimiter() {
        let input = rows(&[&["Fische;"], &["Esox lucius", "Hecht", "Щука"]]);
        let records = RecordExtractor::new().with_delimiter(';').extract(&input);
        assert_eq!(records[0].category, "Fische");
    }
}
