//! Record parser
//!
//! Decodes CSV (via `csv`) and XLS/XLSX (via `calamine`) into one uniform
//! [`RawRecord`] shape so the validator and distributor never see the format.
//! Output preserves source row order.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, warn};

use super::format::FileFormat;

/// Parser errors
#[derive(Debug, Error)]
pub enum IngestError {
    /// Neither MIME type nor extension names CSV, XLS or XLSX
    #[error("Unsupported format (content type {content_type:?}, file {file_name:?})")]
    UnsupportedFormat {
        content_type: Option<String>,
        file_name: String,
    },

    /// Stream-level or workbook-level decoding failure
    #[error("Parse error: {0}")]
    Parse(String),

    /// Workbook has no sheets or its first sheet has no data rows
    #[error("Workbook has no data rows")]
    EmptyInput,
}

/// One source row: column name → raw string value
///
/// Absent and empty cells are equivalent; spreadsheet rows omit empty cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Decode file content of a known format
///
/// CPU-bound; async callers run it through `spawn_blocking`.
pub fn parse_records(format: FileFormat, bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
    match format {
        FileFormat::Csv => parse_csv(bytes),
        FileFormat::Xls | FileFormat::Xlsx => parse_workbook(bytes),
    }
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::Parse(format!("Unreadable CSV header: {}", e)))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        match result {
            Ok(row) => {
                records.push(RawRecord::from_pairs(
                    headers.iter().cloned().zip(row.iter().map(str::to_string)),
                ));
            }
            Err(e) => match e.kind() {
                csv::ErrorKind::Io(_) => {
                    return Err(IngestError::Parse(format!("CSV stream error: {}", e)));
                }
                _ => {
                    skipped += 1;
                    warn!(error = %e, "Skipping malformed CSV row");
                }
            },
        }
    }

    debug!(rows = records.len(), skipped, "CSV decoded");
    Ok(records)
}

fn parse_workbook(bytes: &[u8]) -> Result<Vec<RawRecord>, IngestError> {
    // Workbook type is sniffed from content, so a mislabeled XLS/XLSX still opens
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::Parse(format!("Unreadable workbook: {}", e)))?;

    let range = match workbook.worksheet_range_at(0) {
        None => return Err(IngestError::EmptyInput),
        Some(Err(e)) => {
            return Err(IngestError::Parse(format!("Unreadable first worksheet: {}", e)));
        }
        Some(Ok(range)) => range,
    };

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Err(IngestError::EmptyInput);
    };

    let headers: Vec<Option<String>> = header_row
        .iter()
        .map(|cell| Some(cell_to_string(cell)).filter(|h| !h.is_empty()))
        .collect();

    let records: Vec<RawRecord> = rows
        .map(|row| {
            RawRecord::from_pairs(headers.iter().zip(row).filter_map(|(header, cell)| {
                let header = header.as_ref()?;
                let value = cell_to_string(cell);
                (!value.is_empty()).then(|| (header.clone(), value))
            }))
        })
        .filter(|record| !record.is_empty())
        .collect();

    if records.is_empty() {
        return Err(IngestError::EmptyInput);
    }

    debug!(rows = records.len(), "Workbook decoded");
    Ok(records)
}

/// Render a cell as text; whole-number floats print without a fraction
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_rows_keyed_by_header_in_order() {
        let csv = b"FirstName,Phone,Notes\nAda,555-0100,first\nGrace,555-0101,second\n";

        let records = parse_records(FileFormat::Csv, csv).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("FirstName"), Some("Ada"));
        assert_eq!(records[0].get("Phone"), Some("555-0100"));
        assert_eq!(records[1].get("Notes"), Some("second"));
    }

    #[test]
    fn test_csv_bom_stripped_from_first_header() {
        let csv = "\u{feff}FirstName,Phone,Notes\nAda,1,n\n";

        let records = parse_records(FileFormat::Csv, csv.as_bytes()).unwrap();

        assert_eq!(records[0].get("FirstName"), Some("Ada"));
    }

    #[test]
    fn test_csv_short_row_kept_with_missing_keys() {
        let csv = b"FirstName,Phone,Notes\nAda,1\n";

        let records = parse_records(FileFormat::Csv, csv).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("Notes"), None);
    }

    #[test]
    fn test_csv_malformed_row_skipped_not_fatal() {
        let mut csv = b"FirstName,Phone,Notes\nAda,1,ok\n".to_vec();
        csv.extend_from_slice(b"Bad,\xff\xfe,row\n");
        csv.extend_from_slice(b"Grace,2,ok\n");

        let records = parse_records(FileFormat::Csv, &csv).unwrap();

        let names: Vec<_> = records.iter().filter_map(|r| r.get("FirstName")).collect();
        assert_eq!(names, vec!["Ada", "Grace"]);
    }

    #[test]
    fn test_csv_empty_input_yields_no_records() {
        assert!(parse_records(FileFormat::Csv, b"").unwrap().is_empty());
        assert!(parse_records(FileFormat::Csv, b"FirstName,Phone,Notes\n")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_garbage_workbook_is_parse_error() {
        let result = parse_records(FileFormat::Xlsx, b"definitely not a zip archive");
        assert!(matches!(result, Err(IngestError::Parse(_))));
    }

    #[test]
    fn test_xls_workbook_rows() {
        let bytes = include_bytes!("../../tests/fixtures/leads.xls");

        let records = parse_records(FileFormat::Xls, bytes).unwrap();

        assert_eq!(records.len(), 9);
        assert_eq!(records[0].get("FirstName"), Some("Ada"));
        assert_eq!(records[0].get("Phone"), Some("555-0100"));
        assert_eq!(records[1].get("Phone"), Some("5550101"));
        assert_eq!(records[2].get("Notes"), None);
        assert_eq!(records[5].get("Phone"), None);
        assert_eq!(records[8].get("Notes"), Some("Send brochure"));
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(cell_to_string(&Data::Float(5551234.0)), "5551234");
        assert_eq!(cell_to_string(&Data::Int(42)), "42");
        assert_eq!(cell_to_string(&Data::String("x".to_string())), "x");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }
}
