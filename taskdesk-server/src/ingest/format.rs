//! Upload format detection
//!
//! Declared MIME type is checked first, then the file extension
//! (case-insensitive). One exception: browsers on Windows routinely label
//! `.csv` files `application/vnd.ms-excel`, so that pairing is read as CSV.

use serde::Serialize;
use std::fmt;
use std::path::Path;

use super::parser::IngestError;

pub const MIME_CSV: &str = "text/csv";
pub const MIME_XLS: &str = "application/vnd.ms-excel";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Accepted upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Xls,
    Xlsx,
}

impl FileFormat {
    /// Pick the format for an upload, or fail with `UnsupportedFormat`
    pub fn detect(content_type: Option<&str>, file_name: &str) -> Result<Self, IngestError> {
        let by_extension = Self::from_extension(file_name);

        if let Some(by_mime) = content_type.and_then(Self::from_mime) {
            if by_mime == FileFormat::Xls && by_extension == Some(FileFormat::Csv) {
                return Ok(FileFormat::Csv);
            }
            return Ok(by_mime);
        }

        by_extension.ok_or_else(|| IngestError::UnsupportedFormat {
            content_type: content_type.map(str::to_string),
            file_name: file_name.to_string(),
        })
    }

    /// Match a MIME type, ignoring parameters such as `; charset=utf-8`
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            MIME_CSV => Some(FileFormat::Csv),
            MIME_XLS => Some(FileFormat::Xls),
            MIME_XLSX => Some(FileFormat::Xlsx),
            _ => None,
        }
    }

    pub fn from_extension(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();

        match extension.as_str() {
            "csv" => Some(FileFormat::Csv),
            "xls" => Some(FileFormat::Xls),
            "xlsx" => Some(FileFormat::Xlsx),
            _ => None,
        }
    }

    pub fn is_spreadsheet(self) -> bool {
        matches!(self, FileFormat::Xls | FileFormat::Xlsx)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::Csv => "CSV",
            FileFormat::Xls => "XLS",
            FileFormat::Xlsx => "XLSX",
        };
        f.write_str(name)
    }
}
