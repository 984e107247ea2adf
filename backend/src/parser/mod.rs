//! Source readers: CSV exports (encoding and delimiter auto-detection) and
//! spreadsheet workbooks.
//!
//! Every reader produces a [`RowSet`] with the header row as column names,
//! untouched apart from decoding; empty cells become `null`.

pub mod xlsx;

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{SourceError, SourceResult};
use crate::models::{Record, RowSet};

/// Kind of source file, decided from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Workbook,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> SourceResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Ok(Self::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Workbook),
            _ => Err(SourceError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// A declared source: a file path and, for workbooks, an optional sheet.
///
/// Written as `path` or `path#Sheet Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpec {
    pub path: PathBuf,
    pub sheet: Option<String>,
}

impl SourceSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: None,
        }
    }

    pub fn parse(spec: &str) -> Self {
        match spec.rsplit_once('#') {
            Some((path, sheet)) if !sheet.is_empty() => Self {
                path: PathBuf::from(path),
                sheet: Some(sheet.to_string()),
            },
            _ => Self::new(spec),
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "{}#{}", self.path.display(), sheet),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Metadata about one loaded source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub name: String,
    pub format: SourceFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub columns: Vec<String>,
    pub row_count: usize,
}

/// A source read into memory.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub info: SourceInfo,
    pub rows: RowSet,
}

/// Read one source, dispatching on its extension.
pub fn read_source(spec: &SourceSpec) -> SourceResult<LoadedSource> {
    match SourceFormat::from_path(&spec.path)? {
        SourceFormat::Csv => {
            let bytes = std::fs::read(&spec.path)?;
            let parsed = parse_bytes_auto(&bytes)?;
            Ok(LoadedSource {
                info: SourceInfo {
                    name: spec.to_string(),
                    format: SourceFormat::Csv,
                    encoding: Some(parsed.encoding),
                    delimiter: Some(parsed.delimiter),
                    sheet: None,
                    columns: parsed.rows.columns.clone(),
                    row_count: parsed.rows.len(),
                },
                rows: parsed.rows,
            })
        }
        SourceFormat::Workbook => {
            let (sheet, rows) = xlsx::read_workbook(&spec.path, spec.sheet.as_deref())?;
            Ok(LoadedSource {
                info: SourceInfo {
                    name: spec.to_string(),
                    format: SourceFormat::Workbook,
                    encoding: None,
                    delimiter: None,
                    sheet: Some(sheet),
                    columns: rows.columns.clone(),
                    row_count: rows.len(),
                },
                rows,
            })
        }
    }
}

// =============================================================================
// CSV
// =============================================================================

/// Result of parsing CSV bytes, with the detected settings.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub rows: RowSet,
    pub encoding: String,
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string; unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> SourceResult<ParsedCsv> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let rows = parse_csv_str(&content, delimiter)?;

    Ok(ParsedCsv {
        rows,
        encoding,
        delimiter,
    })
}

/// Parse CSV text with an explicit delimiter.
///
/// Short rows are padded with `null`; cells past the header width are dropped.
pub fn parse_csv_str(content: &str, delimiter: char) -> SourceResult<RowSet> {
    if content.trim().is_empty() {
        return Err(SourceError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SourceError::Parse(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (line_idx, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| SourceError::Parse(format!("line {}: {}", line_idx + 2, e)))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut row = Record::new();
        for (i, header) in headers.iter().enumerate() {
            let value = match record.get(i) {
                Some(cell) if !cell.is_empty() => Value::String(cell.to_string()),
                _ => Value::Null,
            };
            // Duplicate headers keep the first cell, as later ones share the key.
            row.entry(header.clone()).or_insert(value);
        }
        rows.push(row);
    }

    let mut columns = Vec::with_capacity(headers.len());
    for header in headers {
        if !columns.contains(&header) {
            columns.push(header);
        }
    }

    Ok(RowSet::new(columns, rows))
}
