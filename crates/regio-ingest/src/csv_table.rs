use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;

use crate::error::{IngestError, Result};

/// A fully materialized CSV file with normalized headers and cells.
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub path: PathBuf,
    /// Field separator detected from the header line.
    pub delimiter: u8,
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

#[derive(Debug, Clone)]
pub struct CsvRow {
    /// 1-based line in the source file.
    pub line: usize,
    pub cells: Vec<String>,
}

impl CsvRow {
    pub fn get(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }
}

impl CsvTable {
    /// Index of a column by exact (normalized) name.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.find_column(&[name])
            .ok_or_else(|| self.missing_column(name))
    }

    /// Index of the first header matching one of `names`, ignoring case.
    pub fn find_column(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|name| {
            self.headers
                .iter()
                .position(|header| header.eq_ignore_ascii_case(name))
        })
    }

    pub fn missing_column(&self, name: &str) -> IngestError {
        IngestError::MissingColumn {
            path: self.path.clone(),
            column: name.to_string(),
            found: self.headers.join(", "),
        }
    }

    /// Parse a numeric cell, or `None` when it is not a finite number.
    ///
    /// Whitespace (thousands grouping) is dropped. In `;`-separated files a
    /// `,` is the decimal mark.
    pub fn number(&self, raw: &str) -> Option<f64> {
        let mut cleaned: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
        if self.delimiter == b';' {
            cleaned = cleaned.replace(',', ".");
        }
        cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
    }
}

/// An empty cell or one holding a configured missing-value marker.
pub fn is_missing(raw: &str, markers: &[String]) -> bool {
    raw.is_empty() || markers.iter().any(|marker| marker == raw)
}

fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}').trim_matches('"');
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

// Statistics portals export both `,` and `;` separated files.
fn sniff_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).map_err(|err| IngestError::io(path, err))?;
    let mut first_line = String::new();
    BufReader::new(file)
        .read_line(&mut first_line)
        .map_err(|err| IngestError::io(path, err))?;
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    Ok(if semicolons > commas { b';' } else { b',' })
}

pub fn read_csv_table(path: &Path) -> Result<CsvTable> {
    let delimiter = sniff_delimiter(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|err| IngestError::csv(path, err))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| IngestError::csv(path, err))?
        .iter()
        .map(normalize_header)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| IngestError::csv(path, err))?;
        let cells: Vec<String> = record.iter().map(normalize_cell).collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }
        let line = record
            .position()
            .map_or(rows.len() + 2, |position| position.line() as usize);
        rows.push(CsvRow { line, cells });
    }
    Ok(CsvTable {
        path: path.to_path_buf(),
        delimiter,
        headers,
        rows,
    })
}
