//! Load exported premium / claim / outstanding-claim sheets

use crate::error::{DashboardError, DashboardResult};
use csv::ReaderBuilder;
use log::info;
use std::path::Path;

/// A sheet exactly as exported: header row plus untyped cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Column headers in file order
    pub headers: Vec<String>,
    /// Data rows; every row has `headers.len()` cells
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows.into_iter().map(|row| pad_row(row, width)).collect();
        Self { headers, rows }
    }

    /// Build a table from string literals, mostly useful in tests
    pub fn from_strs(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }
}

/// Short rows are padded with empty cells, long rows truncated
fn pad_row(mut row: Vec<String>, width: usize) -> Vec<String> {
    row.resize(width, String::new());
    row
}

/// Load a sheet from a CSV file
pub fn load_sheet<P: AsRef<Path>>(path: P) -> DashboardResult<RawTable> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DashboardError::MissingInput { path: path.to_path_buf() });
    }
    let name = path.display().to_string();
    let file = std::fs::File::open(path)?;
    let table = read_sheet(file, &name)?;
    info!("Loaded {} rows from {}", table.len(), name);
    Ok(table)
}

/// Load a sheet from any reader (e.g., an uploaded byte buffer)
pub fn load_sheet_from_reader<R: std::io::Read>(reader: R) -> DashboardResult<RawTable> {
    read_sheet(reader, "<reader>")
}

fn read_sheet<R: std::io::Read>(reader: R, name: &str) -> DashboardResult<RawTable> {
    let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(DashboardError::MissingHeader { name: name.to_string() });
    }

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable::new(headers, rows))
}
