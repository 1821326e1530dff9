use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::errors::{GeoError, GeoResult};

/// In-memory table of string cells addressed by header name, read from and
/// written to CSV. An empty cell is a null value.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl AddressTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn read_csv(reader: impl Read) -> GeoResult<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let columns = csv_reader
            .headers()?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut rows = Vec::new();
        for record in csv_reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self { columns, rows })
    }

    pub fn from_csv_path(path: &Path) -> GeoResult<Self> {
        Self::read_csv(File::open(path)?)
    }

    pub fn write_csv(&self, writer: impl Write) -> GeoResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush().map_err(GeoError::Io)?;
        Ok(())
    }

    pub fn to_csv_path(&self, path: &Path) -> GeoResult<()> {
        self.write_csv(File::create(path)?)
    }

    pub fn push_row(&mut self, row: Vec<String>) -> GeoResult<()> {
        if row.len() != self.columns.len() {
            return Err(GeoError::Parse(format!(
                "row has {} cells but the table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell value, with empty cells surfaced as `None`.
    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(Vec::as_slice)
    }
}
