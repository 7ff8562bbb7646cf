//! Append-only CSV report writer

use super::ReportRow;
use crate::error::{Result, SweepError};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes report rows, fixing the header from the first row
pub struct ReportWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    header: Option<Vec<String>>,
    rows: usize,
}

impl ReportWriter {
    /// Create (or truncate) the report file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)?;
        Ok(Self {
            path,
            writer,
            header: None,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Append one row and flush it to disk.
    ///
    /// The first row fixes the header; every later row must carry the same
    /// columns in the same order.
    pub fn append(&mut self, row: &ReportRow) -> Result<()> {
        let columns: Vec<String> = row.iter().map(|(k, _)| k.clone()).collect();
        match &self.header {
            Some(header) if *header != columns => {
                return Err(SweepError::SchemaMismatch {
                    expected: header.clone(),
                    actual: columns,
                });
            }
            Some(_) => {}
            None => {
                self.writer.write_record(&columns)?;
                debug!(path = %self.path.display(), columns = columns.len(), "Report header written");
                self.header = Some(columns);
            }
        }

        self.writer.write_record(row.iter().map(|(_, v)| v.as_str()))?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and close, returning the number of rows written
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}
