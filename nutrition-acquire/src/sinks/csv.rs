use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use arrow::csv::WriterBuilder;
use tracing::{info, instrument};

use crate::error::Result;
use crate::table::Table;

/// Writes a table as UTF-8 CSV with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSink;

impl CsvSink {
    pub fn new() -> Self {
        Self
    }

    /// Writes `table` to `path`, creating missing parent directories and
    /// replacing any existing file.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), rows = table.len()))]
    pub fn write(&self, table: &Table, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let batch = table.to_record_batch()?;
        let file = BufWriter::new(File::create(path)?);
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer.write(&batch)?;
        writer.into_inner().flush()?;

        info!("Wrote table");
        Ok(())
    }
}
