use crate::error::Result;
use crate::models::CleanRow;
use crate::table::schema::snapshot_schema;
use crate::table::snapshot_columns;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

const BATCH_SIZE: usize = 1024;

/// Buffered Parquet writer for one snapshot (all rows share a snapshot date)
pub struct SnapshotWriter {
    writer: ArrowWriter<File>,
    schema: Arc<arrow::datatypes::Schema>,
    snapshot_date: String,
    buffer: Vec<CleanRow>,
    rows_written: usize,
}

impl SnapshotWriter {
    pub fn new(path: &Path, snapshot_date: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let schema = snapshot_schema();
        let file = File::create(path)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        Ok(Self {
            writer,
            schema,
            snapshot_date: snapshot_date.to_string(),
            buffer: Vec::new(),
            rows_written: 0,
        })
    }

    pub fn add_row(&mut self, row: CleanRow) -> Result<()> {
        self.buffer.push(row);

        if self.buffer.len() >= BATCH_SIZE {
            self.flush_buffer()?;
        }

        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let batch = self.create_record_batch()?;
        self.writer.write(&batch)?;
        self.rows_written += self.buffer.len();
        self.buffer.clear();

        Ok(())
    }

    fn create_record_batch(&self) -> Result<RecordBatch> {
        let columns = snapshot_columns(&self.buffer, &self.snapshot_date);
        Ok(RecordBatch::try_new(self.schema.clone(), columns)?)
    }

    /// Flush remaining rows and finish the file; returns the row count
    pub fn close(mut self) -> Result<usize> {
        self.flush_buffer()?;
        self.writer.close()?;
        Ok(self.rows_written)
    }
}
