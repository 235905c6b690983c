//! Archive writer.

use crate::archive::{
    BlockMeta, ChunkMeta, ColumnDef, ColumnType, Row, Value, BLOCK_SIZE, DATA_SUFFIX,
    FORMAT_VERSION, METADATA_SUFFIX,
};
use crate::codec::boolean::encode_bit_packing;
use crate::codec::delta::encode_delta_of_delta;
use crate::codec::io::StructuredWriter;
use crate::error::{Result, StoreError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Writes rows of a fixed schema into the two-file archive format.
///
/// Rows are buffered and drained into full [`BLOCK_SIZE`]-row blocks as they
/// accumulate; [`close`](ArchiveWriter::close) flushes the remaining short
/// block, appends the chunk index to the metadata file, and releases both
/// sinks.
pub struct ArchiveWriter<D: Write, M: Write> {
    data: StructuredWriter<D>,
    metadata: StructuredWriter<M>,
    columns: Vec<ColumnDef>,

    buffered_rows: Vec<Row>,
    blocks: Vec<BlockMeta>,
}

impl ArchiveWriter<BufWriter<File>, BufWriter<File>> {
    /// Creates `<name>.data.bin` and `<name>.metadata.bin` under `dir` and
    /// opens a writer over them.
    ///
    /// Existing files of the same name are overwritten.
    pub fn create_fs(columns: Vec<ColumnDef>, dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let data = BufWriter::new(File::create(dir.join(format!("{name}{DATA_SUFFIX}")))?);
        let metadata = BufWriter::new(File::create(dir.join(format!("{name}{METADATA_SUFFIX}")))?);
        Self::new(columns, data, metadata)
    }
}

impl<D: Write, M: Write> ArchiveWriter<D, M> {
    /// Opens a writer over the given sinks and writes the metadata header.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoColumns`] if `columns` is empty.
    pub fn new(columns: Vec<ColumnDef>, data: D, metadata: M) -> Result<Self> {
        if columns.is_empty() {
            return Err(StoreError::NoColumns);
        }

        let mut writer = Self {
            data: StructuredWriter::new(data),
            metadata: StructuredWriter::new(metadata),
            columns,
            buffered_rows: Vec::new(),
            blocks: Vec::new(),
        };

        writer.write_metadata_header()?;

        Ok(writer)
    }

    /// The schema this writer was opened with.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    fn write_metadata_header(&mut self) -> Result<()> {
        self.metadata.write_u32(FORMAT_VERSION)?;
        self.metadata.write_uvarint(self.columns.len() as u64)?;

        for column in &self.columns {
            self.metadata.write_string(&column.key)?;
            self.metadata.write_u16(column.kind as u16)?;
        }

        Ok(())
    }

    /// Appends `rows` to the archive.
    ///
    /// Every row must hold one value per column, each matching its column's
    /// declared type. Full blocks are encoded and written immediately.
    pub fn write(&mut self, rows: Vec<Row>) -> Result<()> {
        for row in &rows {
            if row.len() != self.columns.len() {
                return Err(StoreError::RowWidthMismatch {
                    expected: self.columns.len(),
                    actual: row.len(),
                });
            }
        }
        self.buffered_rows.extend(rows);

        while self.buffered_rows.len() >= BLOCK_SIZE {
            self.flush_block(BLOCK_SIZE)?;
        }

        Ok(())
    }

    /// Flushes any buffered rows as a final short block, writes the chunk
    /// index, and flushes both sinks.
    pub fn close(mut self) -> Result<()> {
        if !self.buffered_rows.is_empty() {
            let remaining = self.buffered_rows.len();
            self.flush_block(remaining)?;
        }

        self.write_metadata_blocks()?;

        self.data.flush()?;
        self.metadata.flush()?;

        Ok(())
    }

    fn flush_block(&mut self, rows: usize) -> Result<()> {
        let block: Vec<Row> = self.buffered_rows.drain(..rows).collect();

        let mut chunks = Vec::with_capacity(self.columns.len());
        for column in 0..self.columns.len() {
            let start = self.data.offset();
            match self.columns[column].kind {
                ColumnType::Int64 => self.write_int64_chunk(&block, column)?,
                ColumnType::Float64 => self.write_float64_chunk(&block, column)?,
                ColumnType::String => self.write_string_chunk(&block, column)?,
                ColumnType::Bool => self.write_bool_chunk(&block, column)?,
            }

            chunks.push(ChunkMeta {
                offset: start,
                length: self.data.offset() - start,
            });
        }

        self.blocks.push(BlockMeta { chunks });
        debug!(
            rows,
            block = self.blocks.len(),
            "flushed archive block"
        );

        Ok(())
    }

    fn write_int64_chunk(&mut self, rows: &[Row], column: usize) -> Result<()> {
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            match &row[column] {
                Value::Int64(value) => values.push(*value),
                _ => return Err(self.type_mismatch(column)),
            }
        }

        self.data.write_lz4(&encode_delta_of_delta(&values))
    }

    fn write_bool_chunk(&mut self, rows: &[Row], column: usize) -> Result<()> {
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            match &row[column] {
                Value::Bool(value) => values.push(*value),
                _ => return Err(self.type_mismatch(column)),
            }
        }

        self.data.write_lz4(&encode_bit_packing(&values))
    }

    fn write_float64_chunk(&mut self, rows: &[Row], column: usize) -> Result<()> {
        for row in rows {
            match &row[column] {
                Value::Float64(value) => self.data.write_f64(*value)?,
                _ => return Err(self.type_mismatch(column)),
            }
        }

        Ok(())
    }

    fn write_string_chunk(&mut self, rows: &[Row], column: usize) -> Result<()> {
        for row in rows {
            match &row[column] {
                Value::String(value) => self.data.write_string(value)?,
                _ => return Err(self.type_mismatch(column)),
            }
        }

        Ok(())
    }

    fn write_metadata_blocks(&mut self) -> Result<()> {
        self.metadata.write_uvarint(self.blocks.len() as u64)?;

        for block in &self.blocks {
            for chunk in &block.chunks {
                self.metadata.write_u64(chunk.offset)?;
                self.metadata.write_u64(chunk.length)?;
            }
        }

        Ok(())
    }

    fn type_mismatch(&self, column: usize) -> StoreError {
        StoreError::ColumnTypeMismatch {
            column: self.columns[column].key.clone(),
            expected: self.columns[column].kind.name(),
        }
    }
}
