//! Archive reader.

use crate::archive::{
    BlockMeta, ChunkMeta, ColumnDef, ColumnType, Row, Value, DATA_SUFFIX, FORMAT_VERSION,
    METADATA_SUFFIX,
};
use crate::codec::boolean::decode_bit_packing;
use crate::codec::delta::decode_delta_of_delta;
use crate::codec::io::StructuredReader;
use crate::error::{Result, StoreError};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

/// Reads an archive written by [`ArchiveWriter`](crate::archive::ArchiveWriter).
///
/// The metadata header is parsed eagerly on construction; the chunk index is
/// read sequentially, one block at a time, as rows are iterated. Parsed block
/// metadata is cached for the life of the reader (readers are expected to be
/// short-lived).
pub struct ArchiveReader<D: Read + Seek, M: Read + Seek> {
    data: StructuredReader<D>,
    metadata: StructuredReader<M>,
    columns: Vec<ColumnDef>,
    block_count: u64,
    blocks: Vec<BlockMeta>,
}

impl ArchiveReader<BufReader<File>, BufReader<File>> {
    /// Opens `<name>.data.bin` and `<name>.metadata.bin` under `dir`.
    pub fn open_fs(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let data = BufReader::new(File::open(dir.join(format!("{name}{DATA_SUFFIX}")))?);
        let metadata = BufReader::new(File::open(dir.join(format!("{name}{METADATA_SUFFIX}")))?);
        Self::new(data, metadata)
    }
}

impl<D: Read + Seek, M: Read + Seek> ArchiveReader<D, M> {
    /// Opens a reader over the given sources and parses the metadata header.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedFormatVersion`] for any version other
    /// than [`FORMAT_VERSION`] and [`StoreError::UnsupportedColumnType`] for
    /// an unknown column type tag.
    pub fn new(data: D, metadata: M) -> Result<Self> {
        let mut reader = Self {
            data: StructuredReader::new(data),
            metadata: StructuredReader::new(metadata),
            columns: Vec::new(),
            block_count: 0,
            blocks: Vec::new(),
        };

        reader.read_metadata_header()?;

        Ok(reader)
    }

    fn read_metadata_header(&mut self) -> Result<()> {
        let version = self.metadata.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedFormatVersion(version));
        }

        let column_count = self.metadata.read_uvarint()?;
        self.columns = Vec::with_capacity(column_count as usize);
        for _ in 0..column_count {
            let key = self.metadata.read_string()?;
            let tag = self.metadata.read_u16()?;
            let kind = ColumnType::from_u16(tag).ok_or(StoreError::UnsupportedColumnType(tag))?;
            self.columns.push(ColumnDef { key, kind });
        }

        self.block_count = self.metadata.read_uvarint()?;

        Ok(())
    }

    /// The schema the archive was written with.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Number of row blocks in the archive.
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Returns an iterator over the rows of the archive in write order.
    ///
    /// The iterator is lazy (one block of values is materialized at a time),
    /// finite, and non-restartable: it shares the reader's position, and
    /// after yielding an error it terminates.
    pub fn rows(&mut self) -> Rows<'_, D, M> {
        Rows {
            reader: self,
            block_index: 0,
            current_rows: Vec::new(),
            row_index: 0,
            done: false,
        }
    }

    /// Returns the chunk locations of the `index`-th block, reading further
    /// into the metadata file if the block has not been parsed yet.
    fn block_meta(&mut self, index: usize) -> Result<&BlockMeta> {
        if index as u64 >= self.block_count {
            return Err(StoreError::BlockIndexOutOfRange {
                index,
                count: self.block_count as usize,
            });
        }

        while self.blocks.len() <= index {
            let mut chunks = Vec::with_capacity(self.columns.len());
            for _ in 0..self.columns.len() {
                let offset = self.metadata.read_u64()?;
                let length = self.metadata.read_u64()?;
                chunks.push(ChunkMeta { offset, length });
            }
            self.blocks.push(BlockMeta { chunks });
        }

        Ok(&self.blocks[index])
    }

    /// Reads and decodes all rows of one block.
    fn read_block(&mut self, index: usize) -> Result<Vec<Row>> {
        let block = self.block_meta(index)?.clone();

        let mut columns = Vec::with_capacity(self.columns.len());
        for (column, chunk) in block.chunks.iter().enumerate() {
            let kind = self.columns[column].kind;
            let mut chunk_reader = self.chunk_reader(chunk)?;
            let values = match kind {
                ColumnType::Int64 => read_int64_chunk(&mut chunk_reader)?,
                ColumnType::Float64 => read_float64_chunk(&mut chunk_reader, chunk.length)?,
                ColumnType::String => read_string_chunk(&mut chunk_reader)?,
                ColumnType::Bool => read_bool_chunk(&mut chunk_reader)?,
            };
            columns.push(values);
        }

        // Rebuild rows from the column-major block.
        let row_count = columns.first().map_or(0, Vec::len);
        let mut iterators: Vec<_> = columns.into_iter().map(Vec::into_iter).collect();
        let mut rows = Vec::with_capacity(row_count);
        for _ in 0..row_count {
            let mut row = Row::with_capacity(iterators.len());
            for values in &mut iterators {
                row.push(values.next().ok_or(StoreError::UnexpectedEof)?);
            }
            rows.push(row);
        }

        Ok(rows)
    }

    /// Copies one chunk out of the data file and wraps it in its own reader.
    ///
    /// Chunks are laid out back to back in block/column order, so sequential
    /// iteration never seeks the data file.
    fn chunk_reader(&mut self, chunk: &ChunkMeta) -> Result<StructuredReader<Cursor<Vec<u8>>>> {
        let mut buf = vec![0u8; chunk.length as usize];
        self.data.read_exact(&mut buf)?;
        Ok(StructuredReader::new(Cursor::new(buf)))
    }
}

fn read_int64_chunk(chunk: &mut StructuredReader<Cursor<Vec<u8>>>) -> Result<Vec<Value>> {
    let encoded = chunk.read_lz4()?;
    let values = decode_delta_of_delta(&encoded)?;
    Ok(values.into_iter().map(Value::Int64).collect())
}

fn read_bool_chunk(chunk: &mut StructuredReader<Cursor<Vec<u8>>>) -> Result<Vec<Value>> {
    let encoded = chunk.read_lz4()?;
    let values = decode_bit_packing(&encoded)?;
    Ok(values.into_iter().map(Value::Bool).collect())
}

fn read_float64_chunk(
    chunk: &mut StructuredReader<Cursor<Vec<u8>>>,
    length: u64,
) -> Result<Vec<Value>> {
    let count = (length / 8) as usize;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(Value::Float64(chunk.read_f64()?));
    }
    Ok(values)
}

fn read_string_chunk(chunk: &mut StructuredReader<Cursor<Vec<u8>>>) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    while let Some(value) = chunk.try_read_string()? {
        values.push(Value::String(value.into_boxed_str()));
    }
    Ok(values)
}

/// Iterator over archive rows; see [`ArchiveReader::rows`].
///
/// Yields `Ok(row)` per row in write order. The first decoding or I/O error
/// is yielded once and the iterator then terminates. Dropping the iterator
/// releases the block buffer immediately.
pub struct Rows<'a, D: Read + Seek, M: Read + Seek> {
    reader: &'a mut ArchiveReader<D, M>,
    block_index: usize,
    current_rows: Vec<Row>,
    row_index: usize,
    done: bool,
}

impl<D: Read + Seek, M: Read + Seek> Iterator for Rows<'_, D, M> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.row_index < self.current_rows.len() {
                let row = std::mem::take(&mut self.current_rows[self.row_index]);
                self.row_index += 1;
                return Some(Ok(row));
            }

            if self.block_index as u64 >= self.reader.block_count {
                self.done = true;
                return None;
            }

            match self.reader.read_block(self.block_index) {
                Ok(rows) => {
                    self.block_index += 1;
                    self.current_rows = rows;
                    self.row_index = 0;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.current_rows.len() - self.row_index, None)
    }
}
