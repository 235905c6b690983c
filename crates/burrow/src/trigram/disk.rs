//! On-disk representation of the trigram index.
//!
//! The index persists across two files, mirroring the archive's layout:
//!
//! ```text
//! <name>.data.bin
//! ┌─────────────────────────────────────────────────────────────┐
//! │  For each trigram:                                          │
//! │    For each block of up to POSTING_BLOCK_SIZE postings:     │
//! │      (document id, position) pairs, paired delta-of-delta   │
//! └─────────────────────────────────────────────────────────────┘
//!
//! <name>.metadata.bin
//! ┌─────────────────────────────────────────────────────────────┐
//! │  format version (u32 BE)                                    │
//! │  trigram count (uvarint)                                    │
//! │  For each trigram:                                          │
//! │    trigram bytes (3 raw bytes)                              │
//! │    block count (uvarint)                                    │
//! │    For each block:                                          │
//! │      posting count (uvarint)                                │
//! │      data-file offset (uvarint)                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every block is encoded by a fresh pair encoder, so its delta-of-delta
//! state starts from zero and a reader can seek straight to any block
//! without decoding the ones before it. The logical posting sequence of a
//! trigram still runs across its blocks in sorted order.

use crate::codec::delta::{PairDecoder, PairEncoder};
use crate::codec::io::{StructuredReader, StructuredWriter};
use crate::error::{Result, StoreError};
use crate::trigram::memory::{MemoryIndex, Posting, Trigram};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Current trigram index format version. Readers reject any other value.
pub(crate) const FORMAT_VERSION: u32 = 1;

/// Maximum number of postings per data-file block.
pub const POSTING_BLOCK_SIZE: usize = 1024;

/// File name suffix of the posting data file.
const DATA_SUFFIX: &str = ".data.bin";

/// File name suffix of the metadata file.
const METADATA_SUFFIX: &str = ".metadata.bin";

impl MemoryIndex {
    /// Persists the index as `<name>.data.bin` and `<name>.metadata.bin`
    /// under `dir`, overwriting existing files of the same name.
    pub fn write_to_disk_fs(&self, dir: impl AsRef<Path>, name: &str) -> Result<()> {
        let dir = dir.as_ref();
        let data = BufWriter::new(File::create(dir.join(format!("{name}{DATA_SUFFIX}")))?);
        let metadata = BufWriter::new(File::create(dir.join(format!("{name}{METADATA_SUFFIX}")))?);
        self.write_to_disk(data, metadata)
    }

    /// Writes the index to the given sinks.
    ///
    /// Trigrams are written in sorted order, so the same index always
    /// produces the same bytes.
    pub fn write_to_disk<D: Write, M: Write>(&self, data: D, metadata: M) -> Result<()> {
        let mut data = StructuredWriter::new(data);
        let mut metadata = StructuredWriter::new(metadata);

        metadata.write_u32(FORMAT_VERSION)?;
        metadata.write_uvarint(self.postings.len() as u64)?;

        for (trigram, postings) in &self.postings {
            metadata.write_all(&trigram.0)?;
            metadata.write_uvarint(postings.len().div_ceil(POSTING_BLOCK_SIZE) as u64)?;

            for block in postings.chunks(POSTING_BLOCK_SIZE) {
                metadata.write_uvarint(block.len() as u64)?;
                metadata.write_uvarint(data.offset())?;

                let mut encoder = PairEncoder::new(&mut data);
                for posting in block {
                    encoder.encode(posting.document_id, posting.position)?;
                }
            }
        }

        data.flush()?;
        metadata.flush()?;

        Ok(())
    }

    /// Loads an index previously written next to `dir`/`name`.
    pub fn load_from_disk_fs(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let data = BufReader::new(File::open(dir.join(format!("{name}{DATA_SUFFIX}")))?);
        let metadata = BufReader::new(File::open(dir.join(format!("{name}{METADATA_SUFFIX}")))?);
        Self::load_from_disk(data, metadata)
    }

    /// Reads an index from the given sources.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedFormatVersion`] for any version
    /// other than the current one, and [`StoreError::UnexpectedEof`] if a
    /// posting block holds fewer postings than its metadata promises.
    pub fn load_from_disk<D: Read + Seek, M: Read + Seek>(data: D, metadata: M) -> Result<Self> {
        let mut data = StructuredReader::new(data);
        let mut metadata = StructuredReader::new(metadata);

        let version = metadata.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedFormatVersion(version));
        }

        let trigram_count = metadata.read_uvarint()?;

        let mut postings_map = BTreeMap::new();
        for _ in 0..trigram_count {
            let mut trigram = [0u8; 3];
            metadata.read_exact(&mut trigram)?;

            let block_count = metadata.read_uvarint()?;

            let mut postings = Vec::new();
            for _ in 0..block_count {
                let posting_count = metadata.read_uvarint()?;
                let block_offset = metadata.read_uvarint()?;

                data.seek(SeekFrom::Start(block_offset))?;

                let mut decoder = PairDecoder::new(&mut data);
                for _ in 0..posting_count {
                    let (document_id, position) =
                        decoder.decode()?.ok_or(StoreError::UnexpectedEof)?;
                    postings.push(Posting {
                        document_id,
                        position,
                    });
                }
            }

            postings_map.insert(Trigram(trigram), postings);
        }

        Ok(Self {
            postings: postings_map,
        })
    }
}
