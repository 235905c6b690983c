//! Burrow - embedded time-series / log-event storage engine.
//!
//! This crate provides the storage and indexing core for an embedded
//! log-event store. Events carry a label set, a timestamp, and a
//! string-keyed payload; events with identical label sets form a *stream*.
//!
//! # Components
//!
//! - [`Stream`]: per-stream JSON-lines write-ahead log with schema-inferring
//!   compaction
//! - [`ArchiveWriter`] / [`ArchiveReader`]: two-file columnar archive with
//!   per-chunk compression
//! - [`MemoryIndex`]: trigram inverted index with phrase search and a
//!   block-compressed disk format
//! - [`codec`]: the byte-level encoders everything above is built from
//!
//! # Example
//!
//! ```rust,ignore
//! use burrow::{Labels, Stream};
//!
//! let mut labels = Labels::new();
//! labels.insert("host".to_string(), "server1".to_string());
//!
//! let mut stream = Stream::new(labels, "/var/lib/burrow")?;
//!
//! let record = serde_json::json!({"msg": "disk full", "free_mb": 12})
//!     .as_object()
//!     .cloned()
//!     .unwrap();
//! stream.add_document(&record)?;
//! ```

#![deny(missing_docs)]

pub mod archive;
pub mod codec;
pub mod error;
pub mod stream;
pub mod trigram;

pub use archive::{ArchiveReader, ArchiveWriter, ColumnDef, ColumnType, Row, Value};
pub use error::{Result, StoreError};
pub use stream::{fingerprint, Document, Labels, Stream, StreamConfig};
pub use trigram::{MemoryIndex, Posting, Trigram};
