//! Error and Result types for Burrow storage operations.

use std::io;
use thiserror::Error;

/// A convenience `Result` type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unsupported on-disk format version.
    #[error("Unsupported format version: {0}")]
    UnsupportedFormatVersion(u32),

    /// Unknown column type tag in the archive metadata.
    #[error("Unsupported column type: {0}")]
    UnsupportedColumnType(u16),

    /// An archive requires at least one column.
    #[error("At least one column is required")]
    NoColumns,

    /// A varint ended before its terminating byte, or did not fit in 64 bits.
    #[error("Truncated or malformed varint")]
    TruncatedVarint,

    /// The input ended in the middle of a value.
    #[error("Unexpected end of data")]
    UnexpectedEof,

    /// Error during compression.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Error during decompression.
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// A length-prefixed string field holds invalid UTF-8.
    #[error("Invalid UTF-8 in string field: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A row value does not match the declared column type.
    #[error("Column {column} expects a {expected} value")]
    ColumnTypeMismatch {
        /// Key of the offending column.
        column: String,
        /// Name of the declared column type.
        expected: &'static str,
    },

    /// A row holds a different number of values than the schema has columns.
    #[error("Row has {actual} values, schema has {expected} columns")]
    RowWidthMismatch {
        /// Number of columns in the schema.
        expected: usize,
        /// Number of values in the row.
        actual: usize,
    },

    /// A record field holds a JSON value no column type can represent.
    #[error("Unsupported value type for field {field}: {kind}")]
    UnsupportedValueType {
        /// Name of the offending field.
        field: String,
        /// JSON kind of the offending value.
        kind: &'static str,
    },

    /// Block index outside the archive's block count.
    #[error("Block index out of range: {index} (block count {count})")]
    BlockIndexOutOfRange {
        /// Requested block index.
        index: usize,
        /// Number of blocks in the archive.
        count: usize,
    },

    /// The stream's WAL handle was closed by a failed compaction.
    #[error("Stream WAL is closed after a failed compaction; reopen the stream")]
    WalClosed,

    /// Malformed JSON in a WAL record.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
