//! Per-stream write-ahead log and compaction.
//!
//! A stream is the durable identity behind one label set. Incoming records
//! are appended to the stream's JSON-lines WAL (one object per line); when
//! the WAL reaches the configured record count the stream compacts it into a
//! columnar archive:
//!
//! ```text
//! record → WAL append ─┬─ below threshold → done
//!                      └─ at threshold    → infer schema over the WAL
//!                                           project records into rows
//!                                           write archive, delete WAL
//! ```
//!
//! Compaction runs two passes over the WAL file. The first infers a column
//! type per field, widening along `Bool ⊂ String`, `Int64 ⊂ Float64 ⊂ String`
//! as records disagree; the second projects each record onto the union
//! schema. A failed compaction leaves the WAL in place (the records survive)
//! and the partial archive files are overwritten on the next attempt, but
//! the stream stays closed for writes until it is reopened.

use crate::archive::{ArchiveWriter, ColumnDef, ColumnType, Row, Value};
use crate::error::{Result, StoreError};
use fnv::FnvHasher;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::hash::Hasher;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A label set: the unordered string-to-string mapping identifying a stream.
pub type Labels = BTreeMap<String, String>;

/// A single record payload: string keys to primitive JSON values.
pub type Document = serde_json::Map<String, JsonValue>;

/// Default number of WAL records that triggers compaction.
///
/// A development threshold; production deployments choose something much
/// larger.
pub const MAX_WAL_RECORDS: usize = 3;

/// WAL file suffix, appended to the stream fingerprint in hex.
const WAL_SUFFIX: &str = "_wal.jsonl";

/// Returns the 64-bit FNV-1a fingerprint of a label set.
///
/// Pairs are hashed as `k0 v0 k1 v1 …` in sorted key order, so the
/// fingerprint of a label set is stable across processes and insertions.
pub fn fingerprint(labels: &Labels) -> u64 {
    let mut hasher = FnvHasher::default();
    for (key, value) in labels {
        hasher.write(key.as_bytes());
        hasher.write(value.as_bytes());
    }
    hasher.finish()
}

/// Configuration for stream WAL behavior.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Number of WAL records that triggers compaction into an archive.
    pub max_wal_records: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_wal_records: MAX_WAL_RECORDS,
        }
    }
}

/// An append-only stream of records sharing one label set.
///
/// Owns the open WAL file handle for its label set; records accumulate in
/// the WAL and roll up into archives named by the stream fingerprint.
pub struct Stream {
    labels: Labels,
    fingerprint: u64,
    root: PathBuf,
    config: StreamConfig,

    wal: Option<File>,
    wal_records: usize,
}

impl Stream {
    /// Opens the stream for `labels` under `root` with default configuration.
    ///
    /// Created lazily: the root directory and WAL file are created on first
    /// use. Reopening an existing WAL recovers its record count.
    pub fn new(labels: Labels, root: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(labels, root, StreamConfig::default())
    }

    /// Opens the stream with the given configuration.
    pub fn with_config(
        labels: Labels,
        root: impl AsRef<Path>,
        config: StreamConfig,
    ) -> Result<Self> {
        let fingerprint = fingerprint(&labels);
        let mut stream = Self {
            labels,
            fingerprint,
            root: root.as_ref().to_path_buf(),
            config,
            wal: None,
            wal_records: 0,
        };

        stream.open_wal()?;

        Ok(stream)
    }

    /// The label set identifying this stream.
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// The FNV-1a fingerprint of this stream's label set.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Number of records currently in the WAL.
    pub fn wal_records(&self) -> usize {
        self.wal_records
    }

    /// Path of this stream's WAL file.
    pub fn wal_path(&self) -> PathBuf {
        self.root
            .join(format!("{:x}{WAL_SUFFIX}", self.fingerprint))
    }

    /// Name of the archives this stream compacts into.
    pub fn archive_name(&self) -> String {
        format!("{:x}", self.fingerprint)
    }

    /// Appends one record to the WAL and compacts when the record count
    /// reaches the configured threshold.
    pub fn add_document(&mut self, document: &Document) -> Result<()> {
        self.append_wal(document)?;

        if self.wal_records >= self.config.max_wal_records {
            // Release the write handle before the read-only compaction pass.
            self.wal = None;
            self.compact()?;
            self.open_wal()?;
        }

        Ok(())
    }

    /// Releases the WAL handle.
    pub fn close(mut self) -> Result<()> {
        self.wal = None;
        Ok(())
    }

    fn open_wal(&mut self) -> Result<()> {
        let path = self.wal_path();

        if path.exists() {
            self.wal_records = count_lines(&path)?;
            self.wal = Some(OpenOptions::new().append(true).open(&path)?);
        } else {
            fs::create_dir_all(&self.root)?;
            self.wal_records = 0;
            self.wal = Some(OpenOptions::new().append(true).create(true).open(&path)?);
        }

        Ok(())
    }

    fn append_wal(&mut self, document: &Document) -> Result<()> {
        let wal = self.wal.as_mut().ok_or(StoreError::WalClosed)?;

        let mut line = serde_json::to_vec(document)?;
        line.push(b'\n');
        wal.write_all(&line)?;

        self.wal_records += 1;

        Ok(())
    }

    /// Rolls the WAL up into an archive and deletes it.
    ///
    /// Absent fields are projected as the column type's zero value (`0`,
    /// `0.0`, `""`, `false`). On error the WAL file is left untouched; the
    /// partial archive files keep their deterministic names and are
    /// overwritten by the next attempt.
    fn compact(&mut self) -> Result<()> {
        let path = self.wal_path();
        let mut wal = BufReader::new(File::open(&path)?);

        let columns = infer_columns(&mut wal)?;
        debug!(
            fingerprint = self.fingerprint,
            columns = columns.len(),
            records = self.wal_records,
            "compacting stream WAL"
        );

        wal.seek(SeekFrom::Start(0))?;

        let schema: Vec<ColumnDef> = columns
            .iter()
            .map(|(key, &kind)| ColumnDef::new(key.clone(), kind))
            .collect();
        let mut writer = ArchiveWriter::create_fs(schema, &self.root, &self.archive_name())?;

        for line in wal.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let document: Document = serde_json::from_str(&line)?;
            writer.write(vec![project_row(&document, &columns)?])?;
        }

        writer.close()?;

        if let Err(e) = fs::remove_file(&path) {
            warn!(
                fingerprint = self.fingerprint,
                error = %e,
                "compacted WAL could not be removed"
            );
            return Err(e.into());
        }

        Ok(())
    }
}

/// Counts newline-terminated records in an existing WAL file.
fn count_lines(path: &Path) -> Result<usize> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; 1024];
    let mut count = 0;

    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        count += buf[..read].iter().filter(|&&b| b == b'\n').count();
    }

    Ok(count)
}

/// Infers the union column schema over every record in the WAL.
fn infer_columns(wal: &mut impl BufRead) -> Result<BTreeMap<String, ColumnType>> {
    let mut columns: BTreeMap<String, ColumnType> = BTreeMap::new();

    for line in wal.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let document: Document = serde_json::from_str(&line)?;

        for (field, value) in &document {
            let inferred = infer_type(field, value)?;
            columns
                .entry(field.clone())
                .and_modify(|kind| *kind = kind.common_supertype(inferred))
                .or_insert(inferred);
        }
    }

    Ok(columns)
}

/// Infers the narrowest column type for one field value.
fn infer_type(field: &str, value: &JsonValue) -> Result<ColumnType> {
    match value {
        JsonValue::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Ok(ColumnType::Int64)
            } else {
                match n.as_f64() {
                    Some(f) if f == f.trunc() => Ok(ColumnType::Int64),
                    _ => Ok(ColumnType::Float64),
                }
            }
        }
        JsonValue::Bool(_) => Ok(ColumnType::Bool),
        JsonValue::String(_) => Ok(ColumnType::String),
        other => Err(StoreError::UnsupportedValueType {
            field: field.to_owned(),
            kind: json_kind(other),
        }),
    }
}

/// Projects one record onto the union schema, in column order.
fn project_row(document: &Document, columns: &BTreeMap<String, ColumnType>) -> Result<Row> {
    columns
        .iter()
        .map(|(key, &kind)| coerce(key, kind, document.get(key)))
        .collect()
}

/// Coerces one field value up to its column type.
fn coerce(field: &str, kind: ColumnType, value: Option<&JsonValue>) -> Result<Value> {
    let Some(value) = value else {
        return Ok(kind.zero_value());
    };

    match (kind, value) {
        (ColumnType::Int64, JsonValue::Number(n)) => {
            if let Some(v) = n.as_i64() {
                Ok(Value::Int64(v))
            } else if let Some(v) = n.as_u64() {
                Ok(Value::Int64(v as i64))
            } else {
                Ok(Value::Int64(n.as_f64().unwrap_or_default() as i64))
            }
        }
        (ColumnType::Float64, JsonValue::Number(n)) => {
            Ok(Value::Float64(n.as_f64().unwrap_or_default()))
        }
        (ColumnType::Bool, JsonValue::Bool(b)) => Ok(Value::Bool(*b)),
        (ColumnType::String, JsonValue::String(s)) => Ok(Value::String(s.as_str().into())),
        (ColumnType::String, JsonValue::Number(n)) => {
            Ok(Value::String(n.to_string().into_boxed_str()))
        }
        (ColumnType::String, JsonValue::Bool(b)) => {
            Ok(Value::String(if *b { "true" } else { "false" }.into()))
        }
        (_, other) => Err(StoreError::UnsupportedValueType {
            field: field.to_owned(),
            kind: json_kind(other),
        }),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
