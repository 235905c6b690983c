//! Delta-of-delta encoding for signed 64-bit integer sequences.
//!
//! Instead of storing each value, the codec stores the change in the change:
//! `(v[i] - v[i-1]) - (v[i-1] - v[i-2])`, written as a zig-zag signed varint.
//! Near-linear sequences such as timestamps and monotone identifiers collapse
//! to runs of tiny values, usually a single byte each.
//!
//! Two surfaces are provided:
//!
//! - [`encode_delta_of_delta`] / [`decode_delta_of_delta`] for one-shot
//!   encoding of a whole sequence, used by the archive's integer columns.
//! - [`PairEncoder`] / [`PairDecoder`] for incremental encoding of an
//!   interleaved pair of sequences, used by the trigram posting blocks where
//!   each posting is a `(document id, position)` pair.
//!
//! Arithmetic is plain `i64`; sequences whose deltas approach the `i64`
//! boundary are outside the codec's domain (timestamps and document ids sit
//! far from it).

use crate::codec::io::{append_varint, StructuredReader, StructuredWriter};
use crate::error::{Result, StoreError};
use std::io::{Cursor, Read, Seek, Write};

/// Encodes a sequence of `i64` values with delta-of-delta compression.
///
/// An empty input encodes to an empty buffer.
pub fn encode_delta_of_delta(values: &[i64]) -> Vec<u8> {
    if values.is_empty() {
        return Vec::new();
    }

    let mut encoded = Vec::with_capacity(values.len());

    let mut previous = 0i64;
    let mut previous_delta = 0i64;
    for &value in values {
        let delta = value - previous;
        append_varint(&mut encoded, delta - previous_delta);

        previous = value;
        previous_delta = delta;
    }

    encoded
}

/// Decodes a buffer produced by [`encode_delta_of_delta`].
///
/// Consumes varints until the buffer is exhausted; a varint cut off
/// mid-value is an error.
pub fn decode_delta_of_delta(encoded: &[u8]) -> Result<Vec<i64>> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = StructuredReader::new(Cursor::new(encoded));
    let mut values = Vec::new();

    let mut previous = 0i64;
    let mut previous_delta = 0i64;
    while let Some(delta_of_delta) = reader.try_read_varint()? {
        let delta = previous_delta + delta_of_delta;
        let current = previous + delta;

        values.push(current);

        previous = current;
        previous_delta = delta;
    }

    Ok(values)
}

/// Incremental delta-of-delta encoder for an interleaved pair of sequences.
///
/// Each [`encode`](PairEncoder::encode) call writes two varints: the
/// delta-of-delta of the first sequence, then the second. Both sequences
/// start from `previous = 0`, `previous delta = 0`, so a decoder can pick up
/// any stream written by a fresh encoder.
#[derive(Debug)]
pub struct PairEncoder<'a, W: Write> {
    writer: &'a mut StructuredWriter<W>,
    previous: [i64; 2],
    previous_delta: [i64; 2],
}

impl<'a, W: Write> PairEncoder<'a, W> {
    /// Creates an encoder with zeroed state writing through `writer`.
    pub fn new(writer: &'a mut StructuredWriter<W>) -> Self {
        Self {
            writer,
            previous: [0; 2],
            previous_delta: [0; 2],
        }
    }

    /// Encodes one `(a, b)` pair relative to the previous pair.
    pub fn encode(&mut self, a: i64, b: i64) -> Result<()> {
        let delta = [a - self.previous[0], b - self.previous[1]];

        self.writer.write_varint(delta[0] - self.previous_delta[0])?;
        self.writer.write_varint(delta[1] - self.previous_delta[1])?;

        self.previous = [a, b];
        self.previous_delta = delta;

        Ok(())
    }
}

/// Incremental decoder matching [`PairEncoder`].
#[derive(Debug)]
pub struct PairDecoder<'a, R: Read + Seek> {
    reader: &'a mut StructuredReader<R>,
    previous: [i64; 2],
    previous_delta: [i64; 2],
}

impl<'a, R: Read + Seek> PairDecoder<'a, R> {
    /// Creates a decoder with zeroed state reading through `reader`.
    pub fn new(reader: &'a mut StructuredReader<R>) -> Self {
        Self {
            reader,
            previous: [0; 2],
            previous_delta: [0; 2],
        }
    }

    /// Decodes the next pair.
    ///
    /// Returns `Ok(None)` when the input is exhausted at a pair boundary.
    /// Running out of input *between* the two varints of a pair is an
    /// [`UnexpectedEof`](StoreError::UnexpectedEof) error, as is a varint cut
    /// off mid-value.
    pub fn decode(&mut self) -> Result<Option<(i64, i64)>> {
        let Some(first) = self.reader.try_read_varint()? else {
            return Ok(None);
        };
        let second = match self.reader.try_read_varint()? {
            Some(value) => value,
            None => return Err(StoreError::UnexpectedEof),
        };

        let delta = [
            self.previous_delta[0] + first,
            self.previous_delta[1] + second,
        ];
        let current = [self.previous[0] + delta[0], self.previous[1] + delta[1]];

        self.previous = current;
        self.previous_delta = delta;

        Ok(Some((current[0], current[1])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::io::append_varint;

    #[test]
    fn test_encode_fixed_vector() {
        // 100, 200, 300 has deltas 100, 100, 100 and delta-of-deltas
        // 100, 100, 0 relative to the zeroed initial state.
        let encoded = encode_delta_of_delta(&[100, 200, 300]);

        let mut expected = Vec::new();
        for dod in [100, 100, 0] {
            append_varint(&mut expected, dod);
        }
        assert_eq!(encoded, expected);

        assert_eq!(decode_delta_of_delta(&encoded).unwrap(), vec![100, 200, 300]);
    }

    #[test]
    fn test_empty_roundtrip() {
        let encoded = encode_delta_of_delta(&[]);
        assert!(encoded.is_empty());
        assert!(decode_delta_of_delta(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_roundtrip_irregular() {
        let values = vec![5, -3, 1_000_000, 1_000_001, 0, i32::MAX as i64, -42];
        let encoded = encode_delta_of_delta(&values);
        assert_eq!(decode_delta_of_delta(&encoded).unwrap(), values);
    }

    #[test]
    fn test_linear_sequence_is_compact() {
        // A perfectly linear sequence needs two "seed" varints and then a
        // single zero byte per element.
        let values: Vec<i64> = (0..1000).map(|i| 1_700_000_000_000 + i * 250).collect();
        let encoded = encode_delta_of_delta(&values);
        assert!(encoded.len() < values.len() + 16);
        assert_eq!(decode_delta_of_delta(&encoded).unwrap(), values);
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let mut encoded = encode_delta_of_delta(&[1 << 40, 2 << 40]);
        encoded.pop();
        assert!(decode_delta_of_delta(&encoded).is_err());
    }

    #[test]
    fn test_pair_roundtrip() {
        let pairs: Vec<(i64, i64)> = (0..500).map(|i| (i / 4, (i * 7) % 13)).collect();

        let mut writer = StructuredWriter::new(Vec::new());
        let mut encoder = PairEncoder::new(&mut writer);
        for &(a, b) in &pairs {
            encoder.encode(a, b).unwrap();
        }

        let mut reader = StructuredReader::new(Cursor::new(writer.into_inner()));
        let mut decoder = PairDecoder::new(&mut reader);
        for &(a, b) in &pairs {
            assert_eq!(decoder.decode().unwrap(), Some((a, b)));
        }
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn test_pair_eof_mid_pair() {
        // A single varint is half a pair.
        let mut buf = Vec::new();
        append_varint(&mut buf, 9);

        let mut reader = StructuredReader::new(Cursor::new(buf));
        let mut decoder = PairDecoder::new(&mut reader);
        assert!(matches!(
            decoder.decode(),
            Err(StoreError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_pair_state_reset_between_encoders() {
        // Two encoders over the same writer each start from zeroed state, so
        // a decoder seeked to the second section must use a fresh decoder.
        let mut writer = StructuredWriter::new(Vec::new());

        let mut first = PairEncoder::new(&mut writer);
        first.encode(10, 20).unwrap();
        first.encode(11, 21).unwrap();
        let second_offset = writer.offset();

        let mut second = PairEncoder::new(&mut writer);
        second.encode(12, 22).unwrap();

        let mut reader = StructuredReader::new(Cursor::new(writer.into_inner()));
        reader.seek(std::io::SeekFrom::Start(second_offset)).unwrap();
        let mut decoder = PairDecoder::new(&mut reader);
        assert_eq!(decoder.decode().unwrap(), Some((12, 22)));
    }
}
