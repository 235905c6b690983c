//! Structured byte I/O for the on-disk formats.
//!
//! [`StructuredWriter`] wraps any byte sink, tracks the running byte offset,
//! and exposes typed writers for the primitives every format in this crate is
//! built from:
//!
//! - fixed-width big-endian integers and IEEE-754 floats
//! - LEB128 variable-length integers (zig-zag encoded when signed)
//! - length-prefixed byte slices and UTF-8 strings
//! - one-shot LZ4 frames
//!
//! [`StructuredReader`] mirrors the writers over any seekable source. Readers
//! that consume values until the end of their input use the `try_read_*`
//! variants, which return `Ok(None)` when the source is exhausted *before*
//! the first byte of a value; running out of bytes in the middle of a value
//! is always an error.

use crate::error::{Result, StoreError};
use std::io::{Read, Seek, SeekFrom, Write};

/// Encodes `value` as an unsigned LEB128 varint appended to `buf`.
pub fn append_uvarint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Encodes `value` as a zig-zag signed varint appended to `buf`.
pub fn append_varint(buf: &mut Vec<u8>, value: i64) {
    append_uvarint(buf, zig_zag_encode(value));
}

/// Decodes one unsigned varint from the front of `buf`.
///
/// Returns the value and the number of bytes consumed.
pub fn take_uvarint(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if shift > 63 {
            return Err(StoreError::TruncatedVarint);
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    Err(StoreError::TruncatedVarint)
}

/// Maps a signed integer onto the unsigned range so that values of small
/// magnitude, positive or negative, encode into few varint bytes.
#[inline]
fn zig_zag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zig_zag_encode`].
#[inline]
fn zig_zag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// A byte sink with an offset counter and typed big-endian writers.
#[derive(Debug)]
pub struct StructuredWriter<W: Write> {
    inner: W,
    offset: u64,
}

impl<W: Write> StructuredWriter<W> {
    /// Wraps `inner`, starting the offset counter at zero.
    pub fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    /// Number of bytes written through this writer so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Unwraps this writer, returning the underlying sink.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Writes a single unsigned byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_all(&[value])?;
        Ok(())
    }

    /// Writes a single signed byte.
    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_u8(value as u8)
    }

    /// Writes a 16-bit unsigned integer, big-endian.
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Writes a 16-bit signed integer, big-endian.
    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Writes a 32-bit unsigned integer, big-endian.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Writes a 32-bit signed integer, big-endian.
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Writes a 64-bit unsigned integer, big-endian.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Writes a 64-bit signed integer, big-endian.
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Writes a 32-bit float as its IEEE-754 bit pattern, big-endian.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_all(&value.to_bits().to_be_bytes())?;
        Ok(())
    }

    /// Writes a 64-bit float as its IEEE-754 bit pattern, big-endian.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_all(&value.to_bits().to_be_bytes())?;
        Ok(())
    }

    /// Writes an unsigned LEB128 varint.
    pub fn write_uvarint(&mut self, value: u64) -> Result<()> {
        let mut buf = Vec::with_capacity(10);
        append_uvarint(&mut buf, value);
        self.write_all(&buf)?;
        Ok(())
    }

    /// Writes a zig-zag signed varint.
    pub fn write_varint(&mut self, value: i64) -> Result<()> {
        self.write_uvarint(zig_zag_encode(value))
    }

    /// Writes a byte slice prefixed with its length as an unsigned varint.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.write_uvarint(data.len() as u64)?;
        self.write_all(data)?;
        Ok(())
    }

    /// Writes a string prefixed with its byte length as an unsigned varint.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Compresses `data` into a single LZ4 frame written to the sink.
    pub fn write_lz4(&mut self, data: &[u8]) -> Result<()> {
        let mut encoder = lz4_flex::frame::FrameEncoder::new(&mut *self);
        encoder
            .write_all(data)
            .map_err(|e| StoreError::Compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| StoreError::Compression(e.to_string()))?;
        Ok(())
    }
}

impl<W: Write> Write for StructuredWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.offset += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// A seekable byte source with typed big-endian readers mirroring
/// [`StructuredWriter`].
#[derive(Debug)]
pub struct StructuredReader<R: Read + Seek> {
    inner: R,
}

impl<R: Read + Seek> StructuredReader<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Unwraps this reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Moves the read position of the underlying source.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.inner.seek(pos)?)
    }

    /// Fills `buf` exactly; reaching the end of the source first is an error.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                StoreError::UnexpectedEof
            } else {
                StoreError::Io(e)
            }
        })
    }

    /// Reads a single byte, or `Ok(None)` if the source is exhausted.
    pub fn try_read_u8(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Reads a single unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Reads a single signed byte.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads a 16-bit unsigned integer, big-endian.
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Reads a 16-bit signed integer, big-endian.
    pub fn read_i16(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    /// Reads a 32-bit unsigned integer, big-endian.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Reads a 32-bit signed integer, big-endian.
    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Reads a 64-bit unsigned integer, big-endian.
    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Reads a 64-bit signed integer, big-endian.
    pub fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    /// Reads a 32-bit float from its IEEE-754 bit pattern, big-endian.
    pub fn read_f32(&mut self) -> Result<f32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(f32::from_bits(u32::from_be_bytes(buf)))
    }

    /// Reads a 64-bit float from its IEEE-754 bit pattern, big-endian.
    pub fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(f64::from_bits(u64::from_be_bytes(buf)))
    }

    /// Reads an unsigned LEB128 varint.
    pub fn read_uvarint(&mut self) -> Result<u64> {
        let first = self.read_u8()?;
        self.finish_uvarint(first)
    }

    /// Reads an unsigned varint, or `Ok(None)` if the source is exhausted
    /// before its first byte.
    pub fn try_read_uvarint(&mut self) -> Result<Option<u64>> {
        match self.try_read_u8()? {
            Some(first) => Ok(Some(self.finish_uvarint(first)?)),
            None => Ok(None),
        }
    }

    /// Reads a zig-zag signed varint.
    pub fn read_varint(&mut self) -> Result<i64> {
        Ok(zig_zag_decode(self.read_uvarint()?))
    }

    /// Reads a signed varint, or `Ok(None)` if the source is exhausted
    /// before its first byte.
    pub fn try_read_varint(&mut self) -> Result<Option<i64>> {
        Ok(self.try_read_uvarint()?.map(zig_zag_decode))
    }

    fn finish_uvarint(&mut self, first: u8) -> Result<u64> {
        let mut value = u64::from(first & 0x7F);
        let mut shift = 7u32;
        let mut byte = first;
        while byte & 0x80 != 0 {
            if shift > 63 {
                return Err(StoreError::TruncatedVarint);
            }
            byte = self.try_read_u8()?.ok_or(StoreError::TruncatedVarint)?;
            value |= u64::from(byte & 0x7F) << shift;
            shift += 7;
        }
        Ok(value)
    }

    /// Reads a varint-length-prefixed byte slice.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let length = self.read_uvarint()?;
        let mut data = vec![0u8; length as usize];
        self.read_exact(&mut data)?;
        Ok(data)
    }

    /// Reads a length-prefixed byte slice, or `Ok(None)` if the source is
    /// exhausted before the length prefix.
    pub fn try_read_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(length) = self.try_read_uvarint()? else {
            return Ok(None);
        };
        let mut data = vec![0u8; length as usize];
        self.read_exact(&mut data)?;
        Ok(Some(data))
    }

    /// Reads a varint-length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.read_bytes()?)?)
    }

    /// Reads a length-prefixed string, or `Ok(None)` if the source is
    /// exhausted before the length prefix.
    pub fn try_read_string(&mut self) -> Result<Option<String>> {
        match self.try_read_bytes()? {
            Some(data) => Ok(Some(String::from_utf8(data)?)),
            None => Ok(None),
        }
    }

    /// Decompresses a single LZ4 frame starting at the current position.
    pub fn read_lz4(&mut self) -> Result<Vec<u8>> {
        let mut decoder = lz4_flex::frame::FrameDecoder::new(&mut self.inner);
        let mut data = Vec::new();
        decoder
            .read_to_end(&mut data)
            .map_err(|e| StoreError::Decompression(e.to_string()))?;
        Ok(data)
    }
}

impl<R: Read + Seek> Read for StructuredReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(write: impl FnOnce(&mut StructuredWriter<Vec<u8>>)) -> StructuredReader<Cursor<Vec<u8>>> {
        let mut writer = StructuredWriter::new(Vec::new());
        write(&mut writer);
        StructuredReader::new(Cursor::new(writer.into_inner()))
    }

    #[test]
    fn test_fixed_width_big_endian() {
        let mut writer = StructuredWriter::new(Vec::new());
        writer.write_u32(1).unwrap();
        writer.write_u16(0x0203).unwrap();
        assert_eq!(writer.into_inner(), vec![0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_fixed_width_roundtrip() {
        let mut reader = roundtrip(|w| {
            w.write_u8(7).unwrap();
            w.write_i8(-7).unwrap();
            w.write_u16(300).unwrap();
            w.write_i16(-300).unwrap();
            w.write_u32(70_000).unwrap();
            w.write_i32(-70_000).unwrap();
            w.write_u64(1 << 40).unwrap();
            w.write_i64(-(1 << 40)).unwrap();
            w.write_f32(1.5).unwrap();
            w.write_f64(-2.25).unwrap();
        });

        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_i8().unwrap(), -7);
        assert_eq!(reader.read_u16().unwrap(), 300);
        assert_eq!(reader.read_i16().unwrap(), -300);
        assert_eq!(reader.read_u32().unwrap(), 70_000);
        assert_eq!(reader.read_i32().unwrap(), -70_000);
        assert_eq!(reader.read_u64().unwrap(), 1 << 40);
        assert_eq!(reader.read_i64().unwrap(), -(1 << 40));
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_f64().unwrap(), -2.25);
    }

    #[test]
    fn test_float_bit_pattern_preserved() {
        let nan = f64::from_bits(0x7FF8_0000_0000_1234);
        let mut reader = roundtrip(|w| w.write_f64(nan).unwrap());
        assert_eq!(reader.read_f64().unwrap().to_bits(), nan.to_bits());
    }

    #[test]
    fn test_varint_roundtrip() {
        let values = [0i64, 1, -1, 63, -64, 64, 1000, -1000, i64::MAX, i64::MIN];
        let mut reader = roundtrip(|w| {
            for &v in &values {
                w.write_varint(v).unwrap();
            }
        });
        for &expected in &values {
            assert_eq!(reader.read_varint().unwrap(), expected);
        }
        assert!(reader.try_read_varint().unwrap().is_none());
    }

    #[test]
    fn test_uvarint_encoding() {
        let mut buf = Vec::new();
        append_uvarint(&mut buf, 8);
        assert_eq!(buf, vec![0x08]);

        buf.clear();
        append_uvarint(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);

        let (value, read) = take_uvarint(&[0xAC, 0x02, 0xFF]).unwrap();
        assert_eq!(value, 300);
        assert_eq!(read, 2);
    }

    #[test]
    fn test_truncated_varint() {
        let mut reader = StructuredReader::new(Cursor::new(vec![0x80, 0x80]));
        assert!(matches!(
            reader.read_uvarint(),
            Err(StoreError::TruncatedVarint)
        ));

        assert!(matches!(
            take_uvarint(&[0x80]),
            Err(StoreError::TruncatedVarint)
        ));
    }

    #[test]
    fn test_bytes_and_string_framing() {
        let mut reader = roundtrip(|w| {
            w.write_bytes(b"abc").unwrap();
            w.write_string("stream").unwrap();
            w.write_string("").unwrap();
        });
        assert_eq!(reader.read_bytes().unwrap(), b"abc");
        assert_eq!(reader.read_string().unwrap(), "stream");
        assert_eq!(reader.read_string().unwrap(), "");
        assert!(reader.try_read_string().unwrap().is_none());
    }

    #[test]
    fn test_truncated_bytes_is_an_error() {
        // Length prefix promises 5 bytes, only 2 are present.
        let mut buf = Vec::new();
        append_uvarint(&mut buf, 5);
        buf.extend_from_slice(b"ab");
        let mut reader = StructuredReader::new(Cursor::new(buf));
        assert!(matches!(
            reader.read_bytes(),
            Err(StoreError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_offset_tracking() {
        let mut writer = StructuredWriter::new(Vec::new());
        assert_eq!(writer.offset(), 0);
        writer.write_u64(1).unwrap();
        assert_eq!(writer.offset(), 8);
        writer.write_uvarint(1).unwrap();
        assert_eq!(writer.offset(), 9);
        writer.write_string("ab").unwrap();
        assert_eq!(writer.offset(), 12);
    }

    #[test]
    fn test_lz4_roundtrip() {
        let payload: Vec<u8> = (0..10_000u32).flat_map(|i| i.to_be_bytes()).collect();
        let mut writer = StructuredWriter::new(Vec::new());
        writer.write_lz4(&payload).unwrap();
        let compressed_len = writer.offset();
        assert!(compressed_len < payload.len() as u64);

        let mut reader = StructuredReader::new(Cursor::new(writer.into_inner()));
        assert_eq!(reader.read_lz4().unwrap(), payload);
    }

    #[test]
    fn test_lz4_garbage_is_an_error() {
        let mut reader = StructuredReader::new(Cursor::new(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        assert!(matches!(
            reader.read_lz4(),
            Err(StoreError::Decompression(_))
        ));
    }

    #[test]
    fn test_seek() {
        let mut reader = roundtrip(|w| {
            w.write_u64(11).unwrap();
            w.write_u64(22).unwrap();
        });
        reader.seek(SeekFrom::Start(8)).unwrap();
        assert_eq!(reader.read_u64().unwrap(), 22);
        reader.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(reader.read_u64().unwrap(), 11);
    }
}
