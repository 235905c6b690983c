//! Bit-packing for boolean sequences.
//!
//! Eight booleans pack into one byte, LSB first: bit `j` of byte `i` holds
//! value `i * 8 + j`. The packed bytes are prefixed with the logical value
//! count as an unsigned varint so a decoder can drop the padding bits of the
//! final byte.

use crate::codec::io::{append_uvarint, take_uvarint};
use crate::error::{Result, StoreError};
use bitvec::prelude::*;

/// Packs a boolean slice into a varint-length-prefixed bit buffer.
///
/// An empty input encodes to an empty buffer.
pub fn encode_bit_packing(values: &[bool]) -> Vec<u8> {
    if values.is_empty() {
        return Vec::new();
    }

    let mut bits = BitVec::<u8, Lsb0>::with_capacity(values.len());
    for &value in values {
        bits.push(value);
    }

    let packed = bits.as_raw_slice();
    let mut encoded = Vec::with_capacity(packed.len() + 2);
    append_uvarint(&mut encoded, values.len() as u64);
    encoded.extend_from_slice(packed);

    encoded
}

/// Unpacks a buffer produced by [`encode_bit_packing`].
///
/// An empty input decodes to an empty vector.
pub fn decode_bit_packing(encoded: &[u8]) -> Result<Vec<bool>> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }

    let (count, prefix_len) = take_uvarint(encoded)?;
    let count = count as usize;

    let bits = BitSlice::<u8, Lsb0>::from_slice(&encoded[prefix_len..]);
    if count > bits.len() {
        return Err(StoreError::UnexpectedEof);
    }

    Ok(bits[..count].iter().by_vals().collect())
}
