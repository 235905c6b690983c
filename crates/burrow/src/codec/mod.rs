//! Encoding primitives shared by the archive and trigram disk formats.
//!
//! - [`io`]: offset-tracked structured byte I/O (big-endian fixed-width
//!   values, varints, length-prefixed framing, LZ4 frames)
//! - [`delta`]: delta-of-delta compression for integer sequences
//! - [`boolean`]: bit-packing for boolean sequences

pub mod boolean;
pub mod delta;
pub mod io;
