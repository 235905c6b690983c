//! Trigram inverted index for full-text phrase lookup.
//!
//! Indexed text is framed with two `0xFF` sentinel bytes (a value that never
//! appears in valid UTF-8) and every 3-byte window of the framed text forms a
//! [`Trigram`]. A text of `n` bytes yields `n + 2` windows; window `i` sits
//! at position `i - 2`, so the first window made entirely of content starts
//! at position 0. Each trigram maps to a posting list of
//! `(document id, position)` entries kept sorted and deduplicated.
//!
//! Phrase queries intersect the posting lists of consecutive query trigrams
//! under a fixed position shift, so matches are exact byte substrings, not
//! just bags of trigrams. The index lives in memory ([`MemoryIndex`]) and
//! persists to a two-file block-compressed format ([`disk`]).

mod disk;
mod memory;

pub use disk::POSTING_BLOCK_SIZE;
pub use memory::{MemoryIndex, Posting, Trigram};
