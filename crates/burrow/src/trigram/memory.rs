//! In-memory trigram index maintenance and search.

use std::collections::BTreeMap;
use std::fmt;

/// Byte appended twice to the end of indexed content to frame the trigram
/// windows; it never appears in valid UTF-8.
pub(crate) const SENTINEL: u8 = 0xFF;

/// A 3-byte window of sentinel-framed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Trigram(pub [u8; 3]);

/// One entry in a trigram's posting list.
///
/// `position` is the byte offset of the trigram within the indexed text,
/// shifted so that the first all-content window sits at position 0 (the two
/// windows before it, which still contain leading sentinel state, sit at -2
/// and -1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Posting {
    /// Identifier of the indexed document.
    pub document_id: i64,
    /// Shifted byte offset of the trigram within the document.
    pub position: i64,
}

/// In-memory trigram inverted index.
///
/// Posting lists are kept sorted by `(document id, position)` and
/// deduplicated, which the phrase-intersection search relies on.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MemoryIndex {
    pub(crate) postings: BTreeMap<Trigram, Vec<Posting>>,
}

impl MemoryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct trigrams in the index.
    pub fn trigram_count(&self) -> usize {
        self.postings.len()
    }

    /// Returns true if nothing has been indexed.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Indexes `content` under `document_id`.
    ///
    /// Re-adding the same document is a no-op: postings already present are
    /// skipped, so the lists stay deduplicated.
    pub fn add(&mut self, document_id: i64, content: &str) {
        for (i, trigram) in trigrams(content).into_iter().enumerate() {
            let posting = Posting {
                document_id,
                position: i as i64 - 2,
            };

            let list = self.postings.entry(trigram).or_default();
            if let Err(insertion_index) = list.binary_search(&posting) {
                list.insert(insertion_index, posting);
            }
        }
    }

    /// Finds every occurrence of `query` as a byte substring of an indexed
    /// document.
    ///
    /// Returns the postings of the query's first content trigram for each
    /// match, sorted by `(document id, position)`. Queries shorter than one
    /// full trigram (3 bytes) and queries containing a trigram absent from
    /// the index return no matches.
    pub fn search(&self, query: &str) -> Vec<Posting> {
        let trigrams = trigrams(query);
        // Drop the sentinel-bearing windows at both ends: the query matches
        // inside content, it is not anchored to document boundaries.
        if trigrams.len() <= 4 {
            return Vec::new();
        }
        let trigrams = &trigrams[2..trigrams.len() - 2];

        let Some(first) = self.postings.get(&trigrams[0]) else {
            return Vec::new();
        };

        let mut result = first.clone();
        for (shift, trigram) in trigrams.iter().enumerate().skip(1) {
            let Some(other) = self.postings.get(trigram) else {
                return Vec::new();
            };
            result = merge_shifted(&result, other, shift as i64);
        }

        result
    }
}

impl fmt::Display for MemoryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (trigram, postings) in &self.postings {
            write!(f, "{}: ", String::from_utf8_lossy(&trigram.0))?;
            for posting in postings {
                write!(f, "{}@{} ", posting.document_id, posting.position)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Computes the trigram windows of `content` framed with trailing sentinels.
fn trigrams(content: &str) -> Vec<Trigram> {
    let mut windows = Vec::with_capacity(content.len() + 2);

    let mut current = [SENTINEL; 3];
    for &byte in content.as_bytes().iter().chain(&[SENTINEL, SENTINEL]) {
        current = [current[1], current[2], byte];
        windows.push(Trigram(current));
    }

    windows
}

/// Intersects two sorted posting lists, keeping entries of `a` for which `b`
/// holds a posting in the same document exactly `shift` bytes later.
fn merge_shifted(a: &[Posting], b: &[Posting], shift: i64) -> Vec<Posting> {
    let mut result = Vec::new();

    let mut index_a = 0;
    let mut index_b = 0;
    while index_a < a.len() && index_b < b.len() {
        let posting_a = a[index_a];
        let posting_b = b[index_b];

        if posting_a.document_id < posting_b.document_id {
            index_a += 1;
        } else if posting_a.document_id > posting_b.document_id {
            index_b += 1;
        } else if posting_b.position - posting_a.position < shift {
            index_b += 1;
        } else if posting_b.position - posting_a.position > shift {
            index_a += 1;
        } else {
            result.push(posting_a);
            index_a += 1;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigram_windows() {
        let windows = trigrams("abc");
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0].0, [SENTINEL, SENTINEL, b'a']);
        assert_eq!(windows[1].0, [SENTINEL, b'a', b'b']);
        assert_eq!(windows[2].0, *b"abc");
        assert_eq!(windows[3].0, [b'b', b'c', SENTINEL]);
        assert_eq!(windows[4].0, [b'c', SENTINEL, SENTINEL]);
    }

    #[test]
    fn test_add_records_positions() {
        let mut index = MemoryIndex::new();
        index.add(7, "hello");

        let postings = &index.postings[&Trigram(*b"hel")];
        assert_eq!(
            postings,
            &vec![Posting {
                document_id: 7,
                position: 0
            }]
        );

        let postings = &index.postings[&Trigram(*b"llo")];
        assert_eq!(
            postings,
            &vec![Posting {
                document_id: 7,
                position: 2
            }]
        );
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut index = MemoryIndex::new();
        index.add(1, "hello");
        let once = index.postings.clone();

        index.add(1, "hello");
        assert_eq!(index.postings, once);
    }

    #[test]
    fn test_posting_lists_stay_sorted() {
        let mut index = MemoryIndex::new();
        index.add(9, "abcabc");
        index.add(2, "abc");

        let postings = &index.postings[&Trigram(*b"abc")];
        let mut sorted = postings.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(postings, &sorted);
    }

    #[test]
    fn test_phrase_search() {
        let mut index = MemoryIndex::new();
        index.add(1, "hello world");
        index.add(2, "ciao mondo");

        assert_eq!(
            index.search("llo wo"),
            vec![Posting {
                document_id: 1,
                position: 2
            }]
        );
    }

    #[test]
    fn test_search_matches_multiple_documents() {
        let mut index = MemoryIndex::new();
        index.add(1, "the quick fox");
        index.add(2, "a quick brown fox");
        index.add(3, "slow snail");

        let matches: Vec<i64> = index
            .search("quick")
            .iter()
            .map(|p| p.document_id)
            .collect();
        assert_eq!(matches, vec![1, 2]);
    }

    #[test]
    fn test_search_repeated_occurrences() {
        let mut index = MemoryIndex::new();
        index.add(1, "abcXabc");

        let positions: Vec<i64> = index.search("abc").iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0, 4]);
    }

    #[test]
    fn test_short_and_missing_queries() {
        let mut index = MemoryIndex::new();
        index.add(1, "hello world");

        assert!(index.search("").is_empty());
        assert!(index.search("he").is_empty());
        assert!(index.search("xyz").is_empty());
        // Present trigrams, but never adjacent in that order.
        assert!(index.search("world hello").is_empty());
    }

    #[test]
    fn test_display_lists_postings() {
        let mut index = MemoryIndex::new();
        index.add(1, "abc");
        let rendered = index.to_string();
        assert!(rendered.contains("abc: 1@0"));
    }
}
