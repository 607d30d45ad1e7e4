//! Recursive character text splitter.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters
//! (Unicode scalar values). Text is cut on the coarsest separator that
//! works, falling back to finer ones only for pieces that are still too
//! long:
//!
//! 1. paragraph break (`\n\n`)
//! 2. line break (`\n`)
//! 3. sentence end (`.`, `!`, `?` followed by a space)
//! 4. space
//! 5. single characters (always succeeds)
//!
//! Separators stay attached to the end of the piece they close, so the
//! pieces of a text concatenate back to it exactly. Pieces are packed
//! greedily into a window; when the next piece does not fit, the window is
//! emitted and the next one starts with the trailing `chunk_overlap`
//! characters of the emitted chunk.
//!
//! # Example
//!
//! ```rust
//! use docvec::chunk::RecursiveSplitter;
//!
//! let splitter = RecursiveSplitter::new(256, 50).unwrap();
//! let chunks = splitter.split_text("Hello world.\n\nSecond paragraph.");
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph.".to_string()]);
//! ```

use std::ops::Range;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::error::ConfigError;
use crate::models::{Chunk, EnrichedDocument, Metadata};

pub const DEFAULT_CHUNK_SIZE: usize = 256;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Paragraph,
    Line,
    Sentence,
    Word,
    Char,
}

/// Coarsest to finest.
const SEPARATORS: [Separator; 5] = [
    Separator::Paragraph,
    Separator::Line,
    Separator::Sentence,
    Separator::Word,
    Separator::Char,
];

impl Separator {
    /// Byte offsets, relative to `text`, at which pieces end. The last
    /// offset is always `text.len()` and offsets are strictly increasing.
    fn piece_ends(self, text: &str) -> Vec<usize> {
        let mut ends = Vec::new();
        match self {
            Separator::Paragraph => ends_after(text, "\n\n", &mut ends),
            Separator::Line => ends_after(text, "\n", &mut ends),
            Separator::Word => ends_after(text, " ", &mut ends),
            Separator::Sentence => {
                // ASCII bytes never occur inside a multi-byte sequence, so
                // every offset found here is a char boundary.
                let bytes = text.as_bytes();
                for i in 0..bytes.len().saturating_sub(1) {
                    if matches!(bytes[i], b'.' | b'!' | b'?') && bytes[i + 1] == b' ' {
                        ends.push(i + 2);
                    }
                }
            }
            Separator::Char => ends.extend(text.char_indices().skip(1).map(|(i, _)| i)),
        }
        if ends.last() != Some(&text.len()) {
            ends.push(text.len());
        }
        ends
    }
}

fn ends_after(text: &str, sep: &str, ends: &mut Vec<usize>) {
    ends.extend(text.match_indices(sep).map(|(i, m)| i + m.len()));
}

/// Byte offset where the last `n` characters of `s` begin.
fn tail_start(s: &str, n: usize) -> usize {
    if n == 0 {
        return s.len();
    }
    s.char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

struct Window {
    start: usize,
    end: usize,
    chars: usize,
}

/// Greedy packing state shared across recursion levels.
struct Merger<'a> {
    text: &'a str,
    chunk_size: usize,
    chunk_overlap: usize,
    spans: Vec<Range<usize>>,
    last_chars: usize,
    window: Option<Window>,
}

impl<'a> Merger<'a> {
    fn new(text: &'a str, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            text,
            chunk_size,
            chunk_overlap,
            spans: Vec::new(),
            last_chars: 0,
            window: None,
        }
    }

    fn push(&mut self, piece: Range<usize>, chars: usize) {
        if let Some(window) = self.window.as_mut() {
            if window.chars + chars <= self.chunk_size {
                window.end = piece.end;
                window.chars += chars;
                return;
            }
            self.flush();
        }

        let (start, carried) = self.carry_over(piece.start, chars);
        self.window = Some(Window {
            start,
            end: piece.end,
            chars: carried + chars,
        });
    }

    /// Start of a new window whose first piece begins at `piece_start`,
    /// plus the number of characters carried over from the previous chunk.
    ///
    /// The carry is capped so the window still fits the piece and stays
    /// strictly shorter than the previous chunk.
    fn carry_over(&self, piece_start: usize, piece_chars: usize) -> (usize, usize) {
        match self.spans.last() {
            Some(last) if last.end == piece_start => {
                let carried = self
                    .chunk_overlap
                    .min(self.chunk_size - piece_chars)
                    .min(self.last_chars.saturating_sub(1));
                let offset = tail_start(&self.text[last.clone()], carried);
                (last.start + offset, carried)
            }
            _ => (piece_start, 0),
        }
    }

    fn flush(&mut self) {
        if let Some(window) = self.window.take() {
            self.spans.push(window.start..window.end);
            self.last_chars = window.chars;
        }
    }

    fn finish(mut self) -> Vec<Range<usize>> {
        self.flush();
        self.spans
    }
}

/// Splits text into overlapping, size-bounded chunks.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl RecursiveSplitter {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `chunk_size` is zero or
    /// `chunk_overlap` is not smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "chunking.chunk_size must be > 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ConfigError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Byte ranges of `text` covered by each chunk, in order.
    ///
    /// Consecutive ranges are contiguous or overlap; together they cover
    /// the whole text. Empty text yields no ranges.
    pub fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.is_empty() {
            return Vec::new();
        }
        if text.chars().count() <= self.chunk_size {
            return vec![0..text.len()];
        }

        let mut merger = Merger::new(text, self.chunk_size, self.chunk_overlap);
        self.split_range(text, 0..text.len(), 0, &mut merger);
        merger.finish()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_spans(text)
            .into_iter()
            .map(|span| text[span].to_string())
            .collect()
    }

    /// Split every document, keeping document order. Each chunk carries a
    /// copy of its document's metadata and an index restarting at 0 per
    /// document.
    pub fn split_documents(&self, docs: &[EnrichedDocument]) -> Vec<Chunk> {
        docs.iter()
            .flat_map(|doc| {
                self.split_spans(&doc.text)
                    .into_iter()
                    .enumerate()
                    .map(move |(i, span)| make_chunk(i as i64, &doc.text[span], &doc.metadata))
            })
            .collect()
    }

    fn split_range(&self, text: &str, range: Range<usize>, level: usize, merger: &mut Merger<'_>) {
        let separator = SEPARATORS[level];
        let mut piece_start = range.start;

        for end in separator.piece_ends(&text[range.clone()]) {
            let piece = piece_start..range.start + end;
            piece_start = piece.end;

            let chars = text[piece.clone()].chars().count();
            if chars > self.chunk_size {
                // Character-level pieces are one char long and chunk_size >= 1,
                // so this branch never runs past the last separator.
                merger.flush();
                self.split_range(text, piece, level + 1, merger);
            } else {
                merger.push(piece, chars);
            }
        }
    }
}

fn make_chunk(index: i64, text: &str, metadata: &Metadata) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        chunk_index: index,
        text: text.to_string(),
        metadata: metadata.clone(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetadataValue;

    fn prose(len: usize) -> String {
        "The quick brown fox jumps over the lazy dog. "
            .repeat(len / 45 + 1)
            .chars()
            .take(len)
            .collect()
    }

    fn doc(text: &str, filename: &str) -> EnrichedDocument {
        let mut metadata = Metadata::new();
        metadata.insert("filename".into(), MetadataValue::from(filename));
        metadata.insert("file_type".into(), MetadataValue::from("text/plain"));
        EnrichedDocument {
            text: text.to_string(),
            metadata,
        }
    }

    /// Rebuild the text from the parts of each span that extend past the
    /// previous span.
    fn reconstruct(text: &str, spans: &[Range<usize>]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for span in spans {
            assert!(span.start <= covered, "gap before span {:?}", span);
            assert!(span.end > covered, "span {:?} adds nothing", span);
            out.push_str(&text[covered..span.end]);
            covered = span.end;
        }
        out
    }

    #[test]
    fn test_small_text_single_chunk() {
        let splitter = RecursiveSplitter::default();
        assert_eq!(splitter.split_text("Hello, world!"), vec!["Hello, world!"]);
    }

    #[test]
    fn test_exactly_chunk_size_is_one_chunk() {
        let splitter = RecursiveSplitter::default();
        let text = prose(256);
        assert_eq!(splitter.split_text(&text), vec![text.clone()]);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let splitter = RecursiveSplitter::default();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_documents(&[doc("", "empty.txt")]).is_empty());
    }

    #[test]
    fn test_300_chars_prose_gives_two_chunks_with_overlap() {
        let splitter = RecursiveSplitter::new(256, 50).unwrap();
        let text = prose(300);
        assert_eq!(text.chars().count(), 300);

        let chunks = splitter.split_text(&text);
        assert_eq!(chunks.len(), 2);

        let first = &chunks[0];
        let tail: String = first.chars().skip(first.chars().count() - 50).collect();
        assert!(chunks[1].starts_with(&tail));
        assert!(chunks.iter().all(|c| c.chars().count() <= 256));
    }

    #[test]
    fn test_overlap_shortened_when_next_sentence_is_long() {
        // 90-char sentence, then a 210-char run: only 256 - 210 = 46
        // characters of overlap fit in front of the run.
        let splitter = RecursiveSplitter::new(256, 50).unwrap();
        let text = format!("{}. {}", "a".repeat(88), "b".repeat(210));
        assert_eq!(text.chars().count(), 300);

        let chunks = splitter.split_text(&text);
        let lens: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lens, vec![90, 256]);

        let first = &chunks[0];
        assert!(chunks[1].starts_with(&first[first.len() - 46..]));
        assert!(!chunks[1].starts_with(&first[first.len() - 50..]));
        assert!(chunks[1].ends_with(&"b".repeat(210)));
    }

    #[test]
    fn test_paragraphs_preferred_over_sentences() {
        let splitter = RecursiveSplitter::new(40, 0).unwrap();
        let text = "Alpha beta gamma.\n\nDelta epsilon zeta.\n\nEta theta iota kappa.";
        let chunks = splitter.split_text(text);
        assert_eq!(
            chunks,
            vec![
                "Alpha beta gamma.\n\nDelta epsilon zeta.\n\n",
                "Eta theta iota kappa."
            ]
        );
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let splitter = RecursiveSplitter::new(10, 3).unwrap();
        let text = "x".repeat(25);
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 2);
        for c in &chunks {
            assert!((1..=10).contains(&c.chars().count()));
        }
        let spans = splitter.split_spans(&text);
        assert_eq!(reconstruct(&text, &spans), text);
    }

    #[test]
    fn test_multibyte_text_respects_char_limits() {
        let splitter = RecursiveSplitter::new(8, 2).unwrap();
        let text = "日本語のテキストを分割します。絵文字も🙂🙂🙂含みます";
        let spans = splitter.split_spans(text);
        for span in &spans {
            let n = text[span.clone()].chars().count();
            assert!((1..=8).contains(&n), "bad chunk length {}", n);
        }
        assert_eq!(reconstruct(text, &spans), text);
    }

    #[test]
    fn test_overlap_shrinks_to_fit_large_piece() {
        // The second sentence is 18 chars; 18 + 10 overlap > 20, so the
        // carry is cut to 2 characters.
        let splitter = RecursiveSplitter::new(20, 10).unwrap();
        let text = "Short one here. Much longer words.";
        let chunks = splitter.split_text(text);
        for c in &chunks {
            assert!(c.chars().count() <= 20);
        }
        let spans = splitter.split_spans(text);
        assert_eq!(reconstruct(text, &spans), text);
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        assert!(RecursiveSplitter::new(0, 0).is_err());
        assert!(RecursiveSplitter::new(50, 50).is_err());
        assert!(RecursiveSplitter::new(50, 60).is_err());
        assert!(RecursiveSplitter::new(50, 49).is_ok());
    }

    #[test]
    fn test_documents_keep_order_and_metadata() {
        let splitter = RecursiveSplitter::new(64, 8).unwrap();
        let docs = vec![doc(&prose(200), "a.txt"), doc("tiny", "b.txt"), doc(&prose(100), "c.txt")];
        let chunks = splitter.split_documents(&docs);

        let names: Vec<String> = chunks
            .iter()
            .map(|c| c.metadata["filename"].to_string())
            .collect();
        let first_b = names.iter().position(|n| n == "b.txt").unwrap();
        let first_c = names.iter().position(|n| n == "c.txt").unwrap();
        assert!(names[..first_b].iter().all(|n| n == "a.txt"));
        assert_eq!(first_c, first_b + 1);
        assert!(names[first_c..].iter().all(|n| n == "c.txt"));

        for c in &chunks {
            let parent = docs
                .iter()
                .find(|d| d.metadata["filename"] == c.metadata["filename"])
                .unwrap();
            assert_eq!(c.metadata, parent.metadata);
        }
    }

    #[test]
    fn test_chunk_indices_contiguous_per_document() {
        let splitter = RecursiveSplitter::new(32, 4).unwrap();
        let docs = vec![doc(&prose(150), "a.txt"), doc(&prose(90), "b.txt")];
        let chunks = splitter.split_documents(&docs);

        let mut expected = 0;
        let mut current = String::new();
        for c in &chunks {
            let name = c.metadata["filename"].to_string();
            if name != current {
                current = name;
                expected = 0;
            }
            assert_eq!(c.chunk_index, expected);
            expected += 1;
        }
    }

    #[test]
    fn test_hashes_deterministic_ids_unique() {
        let splitter = RecursiveSplitter::new(40, 5).unwrap();
        let d = [doc(&prose(160), "a.txt")];
        let c1 = splitter.split_documents(&d);
        let c2 = splitter.split_documents(&d);
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
            assert_ne!(a.id, b.id);
        }
    }

    mod proptest_splitter {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn chunks_within_bounds(
                text in "[a-z .!?\n]{0,1500}",
                chunk_size in 1usize..300,
                overlap_ratio in 0.0f64..1.0,
            ) {
                let overlap = ((chunk_size as f64) * overlap_ratio) as usize;
                let overlap = overlap.min(chunk_size - 1);
                let splitter = RecursiveSplitter::new(chunk_size, overlap).unwrap();
                for chunk in splitter.split_text(&text) {
                    let n = chunk.chars().count();
                    prop_assert!(n >= 1 && n <= chunk_size);
                }
            }

            #[test]
            fn non_overlapping_parts_rebuild_text(
                text in "\\PC{0,800}",
                chunk_size in 2usize..120,
                overlap in 0usize..60,
            ) {
                let overlap = overlap.min(chunk_size - 1);
                let splitter = RecursiveSplitter::new(chunk_size, overlap).unwrap();
                let spans = splitter.split_spans(&text);
                prop_assert_eq!(reconstruct(&text, &spans), text);
            }

            #[test]
            fn short_text_unchanged(text in "\\PC{1,256}") {
                prop_assume!(text.chars().count() <= 256);
                let splitter = RecursiveSplitter::default();
                prop_assert_eq!(splitter.split_text(&text), vec![text.clone()]);
            }
        }
    }
}
