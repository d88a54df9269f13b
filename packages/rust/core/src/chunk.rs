//! Recursive character text splitting for vector indexing.
//!
//! Splits page text on progressively finer separators (paragraph, line,
//! word, character) and greedily merges the pieces into chunks of at most
//! `chunk_size` characters, carrying `chunk_overlap` characters of trailing
//! context into each following chunk.

use std::collections::VecDeque;

/// Separators tried in order, coarsest first. The empty string means
/// "split anywhere" and bounds the recursion.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Character-based recursive text splitter.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Create a splitter. The overlap is clamped below the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Split `text` into overlapping chunks of at most `chunk_size` chars.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_level(text, SEPARATORS)
    }

    /// One level of recursive splitting with the given separator list.
    fn split_level(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator that actually occurs in the text; "" always matches
        let (sep_idx, sep) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || text.contains(**s))
            .map(|(i, s)| (i, *s))
            .unwrap_or((separators.len() - 1, ""));
        let rest = &separators[sep_idx + 1..];

        let splits: Vec<String> = if sep.is_empty() {
            return hard_split(text, self.chunk_size);
        } else {
            text.split(sep).map(str::to_string).collect()
        };

        let mut chunks: Vec<String> = Vec::new();
        let mut good: Vec<String> = Vec::new();

        for piece in splits {
            if char_len(&piece) <= self.chunk_size {
                good.push(piece);
            } else {
                // Flush merged pieces, then recurse into the oversized one
                if !good.is_empty() {
                    chunks.extend(self.merge(&good, sep));
                    good.clear();
                }
                if rest.is_empty() {
                    chunks.extend(hard_split(&piece, self.chunk_size));
                } else {
                    chunks.extend(self.split_level(&piece, rest));
                }
            }
        }

        if !good.is_empty() {
            chunks.extend(self.merge(&good, sep));
        }

        chunks
    }

    /// Greedily merge small pieces into chunks, keeping an overlap window.
    fn merge(&self, splits: &[String], sep: &str) -> Vec<String> {
        let sep_len = char_len(sep);
        let mut docs: Vec<String> = Vec::new();
        let mut current: VecDeque<String> = VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);
            let join_len = if current.is_empty() { 0 } else { sep_len };

            if total + len + join_len > self.chunk_size && !current.is_empty() {
                push_doc(&mut docs, &current, sep);

                // Shrink the window until it fits inside the overlap budget
                while total > self.chunk_overlap
                    || (total + len + if current.is_empty() { 0 } else { sep_len }
                        > self.chunk_size
                        && total > 0)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(&front)
                        + if current.is_empty() { 0 } else { sep_len };
                }
            }

            current.push_back(piece.clone());
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }

        push_doc(&mut docs, &current, sep);
        docs
    }
}

/// Join the window into a document, skipping blanks.
fn push_doc(docs: &mut Vec<String>, window: &VecDeque<String>, sep: &str) {
    let doc = window
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(sep)
        .trim()
        .to_string();
    if !doc.is_empty() {
        docs.push(doc);
    }
}

/// Split text into fixed-size character pieces (last resort).
fn hard_split(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|c| c.iter().collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let splitter = TextSplitter::new(1000, 100);
        let chunks = splitter.split("Acme sells widgets to enterprises.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Acme sells widgets to enterprises.");
    }

    #[test]
    fn empty_text_yields_nothing() {
        let splitter = TextSplitter::new(1000, 100);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("   \n\n  ").is_empty());
    }

    #[test]
    fn chunks_respect_size_limit() {
        let splitter = TextSplitter::new(50, 10);
        let words: Vec<String> = (0..200).map(|i| format!("word{i:03}")).collect();
        let text = words.join(" ");

        let chunks = splitter.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= 50,
                "chunk too long: {} chars",
                chunk.chars().count()
            );
        }
    }

    #[test]
    fn adjacent_chunks_overlap() {
        let splitter = TextSplitter::new(50, 20);
        let words: Vec<String> = (0..100).map(|i| format!("word{i:03}")).collect();
        let text = words.join(" ");

        let chunks = splitter.split(&text);
        assert!(chunks.len() > 2);

        // The first word of each later chunk was already part of the previous one
        for pair in chunks.windows(2) {
            let head = pair[1].split_whitespace().next().expect("non-empty chunk");
            assert!(
                pair[0].contains(head),
                "expected '{head}' to overlap into previous chunk"
            );
        }
    }

    #[test]
    fn zero_overlap_does_not_duplicate() {
        let splitter = TextSplitter::new(50, 0);
        let words: Vec<String> = (0..40).map(|i| format!("word{i:03}")).collect();
        let text = words.join(" ");

        let chunks = splitter.split(&text);
        assert!(chunks.len() > 1);
        // Every word appears exactly once across all chunks
        let rejoined = chunks.join(" ");
        for word in &words {
            assert_eq!(rejoined.matches(word.as_str()).count(), 1);
        }
    }

    #[test]
    fn paragraphs_preferred_over_words() {
        let splitter = TextSplitter::new(40, 0);
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let chunks = splitter.split(&text);

        // Paragraph boundaries survive: no chunk mixes partial paragraphs
        assert!(chunks.iter().any(|c| c.contains("First paragraph here.")));
        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
    }

    #[test]
    fn oversized_atom_is_hard_split() {
        let splitter = TextSplitter::new(10, 0);
        let text = "abcdefghijklmnopqrstuvwxyz"; // no separators at all
        let chunks = splitter.split(text);
        assert_eq!(chunks, vec!["abcdefghij", "klmnopqrst", "uvwxyz"]);
    }

    #[test]
    fn overlap_clamped_below_chunk_size() {
        // Would loop forever if overlap >= size were allowed
        let splitter = TextSplitter::new(10, 50);
        let words: Vec<String> = (0..20).map(|i| format!("w{i}")).collect();
        let chunks = splitter.split(&words.join(" "));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
    }
}
