//! Sentence-bounded text chunking

/// Sentence delimiter; kept at the end of the segment it closes
const SENTENCE_DELIMITER: &str = ". ";

/// Greedy sentence packer
///
/// Text is cut after every `". "`; consecutive segments are packed into one chunk
/// while its trimmed length stays within `max_chars` characters. A single
/// segment longer than the limit is cut at character boundaries.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    max_chars: usize,
}

impl SentenceChunker {
    /// Create a chunker; `max_chars` is raised to at least 1
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    /// Maximum chunk length in characters
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Split text into trimmed, non-empty chunks
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for segment in text.split_inclusive(SENTENCE_DELIMITER) {
            let candidate_len = char_len(format!("{}{}", current, segment).trim());
            if candidate_len <= self.max_chars {
                current.push_str(segment);
                continue;
            }

            flush(&mut chunks, &mut current);

            if char_len(segment.trim()) <= self.max_chars {
                current.push_str(segment);
            } else {
                self.hard_split(segment.trim(), &mut chunks);
            }
        }

        flush(&mut chunks, &mut current);
        chunks
    }

    fn hard_split(&self, segment: &str, chunks: &mut Vec<String>) {
        let chars: Vec<char> = segment.chars().collect();
        if chars.is_empty() {
            return;
        }

        // Start of the final piece; pulled back so it carries at least one word character
        let mut tail = (chars.len() - 1) / self.max_chars * self.max_chars;
        if tail > 0 {
            let floor = tail - self.max_chars + 1;
            while tail > floor
                && chars.len() - tail < self.max_chars
                && !chars[tail..].iter().any(|c| c.is_alphanumeric())
            {
                tail -= 1;
            }
        }

        let pieces = chars[..tail]
            .chunks(self.max_chars)
            .chain(std::iter::once(&chars[tail..]));
        for piece in pieces {
            let piece: String = piece.iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }
        }
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(500)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let chunk = current.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn without_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_sentences_are_packed_greedily() {
        let chunks = SentenceChunker::new(30).split("One two. Three four five. Six seven eight nine. Ten.");
        assert_eq!(
            chunks,
            vec!["One two. Three four five.", "Six seven eight nine. Ten."]
        );
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = SentenceChunker::default().split("Lenny answers questions. It is helpful.");
        assert_eq!(chunks, vec!["Lenny answers questions. It is helpful."]);
    }

    #[test]
    fn test_no_delimiter_is_added() {
        assert_eq!(SentenceChunker::new(100).split("no trailing period"), vec!["no trailing period"]);
    }

    #[test]
    fn test_long_sentence_is_hard_split() {
        let chunks = SentenceChunker::new(4).split("abcdefghij. xy");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij.", "xy"]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(SentenceChunker::new(10).split("").is_empty());
        assert!(SentenceChunker::new(10).split("   \n ").is_empty());
    }

    #[test]
    fn test_limit_counts_characters_not_bytes() {
        let chunks = SentenceChunker::new(5).split("ééééé. ààààà");
        assert_eq!(chunks, vec!["éééé", "é.", "ààààà"]);
    }

    #[test]
    fn test_hard_split_leaves_no_punctuation_only_piece() {
        let chunks = SentenceChunker::new(4).split("abcdefgh. Next");
        assert_eq!(chunks, vec!["abcd", "efg", "h.", "Next"]);

        let chunks = SentenceChunker::new(5).split("........");
        assert_eq!(chunks, vec!["...", "....."]);
    }

    proptest! {
        #[test]
        fn prop_chunks_respect_limit(text in "[a-zé .\n]{0,300}", max in 1usize..60) {
            for chunk in SentenceChunker::new(max).split(&text) {
                prop_assert!(chunk.chars().count() <= max);
                prop_assert!(!chunk.is_empty());
                prop_assert_eq!(chunk.trim(), chunk.as_str());
            }
        }

        #[test]
        fn prop_chunks_reproduce_text(text in "[a-z .\n]{0,300}", max in 1usize..60) {
            let chunks = SentenceChunker::new(max).split(&text);
            prop_assert_eq!(without_whitespace(&chunks.concat()), without_whitespace(&text));
        }
    }
}
