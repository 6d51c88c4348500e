//! Text chunking for the embedding pipeline.
//!
//! A sliding character window that prefers to cut at sentence ends, then
//! at whitespace, and overlaps consecutive chunks so retrieval does not
//! lose context at the seams. Operates on characters, not bytes, so
//! multi-byte scripts chunk the same way as ASCII.

/// Characters treated as sentence ends when looking for a cut point.
/// `।` covers scripts that close sentences with a danda.
const SENTENCE_TERMINATORS: [char; 4] = ['.', '!', '?', '।'];

/// One chunk plus its raw window offsets (in characters, pre-trim).
#[derive(Debug, Clone)]
pub struct ChunkSpan {
    pub text: String,
    pub start_char: usize,
    pub end_char: usize,
}

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// The window end backs up to the nearest sentence terminator, or failing
/// that the nearest whitespace, but never further back than
/// `start + overlap`. The next window starts `overlap` characters before
/// the previous cut. The start offset is forced to advance every
/// iteration, so `overlap >= chunk_size` degrades to disjoint windows
/// instead of looping forever.
pub fn chunk_spans(text: &str, chunk_size: usize, overlap: usize) -> Vec<ChunkSpan> {
    let chunk_size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len <= chunk_size {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![ChunkSpan {
            text: trimmed.to_string(),
            start_char: 0,
            end_char: len,
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        // Unclipped window end; the advance below is computed from it even
        // when the emitted slice stops at the end of the text.
        let mut end = start + chunk_size;

        if end < len {
            let floor = start + overlap;
            let mut cut = None;
            let mut i = end;
            while i > floor {
                if SENTENCE_TERMINATORS.contains(&chars[i]) {
                    cut = Some(i + 1);
                    break;
                }
                i -= 1;
            }
            if cut.is_none() {
                let mut i = end;
                while i > floor {
                    if chars[i].is_whitespace() {
                        cut = Some(i);
                        break;
                    }
                    i -= 1;
                }
            }
            if let Some(c) = cut {
                end = c;
            }
        }

        let slice_end = end.min(len);
        let piece: String = chars[start..slice_end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(ChunkSpan {
                text: trimmed.to_string(),
                start_char: start,
                end_char: slice_end,
            });
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Chunk texts only; offsets dropped.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    chunk_spans(text, chunk_size, overlap)
        .into_iter()
        .map(|c| c.text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_trimmed_chunk() {
        let chunks = chunk_text("  Hello, world!  ", 512, 50);
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(chunk_text("", 512, 50).is_empty());
        assert!(chunk_text("   \n ", 512, 50).is_empty());
    }

    #[test]
    fn cuts_at_sentence_boundary() {
        let chunks = chunk_text("Hello world. This is a test.", 15, 5);
        assert_eq!(chunks[0], "Hello world.");
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn falls_back_to_whitespace_cut() {
        // No sentence terminators anywhere: the cut lands on a space, not
        // inside a word.
        let text = "alpha beta gamma delta epsilon zeta eta theta iota";
        for chunk in chunk_text(text, 20, 4) {
            for word in chunk.split_whitespace() {
                assert!(text.contains(word), "split mid-word: {:?}", word);
            }
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "One two three four five six seven eight nine ten eleven twelve.";
        let spans = chunk_spans(text, 25, 10);
        assert!(spans.len() >= 2);
        for pair in spans.windows(2) {
            assert!(pair[1].start_char < pair[0].end_char);
        }
    }

    #[test]
    fn terminates_when_overlap_exceeds_chunk_size() {
        let text = "word ".repeat(200);
        let spans = chunk_spans(&text, 10, 20);
        assert!(!spans.is_empty());
        for pair in spans.windows(2) {
            assert!(pair[1].start_char > pair[0].start_char, "start offset repeated");
        }
    }

    #[test]
    fn spans_cover_the_whole_text() {
        let text = "First sentence here. Second sentence follows. Third one closes it out.";
        let spans = chunk_spans(text, 30, 8);
        assert_eq!(spans.first().unwrap().start_char, 0);
        assert_eq!(spans.last().unwrap().end_char, text.chars().count());
        for pair in spans.windows(2) {
            assert!(pair[1].start_char <= pair[0].end_char, "gap between chunks");
        }
    }

    #[test]
    fn danda_counts_as_sentence_end() {
        let text = "पहला वाक्य यहाँ है। दूसरा वाक्य आगे आता है और थोड़ा लंबा है।";
        let chunks = chunk_text(text, 25, 5);
        assert!(chunks[0].ends_with('।'), "first chunk: {:?}", chunks[0]);
    }
}
