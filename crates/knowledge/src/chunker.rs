//! Text chunking with configurable size and overlap.
//!
//! Chunks prefer to end at a paragraph break, then a line break, then a
//! space, and fall back to a hard cut on a UTF-8 boundary. Consecutive chunks
//! share roughly `overlap` bytes.

/// Break points in order of preference.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Chunk text into overlapping segments of at most `chunk_size` bytes.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || chunk_size == 0 {
        return vec![];
    }

    let overlap = overlap.min(chunk_size / 2);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let end = find_break(text, start, chunk_size);

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= text.len() {
            break;
        }

        // Step back by `overlap`, but always make progress
        let mut next_start = end.saturating_sub(overlap).max(start + 1);
        while next_start < text.len() && !text.is_char_boundary(next_start) {
            next_start += 1;
        }
        // Start the overlap on a word boundary when one is nearby
        if let Some(space) = text[next_start..end].find(' ') {
            next_start += space + 1;
        }
        start = next_start;
    }

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}

/// Pick the end of the chunk starting at `start`.
fn find_break(text: &str, start: usize, chunk_size: usize) -> usize {
    let limit = start + chunk_size;
    if limit >= text.len() {
        return text.len();
    }

    let mut hard_end = limit;
    while hard_end > start && !text.is_char_boundary(hard_end) {
        hard_end -= 1;
    }
    if hard_end == start {
        // A single character wider than chunk_size
        hard_end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        return hard_end;
    }

    let window = &text[start..hard_end];
    // Don't accept a break that leaves a tiny chunk
    let min_len = chunk_size / 4;

    for separator in SEPARATORS {
        if let Some(pos) = window.rfind(separator) {
            if pos >= min_len {
                return start + pos + separator.len();
            }
        }
    }

    hard_end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("  Expense policy v2  ", 1500, 150);
        assert_eq!(chunks, vec!["Expense policy v2"]);
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("", 100, 10).is_empty());
        assert!(chunk_text("   \n\n ", 100, 10).is_empty());
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let text = "word ".repeat(1000);
        let chunks = chunk_text(&text, 200, 50);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 200, "chunk of {} bytes", chunk.len());
        }
    }

    #[test]
    fn test_prefers_paragraph_breaks() {
        let para_a = "Alpha ".repeat(20);
        let para_b = "Beta ".repeat(20);
        let text = format!("{}\n\n{}", para_a.trim(), para_b.trim());

        let chunks = chunk_text(&text, 160, 0);
        assert_eq!(chunks[0], para_a.trim());
        assert!(chunks[1].starts_with("Beta"));
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text: String = (0..400).map(|i| format!("w{} ", i)).collect();
        let chunks = chunk_text(&text, 100, 30);

        assert!(chunks.len() >= 2);
        let last_word_of_first = chunks[0].split_whitespace().last().unwrap();
        assert!(chunks[1].contains(last_word_of_first));
    }

    #[test]
    fn test_utf8_safety() {
        let text = "Relatório anual — orçamento 🎮 ".repeat(50);
        let chunks = chunk_text(&text, 64, 16);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.len() <= 64);
        }
    }
}
