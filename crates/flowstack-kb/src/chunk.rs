/// Default sliding-window width, in characters.
pub const CHUNK_SIZE: usize = 800;

/// Default overlap carried between consecutive windows.
pub const CHUNK_OVERLAP: usize = 120;

/// One window of a chunked document. Offsets are character positions into
/// the original text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
}

/// Split text into overlapping fixed-width windows.
///
/// Windows are measured in characters and sliced on character boundaries,
/// so multibyte input never splits a code point.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let n = offsets.len();
    let byte_at = |char_idx: usize| {
        if char_idx >= n {
            text.len()
        } else {
            offsets[char_idx]
        }
    };

    let mut chunks = Vec::new();
    if n == 0 {
        return chunks;
    }

    let mut i = 0usize;
    loop {
        let start = i;
        let end = usize::min(i + chunk_size, n);
        chunks.push(Chunk {
            text: text[byte_at(start)..byte_at(end)].to_string(),
            char_start: start,
            char_end: end,
        });
        if end == n {
            break;
        }
        i = end.saturating_sub(overlap);
    }

    chunks
}
