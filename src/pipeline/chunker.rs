use crate::ir::{Chunk, Fragment};

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 2000;

/// Groups fragments into ordered, contiguous chunks whose text totals stay
/// within `max_chars` (counted in characters, markup overhead excluded). A
/// chunk closes only when it already has content and the next fragment would
/// push it strictly past the budget, so a single oversized fragment still
/// travels as its own chunk. Each chunk is later translated independently of
/// the others.
pub fn plan_chunks(fragments: &[Fragment], max_chars: usize) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current = Chunk::default();
    let mut used = 0usize;

    for frag in fragments {
        let add = frag.char_len();
        if !current.is_empty() && used + add > max_chars {
            chunks.push(std::mem::take(&mut current));
            used = 0;
        }
        used += add;
        current.fragments.push(frag.clone());
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
