// Chunking module
// Splits raw property documents into overlapping, deduplicated segments
// and derives property identifiers from source file names.


use itertools::Itertools;

use crate::{Result, StaywiseError};

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 2000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Chunks whose trimmed length does not exceed this are dropped.
pub const MIN_CHUNK_CHARS: usize = 30;

/// Split `text` into overlapping windows of at most `max_chars` characters.
///
/// Consecutive windows overlap by `overlap` characters; the final window ends
/// exactly at the end of the text and may be shorter. Each window is trimmed,
/// windows at or below [`MIN_CHUNK_CHARS`] are discarded, and exact duplicates
/// are removed keeping the first occurrence.
#[inline]
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Result<Vec<String>> {
    if overlap >= max_chars {
        // A non-positive advance step would loop forever.
        return Err(StaywiseError::Config(format!(
            "chunk overlap ({overlap}) must be smaller than the maximum chunk length ({max_chars})"
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let mut windows = Vec::new();
    if chars.len() <= max_chars {
        windows.push(text.to_string());
    } else {
        let step = max_chars - overlap;
        let mut start = 0;
        while start < chars.len() {
            let end = usize::min(start + max_chars, chars.len());
            windows.push(chars[start..end].iter().collect::<String>());
            if end == chars.len() {
                break;
            }
            start += step;
        }
    }

    let chunks = windows
        .iter()
        .map(|window| window.trim())
        .filter(|trimmed| trimmed.chars().count() > MIN_CHUNK_CHARS)
        .map(str::to_string)
        .unique()
        .collect();

    Ok(chunks)
}

/// Derive a property identifier from a source file name.
///
/// The `.txt` extension is removed regardless of case, any character outside
/// word characters and hyphens becomes an underscore, runs of underscores
/// collapse to one, and leading/trailing underscores are trimmed.
#[inline]
pub fn sanitize_property_id(filename: &str) -> String {
    let stem = match filename.len().checked_sub(4).and_then(|i| filename.get(i..)) {
        Some(ext) if ext.eq_ignore_ascii_case(".txt") => &filename[..filename.len() - 4],
        _ => filename,
    };

    let mut id = String::with_capacity(stem.len());
    let mut prev_underscore = false;
    for c in stem.chars() {
        if c.is_alphanumeric() || c == '-' {
            id.push(c);
            prev_underscore = false;
        } else if !prev_underscore {
            id.push('_');
            prev_underscore = true;
        }
    }

    id.trim_matches('_').to_string()
}
