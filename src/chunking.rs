use log::debug;

/// Maximum characters per chunk
pub const CHUNK_SIZE: usize = 1000;
/// Characters carried over from the end of one chunk into the next
pub const CHUNK_OVERLAP: usize = 200;

/// Separators tried in order, from paragraph breaks down to single characters
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The actual text content of this chunk
    pub text: String,
    /// Position of this chunk in the document
    pub index: usize,
    /// Estimated token count for this chunk
    pub token_count: usize,
}

/// Split text into overlapping chunks of at most `CHUNK_SIZE` characters
pub fn split_into_chunks(text: &str) -> Vec<TextChunk> {
    split_with(text, CHUNK_SIZE, CHUNK_OVERLAP)
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk {
            token_count: estimate_token_count(&text),
            text,
            index,
        })
        .collect()
}

/// Recursive character splitter with explicit sizes
pub fn split_with(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    recursive_split(text, &SEPARATORS, chunk_size, chunk_overlap)
}

fn recursive_split(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    // Pick the first separator that actually occurs; "" always matches
    let (position, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(*sep))
        .map(|(i, sep)| (i, *sep))
        .unwrap_or((separators.len().saturating_sub(1), ""));
    let remaining = &separators[position + 1..];

    let splits: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|s| !s.is_empty()).collect()
    };

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for split in splits {
        if char_len(split) < chunk_size {
            pending.push(split);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_splits(&pending, separator, chunk_size, chunk_overlap));
            pending.clear();
        }

        if remaining.is_empty() {
            chunks.push(split.to_string());
        } else {
            chunks.extend(recursive_split(split, remaining, chunk_size, chunk_overlap));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_splits(&pending, separator, chunk_size, chunk_overlap));
    }

    chunks
}

/// Greedily join small pieces into chunks, keeping a tail of up to `chunk_overlap`
/// characters as the start of the next chunk
fn merge_splits(
    splits: &[&str],
    separator: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut total = 0;

    for &split in splits {
        let len = char_len(split);
        let joined_len = |total: usize, current: &[&str]| {
            total + len + if current.is_empty() { 0 } else { separator_len }
        };

        if joined_len(total, current.as_slice()) > chunk_size {
            if total > chunk_size {
                debug!(
                    "Created a chunk of {} characters, longer than the limit of {}",
                    total, chunk_size
                );
            }

            if !current.is_empty() {
                push_joined(&mut chunks, &current, separator);

                // Drop pieces from the front until only the overlap remains
                while total > chunk_overlap
                    || (total > 0 && joined_len(total, current.as_slice()) > chunk_size)
                {
                    let dropped = current.remove(0);
                    total -= char_len(dropped) + if current.is_empty() { 0 } else { separator_len };
                    if current.is_empty() {
                        total = 0;
                        break;
                    }
                }
            }
        }

        total += len + if current.is_empty() { 0 } else { separator_len };
        current.push(split);
    }

    push_joined(&mut chunks, &current, separator);
    chunks
}

fn push_joined(chunks: &mut Vec<String>, pieces: &[&str], separator: &str) {
    let joined = pieces.join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Calculate approximate token count for a text
/// This is a very simple estimation - words plus punctuation
pub fn estimate_token_count(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
    words + punctuation
}
