//! Block-boundary message splitter.
//!
//! Packs ordered text blocks (a header, one block per ranked item, a
//! footer) into as few messages as possible without exceeding a length
//! limit. Blocks are joined with a blank line and are never split across
//! messages unless a single block is longer than the limit on its own; such
//! a block is hard-split on line, then word boundaries.
//!
//! Length is measured in UTF-16 code units, the unit Telegram counts in.

/// Separator placed between blocks inside one message.
const BLOCK_SEPARATOR: &str = "\n\n";

/// Length of `text` in UTF-16 code units.
pub fn text_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Split `blocks` into messages of at most `limit` UTF-16 code units.
///
/// ```rust
/// use paperweek_core::message::split_message;
///
/// let blocks = vec!["a".repeat(6), "b".repeat(6), "c".repeat(6)];
/// let messages = split_message(&blocks, 14);
/// assert_eq!(messages, vec![format!("{}\n\n{}", "a".repeat(6), "b".repeat(6)), "c".repeat(6)]);
/// ```
pub fn split_message<S: AsRef<str>>(blocks: &[S], limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut messages = Vec::new();
    let mut current = String::new();

    for block in blocks {
        let block = block.as_ref().trim();
        if block.is_empty() {
            continue;
        }

        let would_be = if current.is_empty() {
            text_len(block)
        } else {
            text_len(&current) + text_len(BLOCK_SEPARATOR) + text_len(block)
        };

        if would_be > limit && !current.is_empty() {
            messages.push(std::mem::take(&mut current));
        }

        if text_len(block) > limit {
            messages.extend(hard_split(block, limit));
            continue;
        }

        if !current.is_empty() {
            current.push_str(BLOCK_SEPARATOR);
        }
        current.push_str(block);
    }

    if !current.is_empty() {
        messages.push(current);
    }

    messages
}

/// Split one oversized block at `limit`, preferring newline, then space
/// boundaries.
fn hard_split(block: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut remaining = block;

    while !remaining.is_empty() {
        if text_len(remaining) <= limit {
            pieces.push(remaining.to_string());
            break;
        }

        let max_end = byte_offset_for_units(remaining, limit);
        let window = &remaining[..max_end];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&pos| pos > 0)
            .map(|pos| pos + 1)
            .unwrap_or(max_end);

        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        remaining = remaining[split_at..].trim_start();
    }

    pieces
}

/// Largest char-boundary byte offset whose prefix fits in `units` UTF-16
/// code units. Always advances at least one char.
fn byte_offset_for_units(text: &str, units: usize) -> usize {
    let mut used = 0;
    for (offset, ch) in text.char_indices() {
        let width = ch.len_utf16();
        if used + width > units {
            return if offset == 0 { ch.len_utf8() } else { offset };
        }
        used += width;
    }
    text.len()
}
