//! Bracket-depth aware scanning over protobuf source text.
//!
//! All functions work on byte offsets. The delimiters they look for are ASCII, so offsets they
//! return always fall on character boundaries.

/// Replaces the contents of `//` and `/* */` comments with spaces, leaving string literals and
/// newlines untouched.
///
/// The result has exactly the same length as the input, so byte offsets into it are valid in the
/// original text.
pub(crate) fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => i = skip_string(bytes, i, quote),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                out[i] = b' ';
                out[i + 1] = b' ';
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    if bytes[i] != b'\n' {
                        out[i] = b' ';
                    }
                    i += 1;
                }
                if i < bytes.len() {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 2;
                }
            }
            _ => i += 1,
        }
    }

    // Every non-ASCII byte that was overwritten was overwritten together with the rest of its
    // character, so the buffer is still valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

/// Returns the index just past the closing quote of the string starting at `start`, or the end
/// of the line if it is unterminated.
fn skip_string(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            ch if ch == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn is_open(ch: u8) -> bool {
    matches!(ch, b'{' | b'[' | b'(')
}

fn is_close(ch: u8) -> bool {
    matches!(ch, b'}' | b']' | b')')
}

/// Given the index of an opening bracket, finds the index of the bracket that closes it.
///
/// Nested `{}`, `[]` and `()` pairs and quoted strings are skipped. Returns `None` if the text
/// ends first.
pub(crate) fn find_matching(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    debug_assert!(is_open(bytes[open]));

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                i = skip_string(bytes, i, quote);
                continue;
            }
            ch if is_open(ch) => depth += 1,
            ch if is_close(ch) => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => (),
        }
        i += 1;
    }

    None
}

/// Finds the first byte in `targets` which appears in `text[from..end]` outside any brackets or
/// strings.
///
/// Returns `None` if no target is found before `end`, or if a closing bracket belonging to an
/// enclosing scope is reached first.
pub(crate) fn find_top_level(text: &str, from: usize, end: usize, targets: &[u8]) -> Option<usize> {
    let bytes = &text.as_bytes()[..end];
    let mut depth = 0usize;
    let mut i = from;
    while i < bytes.len() {
        let ch = bytes[i];
        if depth == 0 && targets.contains(&ch) {
            return Some(i);
        }
        match ch {
            b'"' | b'\'' => {
                i = skip_string(bytes, i, ch);
                continue;
            }
            ch if is_open(ch) => depth += 1,
            ch if is_close(ch) => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
            }
            _ => (),
        }
        i += 1;
    }

    None
}

/// Splits `text[start..end]` on `separator` where it occurs outside brackets and strings.
///
/// The returned spans are trimmed of surrounding whitespace; empty pieces are dropped.
pub(crate) fn split_top_level(
    text: &str,
    start: usize,
    end: usize,
    separator: u8,
) -> Vec<(usize, usize)> {
    let bytes = &text.as_bytes()[..end];
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut piece_start = start;
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i, bytes[i]);
                continue;
            }
            ch if is_open(ch) => depth += 1,
            ch if is_close(ch) => depth = depth.saturating_sub(1),
            ch if ch == separator && depth == 0 => {
                push_trimmed(text, piece_start, i, &mut pieces);
                piece_start = i + 1;
            }
            _ => (),
        }
        i += 1;
    }
    push_trimmed(text, piece_start, end, &mut pieces);

    pieces
}

fn push_trimmed(text: &str, start: usize, end: usize, pieces: &mut Vec<(usize, usize)>) {
    let (start, end) = trim_span(text, start, end);
    if start < end {
        pieces.push((start, end));
    }
}

/// Shrinks `[start, end)` to exclude leading and trailing whitespace.
pub(crate) fn trim_span(text: &str, mut start: usize, mut end: usize) -> (usize, usize) {
    let bytes = text.as_bytes();
    while start < end && bytes[start].is_ascii_whitespace() {
        start += 1;
    }
    while end > start && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    (start, end)
}

/// Returns the index of the first non-whitespace byte at or after `from`, bounded by `end`.
pub(crate) fn skip_whitespace(text: &str, from: usize, end: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < end && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Returns the leading identifier-like word of `text`, if any.
pub(crate) fn leading_word(text: &str) -> &str {
    let end = text
        .bytes()
        .position(|ch| !(ch.is_ascii_alphanumeric() || ch == b'_'))
        .unwrap_or(text.len());
    &text[..end]
}
