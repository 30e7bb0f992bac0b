//! Statement tokenizer.
//!
//! Splits one source line into whitespace-delimited tokens. Quoted strings
//! (`"…"` or `'…'`) and bracketed list literals (`[…]`, nested depth
//! tracked) are single atomic tokens. A `//` outside any quoted string
//! starts a comment that runs to the end of the line.

use smallvec::SmallVec;

/// Token list for one line. Most lines hold only a handful of tokens.
pub type Tokens<'a> = SmallVec<[&'a str; 8]>;

/// Cut the line at the first `//` that is not inside a quoted string.
///
/// Public because statement handlers that re-slice raw line text (`var`
/// equations, `for` headers) must drop trailing comments the same way the
/// tokenizer does.
pub fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
                    return &line[..i];
                }
            }
        }
        i += 1;
    }
    line
}

/// Advance past the quoted string starting at `start` (which holds the quote
/// character). Returns the index one past the closing quote, or the end of
/// the line if the string is unterminated.
fn scan_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Advance past the bracketed literal starting at `start`. Tracks nesting
/// depth; an unterminated literal consumes the rest of the line.
fn scan_bracketed(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Advance past a bare token: everything up to the next whitespace.
fn scan_bare(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Tokenize one line of source text.
///
/// Returns an empty list for blank or comment-only lines; the caller treats
/// those as no-ops. Malformed quotes or brackets are not an error here: the
/// rest of the line becomes one token, best effort.
pub fn tokenize(line: &str) -> Tokens<'_> {
    let line = strip_comment(line);
    let bytes = line.as_bytes();
    let mut tokens = Tokens::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let end = match bytes[i] {
            b'"' | b'\'' => scan_quoted(bytes, i),
            b'[' => scan_bracketed(bytes, i),
            _ => scan_bare(bytes, i),
        };
        tokens.push(&line[i..end]);
        i = end;
    }

    tokens
}
