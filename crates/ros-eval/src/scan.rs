//! Expression tokenizer.
//!
//! Richer than the statement tokenizer: it recognizes two-character
//! operators, word operators, parentheses, and single-character symbols in
//! addition to strings, numbers, identifiers, and bracketed list atoms.
//! Word operators are matched on whole words only: `android` is one
//! identifier, never `and` followed by `roid`.

use crate::EvalError;

/// Reserved word operators; never treated as variable names.
pub const WORD_OPERATORS: &[&str] = &[
    "and", "or", "not", "in", "index", "pop", "len", "sqrt", "cbrt", "sin", "cos", "tan",
];

const TWO_CHAR_OPS: &[&str] = &["==", "!=", ">=", "<=", "//", "**"];

const SYMBOL_CHARS: &[u8] = b"()+-*/%^<>=|&~";

/// Is this token a reserved word operator?
pub fn is_word_operator(token: &str) -> bool {
    WORD_OPERATORS.contains(&token)
}

/// Does this token have identifier shape (alphanumerics and underscores)?
pub fn is_word(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Does this token have number shape: digits, optionally a dot and more
/// digits? (No sign, no exponent; signs are unary operators.)
pub fn is_number(token: &str) -> bool {
    let bytes = token.as_bytes();
    if bytes.is_empty() || !bytes[0].is_ascii_digit() {
        return false;
    }
    let mut seen_dot = false;
    for &b in bytes {
        if b == b'.' {
            if seen_dot {
                return false;
            }
            seen_dot = true;
        } else if !b.is_ascii_digit() {
            return false;
        }
    }
    true
}

/// Is this token a quoted string atom?
pub fn is_quoted(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
}

/// Is this token a bracketed list atom?
pub fn is_bracketed(token: &str) -> bool {
    token.starts_with('[') && token.ends_with(']')
}

fn scan_quoted(bytes: &[u8], start: usize) -> Result<usize, EvalError> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(EvalError::Syntax("unterminated string literal".to_string()))
}

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

/// Number shape: `\d+` then optionally `.` and more digits. A trailing dot
/// is part of the number (`5.` scans as one token).
fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    i
}

fn scan_word(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    i
}

/// Tokenize an expression string.
///
/// Unlike the statement tokenizer this one fails loudly: an unterminated
/// string or a character outside the grammar is a syntax error rather than
/// best-effort slush.
pub fn scan(expr: &str) -> Result<Vec<&str>, EvalError> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if b == b'[' {
            let end = scan_bracketed(bytes, i);
            tokens.push(&expr[i..end]);
            i = end;
            continue;
        }

        if b == b'"' || b == b'\'' {
            let end = scan_quoted(bytes, i)?;
            tokens.push(&expr[i..end]);
            i = end;
            continue;
        }

        if i + 1 < bytes.len() {
            let pair = &expr[i..i + 2];
            if TWO_CHAR_OPS.contains(&pair) {
                tokens.push(pair);
                i += 2;
                continue;
            }
        }

        if b.is_ascii_digit() {
            let end = scan_number(bytes, i);
            tokens.push(&expr[i..end]);
            i = end;
            continue;
        }

        if b.is_ascii_alphabetic() || b == b'_' {
            let end = scan_word(bytes, i);
            tokens.push(&expr[i..end]);
            i = end;
            continue;
        }

        if SYMBOL_CHARS.contains(&b) {
            tokens.push(&expr[i..i + 1]);
            i += 1;
            continue;
        }

        return Err(EvalError::Syntax(format!(
            "unexpected character '{}' in expression",
            expr[i..].chars().next().unwrap_or('?')
        )));
    }

    Ok(tokens)
}
