//! Rewrite Go-style leading-dot references
//!
//! Source trees written for chezmoi address data as `{{ .chezmoi.os }}`.
//! minijinja has no implicit receiver, so a dot that starts a reference is
//! dropped before the template is parsed:
//!
//! ```
//! use hearth_template::preprocess::rewrite_go_dots;
//!
//! assert_eq!(rewrite_go_dots("{{ .chezmoi.os }}"), "{{ chezmoi.os }}");
//! assert_eq!(rewrite_go_dots("{% if .a == \"b.c\" %}"), "{% if a == \"b.c\" %}");
//! assert_eq!(rewrite_go_dots("a .b {{ x.y }}"), "a .b {{ x.y }}");
//! ```
//!
//! Only expression and statement tags are touched. Text, comments and
//! string literals pass through unchanged.

use std::borrow::Cow;

#[derive(Clone, Copy)]
enum State {
    Text,
    Tag { close: u8 },
    Comment,
}

const fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

// A dot after one of these is attribute access or a float, never a reference
const fn ends_value(b: u8) -> bool {
    is_ident(b) || matches!(b, b')' | b']' | b'}' | b'"' | b'\'')
}

/// Drop the leading dot of every data reference inside `{{ }}` and `{% %}`
pub fn rewrite_go_dots(source: &str) -> Cow<'_, str> {
    let bytes = source.as_bytes();
    let mut out = String::new();
    let mut flushed = 0;
    let mut state = State::Text;
    let mut prev: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Text => {
                if b == b'{' {
                    match next {
                        Some(b'{') => state = State::Tag { close: b'}' },
                        Some(b'%') => state = State::Tag { close: b'%' },
                        Some(b'#') => state = State::Comment,
                        _ => {
                            i += 1;
                            continue;
                        }
                    }
                    prev = None;
                    i += 2;
                    continue;
                }
            }
            State::Comment => {
                if b == b'#' && next == Some(b'}') {
                    state = State::Text;
                    i += 2;
                    continue;
                }
            }
            State::Tag { close } => {
                if b == close && next == Some(b'}') {
                    state = State::Text;
                    i += 2;
                    continue;
                }
                if b == b'"' || b == b'\'' {
                    i = skip_string(bytes, i);
                    prev = Some(b);
                    continue;
                }
                if b == b'.'
                    && !prev.is_some_and(ends_value)
                    && next.is_some_and(|n| n.is_ascii_alphabetic() || n == b'_')
                {
                    out.push_str(&source[flushed..i]);
                    flushed = i + 1;
                    i += 1;
                    continue;
                }
                if !b.is_ascii_whitespace() {
                    prev = Some(b);
                }
            }
        }
        i += 1;
    }

    if flushed == 0 {
        return Cow::Borrowed(source);
    }
    out.push_str(&source[flushed..]);
    Cow::Owned(out)
}

// Index just past the literal starting at `start`
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}
