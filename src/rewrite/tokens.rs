//! A single-line Go token scanner.
//!
//! Only as precise as literal replacement needs: strings, runes, numbers,
//! identifiers, and single-character punctuation. Scanning stops at a line
//! comment.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    String,
    Rune,
    Number,
    Ident,
    Punct,
}

/// A token and its byte range within the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let kind = match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => break,
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                match text[i + 2..].find("*/") {
                    Some(offset) => i += offset + 4,
                    None => break,
                }
                continue;
            }
            b'"' => {
                i = skip_quoted(bytes, i, b'"');
                TokenKind::String
            }
            b'\'' => {
                i = skip_quoted(bytes, i, b'\'');
                TokenKind::Rune
            }
            b'`' => {
                i = text[i + 1..]
                    .find('`')
                    .map(|offset| i + offset + 2)
                    .unwrap_or(bytes.len());
                TokenKind::String
            }
            b'0'..=b'9' => {
                i = skip_number(bytes, i);
                TokenKind::Number
            }
            b'.' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                i = skip_number(bytes, i);
                TokenKind::Number
            }
            _ => {
                let Some(c) = text[i..].chars().next() else {
                    break;
                };
                if c.is_alphabetic() || c == '_' {
                    i = text[i..]
                        .char_indices()
                        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
                        .map(|(offset, _)| i + offset)
                        .unwrap_or(bytes.len());
                    TokenKind::Ident
                } else {
                    i += c.len_utf8();
                    TokenKind::Punct
                }
            }
        };
        tokens.push(Token {
            kind,
            text: &text[start..i],
            start,
            end: i,
        });
    }

    tokens
}

/// End offset of a `"` or `'` literal starting at `start`; unterminated
/// literals run to the end of the text.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
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

fn skip_number(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        let exponent_sign = matches!(b, b'+' | b'-')
            && i > start
            && matches!(bytes[i - 1], b'e' | b'E' | b'p' | b'P')
            && !is_hex(&bytes[start..i]);
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || exponent_sign {
            i += 1;
        } else {
            break;
        }
    }
    i
}

fn is_hex(number: &[u8]) -> bool {
    number.len() > 1 && number[0] == b'0' && matches!(number[1], b'x' | b'X') && !number.contains(&b'p')
}
