//! Literal kinds, Go string quoting, and result formatting.

use phf::phf_map;

use super::tokens::{tokenize, TokenKind};

/// What kind of literal a placeholder result replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    String,
    Int,
    Uint,
    Float,
    Bool,
    /// Any other type; only call-expression and whole-line replacement apply.
    Other,
}

/// Built-in Go types with a literal form.
static TYPE_KINDS: phf::Map<&'static str, LiteralKind> = phf_map! {
    "string" => LiteralKind::String,
    "bool" => LiteralKind::Bool,
    "int" => LiteralKind::Int,
    "int8" => LiteralKind::Int,
    "int16" => LiteralKind::Int,
    "int32" => LiteralKind::Int,
    "int64" => LiteralKind::Int,
    "rune" => LiteralKind::Int,
    "uint" => LiteralKind::Uint,
    "uint8" => LiteralKind::Uint,
    "uint16" => LiteralKind::Uint,
    "uint32" => LiteralKind::Uint,
    "uint64" => LiteralKind::Uint,
    "uintptr" => LiteralKind::Uint,
    "byte" => LiteralKind::Uint,
    "float32" => LiteralKind::Float,
    "float64" => LiteralKind::Float,
};

impl LiteralKind {
    /// Kind for a declared output type. `None` when the type is unknown
    /// (empty), meaning the kind has to be inferred from the output.
    pub fn from_type(type_name: &str) -> Option<LiteralKind> {
        let type_name = type_name.trim();
        if type_name.is_empty() {
            return None;
        }
        Some(TYPE_KINDS.get(type_name).copied().unwrap_or(LiteralKind::Other))
    }

    /// Guess the kind from a driver's canonical output.
    pub fn infer(output: &str) -> LiteralKind {
        let output = output.trim();
        let tokens = tokenize(output);
        match tokens.as_slice() {
            [t] if t.kind == TokenKind::String => LiteralKind::String,
            [t] if t.text == "true" || t.text == "false" => LiteralKind::Bool,
            [t] if t.kind == TokenKind::Number => number_kind(t.text),
            [sign, t] if sign.text == "-" && t.kind == TokenKind::Number => number_kind(t.text),
            _ => LiteralKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LiteralKind::String => "string",
            LiteralKind::Int => "integer",
            LiteralKind::Uint => "unsigned integer",
            LiteralKind::Float => "float",
            LiteralKind::Bool => "bool",
            LiteralKind::Other => "value",
        }
    }
}

fn number_kind(number: &str) -> LiteralKind {
    let is_hex = number.starts_with("0x") || number.starts_with("0X");
    if number.contains('.') || (!is_hex && number.contains(['e', 'E'])) {
        LiteralKind::Float
    } else {
        LiteralKind::Int
    }
}

/// Render a driver output as the Go source that replaces the literal.
///
/// Strings arrive quoted by the driver. They are re-rendered as a raw
/// string when they hold a backslash, which reads better than doubled
/// escapes, unless that is impossible (backtick or line break inside).
pub fn format_result(output: &str, kind: LiteralKind) -> String {
    let output = output.trim();
    match kind {
        LiteralKind::String => {
            let value = go_unquote(output).unwrap_or_else(|| output.to_string());
            if value.contains('\\') && !value.contains(['`', '\n', '\r']) {
                format!("`{}`", value)
            } else {
                go_quote(&value)
            }
        }
        LiteralKind::Bool => output.to_ascii_lowercase(),
        _ => output.to_string(),
    }
}

/// Quote `value` as a Go interpreted string literal.
pub fn go_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0b}' => out.push_str("\\v"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Decode a Go string literal (interpreted or raw). `None` if `literal` is
/// not one.
pub fn go_unquote(literal: &str) -> Option<String> {
    if literal.len() >= 2 && literal.starts_with('`') && literal.ends_with('`') {
        return Some(literal[1..literal.len() - 1].replace('\r', ""));
    }
    if literal.len() < 2 || !literal.starts_with('"') || !literal.ends_with('"') {
        return None;
    }

    let inner = &literal[1..literal.len() - 1];
    let mut bytes: Vec<u8> = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next()? {
            'a' => bytes.push(0x07),
            'b' => bytes.push(0x08),
            'f' => bytes.push(0x0c),
            'n' => bytes.push(b'\n'),
            'r' => bytes.push(b'\r'),
            't' => bytes.push(b'\t'),
            'v' => bytes.push(0x0b),
            '\\' => bytes.push(b'\\'),
            '"' => bytes.push(b'"'),
            '\'' => bytes.push(b'\''),
            'x' => bytes.push(u8::from_str_radix(&take(&mut chars, 2)?, 16).ok()?),
            'u' => push_char(&mut bytes, &take(&mut chars, 4)?)?,
            'U' => push_char(&mut bytes, &take(&mut chars, 8)?)?,
            d @ '0'..='7' => {
                let rest = take(&mut chars, 2)?;
                bytes.push(u8::from_str_radix(&format!("{}{}", d, rest), 8).ok()?);
            }
            _ => return None,
        }
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn take(chars: &mut std::str::Chars<'_>, n: usize) -> Option<String> {
    let taken: String = chars.take(n).collect();
    (taken.chars().count() == n).then_some(taken)
}

fn push_char(bytes: &mut Vec<u8>, hex: &str) -> Option<()> {
    let c = char::from_u32(u32::from_str_radix(hex, 16).ok()?)?;
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    Some(())
}
