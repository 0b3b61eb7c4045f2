//! Placeholder argument parsing.
//!
//! Arguments follow the placeholder name, separated by `:`. Quoted arguments
//! may contain colons, and so may bracketed raw expressions (`=map[string]int{"a": 1}`).

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use super::literal::go_quote;

lazy_static! {
    static ref NUMBER: Regex = Regex::new(
        r"^[+-]?(?:0[xX][0-9a-fA-F_]+|0[bB][01_]+|0[oO][0-7_]+|(?:\d[\d_]*(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?)$"
    )
    .unwrap();
}

/// One placeholder argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// A string or rune literal, kept as written.
    Quoted(String),
    Number(String),
    Bool(String),
    /// `=expr`: a Go expression inserted verbatim.
    Raw(String),
    /// An unquoted word.
    Bare(String),
}

impl Argument {
    pub fn parse(token: &str) -> Argument {
        let token = token.trim();
        if let Some(raw) = token.strip_prefix('=') {
            return Argument::Raw(raw.trim().to_string());
        }
        if token.starts_with(['"', '`', '\'']) {
            return Argument::Quoted(token.to_string());
        }
        if token == "true" || token == "false" {
            return Argument::Bool(token.to_string());
        }
        if NUMBER.is_match(token) {
            return Argument::Number(token.to_string());
        }
        Argument::Bare(token.to_string())
    }

    /// Go source for this argument, passed to a parameter of `param_type`.
    ///
    /// Unquoted arguments passed to a `string` parameter are quoted.
    pub fn to_go(&self, param_type: Option<&str>) -> String {
        match self {
            Argument::Quoted(text) | Argument::Raw(text) => text.clone(),
            Argument::Number(text) | Argument::Bool(text) | Argument::Bare(text) => {
                if param_type.map(str::trim) == Some("string") {
                    go_quote(text)
                } else {
                    text.clone()
                }
            }
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Raw(text) => write!(f, "={}", text),
            Argument::Quoted(text)
            | Argument::Number(text)
            | Argument::Bool(text)
            | Argument::Bare(text) => write!(f, "{}", text),
        }
    }
}

/// Split the raw tail after `//:Name:` into argument tokens.
pub fn split_arguments(tail: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0usize;

    for c in tail.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '`' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '`' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ':' if depth == 0 => finish(&mut args, &mut current),
            _ => current.push(c),
        }
    }
    finish(&mut args, &mut current);
    args
}

fn finish(args: &mut Vec<String>, current: &mut String) {
    let token = current.trim();
    if !token.is_empty() {
        args.push(token.to_string());
    }
    current.clear();
}

pub fn parse_arguments(tail: &str) -> Vec<Argument> {
    split_arguments(tail).iter().map(|t| Argument::parse(t)).collect()
}
