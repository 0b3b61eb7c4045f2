//! Placeholder replacement.
//!
//! Files are processed line by line. A placeholder comment arms the
//! rewriter; the next non-blank line is its target. On the target line the
//! right-hand side of an assignment (or the whole line when there is none) is
//! searched for the first zero literal matching the result's kind, then for a
//! call to the placeholder's name. The placeholder comment itself is kept so
//! the file can be regenerated.

mod args;
mod literal;
mod tokens;

pub use args::{parse_arguments, split_arguments, Argument};
pub use literal::{format_result, go_quote, go_unquote, LiteralKind};
pub use tokens::{tokenize, Token, TokenKind};

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use crate::discover::markers::{is_region_end, region_begin_name};
use crate::discover::{classify_line, Marker};
use crate::report::{debug, RunReport};

lazy_static! {
    /// `var x T =`, `const x =`, `x :=`, `a, b =`, `x.y[i] +=`.
    static ref ASSIGNMENT_HEAD: Regex = Regex::new(
        r"^\s*(?:(?:var|const)\s+[\p{L}_][\p{L}\p{N}_]*(?:\s*,\s*[\p{L}_][\p{L}\p{N}_]*)*(?:\s+[^=]+?)?\s*=|[\p{L}_][\p{L}\p{N}_.\[\]]*(?:\s*,\s*[\p{L}_][\p{L}\p{N}_.\[\]]*)*\s*(?::=|[-+*/%&|^]?=))"
    )
    .unwrap();
}

/// A parsed `//:Name[:args]` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub args: Vec<Argument>,
    /// 1-indexed line of the comment.
    pub line: usize,
}

impl Placeholder {
    pub fn new(name: &str, tail: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            args: parse_arguments(tail),
            line,
        }
    }
}

/// A placeholder's computed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Canonical output of the driver.
    pub output: String,
    pub kind: LiteralKind,
}

/// Computes placeholder values. The error is reported as a warning and the
/// target line is left alone.
pub trait Evaluate {
    fn evaluate(&mut self, placeholder: &Placeholder, depth: usize) -> Result<Evaluation, String>;
}

/// Result of rewriting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub text: String,
    pub replaced: usize,
}

/// Outcome of patching one target line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    Replaced(String),
    /// The line already holds the result.
    UpToDate,
    NoTarget,
}

/// Replace every placeholder target in `content`.
pub fn rewrite_source(
    path: &Path,
    content: &str,
    depth: usize,
    evaluator: &mut dyn Evaluate,
    report: &mut RunReport,
) -> RewriteOutcome {
    let mut out = String::with_capacity(content.len());
    let mut replaced = 0;
    let mut pending: Option<(Placeholder, &str)> = None;
    let mut in_region = false;

    for (index, raw) in content.split_inclusive('\n').enumerate() {
        let (line, ending) = split_line_ending(raw);
        let number = index + 1;

        if in_region {
            in_region = !is_region_end(line);
            out.push_str(raw);
            continue;
        }
        if region_begin_name(line).is_some() {
            in_region = true;
            out.push_str(raw);
            continue;
        }

        let marker = classify_line(line);
        if pending.is_some() && line.trim().is_empty() {
            out.push_str(raw);
            continue;
        }

        if let Some((placeholder, comment)) = pending.take() {
            if marker.is_none() {
                let patched = apply(path, &placeholder, comment, line, depth, evaluator, report);
                if let Some(new_line) = patched {
                    replaced += 1;
                    out.push_str(&new_line);
                    out.push_str(ending);
                } else {
                    out.push_str(raw);
                }
                continue;
            }
            report.warn(
                path,
                placeholder.line,
                format!("placeholder {:?} is followed by another marker instead of code", placeholder.name),
                Some(comment),
            );
        }

        if let Some(Marker::Placeholder { name, args }) = marker {
            pending = Some((Placeholder::new(name, args, number), line));
        }
        out.push_str(raw);
    }

    if let Some((placeholder, comment)) = pending {
        report.warn(
            path,
            placeholder.line,
            format!("placeholder {:?} has no target line", placeholder.name),
            Some(comment),
        );
    }

    RewriteOutcome { text: out, replaced }
}

/// Evaluate `placeholder` and patch `line`. `Some` carries the new line when
/// a replacement was made.
fn apply(
    path: &Path,
    placeholder: &Placeholder,
    comment: &str,
    line: &str,
    depth: usize,
    evaluator: &mut dyn Evaluate,
    report: &mut RunReport,
) -> Option<String> {
    let evaluation = match evaluator.evaluate(placeholder, depth) {
        Ok(evaluation) => evaluation,
        Err(message) => {
            report.warn(path, placeholder.line, message, Some(comment));
            return None;
        }
    };

    let result = format_result(&evaluation.output, evaluation.kind);
    match patch_line(line, &placeholder.name, &result, evaluation.kind) {
        Patch::Replaced(new_line) => {
            debug(format!(
                "{}:{}: {} -> {}",
                path.display(),
                placeholder.line + 1,
                placeholder.name,
                result
            ));
            Some(new_line)
        }
        Patch::UpToDate => None,
        Patch::NoTarget => {
            report.warn(
                path,
                placeholder.line,
                format!(
                    "no {} literal or call to {} found on the line after placeholder {:?}",
                    evaluation.kind.as_str(),
                    placeholder.name,
                    placeholder.name
                ),
                Some(line),
            );
            None
        }
    }
}

/// Patch a single target line with an already formatted `result`.
pub fn patch_line(line: &str, name: &str, result: &str, kind: LiteralKind) -> Patch {
    let head = assignment_head(line);
    let start = head.unwrap_or_else(|| line.len() - line.trim_start().len());
    let rhs = &line[start..];

    let zero = find_zero_literal(rhs, kind);
    // Earlier runs filled literals left to right; once the first one holds
    // the result, the remaining zeros belong to the code, not to us.
    if zero.is_some() && first_literal(rhs, kind) == Some(result) {
        return Patch::UpToDate;
    }

    let span = zero.or_else(|| find_call(rhs, name));
    if let Some((from, to)) = span {
        let mut patched = String::with_capacity(line.len() + result.len());
        patched.push_str(&line[..start + from]);
        patched.push_str(result);
        patched.push_str(&line[start + to..]);
        return Patch::Replaced(patched);
    }

    if holds_result(rhs, result) {
        return Patch::UpToDate;
    }
    if head.is_some() {
        return Patch::NoTarget;
    }

    // No assignment: the whole line is the value, as in a composite literal
    // element or an expression statement.
    let indent = &line[..start];
    let comma = if line.trim_end().ends_with(',') { "," } else { "" };
    Patch::Replaced(format!("{}{}{}", indent, result, comma))
}

/// Byte offset where an assignment's right-hand side starts.
fn assignment_head(line: &str) -> Option<usize> {
    let m = ASSIGNMENT_HEAD.find(line)?;
    if line[m.end()..].starts_with('=') {
        return None;
    }
    Some(m.end())
}

/// Span of the first zero-valued literal of `kind`.
pub fn find_zero_literal(text: &str, kind: LiteralKind) -> Option<(usize, usize)> {
    let tokens = tokenize(text);
    let find = |wanted: &[&str], token_kind: TokenKind| {
        tokens
            .iter()
            .find(|t| t.kind == token_kind && wanted.contains(&t.text))
            .map(|t| (t.start, t.end))
    };
    match kind {
        LiteralKind::String => find(&["\"\"", "``"], TokenKind::String),
        LiteralKind::Int | LiteralKind::Uint => find(&["0"], TokenKind::Number),
        LiteralKind::Float => find(&["0.0"], TokenKind::Number).or_else(|| find(&["0"], TokenKind::Number)),
        LiteralKind::Bool => find(&["false"], TokenKind::Ident),
        LiteralKind::Other => None,
    }
}

/// Text of the first literal of `kind`, with a directly attached minus sign
/// for numbers.
fn first_literal(text: &str, kind: LiteralKind) -> Option<&str> {
    let tokens = tokenize(text);
    let index = tokens.iter().position(|t| match kind {
        LiteralKind::String => t.kind == TokenKind::String,
        LiteralKind::Int | LiteralKind::Uint | LiteralKind::Float => t.kind == TokenKind::Number,
        LiteralKind::Bool => t.kind == TokenKind::Ident && (t.text == "true" || t.text == "false"),
        LiteralKind::Other => false,
    })?;
    let token = tokens[index];
    let start = match index.checked_sub(1).map(|i| tokens[i]) {
        Some(prev) if token.kind == TokenKind::Number && prev.text == "-" && prev.end == token.start => prev.start,
        _ => token.start,
    };
    Some(&text[start..token.end])
}

/// Span of the first call `name(...)`, parentheses balanced.
pub fn find_call(text: &str, name: &str) -> Option<(usize, usize)> {
    let tokens = tokenize(text);
    let parts: Vec<&str> = name.split('.').collect();
    let width = parts.len() * 2 - 1;

    for i in 0..tokens.len() {
        if i > 0 && tokens[i - 1].text == "." {
            continue;
        }
        if i + width >= tokens.len() {
            break;
        }
        let matches_name = parts.iter().enumerate().all(|(k, part)| {
            tokens[i + 2 * k].kind == TokenKind::Ident
                && tokens[i + 2 * k].text == *part
                && (k == 0 || tokens[i + 2 * k - 1].text == ".")
        });
        if !matches_name || tokens[i + width].text != "(" {
            continue;
        }

        let mut depth = 0usize;
        for t in &tokens[i + width..] {
            match t.text {
                "(" => depth += 1,
                ")" => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((tokens[i].start, t.end));
                    }
                }
                _ => {}
            }
        }
        return None;
    }
    None
}

/// Whether `text` already contains `result` (token-exact for single tokens).
fn holds_result(text: &str, result: &str) -> bool {
    let wanted = tokenize(result);
    if let [single] = wanted.as_slice() {
        return tokenize(text).iter().any(|t| t.text == single.text);
    }
    text.contains(result)
}

fn split_line_ending(raw: &str) -> (&str, &str) {
    if let Some(line) = raw.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw.strip_suffix('\n') {
        (line, "\n")
    } else {
        (raw, "")
    }
}
