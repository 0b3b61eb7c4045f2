//! Comment markers understood by goahead.
//!
//! Helper files carry:
//! - `//go:ahead functions` within the first ten lines
//! - `//go:ahead import ALIAS=PATH` (zero or more)
//!
//! Regular sources carry:
//! - `//:Name[:args]` placeholders
//! - `//:inject:Name` injection requests
//!
//! Generated regions are bracketed by [`REGION_BEGIN`] and [`REGION_END`].

use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Number of leading lines searched for the activation marker.
pub const ACTIVATION_WINDOW: usize = 10;

/// Prefix of the line opening a generated region; the method name follows.
pub const REGION_BEGIN: &str = "// goahead:inject-begin";

/// Line closing a generated region.
pub const REGION_END: &str = "// End of goahead generated code.";

lazy_static::lazy_static! {
    static ref ACTIVATION: Regex = Regex::new(r"^\s*//go:ahead\s+functions\s*$").unwrap();
    static ref IMPORT_ALIAS: Regex =
        Regex::new(r#"^\s*//go:ahead\s+import\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*"?([^"\s]+)"?\s*$"#).unwrap();
    static ref BUILD_IGNORE: Regex =
        Regex::new(r"^\s*//\s*(?:go:build|\+build)\s.*\bignore\b").unwrap();
    static ref INJECTION: Regex =
        Regex::new(r"^\s*//\s*:inject:([A-Za-z_][A-Za-z0-9_]*)\s*$").unwrap();
    static ref PLACEHOLDER: Regex = Regex::new(
        r"^\s*//\s*:([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)(?::(.*))?$"
    )
    .unwrap();
}

/// A marker found on a regular source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker<'a> {
    /// `//:Name[:args]`; `args` is the raw tail after the second colon.
    Placeholder { name: &'a str, args: &'a str },
    /// `//:inject:Name`
    Injection { method: &'a str },
}

/// An `//go:ahead import ALIAS=PATH` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportAlias {
    pub alias: String,
    pub path: String,
}

/// Classify a source line as a placeholder or injection marker.
pub fn classify_line(line: &str) -> Option<Marker<'_>> {
    let line = line.trim_end();
    if let Some(caps) = INJECTION.captures(line) {
        let method = caps.get(1)?.as_str();
        return Some(Marker::Injection { method });
    }
    let caps = PLACEHOLDER.captures(line)?;
    let name = caps.get(1)?.as_str();
    if name == "inject" {
        return None;
    }
    let args = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    Some(Marker::Placeholder { name, args })
}

/// Whether any line of `content` carries a placeholder or injection marker.
pub fn contains_markers(content: &str) -> bool {
    content.lines().any(|line| classify_line(line).is_some())
}

/// Whether the helper activation marker appears in the first lines of `content`.
pub fn has_activation(content: &str) -> bool {
    content
        .lines()
        .take(ACTIVATION_WINDOW)
        .any(|line| ACTIVATION.is_match(line))
}

/// Read only the first lines of a file looking for the activation marker.
pub fn peek_activation(path: &Path) -> std::io::Result<bool> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines().take(ACTIVATION_WINDOW) {
        // Non-UTF-8 files cannot be helpers.
        let Ok(line) = line else {
            return Ok(false);
        };
        if ACTIVATION.is_match(&line) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Whether the file excludes itself from the normal Go build.
pub fn has_build_ignore(content: &str) -> bool {
    content
        .lines()
        .take_while(|line| !line.trim_start().starts_with("package "))
        .any(|line| BUILD_IGNORE.is_match(line))
}

/// Collect `//go:ahead import` directives.
pub fn parse_import_aliases(content: &str) -> Vec<ImportAlias> {
    content
        .lines()
        .filter_map(|line| IMPORT_ALIAS.captures(line.trim_end()))
        .map(|caps| ImportAlias {
            alias: caps[1].to_string(),
            path: caps[2].to_string(),
        })
        .collect()
}

/// Method name carried by a region-begin line.
pub fn region_begin_name(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix(REGION_BEGIN)?;
    let name = rest.trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

pub fn is_region_end(line: &str) -> bool {
    line.trim() == REGION_END
}
