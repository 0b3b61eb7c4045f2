//! Diagnostics and run summaries.
//!
//! Supports two output formats:
//! - Pretty: `[goahead]`-tagged diagnostics on stderr plus a colored summary
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Tag prefixed to every diagnostic line.
pub const TAG: &str = "[goahead]";

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enable debug output for the rest of the process.
pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

/// Debug output is on with `--verbose` or when `GOAHEAD_DEBUG` is set.
pub fn debug_enabled() -> bool {
    VERBOSE.load(Ordering::Relaxed) || std::env::var("GOAHEAD_DEBUG").is_ok()
}

/// Print a debug line to stderr when debug output is enabled.
pub fn debug(message: impl AsRef<str>) {
    if debug_enabled() {
        eprintln!("{} [debug] {}", TAG, message.as_ref());
    }
}

/// Severity levels for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single diagnostic raised while processing a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Empty when the diagnostic is not tied to a file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
    /// 0 when the diagnostic is not tied to a line.
    #[serde(default)]
    pub line: usize,
    /// The source line the diagnostic is about, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<String>,
}

impl Diagnostic {
    /// Render as a `[goahead]`-tagged line, with the source line underneath.
    pub fn render(&self) -> String {
        let mut out = format!("{} {}: ", TAG, self.severity);
        if !self.file.is_empty() {
            out.push_str(&self.file);
            if self.line > 0 {
                out.push_str(&format!(":{}", self.line));
            }
            out.push_str(": ");
        }
        out.push_str(&self.message);
        if let Some(source) = &self.source_line {
            out.push_str(&format!("\n    | {}", source.trim_end()));
        }
        out
    }
}

/// Aggregated outcome of a run.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub projects: usize,
    pub files_scanned: usize,
    pub files_rewritten: usize,
    pub placeholders_replaced: usize,
    pub regions_injected: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        severity: Severity,
        file: Option<&Path>,
        line: usize,
        message: impl Into<String>,
        source_line: Option<&str>,
    ) {
        let diagnostic = Diagnostic {
            severity,
            message: message.into(),
            file: file.map(|p| p.display().to_string()).unwrap_or_default(),
            line,
            source_line: source_line.map(str::to_string),
        };
        debug(diagnostic.render());
        self.diagnostics.push(diagnostic);
    }

    pub fn warn(&mut self, file: &Path, line: usize, message: impl Into<String>, source_line: Option<&str>) {
        self.push(Severity::Warning, Some(file), line, message, source_line);
    }

    pub fn error(&mut self, file: &Path, line: usize, message: impl Into<String>, source_line: Option<&str>) {
        self.push(Severity::Error, Some(file), line, message, source_line);
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }
}

// =============================================================================
// JSON Format
// =============================================================================

/// JSON report structure.
#[derive(Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    pub passed: bool,
    #[serde(flatten)]
    pub report: RunReport,
}

/// Write the report as JSON on stdout. Diagnostics still go to stderr so
/// the `[goahead]` lines look the same in both formats.
pub fn write_json(path: &str, report: &RunReport) -> anyhow::Result<()> {
    write_json_to(&mut io::stdout().lock(), &mut io::stderr().lock(), path, report)
}

fn write_json_to(out: &mut impl Write, err: &mut impl Write, path: &str, report: &RunReport) -> anyhow::Result<()> {
    write_diagnostics_to(err, report)?;
    let json = JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        passed: !report.has_errors(),
        report: report.clone(),
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?;
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write diagnostics to stderr and a colored summary to stdout.
pub fn write_pretty(path: &str, report: &RunReport) {
    // Nothing useful to do if stderr is gone.
    let _ = write_diagnostics_to(&mut io::stderr().lock(), report);

    println!();
    println!("  {} {}", "goahead".bold(), path.blue());
    println!();
    println!(
        "    {:<24}{}",
        "Projects:".dimmed(),
        report.projects
    );
    println!(
        "    {:<24}{}",
        "Files scanned:".dimmed(),
        report.files_scanned
    );
    println!(
        "    {:<24}{}",
        "Files rewritten:".dimmed(),
        report.files_rewritten
    );
    println!(
        "    {:<24}{}",
        "Placeholders replaced:".dimmed(),
        report.placeholders_replaced
    );
    println!(
        "    {:<24}{}",
        "Regions injected:".dimmed(),
        report.regions_injected
    );
    println!();
    write_final_status(report);
    println!();
}

fn write_diagnostics_to(err: &mut impl Write, report: &RunReport) -> io::Result<()> {
    for d in &report.diagnostics {
        let rendered = d.render();
        match d.severity {
            Severity::Error => writeln!(err, "{}", rendered.red())?,
            Severity::Warning => writeln!(err, "{}", rendered.yellow())?,
        }
    }
    Ok(())
}

fn write_final_status(report: &RunReport) {
    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);

    if errors > 0 {
        print!("  {}", "✗ FAILED".red());
    } else {
        print!("  {}", "✓ OK".green());
    }
    print!(
        "  {}",
        format!("({} errors, {} warnings)", errors, warnings).dimmed()
    );
    println!();
}
