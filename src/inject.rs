//! Injection of helper code after interface declarations.
//!
//! `//:inject:Method` above an interface copies the helper function `Method`
//! and every declaration it depends on into a delimited region right after
//! the interface:
//!
//! ```text
//! //:inject:Decode
//! type Decoder interface {
//!     Decode(s string) string
//! }
//!
//! // goahead:inject-begin Decode
//! ...copied declarations...
//! // End of goahead generated code.
//!
//! func main() {
//! ```
//!
//! Existing regions are removed before markers are applied again, so
//! repeated runs produce the same text.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::Path;
use thiserror::Error;

use crate::analysis::{go_analyzer, DeclarationKind, GoSource};
use crate::discover::markers::{is_region_end, region_begin_name, REGION_BEGIN, REGION_END};
use crate::discover::{classify_line, Marker};
use crate::project::{ImportSpec, ProjectContext};
use crate::report::{debug, RunReport};

/// Injection failures. Each aborts processing of the file it occurs in.
#[derive(Error, Debug)]
pub enum InjectError {
    #[error("injection marker for {method:?} must be followed by an interface type declaration")]
    NotAnInterface { line: usize, method: String },
    #[error("interface {interface} has no method {method:?} (it declares: {})", .methods.join(", "))]
    MethodNotInInterface {
        line: usize,
        method: String,
        interface: String,
        methods: Vec<String>,
    },
    #[error("generated region for {method:?} has no end marker")]
    UnterminatedRegion { line: usize, method: String },
    #[error("cannot analyze file: {0}")]
    Analysis(String),
}

impl InjectError {
    /// 1-indexed line the error refers to, 0 if none.
    pub fn line(&self) -> usize {
        match self {
            InjectError::NotAnInterface { line, .. }
            | InjectError::MethodNotInInterface { line, .. }
            | InjectError::UnterminatedRegion { line, .. } => *line,
            InjectError::Analysis(_) => 0,
        }
    }
}

/// Result of injecting into one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectOutcome {
    pub text: String,
    pub regions: usize,
}

pub fn has_regions(content: &str) -> bool {
    content.lines().any(|l| region_begin_name(l).is_some())
}

fn has_injection_markers(content: &str) -> bool {
    content
        .lines()
        .any(|l| matches!(classify_line(l), Some(Marker::Injection { .. })))
}

/// Remove every generated region and the blank lines following it.
pub fn strip_regions(content: &str) -> Result<String, InjectError> {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut out = String::with_capacity(content.len());
    let mut i = 0;

    while i < lines.len() {
        let Some(method) = region_begin_name(lines[i]) else {
            out.push_str(lines[i]);
            i += 1;
            continue;
        };
        let end = (i + 1..lines.len())
            .find(|&j| is_region_end(lines[j]))
            .ok_or_else(|| InjectError::UnterminatedRegion {
                line: i + 1,
                method: method.to_string(),
            })?;
        i = end + 1;
        while i < lines.len() && lines[i].trim().is_empty() {
            i += 1;
        }
    }

    Ok(out)
}

/// Indices of `root` and every declaration it transitively references, in
/// source order. A type brings its methods along.
pub fn dependency_closure(source: &GoSource, root: usize) -> Vec<usize> {
    let mut visited = BTreeSet::from([root]);
    let mut queue = VecDeque::from([root]);

    while let Some(current) = queue.pop_front() {
        let decl = &source.declarations[current];
        let mut deps: Vec<usize> = Vec::new();
        for name in &decl.references {
            deps.extend(
                source
                    .declarations
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| d.declares(name))
                    .map(|(i, _)| i),
            );
        }
        if decl.kind == DeclarationKind::Type {
            for name in &decl.names {
                deps.extend(
                    source
                        .declarations
                        .iter()
                        .enumerate()
                        .filter(|(_, d)| d.kind == DeclarationKind::Method && d.receiver.as_ref() == Some(name))
                        .map(|(i, _)| i),
                );
            }
        }
        for dep in deps {
            if visited.insert(dep) {
                queue.push_back(dep);
            }
        }
    }

    visited.into_iter().collect()
}

struct Insertion {
    /// 0-indexed last line of the interface declaration.
    after: usize,
    lines: Vec<String>,
}

/// Apply every injection marker in `content`.
pub fn inject_source(
    path: &Path,
    content: &str,
    ctx: &ProjectContext,
    depth: usize,
    report: &mut RunReport,
) -> Result<InjectOutcome, InjectError> {
    let had_regions = has_regions(content);
    if !has_injection_markers(content) && !had_regions {
        return Ok(InjectOutcome {
            text: content.to_string(),
            regions: 0,
        });
    }

    let stripped = strip_regions(content)?;
    let outcome = apply_markers(path, stripped, ctx, depth, report)?;
    if had_regions {
        warn_stale_imports(path, content, &outcome.text, report)?;
    }
    Ok(outcome)
}

fn apply_markers(
    path: &Path,
    stripped: String,
    ctx: &ProjectContext,
    depth: usize,
    report: &mut RunReport,
) -> Result<InjectOutcome, InjectError> {
    let lines: Vec<&str> = stripped.split_inclusive('\n').collect();
    let markers: Vec<(usize, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| match classify_line(line.trim_end()) {
            Some(Marker::Injection { method }) => Some((i, method.to_string())),
            _ => None,
        })
        .collect();
    if markers.is_empty() {
        return Ok(InjectOutcome {
            text: stripped,
            regions: 0,
        });
    }

    let target = go_analyzer()
        .analyze(path, stripped.as_bytes())
        .map_err(|e| InjectError::Analysis(e.to_string()))?;
    let mut emitted: HashSet<String> = target
        .declarations
        .iter()
        .flat_map(|d| d.shadow_keys())
        .collect();
    let mut imports: BTreeMap<String, ImportSpec> = BTreeMap::new();
    let mut insertions: Vec<Insertion> = Vec::new();

    for (marker_line, method) in markers {
        let interface = (marker_line + 1..lines.len())
            .find(|&j| {
                let t = lines[j].trim();
                !t.is_empty() && !t.starts_with("//")
            })
            .and_then(|j| target.interface_starting_at(j + 1))
            .ok_or_else(|| InjectError::NotAnInterface {
                line: marker_line + 1,
                method: method.clone(),
            })?;
        if !interface.methods.contains(&method) {
            return Err(InjectError::MethodNotInInterface {
                line: marker_line + 1,
                method,
                interface: interface.name.clone(),
                methods: interface.methods.clone(),
            });
        }

        let helper = ctx
            .index()
            .lookup(&method, depth)
            .and_then(|sym| ctx.helper_file(&sym.path));
        let root = helper.and_then(|h| {
            h.source
                .declarations
                .iter()
                .position(|d| d.kind == DeclarationKind::Function && d.name() == method)
        });
        let (Some(helper), Some(root)) = (helper, root) else {
            report.warn(
                path,
                marker_line + 1,
                format!("no exported helper named {:?} is visible here; nothing injected", method),
                Some(lines[marker_line]),
            );
            continue;
        };

        let mut parts = Vec::new();
        for index in dependency_closure(&helper.source, root) {
            let decl = &helper.source.declarations[index];
            let keys = decl.shadow_keys();
            if keys.iter().any(|k| emitted.contains(k)) {
                continue;
            }
            emitted.extend(keys);

            for qualifier in &decl.qualifiers {
                let Some(import) = helper.source.import_named(qualifier) else {
                    continue;
                };
                if matches!(import.alias.as_deref(), Some("_") | Some(".")) {
                    continue;
                }
                // The copied code refers to the package as `qualifier`, so
                // that is the name the file has to import it under.
                match target.import_named(qualifier) {
                    Some(existing) if existing.path == import.path => {}
                    Some(existing) => report.warn(
                        path,
                        existing.span.start_line,
                        format!(
                            "{} needs {} as {:?}, but this file imports {} under that name",
                            method, import.path, qualifier, existing.path
                        ),
                        None,
                    ),
                    None => {
                        imports
                            .entry(qualifier.clone())
                            .or_insert_with(|| ImportSpec::named(qualifier, import.path.clone()));
                    }
                }
            }

            parts.push(match &decl.doc {
                Some(doc) => format!("{}\n{}", doc, decl.text),
                None => decl.text.clone(),
            });
        }

        debug(format!(
            "{}: injecting {} declarations for {}",
            path.display(),
            parts.len(),
            method
        ));
        insertions.push(Insertion {
            after: interface.span.end_line - 1,
            lines: region_lines(&method, &parts),
        });
    }

    let regions = insertions.len();
    let mut lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    for insertion in insertions.into_iter().rev() {
        splice_region(&mut lines, insertion);
    }
    if !imports.is_empty() {
        let at = target.preamble_end_line.min(lines.len());
        let mut block: Vec<String> = Vec::new();
        if target.imports.is_empty() {
            block.push("\n".to_string());
        }
        block.extend(imports.values().map(|spec| format!("import {}\n", spec.to_spec())));
        if at > 0 && !lines[at - 1].ends_with('\n') {
            lines[at - 1].push('\n');
        }
        lines.splice(at..at, block);
    }

    Ok(InjectOutcome {
        text: lines.concat(),
        regions,
    })
}

/// Warn about imports that only the replaced regions used.
///
/// Imports are never removed, since they may sit in a group with others.
fn warn_stale_imports(path: &Path, before: &str, after: &str, report: &mut RunReport) -> Result<(), InjectError> {
    let analyze = |text: &str| {
        go_analyzer()
            .analyze(path, text.as_bytes())
            .map_err(|e| InjectError::Analysis(e.to_string()))
    };
    let before = analyze(before)?;
    let after = analyze(after)?;
    let used_before = used_qualifiers(&before);
    let used_after = used_qualifiers(&after);

    for import in &after.imports {
        let name = import.local_name();
        if used_before.contains(&name) && !used_after.contains(&name) {
            report.warn(
                path,
                import.span.start_line,
                format!("import {:?} is no longer used by generated code; remove it", import.path),
                None,
            );
        }
    }
    Ok(())
}

fn used_qualifiers(source: &GoSource) -> BTreeSet<String> {
    source
        .declarations
        .iter()
        .flat_map(|d| d.qualifiers.iter().cloned())
        .collect()
}

fn region_lines(method: &str, parts: &[String]) -> Vec<String> {
    let mut body = format!("{} {}\n", REGION_BEGIN, method);
    body.push_str(&parts.join("\n\n"));
    if !parts.is_empty() {
        body.push('\n');
    }
    body.push_str(REGION_END);
    body.push('\n');
    body.split_inclusive('\n').map(str::to_string).collect()
}

/// Insert a region after line `after`: one blank line, the region, and one
/// blank line before whatever follows.
fn splice_region(lines: &mut Vec<String>, insertion: Insertion) {
    let after = insertion.after.min(lines.len().saturating_sub(1));
    if !lines[after].ends_with('\n') {
        lines[after].push('\n');
    }
    let mut rest = after + 1;
    while rest < lines.len() && lines[rest].trim().is_empty() {
        rest += 1;
    }

    let mut block = vec!["\n".to_string()];
    block.extend(insertion.lines);
    if rest < lines.len() {
        block.push("\n".to_string());
    }
    lines.splice(after + 1..rest, block);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::report::Severity;
    use std::fs;
    use tempfile::TempDir;

    const HELPERS: &str = r#"//go:build ignore
//go:ahead functions

package main

import (
	"encoding/base64"
	"strings"
)

const shift = 3

type codec struct{ key byte }

func (c codec) apply(b byte) byte { return b ^ c.key }

func rotate(s string) string { return strings.ToUpper(s) }

// Decode reverses the encoding.
func Decode(s string) string {
	c := codec{key: shift}
	raw, _ := base64.StdEncoding.DecodeString(s)
	out := make([]byte, len(raw))
	for i, b := range raw {
		out[i] = c.apply(b)
	}
	return rotate(string(out))
}

func Unrelated() int { return 1 }
"#;

    const TARGET: &str = r#"package main

import "fmt"

//:inject:Decode
type Decoder interface {
	Decode(s string) string
}

func main() {
	fmt.Println("x")
}
"#;

    fn project() -> (TempDir, ProjectContext) {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("helpers.go"), HELPERS).unwrap();
        let mut report = RunReport::new();
        let ctx = ProjectContext::load(temp.path(), &Config::default(), &mut report).unwrap();
        (temp, ctx)
    }

    fn inject(ctx: &ProjectContext, content: &str) -> (Result<InjectOutcome, InjectError>, RunReport) {
        let mut report = RunReport::new();
        let result = inject_source(Path::new("main.go"), content, ctx, 0, &mut report);
        (result, report)
    }

    #[test]
    fn test_injects_closure_after_interface() {
        let (_temp, ctx) = project();
        let (result, report) = inject(&ctx, TARGET);
        let outcome = result.unwrap();
        let text = &outcome.text;

        assert_eq!(outcome.regions, 1);
        assert!(report.diagnostics.is_empty());
        assert!(text.contains("}\n\n// goahead:inject-begin Decode\nconst shift = 3\n"));
        assert!(text.contains("type codec struct{ key byte }"));
        assert!(text.contains("func (c codec) apply(b byte) byte"));
        assert!(text.contains("func rotate(s string) string"));
        assert!(text.contains("// Decode reverses the encoding.\nfunc Decode(s string) string {"));
        assert!(text.contains("return rotate(string(out))\n}\n// End of goahead generated code.\n\nfunc main() {"));
        assert!(!text.contains("Unrelated"));
        assert!(text.contains("import \"fmt\"\nimport \"encoding/base64\"\nimport \"strings\"\n"));
    }

    #[test]
    fn test_injection_is_idempotent() {
        let (_temp, ctx) = project();
        let first = inject(&ctx, TARGET).0.unwrap();
        let second = inject(&ctx, &first.text).0.unwrap();
        assert_eq!(second.text, first.text);
        assert_eq!(second.regions, 1);
    }

    #[test]
    fn test_rerun_reports_nothing() {
        let (_temp, ctx) = project();
        let first = inject(&ctx, TARGET).0.unwrap();
        let (second, report) = inject(&ctx, &first.text);
        assert_eq!(second.unwrap().text, first.text);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    }

    #[test]
    fn test_same_path_under_other_name_gets_helper_name() {
        let (_temp, ctx) = project();
        let target = TARGET.replace(
            "import \"fmt\"\n",
            "import \"fmt\"\nimport enc \"encoding/base64\"\n",
        );
        let (result, report) = inject(&ctx, &target);
        let text = result.unwrap().text;

        assert!(
            text.contains("import enc \"encoding/base64\"\nimport \"encoding/base64\"\nimport \"strings\"\n"),
            "{}",
            text
        );
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_conflicting_import_name_warns() {
        let (_temp, ctx) = project();
        let target = TARGET.replace(
            "import \"fmt\"\n",
            "import \"fmt\"\nimport base64 \"example.com/b64\"\n",
        );
        let (result, report) = inject(&ctx, &target);
        let text = result.unwrap().text;

        assert!(!text.contains("import \"encoding/base64\""));
        assert_eq!(report.count(Severity::Warning), 1);
        let warning = &report.diagnostics[0];
        assert_eq!(warning.line, 4);
        assert!(warning.message.contains("imports example.com/b64 under that name"));
    }

    #[test]
    fn test_imports_left_by_removed_region_warn() {
        let (_temp, ctx) = project();
        let first = inject(&ctx, TARGET).0.unwrap();
        let without_marker = first.text.replace("//:inject:Decode\n", "");

        let (result, report) = inject(&ctx, &without_marker);
        let text = result.unwrap().text;

        assert!(!text.contains(REGION_BEGIN));
        let messages: Vec<&str> = report.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "import \"encoding/base64\" is no longer used by generated code; remove it",
                "import \"strings\" is no longer used by generated code; remove it",
            ]
        );
        assert!(report.diagnostics.iter().all(|d| d.severity == Severity::Warning));
    }

    #[test]
    fn test_strip_restores_text_without_regions() {
        let (_temp, ctx) = project();
        let first = inject(&ctx, TARGET).0.unwrap();
        let stripped = strip_regions(&first.text).unwrap();
        assert!(!stripped.contains(REGION_BEGIN));
        assert!(!stripped.contains("func rotate"));
        assert!(stripped.contains("}\n\nfunc main() {"));
    }

    #[test]
    fn test_existing_declarations_are_not_duplicated() {
        let (_temp, ctx) = project();
        let target = TARGET.replace("func main() {", "const shift = 9\n\nfunc main() {");
        let outcome = inject(&ctx, &target).0.unwrap();
        assert_eq!(outcome.text.matches("const shift").count(), 1);
        assert!(outcome.text.contains("const shift = 9"));
    }

    #[test]
    fn test_marker_must_precede_interface() {
        let (_temp, ctx) = project();
        let target = "package main\n\n//:inject:Decode\nfunc main() {}\n";
        let err = inject(&ctx, target).0.unwrap_err();
        assert!(matches!(err, InjectError::NotAnInterface { line: 3, .. }));
    }

    #[test]
    fn test_method_must_belong_to_interface() {
        let (_temp, ctx) = project();
        let target = TARGET.replace("//:inject:Decode", "//:inject:Encode");
        let err = inject(&ctx, &target).0.unwrap_err();
        assert!(matches!(err, InjectError::MethodNotInInterface { .. }));
        assert!(err.to_string().contains("Decode"));
    }

    #[test]
    fn test_unknown_helper_warns() {
        let (_temp, ctx) = project();
        let target = TARGET
            .replace("//:inject:Decode", "//:inject:Reset")
            .replace("Decode(s string) string", "Reset()");
        let (result, report) = inject(&ctx, &target);
        let outcome = result.unwrap();
        assert_eq!(outcome.regions, 0);
        assert_eq!(outcome.text, target);
        assert_eq!(report.count(Severity::Warning), 1);
    }

    #[test]
    fn test_orphan_region_is_removed() {
        let (_temp, ctx) = project();
        let content = "package main\n\ntype X interface{}\n\n// goahead:inject-begin Gone\nfunc Gone() {}\n// End of goahead generated code.\n\nfunc main() {}\n";
        let outcome = inject(&ctx, content).0.unwrap();
        assert_eq!(outcome.text, "package main\n\ntype X interface{}\n\nfunc main() {}\n");
    }

    #[test]
    fn test_unterminated_region() {
        let err = strip_regions("// goahead:inject-begin A\nfunc A() {}\n").unwrap_err();
        assert!(matches!(err, InjectError::UnterminatedRegion { line: 1, .. }));
    }
}
