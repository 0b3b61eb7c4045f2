//! Go language analyzer using tree-sitter.
//!
//! Extracts:
//! - Package clause and imports (with local aliases)
//! - Function and method declarations with their signatures
//! - Constant, variable and type declarations
//! - Identifier references per declaration, for dependency closure
//! - Interface method sets, for injection targets

use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::OnceCell;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use super::{
    Declaration, DeclarationKind, GoSource, Import, InterfaceDecl, Param, ParsedFile, Signature,
    Span,
};

/// Tree-sitter query for package declaration.
const PACKAGE_QUERY: &str = r#"
(package_clause
  (package_identifier) @package_name
)
"#;

/// Shared analyzer instance.
static GO_ANALYZER: OnceCell<GoAnalyzer> = OnceCell::new();

/// Get the process-wide Go analyzer.
pub fn go_analyzer() -> &'static GoAnalyzer {
    GO_ANALYZER.get_or_init(GoAnalyzer::new)
}

/// Go language analyzer.
pub struct GoAnalyzer {
    language: Language,
}

impl GoAnalyzer {
    /// Create a new Go analyzer.
    pub fn new() -> Self {
        Self {
            language: tree_sitter_go::LANGUAGE.into(),
        }
    }

    /// Create a new parser for this thread.
    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Partial parse errors still produce a tree with ERROR nodes.
    pub fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Go source: {}", path.display()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    /// Parse and extract facts in one step.
    pub fn analyze(&self, path: &Path, source: &[u8]) -> anyhow::Result<GoSource> {
        let parsed = self.parse(path, source)?;
        self.extract_facts(&parsed)
    }

    /// Extract all facts from a parsed file.
    pub fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<GoSource> {
        Ok(GoSource {
            path: parsed.path.clone().into(),
            package: self.extract_package(parsed)?,
            imports: self.extract_imports(parsed),
            declarations: self.extract_declarations(parsed),
            interfaces: self.extract_interfaces(parsed),
            preamble_end_line: preamble_end_line(parsed),
            has_parse_errors: parsed.tree.root_node().has_error(),
        })
    }

    /// Extract the package name from a parsed file.
    fn extract_package(&self, parsed: &ParsedFile) -> anyhow::Result<Option<String>> {
        let query = Query::new(&self.language, PACKAGE_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        if let Some(m) = matches.next() {
            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                if name == "package_name" {
                    return Ok(Some(parsed.node_text(capture.node).to_string()));
                }
            }
        }
        Ok(None)
    }

    /// Extract imports in source order.
    fn extract_imports(&self, parsed: &ParsedFile) -> Vec<Import> {
        let root = parsed.tree.root_node();
        let mut cursor = root.walk();
        let mut imports = Vec::new();

        for decl in root.named_children(&mut cursor) {
            if decl.kind() != "import_declaration" {
                continue;
            }
            for spec in collect_specs(decl, &["import_spec"]) {
                let Some(path_node) = spec.child_by_field_name("path") else {
                    continue;
                };
                let path = parsed
                    .node_text(path_node)
                    .trim_matches(|c: char| c == '"' || c == '`')
                    .to_string();
                if path.is_empty() {
                    continue;
                }
                let alias = spec
                    .child_by_field_name("name")
                    .map(|n| parsed.node_text(n).to_string());
                imports.push(Import {
                    alias,
                    path,
                    span: Span::from_node(spec),
                });
            }
        }

        imports
    }

    /// Extract top-level declarations in source order.
    fn extract_declarations(&self, parsed: &ParsedFile) -> Vec<Declaration> {
        let root = parsed.tree.root_node();
        let mut cursor = root.walk();
        let top: Vec<Node> = root.named_children(&mut cursor).collect();
        let mut declarations = Vec::new();

        for (index, node) in top.iter().enumerate() {
            let doc = doc_comment(parsed, &top[..index], *node);
            match node.kind() {
                "function_declaration" | "method_declaration" => {
                    if let Some(decl) = self.callable(parsed, *node, doc) {
                        declarations.push(decl);
                    }
                }
                "const_declaration" => {
                    self.value_specs(parsed, *node, DeclarationKind::Const, doc, &mut declarations)
                }
                "var_declaration" => {
                    self.value_specs(parsed, *node, DeclarationKind::Var, doc, &mut declarations)
                }
                "type_declaration" => {
                    self.value_specs(parsed, *node, DeclarationKind::Type, doc, &mut declarations)
                }
                _ => {}
            }
        }

        declarations
    }

    /// Build a declaration for a function or method node.
    fn callable(&self, parsed: &ParsedFile, node: Node, doc: Option<String>) -> Option<Declaration> {
        let name = parsed.node_text(node.child_by_field_name("name")?).to_string();
        let (kind, receiver) = if node.kind() == "method_declaration" {
            let receiver = node
                .child_by_field_name("receiver")
                .and_then(|r| receiver_type(parsed, r));
            (DeclarationKind::Method, receiver)
        } else {
            (DeclarationKind::Function, None)
        };

        let mut references = BTreeSet::new();
        let mut qualifiers = BTreeSet::new();
        collect_references(parsed, node, &mut references, &mut qualifiers);
        if kind == DeclarationKind::Function {
            references.remove(&name);
        }

        Some(Declaration {
            names: vec![name],
            kind,
            receiver,
            span: Span::from_node(node),
            text: parsed.node_text(node).to_string(),
            doc,
            references,
            qualifiers,
            signature: Some(self.signature(parsed, node)),
        })
    }

    /// Split `const`/`var`/`type` declarations into per-spec declarations.
    ///
    /// A const group that relies on implicit repetition (`iota` continuation)
    /// stays one unit, since its specs are meaningless apart.
    fn value_specs(
        &self,
        parsed: &ParsedFile,
        node: Node,
        kind: DeclarationKind,
        doc: Option<String>,
        out: &mut Vec<Declaration>,
    ) {
        let (keyword, spec_kinds): (&str, &[&str]) = match kind {
            DeclarationKind::Const => ("const", &["const_spec"]),
            DeclarationKind::Var => ("var", &["var_spec"]),
            _ => ("type", &["type_spec", "type_alias"]),
        };
        let specs = collect_specs(node, spec_kinds);
        if specs.is_empty() {
            return;
        }

        let grouped = parsed
            .node_text(node)
            .trim_start_matches(keyword)
            .trim_start()
            .starts_with('(');
        let keep_whole = !grouped
            || (kind == DeclarationKind::Const
                && specs.iter().any(|s| s.child_by_field_name("value").is_none()));

        if keep_whole {
            let names = specs.iter().flat_map(|s| spec_names(parsed, *s)).collect();
            let text = parsed.node_text(node).to_string();
            out.push(value_declaration(parsed, node, names, kind, text, doc));
            return;
        }

        for (i, spec) in specs.iter().enumerate() {
            let names = spec_names(parsed, *spec);
            let text = format!("{} {}", keyword, parsed.node_text(*spec));
            let doc = if i == 0 { doc.clone() } else { None };
            out.push(value_declaration(parsed, *spec, names, kind, text, doc));
        }
    }

    /// Extract parameter and result types of a function or method.
    fn signature(&self, parsed: &ParsedFile, node: Node) -> Signature {
        let mut signature = Signature::default();

        if let Some(list) = node.child_by_field_name("parameters") {
            let mut cursor = list.walk();
            for param in list.named_children(&mut cursor) {
                match param.kind() {
                    "parameter_declaration" => {
                        signature.params.extend(expand_parameter(parsed, param));
                    }
                    "variadic_parameter_declaration" => {
                        let type_name = param
                            .child_by_field_name("type")
                            .map(|t| parsed.node_text(t).to_string())
                            .unwrap_or_default();
                        let name = param
                            .child_by_field_name("name")
                            .map(|n| parsed.node_text(n).to_string());
                        signature.params.push(Param { name, type_name });
                        signature.variadic = true;
                    }
                    _ => {}
                }
            }
        }

        match node.child_by_field_name("result") {
            Some(result) if result.kind() == "parameter_list" => {
                let mut cursor = result.walk();
                for param in result.named_children(&mut cursor) {
                    if param.kind() == "parameter_declaration" {
                        signature
                            .results
                            .extend(expand_parameter(parsed, param).into_iter().map(|p| p.type_name));
                    }
                }
            }
            Some(result) => signature.results.push(parsed.node_text(result).to_string()),
            None => {}
        }

        signature
    }

    /// Extract interface declarations with their method sets.
    fn extract_interfaces(&self, parsed: &ParsedFile) -> Vec<InterfaceDecl> {
        let root = parsed.tree.root_node();
        let mut cursor = root.walk();
        let mut interfaces = Vec::new();

        for decl in root.named_children(&mut cursor) {
            if decl.kind() != "type_declaration" {
                continue;
            }
            for spec in collect_specs(decl, &["type_spec"]) {
                let (Some(name), Some(ty)) =
                    (spec.child_by_field_name("name"), spec.child_by_field_name("type"))
                else {
                    continue;
                };
                if ty.kind() != "interface_type" {
                    continue;
                }
                let mut elems = ty.walk();
                let methods = ty
                    .named_children(&mut elems)
                    .filter(|n| matches!(n.kind(), "method_elem" | "method_spec"))
                    .filter_map(|m| m.child_by_field_name("name"))
                    .map(|n| parsed.node_text(n).to_string())
                    .collect();
                interfaces.push(InterfaceDecl {
                    name: parsed.node_text(name).to_string(),
                    methods,
                    span: Span::from_node(decl),
                });
            }
        }

        interfaces
    }
}

impl Default for GoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Where new import declarations can be appended.
fn preamble_end_line(parsed: &ParsedFile) -> usize {
    let root = parsed.tree.root_node();
    let mut cursor = root.walk();
    root.named_children(&mut cursor)
        .filter(|n| matches!(n.kind(), "package_clause" | "import_declaration"))
        .map(|n| n.end_position().row + 1)
        .max()
        .unwrap_or(0)
}

fn value_declaration(
    parsed: &ParsedFile,
    node: Node,
    names: Vec<String>,
    kind: DeclarationKind,
    text: String,
    doc: Option<String>,
) -> Declaration {
    let mut references = BTreeSet::new();
    let mut qualifiers = BTreeSet::new();
    collect_references(parsed, node, &mut references, &mut qualifiers);
    for name in &names {
        references.remove(name);
    }

    Declaration {
        names,
        kind,
        receiver: None,
        span: Span::from_node(node),
        text,
        doc,
        references,
        qualifiers,
        signature: None,
    }
}

/// Collect spec nodes of the given kinds, looking through `*_list` wrappers.
fn collect_specs<'a>(node: Node<'a>, kinds: &[&str]) -> Vec<Node<'a>> {
    let mut specs = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if kinds.contains(&child.kind()) {
            specs.push(child);
        } else if child.kind().ends_with("_list") {
            specs.extend(collect_specs(child, kinds));
        }
    }
    specs
}

fn spec_names(parsed: &ParsedFile, spec: Node) -> Vec<String> {
    let mut cursor = spec.walk();
    spec.children_by_field_name("name", &mut cursor)
        .map(|n| parsed.node_text(n).to_string())
        .collect()
}

/// `a, b int` expands to two parameters of type `int`.
fn expand_parameter(parsed: &ParsedFile, param: Node) -> Vec<Param> {
    let type_name = param
        .child_by_field_name("type")
        .map(|t| parsed.node_text(t).to_string())
        .unwrap_or_default();
    let names = spec_names(parsed, param);
    if names.is_empty() {
        return vec![Param {
            name: None,
            type_name,
        }];
    }
    names
        .into_iter()
        .map(|name| Param {
            name: Some(name),
            type_name: type_name.clone(),
        })
        .collect()
}

/// Base type name of a method receiver (`*Config[T]` is `Config`).
fn receiver_type(parsed: &ParsedFile, receiver: Node) -> Option<String> {
    let mut cursor = receiver.walk();
    let param = receiver
        .named_children(&mut cursor)
        .find(|n| n.kind() == "parameter_declaration")?;
    let ty = param.child_by_field_name("type")?;
    let text = parsed.node_text(ty).trim_start_matches('*').trim();
    let base = text.split('[').next().unwrap_or(text).trim();
    Some(base.to_string())
}

/// Collect identifiers referenced anywhere under `node`.
///
/// Selector operands and qualified-type packages are also recorded as
/// qualifiers; those are the candidates for package imports.
fn collect_references(
    parsed: &ParsedFile,
    node: Node,
    references: &mut BTreeSet<String>,
    qualifiers: &mut BTreeSet<String>,
) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            "identifier" | "type_identifier" => {
                references.insert(parsed.node_text(current).to_string());
            }
            "package_identifier" => {
                qualifiers.insert(parsed.node_text(current).to_string());
            }
            "selector_expression" => {
                if let Some(operand) = current.child_by_field_name("operand") {
                    if operand.kind() == "identifier" {
                        qualifiers.insert(parsed.node_text(operand).to_string());
                    }
                }
            }
            _ => {}
        }
        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            stack.push(child);
        }
    }
}

/// Contiguous comment lines directly above `node`, minus compiler directives.
fn doc_comment(parsed: &ParsedFile, preceding: &[Node], node: Node) -> Option<String> {
    let mut lines = Vec::new();
    let mut next_row = node.start_position().row;
    for prev in preceding.iter().rev() {
        if prev.kind() != "comment" || prev.end_position().row + 1 != next_row {
            break;
        }
        lines.push(parsed.node_text(*prev));
        next_row = prev.start_position().row;
    }
    lines.reverse();

    let kept: Vec<&str> = lines.into_iter().filter(|l| !is_directive(l)).collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join("\n"))
    }
}

fn is_directive(comment: &str) -> bool {
    comment.starts_with("//go:") || comment.starts_with("// +build") || comment.starts_with("//:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(source: &str) -> GoSource {
        go_analyzer()
            .analyze(Path::new("helpers.go"), source.as_bytes())
            .unwrap()
    }

    #[test]
    fn test_extract_package_and_imports() {
        let source = r#"
package main

import (
    "fmt"
    str "strings"
    _ "embed"
)

import "os"
"#;
        let facts = analyze(source);
        assert_eq!(facts.package.as_deref(), Some("main"));
        assert_eq!(facts.imports.len(), 4);
        assert!(facts.imports.iter().any(|i| i.path == "fmt" && i.alias.is_none()));
        assert!(facts
            .imports
            .iter()
            .any(|i| i.path == "strings" && i.alias.as_deref() == Some("str")));
        assert_eq!(facts.import_named("str").map(|i| i.path.as_str()), Some("strings"));
        assert_eq!(facts.import_named("os").map(|i| i.span.start_line), Some(10));
        assert_eq!(facts.preamble_end_line, 10);
    }

    #[test]
    fn test_extract_function_signature() {
        let source = r#"
package main

func Sum(a, b int) int {
    return a + b
}

func Join(sep string, parts ...string) string {
    return ""
}

func Pair() (value string, err error) {
    return "", nil
}

func Log(msg string) {
}
"#;
        let facts = analyze(source);

        let sum = facts.find_function("Sum").unwrap();
        let sig = sum.signature.as_ref().unwrap();
        assert_eq!(sig.param_types(), vec!["int", "int"]);
        assert_eq!(sig.output_type(), "int");

        let join = facts.find_function("Join").unwrap();
        let sig = join.signature.as_ref().unwrap();
        assert!(sig.variadic);
        assert_eq!(sig.param_types(), vec!["string", "...string"]);

        let pair = facts.find_function("Pair").unwrap();
        assert_eq!(pair.signature.as_ref().unwrap().results, vec!["string", "error"]);

        let log = facts.find_function("Log").unwrap();
        assert_eq!(log.signature.as_ref().unwrap().output_type(), "");
    }

    #[test]
    fn test_references_and_qualifiers() {
        let source = r#"
package main

import "strings"

const prefix = "Hello, "

type Greeting string

func Welcome(name string) Greeting {
    return Greeting(prefix + strings.ToUpper(name))
}
"#;
        let facts = analyze(source);
        let welcome = facts.find_function("Welcome").unwrap();
        assert!(welcome.references.contains("prefix"));
        assert!(welcome.references.contains("Greeting"));
        assert!(welcome.qualifiers.contains("strings"));
        assert!(!welcome.references.contains("Welcome"));
    }

    #[test]
    fn test_grouped_declarations() {
        let source = r#"
package main

const (
    A = 1
    B = "two"
)

const (
    X = iota
    Y
)

var (
    counter int
    label   = "x"
)
"#;
        let facts = analyze(source);
        let a = facts.find_declaration("A").unwrap();
        assert_eq!(a.names, vec!["A"]);
        assert_eq!(a.text, "const A = 1");

        let x = facts.find_declaration("X").unwrap();
        assert_eq!(x.names, vec!["X", "Y"]);
        assert!(x.text.starts_with("const ("));

        let label = facts.find_declaration("label").unwrap();
        assert_eq!(label.kind, DeclarationKind::Var);
        assert!(label.text.starts_with("var label"));
    }

    #[test]
    fn test_methods_and_doc_comments() {
        let source = r#"//go:build ignore
//go:ahead functions

package main

// Config holds settings.
type Config struct {
    Name string
}

// Describe renders the config.
func (c *Config) Describe() string {
    return c.Name
}
"#;
        let facts = analyze(source);
        let describe = facts
            .declarations
            .iter()
            .find(|d| d.name() == "Describe")
            .unwrap();
        assert_eq!(describe.kind, DeclarationKind::Method);
        assert_eq!(describe.receiver.as_deref(), Some("Config"));
        assert_eq!(describe.shadow_keys(), vec!["Config.Describe"]);
        assert_eq!(describe.doc.as_deref(), Some("// Describe renders the config."));
        assert!(facts.find_declaration("Describe").is_none());
        assert_eq!(facts.methods_of("Config").count(), 1);
    }

    #[test]
    fn test_extract_interfaces() {
        let source = r#"
package main

type Decoder interface {
    Decode(s string) string
    Reset()
}

type Plain struct{}
"#;
        let facts = analyze(source);
        assert_eq!(facts.interfaces.len(), 1);
        let decoder = &facts.interfaces[0];
        assert_eq!(decoder.name, "Decoder");
        assert_eq!(decoder.methods, vec!["Decode", "Reset"]);
        assert_eq!(decoder.span.start_line, 4);
        assert!(facts.interface_starting_at(4).is_some());
    }
}
