//! Fact structures extracted from Go sources.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Source location span with byte offsets and line/column positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed).
    pub end_col: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: start.row + 1, // tree-sitter is 0-indexed
            start_col: start.column + 1,
            end_line: end.row + 1,
            end_col: end.column + 1,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// Kind of top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Function,
    Method,
    Const,
    Var,
    Type,
}

/// A single function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    /// Type as written in source. For the variadic tail this is the element type.
    pub type_name: String,
}

/// Parameter and result types of a function declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Param>,
    /// The last parameter is `...T`.
    pub variadic: bool,
    pub results: Vec<String>,
}

impl Signature {
    /// Type of the first result, or the empty string when there is none.
    pub fn output_type(&self) -> &str {
        self.results.first().map(String::as_str).unwrap_or("")
    }

    /// Ordered parameter types. The variadic tail is rendered as `...T`.
    pub fn param_types(&self) -> Vec<String> {
        let last = self.params.len().saturating_sub(1);
        self.params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if self.variadic && i == last {
                    format!("...{}", p.type_name)
                } else {
                    p.type_name.clone()
                }
            })
            .collect()
    }

    /// Whether a call with `count` arguments matches the parameter list.
    pub fn accepts(&self, count: usize) -> bool {
        if self.variadic {
            count + 1 >= self.params.len()
        } else {
            count == self.params.len()
        }
    }

    /// Type expected at argument position `index`, following the variadic tail.
    pub fn param_type_at(&self, index: usize) -> Option<&str> {
        if let Some(p) = self.params.get(index) {
            return Some(&p.type_name);
        }
        if self.variadic {
            return self.params.last().map(|p| p.type_name.as_str());
        }
        None
    }
}

/// A top-level declaration extracted from a Go file.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Declared names. Grouped specs that must stay together carry several.
    pub names: Vec<String>,
    pub kind: DeclarationKind,
    /// For methods: the receiver base type (`Config` for `func (c *Config) Validate()`).
    pub receiver: Option<String>,
    pub span: Span,
    /// Source text, ready to be emitted as a top-level declaration.
    pub text: String,
    /// Doc comment immediately above the declaration, without `//go:` directives.
    pub doc: Option<String>,
    /// Identifiers referenced from the signature and body.
    pub references: BTreeSet<String>,
    /// Identifiers used as package qualifiers (`pkg.X`).
    pub qualifiers: BTreeSet<String>,
    /// Only for functions and methods.
    pub signature: Option<Signature>,
}

impl Declaration {
    /// The primary declared name.
    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("")
    }

    /// Whether this declaration introduces `name` at package scope.
    ///
    /// Methods live in their receiver's method set, not in package scope.
    pub fn declares(&self, name: &str) -> bool {
        self.kind != DeclarationKind::Method && self.names.iter().any(|n| n == name)
    }

    /// Keys used for declaration-level shadowing. Blank identifiers never shadow.
    pub fn shadow_keys(&self) -> Vec<String> {
        match (&self.kind, &self.receiver) {
            (DeclarationKind::Method, Some(recv)) => vec![format!("{}.{}", recv, self.name())],
            _ => self.names.iter().filter(|n| *n != "_").cloned().collect(),
        }
    }

    pub fn is_exported(&self) -> bool {
        is_exported(self.name())
    }
}

/// An import declared in a Go file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Explicit local name (`_` and `.` included) if any.
    pub alias: Option<String>,
    pub path: String,
    pub span: Span,
}

impl Import {
    /// Name under which the package is referenced in code.
    pub fn local_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => default_package_name(&self.path),
        }
    }

    /// Render as an import spec (`alias "path"` or `"path"`).
    pub fn to_spec(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} {:?}", alias, self.path),
            None => format!("{:?}", self.path),
        }
    }
}

/// An interface type declaration and its method set.
#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub methods: Vec<String>,
    /// Span of the enclosing `type` declaration (a whole group for `type ( ... )`).
    pub span: Span,
}

/// Everything the generator needs to know about one Go file.
#[derive(Debug, Clone)]
pub struct GoSource {
    pub path: PathBuf,
    pub package: Option<String>,
    pub imports: Vec<Import>,
    /// Declarations in source order.
    pub declarations: Vec<Declaration>,
    pub interfaces: Vec<InterfaceDecl>,
    /// Last line of the package clause or of the final import declaration.
    pub preamble_end_line: usize,
    pub has_parse_errors: bool,
}

impl GoSource {
    /// Find the package-scope declaration of `name`.
    pub fn find_declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.declares(name))
    }

    /// Find a plain function (not a method) by name.
    pub fn find_function(&self, name: &str) -> Option<&Declaration> {
        self.declarations
            .iter()
            .find(|d| d.kind == DeclarationKind::Function && d.name() == name)
    }

    /// Methods whose receiver is `type_name`.
    pub fn methods_of<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Declaration> {
        self.declarations
            .iter()
            .filter(move |d| d.kind == DeclarationKind::Method && d.receiver.as_deref() == Some(type_name))
    }

    /// Import whose local name is `name`.
    pub fn import_named(&self, name: &str) -> Option<&Import> {
        self.imports.iter().find(|i| i.local_name() == name)
    }

    /// Interface whose `type` declaration starts on `line`.
    pub fn interface_starting_at(&self, line: usize) -> Option<&InterfaceDecl> {
        self.interfaces.iter().find(|i| i.span.start_line == line)
    }
}

/// Go exports identifiers that start with an uppercase letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

/// Package name implied by an import path when no alias is given.
///
/// Skips major-version suffixes (`/v2`) and `go-` prefixes, and cuts at the
/// first `.` or `-` (`gopkg.in/yaml.v3` is `yaml`).
pub fn default_package_name(path: &str) -> String {
    let mut segments = path.rsplit('/');
    let mut last = segments.next().unwrap_or(path);
    if is_major_version(last) {
        if let Some(prev) = segments.next() {
            last = prev;
        }
    }
    let last = last.strip_prefix("go-").unwrap_or(last);
    let cut = last.find(['.', '-']).unwrap_or(last.len());
    last[..cut].to_string()
}

fn is_major_version(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}
