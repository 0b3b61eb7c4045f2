//! Per-project state: helper files, the helper index, and a scratch directory.
//!
//! A project is a directory tree rooted at a module manifest (or at the
//! directory goahead was started in). Nested modules are separate projects
//! and never see this project's helpers.

mod index;
mod resolve;

pub use index::{HelperIndex, HelperSymbol, LoadError, Shadowing};
pub use resolve::{ImportSpec, ResolveError, Resolver, Target};

use anyhow::Context;
use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::analysis::{go_analyzer, Declaration, DeclarationKind, GoSource};
use crate::config::Config;
use crate::discover::markers::{has_build_ignore, parse_import_aliases};
use crate::discover::{discover, Discovery, ImportAlias};
use crate::report::{debug, RunReport};

/// A file bearing the activation marker.
#[derive(Debug, Clone)]
pub struct HelperFile {
    pub path: PathBuf,
    pub dir: PathBuf,
    /// Directory depth below the project root.
    pub depth: usize,
    pub source: GoSource,
    pub aliases: Vec<ImportAlias>,
    pub build_ignored: bool,
}

impl HelperFile {
    pub fn load(root: &Path, path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading helper file {}", path.display()))?;
        Self::from_source(root, path, &content)
    }

    pub fn from_source(root: &Path, path: &Path, content: &str) -> anyhow::Result<Self> {
        let source = go_analyzer()
            .analyze(path, content.as_bytes())
            .map_err(|e| LoadError::Unparseable {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let dir = path.parent().unwrap_or(root).to_path_buf();
        Ok(Self {
            depth: depth_below(root, &dir),
            path: path.to_path_buf(),
            dir,
            source,
            aliases: parse_import_aliases(content),
            build_ignored: has_build_ignore(content),
        })
    }

    /// Exported plain functions; these are the placeholder-callable helpers.
    pub fn exported_functions(&self) -> impl Iterator<Item = &Declaration> {
        self.source
            .declarations
            .iter()
            .filter(|d| d.kind == DeclarationKind::Function && d.is_exported())
    }

    fn symbols(&self) -> impl Iterator<Item = HelperSymbol> + '_ {
        self.exported_functions().map(move |d| HelperSymbol {
            name: d.name().to_string(),
            signature: d.signature.clone().unwrap_or_default(),
            path: self.path.clone(),
            line: d.span.start_line,
            depth: self.depth,
        })
    }
}

/// Number of directory components between `root` and `dir`.
pub fn depth_below(root: &Path, dir: &Path) -> usize {
    dir.strip_prefix(root)
        .map(|rel| rel.components().count())
        .unwrap_or(0)
}

/// Everything needed to process one project.
pub struct ProjectContext {
    root: PathBuf,
    /// Sorted by depth, then path.
    helpers: Vec<HelperFile>,
    index: HelperIndex,
    sources: Vec<PathBuf>,
    submodules: Vec<PathBuf>,
    workdir: TempDir,
}

impl ProjectContext {
    /// Discover and index the project at `root`.
    ///
    /// Warnings go to `report`; duplicate helpers are a [`LoadError`].
    pub fn load(root: &Path, config: &Config, report: &mut RunReport) -> anyhow::Result<Self> {
        let discovery = discover(root, config)?;
        Self::from_discovery(root, discovery, report)
    }

    pub fn from_discovery(root: &Path, discovery: Discovery, report: &mut RunReport) -> anyhow::Result<Self> {
        let mut helpers = discovery
            .helper_files
            .iter()
            .map(|path| HelperFile::load(root, path))
            .collect::<anyhow::Result<Vec<_>>>()?;
        helpers.sort_by(|a, b| (a.depth, &a.path).cmp(&(b.depth, &b.path)));

        let mut index = HelperIndex::new();
        for helper in &helpers {
            if !helper.build_ignored {
                report.warn(
                    &helper.path,
                    1,
                    "helper file has no `//go:build ignore` line and will be compiled into its package",
                    None,
                );
            }
            if helper.source.has_parse_errors {
                report.warn(&helper.path, 0, "helper file has syntax errors", None);
            }
            for symbol in helper.symbols() {
                let (path, line) = (symbol.path.clone(), symbol.line);
                if let Some(shadowing) = index.insert(&helper.dir, symbol)? {
                    report.warn(&path, line, shadowing.to_string(), None);
                }
            }
        }

        let workdir = scratch_dir(root)?;
        debug(format!(
            "project {}: {} helper files, {} helpers, {} sources, scratch {}",
            root.display(),
            helpers.len(),
            index.symbol_count(),
            discovery.sources.len(),
            workdir.path().display()
        ));

        Ok(Self {
            root: root.to_path_buf(),
            helpers,
            index,
            sources: discovery.sources,
            submodules: discovery.submodules,
            workdir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn helpers(&self) -> &[HelperFile] {
        &self.helpers
    }

    pub fn index(&self) -> &HelperIndex {
        &self.index
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn submodules(&self) -> &[PathBuf] {
        &self.submodules
    }

    /// Scratch directory for driver programs, removed when the context drops.
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Depth of the directory containing `file`.
    pub fn depth_of(&self, file: &Path) -> usize {
        let dir = file.parent().unwrap_or(&self.root);
        depth_below(&self.root, dir)
    }

    /// Helper files whose depth is at most `depth`, deepest first, then by path.
    pub fn visible_helpers(&self, depth: usize) -> impl Iterator<Item = &HelperFile> {
        let mut visible: Vec<&HelperFile> = self.helpers.iter().filter(|h| h.depth <= depth).collect();
        visible.sort_by_key(|h| (Reverse(h.depth), &h.path));
        visible.into_iter()
    }

    pub fn helper_file(&self, path: &Path) -> Option<&HelperFile> {
        self.helpers.iter().find(|h| h.path == path)
    }
}

/// Hidden directory inside the project, so drivers build against the
/// project's module. Falls back to the system temporary directory.
fn scratch_dir(root: &Path) -> anyhow::Result<TempDir> {
    tempfile::Builder::new()
        .prefix(".goahead-")
        .tempdir_in(root)
        .or_else(|_| tempfile::Builder::new().prefix("goahead-").tempdir())
        .context("creating scratch directory")
}
