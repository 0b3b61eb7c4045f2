//! Index of exported helper functions by depth and by directory.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::Signature;

/// Load-time failures. Any of these aborts the run before files are touched.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("helper {name:?} is declared twice in {dir}: {first} and {second}")]
    DuplicateInDirectory {
        name: String,
        dir: String,
        first: String,
        second: String,
    },
    #[error("helper {name:?} is declared twice at depth {depth}: {first} and {second}; helpers at the same depth share one namespace, so rename one or move it to another depth")]
    DuplicateAtDepth {
        name: String,
        depth: usize,
        first: String,
        second: String,
    },
    #[error("cannot parse helper file {path}: {message}")]
    Unparseable { path: String, message: String },
}

/// An exported helper function, as seen by placeholder resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperSymbol {
    pub name: String,
    pub signature: Signature,
    pub path: PathBuf,
    pub line: usize,
    /// Directory depth of the declaring file below the project root.
    pub depth: usize,
}

impl HelperSymbol {
    /// Type of the first result, or empty when the helper returns nothing.
    pub fn output_type(&self) -> &str {
        self.signature.output_type()
    }

    pub fn location(&self) -> String {
        format!("{}:{}", self.path.display(), self.line)
    }
}

impl fmt::Display for HelperSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.signature.param_types().join(", "))?;
        if !self.output_type().is_empty() {
            write!(f, " {}", self.output_type())?;
        }
        Ok(())
    }
}

/// A deeper helper hiding a shallower one of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shadowing {
    pub name: String,
    pub deeper: String,
    pub shallower: String,
}

impl fmt::Display for Shadowing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "helper {:?} at {} shadows the one at {} for files at or below its depth",
            self.name, self.deeper, self.shallower
        )
    }
}

/// Two views over the same helpers: by depth for resolution, by directory
/// for duplicate detection.
#[derive(Debug, Default)]
pub struct HelperIndex {
    by_depth: BTreeMap<usize, HashMap<String, HelperSymbol>>,
    by_dir: HashMap<PathBuf, HashMap<String, HelperSymbol>>,
}

impl HelperIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a symbol declared in a file under `dir`.
    ///
    /// Symbols must be inserted shallowest depth first so that shadowing is
    /// reported against an already indexed shallower helper.
    pub fn insert(&mut self, dir: &Path, symbol: HelperSymbol) -> Result<Option<Shadowing>, LoadError> {
        if let Some(existing) = self.in_dir(dir, &symbol.name) {
            return Err(LoadError::DuplicateInDirectory {
                name: symbol.name.clone(),
                dir: dir.display().to_string(),
                first: existing.location(),
                second: symbol.location(),
            });
        }
        if let Some(existing) = self.at_depth(symbol.depth, &symbol.name) {
            return Err(LoadError::DuplicateAtDepth {
                name: symbol.name.clone(),
                depth: symbol.depth,
                first: existing.location(),
                second: symbol.location(),
            });
        }

        let shadowing = self
            .by_depth
            .range(..symbol.depth)
            .rev()
            .find_map(|(_, names)| names.get(&symbol.name))
            .map(|shallower| Shadowing {
                name: symbol.name.clone(),
                deeper: symbol.location(),
                shallower: shallower.location(),
            });

        self.by_dir
            .entry(dir.to_path_buf())
            .or_default()
            .insert(symbol.name.clone(), symbol.clone());
        self.by_depth
            .entry(symbol.depth)
            .or_default()
            .insert(symbol.name.clone(), symbol);

        Ok(shadowing)
    }

    /// Nearest helper named `name` visible from `depth`: search `depth`,
    /// then each shallower depth down to the root.
    pub fn lookup(&self, name: &str, depth: usize) -> Option<&HelperSymbol> {
        self.by_depth
            .range(..=depth)
            .rev()
            .find_map(|(_, names)| names.get(name))
    }

    pub fn at_depth(&self, depth: usize, name: &str) -> Option<&HelperSymbol> {
        self.by_depth.get(&depth).and_then(|m| m.get(name))
    }

    fn in_dir(&self, dir: &Path, name: &str) -> Option<&HelperSymbol> {
        self.by_dir.get(dir).and_then(|m| m.get(name))
    }

    /// Number of indexed helpers across all depths.
    pub fn symbol_count(&self) -> usize {
        self.by_depth.values().map(HashMap::len).sum()
    }
}
