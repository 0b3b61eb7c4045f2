//! Configuration file schema for goahead.
//!
//! Configuration is optional. When present it lives in the project root as
//! `goahead.yaml` or `.goahead.yaml`, or is passed explicitly with `--config`.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file names to search for.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["goahead.yaml", ".goahead.yaml"];

/// Commented template written by `goahead init`.
pub const CONFIG_TEMPLATE: &str = include_str!("templates/goahead.yaml");

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Go toolchain executable.
    pub go_binary: String,
    /// Retries for drivers that fail with cleanup noise only.
    pub max_retries: u32,
    /// Linear back-off unit between retries.
    pub retry_backoff_ms: u64,
    /// Bounded fan-out for marker probing during discovery.
    pub scan_threads: usize,
    /// Glob patterns for paths to exclude from discovery (e.g., "**/generated/**").
    pub excluded_paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            go_binary: "go".to_string(),
            max_retries: 3,
            retry_backoff_ms: 200,
            scan_threads: 8,
            excluded_paths: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse_str(&content)
    }

    /// Parse a config from YAML text. An empty document yields the defaults.
    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Load the explicit config, or the one discovered in `root`, or defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => discover(root),
        };
        let config = match path {
            Some(p) => Self::parse_file(&p)
                .map_err(|e| anyhow::anyhow!("parsing config {}: {}", p.display(), e))?,
            None => Self::default(),
        };
        validate(&config)?;
        Ok(config)
    }

    /// Compile `excluded_paths` into a matcher.
    pub fn excluded_matcher(&self) -> anyhow::Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid excluded path pattern {:?}: {}", pattern, e))?;
            builder.add(glob);
        }
        Ok(builder.build()?)
    }
}

/// Find a config file in `root`.
pub fn discover(root: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// Validate a config.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.go_binary.trim().is_empty() {
        anyhow::bail!("go_binary must not be empty");
    }
    if config.scan_threads == 0 {
        anyhow::bail!("scan_threads must be at least 1");
    }
    config.excluded_matcher()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_for_empty_document() {
        let config = Config::parse_str("").unwrap();
        assert_eq!(config.go_binary, "go");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.scan_threads, 8);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = Config::parse_str("max_retries: 5\nexcluded_paths: [\"gen/**\"]\n").unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_backoff_ms, 200);
        assert_eq!(config.excluded_paths, vec!["gen/**"]);
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let config = Config::parse_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.go_binary, "go");
        assert!(config.excluded_paths.is_empty());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            scan_threads: 0,
            ..Default::default()
        };
        assert!(validate(&config).is_err());

        let config = Config {
            excluded_paths: vec!["[".to_string()],
            ..Default::default()
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_load_discovers_config_in_root() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".goahead.yaml"), "go_binary: go1.22\n").unwrap();
        let config = Config::load(temp.path(), None).unwrap();
        assert_eq!(config.go_binary, "go1.22");
    }

    #[test]
    fn test_excluded_matcher() {
        let config = Config {
            excluded_paths: vec!["gen/**".to_string()],
            ..Default::default()
        };
        let matcher = config.excluded_matcher().unwrap();
        assert!(matcher.is_match("gen/out.go"));
        assert!(!matcher.is_match("src/out.go"));
    }
}
