//! Access to the Go toolchain.
//!
//! Runs drivers with `go run` and resolves package names with `go list`.

use std::io;
use std::path::Path;
use std::process::{Command, Output};

use super::ExecError;

/// Environment variable removed from every toolchain invocation.
///
/// Build flags from the user's environment (`-mod=vendor`, `-tags=...`) would
/// apply to the driver's throwaway module and break it.
pub const SCRUBBED_ENV: &str = "GOFLAGS";

/// Captured result of one toolchain process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for ProcessOutput {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// The external capabilities the generator needs.
pub trait Toolchain: Send + Sync {
    /// Compile and run the driver file `file` inside `dir`.
    fn run_driver(&self, dir: &Path, file: &str) -> Result<ProcessOutput, ExecError>;

    /// Canonical import path for package `name`, as seen from `dir`.
    ///
    /// `Ok(None)` means the toolchain ran but knows no such package.
    fn resolve_package(&self, dir: &Path, name: &str) -> Result<Option<String>, ExecError>;
}

/// The real `go` binary.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    binary: String,
}

impl GoToolchain {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(dir).env_remove(SCRUBBED_ENV);
        cmd
    }

    fn output(&self, dir: &Path, args: &[&str], purpose: &'static str) -> Result<ProcessOutput, ExecError> {
        self.command(dir)
            .args(args)
            .output()
            .map(ProcessOutput::from)
            .map_err(|source| self.missing(purpose, source))
    }

    fn missing(&self, purpose: &'static str, source: io::Error) -> ExecError {
        ExecError::ToolMissing {
            tool: self.binary.clone(),
            purpose,
            source,
        }
    }
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new("go")
    }
}

impl Toolchain for GoToolchain {
    fn run_driver(&self, dir: &Path, file: &str) -> Result<ProcessOutput, ExecError> {
        self.output(dir, &["run", file], "run helper functions")
    }

    fn resolve_package(&self, dir: &Path, name: &str) -> Result<Option<String>, ExecError> {
        let purpose = "resolve package names";

        let found = self.output(dir, &["list", "-find", "-f", "{{.ImportPath}}", name], purpose)?;
        if found.success {
            let path = found.stdout.trim();
            if !path.is_empty() {
                return Ok(Some(path.to_string()));
            }
        }

        // `go list -find strings` works, but `base64` needs the full path;
        // fall back to matching the last segment of a standard library package.
        let std = self.output(dir, &["list", "std"], purpose)?;
        if !std.success {
            return Ok(None);
        }
        Ok(match_std_package(&std.stdout, name))
    }
}

/// Pick the standard library package whose last path segment is `name`.
///
/// Internal and vendored packages are skipped. Among the rest the shortest
/// path wins, ties going to the first one `go list` printed.
pub fn match_std_package(listing: &str, name: &str) -> Option<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| !p.split('/').any(|s| s == "internal" || s == "vendor"))
        .filter(|p| p.rsplit('/').next() == Some(name))
        .min_by_key(|p| p.len())
        .map(str::to_string)
}
