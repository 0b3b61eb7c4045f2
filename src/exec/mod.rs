//! Driver execution with retry and memoization.
//!
//! The executor writes a synthesized driver into the project's scratch
//! directory, runs it through a [`Toolchain`], and captures its standard
//! output. Some platforms make `go run` fail while it deletes its own build
//! directory even though the program ran fine; those failures are retried.

mod toolchain;

pub use toolchain::{match_std_package, GoToolchain, ProcessOutput, Toolchain, SCRUBBED_ENV};

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::driver::{DriverProgram, DRIVER_FILE};
use crate::report::debug;

/// Errors raised while running a driver.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("`{tool}` is needed to {purpose} but could not be started ({source}); install Go or set go_binary in goahead.yaml")]
    ToolMissing {
        tool: String,
        purpose: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("helper failed{}: {}", exit_suffix(.code), .stderr.trim())]
    DriverFailed { code: Option<i32>, stderr: String },
    #[error("helper kept failing on build cleanup after {attempts} attempts: {}", .stderr.trim())]
    CleanupRetriesExhausted { attempts: u32, stderr: String },
    #[error("cannot write driver: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit status {})", c)).unwrap_or_default()
}

lazy_static! {
    /// Stderr lines produced when the toolchain cannot delete its temporary
    /// build directory.
    static ref CLEANUP_NOISE: Vec<Regex> = vec![
        Regex::new(r"(?i)^go: (?:unlinkat|remove|removeall|rename|open) .*(?:being used by another process|access is denied|permission denied|directory not empty|resource busy)").unwrap(),
        Regex::new(r"(?i)^go: failed to (?:remove|clean up) (?:work dir|temporary|build)").unwrap(),
        Regex::new(r"(?i)^(?:warning: )?error removing .*(?:being used by another process|access is denied)").unwrap(),
    ];
}

/// Whether every non-blank stderr line is build-directory cleanup noise.
pub fn is_cleanup_noise(stderr: &str) -> bool {
    let mut lines = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();
    if lines.peek().is_none() {
        return false;
    }
    lines.all(|line| CLEANUP_NOISE.iter().any(|re| re.is_match(line)))
}

/// Memoization key: the resolved helper and the rendered argument tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoKey {
    pub target: String,
    pub args: Vec<String>,
}

impl MemoKey {
    pub fn new(target: impl Into<String>, args: &[String]) -> Self {
        Self {
            target: target.into(),
            args: args.to_vec(),
        }
    }
}

/// Runs drivers and remembers their output for the rest of the invocation.
pub struct Executor<'a> {
    toolchain: &'a dyn Toolchain,
    max_retries: u32,
    backoff: Duration,
    memo: HashMap<MemoKey, String>,
    runs: usize,
}

impl<'a> Executor<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, config: &Config) -> Self {
        Self {
            toolchain,
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
            memo: HashMap::new(),
            runs: 0,
        }
    }

    /// Output recorded for `key` earlier in this invocation.
    pub fn cached(&self, key: &MemoKey) -> Option<&str> {
        self.memo.get(key).map(String::as_str)
    }

    /// Number of driver processes started so far.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Run `program` in `workdir` and return its standard output.
    pub fn execute(
        &mut self,
        workdir: &Path,
        program: &DriverProgram,
        key: MemoKey,
    ) -> Result<String, ExecError> {
        if let Some(hit) = self.memo.get(&key) {
            debug(format!("cached result for {}", program.call));
            return Ok(hit.clone());
        }

        fs::write(workdir.join(DRIVER_FILE), &program.source)?;
        let output = self.run_with_retries(workdir, &program.call)?;
        self.memo.insert(key, output.clone());
        Ok(output)
    }

    fn run_with_retries(&mut self, workdir: &Path, call: &str) -> Result<String, ExecError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.runs += 1;
            debug(format!("running {} (attempt {})", call, attempt));

            let output = self.toolchain.run_driver(workdir, DRIVER_FILE)?;
            if output.success {
                return Ok(strip_newline(&output.stdout));
            }
            if output.stderr.trim().is_empty() || !is_cleanup_noise(&output.stderr) {
                return Err(ExecError::DriverFailed {
                    code: output.code,
                    stderr: output.stderr,
                });
            }

            // The program ran; only the toolchain's cleanup failed.
            if !output.stdout.trim().is_empty() {
                debug(format!("ignoring cleanup error for {}", call));
                return Ok(strip_newline(&output.stdout));
            }
            if attempt > self.max_retries {
                return Err(ExecError::CleanupRetriesExhausted {
                    attempts: attempt,
                    stderr: output.stderr,
                });
            }
            thread::sleep(self.backoff * attempt);
        }
    }
}

fn strip_newline(stdout: &str) -> String {
    stdout
        .strip_suffix("\r\n")
        .or_else(|| stdout.strip_suffix('\n'))
        .unwrap_or(stdout)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned outputs in order.
    struct Replay {
        outputs: Mutex<Vec<ProcessOutput>>,
    }

    impl Replay {
        fn new(mut outputs: Vec<ProcessOutput>) -> Self {
            outputs.reverse();
            Self {
                outputs: Mutex::new(outputs),
            }
        }
    }

    impl Toolchain for Replay {
        fn run_driver(&self, _dir: &Path, _file: &str) -> Result<ProcessOutput, ExecError> {
            Ok(self.outputs.lock().unwrap().pop().expect("unexpected run"))
        }

        fn resolve_package(&self, _dir: &Path, _name: &str) -> Result<Option<String>, ExecError> {
            Ok(None)
        }
    }

    fn ok(stdout: &str) -> ProcessOutput {
        ProcessOutput {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    fn failed(stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            success: false,
            code: Some(1),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    const NOISE: &str = "go: unlinkat C:\\Temp\\go-build123: The process cannot access the file because it is being used by another process.\n";

    fn program() -> DriverProgram {
        DriverProgram {
            source: "package main\n".into(),
            call: "Version()".into(),
        }
    }

    fn config() -> Config {
        Config {
            retry_backoff_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_cleanup_noise_detection() {
        assert!(is_cleanup_noise(NOISE));
        assert!(is_cleanup_noise("go: remove /tmp/x: directory not empty\n\n"));
        assert!(!is_cleanup_noise(""));
        assert!(!is_cleanup_noise("./main.go:5:2: undefined: Nope\n"));
        assert!(!is_cleanup_noise(&format!("{}panic: boom\n", NOISE)));
    }

    #[test]
    fn test_memoizes_by_key() {
        let temp = TempDir::new().unwrap();
        let toolchain = Replay::new(vec![ok("\"1.2.3\"\n")]);
        let mut executor = Executor::new(&toolchain, &config());
        let key = MemoKey::new("helpers.go#Version", &[]);

        let first = executor.execute(temp.path(), &program(), key.clone()).unwrap();
        let second = executor.execute(temp.path(), &program(), key.clone()).unwrap();
        assert_eq!(first, "\"1.2.3\"");
        assert_eq!(second, first);
        assert_eq!(executor.runs(), 1);
        assert_eq!(executor.cached(&key), Some("\"1.2.3\""));
        assert!(temp.path().join(DRIVER_FILE).exists());
    }

    #[test]
    fn test_retries_cleanup_failures() {
        let temp = TempDir::new().unwrap();
        let toolchain = Replay::new(vec![failed("", NOISE), failed("", NOISE), ok("42")]);
        let mut executor = Executor::new(&toolchain, &config());

        let out = executor
            .execute(temp.path(), &program(), MemoKey::new("a", &[]))
            .unwrap();
        assert_eq!(out, "42");
        assert_eq!(executor.runs(), 3);
    }

    #[test]
    fn test_cleanup_failure_with_output_is_accepted() {
        let temp = TempDir::new().unwrap();
        let toolchain = Replay::new(vec![failed("42", NOISE)]);
        let mut executor = Executor::new(&toolchain, &config());

        let out = executor
            .execute(temp.path(), &program(), MemoKey::new("a", &[]))
            .unwrap();
        assert_eq!(out, "42");
        assert_eq!(executor.runs(), 1);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let temp = TempDir::new().unwrap();
        let outputs = (0..4).map(|_| failed("", NOISE)).collect();
        let toolchain = Replay::new(outputs);
        let mut executor = Executor::new(&toolchain, &config());

        let err = executor
            .execute(temp.path(), &program(), MemoKey::new("a", &[]))
            .unwrap_err();
        assert!(matches!(err, ExecError::CleanupRetriesExhausted { attempts: 4, .. }));
    }

    #[test]
    fn test_real_failure_is_not_retried() {
        let temp = TempDir::new().unwrap();
        let toolchain = Replay::new(vec![failed("", "./main.go:9:2: undefined: Nope\n")]);
        let mut executor = Executor::new(&toolchain, &config());

        let err = executor
            .execute(temp.path(), &program(), MemoKey::new("a", &[]))
            .unwrap_err();
        assert!(err.to_string().contains("undefined: Nope"));
        assert!(err.to_string().contains("exit status 1"));
        assert_eq!(executor.runs(), 1);
    }
}
