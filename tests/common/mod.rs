//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use goahead::{ExecError, ProcessOutput, Toolchain};
use tempfile::TempDir;
use walkdir::WalkDir;

pub fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

/// Copy a fixture project into a fresh temporary directory, since runs
/// rewrite files in place.
pub fn fixture(name: &str) -> TempDir {
    let temp = TempDir::new().expect("create temp dir");
    let source = testdata_path().join(name);
    for entry in WalkDir::new(&source) {
        let entry = entry.expect("walk fixture");
        let rel = entry.path().strip_prefix(&source).expect("inside fixture");
        let dest = temp.path().join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).expect("create fixture dir");
        } else {
            fs::copy(entry.path(), &dest).expect("copy fixture file");
        }
    }
    temp
}

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("has parent")).expect("create dirs");
    fs::write(path, content).expect("write file");
}

pub fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).expect("read file")
}

pub fn helper(package: &str, body: &str) -> String {
    format!(
        "//go:build ignore\n//go:ahead functions\n\npackage {}\n\n{}",
        package, body
    )
}

type Responder = dyn Fn(&str, &str) -> Option<String> + Send + Sync;

/// A toolchain that answers driver runs from a table instead of compiling.
///
/// The call is read back from the generated `main` function. Calls not in
/// the table go to the responder, which also sees the full driver source.
#[derive(Clone)]
pub struct Scripted {
    outputs: HashMap<String, String>,
    packages: HashMap<String, String>,
    responder: Option<Arc<Responder>>,
    log: Arc<Mutex<Vec<String>>>,
    sources: Arc<Mutex<Vec<String>>>,
}

impl Scripted {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            packages: HashMap::new(),
            responder: None,
            log: Arc::new(Mutex::new(Vec::new())),
            sources: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn output(mut self, call: &str, stdout: &str) -> Self {
        self.outputs.insert(call.to_string(), stdout.to_string());
        self
    }

    pub fn package(mut self, name: &str, path: &str) -> Self {
        self.packages.insert(name.to_string(), path.to_string());
        self
    }

    pub fn responder(
        mut self,
        f: impl Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Arc::new(f));
        self
    }

    /// Calls executed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().expect("log lock").clone()
    }

    /// Driver sources seen so far, in order.
    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().expect("sources lock").clone()
    }
}

/// The expression inside `__goaheadFirst(...)` in a driver's `main`.
pub fn driver_call(source: &str) -> Option<String> {
    source.lines().find_map(|line| {
        line.trim()
            .strip_prefix("__goaheadPrint(__goaheadFirst(")
            .and_then(|rest| rest.strip_suffix("))"))
            .map(str::to_string)
    })
}

impl Toolchain for Scripted {
    fn run_driver(&self, dir: &Path, file: &str) -> Result<ProcessOutput, ExecError> {
        let source = fs::read_to_string(dir.join(file))?;
        let call = driver_call(&source).unwrap_or_default();
        self.log.lock().expect("log lock").push(call.clone());
        self.sources.lock().expect("sources lock").push(source.clone());

        let answer = self
            .outputs
            .get(&call)
            .cloned()
            .or_else(|| self.responder.as_ref().and_then(|f| f(&call, &source)));
        Ok(match answer {
            Some(stdout) => ProcessOutput {
                success: true,
                code: Some(0),
                stdout: format!("{}\n", stdout),
                stderr: String::new(),
            },
            None => ProcessOutput {
                success: false,
                code: Some(2),
                stdout: String::new(),
                stderr: format!("panic: no scripted output for {}\n", call),
            },
        })
    }

    fn resolve_package(&self, _dir: &Path, name: &str) -> Result<Option<String>, ExecError> {
        Ok(self.packages.get(name).cloned())
    }
}
