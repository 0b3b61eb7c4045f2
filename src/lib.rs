//! goahead - compile-time code generation for Go.
//!
//! Helper files marked `//go:ahead functions` hold ordinary Go functions.
//! Regular sources reference them through comment placeholders:
//!
//! ```go
//! //:Welcome:ada
//! var greeting = ""
//! ```
//!
//! goahead synthesizes a small program per call, runs it with `go run`, and
//! writes the printed result into the literal on the line below. The
//! placeholder comment stays, so generation can be repeated.
//!
//! # Architecture
//!
//! - `discover`: walk a project, classify helper files and sources, find submodules
//! - `analysis`: tree-sitter facts about Go files
//! - `project`: helper index, shadowing rules, and name resolution
//! - `driver`: synthesis of the program that evaluates one call
//! - `exec`: toolchain access, retries, and memoization
//! - `rewrite`: placeholder parsing and literal replacement
//! - `inject`: copying helpers after interface declarations
//! - `runner`: orchestration over a project and its nested modules
//! - `report`: diagnostics and summaries (pretty, JSON)

pub mod analysis;
pub mod cli;
pub mod config;
pub mod discover;
pub mod driver;
pub mod evaluate;
pub mod exec;
pub mod inject;
pub mod project;
pub mod report;
pub mod rewrite;
pub mod runner;

pub use analysis::{Declaration, DeclarationKind, GoAnalyzer, GoSource};
pub use config::Config;
pub use exec::{ExecError, GoToolchain, ProcessOutput, Toolchain};
pub use inject::InjectError;
pub use project::{LoadError, ProjectContext};
pub use report::{Diagnostic, RunReport, Severity};
pub use runner::Runner;
