//! AST-backed analysis of Go sources.
//!
//! This module extracts "facts" from Go files using tree-sitter:
//! - Package clause and imports
//! - Declarations (functions, methods, constants, variables, types)
//! - Per-declaration identifier references, used for dependency closure
//! - Interface method sets, used to validate injection targets
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Helper files    │────▶│ GoAnalyzer   │────▶│ GoSource      │
//! │ Target files    │     │ (tree-sitter)│     │ (Declarations,│
//! └─────────────────┘     └──────────────┘     │  Imports, ...)│
//!                                              └───────────────┘
//!                                                      │
//!                              ┌───────────────────────┼──────────────┐
//!                              ▼                       ▼              ▼
//!                       ┌─────────────┐        ┌─────────────┐ ┌───────────┐
//!                       │ Index       │        │ Driver      │ │ Injector  │
//!                       └─────────────┘        └─────────────┘ └───────────┘
//! ```

mod facts;
mod go;
mod parsed;

pub use facts::{
    default_package_name, is_exported, Declaration, DeclarationKind, GoSource, Import,
    InterfaceDecl, Param, Signature, Span,
};
pub use go::{go_analyzer, GoAnalyzer};
pub use parsed::ParsedFile;
