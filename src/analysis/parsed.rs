//! Parsed tree plus the bytes it was parsed from.

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// This is kept separate from `GoSource` so a single parse can serve both
/// fact extraction and later span lookups.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path (for error reporting).
    pub path: String,
}

impl ParsedFile {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }
}
