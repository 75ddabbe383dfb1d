use crate::models::{BuildIssue, SourceFile};

/// Syntax-only analysis of a source file, without compiling it.
pub trait SyntaxChecker: Send + Sync {
    /// Structural (parse) errors in `text`.
    fn structural_errors(&self, file: &SourceFile, text: &str) -> Vec<BuildIssue>;

    /// Warnings for import declarations nothing in `text` uses.
    fn unused_imports(&self, file: &SourceFile, text: &str) -> Vec<BuildIssue>;
}
