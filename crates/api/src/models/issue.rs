use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::file::SourceFile;

/// Severity of a build issue. Declaration order is severity order, so
/// `Error < Warning < Note` and `min` picks the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Error,
    Warning,
    Note,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Error => "error",
            IssueKind::Warning => "warning",
            IssueKind::Note => "note",
        }
    }

    /// The more severe of two kinds.
    pub fn worst(self, other: IssueKind) -> IssueKind {
        self.min(other)
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diagnostic tied to a file and a character range.
///
/// Lines and columns are 0-based; `start`/`end` are character offsets into
/// the file text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildIssue {
    pub file: SourceFile,
    pub kind: IssueKind,
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub start: usize,
    pub end: usize,
}

impl BuildIssue {
    pub fn new(file: SourceFile, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            file,
            kind,
            message: message.into(),
            line: 0,
            column: 0,
            start: 0,
            end: 0,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_range(mut self, start: usize, end: usize) -> Self {
        self.start = start;
        self.end = end.max(start);
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == IssueKind::Error
    }
}

impl Ord for BuildIssue {
    /// kind, then file, then line, then start offset, then message. Column and
    /// end offset only break remaining ties.
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.file.cmp(&other.file))
            .then_with(|| self.line.cmp(&other.line))
            .then_with(|| self.start.cmp(&other.start))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.column.cmp(&other.column))
            .then_with(|| self.end.cmp(&other.end))
    }
}

impl PartialOrd for BuildIssue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BuildIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file,
            self.line + 1,
            self.column + 1,
            self.kind,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(kind: IssueKind, file: &str, line: u32, start: usize, msg: &str) -> BuildIssue {
        BuildIssue::new(SourceFile::new(file), kind, msg)
            .at(line, 0)
            .with_range(start, start + 1)
    }

    #[test]
    fn test_ordering() {
        let mut issues = vec![
            issue(IssueKind::Note, "/a/A.java", 0, 0, "n"),
            issue(IssueKind::Warning, "/a/A.java", 1, 5, "w"),
            issue(IssueKind::Error, "/a/B.java", 0, 0, "e"),
            issue(IssueKind::Error, "/a/A.java", 3, 2, "b"),
            issue(IssueKind::Error, "/a/A.java", 3, 2, "a"),
            issue(IssueKind::Error, "/a/A.java", 3, 1, "z"),
        ];
        issues.sort();
        let order: Vec<_> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(order, vec!["z", "a", "b", "e", "w", "n"]);
    }

    #[test]
    fn test_worst() {
        assert_eq!(IssueKind::Warning.worst(IssueKind::Error), IssueKind::Error);
        assert_eq!(IssueKind::Note.worst(IssueKind::Warning), IssueKind::Warning);
    }

    #[test]
    fn test_display_is_one_based() {
        let i = issue(IssueKind::Error, "/a/A.java", 4, 0, "cannot find symbol");
        assert_eq!(i.to_string(), "/a/A.java:5:1: error: cannot find symbol");
    }
}
