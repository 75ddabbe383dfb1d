//! Syntax-only checks on Java sources using tree-sitter.

use std::collections::HashSet;

use kiln_api::{BuildIssue, IssueKind, SourceFile, SyntaxChecker};
use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, QueryMatch, StreamingIterator, Tree};
use tracing::warn;

use crate::error::{JavaError, Result};
use crate::queries::USAGE_SCM;

/// Type names Javadoc tags refer to, e.g. `{@link Foo#bar}` or `@see Foo`.
static DOC_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\{@(?:link|linkplain|value)|@see|@throws|@exception)\s+([A-Za-z_$][\w$]*)")
        .expect("Failed to compile Javadoc reference pattern")
});

#[derive(Debug, Clone, Copy)]
struct UsageIndices {
    import: u32,
    import_name: u32,
    usage: u32,
    doc: u32,
}

impl UsageIndices {
    fn new(query: &Query) -> Result<Self> {
        let index = |name: &str| {
            query
                .capture_index_for_name(name)
                .ok_or_else(|| JavaError::Query(format!("Capture name '{name}' not found")))
        };
        Ok(Self {
            import: index("import")?,
            import_name: index("import_name")?,
            usage: index("usage")?,
            doc: index("doc")?,
        })
    }
}

pub struct TreeSitterSyntaxChecker {
    language: Language,
    query: Query,
    indices: UsageIndices,
}

impl TreeSitterSyntaxChecker {
    pub fn new() -> Result<Self> {
        let language: Language = tree_sitter_java::LANGUAGE.into();
        let query = Query::new(&language, USAGE_SCM)
            .map_err(|e| JavaError::Query(format!("Invalid query: {e:?}")))?;
        let indices = UsageIndices::new(&query)?;
        Ok(Self {
            language,
            query,
            indices,
        })
    }

    fn parse(&self, text: &str) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| JavaError::Parse(e.to_string()))?;
        parser
            .parse(text, None)
            .ok_or_else(|| JavaError::Parse("tree-sitter returned no tree".to_string()))
    }

    fn parse_or_log(&self, file: &SourceFile, text: &str) -> Option<Tree> {
        match self.parse(text) {
            Ok(tree) => Some(tree),
            Err(e) => {
                warn!("Failed to parse {}: {}", file, e);
                None
            }
        }
    }
}

impl SyntaxChecker for TreeSitterSyntaxChecker {
    fn structural_errors(&self, file: &SourceFile, text: &str) -> Vec<BuildIssue> {
        let Some(tree) = self.parse_or_log(file, text) else {
            return Vec::new();
        };
        let mut issues = Vec::new();
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            if node.is_missing() {
                let message = format!("Syntax error, insert \"{}\"", node.kind());
                issues.push(issue_at(file, text, node, IssueKind::Error, message));
            } else if node.is_error() {
                let message = match snippet(text, node) {
                    Some(token) => format!("Syntax error on \"{token}\""),
                    None => "Syntax error".to_string(),
                };
                issues.push(issue_at(file, text, node, IssueKind::Error, message));
            } else if node.has_error() {
                let mut cursor = node.walk();
                stack.extend(node.children(&mut cursor));
            }
        }
        issues.sort_by_key(|issue| (issue.start, issue.end));
        issues
    }

    fn unused_imports(&self, file: &SourceFile, text: &str) -> Vec<BuildIssue> {
        let Some(tree) = self.parse_or_log(file, text) else {
            return Vec::new();
        };
        let source = text.as_bytes();
        let mut imports: Vec<(String, Node)> = Vec::new();
        let mut seen = HashSet::new();
        let mut used: HashSet<&str> = HashSet::new();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, tree.root_node(), source);
        while let Some(mat) = matches.next() {
            if let Some(import) = capture(mat, self.indices.import) {
                if !seen.insert(import.id()) || is_wildcard(import) {
                    continue;
                }
                if let Some(name) = capture(mat, self.indices.import_name) {
                    if let Ok(full) = name.utf8_text(source) {
                        imports.push((full.to_string(), name));
                    }
                }
            } else if let Some(node) = capture(mat, self.indices.usage) {
                if !in_header(node) {
                    if let Ok(name) = node.utf8_text(source) {
                        used.insert(name);
                    }
                }
            } else if let Some(node) = capture(mat, self.indices.doc) {
                if let Ok(doc) = node.utf8_text(source) {
                    used.extend(
                        DOC_REFERENCE
                            .captures_iter(doc)
                            .filter_map(|cap| cap.get(1))
                            .map(|m| m.as_str()),
                    );
                }
            }
        }

        imports
            .into_iter()
            .filter(|(full, _)| {
                let simple = full.rsplit('.').next().unwrap_or(full);
                !used.contains(simple)
            })
            .map(|(full, node)| {
                let message = format!("The import {full} is never used");
                issue_at(file, text, node, IssueKind::Warning, message)
            })
            .collect()
    }
}

fn capture<'t>(mat: &QueryMatch<'_, 't>, index: u32) -> Option<Node<'t>> {
    mat.captures
        .iter()
        .find(|c| c.index == index)
        .map(|c| c.node)
}

fn is_wildcard(import: Node) -> bool {
    let mut cursor = import.walk();
    import
        .children(&mut cursor)
        .any(|child| child.kind() == "asterisk")
}

/// Inside an import or package declaration.
fn in_header(node: Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if matches!(parent.kind(), "import_declaration" | "package_declaration") {
            return true;
        }
        current = parent.parent();
    }
    false
}

/// First line of the node's text, shortened for messages.
fn snippet(text: &str, node: Node) -> Option<String> {
    let raw = node.utf8_text(text.as_bytes()).ok()?;
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    if line.chars().count() > 30 {
        let short: String = line.chars().take(30).collect();
        Some(format!("{short}..."))
    } else {
        Some(line.to_string())
    }
}

fn char_count(text: &str, byte: usize) -> usize {
    text.get(..byte).map_or(byte, |prefix| prefix.chars().count())
}

/// Issue positioned on `node`, with tree-sitter byte positions converted
/// to character offsets.
fn issue_at(
    file: &SourceFile,
    text: &str,
    node: Node,
    kind: IssueKind,
    message: String,
) -> BuildIssue {
    let point = node.start_position();
    let start = char_count(text, node.start_byte());
    let end = char_count(text, node.end_byte());
    let line_start = char_count(text, node.start_byte() - point.column);
    BuildIssue::new(file.clone(), kind, message)
        .at(point.row as u32, (start - line_start) as u32)
        .with_range(start, end)
}
