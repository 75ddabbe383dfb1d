//! [`Compiler`] backed by a `javac` process.
//!
//! Sources are compiled one at a time with the project's source directory
//! on `-sourcepath`, so javac may pull in and compile other sources it
//! needs. The output directory is snapshotted around each run to find the
//! sources whose class files were written or changed.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use kiln_api::{
    ApiError, ApiResult, CompileOutcome, CompileRequest, Compiler, Diagnostic, DiagnosticSink,
    Severity, SourceFile,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{JavaError, Result};
use crate::jdk::Jdk;

static LOCATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<path>.+?\.java):(?P<line>\d+): (?P<kind>error|warning): (?P<msg>.*)$")
        .expect("Failed to compile javac diagnostic pattern")
});

static UNLOCATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<kind>error|warning|Note|note): (?P<msg>.*)$")
        .expect("Failed to compile javac diagnostic pattern")
});

static SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+ (?:error|warning)s?$")
        .expect("Failed to compile javac summary pattern")
});

#[derive(Debug, Clone)]
pub struct JavacCompiler {
    /// Disk directory the store's `/` maps to.
    root: PathBuf,
    jdk: Jdk,
    options: Vec<String>,
}

impl JavacCompiler {
    pub fn new(root: impl Into<PathBuf>, jdk: Jdk) -> Self {
        Self {
            root: root.into(),
            jdk,
            options: Vec::new(),
        }
    }

    /// Uses the first JDK [`Jdk::locate`] finds.
    pub fn locate(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(root, Jdk::locate()?))
    }

    /// Extra command line options passed before the source file.
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(options.into_iter().map(Into::into));
        self
    }

    pub fn jdk(&self) -> &Jdk {
        &self.jdk
    }

    fn disk_path(&self, file: &SourceFile) -> PathBuf {
        let relative = file.path().trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    fn source_file(&self, path: &Path) -> Result<SourceFile> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| JavaError::OutsideRoot(path.display().to_string()))?;
        let mut joined = String::new();
        for part in relative.components() {
            joined.push('/');
            joined.push_str(&part.as_os_str().to_string_lossy());
        }
        Ok(SourceFile::new(&joined))
    }

    fn command(&self, request: &CompileRequest<'_>, output_dir: &Path) -> ApiResult<Command> {
        let mut class_path = vec![output_dir.to_path_buf()];
        class_path.extend(request.class_path.iter().map(|dir| self.disk_path(dir)));
        let class_path = std::env::join_paths(class_path)
            .map_err(|e| ApiError::InvalidArgument(format!("bad class path: {e}")))?;

        let mut cmd = Command::new(&self.jdk.javac);
        cmd.arg("-J-Duser.language=en")
            .args(["-g", "-encoding", "UTF-8", "-Xmaxerrs", "1000"])
            .arg("-d")
            .arg(output_dir)
            .arg("-sourcepath")
            .arg(self.disk_path(request.source_dir))
            .arg("-cp")
            .arg(class_path);
        if let Some(release) = request.release {
            cmd.args(["--release", release]);
        }
        cmd.args(&self.options).arg(self.disk_path(request.file));
        Ok(cmd)
    }

    /// Source owning the class file at `class` below `output_dir`:
    /// `com/acme/Foo$Inner.class` belongs to `com/acme/Foo.java`.
    fn owner_of(&self, class: &Path, output_dir: &Path, source_dir: &Path) -> Option<SourceFile> {
        let relative = class.strip_prefix(output_dir).ok()?;
        let stem = relative.file_stem()?.to_str()?;
        let outer = stem.split('$').next().unwrap_or(stem);
        let source = match relative.parent() {
            Some(package) => source_dir.join(package).join(format!("{outer}.java")),
            None => source_dir.join(format!("{outer}.java")),
        };
        if !source.is_file() {
            return None;
        }
        self.source_file(&source).ok()
    }

    fn report_diagnostics(
        &self,
        request: &CompileRequest<'_>,
        raw: Vec<RawDiagnostic>,
        sink: &mut dyn DiagnosticSink,
    ) -> usize {
        let mut texts: HashMap<PathBuf, Option<String>> = HashMap::new();
        let mut errors = 0;
        for diagnostic in raw {
            let (file, path) = match diagnostic.path.as_deref() {
                Some(path) => {
                    let path = PathBuf::from(path);
                    match self.source_file(&path) {
                        Ok(file) => (file, path),
                        Err(e) => {
                            debug!("Reporting diagnostic on {}: {}", request.file, e);
                            (request.file.clone(), self.disk_path(request.file))
                        }
                    }
                }
                None => (request.file.clone(), self.disk_path(request.file)),
            };

            let (mut start, mut end) = (None, None);
            if let (Some(line), Some(column)) = (diagnostic.line, diagnostic.column) {
                let text = texts
                    .entry(path.clone())
                    .or_insert_with(|| std::fs::read_to_string(&path).ok());
                if let Some((s, e)) = text.as_deref().and_then(|t| token_range(t, line, column)) {
                    start = Some(s);
                    end = Some(e);
                }
            }
            if diagnostic.severity == Severity::Error {
                errors += 1;
            }
            sink.report(Diagnostic {
                file,
                severity: diagnostic.severity,
                message: diagnostic.message,
                line: diagnostic.line,
                column: diagnostic.column,
                start,
                end,
            });
        }
        errors
    }
}

impl Compiler for JavacCompiler {
    fn compile(
        &self,
        request: CompileRequest<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> ApiResult<CompileOutcome> {
        let output_dir = self.disk_path(request.output_dir);
        let source_dir = self.disk_path(request.source_dir);
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| ApiError::io(request.output_dir.path(), e))?;

        let before = snapshot(&output_dir);
        let mut cmd = self.command(&request, &output_dir)?;
        debug!("Running {:?}", cmd);
        let output = cmd.output().map_err(|source| JavaError::Spawn {
            program: self.jdk.javac.display().to_string(),
            source,
        })?;
        let after = snapshot(&output_dir);

        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        let errors = self.report_diagnostics(&request, parse_output(&text), sink);

        let success = output.status.success();
        if !success && errors == 0 {
            warn!("javac failed on {} without diagnostics", request.file);
            sink.report(Diagnostic {
                file: request.file.clone(),
                severity: Severity::Error,
                message: format!("javac exited with {}: {}", output.status, text.trim()),
                line: None,
                column: None,
                start: None,
                end: None,
            });
        }

        let mut outcome = CompileOutcome {
            success,
            compiled: BTreeSet::from([request.file.clone()]),
            modified: BTreeSet::new(),
        };
        for (class, stamp) in &after {
            let previous = before.get(class);
            if previous == Some(stamp) {
                continue;
            }
            let owner = self
                .owner_of(class, &output_dir, &source_dir)
                .unwrap_or_else(|| request.file.clone());
            // Rewritten with identical bytes: compiled, not modified
            if previous.is_none_or(|p| p.hash != stamp.hash) {
                outcome.modified.insert(owner.clone());
            }
            outcome.compiled.insert(owner);
        }
        Ok(outcome)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: Option<SystemTime>,
    hash: u64,
}

fn snapshot(dir: &Path) -> HashMap<PathBuf, Stamp> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "class"))
        .filter_map(|entry| {
            let bytes = std::fs::read(entry.path()).ok()?;
            let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
            Some((
                entry.into_path(),
                Stamp {
                    modified,
                    hash: xxh3_64(&bytes),
                },
            ))
        })
        .collect()
}

/// A javac diagnostic before it is tied to a store file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawDiagnostic {
    pub path: Option<String>,
    pub severity: Severity,
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// Parses javac's console output.
///
/// A located diagnostic is a `path:line: kind: message` header, the
/// offending source line, a caret line marking the column, then optional
/// detail lines (`symbol:`, `location:`) that extend the message.
pub(crate) fn parse_output(output: &str) -> Vec<RawDiagnostic> {
    let mut diagnostics: Vec<RawDiagnostic> = Vec::new();
    // Set while the lines after a located header still belong to it
    let mut open: Option<(usize, bool)> = None;

    for line in output.lines() {
        if let Some(cap) = LOCATED.captures(line) {
            diagnostics.push(RawDiagnostic {
                path: Some(cap["path"].to_string()),
                severity: severity(&cap["kind"], &cap["msg"]),
                message: cap["msg"].to_string(),
                line: cap["line"].parse().ok(),
                column: None,
            });
            open = Some((diagnostics.len() - 1, false));
            continue;
        }
        if let Some(cap) = UNLOCATED.captures(line) {
            diagnostics.push(RawDiagnostic {
                path: None,
                severity: severity(&cap["kind"], &cap["msg"]),
                message: cap["msg"].to_string(),
                line: None,
                column: None,
            });
            open = None;
            continue;
        }
        if SUMMARY.is_match(line.trim()) {
            open = None;
            continue;
        }

        let Some((index, seen_caret)) = open else {
            continue;
        };
        let diagnostic = &mut diagnostics[index];
        if !seen_caret && line.trim() == "^" {
            let caret = line.chars().take_while(|c| *c != '^').count();
            diagnostic.column = Some(caret as u32 + 1);
            open = Some((index, true));
        } else if seen_caret && !line.trim().is_empty() {
            diagnostic.message.push('\n');
            diagnostic.message.push_str(line.trim());
        }
    }
    diagnostics
}

fn severity(kind: &str, message: &str) -> Severity {
    match kind {
        "error" => Severity::Error,
        "warning" if message.starts_with("[unchecked]") || message.starts_with("[deprecation]") => {
            Severity::MandatoryWarning
        }
        "warning" => Severity::Warning,
        _ => Severity::Note,
    }
}

/// Character range of the token at 1-based `line` and `column`.
fn token_range(text: &str, line: u32, column: u32) -> Option<(usize, usize)> {
    let mut offset = 0;
    for (index, content) in text.split('\n').enumerate() {
        if index + 1 == line as usize {
            let chars: Vec<char> = content.trim_end_matches('\r').chars().collect();
            let col = (column.saturating_sub(1) as usize).min(chars.len());
            let token = chars[col..]
                .iter()
                .take_while(|c| c.is_alphanumeric() || **c == '_' || **c == '$')
                .count();
            let start = offset + col;
            let end = start + token.max(usize::from(col < chars.len()));
            return Some((start, end));
        }
        offset += content.chars().count() + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
/work/app/src/com/acme/Foo.java:3: error: cannot find symbol
        Bar bar = null;
        ^
  symbol:   class Bar
  location: class Foo
/work/app/src/com/acme/Foo.java:7: warning: [unchecked] unchecked call to add(E) as a member of the raw type List
        items.add(\"x\");
                 ^
Note: Some input files use unchecked or unsafe operations.
1 error
1 warning
";

    #[test]
    fn test_parse_located_diagnostics() {
        let diagnostics = parse_output(OUTPUT);
        assert_eq!(diagnostics.len(), 3);

        let missing = &diagnostics[0];
        assert_eq!(missing.path.as_deref(), Some("/work/app/src/com/acme/Foo.java"));
        assert_eq!(missing.severity, Severity::Error);
        assert_eq!(missing.line, Some(3));
        assert_eq!(missing.column, Some(9));
        assert_eq!(
            missing.message,
            "cannot find symbol\nsymbol:   class Bar\nlocation: class Foo"
        );

        let unchecked = &diagnostics[1];
        assert_eq!(unchecked.severity, Severity::MandatoryWarning);
        assert_eq!(unchecked.line, Some(7));
        assert_eq!(unchecked.column, Some(18));
    }

    #[test]
    fn test_parse_unlocated_note() {
        let diagnostics = parse_output(OUTPUT);
        let note = &diagnostics[2];
        assert_eq!(note.path, None);
        assert_eq!(note.severity, Severity::Note);
        assert_eq!(note.line, None);
        assert!(note.message.contains("unchecked"));
    }

    #[test]
    fn test_parse_option_error() {
        let diagnostics = parse_output("error: invalid source release: 99\nUsage: javac <options>\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[0].message, "invalid source release: 99");
    }

    #[test]
    fn test_token_range() {
        let text = "package a;\nclass Foo {\n  Bar bar;\n}\n";
        // `Bar` on line 3, column 3
        assert_eq!(token_range(text, 3, 3), Some((25, 28)));
        assert_eq!(token_range(text, 9, 1), None);
        // Past the end of the line still yields an empty range at the end
        assert_eq!(token_range(text, 4, 5), Some((35, 35)));
    }

    #[test]
    fn test_snapshot_hashes_class_contents() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("com/acme");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Foo.class"), [0xCA, 0xFE, 0xBA, 0xBE, 1]).unwrap();
        std::fs::write(dir.join("Bar.class"), [0xCA, 0xFE, 0xBA, 0xBE, 1]).unwrap();
        std::fs::write(dir.join("notes.txt"), "not a class").unwrap();

        let before = snapshot(temp.path());
        assert_eq!(before.len(), 2);
        assert_eq!(before[&dir.join("Foo.class")].hash, xxh3_64(&[0xCA, 0xFE, 0xBA, 0xBE, 1]));

        std::fs::write(dir.join("Bar.class"), [0xCA, 0xFE, 0xBA, 0xBE, 2]).unwrap();
        let after = snapshot(temp.path());
        assert_eq!(before[&dir.join("Foo.class")].hash, after[&dir.join("Foo.class")].hash);
        assert_ne!(before[&dir.join("Bar.class")].hash, after[&dir.join("Bar.class")].hash);
    }

    #[test]
    fn test_owner_of_nested_class() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        let src = root.join("app/src");
        std::fs::create_dir_all(src.join("com/acme")).unwrap();
        std::fs::write(src.join("com/acme/Foo.java"), "class Foo {}").unwrap();

        let jdk = Jdk {
            home: None,
            javac: PathBuf::from("javac"),
            version: None,
        };
        let compiler = JavacCompiler::new(root, jdk);
        let out = root.join("app/bin");
        assert_eq!(
            compiler.owner_of(&out.join("com/acme/Foo$Inner.class"), &out, &src),
            Some(SourceFile::new("/app/src/com/acme/Foo.java"))
        );
        assert_eq!(
            compiler.owner_of(&out.join("com/acme/Helper.class"), &out, &src),
            None
        );
    }
}
