use std::collections::BTreeSet;

use crate::error::ApiResult;
use crate::models::SourceFile;

/// Severity as reported by a compiler, before it is mapped to an issue kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    MandatoryWarning,
    Note,
    Other,
}

/// A raw compiler diagnostic. Lines and columns are 1-based as compilers
/// print them; `None` means the compiler gave no position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: SourceFile,
    pub severity: Severity,
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub start: Option<usize>,
    pub end: Option<usize>,
}

/// Receives diagnostics while a compile runs.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Everything a compiler needs to build one source file of a project.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub file: &'a SourceFile,
    pub source_dir: &'a SourceFile,
    pub output_dir: &'a SourceFile,
    /// Output directories of the projects this one depends on.
    pub class_path: &'a [SourceFile],
    pub release: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutcome {
    pub success: bool,
    /// Sources compiled by this invocation, including ones pulled in implicitly.
    pub compiled: BTreeSet<SourceFile>,
    /// Sources whose artifacts changed on disk.
    pub modified: BTreeSet<SourceFile>,
}

impl CompileOutcome {
    pub fn failed(file: &SourceFile) -> Self {
        Self {
            success: false,
            compiled: BTreeSet::from([file.clone()]),
            modified: BTreeSet::new(),
        }
    }
}

/// External compiler. Compiles may take seconds and cannot be cancelled
/// once started.
pub trait Compiler: Send + Sync {
    fn compile(
        &self,
        request: CompileRequest<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> ApiResult<CompileOutcome>;
}
