#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kiln_api::{
    ApiResult, BuildIssue, CompileOutcome, CompileRequest, Compiler, Diagnostic, DiagnosticSink,
    FileStore, IssueKind, Severity, SourceFile, SyntaxChecker,
};
use kiln_classfile::assemble::ClassAssembler;
use kiln_core::{MemoryStore, Workspace, WorkspaceBuilder, WorkspaceConfig};

#[derive(Debug, Clone)]
pub enum Script {
    /// Write these `(internal name, bytes)` artifacts.
    Emit(Vec<(String, Vec<u8>)>),
    /// Report this many errors and write nothing.
    Fail(usize),
}

/// Compiler double: writes scripted class files into the memory store.
///
/// Files without a script compile to an empty class named after the file.
pub struct FakeCompiler {
    store: Arc<MemoryStore>,
    scripts: Mutex<HashMap<SourceFile, Script>>,
    calls: Mutex<Vec<SourceFile>>,
    gate: Mutex<Option<Receiver<()>>>,
}

impl FakeCompiler {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    pub fn emit(&self, file: &str, classes: Vec<(&str, Vec<u8>)>) {
        let classes = classes
            .into_iter()
            .map(|(name, bytes)| (name.to_string(), bytes))
            .collect();
        self.scripts
            .lock()
            .unwrap()
            .insert(SourceFile::new(file), Script::Emit(classes));
    }

    pub fn fail(&self, file: &str, errors: usize) {
        self.scripts
            .lock()
            .unwrap()
            .insert(SourceFile::new(file), Script::Fail(errors));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Makes the next compile block until the returned sender fires.
    pub fn hold_next(&self) -> Sender<()> {
        let (tx, rx) = channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }
}

impl Compiler for FakeCompiler {
    fn compile(
        &self,
        request: CompileRequest<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> ApiResult<CompileOutcome> {
        let file = request.file.clone();
        self.calls.lock().unwrap().push(file.clone());
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.recv_timeout(Duration::from_secs(10));
        }

        let script = self.scripts.lock().unwrap().get(&file).cloned();
        let script = script.unwrap_or_else(|| {
            let internal = file
                .relative_to(request.source_dir)
                .unwrap()
                .trim_end_matches(".java")
                .to_string();
            let bytes = ClassAssembler::new(&internal).build();
            Script::Emit(vec![(internal, bytes)])
        });

        match script {
            Script::Fail(errors) => {
                for i in 0..errors {
                    sink.report(Diagnostic {
                        file: file.clone(),
                        severity: Severity::Error,
                        message: format!("error {i}"),
                        line: Some(i as u32 + 1),
                        column: Some(1),
                        start: Some(i),
                        end: Some(i + 1),
                    });
                }
                Ok(CompileOutcome::failed(&file))
            }
            Script::Emit(classes) => {
                let mut modified = false;
                for (internal, bytes) in classes {
                    let out = request.output_dir.join(&format!("{internal}.class"));
                    if self.store.read_bytes(&out).ok().as_deref() != Some(&bytes[..]) {
                        modified = true;
                    }
                    self.store.write_bytes(&out, &bytes)?;
                }
                let mut outcome = CompileOutcome {
                    success: true,
                    compiled: BTreeSet::from([file.clone()]),
                    modified: BTreeSet::new(),
                };
                if modified {
                    outcome.modified.insert(file);
                }
                Ok(outcome)
            }
        }
    }
}

/// Flags lines containing `broken` as errors and `import unused` lines as
/// warnings.
pub struct FakeSyntaxChecker;

impl FakeSyntaxChecker {
    fn scan(file: &SourceFile, text: &str, needle: &str, kind: IssueKind) -> Vec<BuildIssue> {
        let mut offset = 0;
        let mut issues = Vec::new();
        for (line, content) in text.lines().enumerate() {
            if content.contains(needle) {
                issues.push(
                    BuildIssue::new(file.clone(), kind, needle)
                        .at(line as u32, 0)
                        .with_range(offset, offset + content.len()),
                );
            }
            offset += content.len() + 1;
        }
        issues
    }
}

impl SyntaxChecker for FakeSyntaxChecker {
    fn structural_errors(&self, file: &SourceFile, text: &str) -> Vec<BuildIssue> {
        Self::scan(file, text, "broken", IssueKind::Error)
    }

    fn unused_imports(&self, file: &SourceFile, text: &str) -> Vec<BuildIssue> {
        Self::scan(file, text, "import unused", IssueKind::Warning)
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub compiler: Arc<FakeCompiler>,
    pub workspace: Arc<Workspace>,
    pub builder: WorkspaceBuilder,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(WorkspaceConfig::default(), &[("/app", None)])
    }

    /// Projects given as `(root, settings json)`.
    pub fn with_config(config: WorkspaceConfig, projects: &[(&str, Option<&str>)]) -> Self {
        let store = Arc::new(MemoryStore::new());
        let compiler = Arc::new(FakeCompiler::new(store.clone()));
        for (root, settings) in projects {
            if let Some(settings) = settings {
                store
                    .save(&SourceFile::new(root).join("build.kiln"), settings)
                    .unwrap();
            }
        }
        let workspace = Workspace::new(store.clone())
            .with_config(config)
            .with_compiler(compiler.clone())
            .with_syntax_checker(Arc::new(FakeSyntaxChecker));
        for (root, _) in projects {
            workspace.add_project(SourceFile::new(root)).unwrap();
        }
        let workspace = Arc::new(workspace);
        let builder = WorkspaceBuilder::new(workspace.clone());
        Self {
            store,
            compiler,
            workspace,
            builder,
        }
    }

    pub fn write(&self, path: &str, text: &str) -> SourceFile {
        let file = SourceFile::new(path);
        self.store.save(&file, text).unwrap();
        file
    }

    pub fn write_bytes(&self, path: &str, bytes: &[u8]) -> SourceFile {
        let file = SourceFile::new(path);
        self.store.write_bytes(&file, bytes).unwrap();
        file
    }

    pub fn pending(&self) -> Vec<String> {
        self.workspace
            .projects()
            .iter()
            .flat_map(|p| p.builder.pending_files())
            .map(|f| f.name().to_string())
            .collect()
    }

    /// Polls until the compiler has been called `count` times.
    pub async fn wait_for_calls(&self, count: usize) {
        for _ in 0..500 {
            if self.compiler.calls().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("compiler was called {} times", self.compiler.calls().len());
    }
}

/// `com/acme/Foo` calling `Bar.baz()`.
pub fn foo_calling_bar() -> Vec<u8> {
    ClassAssembler::new("com/acme/Foo")
        .with_method_ref("com/acme/Bar", "baz", "()V")
        .with_method(0x0001, "run", "()V", None)
        .build()
}

pub fn empty_class(internal: &str) -> Vec<u8> {
    ClassAssembler::new(internal).build()
}
