//! The workspace: every project, the dependency graph across them and the
//! issue ledger, plus the collaborators that builders call out to.

pub mod builder;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use kiln_api::{
    BuildIssue, Compiler, FileStore, IssueKind, SourceFile, SyntaxChecker, TypeInfoProvider,
};
use tracing::{debug, info, warn};

use crate::build::{BuildContext, PassState};
use crate::config::WorkspaceConfig;
use crate::deps::{ClassFileTypeInfo, DependencyGraph, ReferenceExtractor, SymbolReference};
use crate::error::{KilnError, Result};
use crate::issues::IssueLedger;
use crate::project::Project;

pub use builder::{BuildState, WorkspaceBuilder};

pub struct Workspace {
    store: Arc<dyn FileStore>,
    config: WorkspaceConfig,
    /// In build order: a project comes after every project it depends on.
    projects: RwLock<Vec<Arc<Project>>>,
    graph: Mutex<DependencyGraph>,
    ledger: IssueLedger,
    compiler: Option<Arc<dyn Compiler>>,
    syntax: Option<Arc<dyn SyntaxChecker>>,
    types: Arc<dyn TypeInfoProvider>,
}

impl Workspace {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self {
            store,
            config: WorkspaceConfig::default(),
            projects: RwLock::new(Vec::new()),
            graph: Mutex::new(DependencyGraph::new()),
            ledger: IssueLedger::new(),
            compiler: None,
            syntax: None,
            types: Arc::new(ClassFileTypeInfo),
        }
    }

    pub fn with_config(mut self, config: WorkspaceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn with_syntax_checker(mut self, checker: Arc<dyn SyntaxChecker>) -> Self {
        self.syntax = Some(checker);
        self
    }

    pub fn with_type_info(mut self, types: Arc<dyn TypeInfoProvider>) -> Self {
        self.types = types;
        self
    }

    pub fn store(&self) -> &dyn FileStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn ledger(&self) -> &IssueLedger {
        &self.ledger
    }

    pub fn compiler(&self) -> Option<&dyn Compiler> {
        self.compiler.as_deref()
    }

    pub fn syntax_checker(&self) -> Option<&dyn SyntaxChecker> {
        self.syntax.as_deref()
    }

    /// Opens the project rooted at `root` and adds it in build order.
    pub fn add_project(&self, root: SourceFile) -> Result<Arc<Project>> {
        let project = Arc::new(Project::open(self.store(), root, &self.config)?);
        let mut projects = self.projects.write()?;
        if projects.iter().any(|p| p.name == project.name) {
            return Err(KilnError::Config(format!(
                "a project named {} already exists",
                project.name
            )));
        }
        info!("Adding project {} at {}", project.name, project.root);
        projects.push(project.clone());
        let ordered = build_order(&projects);
        *projects = ordered;
        Ok(project)
    }

    pub fn projects(&self) -> Vec<Arc<Project>> {
        self.projects.read().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn project(&self, name: &str) -> Option<Arc<Project>> {
        self.projects().into_iter().find(|p| p.name == name)
    }

    /// Innermost project whose tree holds `file`.
    pub fn project_for_file(&self, file: &SourceFile) -> Option<Arc<Project>> {
        self.projects()
            .into_iter()
            .filter(|p| p.contains(file))
            .max_by_key(|p| p.root.path().len())
    }

    /// Output directories of the projects `project` depends on.
    pub fn class_path_for(&self, project: &Project) -> Vec<SourceFile> {
        project
            .settings
            .dependencies
            .iter()
            .filter_map(|name| self.project(name))
            .map(|p| p.build_dir.clone())
            .collect()
    }

    /// Source file declaring the top-level class `class_name` in any project.
    pub fn source_file_for_class_name(&self, class_name: &str) -> Option<SourceFile> {
        self.projects()
            .iter()
            .find_map(|p| p.source_file_for_class_name(self.store(), class_name))
    }

    pub fn add_build_file(&self, file: &SourceFile) -> Result<()> {
        self.add_build_file_with(file, false)
    }

    pub fn add_build_file_with(&self, file: &SourceFile, force: bool) -> Result<()> {
        let Some(project) = self.project_for_file(file) else {
            debug!("{} is not in any project", file);
            return Ok(());
        };
        let ctx = BuildContext::new(self, &project);
        project.builder.add_build_file(&ctx, file, force)
    }

    pub fn add_build_file_force(&self, file: &SourceFile) -> Result<()> {
        if let Some(project) = self.project_for_file(file) {
            let ctx = BuildContext::new(self, &project);
            project.builder.add_build_file_force(&ctx, file);
        }
        Ok(())
    }

    /// Forgets a deleted file. For a deleted directory every known file
    /// beneath it is forgotten.
    pub fn remove_build_file(&self, file: &SourceFile) -> Result<()> {
        let Some(project) = self.project_for_file(file) else {
            return Ok(());
        };
        let ctx = BuildContext::new(self, &project);
        let mut known: BTreeSet<SourceFile> = self
            .graph
            .lock()?
            .files()
            .filter(|f| f.starts_with(file) && *f != file)
            .cloned()
            .collect();
        known.extend(
            project
                .builder
                .pending_files()
                .into_iter()
                .filter(|f| f.starts_with(file) && f != file),
        );
        if known.is_empty() {
            return project.builder.remove_build_file(&ctx, file);
        }
        for child in known {
            if !self.store.exists(&child) {
                project.builder.remove_build_file(&ctx, &child)?;
            }
        }
        Ok(())
    }

    pub fn is_dependencies_set(&self, file: &SourceFile) -> Result<bool> {
        Ok(self.graph.lock()?.is_dependencies_set(file))
    }

    pub fn dependents(&self, file: &SourceFile) -> Result<BTreeSet<SourceFile>> {
        Ok(self.graph.lock()?.dependents(file))
    }

    pub fn dependencies(&self, file: &SourceFile) -> Result<BTreeSet<SourceFile>> {
        Ok(self.graph.lock()?.dependencies(file))
    }

    pub fn references(&self, file: &SourceFile) -> Result<BTreeSet<SymbolReference>> {
        Ok(self.graph.lock()?.references(file))
    }

    /// Re-reads the references of `file` from all of its artifacts and
    /// updates the graph. Returns whether the reference set changed.
    pub fn update_dependencies(&self, file: &SourceFile) -> Result<bool> {
        let Some(project) = self.project_for_file(file) else {
            return Ok(false);
        };
        let extractor = ReferenceExtractor::new(self.types.as_ref());
        let mut references = BTreeSet::new();
        for artifact in project.class_files_for_source(self.store(), file)? {
            match self.store.read_bytes(&artifact) {
                Ok(bytes) => references.extend(extractor.extract_bytes(&bytes)),
                Err(e) => warn!("Cannot read {}: {}", artifact, e),
            }
        }

        // Resolve outside the graph lock; the store may be slow
        let mut resolved: HashMap<String, Option<SourceFile>> = HashMap::new();
        for reference in &references {
            let root = reference.root_class_name();
            if !resolved.contains_key(root) {
                resolved.insert(root.to_string(), self.source_file_for_class_name(root));
            }
        }
        let changed = self.graph.lock()?.update_references(file, references, |root| {
            resolved.get(root).cloned().flatten()
        });
        if changed {
            debug!("References of {} changed", file);
        }
        Ok(changed)
    }

    pub fn remove_dependencies(&self, file: &SourceFile) -> Result<()> {
        self.graph.lock()?.remove_dependencies(file);
        Ok(())
    }

    /// Runs `f` with the graph locked.
    pub fn with_graph<T>(&self, f: impl FnOnce(&DependencyGraph) -> T) -> Result<T> {
        let graph = self.graph.lock()?;
        Ok(f(&graph))
    }

    pub fn issues(&self) -> Result<Vec<BuildIssue>> {
        self.ledger.issues()
    }

    pub fn issues_for_file(&self, file: &SourceFile) -> Result<Vec<BuildIssue>> {
        self.ledger.issues_for_file(file)
    }

    pub fn build_status_for_file(&self, file: &SourceFile) -> Result<Option<IssueKind>> {
        let projects = self.projects();
        let store = self.store();
        self.ledger.build_status_for_file(file, |f| {
            projects.iter().any(|p| p.is_package_dir(store, f))
        })
    }

    pub fn is_needs_build(&self) -> bool {
        self.projects().iter().any(|p| p.builder.is_needs_build())
    }

    /// Queues every source file of every project.
    pub fn add_all_files_to_build(&self) -> Result<()> {
        for project in self.projects() {
            let ctx = BuildContext::new(self, &project);
            project.builder.add_build_files_all(&ctx)?;
        }
        Ok(())
    }

    /// Builds the projects in order, stopping at the first that fails.
    pub fn build_projects(&self, pass: &PassState) -> Result<bool> {
        for project in self.projects() {
            let ctx = BuildContext::new(self, &project);
            if !project.builder.build_project(&ctx, pass)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn clean_projects(&self) -> Result<()> {
        for project in self.projects() {
            let ctx = BuildContext::new(self, &project);
            project.builder.clean_project(&ctx)?;
        }
        self.graph.lock()?.invalidate_all();
        Ok(())
    }
}

/// Orders projects so each follows the projects it depends on. Cycles and
/// unknown names keep the order projects were added in.
fn build_order(projects: &[Arc<Project>]) -> Vec<Arc<Project>> {
    fn visit(
        index: usize,
        projects: &[Arc<Project>],
        state: &mut [u8],
        ordered: &mut Vec<Arc<Project>>,
    ) {
        if state[index] != 0 {
            return;
        }
        state[index] = 1;
        for name in &projects[index].settings.dependencies {
            if let Some(dep) = projects.iter().position(|p| &p.name == name) {
                visit(dep, projects, state, ordered);
            }
        }
        state[index] = 2;
        ordered.push(projects[index].clone());
    }

    let mut state = vec![0u8; projects.len()];
    let mut ordered = Vec::with_capacity(projects.len());
    for index in 0..projects.len() {
        visit(index, projects, &mut state, &mut ordered);
    }
    ordered
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("config", &self.config)
            .field("projects", &self.projects())
            .finish()
    }
}
