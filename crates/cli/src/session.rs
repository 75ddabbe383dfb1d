use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_api::{FileStore, SourceFile};
use kiln_core::config::WORKSPACE_CONFIG_FILE_NAME;
use kiln_core::{BuildState, DiskStore, Workspace, WorkspaceBuilder, WorkspaceConfig};
use kiln_java::{JavacCompiler, TreeSitterSyntaxChecker};
use tracing::{info, warn};
use walkdir::WalkDir;

/// A workspace opened from a directory on disk, wired with javac and the
/// tree-sitter syntax checker.
pub struct Session {
    pub root: PathBuf,
    pub store: Arc<DiskStore>,
    pub workspace: Arc<Workspace>,
    pub builder: WorkspaceBuilder,
}

impl Session {
    pub fn open(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let root = path.canonicalize()?;
        let store = Arc::new(DiskStore::new(&root));
        let config_file = SourceFile::root().join(WORKSPACE_CONFIG_FILE_NAME);
        let config = WorkspaceConfig::load(store.as_ref(), &config_file)?;

        let mut workspace = Workspace::new(store.clone())
            .with_config(config.clone())
            .with_syntax_checker(Arc::new(TreeSitterSyntaxChecker::new()?));
        match JavacCompiler::locate(&root) {
            Ok(compiler) => {
                info!(
                    "Using javac {} ({})",
                    compiler.jdk().version.as_deref().unwrap_or("unknown version"),
                    compiler.jdk().javac.display()
                );
                workspace = workspace.with_compiler(Arc::new(compiler));
            }
            Err(e) => warn!("{}; compiled projects cannot be built", e),
        }

        for project in discover_projects(store.as_ref(), &config) {
            let project = workspace.add_project(project)?;
            info!("Opened project {} at {}", project.name, project.root);
        }

        let workspace = Arc::new(workspace);
        let builder = WorkspaceBuilder::new(workspace.clone());
        Ok(Self {
            root,
            store,
            workspace,
            builder,
        })
    }

    /// Store handle for `path`, which may be absolute or relative to the root.
    pub fn source_file(&self, path: &Path) -> Option<SourceFile> {
        if path.is_absolute() {
            let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            self.store.to_source_file(&path)
        } else {
            self.store.to_source_file(&self.root.join(path))
        }
    }

    /// Queues everything and runs one pass to completion.
    pub async fn build_all(&self) -> Result<BuildState, Box<dyn std::error::Error>> {
        self.builder.add_all_files_to_build();
        Ok(self.builder.build_and_wait().await?)
    }
}

/// Directories holding a settings file, or just the root when there are none.
pub fn discover_projects(store: &DiskStore, config: &WorkspaceConfig) -> Vec<SourceFile> {
    let mut projects: Vec<SourceFile> = WalkDir::new(store.root())
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy() == config.settings_file_name)
        .filter_map(|entry| entry.path().parent().and_then(|dir| store.to_source_file(dir)))
        .collect();
    if projects.is_empty() && store.exists(&SourceFile::root()) {
        projects.push(SourceFile::root());
    }
    projects.sort();
    projects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_root_is_the_only_project_without_settings() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "src/Foo.java");
        let store = DiskStore::new(temp.path());
        assert_eq!(
            discover_projects(&store, &WorkspaceConfig::default()),
            vec![SourceFile::root()]
        );
    }

    #[test]
    fn test_settings_files_mark_projects() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "lib/build.kiln");
        touch(temp.path(), "app/build.kiln");
        touch(temp.path(), ".git/build.kiln");
        touch(temp.path(), "notes/readme.txt");
        let store = DiskStore::new(temp.path());
        assert_eq!(
            discover_projects(&store, &WorkspaceConfig::default()),
            vec![SourceFile::new("/app"), SourceFile::new("/lib")]
        );
    }
}
