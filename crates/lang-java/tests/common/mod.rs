#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use kiln_api::SourceFile;
use kiln_core::{DiskStore, Workspace, WorkspaceBuilder};
use kiln_java::{Jdk, JavacCompiler, TreeSitterSyntaxChecker};

/// The local JDK, or `None` (with a note on stderr) when the machine has none.
pub fn jdk_or_skip() -> Option<Jdk> {
    match Jdk::locate() {
        Ok(jdk) => Some(jdk),
        Err(e) => {
            eprintln!("Skipping javac test: {e}");
            None
        }
    }
}

pub fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

/// A disk-backed workspace with one project at `/app` built by javac.
pub fn javac_workspace(root: &Path, jdk: Jdk) -> (Arc<Workspace>, WorkspaceBuilder) {
    let store = Arc::new(DiskStore::new(root));
    let workspace = Workspace::new(store)
        .with_compiler(Arc::new(JavacCompiler::new(root, jdk)))
        .with_syntax_checker(Arc::new(TreeSitterSyntaxChecker::new().unwrap()));
    workspace.add_project(SourceFile::new("/app")).unwrap();
    let workspace = Arc::new(workspace);
    let builder = WorkspaceBuilder::new(workspace.clone());
    (workspace, builder)
}
