use std::path::Path;

use kiln_api::SourceFile;
use kiln_cli::Session;
use kiln_core::BuildState;

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

#[tokio::test]
async fn test_structural_project_reports_syntax_errors() {
    let temp = tempfile::tempdir().unwrap();
    write(temp.path(), "docs/build.kiln", r#"{"Strategy": "structural"}"#);
    write(temp.path(), "docs/src/Good.java", "class Good {}\n");
    write(temp.path(), "docs/src/Bad.java", "class Bad {\n    void f( {}\n}\n");
    write(temp.path(), "docs/src/notes.txt", "copied as a resource");

    let session = Session::open(temp.path()).unwrap();
    assert_eq!(session.workspace.projects().len(), 1);
    assert_eq!(session.workspace.projects()[0].name, "docs");

    let state = session.build_all().await.unwrap();
    assert_eq!(state, BuildState::Finished { success: false });

    let bad = SourceFile::new("/docs/src/Bad.java");
    let good = SourceFile::new("/docs/src/Good.java");
    assert!(session.workspace.ledger().has_errors_for_file(&bad));
    assert!(session.workspace.issues_for_file(&good).unwrap().is_empty());
    assert!(temp.path().join("docs/bin/notes.txt").is_file());
}

#[tokio::test]
async fn test_clean_removes_build_output() {
    let temp = tempfile::tempdir().unwrap();
    write(temp.path(), "build.kiln", r#"{"Strategy": "structural"}"#);
    write(temp.path(), "src/data.properties", "key=value\n");

    let session = Session::open(temp.path()).unwrap();
    let state = session.build_all().await.unwrap();
    assert_eq!(state, BuildState::Finished { success: true });
    assert!(temp.path().join("bin/data.properties").is_file());

    session.builder.clean_workspace().await.unwrap();
    assert!(!temp.path().join("bin").exists());
    assert!(session.builder.is_needs_build());
    assert_eq!(
        session.builder.build_log(),
        "Clean workspace - all build files removed"
    );
}
