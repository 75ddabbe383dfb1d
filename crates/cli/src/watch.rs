use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kiln_api::SourceFile;
use kiln_core::{DiskStore, Workspace};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::session::Session;

const DEBOUNCE: Duration = Duration::from_millis(500);

struct FsWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl FsWatcher {
    fn new(root: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    async fn next_event_async(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await? {
                Ok(event) => return Some(event),
                Err(e) => error!("Watch error: {}", e),
            }
        }
    }
}

/// Store handles for the changed paths worth building. Paths inside hidden
/// directories or outside the root are dropped.
fn changed_files(store: &DiskStore, paths: &BTreeSet<PathBuf>) -> Vec<SourceFile> {
    paths
        .iter()
        .filter_map(|path| store.to_source_file(path))
        .filter(|file| !file.path().split('/').any(|part| part.starts_with('.')))
        .collect()
}

/// Queues existing files and drops deleted ones.
fn apply_changes(workspace: &Workspace, files: &[SourceFile]) {
    for file in files {
        let result = if workspace.store().exists(file) {
            workspace.add_build_file(file)
        } else {
            workspace.remove_build_file(file)
        };
        if let Err(e) = result {
            error!("Failed to update {}: {}", file, e);
        }
    }
}

pub async fn run(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(&path)?;
    let auto_build = session.workspace.config().auto_build;

    info!("Initial build of {}", session.root.display());
    session.build_all().await?;
    println!("{}", session.builder.build_log());

    let mut watcher = FsWatcher::new(&session.root)?;
    let mut states = session.builder.subscribe();
    states.borrow_and_update();

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    println!("Watching {}. Press Ctrl+C to stop.", session.root.display());
    let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = watcher.next_event_async() => {
                match event {
                    Some(event) => pending.extend(event.paths),
                    None => break,
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                if !states.borrow_and_update().is_running() {
                    println!("{}", session.builder.build_log());
                }
            }
            _ = tokio::time::sleep(DEBOUNCE), if !pending.is_empty() => {
                let files = changed_files(&session.store, &pending);
                pending.clear();
                if files.is_empty() {
                    continue;
                }
                debug!("Detected changes in {} files", files.len());
                let workspace = session.workspace.clone();
                tokio::task::spawn_blocking(move || apply_changes(&workspace, &files)).await?;
                if auto_build && session.builder.is_needs_build() {
                    session.builder.build_workspace()?;
                }
            }
        }
    }

    session.builder.stop_build();
    session.builder.wait_for_idle().await;
    info!("Stopped watching {}", session.root.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_changed_files_skip_hidden_and_foreign_paths() {
        let temp = tempfile::tempdir().unwrap();
        let store = DiskStore::new(temp.path());
        let paths = BTreeSet::from([
            temp.path().join("src/Foo.java"),
            temp.path().join(".git/index"),
            temp.path().join("src/.Foo.java.swp"),
            PathBuf::from("/elsewhere/Bar.java"),
        ]);
        assert_eq!(
            changed_files(&store, &paths),
            vec![SourceFile::new("/src/Foo.java")]
        );
    }

    #[test]
    fn test_apply_changes_queues_and_removes() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("Foo.java"), "class Foo {}").unwrap();

        let workspace = Workspace::new(Arc::new(DiskStore::new(temp.path())));
        let project = workspace.add_project(SourceFile::root()).unwrap();
        let foo = SourceFile::new("/src/Foo.java");

        apply_changes(&workspace, std::slice::from_ref(&foo));
        assert_eq!(project.builder.pending_files(), vec![foo.clone()]);

        std::fs::remove_file(src.join("Foo.java")).unwrap();
        apply_changes(&workspace, std::slice::from_ref(&foo));
        assert!(project.builder.pending_files().is_empty());
    }
}
