//! Per-file build strategies and the state shared by one build pass.

pub mod compile;
pub mod queue;
pub mod resource;
pub mod structural;

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use kiln_api::{FileStore, SourceFile};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::Result;
use crate::issues::IssueLedger;
use crate::project::Project;
use crate::workspace::Workspace;

pub use compile::CompileBuilder;
pub use queue::BuildQueue;
pub use resource::ResourceBuilder;
pub use structural::StructuralBuilder;

/// The workspace and project a builder is working for.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub workspace: &'a Workspace,
    pub project: &'a Project,
}

impl<'a> BuildContext<'a> {
    pub fn new(workspace: &'a Workspace, project: &'a Project) -> Self {
        Self { workspace, project }
    }

    pub fn store(&self) -> &'a dyn FileStore {
        self.workspace.store()
    }

    pub fn ledger(&self) -> &'a IssueLedger {
        self.workspace.ledger()
    }
}

/// A strategy for one kind of file. A project asks its builders in order and
/// routes each file to the first that accepts it.
pub trait FileBuilder: Send + Sync {
    fn name(&self) -> &'static str;

    fn accepts(&self, project: &Project, file: &SourceFile) -> bool;

    fn needs_build(&self, ctx: &BuildContext<'_>, file: &SourceFile) -> Result<bool>;

    fn queue(&self) -> &BuildQueue;

    fn enqueue(&self, file: SourceFile) {
        self.queue().enqueue(file);
    }

    fn has_pending(&self) -> bool {
        !self.queue().is_empty()
    }

    /// Builds the pending files. Returns false if any file failed or the pass
    /// was interrupted; unbuilt files stay pending either way.
    fn build(&self, ctx: &BuildContext<'_>, pass: &PassState) -> Result<bool>;

    /// Forgets a deleted file and removes what was built from it.
    fn remove_build_file(&self, ctx: &BuildContext<'_>, file: &SourceFile) -> Result<()>;
}

/// Text log of a pass, readable while the pass runs.
#[derive(Debug, Default)]
pub struct BuildLog {
    lines: Mutex<Vec<String>>,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.into());
        }
    }

    pub fn reset(&self, first_line: impl Into<String>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
            lines.push(first_line.into());
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn text(&self) -> String {
        self.lines().join("\n")
    }
}

/// State of one running pass: its interrupt token, the issue ceiling and
/// the log.
#[derive(Debug)]
pub struct PassState {
    cancel: CancellationToken,
    max_issues: usize,
    issues_reported: AtomicUsize,
    log: std::sync::Arc<BuildLog>,
}

impl PassState {
    pub fn new(
        cancel: CancellationToken,
        max_issues: usize,
        log: std::sync::Arc<BuildLog>,
    ) -> Self {
        Self {
            cancel,
            max_issues,
            issues_reported: AtomicUsize::new(0),
            log,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn interrupt(&self) {
        self.cancel.cancel();
    }

    /// Counts issues reported in this pass. Once the total reaches the
    /// ceiling the pass is interrupted and true is returned.
    pub fn record_issues(&self, count: usize) -> bool {
        let total = self.issues_reported.fetch_add(count, Ordering::SeqCst) + count;
        if total >= self.max_issues {
            if !self.is_interrupted() {
                info!("{} issues reported, stopping the pass", total);
            }
            self.interrupt();
            return true;
        }
        false
    }

    pub fn issues_reported(&self) -> usize {
        self.issues_reported.load(Ordering::SeqCst)
    }

    pub fn log(&self, line: impl Into<String>) {
        self.log.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_issue_ceiling_interrupts() {
        let pass = PassState::new(CancellationToken::new(), 10, Arc::new(BuildLog::new()));
        assert!(!pass.record_issues(9));
        assert!(!pass.is_interrupted());
        assert!(pass.record_issues(1));
        assert!(pass.is_interrupted());
        assert_eq!(pass.issues_reported(), 10);
    }

    #[test]
    fn test_build_log() {
        let log = BuildLog::new();
        log.reset("Build Started");
        log.push("Compiling A (1 of 1)");
        assert_eq!(log.text(), "Build Started\nCompiling A (1 of 1)");
        log.reset("again");
        assert_eq!(log.lines(), vec!["again"]);
    }
}
