//! Runs build passes over a workspace, one at a time, on the blocking pool.
//!
//! A trigger while a pass is running does not start a second pass; it asks
//! the running one to go again once it is done.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::Workspace;
use crate::build::{BuildLog, PassState};
use crate::error::{KilnError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Running,
    Finished { success: bool },
    Failed(String),
}

impl BuildState {
    pub fn is_running(&self) -> bool {
        matches!(self, BuildState::Running)
    }
}

/// How a pass ended when no fatal error stopped it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Completed { success: bool },
    /// Stopped between files; the unbuilt files are still queued.
    Interrupted,
}

#[derive(Debug, Default)]
struct Control {
    running: bool,
    build_again: bool,
    add_all: bool,
    cancel: CancellationToken,
}

struct Inner {
    workspace: Arc<Workspace>,
    control: Mutex<Control>,
    state: watch::Sender<BuildState>,
    log: Arc<BuildLog>,
}

#[derive(Clone)]
pub struct WorkspaceBuilder {
    inner: Arc<Inner>,
}

impl WorkspaceBuilder {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        let (state, _) = watch::channel(BuildState::Idle);
        Self {
            inner: Arc::new(Inner {
                workspace,
                control: Mutex::new(Control::default()),
                state,
                log: Arc::new(BuildLog::new()),
            }),
        }
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.inner.workspace
    }

    /// Starts a pass, or asks the running pass to run again when it ends.
    /// Must be called from within a tokio runtime.
    pub fn build_workspace(&self) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| KilnError::Internal(format!("no async runtime: {e}")))?;
        {
            let mut control = self.inner.control.lock()?;
            if control.running {
                debug!("Pass already running, merging the request");
                control.build_again = true;
                return Ok(());
            }
            control.running = true;
            self.inner.state.send_replace(BuildState::Running);
        }
        handle.spawn(Self::run(self.inner.clone()));
        Ok(())
    }

    /// Triggers a pass and waits for the workspace to go idle.
    pub async fn build_and_wait(&self) -> Result<BuildState> {
        self.build_workspace()?;
        Ok(self.wait_for_idle().await)
    }

    /// Queues every file of every project at the start of the next pass.
    pub fn add_all_files_to_build(&self) {
        if let Ok(mut control) = self.inner.control.lock() {
            control.add_all = true;
        }
    }

    /// Asks the running pass to stop after its current file.
    pub fn interrupt(&self) {
        if let Ok(control) = self.inner.control.lock() {
            if control.running {
                info!("Interrupting build");
                control.cancel.cancel();
            }
        }
    }

    /// Interrupts the running pass and drops any merged request.
    pub fn stop_build(&self) {
        if let Ok(mut control) = self.inner.control.lock() {
            control.build_again = false;
            if control.running {
                info!("Stopping build");
                control.cancel.cancel();
            }
        }
    }

    pub fn is_building(&self) -> bool {
        self.inner.control.lock().map(|c| c.running).unwrap_or(false)
    }

    pub fn is_needs_build(&self) -> bool {
        let add_all = self.inner.control.lock().map(|c| c.add_all).unwrap_or(false);
        add_all || self.inner.workspace.is_needs_build()
    }

    pub fn state(&self) -> BuildState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BuildState> {
        self.inner.state.subscribe()
    }

    /// Waits until no pass is running and returns the state it left.
    pub async fn wait_for_idle(&self) -> BuildState {
        let mut rx = self.subscribe();
        match rx.wait_for(|s| !s.is_running()).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so this cannot close while we wait
            Err(_) => self.state(),
        }
    }

    /// Deletes every project's build output. A running pass is stopped
    /// first, and the next pass rebuilds everything.
    pub async fn clean_workspace(&self) -> Result<()> {
        self.stop_build();
        self.wait_for_idle().await;

        let workspace = self.inner.workspace.clone();
        tokio::task::spawn_blocking(move || workspace.clean_projects())
            .await
            .map_err(|e| KilnError::Internal(e.to_string()))??;

        self.add_all_files_to_build();
        self.inner
            .log
            .reset("Clean workspace - all build files removed");
        info!("Clean workspace - all build files removed");
        Ok(())
    }

    /// Text log of the last pass.
    pub fn build_log(&self) -> String {
        self.inner.log.text()
    }

    async fn run(inner: Arc<Inner>) {
        loop {
            let taken = inner
                .control
                .lock()
                .map(|mut control| {
                    control.build_again = false;
                    (control.cancel.clone(), std::mem::take(&mut control.add_all))
                })
                .map_err(KilnError::from);
            let result = match taken {
                Ok((cancel, add_all)) => {
                    let workspace = inner.workspace.clone();
                    let log = inner.log.clone();
                    tokio::task::spawn_blocking(move || run_pass(&workspace, cancel, add_all, log))
                        .await
                        .map_err(|e| KilnError::Internal(e.to_string()))
                        .and_then(|r| r)
                }
                Err(e) => Err(e),
            };

            let (state, fatal) = match result {
                Ok(PassOutcome::Completed { success }) => (BuildState::Finished { success }, false),
                Ok(PassOutcome::Interrupted) => (BuildState::Finished { success: false }, false),
                Err(e) => {
                    error!("Build failed: {}", e);
                    inner.log.push(format!("Build Failed - {e}"));
                    (BuildState::Failed(e.to_string()), e.is_fatal())
                }
            };
            if !Self::finish_pass(&inner, state, fatal) {
                return;
            }
            debug!("Running merged build request");
        }
    }

    /// Records the end of a pass. Returns true when a merged request means
    /// another pass must run; otherwise publishes `state` and goes idle.
    /// A fatal pass never runs the merged request.
    fn finish_pass(inner: &Inner, state: BuildState, fatal: bool) -> bool {
        let Ok(mut control) = inner.control.lock() else {
            inner
                .state
                .send_replace(BuildState::Failed("build control poisoned".into()));
            return false;
        };
        // An interrupt applies to the pass that just ended
        control.cancel = CancellationToken::new();
        if control.build_again && !fatal {
            return true;
        }
        control.running = false;
        control.build_again = false;
        inner.state.send_replace(state);
        false
    }
}

fn run_pass(
    workspace: &Workspace,
    cancel: CancellationToken,
    add_all: bool,
    log: Arc<BuildLog>,
) -> Result<PassOutcome> {
    if add_all {
        workspace.add_all_files_to_build()?;
    }
    if !workspace.is_needs_build() {
        return Ok(PassOutcome::Completed {
            success: workspace.ledger().error_count() == 0,
        });
    }

    let date = chrono::Local::now().format("%b %d, %H:%M:%S");
    log.reset(format!("Build Started - {date}"));
    info!("Build started");
    let started = Instant::now();

    let pass = PassState::new(cancel, workspace.config().max_issues_per_pass, log.clone());
    let success = workspace.build_projects(&pass)?;
    let elapsed = format_seconds(started.elapsed().as_secs_f64());

    if success {
        log.push(format!("Build Completed ({elapsed} seconds)"));
        info!("Build completed in {} seconds", elapsed);
        return Ok(PassOutcome::Completed { success });
    }
    let errors = workspace.ledger().error_count();
    log.push(format!("Build Failed - {errors} error(s)"));
    info!("Build failed with {} errors after {} seconds", errors, elapsed);
    if pass.is_interrupted() {
        Ok(PassOutcome::Interrupted)
    } else {
        Ok(PassOutcome::Completed { success })
    }
}

/// Seconds with at most two decimals and no trailing zeros: `1.5`, `0.25`, `3`.
fn format_seconds(seconds: f64) -> String {
    let text = format!("{seconds:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

impl std::fmt::Debug for WorkspaceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceBuilder")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(1.5), "1.5");
        assert_eq!(format_seconds(0.254), "0.25");
        assert_eq!(format_seconds(3.0), "3");
        assert_eq!(format_seconds(0.0), "0");
    }
}
