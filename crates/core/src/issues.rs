//! The build issue ledger: every diagnostic of the workspace, sorted,
//! deduplicated and indexed per file.
//!
//! Only the build worker writes to the ledger; readers get copies, so a
//! reader never observes a half-applied change.

use std::collections::HashMap;
use std::sync::RwLock;

use kiln_api::{BuildIssue, IssueKind, SourceFile};

use crate::error::Result;

#[derive(Debug, Default)]
struct LedgerState {
    /// Sorted by `BuildIssue`'s total order, no duplicates.
    issues: Vec<BuildIssue>,
    by_file: HashMap<SourceFile, Vec<BuildIssue>>,
    error_count: usize,
    warning_count: usize,
    note_count: usize,
}

impl LedgerState {
    fn insert(&mut self, issue: BuildIssue) -> bool {
        let Err(pos) = self.issues.binary_search(&issue) else {
            return false;
        };
        let per_file = self.by_file.entry(issue.file.clone()).or_default();
        if let Err(file_pos) = per_file.binary_search(&issue) {
            per_file.insert(file_pos, issue.clone());
        }
        self.bump(issue.kind, true);
        self.issues.insert(pos, issue);
        true
    }

    fn remove(&mut self, issue: &BuildIssue) -> bool {
        let Ok(pos) = self.issues.binary_search(issue) else {
            return false;
        };
        self.issues.remove(pos);
        if let Some(per_file) = self.by_file.get_mut(&issue.file) {
            if let Ok(file_pos) = per_file.binary_search(issue) {
                per_file.remove(file_pos);
            }
            if per_file.is_empty() {
                self.by_file.remove(&issue.file);
            }
        }
        self.bump(issue.kind, false);
        true
    }

    fn remove_file(&mut self, file: &SourceFile) -> Vec<BuildIssue> {
        let Some(removed) = self.by_file.remove(file) else {
            return Vec::new();
        };
        self.issues.retain(|i| &i.file != file);
        for issue in &removed {
            self.bump(issue.kind, false);
        }
        removed
    }

    fn bump(&mut self, kind: IssueKind, up: bool) {
        let counter = match kind {
            IssueKind::Error => &mut self.error_count,
            IssueKind::Warning => &mut self.warning_count,
            IssueKind::Note => &mut self.note_count,
        };
        if up {
            *counter += 1;
        } else {
            *counter = counter.saturating_sub(1);
        }
    }
}

#[derive(Debug, Default)]
pub struct IssueLedger {
    state: RwLock<LedgerState>,
}

impl IssueLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `issue` at its sorted position. Returns false for a duplicate.
    pub fn add(&self, issue: BuildIssue) -> Result<bool> {
        Ok(self.state.write()?.insert(issue))
    }

    pub fn add_all(&self, issues: impl IntoIterator<Item = BuildIssue>) -> Result<usize> {
        let mut state = self.state.write()?;
        Ok(issues.into_iter().filter(|i| state.insert(i.clone())).count())
    }

    pub fn remove(&self, issue: &BuildIssue) -> Result<bool> {
        Ok(self.state.write()?.remove(issue))
    }

    /// Drops every issue of `file` and returns them.
    pub fn remove_issues_for_file(&self, file: &SourceFile) -> Result<Vec<BuildIssue>> {
        Ok(self.state.write()?.remove_file(file))
    }

    /// Swaps the issue set of `file` for `issues` in one step.
    pub fn replace_issues_for_file(
        &self,
        file: &SourceFile,
        issues: impl IntoIterator<Item = BuildIssue>,
    ) -> Result<()> {
        let mut state = self.state.write()?;
        state.remove_file(file);
        for issue in issues {
            state.insert(issue);
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        *self.state.write()? = LedgerState::default();
        Ok(())
    }

    /// Snapshot of all issues in order.
    pub fn issues(&self) -> Result<Vec<BuildIssue>> {
        Ok(self.state.read()?.issues.clone())
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.issues.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn error_count(&self) -> usize {
        self.state.read().map(|s| s.error_count).unwrap_or(0)
    }

    pub fn warning_count(&self) -> usize {
        self.state.read().map(|s| s.warning_count).unwrap_or(0)
    }

    pub fn note_count(&self) -> usize {
        self.state.read().map(|s| s.note_count).unwrap_or(0)
    }

    pub fn has_errors_for_file(&self, file: &SourceFile) -> bool {
        self.state
            .read()
            .map(|s| {
                s.by_file
                    .get(file)
                    .is_some_and(|issues| issues.iter().any(BuildIssue::is_error))
            })
            .unwrap_or(false)
    }

    /// Issues of `file`, or of every file beneath it when it is a directory.
    pub fn issues_for_file(&self, file: &SourceFile) -> Result<Vec<BuildIssue>> {
        let state = self.state.read()?;
        if let Some(issues) = state.by_file.get(file) {
            return Ok(issues.clone());
        }
        let mut issues: Vec<BuildIssue> = state
            .by_file
            .iter()
            .filter(|(f, _)| f.starts_with(file))
            .flat_map(|(_, issues)| issues.iter().cloned())
            .collect();
        issues.sort();
        Ok(issues)
    }

    /// Worst issue kind of `file`, or of the files beneath it.
    ///
    /// A package directory reports only its own entries: issues in nested
    /// package directories do not bubble up into it.
    pub fn build_status_for_file(
        &self,
        file: &SourceFile,
        is_package_dir: impl Fn(&SourceFile) -> bool,
    ) -> Result<Option<IssueKind>> {
        let state = self.state.read()?;
        if let Some(issues) = state.by_file.get(file) {
            return Ok(issues.iter().map(|i| i.kind).min());
        }
        let is_package = is_package_dir(file);
        let mut worst: Option<IssueKind> = None;
        for (path, issues) in &state.by_file {
            let Some(relative) = path.relative_to(file) else {
                continue;
            };
            if is_package {
                if let Some((first, _)) = relative.split_once('/') {
                    if is_package_dir(&file.join(first)) {
                        continue;
                    }
                }
            }
            for issue in issues {
                worst = Some(match worst {
                    Some(w) => w.worst(issue.kind),
                    None => issue.kind,
                });
            }
            if worst == Some(IssueKind::Error) {
                break;
            }
        }
        Ok(worst)
    }
}
