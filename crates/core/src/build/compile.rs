use std::collections::{BTreeSet, HashSet, VecDeque};

use kiln_api::{
    BuildIssue, CompileOutcome, CompileRequest, Diagnostic, IssueKind, Severity, SourceFile,
};
use tracing::{debug, info, warn};

use super::{BuildContext, BuildQueue, FileBuilder, PassState};
use crate::error::{KilnError, Result};
use crate::project::Project;

/// Builds `.java` sources with the workspace compiler and keeps the
/// dependency graph current from the artifacts it writes.
#[derive(Debug, Default)]
pub struct CompileBuilder {
    queue: BuildQueue,
}

impl CompileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes nested artifacts left over from inner types that no longer
    /// exist: any artifact of `file` older than the source itself.
    fn delete_zombie_artifacts(&self, ctx: &BuildContext<'_>, file: &SourceFile) -> Result<()> {
        let store = ctx.store();
        let source_time = store.last_modified(file)?;
        for artifact in ctx.project.class_files_for_source(store, file)? {
            if store.last_modified(&artifact)? < source_time {
                debug!("Deleting stale artifact {}", artifact);
                delete_artifact(ctx, &artifact)?;
            }
        }
        Ok(())
    }

    fn report_unused_imports(
        &self,
        ctx: &BuildContext<'_>,
        compiled: &BTreeSet<SourceFile>,
        failed: &HashSet<SourceFile>,
    ) -> Result<()> {
        let Some(checker) = ctx.workspace.syntax_checker() else {
            return Ok(());
        };
        let store = ctx.store();
        for file in compiled.iter().filter(|f| !failed.contains(*f)) {
            if ctx.ledger().has_errors_for_file(file) || !store.exists(file) {
                continue;
            }
            let text = match store.read_text(file) {
                Ok(text) => text,
                Err(e) => {
                    debug!("Skipping import check of {}: {}", file, e);
                    continue;
                }
            };
            ctx.ledger().add_all(checker.unused_imports(file, &text))?;
        }
        Ok(())
    }
}

impl FileBuilder for CompileBuilder {
    fn name(&self) -> &'static str {
        "compile"
    }

    fn accepts(&self, project: &Project, file: &SourceFile) -> bool {
        file.extension() == Some("java") && file.starts_with(&project.source_dir)
    }

    fn needs_build(&self, ctx: &BuildContext<'_>, file: &SourceFile) -> Result<bool> {
        let store = ctx.store();
        let Some(class_file) = ctx.project.class_file_for_source(file) else {
            return Ok(false);
        };
        if !store.exists(&class_file)
            || store.last_modified(&class_file)? < store.last_modified(file)?
        {
            return Ok(true);
        }
        // Up to date, but this session has never read its references
        if !ctx.workspace.is_dependencies_set(file)? {
            ctx.workspace.update_dependencies(file)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn queue(&self) -> &BuildQueue {
        &self.queue
    }

    fn build(&self, ctx: &BuildContext<'_>, pass: &PassState) -> Result<bool> {
        if self.queue.is_empty() {
            return Ok(true);
        }
        let compiler = ctx.workspace.compiler().ok_or_else(|| {
            KilnError::Config(format!("project {} has no compiler", ctx.project.name))
        })?;
        let store = ctx.store();
        let project = ctx.project;
        let class_path = ctx.workspace.class_path_for(project);

        let mut worklist: VecDeque<(SourceFile, u64)> = self.queue.snapshot().into();
        let mut total = worklist.len();
        let mut listed: HashSet<SourceFile> = worklist.iter().map(|(f, _)| f.clone()).collect();
        let mut compiled: BTreeSet<SourceFile> = BTreeSet::new();
        let mut failed: HashSet<SourceFile> = HashSet::new();
        let mut success = true;

        while let Some((file, generation)) = worklist.pop_front() {
            // Everything still in the worklist is still queued
            if pass.is_interrupted() {
                info!("Build of {} interrupted, {} files left", project.name, worklist.len() + 1);
                return Ok(false);
            }
            if compiled.contains(&file) {
                self.queue.complete(&file, generation);
                continue;
            }
            if !store.exists(&file) {
                debug!("Dropping deleted file {} from the queue", file);
                self.queue.complete(&file, generation);
                continue;
            }

            let class_name = project
                .class_name_for_file(&file)
                .unwrap_or_else(|| file.path().to_string());
            let message = format!("Compiling {} ({} of {})", class_name, compiled.len() + 1, total);
            info!("{}", message);
            pass.log(message);

            let mut diagnostics: Vec<Diagnostic> = Vec::new();
            let request = CompileRequest {
                file: &file,
                source_dir: &project.source_dir,
                output_dir: &project.build_dir,
                class_path: &class_path,
                release: project.settings.compile_release.as_deref(),
            };
            let outcome = match compiler.compile(request, &mut diagnostics) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Compiler failed on {}: {}", file, e);
                    diagnostics.push(Diagnostic {
                        file: file.clone(),
                        severity: Severity::Error,
                        message: format!("Compiler failure: {e}"),
                        line: None,
                        column: None,
                        start: None,
                        end: None,
                    });
                    CompileOutcome::failed(&file)
                }
            };

            // The compiler just read these files; their old issues are stale
            let mut touched = outcome.compiled.clone();
            touched.insert(file.clone());
            for source in &touched {
                ctx.ledger().remove_issues_for_file(source)?;
            }
            let issues: Vec<BuildIssue> =
                diagnostics.iter().filter_map(issue_from_diagnostic).collect();
            let reported = issues.len();
            ctx.ledger().add_all(issues)?;
            pass.record_issues(reported);

            if !outcome.success {
                compiled.insert(file.clone());
                failed.insert(file.clone());
                // Left queued for the next pass
                success = false;
                continue;
            }

            self.queue.complete(&file, generation);
            compiled.insert(file.clone());
            compiled.extend(outcome.compiled.iter().cloned());

            for modified in &outcome.modified {
                let owner = ctx.workspace.project_for_file(modified);
                let owner_ctx = match owner.as_deref() {
                    Some(p) => BuildContext::new(ctx.workspace, p),
                    None => *ctx,
                };
                self.delete_zombie_artifacts(&owner_ctx, modified)?;
                if !ctx.workspace.update_dependencies(modified)? {
                    continue;
                }
                for dependent in ctx.workspace.dependents(modified)? {
                    let same_project = ctx
                        .workspace
                        .project_for_file(&dependent)
                        .is_some_and(|p| p.name == project.name);
                    if same_project {
                        if compiled.contains(&dependent) || listed.contains(&dependent) {
                            continue;
                        }
                        debug!("{} changed, rebuilding {}", modified, dependent);
                        self.queue.enqueue(dependent.clone());
                        let generation = self.queue.generation_of(&dependent).unwrap_or_default();
                        listed.insert(dependent.clone());
                        worklist.push_back((dependent, generation));
                        total += 1;
                    } else {
                        debug!("{} changed, queueing {} in its project", modified, dependent);
                        ctx.workspace.add_build_file_force(&dependent)?;
                    }
                }
            }
        }

        self.report_unused_imports(ctx, &compiled, &failed)?;
        Ok(success)
    }

    fn remove_build_file(&self, ctx: &BuildContext<'_>, file: &SourceFile) -> Result<()> {
        self.queue.remove(file);

        let store = ctx.store();
        for dependent in ctx.workspace.dependents(file)? {
            if store.exists(&dependent) {
                ctx.workspace.add_build_file_force(&dependent)?;
            }
        }
        ctx.workspace.remove_dependencies(file)?;

        for artifact in ctx.project.class_files_for_source(store, file)? {
            delete_artifact(ctx, &artifact)?;
        }
        ctx.ledger().remove_issues_for_file(file)?;
        Ok(())
    }
}

fn delete_artifact(ctx: &BuildContext<'_>, artifact: &SourceFile) -> Result<()> {
    ctx.store()
        .delete(artifact)
        .map_err(|source| KilnError::StaleArtifact {
            path: artifact.path().to_string(),
            source,
        })
}

/// Turns a compiler diagnostic into a ledger issue, or `None` for noise the
/// compiler emits without a useful location.
pub fn issue_from_diagnostic(diagnostic: &Diagnostic) -> Option<BuildIssue> {
    let kind = match diagnostic.severity {
        Severity::Error => IssueKind::Error,
        Severity::Warning | Severity::MandatoryWarning => IssueKind::Warning,
        Severity::Note | Severity::Other => IssueKind::Note,
    };
    let mut message = diagnostic.message.as_str();
    if let Some(loc) = message.find("location:") {
        if loc > 0 {
            message = message[..loc].trim();
        }
    }
    if diagnostic.line.is_none() && message.contains("unchecked") {
        return None;
    }
    if message.find("overrides equals, but").is_some_and(|i| i > 0) {
        return None;
    }

    let line = diagnostic.line.unwrap_or(1).saturating_sub(1);
    let column = diagnostic.column.unwrap_or(1).saturating_sub(1);
    let start = diagnostic.start.unwrap_or(0);
    let end = diagnostic.end.unwrap_or(start);
    Some(
        BuildIssue::new(diagnostic.file.clone(), kind, message)
            .at(line, column)
            .with_range(start, end),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic(severity: Severity, message: &str, line: Option<u32>) -> Diagnostic {
        Diagnostic {
            file: SourceFile::new("/p/src/Foo.java"),
            severity,
            message: message.to_string(),
            line,
            column: Some(5),
            start: Some(40),
            end: Some(44),
        }
    }

    #[test]
    fn test_positions_become_zero_based() {
        let issue = issue_from_diagnostic(&diagnostic(Severity::Error, "cannot find symbol", Some(3)))
            .unwrap();
        assert_eq!(issue.kind, IssueKind::Error);
        assert_eq!((issue.line, issue.column), (2, 4));
        assert_eq!((issue.start, issue.end), (40, 44));
    }

    #[test]
    fn test_location_suffix_is_trimmed() {
        let issue = issue_from_diagnostic(&diagnostic(
            Severity::MandatoryWarning,
            "cannot find symbol\n  symbol: class Qux\n  location: class Foo",
            Some(1),
        ))
        .unwrap();
        assert_eq!(issue.kind, IssueKind::Warning);
        assert_eq!(issue.message, "cannot find symbol\n  symbol: class Qux");
    }

    #[test]
    fn test_noise_is_dropped() {
        assert!(issue_from_diagnostic(&diagnostic(Severity::Note, "uses unchecked operations", None)).is_none());
        assert!(
            issue_from_diagnostic(&diagnostic(
                Severity::Warning,
                "Foo overrides equals, but not hashCode",
                Some(1)
            ))
            .is_none()
        );
        let kept = issue_from_diagnostic(&diagnostic(Severity::Other, "note", None)).unwrap();
        assert_eq!(kept.kind, IssueKind::Note);
        assert_eq!(kept.line, 0);
    }
}
