use kiln_api::{BuildIssue, IssueKind, SourceFile};
use tracing::{debug, info};

use super::{BuildContext, BuildQueue, FileBuilder, PassState};
use crate::error::{KilnError, Result};
use crate::project::Project;

/// Checks `.java` sources for syntax errors only. Nothing is compiled and no
/// artifacts are written, so every queued file is always rechecked.
#[derive(Debug, Default)]
pub struct StructuralBuilder {
    queue: BuildQueue,
}

impl StructuralBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileBuilder for StructuralBuilder {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn accepts(&self, project: &Project, file: &SourceFile) -> bool {
        file.extension() == Some("java") && file.starts_with(&project.source_dir)
    }

    fn needs_build(&self, _ctx: &BuildContext<'_>, _file: &SourceFile) -> Result<bool> {
        Ok(true)
    }

    fn queue(&self) -> &BuildQueue {
        &self.queue
    }

    fn build(&self, ctx: &BuildContext<'_>, pass: &PassState) -> Result<bool> {
        if self.queue.is_empty() {
            return Ok(true);
        }
        let checker = ctx.workspace.syntax_checker().ok_or_else(|| {
            KilnError::Config(format!("project {} has no syntax checker", ctx.project.name))
        })?;
        let store = ctx.store();
        let pending = self.queue.snapshot();
        let total = pending.len();
        let mut success = true;

        for (index, (file, generation)) in pending.into_iter().enumerate() {
            if pass.is_interrupted() {
                info!("Check of {} interrupted", ctx.project.name);
                return Ok(false);
            }
            if !store.exists(&file) {
                self.queue.complete(&file, generation);
                continue;
            }
            let class_name = ctx
                .project
                .class_name_for_file(&file)
                .unwrap_or_else(|| file.path().to_string());
            pass.log(format!("Checking {} ({} of {})", class_name, index + 1, total));

            let issues = match store.read_text(&file) {
                Ok(text) => checker.structural_errors(&file, &text),
                Err(e) => {
                    debug!("Cannot read {}: {}", file, e);
                    vec![BuildIssue::new(
                        file.clone(),
                        IssueKind::Error,
                        format!("Cannot read file: {e}"),
                    )]
                }
            };
            let has_errors = issues.iter().any(BuildIssue::is_error);
            pass.record_issues(issues.len());
            ctx.ledger().replace_issues_for_file(&file, issues)?;

            self.queue.complete(&file, generation);
            if has_errors {
                success = false;
            }
        }
        Ok(success)
    }

    fn remove_build_file(&self, ctx: &BuildContext<'_>, file: &SourceFile) -> Result<()> {
        self.queue.remove(file);
        ctx.ledger().remove_issues_for_file(file)?;
        Ok(())
    }
}
