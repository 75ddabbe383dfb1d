use kiln_api::{BuildIssue, IssueKind, SourceFile};
use tracing::{debug, warn};

use super::{BuildContext, BuildQueue, FileBuilder, PassState};
use crate::error::{KilnError, Result};
use crate::project::Project;

/// Copies non-source files of the source directory into the build
/// directory, mirroring the directory structure.
#[derive(Debug, Default)]
pub struct ResourceBuilder {
    queue: BuildQueue,
}

impl ResourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileBuilder for ResourceBuilder {
    fn name(&self) -> &'static str {
        "resource"
    }

    fn accepts(&self, project: &Project, file: &SourceFile) -> bool {
        file != &project.settings_file
            && file.extension() != Some("class")
            && file.starts_with(&project.source_dir)
    }

    fn needs_build(&self, ctx: &BuildContext<'_>, file: &SourceFile) -> Result<bool> {
        let Some(mirror) = ctx.project.mirror_for_resource(file) else {
            return Ok(false);
        };
        if &mirror == file {
            return Ok(false);
        }
        let store = ctx.store();
        Ok(!store.exists(&mirror) || store.last_modified(&mirror)? < store.last_modified(file)?)
    }

    fn queue(&self) -> &BuildQueue {
        &self.queue
    }

    fn build(&self, ctx: &BuildContext<'_>, pass: &PassState) -> Result<bool> {
        let store = ctx.store();
        let mut success = true;
        for (file, generation) in self.queue.snapshot() {
            if pass.is_interrupted() {
                return Ok(false);
            }
            let mirror = match ctx.project.mirror_for_resource(&file) {
                Some(mirror) if mirror != file && store.exists(&file) => mirror,
                _ => {
                    self.queue.complete(&file, generation);
                    continue;
                }
            };
            let copied = store
                .read_bytes(&file)
                .and_then(|bytes| store.write_bytes(&mirror, &bytes));
            match copied {
                Ok(()) => {
                    debug!("Copied {} to {}", file, mirror);
                    ctx.ledger().remove_issues_for_file(&file)?;
                    self.queue.complete(&file, generation);
                }
                Err(e) => {
                    warn!("Cannot copy {}: {}", file, e);
                    let issue = BuildIssue::new(
                        file.clone(),
                        IssueKind::Error,
                        format!("Cannot copy resource to {mirror}: {e}"),
                    );
                    ctx.ledger().replace_issues_for_file(&file, [issue])?;
                    pass.record_issues(1);
                    success = false;
                }
            }
        }
        Ok(success)
    }

    fn remove_build_file(&self, ctx: &BuildContext<'_>, file: &SourceFile) -> Result<()> {
        self.queue.remove(file);
        ctx.ledger().remove_issues_for_file(file)?;
        let Some(mirror) = ctx.project.mirror_for_resource(file) else {
            return Ok(());
        };
        if &mirror == file {
            return Ok(());
        }
        ctx.store()
            .delete(&mirror)
            .map_err(|source| KilnError::StaleArtifact {
                path: mirror.path().to_string(),
                source,
            })
    }
}
