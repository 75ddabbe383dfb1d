use kiln_api::{BuildIssue, IssueKind, SourceFile};
use tracing::{debug, info, warn};

use super::Project;
use crate::build::{
    BuildContext, CompileBuilder, FileBuilder, PassState, ResourceBuilder, StructuralBuilder,
};
use crate::config::BuildStrategy;
use crate::error::{KilnError, Result};

/// Routes the files of one project to its builders and runs them.
///
/// Builders are asked in order; the first that accepts a file owns it.
pub struct ProjectBuilder {
    builders: Vec<Box<dyn FileBuilder>>,
}

impl ProjectBuilder {
    pub fn new(builders: Vec<Box<dyn FileBuilder>>) -> Self {
        Self { builders }
    }

    pub fn for_strategy(strategy: BuildStrategy) -> Self {
        let primary: Box<dyn FileBuilder> = match strategy {
            BuildStrategy::Compile => Box::new(CompileBuilder::new()),
            BuildStrategy::Structural => Box::new(StructuralBuilder::new()),
        };
        Self::new(vec![primary, Box::new(ResourceBuilder::new())])
    }

    pub fn builders(&self) -> impl Iterator<Item = &dyn FileBuilder> {
        self.builders.iter().map(|b| b.as_ref())
    }

    /// The builder responsible for `file`. Files outside the source tree or
    /// already inside the build tree have none.
    pub fn file_builder(&self, project: &Project, file: &SourceFile) -> Option<&dyn FileBuilder> {
        if !file.starts_with(&project.source_dir) || file == &project.source_dir {
            return None;
        }
        if project.is_in_build_dir(file) || file == &project.settings_file {
            return None;
        }
        self.builders().find(|builder| builder.accepts(project, file))
    }

    /// Queues `file`, or every file below it when it is a directory, if it
    /// needs building. `force` queues regardless.
    pub fn add_build_file(
        &self,
        ctx: &BuildContext<'_>,
        file: &SourceFile,
        force: bool,
    ) -> Result<()> {
        if file.is_hidden() || ctx.workspace.config().is_ignored(file) {
            return Ok(());
        }
        let store = ctx.store();
        if !store.exists(file) {
            return Ok(());
        }
        if store.is_dir(file) {
            if ctx.project.is_in_build_dir(file) {
                return Ok(());
            }
            for child in store.list_children(file)? {
                self.add_build_file(ctx, &child, force)?;
            }
            return Ok(());
        }
        let Some(builder) = self.file_builder(ctx.project, file) else {
            return Ok(());
        };
        if force || builder.needs_build(ctx, file)? {
            debug!("Queueing {} for {}", file, builder.name());
            builder.enqueue(file.clone());
        }
        Ok(())
    }

    pub fn add_build_file_force(&self, ctx: &BuildContext<'_>, file: &SourceFile) {
        if let Some(builder) = self.file_builder(ctx.project, file) {
            builder.enqueue(file.clone());
        }
    }

    /// Queues every file of the source tree.
    pub fn add_build_files_all(&self, ctx: &BuildContext<'_>) -> Result<()> {
        self.add_build_file(ctx, &ctx.project.source_dir, true)
    }

    pub fn remove_build_file(&self, ctx: &BuildContext<'_>, file: &SourceFile) -> Result<()> {
        match self.file_builder(ctx.project, file) {
            Some(builder) => builder.remove_build_file(ctx, file),
            None => Ok(()),
        }
    }

    pub fn is_needs_build(&self) -> bool {
        self.builders.iter().any(|b| b.has_pending())
    }

    /// Files waiting in any builder of this project.
    pub fn pending_files(&self) -> Vec<SourceFile> {
        let mut files: Vec<SourceFile> = self
            .builders
            .iter()
            .flat_map(|b| b.queue().files())
            .collect();
        files.sort();
        files.dedup();
        files
    }

    /// Runs every builder once. The primary builder and the resource builder
    /// both run even if the first fails; success needs both.
    pub fn build_project(&self, ctx: &BuildContext<'_>, pass: &PassState) -> Result<bool> {
        if !self.check_build_dependencies(ctx)? {
            return Ok(false);
        }
        let mut success = true;
        for builder in &self.builders {
            if !builder.has_pending() {
                continue;
            }
            debug!("Running {} builder of {}", builder.name(), ctx.project.name);
            success &= builder.build(ctx, pass)?;
        }
        Ok(success)
    }

    /// Every project named in `Dependencies` must be part of the workspace.
    /// A missing one is reported on the settings file and fails the build.
    fn check_build_dependencies(&self, ctx: &BuildContext<'_>) -> Result<bool> {
        let project = ctx.project;
        let missing: Vec<BuildIssue> = project
            .settings
            .dependencies
            .iter()
            .filter(|name| ctx.workspace.project(name).is_none())
            .map(|name| {
                BuildIssue::new(
                    project.settings_file.clone(),
                    IssueKind::Error,
                    format!("Dependency project not found: {name}"),
                )
            })
            .collect();
        let found = missing.is_empty();
        if !found {
            warn!("Project {} has {} missing dependencies", project.name, missing.len());
        }
        ctx.ledger().replace_issues_for_file(&project.settings_file, missing)?;
        Ok(found)
    }

    /// Removes what the builders produced. A separate build tree is deleted
    /// outright; a build tree shared with sources loses only its artifacts.
    pub fn clean_project(&self, ctx: &BuildContext<'_>) -> Result<()> {
        let project = ctx.project;
        let store = ctx.store();
        if project.has_separate_build_dir() {
            info!("Deleting {}", project.build_dir);
            if store.exists(&project.build_dir) {
                store
                    .delete(&project.build_dir)
                    .map_err(|source| KilnError::StaleArtifact {
                        path: project.build_dir.path().to_string(),
                        source,
                    })?;
            }
        } else {
            info!("Deleting artifacts in {}", project.build_dir);
            remove_artifacts(ctx, &project.build_dir)?;
        }
        Ok(())
    }
}

fn remove_artifacts(ctx: &BuildContext<'_>, dir: &SourceFile) -> Result<()> {
    let store = ctx.store();
    for file in store.list_children(dir)?.into_iter().rev() {
        if file.extension() == Some("class") {
            store.delete(&file).map_err(|source| KilnError::StaleArtifact {
                path: file.path().to_string(),
                source,
            })?;
        } else if store.is_dir(&file) {
            remove_artifacts(ctx, &file)?;
        }
    }
    Ok(())
}

impl std::fmt::Debug for ProjectBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.builders.iter().map(|b| b.name()).collect();
        f.debug_struct("ProjectBuilder").field("builders", &names).finish()
    }
}
