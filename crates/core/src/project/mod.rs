//! Projects: a root directory with a source tree, a build tree and the
//! builders that turn one into the other.

pub mod builder;
mod files;

use kiln_api::{FileStore, SourceFile};
use tracing::debug;

use crate::config::{ProjectSettings, WorkspaceConfig};
use crate::error::Result;

pub use builder::ProjectBuilder;

pub struct Project {
    pub name: String,
    pub root: SourceFile,
    pub settings: ProjectSettings,
    pub source_dir: SourceFile,
    pub build_dir: SourceFile,
    pub settings_file: SourceFile,
    pub builder: ProjectBuilder,
}

impl Project {
    /// Opens the project rooted at `root`, reading its settings file if present.
    pub fn open(store: &dyn FileStore, root: SourceFile, config: &WorkspaceConfig) -> Result<Self> {
        let settings_file = root.join(&config.settings_file_name);
        let settings = ProjectSettings::load(store, &settings_file)?;
        Ok(Self::with_settings(root, settings, config))
    }

    pub fn with_settings(root: SourceFile, settings: ProjectSettings, config: &WorkspaceConfig) -> Self {
        let name = if root.is_root() {
            "root".to_string()
        } else {
            root.name().to_string()
        };
        let source_dir = root.join(&settings.source_path);
        let build_dir = root.join(&settings.build_path);
        let settings_file = root.join(&config.settings_file_name);
        let builder = ProjectBuilder::for_strategy(settings.strategy);
        debug!(
            "Project {} at {}: sources {}, output {}",
            name, root, source_dir, build_dir
        );
        Self {
            name,
            root,
            settings,
            source_dir,
            build_dir,
            settings_file,
            builder,
        }
    }

    /// Whether `file` belongs to this project's tree.
    pub fn contains(&self, file: &SourceFile) -> bool {
        file.starts_with(&self.root)
    }

    /// False when the build tree contains the source tree, e.g. a build
    /// path of `.` or one equal to the source path.
    pub fn has_separate_build_dir(&self) -> bool {
        !self.source_dir.starts_with(&self.build_dir)
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("source_dir", &self.source_dir)
            .field("build_dir", &self.build_dir)
            .finish()
    }
}
