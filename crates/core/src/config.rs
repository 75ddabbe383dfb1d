use kiln_api::{FileStore, SourceFile};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KilnError, Result};

pub const SETTINGS_FILE_NAME: &str = "build.kiln";
pub const WORKSPACE_CONFIG_FILE_NAME: &str = "kiln.json";
pub const DEFAULT_MAX_ISSUES_PER_PASS: usize = 1000;

/// How primary sources of a project are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStrategy {
    /// Run the compiler and track dependencies from its artifacts.
    #[default]
    Compile,
    /// Only report structural (syntax) errors; no artifacts are produced.
    Structural,
}

/// Per-project settings stored as JSON in the project's `build.kiln`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProjectSettings {
    pub source_path: String,
    pub build_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_release: Option<String>,
    pub strategy: BuildStrategy,
    /// Names of projects whose outputs this project compiles against.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            source_path: "src".to_string(),
            build_path: "bin".to_string(),
            compile_release: None,
            strategy: BuildStrategy::Compile,
            dependencies: Vec::new(),
        }
    }
}

impl ProjectSettings {
    /// Reads `settings_file`; a missing file yields the defaults.
    pub fn load(store: &dyn FileStore, settings_file: &SourceFile) -> Result<Self> {
        if !store.exists(settings_file) {
            debug!("No settings at {}, using defaults", settings_file);
            return Ok(Self::default());
        }
        let text = store.read_text(settings_file)?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, store: &dyn FileStore, settings_file: &SourceFile) -> Result<()> {
        self.validate()?;
        let text = serde_json::to_string_pretty(self)?;
        store.save(settings_file, &text)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("SourcePath", &self.source_path),
            ("BuildPath", &self.build_path),
        ] {
            if value.split(['/', '\\']).any(|s| s == "..") {
                return Err(KilnError::Config(format!(
                    "{key} must stay inside the project: {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Workspace-wide build options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Once a pass has collected this many issues, it stops compiling.
    pub max_issues_per_pass: usize,
    pub settings_file_name: String,
    /// Extra file names never routed to a builder. Dot-files are always skipped.
    pub ignored_names: Vec<String>,
    pub auto_build: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            max_issues_per_pass: DEFAULT_MAX_ISSUES_PER_PASS,
            settings_file_name: SETTINGS_FILE_NAME.to_string(),
            ignored_names: Vec::new(),
            auto_build: true,
        }
    }
}

impl WorkspaceConfig {
    /// Reads `config_file`; a missing file yields the defaults.
    pub fn load(store: &dyn FileStore, config_file: &SourceFile) -> Result<Self> {
        if !store.exists(config_file) {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(&store.read_text(config_file)?)?;
        if config.max_issues_per_pass == 0 {
            return Err(KilnError::Config(
                "max_issues_per_pass must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn with_max_issues_per_pass(mut self, max: usize) -> Self {
        self.max_issues_per_pass = max.max(1);
        self
    }

    pub fn is_ignored(&self, file: &SourceFile) -> bool {
        file.is_hidden() || self.ignored_names.iter().any(|n| n == file.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_fill_missing_keys() {
        let s: ProjectSettings = serde_json::from_str(r#"{"BuildPath": "classes"}"#).unwrap();
        assert_eq!(s.source_path, "src");
        assert_eq!(s.build_path, "classes");
        assert_eq!(s.strategy, BuildStrategy::Compile);
    }

    #[test]
    fn test_settings_keys() {
        let s = ProjectSettings {
            compile_release: Some("17".into()),
            strategy: BuildStrategy::Structural,
            dependencies: vec!["core".into()],
            ..Default::default()
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["SourcePath"], "src");
        assert_eq!(json["CompileRelease"], "17");
        assert_eq!(json["Strategy"], "structural");
        assert_eq!(json["Dependencies"][0], "core");
    }

    #[test]
    fn test_settings_reject_escaping_paths() {
        let s = ProjectSettings {
            build_path: "../out".into(),
            ..Default::default()
        };
        assert!(matches!(s.validate(), Err(KilnError::Config(_))));
    }

    #[test]
    fn test_ignored_names() {
        let config = WorkspaceConfig {
            ignored_names: vec!["Thumbs.db".into()],
            ..Default::default()
        };
        assert!(config.is_ignored(&SourceFile::new("/p/.git")));
        assert!(config.is_ignored(&SourceFile::new("/p/src/Thumbs.db")));
        assert!(!config.is_ignored(&SourceFile::new("/p/src/A.java")));
    }

    #[test]
    fn test_workspace_config_load() {
        let store = crate::store::MemoryStore::new();
        let file = SourceFile::new("/kiln.json");
        assert_eq!(
            WorkspaceConfig::load(&store, &file).unwrap(),
            WorkspaceConfig::default()
        );

        store
            .save(&file, r#"{"max_issues_per_pass": 50, "auto_build": false}"#)
            .unwrap();
        let config = WorkspaceConfig::load(&store, &file).unwrap();
        assert_eq!(config.max_issues_per_pass, 50);
        assert!(!config.auto_build);
        assert_eq!(config.settings_file_name, SETTINGS_FILE_NAME);

        store.save(&file, r#"{"max_issues_per_pass": 0}"#).unwrap();
        assert!(matches!(
            WorkspaceConfig::load(&store, &file),
            Err(KilnError::Config(_))
        ));
    }
}
