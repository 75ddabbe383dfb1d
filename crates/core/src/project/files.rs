use kiln_api::{FileStore, SourceFile};

use super::Project;
use crate::error::Result;

impl Project {
    /// Path of `file` inside the source or build tree, without a leading
    /// slash. `None` for files outside both.
    fn tree_relative<'a>(&self, file: &'a SourceFile) -> Option<&'a str> {
        if self.is_in_build_dir(file) {
            return file.relative_to(&self.build_dir);
        }
        file.relative_to(&self.source_dir)
            .or_else(|| file.relative_to(&self.build_dir))
    }

    /// Fully qualified name for a source or artifact path, e.g.
    /// `com.acme.Foo` for `/p/src/com/acme/Foo.java`.
    pub fn class_name_for_file(&self, file: &SourceFile) -> Option<String> {
        let rel = self.tree_relative(file)?;
        let stem = match rel.rfind('.') {
            Some(dot) if !rel[dot..].contains('/') => &rel[..dot],
            _ => rel,
        };
        Some(stem.replace('/', "."))
    }

    /// Primary artifact of a source file.
    pub fn class_file_for_source(&self, file: &SourceFile) -> Option<SourceFile> {
        let rel = file.relative_to(&self.source_dir)?;
        Some(self.build_dir.join(rel).with_extension("class"))
    }

    /// Every existing artifact of a source file: the primary one followed by
    /// nested `Name$*.class` siblings. Empty when the primary is missing.
    pub fn class_files_for_source(
        &self,
        store: &dyn FileStore,
        file: &SourceFile,
    ) -> Result<Vec<SourceFile>> {
        let Some(primary) = self.class_file_for_source(file) else {
            return Ok(Vec::new());
        };
        if !store.exists(&primary) {
            return Ok(Vec::new());
        }
        let prefix = format!("{}$", primary.simple_name());
        let mut artifacts = vec![primary.clone()];
        if let Some(dir) = primary.parent() {
            artifacts.extend(store.list_children(&dir)?.into_iter().filter(|f| {
                f.name().starts_with(&prefix) && f.extension() == Some("class")
            }));
        }
        Ok(artifacts)
    }

    /// Source file declaring the top-level class `class_name`, if it exists.
    pub fn source_file_for_class_name(
        &self,
        store: &dyn FileStore,
        class_name: &str,
    ) -> Option<SourceFile> {
        let file = self
            .source_dir
            .join(&format!("{}.java", class_name.replace('.', "/")));
        store.exists(&file).then_some(file)
    }

    /// Build-tree copy of a resource.
    pub fn mirror_for_resource(&self, file: &SourceFile) -> Option<SourceFile> {
        let rel = file.relative_to(&self.source_dir)?;
        Some(self.build_dir.join(rel))
    }

    /// Whether `file` lies in a build tree kept apart from the sources.
    /// Always false when the build tree contains the source tree.
    pub fn is_in_build_dir(&self, file: &SourceFile) -> bool {
        self.has_separate_build_dir() && file.starts_with(&self.build_dir)
    }

    /// A directory of the source or build tree holding one package: no dot
    /// in its name, so resource folders such as `res.d` do not count.
    pub fn is_package_dir(&self, store: &dyn FileStore, file: &SourceFile) -> bool {
        let in_tree = (file.starts_with(&self.source_dir) && file != &self.source_dir)
            || (self.is_in_build_dir(file) && file != &self.build_dir);
        in_tree && !file.name().contains('.') && store.is_dir(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProjectSettings, WorkspaceConfig};
    use crate::store::MemoryStore;

    fn project() -> Project {
        Project::with_settings(
            SourceFile::new("/app"),
            ProjectSettings::default(),
            &WorkspaceConfig::default(),
        )
    }

    #[test]
    fn test_paths() {
        let p = project();
        let src = SourceFile::new("/app/src/com/acme/Foo.java");
        assert_eq!(p.class_name_for_file(&src).as_deref(), Some("com.acme.Foo"));
        assert_eq!(
            p.class_file_for_source(&src),
            Some(SourceFile::new("/app/bin/com/acme/Foo.class"))
        );
        assert_eq!(
            p.class_name_for_file(&SourceFile::new("/app/bin/com/acme/Foo$1.class")).as_deref(),
            Some("com.acme.Foo$1")
        );
        assert_eq!(
            p.mirror_for_resource(&SourceFile::new("/app/src/img/logo.png")),
            Some(SourceFile::new("/app/bin/img/logo.png"))
        );
        assert_eq!(p.class_file_for_source(&SourceFile::new("/other/Foo.java")), None);
        assert!(p.is_in_build_dir(&SourceFile::new("/app/bin/x.txt")));
    }

    #[test]
    fn test_build_dir_containing_sources() {
        for build_path in [".", "src"] {
            let settings = ProjectSettings {
                build_path: build_path.to_string(),
                ..ProjectSettings::default()
            };
            let p = Project::with_settings(
                SourceFile::new("/app"),
                settings,
                &WorkspaceConfig::default(),
            );
            assert!(!p.has_separate_build_dir());
            assert!(!p.is_in_build_dir(&SourceFile::new("/app/src/com/acme/Foo.java")));
        }
        let settings = ProjectSettings {
            build_path: "src/out".to_string(),
            ..ProjectSettings::default()
        };
        let p = Project::with_settings(SourceFile::new("/app"), settings, &WorkspaceConfig::default());
        assert!(p.is_in_build_dir(&SourceFile::new("/app/src/out/Foo.class")));
        assert!(!p.is_in_build_dir(&SourceFile::new("/app/src/Foo.java")));
    }

    #[test]
    fn test_nested_artifacts() {
        let store = MemoryStore::new();
        let p = project();
        let src = SourceFile::new("/app/src/Foo.java");
        assert!(p.class_files_for_source(&store, &src).unwrap().is_empty());

        for name in ["Foo.class", "Foo$Inner.class", "Foo$1.class", "FooBar.class", "Foo$.txt"] {
            store.save(&SourceFile::new("/app/bin").join(name), "").unwrap();
        }
        let artifacts = p.class_files_for_source(&store, &src).unwrap();
        let names: Vec<_> = artifacts.iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["Foo.class", "Foo$1.class", "Foo$Inner.class"]);
    }

    #[test]
    fn test_package_dirs() {
        let store = MemoryStore::new();
        let p = project();
        store.save(&SourceFile::new("/app/src/com/acme/Foo.java"), "").unwrap();
        store.save(&SourceFile::new("/app/src/res.d/a.txt"), "").unwrap();
        assert!(p.is_package_dir(&store, &SourceFile::new("/app/src/com")));
        assert!(!p.is_package_dir(&store, &SourceFile::new("/app/src")));
        assert!(!p.is_package_dir(&store, &SourceFile::new("/app/src/res.d")));
        assert!(!p.is_package_dir(&store, &SourceFile::new("/app/src/com/acme/Foo.java")));
    }
}
