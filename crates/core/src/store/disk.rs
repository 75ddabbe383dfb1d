use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use kiln_api::{ApiError, ApiResult, FileStore, SourceFile};
use walkdir::WalkDir;

/// A store rooted at a directory on the local file system.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `file` on disk.
    pub fn resolve(&self, file: &SourceFile) -> PathBuf {
        let relative = file.path().trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    /// Handle for an absolute disk path, if it lies under the root.
    pub fn to_source_file(&self, path: &Path) -> Option<SourceFile> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut joined = String::new();
        for part in relative.components() {
            joined.push('/');
            joined.push_str(part.as_os_str().to_str()?);
        }
        Some(SourceFile::new(&joined))
    }
}

impl FileStore for DiskStore {
    fn exists(&self, file: &SourceFile) -> bool {
        self.resolve(file).exists()
    }

    fn is_dir(&self, file: &SourceFile) -> bool {
        self.resolve(file).is_dir()
    }

    fn read_bytes(&self, file: &SourceFile) -> ApiResult<Vec<u8>> {
        fs::read(self.resolve(file)).map_err(|e| ApiError::io(file.path(), e))
    }

    fn write_bytes(&self, file: &SourceFile, bytes: &[u8]) -> ApiResult<()> {
        let path = self.resolve(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ApiError::io(file.path(), e))?;
        }
        fs::write(&path, bytes).map_err(|e| ApiError::io(file.path(), e))
    }

    fn create_dir(&self, dir: &SourceFile) -> ApiResult<()> {
        fs::create_dir_all(self.resolve(dir)).map_err(|e| ApiError::io(dir.path(), e))
    }

    fn delete(&self, file: &SourceFile) -> ApiResult<()> {
        let path = self.resolve(file);
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::io(file.path(), e)),
        }
    }

    fn list_children(&self, dir: &SourceFile) -> ApiResult<Vec<SourceFile>> {
        let path = self.resolve(dir);
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        let mut children: Vec<SourceFile> = WalkDir::new(&path)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().map(|name| dir.join(name)))
            .collect();
        children.sort();
        Ok(children)
    }

    fn last_modified(&self, file: &SourceFile) -> ApiResult<u64> {
        let modified = fs::metadata(self.resolve(file))
            .and_then(|m| m.modified())
            .map_err(|e| ApiError::io(file.path(), e))?;
        let millis = modified
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ApiError::Internal(format!("mtime before epoch for {file}: {e}")))?
            .as_millis();
        Ok(millis as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        let file = SourceFile::new("/proj/bin/com/acme/Foo.class");

        store.write_bytes(&file, b"\xCA\xFE").unwrap();
        assert!(store.exists(&file));
        assert!(store.is_dir(&file.parent().unwrap()));
        assert_eq!(store.read_bytes(&file).unwrap(), b"\xCA\xFE");
        assert!(store.last_modified(&file).unwrap() > 0);

        let listed = store.list_children(&SourceFile::new("/proj/bin/com/acme")).unwrap();
        assert_eq!(listed, vec![file.clone()]);

        store.delete(&SourceFile::new("/proj/bin")).unwrap();
        assert!(!store.exists(&file));
        store.delete(&file).unwrap();
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        let err = store.read_bytes(&SourceFile::new("/nope.txt")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_to_source_file() {
        let store = DiskStore::new("/work");
        assert_eq!(
            store.to_source_file(Path::new("/work/p/src/A.java")),
            Some(SourceFile::new("/p/src/A.java"))
        );
        assert_eq!(store.to_source_file(Path::new("/elsewhere/A.java")), None);
    }
}
