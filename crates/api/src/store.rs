use crate::error::{ApiError, ApiResult};
use crate::models::SourceFile;

/// Storage the build engine reads sources from and writes artifacts to.
///
/// Directories are files with children. Writes create missing parent
/// directories. Deleting a directory deletes its contents.
pub trait FileStore: Send + Sync {
    fn exists(&self, file: &SourceFile) -> bool;

    fn is_dir(&self, file: &SourceFile) -> bool;

    fn read_bytes(&self, file: &SourceFile) -> ApiResult<Vec<u8>>;

    fn read_text(&self, file: &SourceFile) -> ApiResult<String> {
        let bytes = self.read_bytes(file)?;
        String::from_utf8(bytes)
            .map_err(|e| ApiError::InvalidArgument(format!("{file} is not UTF-8: {e}")))
    }

    fn write_bytes(&self, file: &SourceFile, bytes: &[u8]) -> ApiResult<()>;

    /// Writes `text` as the new content of `file`.
    fn save(&self, file: &SourceFile, text: &str) -> ApiResult<()> {
        self.write_bytes(file, text.as_bytes())
    }

    fn create_dir(&self, dir: &SourceFile) -> ApiResult<()>;

    /// Deleting a missing file succeeds.
    fn delete(&self, file: &SourceFile) -> ApiResult<()>;

    /// Direct children of `dir`, sorted by path. Empty for plain files.
    fn list_children(&self, dir: &SourceFile) -> ApiResult<Vec<SourceFile>>;

    /// Modification time in milliseconds since the epoch.
    fn last_modified(&self, file: &SourceFile) -> ApiResult<u64>;
}
