use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use kiln_api::{ApiError, ApiResult, FileStore, SourceFile};

#[derive(Debug, Clone)]
enum Node {
    Dir { modified: u64 },
    File { bytes: Vec<u8>, modified: u64 },
}

impl Node {
    fn modified(&self) -> u64 {
        match self {
            Node::Dir { modified } | Node::File { modified, .. } => *modified,
        }
    }
}

/// In-memory store. Timestamps come from a logical clock that advances on
/// every write, so "older than" comparisons are deterministic.
#[derive(Debug)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<SourceFile, Node>>,
    read_only: RwLock<BTreeSet<SourceFile>>,
    clock: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(SourceFile::root(), Node::Dir { modified: 0 });
        Self {
            nodes: RwLock::new(nodes),
            read_only: RwLock::new(BTreeSet::new()),
            clock: AtomicU64::new(1),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    /// Sets the modification time of an existing entry.
    pub fn set_modified(&self, file: &SourceFile, modified: u64) -> ApiResult<()> {
        let mut nodes = self.nodes.write().map_err(poisoned)?;
        match nodes.get_mut(file) {
            Some(Node::Dir { modified: m }) | Some(Node::File { modified: m, .. }) => {
                *m = modified;
                Ok(())
            }
            None => Err(ApiError::NotFound(file.path().to_string())),
        }
    }

    /// Advances the modification time of `file` past every earlier write.
    pub fn touch(&self, file: &SourceFile) -> ApiResult<()> {
        let now = self.tick();
        self.set_modified(file, now)
    }

    /// Makes deletes that would remove `file` fail, like a file held open
    /// or owned by another user.
    pub fn set_read_only(&self, file: &SourceFile, read_only: bool) -> ApiResult<()> {
        let mut locked = self.read_only.write().map_err(poisoned)?;
        if read_only {
            locked.insert(file.clone());
        } else {
            locked.remove(file);
        }
        Ok(())
    }

    /// All plain files, in path order.
    pub fn files(&self) -> Vec<SourceFile> {
        match self.nodes.read() {
            Ok(nodes) => nodes
                .iter()
                .filter(|(_, n)| matches!(n, Node::File { .. }))
                .map(|(f, _)| f.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn ensure_parents(
        nodes: &mut BTreeMap<SourceFile, Node>,
        file: &SourceFile,
        modified: u64,
    ) -> ApiResult<()> {
        let mut current = file.parent();
        while let Some(dir) = current {
            match nodes.get(&dir) {
                Some(Node::Dir { .. }) => break,
                Some(Node::File { .. }) => {
                    return Err(ApiError::InvalidArgument(format!("{dir} is not a directory")));
                }
                None => {
                    nodes.insert(dir.clone(), Node::Dir { modified });
                }
            }
            current = dir.parent();
        }
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> ApiError {
    ApiError::Internal("memory store lock poisoned".to_string())
}

impl FileStore for MemoryStore {
    fn exists(&self, file: &SourceFile) -> bool {
        self.nodes
            .read()
            .map(|nodes| nodes.contains_key(file))
            .unwrap_or(false)
    }

    fn is_dir(&self, file: &SourceFile) -> bool {
        self.nodes
            .read()
            .map(|nodes| matches!(nodes.get(file), Some(Node::Dir { .. })))
            .unwrap_or(false)
    }

    fn read_bytes(&self, file: &SourceFile) -> ApiResult<Vec<u8>> {
        let nodes = self.nodes.read().map_err(poisoned)?;
        match nodes.get(file) {
            Some(Node::File { bytes, .. }) => Ok(bytes.clone()),
            Some(Node::Dir { .. }) => Err(ApiError::InvalidArgument(format!(
                "{file} is a directory"
            ))),
            None => Err(ApiError::NotFound(file.path().to_string())),
        }
    }

    fn write_bytes(&self, file: &SourceFile, bytes: &[u8]) -> ApiResult<()> {
        let modified = self.tick();
        let mut nodes = self.nodes.write().map_err(poisoned)?;
        if let Some(Node::Dir { .. }) = nodes.get(file) {
            return Err(ApiError::InvalidArgument(format!("{file} is a directory")));
        }
        Self::ensure_parents(&mut nodes, file, modified)?;
        nodes.insert(
            file.clone(),
            Node::File {
                bytes: bytes.to_vec(),
                modified,
            },
        );
        Ok(())
    }

    fn create_dir(&self, dir: &SourceFile) -> ApiResult<()> {
        let modified = self.tick();
        let mut nodes = self.nodes.write().map_err(poisoned)?;
        match nodes.get(dir) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(Node::File { .. }) => Err(ApiError::InvalidArgument(format!(
                "{dir} is a file"
            ))),
            None => {
                Self::ensure_parents(&mut nodes, dir, modified)?;
                nodes.insert(dir.clone(), Node::Dir { modified });
                Ok(())
            }
        }
    }

    fn delete(&self, file: &SourceFile) -> ApiResult<()> {
        let locked = self.read_only.read().map_err(poisoned)?;
        if let Some(held) = locked.iter().find(|path| path.starts_with(file)) {
            return Err(ApiError::io(
                held.path(),
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ));
        }
        drop(locked);
        let mut nodes = self.nodes.write().map_err(poisoned)?;
        nodes.retain(|path, _| !path.starts_with(file) || path.is_root());
        Ok(())
    }

    fn list_children(&self, dir: &SourceFile) -> ApiResult<Vec<SourceFile>> {
        let nodes = self.nodes.read().map_err(poisoned)?;
        if !matches!(nodes.get(dir), Some(Node::Dir { .. })) {
            return Ok(Vec::new());
        }
        Ok(nodes
            .keys()
            .filter(|path| path.parent().as_ref() == Some(dir))
            .cloned()
            .collect())
    }

    fn last_modified(&self, file: &SourceFile) -> ApiResult<u64> {
        let nodes = self.nodes.read().map_err(poisoned)?;
        nodes
            .get(file)
            .map(Node::modified)
            .ok_or_else(|| ApiError::NotFound(file.path().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_create_parents_and_tick() {
        let store = MemoryStore::new();
        let a = SourceFile::new("/p/src/a/A.java");
        let b = SourceFile::new("/p/src/a/B.java");
        store.save(&a, "class A {}").unwrap();
        store.save(&b, "class B {}").unwrap();

        assert!(store.is_dir(&SourceFile::new("/p/src")));
        assert!(store.last_modified(&a).unwrap() < store.last_modified(&b).unwrap());
        assert_eq!(
            store.list_children(&SourceFile::new("/p/src/a")).unwrap(),
            vec![a.clone(), b.clone()]
        );
        assert_eq!(store.read_text(&a).unwrap(), "class A {}");

        store.touch(&a).unwrap();
        assert!(store.last_modified(&a).unwrap() > store.last_modified(&b).unwrap());
    }

    #[test]
    fn test_delete_is_recursive_and_idempotent() {
        let store = MemoryStore::new();
        store.save(&SourceFile::new("/p/bin/x/A.class"), "").unwrap();
        store.save(&SourceFile::new("/p/binary.txt"), "").unwrap();

        store.delete(&SourceFile::new("/p/bin")).unwrap();
        assert!(!store.exists(&SourceFile::new("/p/bin/x")));
        assert!(store.exists(&SourceFile::new("/p/binary.txt")));
        store.delete(&SourceFile::new("/p/bin")).unwrap();
        assert_eq!(store.files(), vec![SourceFile::new("/p/binary.txt")]);
    }

    #[test]
    fn test_read_only_files_block_deletes() {
        let store = MemoryStore::new();
        let class = SourceFile::new("/p/bin/A.class");
        store.save(&class, "").unwrap();
        store.set_read_only(&class, true).unwrap();

        assert!(matches!(
            store.delete(&SourceFile::new("/p/bin")),
            Err(ApiError::Io { .. })
        ));
        assert!(store.exists(&class));

        store.set_read_only(&class, false).unwrap();
        store.delete(&SourceFile::new("/p/bin")).unwrap();
        assert!(!store.exists(&class));
    }
}
