use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Handle to a file or directory in a [`crate::FileStore`].
///
/// Paths are store-relative, always start with `/`, use `/` as separator and
/// never end with one (except the root itself). Handles are cheap to clone and
/// compare by path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceFile {
    #[serde(with = "crate::models::util::serde_arc_str")]
    path: Arc<str>,
}

impl SourceFile {
    pub fn new(path: &str) -> Self {
        let mut normalized = String::with_capacity(path.len() + 1);
        for segment in path.split(['/', '\\']) {
            if segment.is_empty() || segment == "." {
                continue;
            }
            normalized.push('/');
            normalized.push_str(segment);
        }
        if normalized.is_empty() {
            normalized.push('/');
        }
        Self {
            path: Arc::from(normalized.as_str()),
        }
    }

    pub fn root() -> Self {
        Self::new("/")
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        &*self.path == "/"
    }

    /// Last path segment, e.g. `Foo.java`.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Name without its extension, e.g. `Foo` for `Foo.java`.
    pub fn simple_name(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(dot) => &name[..dot],
        }
    }

    /// Extension without the dot. Dot-files such as `.classpath` have none.
    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(dot) => Some(&name[dot + 1..]),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.name().starts_with('.')
    }

    pub fn parent(&self) -> Option<SourceFile> {
        if self.is_root() {
            return None;
        }
        match self.path.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(i) => Some(Self::new(&self.path[..i])),
        }
    }

    pub fn join(&self, relative: &str) -> SourceFile {
        Self::new(&format!("{}/{}", self.path, relative))
    }

    /// Same name in the same directory with a different extension.
    pub fn with_extension(&self, ext: &str) -> SourceFile {
        let stem = self.simple_name();
        let name = format!("{stem}.{ext}");
        match self.parent() {
            Some(parent) => parent.join(&name),
            None => Self::new(&name),
        }
    }

    /// True when `self` is `ancestor` or lies beneath it.
    pub fn starts_with(&self, ancestor: &SourceFile) -> bool {
        if ancestor.is_root() {
            return true;
        }
        match self.path.strip_prefix(&*ancestor.path) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Path of `self` below `ancestor` without a leading slash, e.g.
    /// `com/acme/Foo.java`.
    pub fn relative_to(&self, ancestor: &SourceFile) -> Option<&str> {
        if !self.starts_with(ancestor) {
            return None;
        }
        let rest = if ancestor.is_root() {
            &self.path[..]
        } else {
            &self.path[ancestor.path.len()..]
        };
        Some(rest.trim_start_matches('/'))
    }
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceFile({})", self.path)
    }
}

impl From<&str> for SourceFile {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for SourceFile {
    fn as_ref(&self) -> &str {
        self.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(SourceFile::new("a//b/./c/").path(), "/a/b/c");
        assert_eq!(SourceFile::new("").path(), "/");
        assert!(SourceFile::new("/").is_root());
    }

    #[test]
    fn test_names() {
        let f = SourceFile::new("/proj/src/com/acme/Foo.java");
        assert_eq!(f.name(), "Foo.java");
        assert_eq!(f.simple_name(), "Foo");
        assert_eq!(f.extension(), Some("java"));
        assert_eq!(f.parent().unwrap().path(), "/proj/src/com/acme");
        assert_eq!(f.with_extension("class").path(), "/proj/src/com/acme/Foo.class");

        let hidden = SourceFile::new("/proj/.classpath");
        assert!(hidden.is_hidden());
        assert_eq!(hidden.extension(), None);
    }

    #[test]
    fn test_ancestry() {
        let src = SourceFile::new("/proj/src");
        let f = SourceFile::new("/proj/src/com/Foo.java");
        assert!(f.starts_with(&src));
        assert!(src.starts_with(&src));
        assert!(!SourceFile::new("/proj/srcgen/Foo.java").starts_with(&src));
        assert_eq!(f.relative_to(&src), Some("com/Foo.java"));
        assert_eq!(src.relative_to(&src), Some(""));
        assert_eq!(f.relative_to(&SourceFile::root()), Some("proj/src/com/Foo.java"));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let f = SourceFile::new("/a/B.java");
        assert_eq!(serde_json::to_string(&f).unwrap(), "\"/a/B.java\"");
        let back: SourceFile = serde_json::from_str("\"/a/B.java\"").unwrap();
        assert_eq!(back, f);
    }
}
