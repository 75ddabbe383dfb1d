//! Locates a JDK whose `javac` can compile workspace sources.
//!
//! Looked up in order:
//! - `JAVA_HOME`
//! - the macOS `java_home` tool
//! - common installation directories and SDKMAN candidates
//! - `javac` on the `PATH`

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{JavaError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jdk {
    /// JDK home, or `None` when only a bare `javac` on the `PATH` was found.
    pub home: Option<PathBuf>,
    pub javac: PathBuf,
    pub version: Option<String>,
}

impl Jdk {
    /// The JDK rooted at `home`, if it ships a compiler.
    pub fn at(home: &Path) -> Option<Jdk> {
        let javac = javac_in(home)?;
        Some(Jdk {
            home: Some(home.to_path_buf()),
            javac,
            version: detect_version(home),
        })
    }

    pub fn locate() -> Result<Jdk> {
        if let Ok(java_home) = std::env::var("JAVA_HOME") {
            if let Some(jdk) = Jdk::at(Path::new(&java_home)) {
                debug!("Using JDK from JAVA_HOME: {}", java_home);
                return Ok(jdk);
            }
        }

        #[cfg(target_os = "macos")]
        if let Ok(output) = std::process::Command::new("/usr/libexec/java_home").output() {
            if output.status.success() {
                let home = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
                if let Some(jdk) = Jdk::at(&home) {
                    return Ok(jdk);
                }
            }
        }

        for root in search_roots() {
            if let Some(jdk) = Self::scan(&root) {
                debug!("Using JDK found under {}", root.display());
                return Ok(jdk);
            }
        }

        if let Some(javac) = javac_on_path() {
            return Ok(Jdk {
                home: None,
                javac,
                version: None,
            });
        }
        Err(JavaError::JdkNotFound)
    }

    /// `root` itself when it is a JDK, else its first JDK child.
    fn scan(root: &Path) -> Option<Jdk> {
        if !root.exists() {
            return None;
        }
        if let Some(jdk) = Jdk::at(root) {
            return Some(jdk);
        }
        let mut children: Vec<PathBuf> = std::fs::read_dir(root)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .collect();
        // Newest-looking names first
        children.sort();
        children.reverse();
        children.into_iter().find_map(|mut home| {
            if cfg!(target_os = "macos") && home.join("Contents/Home").exists() {
                home = home.join("Contents/Home");
            }
            Jdk::at(&home)
        })
    }
}

fn search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    #[cfg(target_os = "macos")]
    {
        roots.push(PathBuf::from("/Library/Java/JavaVirtualMachines/"));
        roots.push(PathBuf::from("/opt/homebrew/opt/openjdk/"));
        roots.push(PathBuf::from("/usr/local/opt/openjdk/"));
    }
    #[cfg(target_os = "linux")]
    roots.push(PathBuf::from("/usr/lib/jvm/"));
    #[cfg(target_os = "windows")]
    roots.push(PathBuf::from("C:\\Program Files\\Java\\"));

    if let Some(mut sdkman) = dirs::home_dir() {
        sdkman.push(".sdkman/candidates/java/");
        roots.push(sdkman);
    }
    roots
}

fn javac_name() -> &'static str {
    if cfg!(windows) { "javac.exe" } else { "javac" }
}

fn javac_in(home: &Path) -> Option<PathBuf> {
    let javac = home.join("bin").join(javac_name());
    javac.is_file().then_some(javac)
}

fn javac_on_path() -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(javac_name()))
        .find(|candidate| candidate.is_file())
}

/// `JAVA_VERSION` from the JDK's `release` file, else a version in the
/// directory name.
fn detect_version(home: &Path) -> Option<String> {
    if let Ok(content) = std::fs::read_to_string(home.join("release")) {
        for line in content.lines() {
            if let Some(version) = line.strip_prefix("JAVA_VERSION=") {
                return Some(version.trim_matches('"').to_string());
            }
        }
    }

    let path = home.to_string_lossy();
    regex::Regex::new(r"(?:jdk|java)-?(\d+(?:\.\d+)*)")
        .ok()
        .and_then(|re| re.captures(&path))
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jdk(dir: &Path) {
        let bin = dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join(javac_name()), "").unwrap();
    }

    #[test]
    fn test_jdk_at_requires_javac() {
        let temp = tempfile::tempdir().unwrap();
        assert!(Jdk::at(temp.path()).is_none());

        fake_jdk(temp.path());
        std::fs::write(
            temp.path().join("release"),
            "IMPLEMENTOR=\"Eclipse Adoptium\"\nJAVA_VERSION=\"21.0.2\"\n",
        )
        .unwrap();
        let jdk = Jdk::at(temp.path()).unwrap();
        assert_eq!(jdk.version.as_deref(), Some("21.0.2"));
        assert_eq!(jdk.javac, temp.path().join("bin").join(javac_name()));
    }

    #[test]
    fn test_version_from_directory_name() {
        let temp = tempfile::tempdir().unwrap();
        let home = temp.path().join("jdk-17.0.9");
        fake_jdk(&home);
        assert_eq!(Jdk::at(&home).unwrap().version.as_deref(), Some("17.0.9"));
    }

    #[test]
    fn test_scan_finds_child_jdk() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("not-a-jdk")).unwrap();
        fake_jdk(&temp.path().join("java-11-openjdk"));

        let jdk = Jdk::scan(temp.path()).unwrap();
        assert_eq!(jdk.home, Some(temp.path().join("java-11-openjdk")));
        assert!(Jdk::scan(&temp.path().join("missing")).is_none());
    }
}
