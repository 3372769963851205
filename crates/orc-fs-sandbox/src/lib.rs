//! Resolve a caller-supplied relative path against a fixed workspace
//! root and prove the result stays inside it, symlinks and all.
//!
//! Mirrors `resolve_safe_path` from the Python predecessor: join the
//! relative path onto the root, resolve it, then verify the resolved
//! path is a descendant of the resolved root. All workspace writes in
//! the worker MUST go through [`FsSandbox::resolve`].

use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("workspace root does not exist or is not a directory: {0}")]
    InvalidRoot(PathBuf),
    #[error("path escapes workspace root: {0}")]
    Escape(String),
    #[error("io error resolving path: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct FsSandbox {
    root: PathBuf,
}

impl FsSandbox {
    /// `root` must already exist; it is canonicalized once at
    /// construction so every subsequent resolve is symlink-safe.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        let canon = root
            .canonicalize()
            .map_err(|_| SandboxError::InvalidRoot(root.to_path_buf()))?;
        if !canon.is_dir() {
            return Err(SandboxError::InvalidRoot(canon));
        }
        Ok(Self { root: canon })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `rel_path` against the sandbox root. Returns the
    /// absolute path and `true` iff it is a descendant of the root.
    /// The caller MUST refuse to write when the returned bool is
    /// `false` — the path itself is still returned for logging.
    pub fn resolve(&self, rel_path: &str) -> (PathBuf, bool) {
        let joined = self.root.join(rel_path);
        let normalized = lexically_normalize(&joined);

        // Resolve symlinks on whatever prefix already exists on disk;
        // the tail (not yet created) is appended verbatim since it
        // can't be canonicalized yet.
        let resolved = match canonicalize_existing_prefix(&normalized) {
            Ok(p) => p,
            Err(_) => normalized.clone(),
        };

        let ok = resolved.starts_with(&self.root);
        (resolved, ok)
    }

    /// Convenience wrapper returning a typed error instead of a bool,
    /// for call sites that want `?`-propagation.
    pub fn resolve_checked(&self, rel_path: &str) -> Result<PathBuf, SandboxError> {
        let (abs, ok) = self.resolve(rel_path);
        if ok {
            Ok(abs)
        } else {
            tracing::warn!(rel_path, resolved = %abs.display(), "path escaped sandbox root");
            Err(SandboxError::Escape(rel_path.to_string()))
        }
    }
}

/// Collapse `.` and `..` components purely lexically (no filesystem
/// access) without permitting escape above the path's own root
/// component — a leading `..` simply has no effect, matching the
/// containment check that follows.
fn lexically_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the longest existing ancestor of `path`, then
/// reattach the remaining (not-yet-existing) components.
fn canonicalize_existing_prefix(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();

    while !existing.exists() {
        match existing.file_name() {
            Some(name) => {
                tail.push(name.to_os_string());
                existing.pop();
            }
            None => break,
        }
    }

    let mut canon = existing.canonicalize()?;
    for part in tail.into_iter().rev() {
        canon.push(part);
    }
    Ok(canon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolves_plain_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = FsSandbox::new(dir.path()).unwrap();
        let (abs, ok) = sandbox.resolve("src/main/Foo.java");
        assert!(ok);
        assert!(abs.starts_with(sandbox.root()));
    }

    #[test]
    fn rejects_parent_escape() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = FsSandbox::new(dir.path()).unwrap();
        let (_, ok) = sandbox.resolve("../../etc/passwd");
        assert!(!ok);
    }

    #[test]
    fn rejects_absolute_escape_via_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let link = dir.path().join("escape");
        #[cfg(unix)]
        std::os::unix::fs::symlink(outside.path(), &link).unwrap();
        #[cfg(unix)]
        {
            let sandbox = FsSandbox::new(dir.path()).unwrap();
            let (_, ok) = sandbox.resolve("escape/anything.txt");
            assert!(!ok);
        }
    }

    #[test]
    fn resolve_checked_errs_on_escape() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = FsSandbox::new(dir.path()).unwrap();
        assert!(sandbox.resolve_checked("../nope").is_err());
        assert!(sandbox.resolve_checked("ok/fine.txt").is_ok());
    }

    #[test]
    fn construction_requires_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(FsSandbox::new(missing).is_err());
    }

    #[test]
    fn nested_existing_dirs_are_contained() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        let sandbox = FsSandbox::new(dir.path()).unwrap();
        let (_, ok) = sandbox.resolve("a/b/c.txt");
        assert!(ok);
    }
}
