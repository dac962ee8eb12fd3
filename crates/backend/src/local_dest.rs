//! The on-disk write side of a restore: resolves target paths under
//! `download_root` and writes downloaded bytes there.
//!
//! Grounded on the teacher's `LocalDestination` (`backend/local_destination.rs`):
//! a thin wrapper around a root path that creates parent directories before
//! writing and reports I/O failures with the specific operation that failed.

use std::path::{Path, PathBuf};

use crate::error::{BackendError, BackendResult};

/// Writes blob bytes under `download_root/container/leaf` (§4.6 step 1).
#[derive(Debug, Clone)]
pub struct LocalDestination {
    root: PathBuf,
}

impl LocalDestination {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the final on-disk path for one archive entry, applying any
    /// `rename` override (used by the GUID rewrite rule).
    #[must_use]
    pub fn target_path(&self, container: &str, archive_key: &str, rename: Option<&str>) -> PathBuf {
        let leaf = rename.unwrap_or(archive_key);
        self.root.join(container).join(leaf)
    }

    /// Creates the parent directory of `path`, then writes `bytes` to it.
    pub fn write(&self, path: &Path, bytes: &[u8]) -> BackendResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| BackendError::TargetDirCreate {
                path: parent.display().to_string(),
                source,
            })?;
        }
        std::fs::write(path, bytes).map_err(|source| BackendError::TargetWrite {
            path: path.display().to_string(),
            source,
        })
    }

    /// Stats a previously-written target, for the Progress Reaper / tests.
    #[must_use]
    pub fn size_of(&self, path: &Path) -> Option<u64> {
        std::fs::metadata(path).ok().map(|m| m.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_path_uses_rename_when_present() {
        let dest = LocalDestination::new("/tmp/x");
        let p = dest.target_path("c1", "a/db_1_2_3/f.dat", Some("a/db_1_2_3_G1/f.dat"));
        assert_eq!(p, Path::new("/tmp/x/c1/a/db_1_2_3_G1/f.dat"));
    }

    #[test]
    fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let dest = LocalDestination::new(dir.path());
        let target = dest.target_path("c1", "a/b/c.dat", None);
        dest.write(&target, b"hello").unwrap();
        assert_eq!(dest.size_of(&target), Some(5));
    }
}
