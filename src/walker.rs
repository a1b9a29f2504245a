use crate::codec::systemtime_to_unix_secs;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One stat'd directory entry as the filesystem reports it. Symlinks are not
/// followed; a symlink surfaces with its own lstat metadata.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub name: String,
    pub size: i64,
    pub mtime: i32,
    pub is_dir: bool,
}

fn entry_from_metadata(path: PathBuf, name: String, md: &std::fs::Metadata) -> WalkEntry {
    let mtime = systemtime_to_unix_secs(md.modified().unwrap_or(SystemTime::UNIX_EPOCH)) as i32;
    WalkEntry {
        path,
        name,
        size: md.len() as i64,
        mtime,
        is_dir: md.is_dir(),
    }
}

/// Stat the walk root. Failure here is fatal to the whole operation.
pub fn stat_root(dir: &Path) -> Result<WalkEntry> {
    let md = std::fs::symlink_metadata(dir)
        .with_context(|| format!("lstat failed on {}", dir.display()))?;
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(entry_from_metadata(dir.to_path_buf(), name, &md))
}

/// Enumerate the children of one directory in the order the OS returns them,
/// stat'ing each. A child whose stat fails is dropped with a warning; the
/// readdir failure itself is the caller's to handle.
pub fn read_dir_entries(dir: &Path) -> Result<Vec<WalkEntry>> {
    let rd = std::fs::read_dir(dir).with_context(|| format!("readdir failed on {}", dir.display()))?;

    let mut out = Vec::new();
    for entry in rd {
        let entry = entry.with_context(|| format!("readdir failed on {}", dir.display()))?;
        let path = entry.path();
        let md = match std::fs::symlink_metadata(&path) {
            Ok(md) => md,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "lstat failed, entry dropped");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().to_string();
        out.push(entry_from_metadata(path, name, &md));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surfaces_size_and_kind() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc"), b"abc").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let mut entries = read_dir_entries(dir.path()).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "abc");
        assert_eq!(entries[0].size, 3);
        assert!(!entries[0].is_dir);
        assert_eq!(entries[1].name, "sub");
        assert!(entries[1].is_dir);
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_dir_entries(&dir.path().join("nope")).is_err());
    }
}
