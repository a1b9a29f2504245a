use anyhow::{Context, Result};
use std::path::Path;

/// Name of the store directory when it lives under the indexed tree. The
/// walker never descends into it.
pub const INDEX_DIR_NAME: &str = "fileIndexerDb";

/// Synology metadata sidecar directories are never indexed.
const SYNOLOGY_META_DIR: &str = "@eaDir";

/// Path of `path` relative to `base`, with no leading separator. The base
/// directory itself maps to the empty string.
pub fn relative_path(base: &Path, path: &Path) -> String {
    let base_s = base.to_string_lossy();
    let path_s = path.to_string_lossy();
    let rel = path_s.strip_prefix(base_s.as_ref()).unwrap_or(&path_s);
    rel.strip_prefix('/').unwrap_or(rel).to_string()
}

/// True when a path below `base` must be left out of every walk: the store's
/// own directory at the top of the tree, and Synology `@eaDir` sidecars at
/// any depth.
pub fn should_skip(base: &Path, path: &Path) -> bool {
    if relative_path(base, path) == INDEX_DIR_NAME {
        return true;
    }
    path.file_name().map(|n| n == SYNOLOGY_META_DIR).unwrap_or(false)
}

/// Quarantine `orig_root/rel_path` by renaming it to `dest_root/rel_path`,
/// creating the destination's parent directories (mode 0700) first.
pub fn remove_file_safely(rel_path: &str, orig_root: &Path, dest_root: &Path) -> Result<()> {
    let parent = Path::new(rel_path).parent().unwrap_or_else(|| Path::new(""));
    let dest_parent = dest_root.join(parent);

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(&dest_parent)
        .with_context(|| format!("create destination dir {}", dest_parent.display()))?;

    let from = orig_root.join(rel_path);
    let to = dest_root.join(rel_path);
    std::fs::rename(&from, &to)
        .with_context(|| format!("move {} to {}", from.display(), to.display()))?;
    Ok(())
}
