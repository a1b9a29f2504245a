use crate::engine::Indexer;
use crate::hasher;
use anyhow::Result;
use std::path::Path;

/// Intersection totals between a base index and another tree. "Duplicated"
/// means the base index knows the content under two or more paths; content
/// the base holds only once counts as unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntersectStats {
    pub dup_count: i64,
    pub dup_size: i64,
    pub uniq_count: i64,
    pub uniq_size: i64,
}

fn is_duplicated_in(indexer: &Indexer, hash: &str) -> Result<bool> {
    let (_, paths) = indexer.get_files_by_hash(hash)?;
    Ok(paths.map_or(false, |p| p.len() > 1))
}

/// Walk a live tree, hash every file and classify it against the base
/// index. Files that cannot be hashed are logged and counted in neither
/// bucket.
pub fn with_dir(indexer: &Indexer, other_root: &Path) -> Result<IntersectStats> {
    let mut stats = IntersectStats::default();

    for entry in walkdir::WalkDir::new(other_root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("walk error under {}: {e}", other_root.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let size = match entry.metadata() {
            Ok(md) => md.len() as i64,
            Err(e) => {
                tracing::warn!(file = %entry.path().display(), "stat failed, file skipped: {e}");
                continue;
            }
        };
        let hash = match hasher::md5_hex(entry.path()) {
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(file = %entry.path().display(), "hashing failed, file skipped: {e:#}");
                continue;
            }
        };

        if is_duplicated_in(indexer, &hash)? {
            stats.dup_count += 1;
            stats.dup_size += size;
        } else {
            stats.uniq_count += 1;
            stats.uniq_size += size;
        }
    }
    Ok(stats)
}

/// Classify every hash entry of another index against the base index.
/// Tallies follow the base index's path list: a duplicated entry adds the
/// base's path count (and prints the other index's paths), a unique entry
/// counts once, sized by the base's count.
pub fn with_index(indexer: &Indexer, other_index_dir: &Path) -> Result<IntersectStats> {
    let other = Indexer::open_existing(other_index_dir)?;

    let mut stats = IntersectStats::default();
    other.iter_hashes(|hash, file_size, paths| {
        let (_, base_paths) = indexer.get_files_by_hash(hash)?;
        let base_count = base_paths.map_or(0, |p| p.len()) as i64;
        if base_count > 1 {
            for path in paths {
                println!("{path}");
            }
            stats.dup_count += base_count;
            stats.dup_size += file_size * base_count;
        } else {
            stats.uniq_count += 1;
            stats.uniq_size += file_size * base_count;
        }
        Ok(())
    })?;
    Ok(stats)
}

pub fn print_stats(stats: &IntersectStats) {
    println!("Total duplicated files: {}", stats.dup_count);
    println!("Total duplicated files size: {}", stats.dup_size);
    println!("Total unique files: {}", stats.uniq_count);
    println!("Total unique files size: {}", stats.uniq_size);
}
