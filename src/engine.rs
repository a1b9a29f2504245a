use crate::codec::systemtime_to_unix_secs;
use crate::hasher;
use crate::path_utils::{self, INDEX_DIR_NAME};
use crate::records::{DbMeta, DirInfo, FileMeta, HashEntry};
use crate::store::Store;
use crate::walker::{self, WalkEntry};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const PREFIX_FILE: u8 = b'f';
pub const PREFIX_HASH: u8 = b'h';
pub const KEY_DB_META: &[u8] = b".";

/// Rolling totals returned from each step of a walk. Directory recursion
/// sums child accumulators post-order; the sweep fills the removed counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub file_count: i32,
    pub file_size: i64,
    pub dir_count: i32,
    pub changed_file_count: i32,
    pub changed_file_size: i64,
    pub removed_dir_count: i32,
    pub removed_file_count: i32,
    pub removed_file_size: i64,
}

impl RepositoryInfo {
    pub fn add(&mut self, other: &RepositoryInfo) {
        self.file_count += other.file_count;
        self.file_size += other.file_size;
        self.dir_count += other.dir_count;
        self.changed_file_count += other.changed_file_count;
        self.changed_file_size += other.changed_file_size;
        self.removed_dir_count += other.removed_dir_count;
        self.removed_file_count += other.removed_file_count;
        self.removed_file_size += other.removed_file_size;
    }
}

/// The index engine. Owns the store handle; one operation at a time, no
/// state shared across operations beyond this struct.
pub struct Indexer {
    base_dir: PathBuf,
    store: Store,
    db_meta: DbMeta,
    reading_sequence: i32,
    writing_sequence: i32,
}

fn key_for_path(rel_path: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + rel_path.len());
    key.push(PREFIX_FILE);
    key.extend_from_slice(rel_path.as_bytes());
    key
}

fn key_for_hash(hash: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + hash.len());
    key.push(PREFIX_HASH);
    key.extend_from_slice(hash.as_bytes());
    key
}

fn now_unix() -> i32 {
    systemtime_to_unix_secs(SystemTime::now()) as i32
}

impl Indexer {
    /// Open the index for `base_dir`, creating it if needed. The store lives
    /// in `index_dir` when given, else in `<base_dir>/fileIndexerDb`.
    pub fn open_or_create(base_dir: &Path, index_dir: Option<&Path>) -> Result<Indexer> {
        let index_dir = match index_dir {
            Some(dir) => dir.to_path_buf(),
            None => base_dir.join(INDEX_DIR_NAME),
        };
        let store = Store::open_or_create(&index_dir)?;

        let db_meta = match store.get(KEY_DB_META)? {
            Some(bytes) => DbMeta::decode(&bytes).context("decode db meta")?,
            None => DbMeta {
                base_dir: base_dir.to_string_lossy().to_string(),
                sequence: 0,
            },
        };

        let reading_sequence = db_meta.sequence;
        tracing::info!(sequence = reading_sequence, "opened index store");
        Ok(Indexer {
            base_dir: base_dir.to_path_buf(),
            store,
            db_meta,
            reading_sequence,
            writing_sequence: reading_sequence + 1,
        })
    }

    /// Open an index that must already exist, adopting its stored base
    /// directory. Used to read a foreign index for intersection.
    pub fn open_existing(index_dir: &Path) -> Result<Indexer> {
        let store = Store::open_existing(index_dir)?;
        let db_meta = match store.get(KEY_DB_META)? {
            Some(bytes) => DbMeta::decode(&bytes).context("decode db meta")?,
            None => {
                return Err(anyhow!(
                    "store at {} has no metadata record",
                    index_dir.display()
                ))
            }
        };

        let reading_sequence = db_meta.sequence;
        tracing::info!(sequence = reading_sequence, base_dir = %db_meta.base_dir, "opened existing index store");
        Ok(Indexer {
            base_dir: PathBuf::from(&db_meta.base_dir),
            store,
            db_meta,
            reading_sequence,
            writing_sequence: reading_sequence + 1,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn db_meta(&self) -> &DbMeta {
        &self.db_meta
    }

    /// Mark-and-sweep refresh against the current state of the filesystem.
    ///
    /// Mark: depth-first walk rewriting every live entry with the writing
    /// sequence. Commit: persist the advanced sequence. Sweep: every record
    /// still bearing an older sequence is gone from disk and is deleted,
    /// along with its hash-index membership.
    pub fn update(&mut self) -> Result<RepositoryInfo> {
        let root = walker::stat_root(&self.base_dir)?;
        let base = self.base_dir.clone();
        let mut info = self.update_dir(&base, &root)?.unwrap_or_default();

        tracing::debug!(
            from = self.reading_sequence,
            to = self.writing_sequence,
            "committing refresh sequence"
        );
        self.db_meta.sequence = self.writing_sequence;
        self.reading_sequence = self.writing_sequence;
        self.writing_sequence += 1;
        self.store.put(KEY_DB_META, &self.db_meta.encode())?;

        // Collect stale entries first; the store must not be mutated while a
        // scan is open.
        let sequence = self.db_meta.sequence;
        let mut stale: Vec<FileMeta> = Vec::new();
        self.iter_files(|rel_path, meta| {
            if meta.sequence != sequence {
                let mut meta = meta.clone();
                meta.relative_path = rel_path.to_string();
                stale.push(meta);
            }
            Ok(())
        })?;

        for meta in &stale {
            if meta.is_dir {
                info.removed_dir_count += 1;
            } else {
                info.removed_file_count += 1;
                info.removed_file_size += meta.size;
            }
            self.store.delete(&key_for_path(&meta.relative_path))?;
            if !meta.is_dir {
                self.remove_hash(&meta.md5, &meta.relative_path)?;
            }
        }

        tracing::info!(
            sequence,
            files = info.file_count,
            bytes = info.file_size,
            changed = info.changed_file_count,
            removed = info.removed_file_count,
            "refresh complete"
        );
        Ok(info)
    }

    fn update_dir(&mut self, dir: &Path, entry: &WalkEntry) -> Result<Option<RepositoryInfo>> {
        if path_utils::should_skip(&self.base_dir, dir) {
            return Ok(None);
        }
        tracing::debug!(dir = %dir.display(), "updating directory");

        let update_time_start = now_unix();

        let children = match walker::read_dir_entries(dir) {
            Ok(children) => children,
            Err(e) => {
                if dir == self.base_dir.as_path() {
                    return Err(e);
                }
                tracing::warn!(dir = %dir.display(), "readdir failed, subtree dropped: {e:#}");
                return Ok(None);
            }
        };

        let mut info = RepositoryInfo::default();
        for child in &children {
            if child.is_dir {
                if let Some(child_info) = self.update_dir(&child.path, child)? {
                    info.add(&child_info);
                }
                info.dir_count += 1;
            } else if let Some(file_info) = self.update_file(child)? {
                info.add(&file_info);
            }
        }

        let meta = FileMeta {
            size: entry.size,
            is_dir: true,
            md5: String::new(),
            mtime: entry.mtime,
            sequence: self.writing_sequence,
            dir_info: Some(DirInfo {
                update_time_start,
                update_time_end: now_unix(),
                total_file_count: info.file_count,
                total_file_size: info.file_size,
            }),
            relative_path: String::new(),
        };
        let rel_path = path_utils::relative_path(&self.base_dir, dir);
        // A file replaced by a same-named directory shares its key; once the
        // record is overwritten the sweep can no longer find the old hash
        // membership, so it is dropped here.
        if let Some(prior) = self.get_file_or_dir_meta(&rel_path)? {
            if !prior.is_dir && !prior.md5.is_empty() {
                self.remove_hash(&prior.md5, &rel_path)?;
            }
        }
        self.store.put(&key_for_path(&rel_path), &meta.encode())?;
        Ok(Some(info))
    }

    fn update_file(&mut self, entry: &WalkEntry) -> Result<Option<RepositoryInfo>> {
        let rel_path = path_utils::relative_path(&self.base_dir, &entry.path);
        let prior = self.get_file_or_dir_meta(&rel_path)?;

        // Unchanged (size, mtime) means the stored hash is still trusted and
        // the content is not re-read.
        let md5 = match &prior {
            Some(p) if !p.is_dir && p.size == entry.size && p.mtime == entry.mtime => {
                p.md5.clone()
            }
            _ => match hasher::md5_hex(&entry.path) {
                Ok(digest) => digest,
                Err(e) => {
                    tracing::warn!(file = %entry.path.display(), "hashing failed, file skipped this pass: {e:#}");
                    return Ok(None);
                }
            },
        };

        let meta = FileMeta {
            size: entry.size,
            is_dir: false,
            md5: md5.clone(),
            mtime: entry.mtime,
            sequence: self.writing_sequence,
            dir_info: None,
            relative_path: String::new(),
        };
        self.store.put(&key_for_path(&rel_path), &meta.encode())?;

        let mut info = RepositoryInfo {
            file_count: 1,
            file_size: entry.size,
            ..RepositoryInfo::default()
        };

        let changed = match &prior {
            Some(p) => p.md5 != md5,
            None => true,
        };
        if changed {
            if let Some(p) = &prior {
                if !p.md5.is_empty() {
                    self.remove_hash(&p.md5, &rel_path)?;
                }
            }
            self.add_hash(&md5, entry.size, &rel_path)?;
            info.changed_file_count = 1;
            info.changed_file_size = entry.size;
        }
        Ok(Some(info))
    }

    fn add_hash(&mut self, md5: &str, size: i64, rel_path: &str) -> Result<()> {
        let key = key_for_hash(md5);
        let mut entry = match self.store.get(&key)? {
            Some(bytes) => {
                let entry = HashEntry::decode(&bytes)
                    .with_context(|| format!("decode hash entry {md5}"))?;
                if entry.paths.iter().any(|p| p == rel_path) {
                    return Ok(());
                }
                entry
            }
            None => HashEntry::default(),
        };
        entry.paths.push(rel_path.to_string());
        entry.file_size = size;
        self.store.put(&key, &entry.encode())
    }

    fn remove_hash(&mut self, md5: &str, rel_path: &str) -> Result<()> {
        let key = key_for_hash(md5);
        let mut entry = match self.store.get(&key)? {
            Some(bytes) => {
                HashEntry::decode(&bytes).with_context(|| format!("decode hash entry {md5}"))?
            }
            None => {
                tracing::warn!(md5, rel_path, "hash entry not found on removal");
                return Ok(());
            }
        };

        let Some(pos) = entry.paths.iter().position(|p| p == rel_path) else {
            tracing::warn!(md5, rel_path, "path not present in hash entry");
            return Ok(());
        };

        if entry.paths.len() == 1 {
            self.store.delete(&key)
        } else {
            // Order is not preserved.
            entry.paths.swap_remove(pos);
            self.store.put(&key, &entry.encode())
        }
    }

    pub fn get_file_or_dir_meta(&self, rel_path: &str) -> Result<Option<FileMeta>> {
        match self.store.get(&key_for_path(rel_path))? {
            Some(bytes) => Ok(Some(
                FileMeta::decode(&bytes).with_context(|| format!("decode meta for {rel_path}"))?,
            )),
            None => Ok(None),
        }
    }

    /// Size and paths for a content hash, or `(0, None)` when unknown.
    pub fn get_files_by_hash(&self, hash: &str) -> Result<(i64, Option<Vec<String>>)> {
        match self.store.get(&key_for_hash(hash))? {
            Some(bytes) => {
                let entry = HashEntry::decode(&bytes)
                    .with_context(|| format!("decode hash entry {hash}"))?;
                Ok((entry.file_size, Some(entry.paths)))
            }
            None => Ok((0, None)),
        }
    }

    /// Visit every file and directory record in key order.
    pub fn iter_files<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&str, &FileMeta) -> Result<()>,
    {
        self.store.iter_prefix(&[PREFIX_FILE], |key, value| {
            let rel_path = std::str::from_utf8(&key[1..]).context("non-UTF-8 path key")?;
            let meta = FileMeta::decode(value)
                .with_context(|| format!("decode meta for {rel_path}"))?;
            f(rel_path, &meta)
        })
    }

    /// Visit every hash entry in key order.
    pub fn iter_hashes<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&str, i64, &[String]) -> Result<()>,
    {
        self.store.iter_prefix(&[PREFIX_HASH], |key, value| {
            let hash = std::str::from_utf8(&key[1..]).context("non-UTF-8 hash key")?;
            let entry = HashEntry::decode(value)
                .with_context(|| format!("decode hash entry {hash}"))?;
            f(hash, entry.file_size, &entry.paths)
        })
    }

    /// Count files, bytes and directories under the base directory without
    /// touching the store. Same skip rules as `update`.
    pub fn quick_scan(&self, info: &mut RepositoryInfo) -> Result<()> {
        walker::stat_root(&self.base_dir)?;
        self.quick_scan_dir(&self.base_dir, info)
    }

    fn quick_scan_dir(&self, dir: &Path, info: &mut RepositoryInfo) -> Result<()> {
        if path_utils::should_skip(&self.base_dir, dir) {
            return Ok(());
        }

        let children = match walker::read_dir_entries(dir) {
            Ok(children) => children,
            Err(e) => {
                if dir == self.base_dir.as_path() {
                    return Err(e);
                }
                tracing::warn!(dir = %dir.display(), "readdir failed, subtree dropped: {e:#}");
                return Ok(());
            }
        };

        for child in &children {
            if child.is_dir {
                self.quick_scan_dir(&child.path, info)?;
                info.dir_count += 1;
            } else {
                info.file_count += 1;
                info.file_size += child.size;
            }
        }
        Ok(())
    }
}
