use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use redb::{Database, ReadableTable, TableDefinition};
use std::fs::{File, OpenOptions};
use std::ops::Bound;
use std::path::{Path, PathBuf};

pub const STORE_FILE: &str = "index.redb";
pub const LOCK_FILE: &str = "LOCK";

/// The whole index lives in one ordered byte-keyed table; record kinds are
/// distinguished by a single-byte key prefix.
const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("index");

/// Handle on the embedded ordered KV store. Every `put`/`delete` commits its
/// own transaction and is durable on return. The lock file stays open for
/// the handle's lifetime, so a second process opening the same directory
/// fails immediately.
pub struct Store {
    dir: PathBuf,
    db: Database,
    _lock_file: File,
}

impl Store {
    /// Open the store in `dir`, creating the directory and store file if
    /// absent.
    pub fn open_or_create(dir: &Path) -> Result<Store> {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create store dir {}", dir.display()))?;
        } else if !dir.is_dir() {
            return Err(anyhow!(
                "store path {} exists but is not a directory",
                dir.display()
            ));
        }

        let lock_file = open_and_lock(dir)?;

        let store_path = dir.join(STORE_FILE);
        let db = Database::create(&store_path)
            .with_context(|| format!("open store file {}", store_path.display()))?;

        let store = Store {
            dir: dir.to_path_buf(),
            db,
            _lock_file: lock_file,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Open a store that must already exist.
    pub fn open_existing(dir: &Path) -> Result<Store> {
        let store_path = dir.join(STORE_FILE);
        if !store_path.is_file() {
            return Err(anyhow!("no store found at {}", store_path.display()));
        }

        let lock_file = open_and_lock(dir)?;

        let db = Database::open(&store_path)
            .with_context(|| format!("open store file {}", store_path.display()))?;

        let store = Store {
            dir: dir.to_path_buf(),
            db,
            _lock_file: lock_file,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_schema(&self) -> Result<()> {
        let tx = self.db.begin_write().context("begin_write() failed")?;
        {
            let _ = tx.open_table(TABLE)?;
        }
        tx.commit().context("commit() failed")?;
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let tx = self.db.begin_read().context("begin_read() failed")?;
        let table = tx.open_table(TABLE)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let tx = self.db.begin_write().context("begin_write() failed")?;
        {
            let mut table = tx.open_table(TABLE)?;
            table.insert(key, value)?;
        }
        tx.commit().context("commit() failed")?;
        Ok(())
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let tx = self.db.begin_write().context("begin_write() failed")?;
        {
            let mut table = tx.open_table(TABLE)?;
            table.remove(key)?;
        }
        tx.commit().context("commit() failed")?;
        Ok(())
    }

    /// Visit every (key, value) whose key starts with `prefix`, in key order.
    /// The iteration runs over a read snapshot; callers may mutate the store
    /// only after it returns.
    pub fn iter_prefix<F>(&self, prefix: &[u8], mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<()>,
    {
        let tx = self.db.begin_read().context("begin_read() failed")?;
        let table = tx.open_table(TABLE)?;

        let upper = prefix_upper_bound(prefix);
        let upper_bound = match &upper {
            Some(u) => Bound::Excluded(u.as_slice()),
            None => Bound::Unbounded,
        };

        for item in table.range::<&[u8]>((Bound::Included(prefix), upper_bound))? {
            let (k, v) = item?;
            f(k.value(), v.value())?;
        }
        Ok(())
    }
}

/// Smallest byte string greater than every key with this prefix, or None if
/// the prefix is all 0xff.
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.last_mut() {
        if *last < 0xff {
            *last += 1;
            return Some(upper);
        }
        upper.pop();
    }
    None
}

fn open_and_lock(dir: &Path) -> Result<File> {
    let lock_path = dir.join(LOCK_FILE);
    let f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("open lock file {}", lock_path.display()))?;

    // Exclusive lock: one writer process at a time.
    f.try_lock_exclusive()
        .with_context(|| format!("index is locked (in use?): {}", dir.display()))?;

    Ok(f)
}
