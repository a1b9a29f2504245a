use crate::codec::{self, Reader, WIRE_LEN};
use anyhow::{anyhow, Result};

/// Rollup totals for one indexed directory. Counts and sizes cover every
/// file recursively below the directory; directories themselves are not
/// summed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirInfo {
    pub update_time_start: i32,
    pub update_time_end: i32,
    pub total_file_count: i32,
    pub total_file_size: i64,
}

impl DirInfo {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        codec::put_int_field(&mut out, 1, self.update_time_start as i64);
        codec::put_int_field(&mut out, 2, self.update_time_end as i64);
        codec::put_int_field(&mut out, 3, self.total_file_count as i64);
        codec::put_int_field(&mut out, 4, self.total_file_size);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let mut info = DirInfo::default();
        while !r.done() {
            let (field, wire) = r.read_tag()?;
            match field {
                1 => info.update_time_start = r.read_int()? as i32,
                2 => info.update_time_end = r.read_int()? as i32,
                3 => info.total_file_count = r.read_int()? as i32,
                4 => info.total_file_size = r.read_int()?,
                _ => r.skip(wire)?,
            }
        }
        Ok(info)
    }
}

/// Persisted metadata for one file or directory, stored under `f` + relative
/// path. `is_dir` disambiguates; directories carry a `DirInfo`, files carry
/// an md5.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMeta {
    pub size: i64,
    pub is_dir: bool,
    pub md5: String,
    pub mtime: i32,
    pub sequence: i32,
    pub dir_info: Option<DirInfo>,
    /// Not persisted; filled from the key while sweeping.
    pub relative_path: String,
}

impl FileMeta {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        codec::put_int_field(&mut out, 1, self.size);
        codec::put_bool_field(&mut out, 2, self.is_dir);
        codec::put_bytes_field(&mut out, 3, self.md5.as_bytes());
        codec::put_int_field(&mut out, 4, self.mtime as i64);
        codec::put_int_field(&mut out, 5, self.sequence as i64);
        if let Some(info) = &self.dir_info {
            codec::put_bytes_field(&mut out, 6, &info.encode());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let mut meta = FileMeta::default();
        while !r.done() {
            let (field, wire) = r.read_tag()?;
            match field {
                1 => meta.size = r.read_int()?,
                2 => meta.is_dir = r.read_bool()?,
                3 => meta.md5 = r.read_string()?,
                4 => meta.mtime = r.read_int()? as i32,
                5 => meta.sequence = r.read_int()? as i32,
                6 => {
                    if wire != WIRE_LEN {
                        return Err(anyhow!("dir_info has wrong wire type {}", wire));
                    }
                    meta.dir_info = Some(DirInfo::decode(r.read_bytes()?)?);
                }
                _ => r.skip(wire)?,
            }
        }
        Ok(meta)
    }
}

/// Reverse index entry stored under `h` + lowercase hex md5: every relative
/// path whose content bears that hash, plus the content size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashEntry {
    pub paths: Vec<String>,
    pub file_size: i64,
}

impl HashEntry {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for path in &self.paths {
            codec::put_bytes_field(&mut out, 1, path.as_bytes());
        }
        codec::put_int_field(&mut out, 2, self.file_size);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let mut entry = HashEntry::default();
        while !r.done() {
            let (field, wire) = r.read_tag()?;
            match field {
                1 => entry.paths.push(r.read_string()?),
                2 => entry.file_size = r.read_int()?,
                _ => r.skip(wire)?,
            }
        }
        Ok(entry)
    }
}

/// Store-wide metadata under the `.` key: the indexed root and the sequence
/// of the last committed refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbMeta {
    pub base_dir: String,
    pub sequence: i32,
}

impl DbMeta {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        codec::put_bytes_field(&mut out, 1, self.base_dir.as_bytes());
        codec::put_int_field(&mut out, 2, self.sequence as i64);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let mut meta = DbMeta::default();
        while !r.done() {
            let (field, wire) = r.read_tag()?;
            match field {
                1 => meta.base_dir = r.read_string()?,
                2 => meta.sequence = r.read_int()? as i32,
                _ => r.skip(wire)?,
            }
        }
        Ok(meta)
    }
}
