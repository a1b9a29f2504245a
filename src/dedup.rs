use crate::engine::Indexer;
use anyhow::Result;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct DupGroup {
    pub hash: String,
    pub file_size: i64,
    pub paths: Vec<String>,
}

/// In-tree duplicate report: every hash with more than one path.
#[derive(Debug, Clone, Default)]
pub struct DupReport {
    pub groups: Vec<DupGroup>,
    /// Copies beyond the first, summed over all groups.
    pub duplicate_count: i64,
    /// Bytes reclaimable by keeping one copy per group.
    pub duplicate_size: i64,
}

pub fn report(indexer: &Indexer) -> Result<DupReport> {
    let mut out = DupReport::default();
    indexer.iter_hashes(|hash, file_size, paths| {
        if paths.len() > 1 {
            let extra = (paths.len() - 1) as i64;
            out.duplicate_count += extra;
            out.duplicate_size += extra * file_size;
            out.groups.push(DupGroup {
                hash: hash.to_string(),
                file_size,
                paths: paths.to_vec(),
            });
        }
        Ok(())
    })?;
    Ok(out)
}

pub fn print_report(report: &DupReport) {
    for group in &report.groups {
        println!("hash:{}", group.hash);
        for path in &group.paths {
            println!("{path}");
        }
    }
    println!("Total: {}", report.duplicate_count);
}

/// Pick which of a duplicate set to remove, keeping one representative.
///
/// `dir_order` is a filter plus tiebreaker, not a multi-level sort: the
/// first prefix that matches anything pins the keep set, and only the
/// lexicographically smallest of multiple matches survives. With no match
/// (or no order at all) the smallest path overall is kept.
pub fn dedup_files(dup_files: &[String], dir_order: &[String]) -> Vec<String> {
    let mut to_remove = Vec::new();

    if !dir_order.is_empty() {
        let mut keep: BTreeSet<usize> = BTreeSet::new();
        for dir in dir_order {
            for (idx, file) in dup_files.iter().enumerate() {
                if file.starts_with(dir.as_str()) {
                    keep.insert(idx);
                }
            }
            if !keep.is_empty() {
                break;
            }
        }

        if !keep.is_empty() {
            for (idx, file) in dup_files.iter().enumerate() {
                if !keep.contains(&idx) {
                    to_remove.push(file.clone());
                }
            }
            if keep.len() == 1 {
                return to_remove;
            }

            let mut remaining: Vec<String> =
                keep.iter().map(|&idx| dup_files[idx].clone()).collect();
            remaining.sort();
            to_remove.extend(remaining.into_iter().skip(1));
            return to_remove;
        }
    }

    let mut sorted = dup_files.to_vec();
    sorted.sort();
    to_remove.extend(sorted.into_iter().skip(1));
    to_remove
}
