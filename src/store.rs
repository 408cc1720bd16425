// src/store.rs
//! # Collection store
//!
//! One JSONL file per `(category, community)` under the data root:
//! `<root>/<category>/<community>.jsonl`, one [`Record`] per line.
//!
//! Writes are merges, never blind overwrites: records are keyed by `id`,
//! unchanged records are skipped, changed ones are overlaid and stamped. The
//! whole merged map is then rewritten through a temp file + rename.
//!
//! Callers serialize merges per file; nothing here locks.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::record::Record;

pub const COLLECTION_EXT: &str = "jsonl";

/// Outcome of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MergeStats {
    pub new: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Size of the collection after the merge.
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct CollectionStore {
    root: PathBuf,
}

impl CollectionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.root.join(category)
    }

    pub fn path_for(&self, category: &str, community: &str) -> PathBuf {
        self.category_dir(category)
            .join(format!("{community}.{COLLECTION_EXT}"))
    }

    /// Collection files present in a category directory, sorted by name.
    /// A missing directory yields an empty list.
    pub fn collection_files(&self, category: &str) -> Result<Vec<PathBuf>> {
        let dir = self.category_dir(category);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(COLLECTION_EXT) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Merge a batch into the community's collection, stamping with the current time.
    pub fn merge(&self, category: &str, community: &str, batch: Vec<Record>) -> Result<MergeStats> {
        let path = self.path_for(category, community);
        merge_at(&path, batch, Utc::now())
    }
}

/// Streaming reader over a collection file. Blank lines are ignored; lines
/// that are not a JSON object with an id are logged, counted and skipped.
/// Loosely typed fields (float counters, nulls) decode leniently.
pub struct RecordLines {
    path: PathBuf,
    lines: std::io::Lines<BufReader<fs::File>>,
    line_no: usize,
}

impl Iterator for RecordLines {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            let line = match self.lines.next()? {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!(target: "store", error = ?e, path = %self.path.display(), "read failed, stopping scan");
                    return None;
                }
            };
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(trimmed) {
                Ok(r) => return Some(r),
                Err(e) => {
                    tracing::warn!(
                        target: "store",
                        error = %e,
                        path = %self.path.display(),
                        line = self.line_no,
                        "skipping corrupt line"
                    );
                    counter!("store_corrupt_lines_total").increment(1);
                }
            }
        }
    }
}

/// Open a collection for streaming. Fails if the file cannot be opened.
pub fn read_records(path: &Path) -> Result<RecordLines> {
    let f = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(RecordLines {
        path: path.to_path_buf(),
        lines: BufReader::new(f).lines(),
        line_no: 0,
    })
}

/// Load a collection keyed by id. Absent or unreadable files give an empty map.
pub fn load(path: &Path) -> BTreeMap<String, Record> {
    let mut map = BTreeMap::new();
    if !path.exists() {
        return map;
    }
    match read_records(path) {
        Ok(lines) => {
            for r in lines {
                map.insert(r.id.clone(), r);
            }
        }
        Err(e) => {
            tracing::warn!(target: "store", error = ?e, "existing collection unreadable, starting empty");
        }
    }
    map
}

/// Merge `batch` into the collection at `path` as of `now` and persist it.
pub fn merge_at(path: &Path, batch: Vec<Record>, now: DateTime<Utc>) -> Result<MergeStats> {
    let mut existing = load(path);
    let mut stats = MergeStats::default();

    for mut incoming in batch {
        if incoming.id.trim().is_empty() {
            tracing::warn!(target: "store", "record without id, skipping");
            continue;
        }
        match existing.get_mut(&incoming.id) {
            Some(stored) => {
                if stored.volatile_fields_differ(&incoming) {
                    tracing::debug!(target: "store", id = %incoming.id, "updated");
                    stored.overlay(incoming, now);
                    stats.updated += 1;
                } else {
                    tracing::debug!(target: "store", id = %incoming.id, "unchanged");
                    stats.skipped += 1;
                }
            }
            None => {
                tracing::debug!(target: "store", id = %incoming.id, "new");
                incoming.first_saved_at = Some(now);
                existing.insert(incoming.id.clone(), incoming);
                stats.new += 1;
            }
        }
    }

    write_all(path, &existing)?;
    stats.total = existing.len();

    counter!("store_merge_new_total").increment(stats.new as u64);
    counter!("store_merge_updated_total").increment(stats.updated as u64);
    counter!("store_merge_skipped_total").increment(stats.skipped as u64);
    tracing::info!(
        target: "store",
        path = %path.display(),
        total = stats.total,
        new = stats.new,
        updated = stats.updated,
        skipped = stats.skipped,
        "collection saved"
    );
    Ok(stats)
}

fn write_all(path: &Path, records: &BTreeMap<String, Record>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp = path.with_extension("jsonl.tmp");
    {
        let f = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        let mut w = BufWriter::new(f);
        for r in records.values() {
            serde_json::to_writer(&mut w, r)?;
            w.write_all(b"\n")?;
        }
        w.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
