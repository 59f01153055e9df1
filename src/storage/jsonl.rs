//! JSONL (JSON Lines) storage.
//!
//! The user log is the source of truth: every upsert appends the full
//! resulting record as one line, and replaying the file with
//! last-write-wins per uuid reconstructs the current state.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::memory::newest_first;
use super::{StepStore, StorageError};
use crate::calculate::aggregate_records;
use crate::models::{PrefectureStat, StepReport, UserRecord};

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append a single entity as one line. The line goes out in a single
    /// write; a failed write is truncated away so the next append starts on
    /// a clean line. A torn tail left by an earlier crash is terminated
    /// before the new line is written.
    pub fn append(&self, entity: &T) -> Result<(), StorageError> {
        self.ensure_dir()?;

        let mut line = serde_json::to_vec(entity)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        let len = file.metadata()?.len();
        if len > 0 && !ends_with_newline(&mut file)? {
            warn!("Terminating partial trailing line in {:?}", self.path);
            line.insert(0, b'\n');
        }

        if let Err(e) = file.write_all(&line).and_then(|_| file.flush()) {
            if let Err(trunc) = file.set_len(len) {
                warn!("Failed to truncate {:?} after write error: {}", self.path, trunc);
            }
            return Err(e.into());
        }

        debug!("Appended entity to {:?}", self.path);
        Ok(())
    }

    /// Replace the file contents. Written to a sibling temp file first and
    /// renamed into place, so readers never observe a half-written file.
    pub fn write_all(&self, entities: &[T]) -> Result<usize, StorageError> {
        self.ensure_dir()?;

        let tmp = self.path.with_extension("jsonl.tmp");
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        let mut count = 0;

        for entity in entities {
            let json = serde_json::to_string(entity)?;
            writeln!(writer, "{}", json)?;
            count += 1;
        }

        writer.flush()?;
        fs::rename(&tmp, &self.path)?;
        info!("Wrote {} entities to {:?}", count, self.path);

        Ok(count)
    }
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Read all entities from the file. A missing file reads as empty;
    /// malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!("Failed to parse line {} in {:?}: {}", idx + 1, self.path, e);
                }
            }
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}

/// Record store backed by an append-only JSONL log.
///
/// File writes run on the blocking pool, so a slow disk never stalls the
/// async runtime. Appends stay serialized so log order matches index order.
pub struct JsonlStore {
    inner: Arc<LogState>,
}

struct LogState {
    writer: JsonlWriter<UserRecord>,
    users: RwLock<HashMap<String, UserRecord>>,
    /// Serializes appends.
    log: Mutex<()>,
}

impl LogState {
    fn upsert(&self, report: &StepReport) -> Result<UserRecord, StorageError> {
        let _log = self.log.lock().map_err(|_| StorageError::Poisoned)?;

        let now = Utc::now();
        let existing = self
            .users
            .read()
            .map_err(|_| StorageError::Poisoned)?
            .get(&report.uuid)
            .cloned();
        let record = match existing {
            Some(mut record) => {
                record.apply(report, now);
                record
            }
            None => UserRecord::from_report(report, now),
        };

        // Durable before visible.
        self.writer.append(&record)?;

        self.users
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .insert(record.uuid.clone(), record.clone());

        Ok(record)
    }
}

fn replay(path: &Path) -> Result<(HashMap<String, UserRecord>, usize), StorageError> {
    let lines = JsonlReader::<UserRecord>::new(path.to_path_buf()).read_all()?;
    let line_count = lines.len();

    let mut users = HashMap::with_capacity(line_count);
    for record in lines {
        users.insert(record.uuid.clone(), record);
    }
    Ok((users, line_count))
}

impl JsonlStore {
    /// Replay the log at `path` without modifying it. Safe to use next to a
    /// process that owns the log.
    pub fn open(path: PathBuf) -> Result<Self, StorageError> {
        let (users, _) = replay(&path)?;
        info!("Loaded {} user records from {:?}", users.len(), path);
        Ok(Self::from_parts(path, users))
    }

    /// Replay the log and rewrite it without superseded lines. Only the
    /// process that owns the log may compact it.
    pub fn open_and_compact(path: PathBuf) -> Result<Self, StorageError> {
        let (users, line_count) = replay(&path)?;

        if line_count > users.len() {
            let mut records: Vec<UserRecord> = users.values().cloned().collect();
            records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
            JsonlWriter::new(path.clone()).write_all(&records)?;
            info!(
                "Compacted {:?}: {} lines -> {} records",
                path,
                line_count,
                records.len()
            );
        }

        info!("Loaded {} user records from {:?}", users.len(), path);
        Ok(Self::from_parts(path, users))
    }

    fn from_parts(path: PathBuf, users: HashMap<String, UserRecord>) -> Self {
        Self {
            inner: Arc::new(LogState {
                writer: JsonlWriter::new(path),
                users: RwLock::new(users),
                log: Mutex::new(()),
            }),
        }
    }
}

#[async_trait]
impl StepStore for JsonlStore {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn upsert_user(&self, report: &StepReport) -> Result<UserRecord, StorageError> {
        let state = Arc::clone(&self.inner);
        let report = report.clone();
        tokio::task::spawn_blocking(move || state.upsert(&report)).await?
    }

    async fn group_by_prefecture(&self) -> Result<Vec<PrefectureStat>, StorageError> {
        let users = self.inner.users.read().map_err(|_| StorageError::Poisoned)?;
        Ok(aggregate_records(users.values()))
    }

    async fn recent_users(&self, limit: usize) -> Result<Vec<UserRecord>, StorageError> {
        let users = self.inner.users.read().map_err(|_| StorageError::Poisoned)?;
        Ok(newest_first(&users, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(uuid: &str, prefecture: i64, steps: i64) -> StepReport {
        StepReport::new(uuid, prefecture, steps).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_appends_to_log() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("users.jsonl");
        let store = JsonlStore::open(path.clone()).unwrap();

        store.upsert_user(&report("a", 5, 100)).await.unwrap();
        store.upsert_user(&report("a", 9, 50)).await.unwrap();

        let lines = JsonlReader::<UserRecord>::new(path).read_all().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].prefecture_id.get(), 9);
    }

    #[tokio::test]
    async fn test_reopen_replays_last_write() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("users.jsonl");
        {
            let store = JsonlStore::open(path.clone()).unwrap();
            store.upsert_user(&report("a", 5, 100)).await.unwrap();
            store.upsert_user(&report("b", 5, 300)).await.unwrap();
            store.upsert_user(&report("a", 9, 50)).await.unwrap();
        }

        let store = JsonlStore::open_and_compact(path.clone()).unwrap();
        let groups = store.group_by_prefecture().await.unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].prefecture_id.get(), 5);
        assert_eq!(groups[0].average_steps, 300);
        assert_eq!(groups[0].user_count, 1);
        assert_eq!(groups[1].prefecture_id.get(), 9);
        assert_eq!(groups[1].average_steps, 50);

        // Superseded line was compacted away
        let lines = JsonlReader::<UserRecord>::new(path).read_all().unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("users.jsonl");
        {
            let store = JsonlStore::open(path.clone()).unwrap();
            store.upsert_user(&report("a", 2, 40)).await.unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();

        let store = JsonlStore::open(path).unwrap();
        let recent = store.recent_users(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].uuid, "a");
    }

    #[tokio::test]
    async fn test_plain_open_leaves_log_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("users.jsonl");
        let owner = JsonlStore::open_and_compact(path.clone()).unwrap();
        owner.upsert_user(&report("a", 1, 100)).await.unwrap();
        owner.upsert_user(&report("a", 1, 300)).await.unwrap();

        let reader = JsonlStore::open(path.clone()).unwrap();
        let groups = reader.group_by_prefecture().await.unwrap();
        assert_eq!(groups[0].average_steps, 300);

        // Superseded line is still there, and the owner keeps appending to
        // the same file
        owner.upsert_user(&report("b", 2, 500)).await.unwrap();
        let lines = JsonlReader::<UserRecord>::new(path.clone()).read_all().unwrap();
        assert_eq!(lines.len(), 3);

        let reopened = JsonlStore::open(path).unwrap();
        let groups = reopened.group_by_prefecture().await.unwrap();
        let summary: Vec<(u8, u64)> = groups
            .iter()
            .map(|g| (g.prefecture_id.get(), g.average_steps))
            .collect();
        assert_eq!(summary, vec![(1, 300), (2, 500)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_from_different_users() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("users.jsonl");
        let store = Arc::new(JsonlStore::open(path.clone()).unwrap());

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let uuid = format!("user-{}", i);
                store.upsert_user(&report(&uuid, 1 + i % 47, 100)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let groups = store.group_by_prefecture().await.unwrap();
        let members: u64 = groups.iter().map(|g| g.user_count).sum();
        assert_eq!(members, 50);

        let lines = JsonlReader::<UserRecord>::new(path).read_all().unwrap();
        assert_eq!(lines.len(), 50);
    }

    #[tokio::test]
    async fn test_append_after_torn_line_keeps_new_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("users.jsonl");
        std::fs::write(&path, "{\"uuid\":\"torn\",\"prefec").unwrap();

        let store = JsonlStore::open(path.clone()).unwrap();
        store.upsert_user(&report("a", 4, 250)).await.unwrap();

        let lines = JsonlReader::<UserRecord>::new(path.clone()).read_all().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].uuid, "a");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_reader_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let reader = JsonlReader::<UserRecord>::new(tmp.path().join("absent.jsonl"));
        assert!(reader.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_writer_write_all_replaces() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("values.jsonl");
        let writer = JsonlWriter::<u32>::new(path.clone());

        writer.write_all(&[1, 2, 3]).unwrap();
        writer.write_all(&[4]).unwrap();

        let values = JsonlReader::<u32>::new(path).read_all().unwrap();
        assert_eq!(values, vec![4]);
    }
}
