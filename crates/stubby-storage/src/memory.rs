use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use stubby_core::repository::Result;
use stubby_core::{
    OwnerId, ReadRepository, Repository, ShortCode, Stats, StorageError, UrlRecord,
};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type Key = (OwnerId, ShortCode);

fn key_of(record: &UrlRecord) -> Key {
    (record.owner.clone(), record.short_code.clone())
}

/// Append-only JSON-lines file mirroring every write.
///
/// Each line is a full [`UrlRecord`]; when a record is tombstoned the
/// updated record is appended again, so the last line for a key wins.
#[derive(Debug)]
struct Journal {
    path: PathBuf,
    file: Mutex<File>,
}

impl Journal {
    async fn append(&self, records: &[UrlRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)
                .map_err(|e| StorageError::InvalidData(e.to_string()))?;
            buf.push(b'\n');
        }

        let mut file = self.file.lock().await;
        file.write_all(&buf).await.map_err(|e| {
            StorageError::Operation(format!("write to {}: {e}", self.path.display()))
        })?;
        file.flush().await.map_err(|e| {
            StorageError::Operation(format!("flush {}: {e}", self.path.display()))
        })
    }
}

/// What follows the last newline of a journal file.
#[derive(Debug, Default)]
enum Tail {
    #[default]
    Clean,
    /// An unterminated line that still holds a whole record.
    Recovered(UrlRecord),
    /// An unterminated line cut short by a crash during an append.
    Torn,
}

#[derive(Debug, Default)]
struct Replay {
    records: Vec<UrlRecord>,
    /// Length of the file prefix made of newline-terminated lines.
    intact_len: u64,
    tail: Tail,
}

fn parse_line(path: &Path, number: usize, line: &str) -> Result<UrlRecord> {
    serde_json::from_str(line)
        .map_err(|e| StorageError::InvalidData(format!("{}:{number}: {e}", path.display())))
}

/// Parses journal contents. Every newline-terminated line must hold a record.
fn replay(path: &Path, contents: &str) -> Result<Replay> {
    let (complete, tail) = match contents.rfind('\n') {
        Some(end) => contents.split_at(end + 1),
        None => ("", contents),
    };

    let mut records = Vec::new();
    let mut lines = 0;
    for (index, line) in complete.lines().enumerate() {
        lines = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_line(path, lines, line)?);
    }

    let tail = if tail.trim().is_empty() {
        Tail::Clean
    } else {
        match parse_line(path, lines + 1, tail) {
            Ok(record) => Tail::Recovered(record),
            Err(e) => {
                warn!(error = %e, "discarding truncated last line of storage file");
                Tail::Torn
            }
        }
    };

    Ok(Replay {
        records,
        intact_len: complete.len() as u64,
        tail,
    })
}

/// In-memory implementation of the repository contract using DashMap.
///
/// Records are keyed by `(owner, code)`; a second map from code to owners
/// serves the owner-independent lookup. When opened with
/// [`InMemoryRepository::with_file`] every write is also appended to a
/// JSON-lines file, and the file is replayed on open.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    storage: DashMap<Key, UrlRecord>,
    owners: DashMap<ShortCode, Vec<OwnerId>>,
    journal: Option<Journal>,
}

impl InMemoryRepository {
    /// Creates a new, purely in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a repository persisted to `path`, restoring previously written records.
    ///
    /// A final line left unterminated by a crash is cut from the file; if it
    /// still parses, its record is kept and written back whole.
    pub async fn with_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let replayed = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => replay(&path, &contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Replay::default(),
            Err(e) => {
                return Err(StorageError::Unavailable(format!(
                    "read {}: {e}",
                    path.display()
                )))
            }
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::Unavailable(format!("open {}: {e}", path.display())))?;

        if !matches!(replayed.tail, Tail::Clean) {
            file.set_len(replayed.intact_len).await.map_err(|e| {
                StorageError::Unavailable(format!("truncate {}: {e}", path.display()))
            })?;
        }

        let repository = Self {
            journal: Some(Journal {
                path: path.clone(),
                file: Mutex::new(file),
            }),
            ..Self::default()
        };
        for record in replayed.records {
            repository.restore(record);
        }
        if let Tail::Recovered(record) = replayed.tail {
            repository.journal(std::slice::from_ref(&record)).await?;
            repository.restore(record);
        }

        info!(path = %path.display(), records = repository.len(), "restored url records from file");
        Ok(repository)
    }

    /// Number of stored records, tombstones included.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    async fn journal(&self, records: &[UrlRecord]) -> Result<()> {
        match &self.journal {
            Some(journal) => journal.append(records).await,
            None => Ok(()),
        }
    }

    /// Inserts a replayed record; a later line for the same key replaces an earlier one.
    fn restore(&self, record: UrlRecord) {
        let key = key_of(&record);
        if self.storage.insert(key.clone(), record).is_none() {
            self.index(&key);
        }
    }

    fn index(&self, (owner, code): &Key) {
        self.owners
            .entry(code.clone())
            .or_default()
            .push(owner.clone());
    }

    fn unindex(&self, (owner, code): &Key) {
        if let Entry::Occupied(mut entry) = self.owners.entry(code.clone()) {
            entry.get_mut().retain(|o| o != owner);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }

    fn rollback(&self, inserted: &[Key]) {
        for key in inserted {
            self.storage.remove(key);
            self.unindex(key);
        }
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        // Cloned so that no index shard is locked while reading records.
        let owners = match self.owners.get(code) {
            Some(owners) => owners.clone(),
            None => return Ok(None),
        };

        let mut tombstone = None;
        for owner in owners {
            let Some(record) = self.storage.get(&(owner, code.clone())) else {
                continue;
            };
            if !record.deleted {
                return Ok(Some(record.value().clone()));
            }
            tombstone.get_or_insert_with(|| record.value().clone());
        }

        Ok(tombstone)
    }

    async fn exists(&self, code: &ShortCode, owner: &OwnerId) -> Result<bool> {
        Ok(self.storage.contains_key(&(owner.clone(), code.clone())))
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        let mut records: Vec<UrlRecord> = self
            .storage
            .iter()
            .filter(|entry| &entry.key().0 == owner && !entry.deleted)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn stats(&self) -> Result<Stats> {
        let mut urls = 0;
        let mut users = HashSet::new();

        for entry in self.storage.iter().filter(|entry| !entry.deleted) {
            urls += 1;
            users.insert(entry.key().0.clone());
        }

        Ok(Stats {
            urls,
            users: users.len() as u64,
        })
    }

    async fn ping(&self) -> Result<()> {
        Err(StorageError::Unavailable(
            "in-memory storage has no database connection".to_string(),
        ))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save(&self, record: UrlRecord) -> Result<()> {
        self.save_batch(vec![record]).await
    }

    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        let mut inserted: Vec<Key> = Vec::with_capacity(records.len());

        for record in &records {
            let key = key_of(record);
            let vacant = match self.storage.entry(key.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(record.clone());
                    true
                }
            };

            if !vacant {
                // The entry guard is gone; no shard lock is held here.
                self.rollback(&inserted);
                return Err(StorageError::Conflict(format!(
                    "{} for owner {}",
                    key.1, key.0
                )));
            }
            self.index(&key);
            inserted.push(key);
        }

        if let Err(e) = self.journal(&records).await {
            self.rollback(&inserted);
            return Err(e);
        }

        debug!(count = records.len(), "stored url records");
        Ok(())
    }

    async fn delete_batch(&self, codes: &[ShortCode], owner: &OwnerId) -> Result<u64> {
        let tombstones: Vec<UrlRecord> = codes
            .iter()
            .filter_map(|code| {
                let record = self.storage.get(&(owner.clone(), code.clone()))?;
                (!record.deleted).then(|| UrlRecord {
                    deleted: true,
                    ..record.value().clone()
                })
            })
            .collect();

        // Journal before memory: a failed append leaves every record live.
        self.journal(&tombstones).await?;

        let mut deleted = 0;
        for tombstone in &tombstones {
            if let Some(mut record) = self.storage.get_mut(&key_of(tombstone)) {
                if !record.deleted {
                    record.deleted = true;
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }
}
