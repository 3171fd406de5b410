use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use indexmap::IndexMap;

use crate::constants::archive::{BITCODE_PREFIX, DEFAULT_SNAPSHOT_FILENAME, SNAPSHOT_VERSION};
use crate::data::{EntityKind, EntityRecord};
use crate::errors::CorpusError;
use crate::types::EntityId;

/// Persistence capability used by ingestion and fold assignment.
///
/// `persist` upserts by `(kind, id)`; `commit` makes everything persisted so
/// far durable. Implementations must not deduplicate by natural key: that is
/// the entity cache's job.
pub trait CorpusRepository: Send {
    /// Insert or replace `record`.
    fn persist(&mut self, record: &EntityRecord) -> Result<(), CorpusError>;
    /// Flush pending writes.
    fn commit(&mut self) -> Result<(), CorpusError>;
}

impl<R: CorpusRepository + ?Sized> CorpusRepository for &mut R {
    fn persist(&mut self, record: &EntityRecord) -> Result<(), CorpusError> {
        (**self).persist(record)
    }

    fn commit(&mut self) -> Result<(), CorpusError> {
        (**self).commit()
    }
}

/// In-memory repository with insert/update/commit accounting.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: IndexMap<(EntityKind, EntityId), EntityRecord>,
    inserts: HashMap<EntityKind, usize>,
    updates: HashMap<EntityKind, usize>,
    commits: usize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of first-time inserts of `kind`.
    pub fn insert_count(&self, kind: EntityKind) -> usize {
        self.inserts.get(&kind).copied().unwrap_or(0)
    }

    /// Number of replacements of already-persisted `kind` records.
    pub fn update_count(&self, kind: EntityKind) -> usize {
        self.updates.get(&kind).copied().unwrap_or(0)
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn get(&self, kind: EntityKind, id: EntityId) -> Option<&EntityRecord> {
        self.records.get(&(kind, id))
    }

    /// All stored records in first-insert order.
    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values()
    }
}

impl CorpusRepository for InMemoryRepository {
    fn persist(&mut self, record: &EntityRecord) -> Result<(), CorpusError> {
        let key = (record.kind(), record.id());
        let counter = if self.records.contains_key(&key) {
            &mut self.updates
        } else {
            &mut self.inserts
        };
        *counter.entry(key.0).or_insert(0) += 1;
        self.records.insert(key, record.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), CorpusError> {
        self.commits += 1;
        Ok(())
    }
}

#[derive(Clone, Debug, bitcode::Encode, bitcode::Decode)]
/// Versioned snapshot payload written by `FileRepository`.
struct CorpusSnapshot {
    version: u8,
    written_at: String,
    records: Vec<EntityRecord>,
}

/// File-backed repository writing a bitcode snapshot on every commit.
pub struct FileRepository {
    path: PathBuf,
    records: IndexMap<(EntityKind, EntityId), EntityRecord>,
    dirty: bool,
}

impl fmt::Debug for FileRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRepository")
            .field("path", &self.path)
            .field("records", &self.records.len())
            .finish()
    }
}

impl FileRepository {
    /// Start a fresh snapshot at `path` (a directory gets the default filename).
    pub fn create<P: Into<PathBuf>>(path: P) -> Result<Self, CorpusError> {
        let path = coerce_snapshot_path(path.into());
        ensure_parent_dir(&path)?;
        Ok(Self {
            path,
            records: IndexMap::new(),
            dirty: true,
        })
    }

    /// Default snapshot path inside `dir`.
    pub fn default_path_in_dir<P: AsRef<Path>>(dir: P) -> PathBuf {
        dir.as_ref().join(DEFAULT_SNAPSHOT_FILENAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record from a snapshot written by `commit`.
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Vec<EntityRecord>, CorpusError> {
        let path = coerce_snapshot_path(path.into());
        let bytes = fs::read(&path)?;
        let snapshot = decode_snapshot(&bytes)?;
        Ok(snapshot.records)
    }
}

impl CorpusRepository for FileRepository {
    fn persist(&mut self, record: &EntityRecord) -> Result<(), CorpusError> {
        self.records
            .insert((record.kind(), record.id()), record.clone());
        self.dirty = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), CorpusError> {
        if !self.dirty {
            return Ok(());
        }
        let snapshot = CorpusSnapshot {
            version: SNAPSHOT_VERSION,
            written_at: Utc::now().to_rfc3339(),
            records: self.records.values().cloned().collect(),
        };
        let payload = encode_bitcode_payload(&bitcode::encode(&snapshot));
        let staging = self.path.with_extension("partial");
        fs::write(&staging, payload)?;
        fs::rename(&staging, &self.path)?;
        self.dirty = false;
        Ok(())
    }
}

fn decode_snapshot(bytes: &[u8]) -> Result<CorpusSnapshot, CorpusError> {
    let raw = decode_bitcode_payload(bytes)?;
    let snapshot: CorpusSnapshot = bitcode::decode(raw).map_err(|err| {
        CorpusError::Repository(format!("failed to decode corpus snapshot: {err}"))
    })?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CorpusError::Repository(format!(
            "corpus snapshot version mismatch (expected {}, found {})",
            SNAPSHOT_VERSION, snapshot.version
        )));
    }
    Ok(snapshot)
}

pub(crate) fn encode_bitcode_payload(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + bytes.len());
    out.push(BITCODE_PREFIX);
    out.extend_from_slice(bytes);
    out
}

pub(crate) fn decode_bitcode_payload(bytes: &[u8]) -> Result<&[u8], CorpusError> {
    match bytes.split_first() {
        Some((&BITCODE_PREFIX, rest)) => Ok(rest),
        _ => Err(CorpusError::Repository(
            "bitcode payload missing expected prefix".into(),
        )),
    }
}

fn coerce_snapshot_path(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        return path.join(DEFAULT_SNAPSHOT_FILENAME);
    }
    path
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), CorpusError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Country, Group};
    use tempfile::tempdir;

    fn country(id: EntityId, name: &str) -> EntityRecord {
        EntityRecord::Country(Country {
            id,
            name: name.to_string(),
        })
    }

    #[test]
    fn in_memory_counts_inserts_and_updates() {
        let mut repo = InMemoryRepository::new();
        repo.persist(&country(1, "CHINA")).unwrap();
        repo.persist(&country(2, "IRAN")).unwrap();
        repo.persist(&country(1, "CHINA")).unwrap();
        repo.commit().unwrap();
        assert_eq!(repo.insert_count(EntityKind::Country), 2);
        assert_eq!(repo.update_count(EntityKind::Country), 1);
        assert_eq!(repo.insert_count(EntityKind::Group), 0);
        assert_eq!(repo.commit_count(), 1);
        assert_eq!(repo.records().count(), 2);
    }

    #[test]
    fn file_repository_round_trips_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("corpus.bin");
        let mut repo = FileRepository::create(&path).unwrap();
        repo.persist(&country(1, "RUSSIA")).unwrap();
        repo.persist(&EntityRecord::Group(Group {
            id: 1,
            name: "APT28".into(),
            country_id: Some(1),
        }))
        .unwrap();
        repo.commit().unwrap();

        let loaded = FileRepository::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], country(1, "RUSSIA"));
        assert!(!path.with_extension("partial").exists());
    }

    #[test]
    fn directory_paths_use_default_filename() {
        let dir = tempdir().unwrap();
        let mut repo = FileRepository::create(dir.path()).unwrap();
        assert_eq!(repo.path(), FileRepository::default_path_in_dir(dir.path()));
        repo.commit().unwrap();
        assert!(FileRepository::load(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn corrupt_snapshots_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        fs::write(&path, [0x00, 0x01]).unwrap();
        let err = FileRepository::load(&path).unwrap_err();
        assert!(matches!(
            err,
            CorpusError::Repository(msg) if msg.contains("missing expected prefix")
        ));

        fs::write(&path, [BITCODE_PREFIX, 0xFF]).unwrap();
        assert!(FileRepository::load(&path).is_err());
    }
}
