use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::IdRegistry;
use crate::error::{Error, Result};

/// Where the master ID tracker lives. A run loads it once, and persists it at most once after
/// every stage has succeeded.
pub trait RegistryStore {
    /// # Errors
    fn load(&mut self) -> Result<IdRegistry>;

    /// Replaces the stored registry as a whole.
    ///
    /// # Errors
    fn persist(&mut self, registry: &IdRegistry) -> Result<()>;
}

/// In-memory registry, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    registry: IdRegistry,
    writes: usize,
}

impl MemoryStore {
    #[must_use]
    pub fn new(registry: IdRegistry) -> Self {
        Self {
            registry,
            writes: 0,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    /// Number of times the registry has been persisted.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl RegistryStore for MemoryStore {
    fn load(&mut self) -> Result<IdRegistry> {
        Ok(self.registry.clone())
    }

    fn persist(&mut self, registry: &IdRegistry) -> Result<()> {
        self.registry = registry.clone();
        self.writes += 1;

        Ok(())
    }
}

/// A lock older than this, or held by a process that no longer exists, is stale.
const LOCK_STALE_SECONDS: i64 = 300;

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    acquired_at: String,
}

impl LockInfo {
    fn is_stale(&self) -> bool {
        if !pid_is_alive(self.pid) {
            return true;
        }

        chrono::DateTime::parse_from_rfc3339(&self.acquired_at)
            .map_or(true, |acquired| {
                Utc::now().signed_duration_since(acquired).num_seconds() > LOCK_STALE_SECONDS
            })
    }
}

#[cfg(target_os = "linux")]
fn pid_is_alive(pid: u32) -> bool {
    Utf8Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}

/// Moves a stale lock aside so it can still be inspected. Another run may have beaten us to it.
fn archive_stale_lock(lock_path: &Utf8Path, reason: &str) -> Result<()> {
    let archived = format!("{lock_path}.{reason}.{}", Utc::now().timestamp_millis());

    match fs::rename(lock_path, &archived) {
        Ok(()) => {
            tracing::warn!(lock = %lock_path, %archived, reason, "archived stale registry lock");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// A JSON registry file, held exclusively through a sibling `.lock` file for as long as the store
/// is alive.
#[derive(Debug)]
pub struct FileStore {
    path: Utf8PathBuf,
    lock_path: Utf8PathBuf,
}

impl FileStore {
    /// Takes the registry lock. A lock left behind by a dead process, by a run older than
    /// five minutes, or with unreadable contents is archived and taken over.
    ///
    /// # Errors
    /// [`Error::RegistryLocked`] if a live run holds the lock.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let lock_path = Utf8PathBuf::from(format!("{path}.lock"));

        let mut attempts = 0;
        let mut lock = loop {
            attempts += 1;

            match OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&lock_path)
            {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts < 3 => {
                    let contents = match fs::read_to_string(&lock_path) {
                        Ok(contents) => contents,
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(e.into()),
                    };

                    match serde_json::from_str::<LockInfo>(&contents) {
                        Ok(info) if info.is_stale() => archive_stale_lock(&lock_path, "stale")?,
                        Ok(LockInfo { pid, acquired_at }) => {
                            return Err(Error::RegistryLocked {
                                lock_path: lock_path.to_string(),
                                pid,
                                acquired_at,
                            });
                        }
                        Err(_) => archive_stale_lock(&lock_path, "corrupt")?,
                    }
                }
                Err(e) => {
                    return Err(Error::Store {
                        message: format!("failed to create lock file {lock_path}: {e}"),
                    });
                }
            }
        };

        let store = Self {
            path: path.to_owned(),
            lock_path,
        };

        let info = LockInfo {
            pid: std::process::id(),
            acquired_at: Utc::now().to_rfc3339(),
        };
        lock.write_all(serde_json::to_string(&info)?.as_bytes())?;
        lock.sync_all()?;

        tracing::debug!(registry = %store.path, "acquired registry lock");

        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn write_then_swap(&self, tmp_path: &Utf8Path, contents: &[u8]) -> Result<()> {
        let mut tmp = File::create(tmp_path)?;
        tmp.write_all(contents)?;
        tmp.sync_all()?;

        fs::rename(tmp_path, &self.path)?;

        Ok(())
    }
}

impl RegistryStore for FileStore {
    fn load(&mut self) -> Result<IdRegistry> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(registry = %self.path, "registry file not found, starting empty");
                return Ok(IdRegistry::default());
            }
            Err(e) => return Err(e.into()),
        };

        let registry: IdRegistry = serde_json::from_str(&contents).map_err(|e| Error::Store {
            message: format!("failed to read registry {}: {e}", self.path),
        })?;
        registry.verify()?;

        Ok(registry)
    }

    fn persist(&mut self, registry: &IdRegistry) -> Result<()> {
        let contents = serde_json::to_vec_pretty(registry)?;
        let tmp_path = Utf8PathBuf::from(format!("{}.tmp", self.path));

        if let Err(e) = self.write_then_swap(&tmp_path, &contents) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        tracing::info!(registry = %self.path, "persisted registry");

        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            tracing::warn!(lock = %self.lock_path, error = %e, "failed to release registry lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;
    use crate::{gp2_id::Gp2SampleId, registry::StudyEntry};

    #[fixture]
    fn dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn registry_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().join("registry.json")).unwrap()
    }

    fn one_sample() -> IdRegistry {
        let mut registry = IdRegistry::default();
        let entry: StudyEntry = [("A".to_string(), Gp2SampleId::new("STUDY", 1, 1))].into();
        registry.reconcile("STUDY", &entry).unwrap();
        registry
    }

    #[rstest]
    fn missing_file_loads_empty(dir: TempDir) {
        let mut store = FileStore::open(&registry_path(&dir)).unwrap();

        assert_eq!(store.load().unwrap(), IdRegistry::default());
    }

    #[rstest]
    fn persist_then_load(dir: TempDir) {
        let path = registry_path(&dir);
        let registry = one_sample();

        {
            let mut store = FileStore::open(&path).unwrap();
            store.persist(&registry).unwrap();
        }

        let mut store = FileStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), registry);
        assert!(!Utf8Path::new(&format!("{path}.tmp")).exists());
    }

    #[rstest]
    fn lock_is_exclusive_and_released_on_drop(dir: TempDir) {
        let path = registry_path(&dir);

        let store = FileStore::open(&path).unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(Error::RegistryLocked { .. })
        ));

        drop(store);
        assert!(FileStore::open(&path).is_ok());
    }

    fn write_lock(path: &Utf8Path, contents: &str) -> Utf8PathBuf {
        let lock_path = Utf8PathBuf::from(format!("{path}.lock"));
        fs::write(&lock_path, contents).unwrap();
        lock_path
    }

    fn archived_locks(dir: &TempDir) -> usize {
        fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                let name = e.as_ref().unwrap().file_name();
                name.to_string_lossy().starts_with("registry.json.lock.")
            })
            .count()
    }

    #[rstest]
    fn live_lock_reports_its_holder(dir: TempDir) {
        let path = registry_path(&dir);
        let acquired_at = Utc::now().to_rfc3339();
        let lock_path = write_lock(
            &path,
            &serde_json::json!({"pid": std::process::id(), "acquired_at": acquired_at}).to_string(),
        );

        let err = FileStore::open(&path).unwrap_err();

        assert_eq!(
            err,
            Error::RegistryLocked {
                lock_path: lock_path.to_string(),
                pid: std::process::id(),
                acquired_at,
            }
        );
        assert!(lock_path.exists());
    }

    #[rstest]
    #[case(
        serde_json::json!({"pid": std::process::id(), "acquired_at": "2000-01-01T00:00:00Z"})
            .to_string()
    )]
    #[case(
        serde_json::json!({"pid": u32::MAX - 1, "acquired_at": Utc::now().to_rfc3339()})
            .to_string()
    )]
    #[case("not a lock".to_string())]
    fn stale_lock_is_taken_over(dir: TempDir, #[case] contents: String) {
        let path = registry_path(&dir);
        write_lock(&path, &contents);

        let store = FileStore::open(&path).unwrap();

        assert_eq!(archived_locks(&dir), 1);
        assert!(matches!(
            FileStore::open(&path),
            Err(Error::RegistryLocked { .. })
        ));
        drop(store);
    }

    #[rstest]
    fn malformed_ids_fail_the_load(dir: TempDir) {
        let path = registry_path(&dir);
        fs::write(&path, r#"{"STUDY": {"A": "STUDY_1"}}"#).unwrap();

        let mut store = FileStore::open(&path).unwrap();

        assert!(matches!(store.load(), Err(Error::Store { .. })));
    }

    #[test]
    fn memory_store_counts_writes() {
        let mut store = MemoryStore::default();
        store.persist(&one_sample()).unwrap();

        assert_eq!(store.writes(), 1);
        assert_eq!(store.load().unwrap(), one_sample());
    }
}
