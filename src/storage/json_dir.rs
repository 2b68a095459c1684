use anyhow::{Context, Result};
use fs2::FileExt;
use log::{debug, error, info};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::{document_version, Collection, DocumentStore, DocumentWrite};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// One pretty-printed JSON file per collection inside a data directory.
///
/// Commits from every process sharing the directory are serialized through an
/// advisory lock on `.lock` in that directory.
pub struct JsonDirStore {
    data_dir: PathBuf,
    lock_timeout: Duration,
}

impl JsonDirStore {
    /// Create a new store, creating the data directory if needed
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();

        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        Ok(Self {
            data_dir,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // --- Helper Methods ---

    fn build_path(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(format!("{}.json", collection.name()))
    }

    fn build_temp_path(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(format!("{}.json.tmp", collection.name()))
    }

    fn build_lock_path(&self) -> PathBuf {
        self.data_dir.join(".lock")
    }

    /// Holds the directory lock until the returned file is dropped
    fn acquire_lock(&self) -> Result<File> {
        let lock_path = self.build_lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open {}", lock_path.display()))?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(file),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if started.elapsed() >= self.lock_timeout {
                        anyhow::bail!(
                            "Timed out after {:?} waiting for {}",
                            self.lock_timeout,
                            lock_path.display()
                        );
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to lock {}", lock_path.display()));
                }
            }
        }
    }

    fn stored_version(&self, collection: Collection) -> Result<u64> {
        match self.load(collection)? {
            Some(body) => document_version(collection, &body),
            None => Ok(0),
        }
    }

    fn write_temp(&self, write: &DocumentWrite) -> Result<PathBuf> {
        let temp_path = self.build_temp_path(write.collection);
        fs::write(&temp_path, &write.body)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        Ok(temp_path)
    }

    fn discard_temps(&self, temps: &[PathBuf]) {
        for temp in temps {
            let _ = fs::remove_file(temp);
        }
    }
}

/// Matches are replaced before players. A match without its tier swap can be
/// repaired with a manual tier change; a swap without its match cannot be traced.
fn replacement_order(writes: &[DocumentWrite]) -> Vec<&DocumentWrite> {
    let mut ordered: Vec<&DocumentWrite> = writes.iter().collect();
    ordered.sort_by_key(|write| write.collection != Collection::Matches);
    ordered
}

impl DocumentStore for JsonDirStore {
    fn load(&self, collection: Collection) -> Result<Option<String>> {
        let file_path = self.build_path(collection);

        if !file_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;

        debug!("Loaded {} document from {}", collection, file_path.display());
        Ok(Some(json))
    }

    fn commit(&self, writes: &[DocumentWrite]) -> Result<()> {
        let _lock = self.acquire_lock()?;

        for write in writes {
            write.check(self.stored_version(write.collection)?)?;
        }

        // Stage every document before replacing any of them
        let ordered = replacement_order(writes);
        let mut temps = Vec::with_capacity(ordered.len());
        for write in &ordered {
            match self.write_temp(write) {
                Ok(temp) => temps.push(temp),
                Err(e) => {
                    self.discard_temps(&temps);
                    return Err(e);
                }
            }
        }

        // Each rename is atomic on its own; a crash between two of them leaves
        // the earlier documents replaced and the later ones at their old version.
        for (index, (write, temp)) in ordered.iter().zip(&temps).enumerate() {
            let target = self.build_path(write.collection);
            if let Err(e) = fs::rename(temp, &target) {
                let replaced: Vec<&str> =
                    ordered[..index].iter().map(|w| w.collection.name()).collect();
                error!(
                    "Replacing {} failed after [{}] were already replaced",
                    target.display(),
                    replaced.join(", ")
                );
                self.discard_temps(&temps[index..]);
                return Err(e).with_context(|| format!("Failed to replace {}", target.display()));
            }
            info!(
                "Saved {} document v{} to {}",
                write.collection,
                write.version,
                target.display()
            );
        }

        Ok(())
    }
}
