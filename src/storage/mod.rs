pub mod documents;
pub mod json_dir;
pub mod memory;
pub mod sqlite;

use anyhow::Result;
use std::time::Duration;

use crate::config::settings::{StorageBackend, StorageSettings};

pub use documents::{
    document_version, load_document, Collection, DocumentWrite, Versioned, VersionConflict,
};
pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Whole-document persistence for the ladder collections.
///
/// `commit` receives every document touched by one logical operation and must
/// make them visible together. It is a compare-and-swap: when any stored
/// document is no longer at its write's `expected` version, nothing is written
/// and the error is a `VersionConflict`. Stores shared between processes must
/// perform the check and the replacement under one exclusive lock.
pub trait DocumentStore: Send + Sync {
    fn load(&self, collection: Collection) -> Result<Option<String>>;

    fn commit(&self, writes: &[DocumentWrite]) -> Result<()>;
}

/// `lock_timeout` bounds how long a commit waits for other processes.
pub fn open_store(
    settings: &StorageSettings,
    lock_timeout: Duration,
) -> Result<Box<dyn DocumentStore>> {
    let store: Box<dyn DocumentStore> = match settings.backend {
        StorageBackend::Json => {
            Box::new(JsonDirStore::new(&settings.path)?.with_lock_timeout(lock_timeout))
        }
        StorageBackend::Sqlite => Box::new(SqliteStore::open(&settings.path, lock_timeout)?),
        StorageBackend::Memory => Box::new(MemoryStore::new()),
    };
    Ok(store)
}
