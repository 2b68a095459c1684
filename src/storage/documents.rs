use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::DocumentStore;

/// The persisted collections. Each one is stored as a single whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Players,
    Matches,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Players => "players",
            Collection::Matches => "matches",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A collection snapshot that knows where it is stored and which revision it is.
pub trait Versioned: Serialize + DeserializeOwned + Default {
    const COLLECTION: Collection;

    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);
}

/// A fully serialized replacement for one collection.
///
/// `expected` is the version the replacement was derived from. A store only
/// applies the write while the stored document is still at that version.
#[derive(Debug, Clone)]
pub struct DocumentWrite {
    pub collection: Collection,
    pub expected: u64,
    pub version: u64,
    pub body: String,
}

impl DocumentWrite {
    pub fn encode<T: Versioned>(document: &T, expected: u64) -> Result<Self> {
        let body = serde_json::to_string_pretty(document)
            .with_context(|| format!("Failed to serialize {} document", T::COLLECTION))?;

        Ok(Self {
            collection: T::COLLECTION,
            expected,
            version: document.version(),
            body,
        })
    }

    /// Fails with `VersionConflict` unless the stored document is at `expected`.
    pub fn check(&self, stored: u64) -> Result<()> {
        if stored != self.expected {
            return Err(VersionConflict {
                collection: self.collection,
                expected: self.expected,
                found: stored,
            }
            .into());
        }
        Ok(())
    }
}

/// Another writer replaced the document since it was loaded.
#[derive(Debug, Error)]
#[error("{collection} document is at v{found}, expected v{expected}")]
pub struct VersionConflict {
    pub collection: Collection,
    pub expected: u64,
    pub found: u64,
}

#[derive(Deserialize)]
struct VersionHeader {
    #[serde(default)]
    version: u64,
}

/// Reads only the version of a stored document body.
pub fn document_version(collection: Collection, body: &str) -> Result<u64> {
    let header: VersionHeader = serde_json::from_str(body)
        .with_context(|| format!("Failed to read version of {} document", collection))?;
    Ok(header.version)
}

/// Load a collection, treating a missing document as empty at version 0.
pub fn load_document<T: Versioned>(store: &dyn DocumentStore) -> Result<T> {
    match store.load(T::COLLECTION)? {
        Some(body) => serde_json::from_str(&body).with_context(|| {
            format!(
                "Failed to parse {} document. First 200 chars: {}",
                T::COLLECTION,
                body.chars().take(200).collect::<String>()
            )
        }),
        None => Ok(T::default()),
    }
}
