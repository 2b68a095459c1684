use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{Collection, DocumentStore, DocumentWrite};

/// In-process store; nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<Collection, (u64, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, collection: Collection) -> Result<Option<String>> {
        Ok(self.documents.lock().get(&collection).map(|(_, body)| body.clone()))
    }

    fn commit(&self, writes: &[DocumentWrite]) -> Result<()> {
        let mut documents = self.documents.lock();
        for write in writes {
            let stored = documents.get(&write.collection).map_or(0, |(version, _)| *version);
            write.check(stored)?;
        }
        for write in writes {
            documents.insert(write.collection, (write.version, write.body.clone()));
        }
        Ok(())
    }
}
