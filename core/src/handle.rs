//! Publishes a built index to concurrent readers.
//!
//! Builds happen outside the lock; the writer only swaps an `Arc`. Readers
//! clone the `Arc` and score without holding the lock.

use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::index::{DocumentIndex, QueryResult};

#[derive(Debug, Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<DocumentIndex>>>,
}

impl IndexHandle {
    /// An unbuilt handle; queries return nothing until an index is installed.
    pub fn new() -> Self { Self::default() }

    pub fn with_index(index: DocumentIndex) -> Self {
        Self { current: RwLock::new(Some(Arc::new(index))) }
    }

    /// Replace whatever is published with `index` and return the published `Arc`.
    pub fn install(&self, index: DocumentIndex) -> Arc<DocumentIndex> {
        let index = Arc::new(index);
        *self.current.write() = Some(Arc::clone(&index));
        index
    }

    /// Reload documents from `path` and publish a fresh index. Returns the index
    /// this call built, even if another writer has replaced it since. On failure
    /// the previously published index (if any) stays in place.
    pub fn rebuild_from_path<P: AsRef<Path>>(&self, path: P, config: &IndexConfig) -> Result<Arc<DocumentIndex>> {
        let path = path.as_ref();
        match DocumentIndex::open(path, config) {
            Ok(index) => {
                let index = self.install(index);
                tracing::info!(path = %path.display(), num_docs = index.len(), "index published");
                Ok(index)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "index rebuild failed; keeping previous state");
                Err(e)
            }
        }
    }

    pub fn is_built(&self) -> bool { self.current.read().is_some() }

    pub fn snapshot(&self) -> Option<Arc<DocumentIndex>> { self.current.read().clone() }

    pub fn query(&self, text: &str, k: usize) -> QueryResult {
        match self.snapshot() {
            Some(index) => index.query(text, k),
            None => Vec::new(),
        }
    }
}
