//! A relation catalog that keeps its search indexes current.

pub mod query;
pub mod write;

use crate::catalog::MemoryCatalog;
use crate::index::{RelationIndex, SearchIndex};
use crate::types::{IndexError, IndexResult};

/// Owns relation storage plus the search indexes notified of every change.
pub struct RelationCatalog {
    store: MemoryCatalog,
    indexes: Vec<RelationIndex>,
}

impl RelationCatalog {
    /// Create an empty catalog indexing the given roles.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store: MemoryCatalog::new(names),
            indexes: Vec::new(),
        }
    }

    /// The underlying relation store.
    pub fn store(&self) -> &MemoryCatalog {
        &self.store
    }

    /// Registered search indexes, in registration order.
    pub fn indexes(&self) -> &[RelationIndex] {
        &self.indexes
    }

    /// Attach and register a search index, returning its position.
    pub fn add_search_index(&mut self, index: impl Into<RelationIndex>) -> IndexResult<usize> {
        let mut index = index.into();
        index.set_catalog(Some(&self.store))?;
        log::debug!("registered {} search index", index.stats().kind);
        self.indexes.push(index);
        Ok(self.indexes.len() - 1)
    }

    /// Detach and unregister the index at `position`.
    pub fn remove_search_index(&mut self, position: usize) -> IndexResult<RelationIndex> {
        if position >= self.indexes.len() {
            return Err(IndexError::Config(format!(
                "no search index at position {position}"
            )));
        }
        let mut index = self.indexes.remove(position);
        index.set_catalog(None)?;
        Ok(index)
    }
}
