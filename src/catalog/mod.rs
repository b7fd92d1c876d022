//! The relation catalog contract consumed by search indexes, plus an
//! in-memory implementation.

pub mod factory;
pub mod filter;
pub mod memory;
pub mod traversal;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{IndexResult, Query, Token, TokenSet};

pub use factory::{ExpandQueries, QueryFactory, TransposingTransitive};
pub use filter::{RelationFilter, TargetCheck};
pub use memory::MemoryCatalog;
pub use traversal::walk_relation_chains;

/// Identity of a catalog instance, used to tell catalogs apart when one
/// index is notified by several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatalogId(u64);

impl CatalogId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Primitives a relation catalog provides to its search indexes.
pub trait Catalog {
    /// This catalog's identity.
    fn id(&self) -> CatalogId;

    /// Relations matching every constraint of `query`, or `None` when the
    /// catalog cannot answer the query's shape.
    fn relation_tokens(&self, query: &Query) -> IndexResult<Option<TokenSet>>;

    /// Every relation currently cataloged.
    fn all_relation_tokens(&self) -> IndexResult<TokenSet>;

    /// Whether `relation` is currently cataloged.
    fn contains_relation(&self, relation: Token) -> IndexResult<bool>;

    /// Values of the named role on a relation.
    fn value_tokens(&self, name: &str, relation: Token) -> IndexResult<TokenSet>;

    /// Names of the roles this catalog indexes.
    fn value_index_names(&self) -> Vec<String>;

    /// Multi-hop walk from `seeds`; see [`walk_relation_chains`] for a
    /// ready-made implementation.
    fn relation_token_chains(
        &self,
        query: &Query,
        seeds: &TokenSet,
        factory: &QueryFactory,
        max_depth: Option<usize>,
    ) -> IndexResult<Vec<Vec<Token>>>;
}
