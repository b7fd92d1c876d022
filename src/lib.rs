//! Incrementally maintained search indexes for relation catalogs.
//!
//! A catalog stores directed, attributed relations between opaque tokens. The
//! indexes here listen to its change notifications and keep precomputed
//! answers: transitive closures over a relation graph (cycles included) and
//! relation sets per combination of role values.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod index;
pub mod types;

// Re-export commonly used types at the crate root
pub use catalog::{
    Catalog, CatalogId, ExpandQueries, MemoryCatalog, QueryFactory, RelationFilter, TargetCheck,
    TransposingTransitive,
};
pub use config::{CompositeConfig, IndexConfig, TransitiveConfig, TransposingConfig};
pub use engine::RelationCatalog;
pub use index::{
    CandidateSet, Combination, Combinations, CompositeIndex, IndexStats, RelationIndex,
    RelationListener, SearchIndex, SearchRequest, TransitiveIndex, ValueRequest, ValueSource,
};
pub use types::{
    multiunion, token_set, Changes, IndexError, IndexResult, Query, QueryValue, SharedSet, Token,
    TokenSet,
};
