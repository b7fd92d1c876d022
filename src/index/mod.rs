//! Search indexes maintained incrementally from catalog change notifications.

pub mod closure;
pub mod combinations;
pub mod composite;
pub mod transitive;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::catalog::{Catalog, QueryFactory, RelationFilter};
use crate::types::{Changes, IndexResult, Query, Token, TokenSet};

pub use closure::{ClosureMap, NamedClosureMaps};
pub use combinations::{CandidateSet, Combination, Combinations};
pub use composite::{CompositeIndex, ValueRequest, ValueSource};
pub use transitive::TransitiveIndex;

/// Change notifications a catalog delivers, synchronously, on every mutation.
pub trait RelationListener {
    fn relation_added(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        additions: &Changes,
    ) -> IndexResult<()>;

    fn relation_modified(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        additions: &Changes,
        removals: &Changes,
    ) -> IndexResult<()>;

    fn relation_removed(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        removals: &Changes,
    ) -> IndexResult<()>;

    /// Bulk (re)population.
    fn source_added(&mut self, catalog: &dyn Catalog) -> IndexResult<()>;

    /// Bulk re-derivation from the catalog's current relations.
    fn source_removed(&mut self, catalog: &dyn Catalog) -> IndexResult<()>;

    /// The catalog dropped everything; rebuild if attached to it.
    fn source_cleared(&mut self, catalog: &dyn Catalog) -> IndexResult<()>;
}

/// Everything a search asks for. Only `query` is mandatory.
#[derive(Clone, Copy)]
pub struct SearchRequest<'a> {
    /// Return values of this role instead of relation tokens.
    pub name: Option<&'a str>,
    pub query: &'a Query,
    pub max_depth: Option<usize>,
    /// Vets each intermediate chain.
    pub filter: Option<&'a RelationFilter>,
    /// Results must also match this query.
    pub target_query: Option<&'a Query>,
    /// Vets each result chain.
    pub target_filter: Option<&'a RelationFilter>,
    /// Expansion plugin the search walks with.
    pub query_factory: Option<&'a QueryFactory>,
}

impl<'a> SearchRequest<'a> {
    pub fn new(query: &'a Query) -> Self {
        Self {
            name: None,
            query,
            max_depth: None,
            filter: None,
            target_query: None,
            target_filter: None,
            query_factory: None,
        }
    }

    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn filter(mut self, filter: &'a RelationFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn target_query(mut self, query: &'a Query) -> Self {
        self.target_query = Some(query);
        self
    }

    pub fn target_filter(mut self, filter: &'a RelationFilter) -> Self {
        self.target_filter = Some(filter);
        self
    }

    pub fn factory(mut self, factory: &'a QueryFactory) -> Self {
        self.query_factory = Some(factory);
        self
    }
}

/// A listener that can also answer searches from its maintained state.
pub trait SearchIndex: RelationListener {
    /// Attach to (`Some`) or detach from (`None`) a catalog. Attaching
    /// builds the index from the catalog's current relations; attaching an
    /// already attached index fails with `AlreadyAttached`.
    fn set_catalog(&mut self, catalog: Option<&dyn Catalog>) -> IndexResult<()>;

    fn is_attached(&self) -> bool;

    /// Roles whose change requires re-indexing.
    fn update_names(&self) -> &BTreeSet<String>;

    /// `Ok(None)` when this index cannot answer the request; the caller must
    /// fall back to another path. `Ok(Some(empty))` is a real empty answer.
    fn get_results(
        &self,
        catalog: &dyn Catalog,
        request: &SearchRequest<'_>,
    ) -> IndexResult<Option<TokenSet>>;

    /// Independent deep copy, optionally bound to another catalog.
    fn copy(&self, catalog: Option<&dyn Catalog>) -> Self
    where
        Self: Sized;
}

/// Summary of an index's shape and size.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub kind: &'static str,
    pub attached: bool,
    pub entries: usize,
    pub update: Vec<String>,
}

/// The index kinds a catalog can host.
pub enum RelationIndex {
    Transitive(TransitiveIndex),
    Composite(CompositeIndex),
}

impl std::fmt::Debug for RelationIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Transitive(_) => "Transitive",
            Self::Composite(_) => "Composite",
        };
        f.debug_tuple(name).finish_non_exhaustive()
    }
}

impl RelationIndex {
    pub fn stats(&self) -> IndexStats {
        let (kind, entries) = match self {
            Self::Transitive(ix) => ("transitive", ix.len()),
            Self::Composite(ix) => ("composite", ix.len()),
        };
        IndexStats {
            kind,
            attached: self.is_attached(),
            entries,
            update: self.update_names().iter().cloned().collect(),
        }
    }

    /// [`RelationIndex::stats`] as JSON.
    pub fn stats_json(&self) -> IndexResult<serde_json::Value> {
        Ok(serde_json::to_value(self.stats())?)
    }

    pub fn as_transitive(&self) -> Option<&TransitiveIndex> {
        match self {
            Self::Transitive(ix) => Some(ix),
            Self::Composite(_) => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeIndex> {
        match self {
            Self::Composite(ix) => Some(ix),
            Self::Transitive(_) => None,
        }
    }
}

impl From<TransitiveIndex> for RelationIndex {
    fn from(index: TransitiveIndex) -> Self {
        Self::Transitive(index)
    }
}

impl From<CompositeIndex> for RelationIndex {
    fn from(index: CompositeIndex) -> Self {
        Self::Composite(index)
    }
}

macro_rules! dispatch {
    ($self:expr, $ix:ident => $body:expr) => {
        match $self {
            RelationIndex::Transitive($ix) => $body,
            RelationIndex::Composite($ix) => $body,
        }
    };
}

impl RelationListener for RelationIndex {
    fn relation_added(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        additions: &Changes,
    ) -> IndexResult<()> {
        dispatch!(self, ix => ix.relation_added(token, catalog, additions))
    }

    fn relation_modified(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        additions: &Changes,
        removals: &Changes,
    ) -> IndexResult<()> {
        dispatch!(self, ix => ix.relation_modified(token, catalog, additions, removals))
    }

    fn relation_removed(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        removals: &Changes,
    ) -> IndexResult<()> {
        dispatch!(self, ix => ix.relation_removed(token, catalog, removals))
    }

    fn source_added(&mut self, catalog: &dyn Catalog) -> IndexResult<()> {
        dispatch!(self, ix => ix.source_added(catalog))
    }

    fn source_removed(&mut self, catalog: &dyn Catalog) -> IndexResult<()> {
        dispatch!(self, ix => ix.source_removed(catalog))
    }

    fn source_cleared(&mut self, catalog: &dyn Catalog) -> IndexResult<()> {
        dispatch!(self, ix => ix.source_cleared(catalog))
    }
}

impl SearchIndex for RelationIndex {
    fn set_catalog(&mut self, catalog: Option<&dyn Catalog>) -> IndexResult<()> {
        dispatch!(self, ix => ix.set_catalog(catalog))
    }

    fn is_attached(&self) -> bool {
        dispatch!(self, ix => ix.is_attached())
    }

    fn update_names(&self) -> &BTreeSet<String> {
        dispatch!(self, ix => ix.update_names())
    }

    fn get_results(
        &self,
        catalog: &dyn Catalog,
        request: &SearchRequest<'_>,
    ) -> IndexResult<Option<TokenSet>> {
        dispatch!(self, ix => ix.get_results(catalog, request))
    }

    fn copy(&self, catalog: Option<&dyn Catalog>) -> Self {
        match self {
            Self::Transitive(ix) => Self::Transitive(ix.copy(catalog)),
            Self::Composite(ix) => Self::Composite(ix.copy(catalog)),
        }
    }
}
