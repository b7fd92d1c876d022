//! Searches: ask each search index, fall back to walking the store.

use crate::catalog::{Catalog, TargetCheck};
use crate::index::{SearchIndex, SearchRequest};
use crate::types::{IndexResult, Query, Token, TokenSet};

use super::RelationCatalog;

impl RelationCatalog {
    /// Relations matching the request, answered by the first search index
    /// that handles it.
    pub fn find_relation_tokens(&self, request: &SearchRequest<'_>) -> IndexResult<TokenSet> {
        for ix in &self.indexes {
            if let Some(found) = ix.get_results(&self.store, request)? {
                return Ok(found);
            }
        }
        log::trace!("no search index handled {:?}; walking", request.query);
        self.walk(request)
    }

    /// Values of `name` over the relations matching the request.
    pub fn find_value_tokens(
        &self,
        name: &str,
        request: &SearchRequest<'_>,
    ) -> IndexResult<TokenSet> {
        self.find_relation_tokens(&request.name(name))
    }

    /// Plain catalog lookup, no search indexes involved.
    pub fn relation_tokens(&self, query: &Query) -> IndexResult<TokenSet> {
        Ok(self.store.relation_tokens(query)?.unwrap_or_default())
    }

    /// The slow path: resolve the query, walk its expansions, filter.
    fn walk(&self, request: &SearchRequest<'_>) -> IndexResult<TokenSet> {
        let seeds = self.relation_tokens(request.query)?;
        let chains: Vec<Vec<Token>> = match request.query_factory {
            Some(factory) => self.store.relation_token_chains(
                request.query,
                &seeds,
                factory,
                request.max_depth,
            )?,
            None => seeds.iter().map(|&t| vec![t]).collect(),
        };
        let check = TargetCheck::new(request.target_query, request.target_filter, &self.store)?;

        let mut relations = TokenSet::new();
        for chain in &chains {
            let kept = request
                .filter
                .map_or(true, |f| f(chain, request.query, &self.store));
            if kept && check.accepts(chain, request.query, &self.store) {
                relations.extend(chain.last().copied());
            }
        }

        let Some(name) = request.name else {
            return Ok(relations);
        };
        let mut values = TokenSet::new();
        for rel in relations {
            values.extend(self.store.value_tokens(name, rel)?);
        }
        Ok(values)
    }
}
