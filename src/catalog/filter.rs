//! Target restrictions applied to search results.

use crate::types::{IndexResult, Query, Token, TokenSet};

use super::Catalog;

/// Callback vetting a candidate chain: `(chain, query, catalog) -> keep`.
pub type RelationFilter = dyn Fn(&[Token], &Query, &dyn Catalog) -> bool;

/// Resolved form of a target query plus target filter.
pub enum TargetCheck<'a> {
    /// Neither a target query nor a filter was given.
    Unrestricted,
    /// The target query matches nothing; no result can pass.
    Nothing,
    Check {
        targets: Option<TokenSet>,
        filter: Option<&'a RelationFilter>,
    },
}

impl<'a> TargetCheck<'a> {
    /// Resolve the target query once so each candidate is a set lookup.
    pub fn new(
        target_query: Option<&Query>,
        target_filter: Option<&'a RelationFilter>,
        catalog: &dyn Catalog,
    ) -> IndexResult<Self> {
        let targets = match target_query {
            Some(q) if !q.is_empty() => match catalog.relation_tokens(q)? {
                Some(set) if !set.is_empty() => Some(set),
                _ => return Ok(Self::Nothing),
            },
            _ => None,
        };
        if targets.is_none() && target_filter.is_none() {
            return Ok(Self::Unrestricted);
        }
        Ok(Self::Check {
            targets,
            filter: target_filter,
        })
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    /// Whether the chain's final relation passes.
    pub fn accepts(&self, chain: &[Token], query: &Query, catalog: &dyn Catalog) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Nothing => false,
            Self::Check { targets, filter } => {
                let Some(last) = chain.last() else {
                    return false;
                };
                if let Some(targets) = targets {
                    if !targets.contains(last) {
                        return false;
                    }
                }
                filter.map_or(true, |f| f(chain, query, catalog))
            }
        }
    }
}
