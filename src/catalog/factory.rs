//! Query expansion plugins: how one query becomes the sub-queries of the next
//! traversal step.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{IndexResult, Query, QueryValue, Token};

use super::Catalog;

/// A pluggable expansion step.
///
/// Given the originating query and the chain of relation tokens walked so far,
/// return the queries whose results extend the chain by one hop. An empty
/// chain asks for the queries that start the walk. `Ok(None)` means the
/// plugin does not understand the query's shape.
pub trait ExpandQueries: Send + Sync {
    fn expand(
        &self,
        query: &Query,
        chain: &[Token],
        catalog: &dyn Catalog,
    ) -> IndexResult<Option<Vec<Query>>>;
}

/// Follows a relation by swapping two roles: the next hop from relation `r`
/// looks for relations whose queried role holds any of `r`'s values for the
/// other role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransposingTransitive {
    pub forward: String,
    pub reverse: String,
}

impl TransposingTransitive {
    pub fn new(forward: impl Into<String>, reverse: impl Into<String>) -> Self {
        Self {
            forward: forward.into(),
            reverse: reverse.into(),
        }
    }

    fn counterpart(&self, role: &str) -> Option<&str> {
        if role == self.forward {
            Some(&self.reverse)
        } else if role == self.reverse {
            Some(&self.forward)
        } else {
            None
        }
    }
}

impl ExpandQueries for TransposingTransitive {
    fn expand(
        &self,
        query: &Query,
        chain: &[Token],
        catalog: &dyn Catalog,
    ) -> IndexResult<Option<Vec<Query>>> {
        let mut next = Query::new();
        let mut focus: Option<(&str, &str)> = None;
        for (role, value) in query {
            match self.counterpart(role) {
                Some(other) => {
                    // Both roles pinned: there is nothing left to walk.
                    if focus.is_some() {
                        return Ok(None);
                    }
                    focus = Some((role.as_str(), other));
                }
                None => next.set(role.clone(), value.clone()),
            }
        }
        let Some((role, other)) = focus else {
            return Ok(None);
        };
        let Some(&last) = chain.last() else {
            return Ok(Some(vec![query.clone()]));
        };
        let values = catalog.value_tokens(other, last)?;
        if values.is_empty() {
            return Ok(Some(Vec::new()));
        }
        next.set(role, QueryValue::Any(values));
        Ok(Some(vec![next]))
    }
}

/// The closed set of expansion plugins an index can be configured with.
#[derive(Clone)]
pub enum QueryFactory {
    Transposing(TransposingTransitive),
    /// Compared by identity of the shared plugin.
    Custom(Arc<dyn ExpandQueries>),
}

impl QueryFactory {
    /// Shorthand for a transposing factory.
    pub fn transposing(forward: impl Into<String>, reverse: impl Into<String>) -> Self {
        Self::Transposing(TransposingTransitive::new(forward, reverse))
    }

    /// Wrap a custom plugin.
    pub fn custom(plugin: impl ExpandQueries + 'static) -> Self {
        Self::Custom(Arc::new(plugin))
    }

    /// Expand `query` one step past `chain`.
    pub fn expand(
        &self,
        query: &Query,
        chain: &[Token],
        catalog: &dyn Catalog,
    ) -> IndexResult<Option<Vec<Query>>> {
        match self {
            Self::Transposing(t) => t.expand(query, chain, catalog),
            Self::Custom(plugin) => plugin.expand(query, chain, catalog),
        }
    }
}

impl PartialEq for QueryFactory {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Transposing(a), Self::Transposing(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => {
                std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for QueryFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transposing(t) => f.debug_tuple("Transposing").field(t).finish(),
            Self::Custom(plugin) => f
                .debug_tuple("Custom")
                .field(&(Arc::as_ptr(plugin) as *const ()))
                .finish(),
        }
    }
}
