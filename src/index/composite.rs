//! Composite attribute index: (role, value) combination -> matching relations.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogId, QueryFactory};
use crate::types::{Changes, IndexError, IndexResult, Token, TokenSet};

use super::combinations::{CandidateSet, Combination, Combinations};
use super::{RelationListener, SearchIndex, SearchRequest};

/// Context handed to a [`ValueSource`] for one role of one changed relation.
pub struct ValueRequest<'a> {
    pub name: &'a str,
    pub token: Token,
    pub catalog: &'a dyn Catalog,
    pub additions: &'a Changes,
    pub removals: &'a Changes,
    pub removed: bool,
}

/// Overrides which values of a role get enumerated for a changed relation.
/// Returning `Ok(None)` falls back to the default enumeration.
pub trait ValueSource: Send + Sync {
    fn candidate_values(&self, request: &ValueRequest<'_>) -> IndexResult<Option<CandidateSet>>;
}

impl<F> ValueSource for F
where
    F: Fn(&ValueRequest<'_>) -> IndexResult<Option<CandidateSet>> + Send + Sync,
{
    fn candidate_values(&self, request: &ValueRequest<'_>) -> IndexResult<Option<CandidateSet>> {
        self(request)
    }
}

struct CombinationState {
    catalog: CatalogId,
    entries: BTreeMap<Combination, TokenSet>,
}

/// Indexes relations by combinations of role values.
pub struct CompositeIndex {
    names: Vec<String>,
    output: Option<String>,
    factory: Option<QueryFactory>,
    value_source: Option<Arc<dyn ValueSource>>,
    update_override: Option<BTreeSet<String>>,
    update: BTreeSet<String>,
    state: Option<CombinationState>,
}

impl CompositeIndex {
    /// Index combinations of the given roles.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        let mut index = Self {
            names,
            output: None,
            factory: None,
            value_source: None,
            update_override: None,
            update: BTreeSet::new(),
            state: None,
        };
        index.refresh_update();
        index
    }

    /// Answer with values of `name` instead of relation tokens.
    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.output = Some(name.into());
        self.refresh_update();
        self
    }

    /// Expand each combination through a query factory before resolving it.
    pub fn with_factory(mut self, factory: QueryFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Custom candidate values per role.
    pub fn with_value_source(mut self, source: impl ValueSource + 'static) -> Self {
        self.value_source = Some(Arc::new(source));
        self
    }

    /// Roles whose change triggers re-indexing, replacing the default of
    /// the tracked roles plus the output role.
    pub fn with_update<I, S>(mut self, update: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_override = Some(update.into_iter().map(Into::into).collect());
        self.refresh_update();
        self
    }

    fn refresh_update(&mut self) {
        self.update = match &self.update_override {
            Some(update) => update.clone(),
            None => self
                .names
                .iter()
                .chain(self.output.as_ref())
                .cloned()
                .collect(),
        };
    }

    /// Tracked roles, sorted.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn factory(&self) -> Option<&QueryFactory> {
        self.factory.as_ref()
    }

    /// The stored result for a combination.
    pub fn entry(&self, combination: &Combination) -> Option<&TokenSet> {
        self.state.as_ref()?.entries.get(combination)
    }

    /// Stored combinations in key order.
    pub fn combinations(&self) -> impl Iterator<Item = (&Combination, &TokenSet)> {
        self.state.iter().flat_map(|s| s.entries.iter())
    }

    /// Number of stored combinations.
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_current(&self, catalog: &dyn Catalog) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.catalog == catalog.id())
    }

    /// Every combination whose entry may be affected by the change.
    pub fn expand(
        &self,
        token: Token,
        catalog: &dyn Catalog,
        additions: &Changes,
        removals: &Changes,
        removed: bool,
    ) -> IndexResult<Combinations> {
        let changed = additions.touches(&self.names) || removals.touches(&self.names);
        if removed && !changed {
            return Ok(Combinations::empty());
        }
        let mut slots = Vec::with_capacity(self.names.len());
        for name in &self.names {
            if let Some(source) = &self.value_source {
                let request = ValueRequest {
                    name,
                    token,
                    catalog,
                    additions,
                    removals,
                    removed,
                };
                if let Some(values) = source.candidate_values(&request)? {
                    slots.push((name.clone(), values));
                    continue;
                }
            }
            // Old and new values both need their entries rebuilt.
            let mut values = CandidateSet::from([None]);
            values.extend(catalog.value_tokens(name, token)?.into_iter().map(Some));
            for changes in [additions, removals] {
                if let Some(vals) = changes.get(name) {
                    values.extend(vals.iter().copied().map(Some));
                }
            }
            slots.push((name.clone(), values));
        }
        Ok(Combinations::new(slots))
    }

    /// Recompute one combination's entry from the catalog.
    fn reindex_combination(
        &mut self,
        combination: &Combination,
        catalog: &dyn Catalog,
    ) -> IndexResult<()> {
        let query = combination.to_query();
        let queries = match &self.factory {
            Some(factory) => factory.expand(&query, &[], catalog)?.unwrap_or_default(),
            None => vec![query],
        };
        let mut result = TokenSet::new();
        for q in &queries {
            if let Some(rels) = catalog.relation_tokens(q)? {
                result.extend(rels);
            }
        }
        if let Some(output) = &self.output {
            let mut values = TokenSet::new();
            for &rel in &result {
                values.extend(catalog.value_tokens(output, rel)?);
            }
            result = values;
        }

        let state = self.state.as_mut().ok_or(IndexError::NotAttached)?;
        if result.is_empty() {
            state.entries.remove(combination);
        } else {
            state.entries.insert(combination.clone(), result);
        }
        Ok(())
    }

    fn index_changes(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        additions: &Changes,
        removals: &Changes,
        removed: bool,
    ) -> IndexResult<()> {
        if !additions.touches(&self.update) && !removals.touches(&self.update) {
            return Ok(());
        }
        if !self.is_current(catalog) {
            return Err(IndexError::NotAttached);
        }
        let combinations = self.expand(token, catalog, additions, removals, removed)?;
        log::trace!(
            "reindex {}: {} candidate combinations",
            token,
            combinations.total()
        );
        for combination in combinations {
            self.reindex_combination(&combination, catalog)?;
        }
        Ok(())
    }

    /// Re-derive every combination reachable from the catalog's current
    /// relations, each exactly once.
    fn rescan(&mut self, catalog: &dyn Catalog, removed: bool) -> IndexResult<()> {
        let names = catalog.value_index_names();
        let mut pending: BTreeSet<Combination> = BTreeSet::new();
        for token in catalog.all_relation_tokens()? {
            let mut current = Changes::new();
            for name in &names {
                current.insert(name.clone(), catalog.value_tokens(name, token)?);
            }
            let combinations = if removed {
                self.expand(token, catalog, &Changes::new(), &current, true)?
            } else {
                self.expand(token, catalog, &current, &Changes::new(), false)?
            };
            pending.extend(combinations);
        }
        log::debug!(
            "composite index over {:?}: rescanning {} combinations",
            self.names,
            pending.len()
        );
        for combination in &pending {
            self.reindex_combination(combination, catalog)?;
        }
        Ok(())
    }
}

impl RelationListener for CompositeIndex {
    fn relation_added(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        additions: &Changes,
    ) -> IndexResult<()> {
        self.index_changes(token, catalog, additions, &Changes::new(), false)
    }

    fn relation_modified(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        additions: &Changes,
        removals: &Changes,
    ) -> IndexResult<()> {
        self.index_changes(token, catalog, additions, removals, false)
    }

    fn relation_removed(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        removals: &Changes,
    ) -> IndexResult<()> {
        self.index_changes(token, catalog, &Changes::new(), removals, true)
    }

    fn source_added(&mut self, catalog: &dyn Catalog) -> IndexResult<()> {
        if !self.is_current(catalog) {
            return Err(IndexError::NotAttached);
        }
        self.rescan(catalog, false)
    }

    /// Only does anything useful when value derivation has changed since the
    /// entries were built.
    fn source_removed(&mut self, catalog: &dyn Catalog) -> IndexResult<()> {
        if !self.is_current(catalog) {
            return Err(IndexError::NotAttached);
        }
        self.rescan(catalog, true)
    }

    fn source_cleared(&mut self, catalog: &dyn Catalog) -> IndexResult<()> {
        if self.is_current(catalog) {
            self.set_catalog(None)?;
            self.set_catalog(Some(catalog))?;
        }
        Ok(())
    }
}

impl SearchIndex for CompositeIndex {
    fn set_catalog(&mut self, catalog: Option<&dyn Catalog>) -> IndexResult<()> {
        let Some(catalog) = catalog else {
            if self.state.take().is_some() {
                log::debug!("composite index over {:?} detached", self.names);
            }
            return Ok(());
        };
        if self.state.is_some() {
            return Err(IndexError::AlreadyAttached);
        }
        self.state = Some(CombinationState {
            catalog: catalog.id(),
            entries: BTreeMap::new(),
        });
        self.source_added(catalog)
    }

    fn is_attached(&self) -> bool {
        self.state.is_some()
    }

    fn update_names(&self) -> &BTreeSet<String> {
        &self.update
    }

    fn get_results(
        &self,
        _catalog: &dyn Catalog,
        request: &SearchRequest<'_>,
    ) -> IndexResult<Option<TokenSet>> {
        let Some(state) = self.state.as_ref() else {
            return Ok(None);
        };
        if request.name != self.output.as_deref()
            || !matches!(request.max_depth, None | Some(1))
            || request.query_factory != self.factory.as_ref()
            || request.target_query.is_some_and(|q| !q.is_empty())
            || request.filter.is_some()
            || request.target_filter.is_some()
        {
            return Ok(None);
        }
        let Some(combination) = Combination::from_query(request.query) else {
            log::trace!("declining multi-value query {:?}", request.query);
            return Ok(None);
        };
        if let Some(found) = state.entries.get(&combination) {
            return Ok(Some(found.clone()));
        }
        if combination.names().eq(self.names.iter().map(String::as_str)) {
            Ok(Some(TokenSet::new()))
        } else {
            Ok(None)
        }
    }

    fn copy(&self, catalog: Option<&dyn Catalog>) -> Self {
        Self {
            names: self.names.clone(),
            output: self.output.clone(),
            factory: self.factory.clone(),
            value_source: self.value_source.clone(),
            update_override: self.update_override.clone(),
            update: self.update.clone(),
            state: self.state.as_ref().map(|s| CombinationState {
                catalog: catalog.map_or(s.catalog, |c| c.id()),
                entries: s.entries.clone(),
            }),
        }
    }
}
