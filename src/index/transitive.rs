//! Transitive-closure search index.
//!
//! For a directed relation described by a forward and a reverse role, keeps
//! for every relation token the set of relations reachable by repeatedly
//! following the forward role (subject to static constraints), and, per
//! secondary role, the union of that role's values over the closure.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogId, QueryFactory, TargetCheck};
use crate::types::{
    multiunion, Changes, IndexError, IndexResult, Query, QueryValue, SharedSet, Token, TokenSet,
};

use super::closure::{ClosureBuilder, ClosureMap, NamedClosureMaps};
use super::{RelationListener, SearchIndex, SearchRequest};

/// One slot of a match template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Fixed(QueryValue),
    /// Any value accepted; the query's free role.
    Dynamic,
}

/// Static constraints plus one free role, sorted by role name.
type MatchTemplate = Vec<(String, Slot)>;

fn build_template(statics: &Query, dynamic: &str) -> MatchTemplate {
    let mut template: MatchTemplate = statics
        .iter()
        .map(|(k, v)| (k.clone(), Slot::Fixed(v.clone())))
        .collect();
    template.push((dynamic.to_string(), Slot::Dynamic));
    template.sort_by(|a, b| a.0.cmp(&b.0));
    template
}

fn template_matches(template: &MatchTemplate, query: &Query) -> bool {
    query.len() == template.len()
        && query
            .iter()
            .zip(template)
            .all(|((role, value), (name, slot))| {
                role == name
                    && match slot {
                        Slot::Fixed(expected) => value == expected,
                        Slot::Dynamic => true,
                    }
            })
}

struct ClosureState {
    catalog: CatalogId,
    closures: ClosureMap,
    named: NamedClosureMaps,
}

/// Maintains reachability closures for one relation graph.
pub struct TransitiveIndex {
    forward: String,
    reverse: String,
    statics: Query,
    names: BTreeSet<String>,
    update: BTreeSet<String>,
    forward_template: MatchTemplate,
    reverse_template: MatchTemplate,
    factory: QueryFactory,
    state: Option<ClosureState>,
}

impl TransitiveIndex {
    /// Index the relation that leads from `forward` values to `reverse`
    /// values, restricted to relations matching `statics`, additionally
    /// closing over each role in `names`.
    pub fn new<I, S>(
        forward: impl Into<String>,
        reverse: impl Into<String>,
        statics: Query,
        names: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let forward = forward.into();
        let reverse = reverse.into();
        let mut update: BTreeSet<String> = statics.roles().map(str::to_string).collect();
        update.insert(forward.clone());
        update.insert(reverse.clone());
        Self {
            forward_template: build_template(&statics, &forward),
            reverse_template: build_template(&statics, &reverse),
            factory: QueryFactory::transposing(forward.clone(), reverse.clone()),
            names: names.into_iter().map(Into::into).collect(),
            forward,
            reverse,
            statics,
            update,
            state: None,
        }
    }

    /// The expansion plugin queries must use to be answered here.
    pub fn factory(&self) -> &QueryFactory {
        &self.factory
    }

    pub fn forward(&self) -> &str {
        &self.forward
    }

    pub fn reverse(&self) -> &str {
        &self.reverse
    }

    pub fn statics(&self) -> &Query {
        &self.statics
    }

    /// Secondary roles closed over.
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// The stored closure of a relation, if currently computed. Relations
    /// outside the static constraints never have one.
    pub fn closure(&self, token: Token) -> Option<&SharedSet> {
        self.state.as_ref()?.closures.get(&token)
    }

    /// The stored secondary-role closure of a relation.
    pub fn named_closure(&self, name: &str, token: Token) -> Option<&SharedSet> {
        self.state.as_ref()?.named.get(name)?.get(&token)
    }

    /// Number of relations with a computed closure.
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.closures.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Static constraints plus the given role (value ignored by the factory).
    fn build_query(&self, dynamic: &str) -> Query {
        self.statics.clone().with(dynamic, QueryValue::Null)
    }

    /// Whether a cataloged relation carries every static constraint.
    fn admits(&self, token: Token, catalog: &dyn Catalog) -> IndexResult<bool> {
        if !catalog.contains_relation(token)? {
            return Ok(false);
        }
        for (role, expected) in self.statics.iter() {
            let values = catalog.value_tokens(role, token)?;
            let matched = match expected {
                QueryValue::Token(v) => values.contains(v),
                QueryValue::Null => values.is_empty(),
                QueryValue::Any(accepted) => !values.is_disjoint(accepted),
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Every relation the index keeps a closure for.
    fn participants(&self, catalog: &dyn Catalog) -> IndexResult<TokenSet> {
        if self.statics.is_empty() {
            return catalog.all_relation_tokens();
        }
        Ok(catalog.relation_tokens(&self.statics)?.unwrap_or_default())
    }

    /// Recompute every closure that may depend on `token`.
    pub fn reindex(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        removals: Option<&Changes>,
        remove: bool,
    ) -> IndexResult<()> {
        if !self.is_current(catalog) {
            return Err(IndexError::NotAttached);
        }

        let mut starts = TokenSet::from([token]);
        let detached = removals
            .and_then(|r| r.get(&self.forward))
            .cloned()
            .unwrap_or_default();
        if !detached.is_empty() {
            for &value in &detached {
                if catalog.contains_relation(value)? {
                    starts.insert(value);
                }
            }
            // Relations that still point at a value the change took away.
            let referrers = self
                .statics
                .clone()
                .with(self.reverse.clone(), QueryValue::Any(detached));
            if let Some(rels) = catalog.relation_tokens(&referrers)? {
                starts.extend(rels);
            }
        }

        let reverse_query = self.build_query(&self.reverse);
        let mut affected: TokenSet = catalog
            .relation_token_chains(&reverse_query, &starts, &self.factory, None)?
            .iter()
            .filter_map(|chain| chain.last().copied())
            .collect();
        if remove {
            affected.remove(&token);
        }
        let mut admitted = TokenSet::new();
        for &t in &affected {
            if self.admits(t, catalog)? {
                admitted.insert(t);
            }
        }

        let forward_query = self.build_query(&self.forward);
        let factory = &self.factory;
        let Some(state) = self.state.as_mut() else {
            return Err(IndexError::NotAttached);
        };
        if remove {
            state.closures.remove(&token);
            for ix in state.named.values_mut() {
                ix.remove(&token);
            }
        }
        // Cycles through `token` may leave old entries referring to each
        // other; none of them may survive into the rebuild.
        for t in &affected {
            state.closures.remove(t);
            if !admitted.contains(t) {
                for ix in state.named.values_mut() {
                    ix.remove(t);
                }
            }
        }
        log::trace!(
            "reindex {}: {} affected closures, {} rebuilt",
            token,
            affected.len(),
            admitted.len()
        );

        let mut builder = ClosureBuilder {
            catalog,
            factory,
            forward_query: &forward_query,
            closures: &mut state.closures,
            named: &mut state.named,
        };
        for &t in &admitted {
            if builder.closures.contains_key(&t) {
                continue;
            }
            builder.build(t)?;
        }
        Ok(())
    }

    /// Compute closures for every participating relation that lacks one.
    fn index_missing(&mut self, catalog: &dyn Catalog) -> IndexResult<()> {
        let tokens = self.participants(catalog)?;
        let forward_query = self.build_query(&self.forward);
        let factory = &self.factory;
        let state = match self.state.as_mut() {
            Some(state) => state,
            None => return Err(IndexError::NotAttached),
        };
        let mut builder = ClosureBuilder {
            catalog,
            factory,
            forward_query: &forward_query,
            closures: &mut state.closures,
            named: &mut state.named,
        };
        for token in tokens {
            if !builder.closures.contains_key(&token) {
                builder.build(token)?;
            }
        }
        Ok(())
    }

    fn attach(&mut self, catalog: &dyn Catalog) -> IndexResult<()> {
        if self.state.is_some() {
            return Err(IndexError::AlreadyAttached);
        }
        self.state = Some(ClosureState {
            catalog: catalog.id(),
            closures: ClosureMap::new(),
            named: self
                .names
                .iter()
                .map(|n| (n.clone(), ClosureMap::new()))
                .collect(),
        });
        log::debug!(
            "transitive index {}->{} attached; indexing",
            self.forward,
            self.reverse
        );
        self.index_missing(catalog)
    }

    fn is_current(&self, catalog: &dyn Catalog) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.catalog == catalog.id())
    }

    fn contains(&self, token: Token) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.closures.contains_key(&token))
    }
}

impl RelationListener for TransitiveIndex {
    fn relation_added(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        additions: &Changes,
    ) -> IndexResult<()> {
        if self.contains(token) && !additions.touches(&self.update) {
            return Ok(());
        }
        self.reindex(token, catalog, None, false)
    }

    fn relation_modified(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        additions: &Changes,
        removals: &Changes,
    ) -> IndexResult<()> {
        if self.contains(token)
            && !additions.touches(&self.update)
            && !removals.touches(&self.update)
        {
            return Ok(());
        }
        self.reindex(token, catalog, Some(removals), false)
    }

    fn relation_removed(
        &mut self,
        token: Token,
        catalog: &dyn Catalog,
        removals: &Changes,
    ) -> IndexResult<()> {
        self.reindex(token, catalog, Some(removals), true)
    }

    fn source_added(&mut self, catalog: &dyn Catalog) -> IndexResult<()> {
        if !self.is_current(catalog) {
            return Err(IndexError::NotAttached);
        }
        self.index_missing(catalog)
    }

    fn source_removed(&mut self, catalog: &dyn Catalog) -> IndexResult<()> {
        self.source_cleared(catalog)
    }

    fn source_cleared(&mut self, catalog: &dyn Catalog) -> IndexResult<()> {
        if self.is_current(catalog) {
            self.set_catalog(None)?;
            self.set_catalog(Some(catalog))?;
        }
        Ok(())
    }
}

impl SearchIndex for TransitiveIndex {
    fn set_catalog(&mut self, catalog: Option<&dyn Catalog>) -> IndexResult<()> {
        match catalog {
            None => {
                if self.state.take().is_some() {
                    log::debug!("transitive index {}->{} detached", self.forward, self.reverse);
                }
                Ok(())
            }
            Some(catalog) => self.attach(catalog),
        }
    }

    fn is_attached(&self) -> bool {
        self.state.is_some()
    }

    fn update_names(&self) -> &BTreeSet<String> {
        &self.update
    }

    fn get_results(
        &self,
        catalog: &dyn Catalog,
        request: &SearchRequest<'_>,
    ) -> IndexResult<Option<TokenSet>> {
        let Some(state) = self.state.as_ref() else {
            return Ok(None);
        };
        let wants_targets = request.target_query.is_some() || request.target_filter.is_some();
        if request.query_factory != Some(&self.factory)
            || request.name.is_some_and(|n| !self.names.contains(n))
            || request.max_depth.is_some()
            || request.filter.is_some()
            || (request.name.is_some() && wants_targets)
        {
            return Ok(None);
        }
        if !template_matches(&self.forward_template, request.query) {
            if template_matches(&self.reverse_template, request.query) {
                log::trace!("declining reverse-direction query {:?}", request.query);
            }
            return Ok(None);
        }

        let rels = match catalog.relation_tokens(request.query)? {
            Some(rels) if !rels.is_empty() => rels,
            _ => return Ok(Some(TokenSet::new())),
        };
        let ix = match request.name {
            Some(name) => match state.named.get(name) {
                Some(ix) => ix,
                None => return Ok(None),
            },
            None => &state.closures,
        };
        let result = multiunion(rels.iter().filter_map(|r| ix.get(r)).map(|s| s.as_ref()));
        if request.name.is_some() {
            return Ok(Some(result));
        }

        let check = TargetCheck::new(request.target_query, request.target_filter, catalog)?;
        Ok(Some(match check {
            TargetCheck::Unrestricted => result,
            TargetCheck::Nothing => TokenSet::new(),
            check => result
                .into_iter()
                .filter(|&rel| check.accepts(&[rel], request.query, catalog))
                .collect(),
        }))
    }

    fn copy(&self, catalog: Option<&dyn Catalog>) -> Self {
        let state = self.state.as_ref().map(|s| {
            let mut cloned: HashMap<*const TokenSet, SharedSet> = HashMap::new();
            let mut deep = |set: &SharedSet| -> SharedSet {
                Arc::clone(
                    cloned
                        .entry(Arc::as_ptr(set))
                        .or_insert_with(|| Arc::new(TokenSet::clone(set))),
                )
            };
            let closures: ClosureMap = s.closures.iter().map(|(&k, v)| (k, deep(v))).collect();
            let named: NamedClosureMaps = s
                .named
                .iter()
                .map(|(name, ix)| {
                    (
                        name.clone(),
                        ix.iter()
                            .map(|(&k, v)| (k, deep(v)))
                            .collect::<ClosureMap>(),
                    )
                })
                .collect();
            ClosureState {
                catalog: catalog.map_or(s.catalog, |c| c.id()),
                closures,
                named,
            }
        });
        Self {
            forward: self.forward.clone(),
            reverse: self.reverse.clone(),
            statics: self.statics.clone(),
            names: self.names.clone(),
            update: self.update.clone(),
            forward_template: self.forward_template.clone(),
            reverse_template: self.reverse_template.clone(),
            factory: self.factory.clone(),
            state,
        }
    }
}
