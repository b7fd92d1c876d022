//! In-memory relation store with per-role value indexes.

use std::collections::BTreeMap;

use crate::types::{IndexError, IndexResult, Query, QueryValue, Token, TokenSet};

use super::{walk_relation_chains, Catalog, CatalogId, QueryFactory};

/// Role name -> values held by one relation.
pub type RoleValues = BTreeMap<String, TokenSet>;

/// A relation catalog kept entirely in memory.
pub struct MemoryCatalog {
    id: CatalogId,
    /// Roles with a value index, sorted.
    names: Vec<String>,
    /// All relations, indexed by token.
    relations: BTreeMap<Token, RoleValues>,
    /// Value index: role -> value -> relations holding that value.
    value_index: BTreeMap<String, BTreeMap<Token, TokenSet>>,
}

impl MemoryCatalog {
    /// Create an empty catalog indexing the given roles.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        let value_index = names
            .iter()
            .map(|n| (n.clone(), BTreeMap::new()))
            .collect();
        Self {
            id: CatalogId::next(),
            names,
            relations: BTreeMap::new(),
            value_index,
        }
    }

    /// Number of relations.
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Whether the catalog holds no relations.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Role values of a relation.
    pub fn get(&self, relation: Token) -> Option<&RoleValues> {
        self.relations.get(&relation)
    }

    /// Store a relation, returning its previous role values if it existed.
    /// Roles with no values are not stored.
    pub fn insert(&mut self, relation: Token, mut values: RoleValues) -> Option<RoleValues> {
        values.retain(|_, v| !v.is_empty());
        let previous = self.detach(relation);
        for (name, vals) in &values {
            if let Some(ix) = self.value_index.get_mut(name) {
                for &v in vals {
                    ix.entry(v).or_default().insert(relation);
                }
            }
        }
        self.relations.insert(relation, values);
        previous
    }

    /// Remove a relation, returning its role values.
    pub fn remove(&mut self, relation: Token) -> IndexResult<RoleValues> {
        self.detach(relation)
            .ok_or(IndexError::UnknownRelation(relation))
    }

    /// Drop every relation.
    pub fn clear(&mut self) {
        self.relations.clear();
        for ix in self.value_index.values_mut() {
            ix.clear();
        }
    }

    fn detach(&mut self, relation: Token) -> Option<RoleValues> {
        let previous = self.relations.remove(&relation)?;
        for (name, vals) in &previous {
            let Some(ix) = self.value_index.get_mut(name) else {
                continue;
            };
            for v in vals {
                if let Some(holders) = ix.get_mut(v) {
                    holders.remove(&relation);
                    if holders.is_empty() {
                        ix.remove(v);
                    }
                }
            }
        }
        Some(previous)
    }

    fn matching(&self, name: &str, value: &QueryValue) -> Option<TokenSet> {
        let ix = self.value_index.get(name)?;
        let found = match value {
            QueryValue::Token(v) => ix.get(v).cloned().unwrap_or_default(),
            QueryValue::Any(values) => {
                let mut found = TokenSet::new();
                for v in values {
                    if let Some(holders) = ix.get(v) {
                        found.extend(holders.iter().copied());
                    }
                }
                found
            }
            QueryValue::Null => self
                .relations
                .iter()
                .filter(|(_, vals)| !vals.contains_key(name))
                .map(|(&t, _)| t)
                .collect(),
        };
        Some(found)
    }
}

impl Catalog for MemoryCatalog {
    fn id(&self) -> CatalogId {
        self.id
    }

    fn relation_tokens(&self, query: &Query) -> IndexResult<Option<TokenSet>> {
        let mut result: Option<TokenSet> = None;
        for (name, value) in query {
            let Some(found) = self.matching(name, value) else {
                return Ok(None);
            };
            let narrowed = match result {
                None => found,
                Some(acc) => acc.intersection(&found).copied().collect(),
            };
            if narrowed.is_empty() {
                return Ok(Some(narrowed));
            }
            result = Some(narrowed);
        }
        match result {
            Some(set) => Ok(Some(set)),
            None => Ok(Some(self.relations.keys().copied().collect())),
        }
    }

    fn all_relation_tokens(&self) -> IndexResult<TokenSet> {
        Ok(self.relations.keys().copied().collect())
    }

    fn contains_relation(&self, relation: Token) -> IndexResult<bool> {
        Ok(self.relations.contains_key(&relation))
    }

    fn value_tokens(&self, name: &str, relation: Token) -> IndexResult<TokenSet> {
        Ok(self
            .relations
            .get(&relation)
            .and_then(|vals| vals.get(name))
            .cloned()
            .unwrap_or_default())
    }

    fn value_index_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn relation_token_chains(
        &self,
        query: &Query,
        seeds: &TokenSet,
        factory: &QueryFactory,
        max_depth: Option<usize>,
    ) -> IndexResult<Vec<Vec<Token>>> {
        walk_relation_chains(self, query, seeds, factory, max_depth)
    }
}
