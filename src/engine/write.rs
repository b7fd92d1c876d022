//! Mutations: store the change, then notify every search index.

use std::collections::BTreeSet;

use crate::catalog::memory::RoleValues;
use crate::catalog::Catalog;
use crate::index::RelationListener;
use crate::types::{Changes, IndexResult, Token, TokenSet};

use super::RelationCatalog;

/// Per-role differences between two value maps.
fn diff(old: &RoleValues, new: &RoleValues) -> (Changes, Changes) {
    let empty = TokenSet::new();
    let mut additions = Changes::new();
    let mut removals = Changes::new();
    let roles: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for role in roles {
        let before = old.get(role).unwrap_or(&empty);
        let after = new.get(role).unwrap_or(&empty);
        let added: TokenSet = after.difference(before).copied().collect();
        let removed: TokenSet = before.difference(after).copied().collect();
        if !added.is_empty() {
            additions.insert(role.clone(), added);
        }
        if !removed.is_empty() {
            removals.insert(role.clone(), removed);
        }
    }
    (additions, removals)
}

/// Every indexed role of a relation entering or leaving the catalog. Roles
/// it has no value for report an empty set.
fn as_changes(names: Vec<String>, values: &RoleValues) -> Changes {
    let mut changes: Changes = names.into_iter().map(|n| (n, TokenSet::new())).collect();
    for (role, vals) in values {
        changes.insert(role.clone(), vals.clone());
    }
    changes
}

impl RelationCatalog {
    /// Add a relation, or replace the role values of an existing one.
    pub fn index(&mut self, relation: Token, values: RoleValues) -> IndexResult<()> {
        match self.store.insert(relation, values) {
            None => {
                let current = self.store.get(relation).cloned().unwrap_or_default();
                let additions = as_changes(self.store.value_index_names(), &current);
                for ix in &mut self.indexes {
                    ix.relation_added(relation, &self.store, &additions)?;
                }
            }
            Some(previous) => {
                let current = self.store.get(relation).cloned().unwrap_or_default();
                let (additions, removals) = diff(&previous, &current);
                if additions.is_empty() && removals.is_empty() {
                    return Ok(());
                }
                for ix in &mut self.indexes {
                    ix.relation_modified(relation, &self.store, &additions, &removals)?;
                }
            }
        }
        Ok(())
    }

    /// Remove a relation.
    pub fn unindex(&mut self, relation: Token) -> IndexResult<()> {
        let previous = self.store.remove(relation)?;
        let removals = as_changes(self.store.value_index_names(), &previous);
        for ix in &mut self.indexes {
            ix.relation_removed(relation, &self.store, &removals)?;
        }
        Ok(())
    }

    /// Drop every relation and reset the search indexes.
    pub fn clear(&mut self) -> IndexResult<()> {
        self.store.clear();
        for ix in &mut self.indexes {
            ix.source_cleared(&self.store)?;
        }
        Ok(())
    }

    /// Ask every search index to re-derive its entries from the current
    /// relations. Only needed after changing how an index derives values.
    pub fn rederive(&mut self) -> IndexResult<()> {
        for ix in &mut self.indexes {
            ix.source_removed(&self.store)?;
        }
        Ok(())
    }
}
