//! Constraint queries over relation roles.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Token, TokenSet};

/// The constraint placed on one role of a relation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QueryValue {
    /// The role must include this value.
    Token(Token),
    /// The role must have no value at all.
    Null,
    /// The role must include at least one of these values.
    Any(TokenSet),
}

impl QueryValue {
    /// Whether this constraint can match more than one value.
    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Any(_))
    }

    /// The single-value form used as a combination slot, if there is one.
    pub fn as_slot(&self) -> Option<Option<Token>> {
        match self {
            Self::Token(t) => Some(Some(*t)),
            Self::Null => Some(None),
            Self::Any(_) => None,
        }
    }
}

impl From<Token> for QueryValue {
    fn from(token: Token) -> Self {
        Self::Token(token)
    }
}

impl From<Option<Token>> for QueryValue {
    fn from(value: Option<Token>) -> Self {
        match value {
            Some(t) => Self::Token(t),
            None => Self::Null,
        }
    }
}

impl From<TokenSet> for QueryValue {
    fn from(tokens: TokenSet) -> Self {
        Self::Any(tokens)
    }
}

/// Role name -> constraint, kept sorted by role name.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    terms: BTreeMap<String, QueryValue>,
}

impl Query {
    /// An empty query, matching every relation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Query::set`].
    pub fn with(mut self, role: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.set(role, value);
        self
    }

    /// Set the constraint on a role, replacing any earlier one.
    pub fn set(&mut self, role: impl Into<String>, value: impl Into<QueryValue>) {
        self.terms.insert(role.into(), value.into());
    }

    /// The constraint on a role.
    pub fn get(&self, role: &str) -> Option<&QueryValue> {
        self.terms.get(role)
    }

    /// Remove a role's constraint.
    pub fn remove(&mut self, role: &str) -> Option<QueryValue> {
        self.terms.remove(role)
    }

    /// Whether the role is constrained.
    pub fn contains(&self, role: &str) -> bool {
        self.terms.contains_key(role)
    }

    /// Constrained roles in sorted order.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    /// (role, constraint) pairs in sorted order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, QueryValue> {
        self.terms.iter()
    }

    /// Number of constrained roles.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether no role is constrained.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            terms: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Query {
    type Item = (&'a String, &'a QueryValue);
    type IntoIter = btree_map::Iter<'a, String, QueryValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}

/// Per-role value changes reported with a mutation.
///
/// A role present with an empty set changed to or from having no value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Changes {
    values: BTreeMap<String, TokenSet>,
}

impl Changes {
    /// No changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Changes::insert`].
    pub fn with(mut self, role: impl Into<String>, values: TokenSet) -> Self {
        self.insert(role, values);
        self
    }

    /// Record the changed values for a role.
    pub fn insert(&mut self, role: impl Into<String>, values: TokenSet) {
        self.values.insert(role.into(), values);
    }

    /// Changed values for a role.
    pub fn get(&self, role: &str) -> Option<&TokenSet> {
        self.values.get(role)
    }

    /// Whether the role changed.
    pub fn contains(&self, role: &str) -> bool {
        self.values.contains_key(role)
    }

    /// Changed role names.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Whether any of the given role names changed.
    pub fn touches<'a, I>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        names.into_iter().any(|name| self.values.contains_key(name))
    }

    /// (role, values) pairs in sorted order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, TokenSet> {
        self.values.iter()
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, TokenSet)> for Changes {
    fn from_iter<I: IntoIterator<Item = (K, TokenSet)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
