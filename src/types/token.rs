//! Tokens and the token-set algebra shared by every index.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a relation or an attribute value, allocated by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub u64);

impl Token {
    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Token {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered set of tokens.
pub type TokenSet = BTreeSet<Token>;

/// A stored closure entry. Entries are never mutated once stored, so tokens on
/// the same cycle point at one allocation.
pub type SharedSet = Arc<TokenSet>;

/// N-way union.
pub fn multiunion<'a, I>(sets: I) -> TokenSet
where
    I: IntoIterator<Item = &'a TokenSet>,
{
    let mut result = TokenSet::new();
    for set in sets {
        if result.is_empty() {
            result.clone_from(set);
        } else {
            result.extend(set.iter().copied());
        }
    }
    result
}

/// Build a token set from raw ids.
pub fn token_set<I>(ids: I) -> TokenSet
where
    I: IntoIterator<Item = u64>,
{
    ids.into_iter().map(Token).collect()
}
