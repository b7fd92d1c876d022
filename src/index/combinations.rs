//! Combination keys and their cartesian enumeration.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Query, QueryValue, Token};

/// Candidate values for one role; `None` stands for "no value".
pub type CandidateSet = BTreeSet<Option<Token>>;

/// An ordered tuple of (role, value) pairs used as a composite index key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Combination(Vec<(String, Option<Token>)>);

impl Combination {
    /// Build a key, sorting the pairs by role name.
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<Token>)>,
        S: Into<String>,
    {
        let mut pairs: Vec<(String, Option<Token>)> =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Self(pairs)
    }

    /// The key a single-valued query would be stored under. `None` if any
    /// role is constrained to several values.
    pub fn from_query(query: &Query) -> Option<Self> {
        query
            .iter()
            .map(|(role, value)| value.as_slot().map(|slot| (role.clone(), slot)))
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// The equivalent catalog query.
    pub fn to_query(&self) -> Query {
        self.0
            .iter()
            .map(|(role, value)| (role.clone(), QueryValue::from(*value)))
            .collect()
    }

    /// Role names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// The value for a role.
    pub fn get(&self, role: &str) -> Option<Option<Token>> {
        self.0.iter().find(|(name, _)| name == role).map(|(_, v)| *v)
    }

    pub fn pairs(&self) -> &[(String, Option<Token>)] {
        &self.0
    }
}

/// Lazy cartesian product over per-role candidate sets.
///
/// The first role varies fastest. A role with no candidates makes the product
/// empty. [`Combinations::restart`] rewinds to the first combination.
#[derive(Debug, Clone)]
pub struct Combinations {
    slots: Vec<(String, Vec<Option<Token>>)>,
    cursor: Vec<usize>,
    /// Nothing to enumerate at all.
    void: bool,
    done: bool,
}

impl Combinations {
    /// Product of the given (role, candidates) slots, in role-name order.
    pub fn new(mut slots: Vec<(String, CandidateSet)>) -> Self {
        slots.sort_by(|a, b| a.0.cmp(&b.0));
        let slots: Vec<(String, Vec<Option<Token>>)> = slots
            .into_iter()
            .map(|(name, values)| (name, values.into_iter().collect()))
            .collect();
        let void = slots.iter().any(|(_, values)| values.is_empty());
        Self {
            cursor: vec![0; slots.len()],
            slots,
            void,
            done: void,
        }
    }

    /// A product with nothing in it.
    pub fn empty() -> Self {
        Self {
            slots: Vec::new(),
            cursor: Vec::new(),
            void: true,
            done: true,
        }
    }

    /// Rewind to the first combination.
    pub fn restart(&mut self) {
        self.cursor.iter_mut().for_each(|c| *c = 0);
        self.done = self.void;
    }

    /// Total number of combinations, ignoring progress.
    pub fn total(&self) -> usize {
        if self.void {
            return 0;
        }
        self.slots.iter().map(|(_, values)| values.len()).product()
    }

    fn advance(&mut self) {
        for (pos, (_, values)) in self.cursor.iter_mut().zip(&self.slots) {
            *pos += 1;
            if *pos < values.len() {
                return;
            }
            *pos = 0;
        }
        self.done = true;
    }
}

impl Iterator for Combinations {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        if self.done {
            return None;
        }
        let combination = Combination(
            self.slots
                .iter()
                .zip(&self.cursor)
                .map(|((name, values), &pos)| (name.clone(), values[pos]))
                .collect(),
        );
        self.advance();
        Some(combination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str, values: &[Option<u64>]) -> (String, CandidateSet) {
        (
            name.to_string(),
            values.iter().map(|v| v.map(Token)).collect(),
        )
    }

    #[test]
    fn test_product_covers_every_pairing() {
        let combos: Vec<Combination> = Combinations::new(vec![
            slot("size", &[Some(1), Some(2)]),
            slot("color", &[None, Some(7), Some(8)]),
        ])
        .collect();
        assert_eq!(combos.len(), 6);
        let unique: BTreeSet<_> = combos.iter().cloned().collect();
        assert_eq!(unique.len(), 6);
        assert!(combos.iter().all(|c| c.names().eq(["color", "size"])));
        assert!(unique.contains(&Combination::new([
            ("color", Some(Token(8))),
            ("size", Some(Token(2))),
        ])));
    }

    #[test]
    fn test_empty_slot_yields_nothing() {
        let mut combos = Combinations::new(vec![slot("a", &[Some(1)]), slot("b", &[])]);
        assert_eq!(combos.total(), 0);
        assert!(combos.next().is_none());
    }

    #[test]
    fn test_restart_replays_sequence() {
        let mut combos = Combinations::new(vec![slot("a", &[Some(1), None])]);
        let first: Vec<_> = combos.by_ref().collect();
        assert!(combos.next().is_none());
        combos.restart();
        let second: Vec<_> = combos.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_query_round_trip_rejects_multi_values() {
        let combo = Combination::new([("b", None), ("a", Some(Token(3)))]);
        let query = combo.to_query();
        assert_eq!(Combination::from_query(&query), Some(combo));

        let multi = Query::new().with("a", QueryValue::Any([Token(1), Token(2)].into()));
        assert_eq!(Combination::from_query(&multi), None);
    }
}
