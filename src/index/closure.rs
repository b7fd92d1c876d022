//! Cycle-aware closure construction over an explicit frame stack.
//!
//! Tokens found to be mutually reachable during one walk are merged into a
//! single group. The group's closure is computed once, when the lowest frame
//! of the cycle finishes, and every member is pointed at the same set.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::catalog::{Catalog, QueryFactory};
use crate::types::{multiunion, IndexError, IndexResult, Query, SharedSet, Token, TokenSet};

/// token -> everything reachable from it, including itself.
pub type ClosureMap = HashMap<Token, SharedSet>;

/// secondary role -> token -> that role's values over the token's closure.
pub type NamedClosureMaps = BTreeMap<String, ClosureMap>;

/// Partial results shared by all frames of one (possibly merged) cycle group.
#[derive(Default)]
struct Group {
    /// Closure sets collected so far: direct successors, resolved children.
    sets: Vec<SharedSet>,
    /// Tokens that will receive this group's closure.
    members: BTreeSet<Token>,
}

impl Group {
    fn new(token: Token) -> Self {
        Self {
            sets: Vec::new(),
            members: BTreeSet::from([token]),
        }
    }

    fn absorb(&mut self, other: Group) {
        self.sets.extend(other.sets);
        self.members.extend(other.members);
    }
}

struct Frame {
    token: Token,
    group: usize,
    /// Successors still to be resolved.
    pending: Vec<Token>,
    expanded: bool,
    cycled: bool,
}

impl Frame {
    fn new(token: Token, group: usize) -> Self {
        Self {
            token,
            group,
            pending: Vec::new(),
            expanded: false,
            cycled: false,
        }
    }
}

/// Fills closure entries for tokens missing from the map.
pub(crate) struct ClosureBuilder<'a> {
    pub catalog: &'a dyn Catalog,
    pub factory: &'a QueryFactory,
    /// Static constraints plus the forward role.
    pub forward_query: &'a Query,
    pub closures: &'a mut ClosureMap,
    pub named: &'a mut NamedClosureMaps,
}

impl ClosureBuilder<'_> {
    /// Direct successors of `token` along the forward role.
    fn successors(&self, token: Token) -> IndexResult<TokenSet> {
        let queries = self
            .factory
            .expand(self.forward_query, &[token], self.catalog)?
            .unwrap_or_default();
        let mut found = Vec::with_capacity(queries.len());
        for q in &queries {
            if let Some(rels) = self.catalog.relation_tokens(q)? {
                found.push(rels);
            }
        }
        Ok(multiunion(found.iter()))
    }

    /// Compute the closure of `start` and of every token whose closure is
    /// settled on the way.
    pub fn build(&mut self, start: Token) -> IndexResult<()> {
        let mut groups: Vec<Group> = vec![Group::new(start)];
        let mut stack: Vec<Frame> = vec![Frame::new(start, 0)];

        while let Some(top) = stack.last_mut() {
            if !top.expanded {
                top.expanded = true;
                let token = top.token;
                let successors = self.successors(token)?;
                let group = &mut groups[top.group];
                for &rel in successors.iter().rev() {
                    if rel == token {
                        group.sets.push(Arc::new(TokenSet::from([token])));
                    } else {
                        top.pending.push(rel);
                    }
                }
                group.sets.push(Arc::new(successors));
            }

            if let Some(next) = top.pending.pop() {
                let current = top.group;
                if let Some(known) = self.closures.get(&next) {
                    groups[current].sets.push(Arc::clone(known));
                } else if let Some(pos) = stack.iter().rposition(|f| f.token == next) {
                    merge_cycle(&mut stack, &mut groups, pos);
                } else {
                    groups.push(Group::new(next));
                    stack.push(Frame::new(next, groups.len() - 1));
                }
                continue;
            }

            let Some(frame) = stack.pop() else {
                break;
            };
            if frame.cycled {
                if stack.is_empty() {
                    log::error!("closure walk for {} ended on a cycled frame", frame.token);
                    return Err(IndexError::CycledRoot(frame.token));
                }
                // Settled when the frame it was merged into finishes.
                continue;
            }

            let group = std::mem::take(&mut groups[frame.group]);
            let mut closure = multiunion(group.sets.iter().map(|s| s.as_ref()));
            closure.insert(frame.token);
            let closure = Arc::new(closure);
            self.store(&group.members, &closure)?;
            if let Some(parent) = stack.last() {
                groups[parent.group].sets.push(closure);
            }
        }

        Ok(())
    }

    fn store(&mut self, members: &BTreeSet<Token>, closure: &SharedSet) -> IndexResult<()> {
        for (name, ix) in self.named.iter_mut() {
            let mut values = TokenSet::new();
            for &rel in closure.iter() {
                values.extend(self.catalog.value_tokens(name, rel)?);
            }
            let values = Arc::new(values);
            for &member in members {
                ix.insert(member, Arc::clone(&values));
            }
        }
        for &member in members {
            self.closures.insert(member, Arc::clone(closure));
        }
        log::trace!("settled closure of {:?}: {} tokens", members, closure.len());
        Ok(())
    }
}

/// Fold every frame above `ancestor` into the ancestor's group.
fn merge_cycle(stack: &mut [Frame], groups: &mut [Group], ancestor: usize) {
    let target = stack[ancestor].group;
    for frame in &mut stack[ancestor + 1..] {
        if frame.group != target {
            let moved = std::mem::take(&mut groups[frame.group]);
            groups[target].absorb(moved);
            frame.group = target;
        }
        frame.cycled = true;
    }
}
