//! Multi-hop relation walks (BFS over query expansions).

use std::collections::VecDeque;

use crate::types::{IndexResult, Query, Token, TokenSet};

use super::{Catalog, QueryFactory};

/// Breadth-first walk yielding one chain per reached relation.
///
/// Every seed is yielded as a one-element chain. Each further hop asks
/// `factory` for the queries that extend the current chain and follows every
/// relation they match that has not been reached before, so cycles terminate.
/// `max_depth` bounds chain length.
pub fn walk_relation_chains(
    catalog: &dyn Catalog,
    query: &Query,
    seeds: &TokenSet,
    factory: &QueryFactory,
    max_depth: Option<usize>,
) -> IndexResult<Vec<Vec<Token>>> {
    let mut visited: TokenSet = TokenSet::new();
    let mut chains: Vec<Vec<Token>> = Vec::new();
    let mut queue: VecDeque<Vec<Token>> = VecDeque::new();

    for &seed in seeds {
        if visited.insert(seed) {
            queue.push_back(vec![seed]);
        }
    }

    while let Some(chain) = queue.pop_front() {
        if max_depth.map_or(true, |max| chain.len() < max) {
            let queries = factory.expand(query, &chain, catalog)?.unwrap_or_default();
            for q in &queries {
                let Some(rels) = catalog.relation_tokens(q)? else {
                    continue;
                };
                for rel in rels {
                    if visited.insert(rel) {
                        let mut next = Vec::with_capacity(chain.len() + 1);
                        next.extend_from_slice(&chain);
                        next.push(rel);
                        queue.push_back(next);
                    }
                }
            }
        }
        chains.push(chain);
    }

    Ok(chains)
}
