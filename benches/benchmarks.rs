//! Criterion benchmarks for relation-index.

use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use relation_index::catalog::memory::RoleValues;
use relation_index::{
    token_set, CompositeIndex, MemoryCatalog, Query, QueryFactory, RelationCatalog, SearchIndex,
    SearchRequest, Token, TransitiveIndex,
};

const ROLES: [&str; 4] = ["node", "next", "color", "size"];

fn relation(rng: &mut StdRng, id: u64, node_count: u64, edges_per_node: usize) -> RoleValues {
    let next: Vec<u64> = (0..edges_per_node)
        .map(|_| rng.gen_range(0..node_count))
        .collect();
    RoleValues::from([
        ("node".to_string(), token_set([id])),
        ("next".to_string(), token_set(next)),
        ("color".to_string(), token_set([rng.gen_range(0..8)])),
        ("size".to_string(), token_set([rng.gen_range(0..4)])),
    ])
}

/// Random relation graph with `node_count` relations and up to
/// `edges_per_node` successors each. Cycles are likely.
fn make_store(node_count: u64, edges_per_node: usize) -> MemoryCatalog {
    let mut rng = StdRng::seed_from_u64(17);
    let mut store = MemoryCatalog::new(ROLES);
    for id in 0..node_count {
        store.insert(Token(id), relation(&mut rng, id, node_count, edges_per_node));
    }
    store
}

fn transitive() -> TransitiveIndex {
    TransitiveIndex::new("node", "next", Query::new(), ["color"])
}

fn bench_closure_build_2k(c: &mut Criterion) {
    let store = make_store(2_000, 2);

    c.bench_function("closure_build_2k", |b| {
        b.iter(|| {
            let mut ix = transitive();
            ix.set_catalog(Some(&store)).unwrap();
            ix
        })
    });
}

fn bench_incremental_edge_change(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let mut cat = RelationCatalog::new(ROLES);
    cat.add_search_index(transitive()).unwrap();
    for id in 0..1_000 {
        cat.index(Token(id), relation(&mut rng, id, 1_000, 1))
            .unwrap();
    }

    c.bench_function("reindex_edge_change_1k", |b| {
        b.iter(|| {
            let id = rng.gen_range(0..1_000);
            cat.index(Token(id), relation(&mut rng, id, 1_000, 1))
                .unwrap();
        })
    });
}

fn bench_indexed_vs_walked_search(c: &mut Criterion) {
    let mut cat = RelationCatalog::new(ROLES);
    let store = make_store(5_000, 2);
    for id in 0..5_000 {
        if let Some(values) = store.get(Token(id)) {
            cat.index(Token(id), values.clone()).unwrap();
        }
    }
    cat.add_search_index(transitive()).unwrap();
    let factory = QueryFactory::transposing("node", "next");
    let query = Query::new().with("node", Token(0));

    c.bench_function("search_indexed_5k", |b| {
        let request = SearchRequest::new(&query).factory(&factory);
        b.iter(|| cat.find_relation_tokens(&request).unwrap())
    });

    c.bench_function("search_walked_5k", |b| {
        let request = SearchRequest::new(&query).factory(&factory).max_depth(64);
        b.iter(|| cat.find_relation_tokens(&request).unwrap())
    });
}

fn bench_composite_rescan_10k(c: &mut Criterion) {
    let store = make_store(10_000, 1);

    c.bench_function("composite_rescan_10k", |b| {
        b.iter(|| {
            let mut ix = CompositeIndex::new(["color", "size"]);
            ix.set_catalog(Some(&store)).unwrap();
            ix
        })
    });
}

criterion_group!(
    benches,
    bench_closure_build_2k,
    bench_incremental_edge_change,
    bench_indexed_vs_walked_search,
    bench_composite_rescan_10k,
);
criterion_main!(benches);
