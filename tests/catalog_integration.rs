//! Catalog integration tests: storage, fallback search, configuration.

use tempfile::NamedTempFile;

use relation_index::catalog::memory::RoleValues;
use relation_index::catalog::walk_relation_chains;
use relation_index::{
    token_set, Catalog, IndexConfig, IndexError, MemoryCatalog, Query, QueryFactory, QueryValue,
    RelationCatalog, SearchIndex, SearchRequest, Token, TokenSet,
};

// ==================== Helpers ====================

const ROLES: [&str; 4] = ["node", "next", "label", "kind"];

/// 1 -> 2 -> 3 -> 4, every relation of kind 7.
const CHAIN: [(u64, &[u64]); 4] = [(1, &[2]), (2, &[3]), (3, &[4]), (4, &[])];

const CONFIG: &str = r#"
[[transitive]]
forward = "node"
reverse = "next"
names = ["label"]
static = { kind = 7 }

[[composite]]
names = ["kind", "label"]
output = "node"
"#;

fn edge(id: u64, next: &[u64]) -> RoleValues {
    RoleValues::from([
        ("node".to_string(), token_set([id])),
        ("next".to_string(), token_set(next.iter().copied())),
        ("label".to_string(), token_set([100 + id])),
        ("kind".to_string(), token_set([7])),
    ])
}

fn chain_store() -> MemoryCatalog {
    let mut store = MemoryCatalog::new(ROLES);
    for (id, next) in CHAIN {
        store.insert(Token(id), edge(id, next));
    }
    store
}

fn configured_catalog() -> RelationCatalog {
    let config = IndexConfig::from_toml_str(CONFIG).unwrap();
    let mut cat = RelationCatalog::new(ROLES);
    for index in config.build().unwrap() {
        cat.add_search_index(index).unwrap();
    }
    for (id, next) in CHAIN {
        cat.index(Token(id), edge(id, next)).unwrap();
    }
    cat
}

// ==================== Memory catalog ====================

#[test]
fn test_memory_catalog_constraints() {
    let store = chain_store();

    let by_node = Query::new().with("node", Token(2));
    assert_eq!(store.relation_tokens(&by_node).unwrap(), Some(token_set([2])));

    let dead_end = Query::new().with("next", QueryValue::Null);
    assert_eq!(store.relation_tokens(&dead_end).unwrap(), Some(token_set([4])));

    let either = Query::new().with("next", QueryValue::Any(token_set([2, 4])));
    assert_eq!(store.relation_tokens(&either).unwrap(), Some(token_set([1, 3])));

    let both = Query::new()
        .with("next", QueryValue::Any(token_set([2, 4])))
        .with("label", Token(103));
    assert_eq!(store.relation_tokens(&both).unwrap(), Some(token_set([3])));

    let undeclared = Query::new().with("colour", Token(1));
    assert_eq!(store.relation_tokens(&undeclared).unwrap(), None);

    assert_eq!(
        store.relation_tokens(&Query::new()).unwrap(),
        Some(token_set([1, 2, 3, 4]))
    );
}

#[test]
fn test_memory_catalog_replace_and_remove() {
    let mut store = chain_store();
    let previous = store.insert(Token(1), edge(1, &[3])).unwrap();
    assert_eq!(previous.get("next"), Some(&token_set([2])));
    assert_eq!(store.value_tokens("next", Token(1)).unwrap(), token_set([3]));

    let removed = store.remove(Token(1)).unwrap();
    assert_eq!(removed.get("node"), Some(&token_set([1])));
    assert!(!store.contains_relation(Token(1)).unwrap());
    assert_eq!(
        store
            .relation_tokens(&Query::new().with("next", Token(3)))
            .unwrap(),
        Some(token_set([2]))
    );

    let err = store.remove(Token(1)).unwrap_err();
    assert!(matches!(err, IndexError::UnknownRelation(Token(1))));
}

// ==================== Chain walks ====================

#[test]
fn test_transposing_expansion() {
    let store = chain_store();
    let factory = QueryFactory::transposing("node", "next");
    let query = Query::new().with("kind", Token(7)).with("node", Token(1));

    let start = factory.expand(&query, &[], &store).unwrap();
    assert_eq!(start, Some(vec![query.clone()]));

    let step = factory.expand(&query, &[Token(1)], &store).unwrap();
    let expected = Query::new()
        .with("kind", Token(7))
        .with("node", QueryValue::Any(token_set([2])));
    assert_eq!(step, Some(vec![expected]));

    let end = factory.expand(&query, &[Token(4)], &store).unwrap();
    assert_eq!(end, Some(Vec::new()));

    let both = Query::new().with("node", Token(1)).with("next", Token(2));
    assert_eq!(factory.expand(&both, &[], &store).unwrap(), None);
    let neither = Query::new().with("kind", Token(7));
    assert_eq!(factory.expand(&neither, &[], &store).unwrap(), None);
}

#[test]
fn test_walk_yields_each_relation_once() {
    let mut store = chain_store();
    store.insert(Token(4), edge(4, &[1]));
    let factory = QueryFactory::transposing("node", "next");
    let query = Query::new().with("node", Token(1));

    let chains = walk_relation_chains(&store, &query, &token_set([1]), &factory, None).unwrap();
    let ends: Vec<Token> = chains.iter().filter_map(|c| c.last().copied()).collect();
    assert_eq!(ends, vec![Token(1), Token(2), Token(3), Token(4)]);
    assert_eq!(chains[3], vec![Token(1), Token(2), Token(3), Token(4)]);

    let short = walk_relation_chains(&store, &query, &token_set([1]), &factory, Some(2)).unwrap();
    assert_eq!(short, vec![vec![Token(1)], vec![Token(1), Token(2)]]);

    let reverse = Query::new().with("next", Token(1));
    let back = store
        .relation_token_chains(&reverse, &token_set([2]), &factory, None)
        .unwrap();
    let ends: TokenSet = back.iter().filter_map(|c| c.last().copied()).collect();
    assert_eq!(ends, token_set([1, 2, 3, 4]));
}

// ==================== Relation catalog ====================

#[test]
fn test_configured_indexes_answer_searches() {
    let cat = configured_catalog();
    assert_eq!(cat.indexes().len(), 2);
    let transitive = cat.indexes()[0].as_transitive().unwrap();
    let factory = transitive.factory().clone();

    let query = Query::new().with("kind", Token(7)).with("node", Token(2));
    let request = SearchRequest::new(&query).factory(&factory);
    assert_eq!(
        cat.indexes()[0].get_results(cat.store(), &request).unwrap(),
        Some(token_set([2, 3, 4]))
    );
    assert_eq!(
        cat.find_value_tokens("label", &request).unwrap(),
        token_set([102, 103, 104])
    );

    let composite = Query::new().with("kind", Token(7)).with("label", Token(103));
    let request = SearchRequest::new(&composite).name("node");
    assert_eq!(
        cat.indexes()[1].get_results(cat.store(), &request).unwrap(),
        Some(token_set([3]))
    );
}

#[test]
fn test_fallback_walk_honours_depth_and_targets() {
    let cat = configured_catalog();
    let factory = QueryFactory::transposing("node", "next");
    let query = Query::new().with("kind", Token(7)).with("node", Token(1));

    let shallow = SearchRequest::new(&query).factory(&factory).max_depth(2);
    assert_eq!(cat.indexes()[0].get_results(cat.store(), &shallow).unwrap(), None);
    assert_eq!(cat.find_relation_tokens(&shallow).unwrap(), token_set([1, 2]));
    assert_eq!(
        cat.find_value_tokens("label", &shallow).unwrap(),
        token_set([101, 102])
    );

    let target = Query::new().with("label", Token(104));
    let targeted = SearchRequest::new(&query)
        .factory(&factory)
        .name("label")
        .target_query(&target);
    assert_eq!(
        cat.indexes()[0].get_results(cat.store(), &targeted).unwrap(),
        None
    );
    assert_eq!(cat.find_relation_tokens(&targeted).unwrap(), token_set([104]));

    let plain = Query::new().with("label", Token(102));
    assert_eq!(
        cat.find_relation_tokens(&SearchRequest::new(&plain)).unwrap(),
        token_set([2])
    );
    assert_eq!(cat.relation_tokens(&plain).unwrap(), token_set([2]));
}

#[test]
fn test_unknown_relation_cannot_be_unindexed() {
    let mut cat = configured_catalog();
    let err = cat.unindex(Token(99)).unwrap_err();
    assert!(matches!(err, IndexError::UnknownRelation(Token(99))));
    assert_eq!(cat.store().relation_count(), 4);
}

#[test]
fn test_reindexing_identical_values_is_silent() {
    let mut cat = configured_catalog();
    let before = cat.indexes()[0]
        .as_transitive()
        .unwrap()
        .closure(Token(1))
        .cloned()
        .unwrap();
    cat.index(Token(1), edge(1, &[2])).unwrap();
    let after = cat.indexes()[0]
        .as_transitive()
        .unwrap()
        .closure(Token(1))
        .cloned()
        .unwrap();
    assert!(std::sync::Arc::ptr_eq(&before, &after));
}

#[test]
fn test_remove_search_index() {
    let mut cat = configured_catalog();
    let removed = cat.remove_search_index(1).unwrap();
    assert!(!removed.is_attached());
    assert!(removed.as_composite().is_some());
    assert_eq!(cat.indexes().len(), 1);

    let err = cat.remove_search_index(5).unwrap_err();
    assert!(matches!(err, IndexError::Config(_)));

    // Remaining index keeps tracking changes.
    cat.unindex(Token(3)).unwrap();
    let ix = cat.indexes()[0].as_transitive().unwrap();
    assert_eq!(ix.closure(Token(1)).map(|s| s.len()), Some(2));
}

#[test]
fn test_index_stats() {
    let cat = configured_catalog();
    let stats = cat.indexes()[0].stats();
    assert_eq!(stats.kind, "transitive");
    assert!(stats.attached);
    assert_eq!(stats.entries, 4);
    assert_eq!(stats.update, vec!["kind", "next", "node"]);

    let json = cat.indexes()[1].stats_json().unwrap();
    assert_eq!(json["kind"], "composite");
    assert_eq!(json["attached"], true);
    assert_eq!(json["entries"], 4);
    assert_eq!(json["update"], serde_json::json!(["kind", "label", "node"]));
}

// ==================== Configuration ====================

#[test]
fn test_config_round_trip_through_file() {
    let config = IndexConfig::from_toml_str(CONFIG).unwrap();
    assert_eq!(config.transitive.len(), 1);
    assert_eq!(config.transitive[0].statics.get("kind"), Some(&7));
    assert_eq!(config.composite[0].output.as_deref(), Some("node"));
    assert!(config.composite[0].update.is_none());

    let file = NamedTempFile::new().unwrap();
    config.save(file.path()).unwrap();
    let loaded = IndexConfig::load(file.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_with_transposing_composite() {
    let text = r#"
[[composite]]
names = ["node"]
update = ["node", "next"]

[composite.transposing]
forward = "node"
reverse = "next"
"#;
    let config = IndexConfig::from_toml_str(text).unwrap();
    assert!(config.transitive.is_empty());
    let indexes = config.build().unwrap();
    let composite = indexes[0].as_composite().unwrap();
    assert_eq!(
        composite.factory(),
        Some(&QueryFactory::transposing("node", "next"))
    );
    assert_eq!(composite.update_names().len(), 2);
}

#[test]
fn test_config_errors() {
    let same_roles = r#"
[[transitive]]
forward = "node"
reverse = "node"
"#;
    let config = IndexConfig::from_toml_str(same_roles).unwrap();
    assert!(matches!(config.build(), Err(IndexError::Config(_))));

    let pinned_forward = r#"
[[transitive]]
forward = "node"
reverse = "next"
static = { node = 1 }
"#;
    let config = IndexConfig::from_toml_str(pinned_forward).unwrap();
    assert!(matches!(config.build(), Err(IndexError::Config(_))));

    let no_names = r#"
[[composite]]
names = []
"#;
    let config = IndexConfig::from_toml_str(no_names).unwrap();
    assert!(matches!(config.build(), Err(IndexError::Config(_))));

    assert!(matches!(
        IndexConfig::from_toml_str("[[transitive]]\nforward = 3"),
        Err(IndexError::Config(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(IndexConfig::load(&missing), Err(IndexError::Io(_))));
}
