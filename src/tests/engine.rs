use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{Collaborators, Engine};
use crate::error::EngineError;
use crate::memory::MemoryStore;
use crate::store::{InteractionKind, VectorRepo};

/// Full stack over the in-memory store. Each test owns its engine; no
/// shared state between tests.
pub fn create_engine() -> (Engine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let collaborators = Collaborators {
        articles: store.clone(),
        interactions: store.clone(),
        stats: store.clone(),
        users: store.clone(),
    };

    let engine = Engine::new(EngineConfig::default(), collaborators, store.clone())
        .expect("failed to create engine");
    (engine, store)
}

/// An author plus three published articles on distinct topics.
fn seed_corpus(store: &MemoryStore) {
    store.add_user(1, "alice", Some("writes about machine learning")).unwrap();
    store.add_article(
        10,
        1,
        "Machine learning basics",
        "gradient descent optimizes model weights through training epochs",
        &["machine-learning", "tutorial"],
        true,
    ).unwrap();
    store.add_article(
        11,
        1,
        "Neural network training",
        "backpropagation computes gradient updates for every network layer",
        &["machine-learning", "deep-learning"],
        true,
    ).unwrap();
    store.add_article(
        12,
        1,
        "Sourdough bread at home",
        "flour water salt and patience produce an open airy crumb",
        &["baking", "food"],
        true,
    ).unwrap();
}

#[test]
fn test_refit_builds_vectors_for_all_articles() {
    let (engine, store) = create_engine();
    seed_corpus(&store);

    assert!(!engine.has_model());
    engine.refit().unwrap();
    assert!(engine.has_model());

    for id in [10, 11, 12] {
        let av = store.article_vector(id).unwrap().unwrap();
        assert_eq!(av.version, 1);
        assert!(!av.text_vector.is_empty());
    }
}

#[test]
fn test_refit_empty_corpus_is_noop() {
    let (engine, _store) = create_engine();
    engine.refit().unwrap();
    assert!(!engine.has_model());
}

#[test]
fn test_recommendations_require_fitted_model() {
    let (engine, store) = create_engine();
    store.add_user(2, "bob", None).unwrap();

    let err = engine.get_recommendations(2, "s1", 1, None).unwrap_err();
    assert!(matches!(err, EngineError::MissingVocabulary));
}

#[test]
fn test_cold_start_user_gets_popular_articles() {
    let (engine, store) = create_engine();
    seed_corpus(&store);
    store.set_stats(10, 50, 8, 2).unwrap();
    store.set_stats(11, 30, 3, 1).unwrap();
    engine.refit().unwrap();

    store.add_user(2, "bob", None).unwrap();
    engine.create_cold_start_vector(2).unwrap();

    let uv = store.user_vector(2).unwrap().unwrap();
    assert!(uv.freshness.is_dirty());
    assert!(!uv.text_vector.is_empty());

    // first request serves from the population-level vector
    let page = engine.get_recommendations(2, "s1", 1, None).unwrap();
    assert_eq!(page.total_results, 3);
    // ml articles dominate the popularity-weighted interest vector
    assert!(page.articles[0].article_id == 10 || page.articles[0].article_id == 11);
}

#[test]
fn test_liked_article_absent_from_every_page() {
    let (engine, store) = create_engine();
    seed_corpus(&store);
    store.set_stats(10, 10, 2, 0).unwrap();
    engine.refit().unwrap();

    store.add_user(2, "bob", None).unwrap();
    engine.create_cold_start_vector(2).unwrap();

    store.record_interaction(2, 10, InteractionKind::Like).unwrap();
    engine.mark_user_vector_dirty(2).unwrap();

    let page_size = 1;
    let first = engine
        .get_recommendations(2, "s2", 1, Some(page_size))
        .unwrap();
    for page in 1..=first.total_pages {
        let p = engine
            .get_recommendations(2, "s2", page, Some(page_size))
            .unwrap();
        assert!(p.articles.iter().all(|a| a.article_id != 10));
    }
}

#[test]
fn test_like_refreshes_interest_vector() {
    let (engine, store) = create_engine();
    seed_corpus(&store);
    engine.refit().unwrap();

    store.add_user(2, "bob", None).unwrap();
    store.record_interaction(2, 12, InteractionKind::Like).unwrap();
    // no vector row yet, so the dirty flag has nothing to set
    engine.mark_user_vector_dirty(2).unwrap();
    assert!(store.user_vector(2).unwrap().is_none());

    store.set_stats(12, 5, 1, 0).unwrap();
    engine.create_cold_start_vector(2).unwrap();
    let page = engine.get_recommendations(2, "s1", 1, None).unwrap();

    // the lazy recompute consumed the like, so the vector is fresh and
    // the liked article is excluded
    let uv = store.user_vector(2).unwrap().unwrap();
    assert!(!uv.freshness.is_dirty());
    assert!(page.articles.iter().all(|a| a.article_id != 12));
}

#[test]
fn test_trigger_recompute_runs_inline_without_queue() {
    let (engine, store) = create_engine();
    seed_corpus(&store);
    engine.refit().unwrap();

    store.update_article_content(10, "completely different subject matter now").unwrap();
    engine.trigger_vector_recompute(10).unwrap();

    let av = store.article_vector(10).unwrap().unwrap();
    assert_eq!(av.version, 2);
}

#[test]
fn test_queue_processes_tasks_and_drains_on_shutdown() {
    let (mut engine, store) = create_engine();
    seed_corpus(&store);
    engine.refit().unwrap();

    engine.run_queue();
    engine.trigger_vector_recompute(10).unwrap();
    engine.trigger_vector_recompute(11).unwrap();
    engine.shutdown();

    assert_eq!(store.article_vector(10).unwrap().unwrap().version, 2);
    assert_eq!(store.article_vector(11).unwrap().unwrap().version, 2);
}

#[test]
fn test_trigger_recompute_missing_article_is_not_an_error() {
    let (engine, store) = create_engine();
    seed_corpus(&store);
    engine.refit().unwrap();

    engine.trigger_vector_recompute(999).unwrap();
    assert!(store.article_vector(999).unwrap().is_none());
}

#[test]
fn test_purge_article_clears_vector_and_caches() {
    let (engine, store) = create_engine();
    seed_corpus(&store);
    engine.refit().unwrap();

    store.add_user(2, "bob", None).unwrap();
    store.set_stats(10, 5, 1, 0).unwrap();
    engine.create_cold_start_vector(2).unwrap();
    engine.get_recommendations(2, "s1", 1, None).unwrap();
    assert!(store.session_cache_len(2, "s1").unwrap() > 0);

    engine.purge_article(10).unwrap();
    assert!(store.article_vector(10).unwrap().is_none());

    let entries = store.session_cache_page(2, "s1", 0, 100).unwrap();
    assert!(entries.iter().all(|e| e.article_id != 10));
}

#[test]
fn test_purge_user_clears_vector_and_cache() {
    let (engine, store) = create_engine();
    seed_corpus(&store);
    engine.refit().unwrap();

    store.add_user(2, "bob", None).unwrap();
    store.set_stats(10, 5, 1, 0).unwrap();
    engine.create_cold_start_vector(2).unwrap();
    engine.get_recommendations(2, "s1", 1, None).unwrap();

    engine.purge_user(2).unwrap();
    assert!(store.user_vector(2).unwrap().is_none());
    assert_eq!(store.session_cache_len(2, "s1").unwrap(), 0);
}

#[test]
fn test_search_title_match_outranks_body_mention() {
    let (engine, store) = create_engine();
    store.add_user(1, "alice", None).unwrap();
    store.add_article(
        20,
        1,
        "Python tips and tricks",
        "idioms every developer should know",
        &["python"],
        true,
    ).unwrap();
    store.add_article(
        21,
        1,
        "My favorite tools",
        "lately I have been writing a lot of python scripts",
        &["tools"],
        true,
    ).unwrap();

    store.add_user(2, "bob", None).unwrap();
    let res = engine.search("python", 2, 10).unwrap();
    let ids: Vec<u64> = res.articles.iter().map(|h| h.article_id).collect();
    assert_eq!(ids, vec![20, 21]);
    assert!(res.articles[0].score > res.articles[1].score);
}

#[test]
fn test_search_excludes_own_articles_and_matches_users() {
    let (engine, store) = create_engine();
    store.add_user(1, "pythonista", Some("snake fan")).unwrap();
    store.add_article(30, 1, "Python deep dive", "generators and iterators", &[], true).unwrap();

    let res = engine.search("python", 1, 10).unwrap();
    // the requester's own article never appears
    assert!(res.articles.is_empty());
    assert_eq!(res.users.len(), 1);
    assert_eq!(res.users[0].user_name, "pythonista");
}

#[test]
fn test_save_and_load_model() {
    let (engine, store) = create_engine();
    seed_corpus(&store);
    engine.refit().unwrap();

    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let path = tmp.path().join("model.json");
    engine.save_model(&path).unwrap();

    let (other, other_store) = create_engine();
    seed_corpus(&other_store);
    other.load_model(&path).unwrap();
    assert!(other.has_model());

    other.trigger_vector_recompute(10).unwrap();
    let theirs = other_store.article_vector(10).unwrap().unwrap();
    let ours = store.article_vector(10).unwrap().unwrap();
    assert_eq!(theirs.text_vector, ours.text_vector);
}
