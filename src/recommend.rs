//! Personalized recommendation ranking with a session-scoped cache.
//!
//! Scoring every candidate is O(candidates), far too expensive to repeat
//! per page, so the full ranked order is computed once per browsing
//! session and cached; later pages slice the cache in O(page_size). The
//! cached order is deliberately stable for the whole session — new
//! interactions do not reshuffle pages already served.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::EngineError;
use crate::store::{
    ArticleStore, InteractionKind, InteractionStore, UserId, UserStore, VectorRepo,
};
use crate::vectors::user as user_vectors;

/// Weight of the text-space cosine in the blended score.
pub const TEXT_WEIGHT: f64 = 0.7;
/// Weight of the tag-space cosine in the blended score.
pub const TAG_WEIGHT: f64 = 0.3;

/// One recommended article, joined to live article data.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendedArticle {
    pub article_id: u64,
    pub title: String,
    pub content: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// A page of recommendations. Totals reflect the session cache, not live
/// article availability.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationPage {
    pub page: usize,
    pub page_size: usize,
    pub total_results: usize,
    pub total_pages: usize,
    pub articles: Vec<RecommendedArticle>,
}

impl RecommendationPage {
    fn empty(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            total_results: 0,
            total_pages: 0,
            articles: vec![],
        }
    }
}

pub struct RecommendParams<'a> {
    pub user_id: UserId,
    pub session_id: &'a str,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    /// Upper bound on scored candidates per cache build.
    pub max_candidates: usize,
}

/// Serve one page of recommendations, building the session cache if needed.
pub fn recommend(
    repo: &Arc<dyn VectorRepo>,
    interactions: &Arc<dyn InteractionStore>,
    articles: &Arc<dyn ArticleStore>,
    users: &Arc<dyn UserStore>,
    params: RecommendParams<'_>,
) -> Result<RecommendationPage, EngineError> {
    let RecommendParams {
        user_id,
        session_id,
        page,
        page_size,
        max_candidates,
    } = params;

    log::info!("recommendation_request_start user_id={user_id} session_id={session_id}");

    let Some(mut user_vec) = repo.user_vector(user_id)? else {
        log::warn!("recommendation_no_user_vector user_id={user_id}");
        return Ok(RecommendationPage::empty(page, page_size));
    };

    // Lazy pull: a dirty vector is recomputed exactly when it is needed.
    if user_vec.freshness.is_dirty() {
        log::info!("user_vector_lazy_recompute user_id={user_id}");
        user_vectors::recompute(repo, interactions, user_id)?;
        if let Some(refreshed) = repo.user_vector(user_id)? {
            user_vec = refreshed;
        }
    }

    if user_vec.text_vector.is_empty() && user_vec.tag_vector.is_empty() {
        log::warn!("recommendation_empty_user_vector user_id={user_id}");
        return Ok(RecommendationPage::empty(page, page_size));
    }

    // One cached ranking per user: drop every other session first.
    repo.purge_other_sessions(user_id, session_id)?;
    log::info!("recommendation_cache_cleanup user_id={user_id}");

    if repo.session_cache_len(user_id, session_id)? == 0 {
        log::info!("recommendation_cache_build user_id={user_id}");

        let engaged: HashSet<u64> = interactions
            .interactions(user_id)?
            .into_iter()
            .filter(|i| matches!(i.kind, InteractionKind::Like | InteractionKind::Save))
            .map(|i| i.article_id)
            .collect();

        let mut scored: Vec<(u64, f64)> = Vec::new();
        for av in repo.list_article_vectors(max_candidates)? {
            if engaged.contains(&av.article_id) {
                continue;
            }

            let score = TEXT_WEIGHT * user_vec.text_vector.cosine(&av.text_vector)
                + TAG_WEIGHT * user_vec.tag_vector.cosine(&av.tag_vector);
            scored.push((av.article_id, score));
        }

        // Descending score; ascending article id is the deterministic
        // tiebreak, so two builds of the same snapshot agree.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        log::info!(
            "recommendation_scoring_complete user_id={user_id} candidates={}",
            scored.len()
        );

        let ranked: Vec<u64> = scored.into_iter().map(|(id, _)| id).collect();
        repo.replace_session_cache(user_id, session_id, &ranked)?;
    } else {
        log::info!("recommendation_cache_hit user_id={user_id}");
    }

    let total_results = repo.session_cache_len(user_id, session_id)?;
    let total_pages = if total_results > 0 {
        total_results.div_ceil(page_size.max(1))
    } else {
        0
    };

    let offset = page.saturating_sub(1) * page_size;
    let entries = repo.session_cache_page(user_id, session_id, offset, page_size)?;

    let mut result = Vec::with_capacity(entries.len());
    for entry in entries {
        // An article deleted after caching is skipped silently; the cache
        // keeps counting it until the session rolls over.
        let Some(summary) = articles.summary(entry.article_id)? else {
            continue;
        };

        let author_name = users
            .display_name(summary.author_id)?
            .unwrap_or_default();

        result.push(RecommendedArticle {
            article_id: summary.article_id,
            title: summary.title,
            content: summary.content,
            author_name,
            created_at: summary.created_at,
        });
    }

    log::info!(
        "recommendation_page_served user_id={user_id} page={page} results={}",
        result.len()
    );

    Ok(RecommendationPage {
        page,
        page_size,
        total_results,
        total_pages,
        articles: result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::sparse::SparseVector;
    use crate::vectors::Freshness;

    fn vec_of(pairs: &[(u32, f64)]) -> SparseVector {
        SparseVector::from_pairs(pairs.iter().copied())
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        repo: Arc<dyn VectorRepo>,
        interactions: Arc<dyn InteractionStore>,
        articles: Arc<dyn ArticleStore>,
        users: Arc<dyn UserStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            Self {
                repo: store.clone(),
                interactions: store.clone(),
                articles: store.clone(),
                users: store.clone(),
                store,
            }
        }

        fn recommend(&self, user_id: UserId, session_id: &str, page: usize, page_size: usize) -> RecommendationPage {
            recommend(
                &self.repo,
                &self.interactions,
                &self.articles,
                &self.users,
                RecommendParams {
                    user_id,
                    session_id,
                    page,
                    page_size,
                    max_candidates: 1000,
                },
            )
            .unwrap()
        }
    }

    /// Three articles along distinct text dimensions, user aligned with dim 0.
    fn seed(f: &Fixture) {
        f.store.add_user(1, "reader", None).unwrap();
        f.store.add_user(2, "author", None).unwrap();
        for (id, dim) in [(10u64, 0u32), (11, 1), (12, 2)] {
            f.store.add_article(id, 2, &format!("article {id}"), "body", &[], true).unwrap();
            f.repo
                .upsert_article_vector(id, vec_of(&[(dim, 1.0)]), vec_of(&[(dim, 1.0)]))
                .unwrap();
        }
        f.repo
            .upsert_user_vector(
                1,
                vec_of(&[(0, 1.0), (1, 0.5)]),
                vec_of(&[(0, 1.0)]),
                Freshness::Fresh { at: Utc::now() },
            )
            .unwrap();
    }

    #[test]
    fn test_no_user_vector_empty_page() {
        let f = Fixture::new();
        let page = f.recommend(99, "s1", 1, 5);
        assert_eq!(page.total_results, 0);
        assert_eq!(page.total_pages, 0);
        assert!(page.articles.is_empty());
    }

    #[test]
    fn test_ranking_order_follows_similarity() {
        let f = Fixture::new();
        seed(&f);

        let page = f.recommend(1, "s1", 1, 5);
        assert_eq!(page.total_results, 3);
        let ids: Vec<u64> = page.articles.iter().map(|a| a.article_id).collect();
        // dim0 match first, dim1 second, orthogonal dim2 last
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[test]
    fn test_engaged_articles_excluded() {
        let f = Fixture::new();
        seed(&f);
        f.store.record_interaction(1, 10, InteractionKind::Like).unwrap();

        let page = f.recommend(1, "s1", 1, 5);
        assert!(page.articles.iter().all(|a| a.article_id != 10));
        assert_eq!(page.total_results, 2);
    }

    #[test]
    fn test_view_interactions_do_not_exclude() {
        let f = Fixture::new();
        seed(&f);
        f.store.record_interaction(1, 10, InteractionKind::View).unwrap();

        let page = f.recommend(1, "s1", 1, 5);
        assert!(page.articles.iter().any(|a| a.article_id == 10));
    }

    #[test]
    fn test_dirty_vector_recomputed_before_scoring() {
        let f = Fixture::new();
        seed(&f);

        // user liked article 12 (dim 2) and the stored vector is dirty
        f.store.record_interaction(1, 12, InteractionKind::Like).unwrap();
        f.repo.mark_user_vector_dirty(1).unwrap();

        let page = f.recommend(1, "s1", 1, 5);

        // after recompute the vector is article 12's, which is excluded as
        // engaged, so dim0/dim1 articles score 0 but still rank
        let uv = f.repo.user_vector(1).unwrap().unwrap();
        assert!(!uv.freshness.is_dirty());
        assert_eq!(uv.text_vector, vec_of(&[(2, 1.0)]));
        assert_eq!(page.total_results, 2);
    }

    #[test]
    fn test_pagination_math() {
        let f = Fixture::new();
        seed(&f);

        let page1 = f.recommend(1, "s1", 1, 2);
        assert_eq!(page1.total_results, 3);
        assert_eq!(page1.total_pages, 2);
        assert_eq!(page1.articles.len(), 2);

        let page2 = f.recommend(1, "s1", 2, 2);
        assert_eq!(page2.articles.len(), 1);

        let page3 = f.recommend(1, "s1", 3, 2);
        assert!(page3.articles.is_empty());
        assert_eq!(page3.total_results, 3);
    }

    #[test]
    fn test_order_stable_across_pages_despite_new_interactions() {
        let f = Fixture::new();
        seed(&f);

        let page1 = f.recommend(1, "s1", 1, 1);
        assert_eq!(page1.articles[0].article_id, 10);

        // mid-session interaction must not reshuffle the cached order
        f.store.record_interaction(1, 11, InteractionKind::Like).unwrap();
        f.repo.mark_user_vector_dirty(1).unwrap();

        let page2 = f.recommend(1, "s1", 2, 1);
        assert_eq!(page2.articles[0].article_id, 11);
        assert_eq!(page2.total_results, 3);
    }

    #[test]
    fn test_session_switch_discards_old_cache() {
        let f = Fixture::new();
        seed(&f);

        f.recommend(1, "old-session", 1, 5);
        assert_eq!(f.repo.session_cache_len(1, "old-session").unwrap(), 3);

        f.recommend(1, "new-session", 1, 5);
        assert_eq!(f.repo.session_cache_len(1, "old-session").unwrap(), 0);
        assert_eq!(f.repo.session_cache_len(1, "new-session").unwrap(), 3);
    }

    #[test]
    fn test_deleted_article_skipped_when_serving() {
        let f = Fixture::new();
        seed(&f);

        f.recommend(1, "s1", 1, 5); // build cache
        f.store.remove_article(11).unwrap(); // deleted after caching, cache row stays

        let page = f.recommend(1, "s1", 1, 5);
        let ids: Vec<u64> = page.articles.iter().map(|a| a.article_id).collect();
        assert_eq!(ids, vec![10, 12]);
        // totals still reflect the cache
        assert_eq!(page.total_results, 3);
    }

    #[test]
    fn test_score_tie_breaks_by_ascending_id() {
        let f = Fixture::new();
        f.store.add_user(1, "reader", None).unwrap();
        f.store.add_user(2, "author", None).unwrap();
        // two identical articles, both orthogonal tie at score 0 too —
        // use equal vectors so scores tie exactly
        for id in [21u64, 20] {
            f.store.add_article(id, 2, &format!("a{id}"), "b", &[], true).unwrap();
            f.repo
                .upsert_article_vector(id, vec_of(&[(0, 1.0)]), vec_of(&[(0, 1.0)]))
                .unwrap();
        }
        f.repo
            .upsert_user_vector(1, vec_of(&[(0, 1.0)]), vec_of(&[(0, 1.0)]), Freshness::Fresh { at: Utc::now() })
            .unwrap();

        let page = f.recommend(1, "s1", 1, 5);
        let ids: Vec<u64> = page.articles.iter().map(|a| a.article_id).collect();
        assert_eq!(ids, vec![20, 21]);
    }
}
