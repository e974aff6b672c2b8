//! Hybrid keyword search over published articles.
//!
//! Four signals per candidate — exact phrase, token overlap, popularity,
//! recency — blended into one score, with a like-ordered fallback that tops
//! the result list up to the requested limit. Runs entirely off live
//! article text and stats; the vector store is not involved.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::EngineError;
use crate::store::{ArticleStore, ArticleSummary, StatsStore, UserId, UserMatch, UserStore};
use crate::text;

/// Signal weights of the blended score.
const PHRASE_WEIGHT: f64 = 0.45;
const TOKEN_WEIGHT: f64 = 0.35;
const POPULARITY_WEIGHT: f64 = 0.12;
const RECENCY_WEIGHT: f64 = 0.08;

/// Candidates below this blended score are discarded.
const MIN_SCORE: f64 = 0.10;
/// Fixed score assigned to fallback rows.
const FALLBACK_SCORE: f64 = 0.20;

/// One scored article hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub article_id: u64,
    pub title: String,
    pub content: String,
    pub author_id: u64,
    pub created_at: DateTime<Utc>,
    pub likes: u64,
    pub score: f64,
}

/// Combined article + user results for one query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub articles: Vec<SearchHit>,
    pub users: Vec<UserMatch>,
}

pub struct SearchParams<'a> {
    pub query: &'a str,
    /// Requesting user; their own articles never match.
    pub user_id: UserId,
    pub limit: usize,
    /// Candidate scan bound.
    pub scan_limit: usize,
    /// Bound on the parallel user-name match list.
    pub user_match_limit: usize,
}

/// `ln(2·likes + 3·saves + 1)`, before min-max normalization.
fn popularity_raw(likes: u64, saves: u64) -> f64 {
    ((2 * likes + 3 * saves) as f64 + 1.0).ln()
}

/// Min-max against the candidate-set maximum; 0 when the max is ≤ 0.
fn normalize(value: f64, max_value: f64) -> f64 {
    if max_value <= 0.0 {
        return 0.0;
    }
    (value / max_value).min(1.0)
}

/// `1/(1 + age_secs)`; future timestamps clamp to age 0.
fn recency_score(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age = (now - created_at).num_seconds().max(0) as f64;
    1.0 / (1.0 + age)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

struct Candidate {
    summary: ArticleSummary,
    author_name: String,
    likes: u64,
    saves: u64,
}

/// Run the hybrid search. An empty candidate set yields empty lists.
pub fn search(
    articles: &Arc<dyn ArticleStore>,
    stats: &Arc<dyn StatsStore>,
    users: &Arc<dyn UserStore>,
    params: SearchParams<'_>,
) -> Result<SearchResponse, EngineError> {
    let SearchParams {
        query,
        user_id,
        limit,
        scan_limit,
        user_match_limit,
    } = params;

    log::info!("search_start query='{query}' user_id={user_id}");

    let query_norm = text::normalize(query);
    let now = Utc::now();

    let mut candidates: Vec<Candidate> = Vec::new();
    for article_id in articles.list_published()? {
        if candidates.len() >= scan_limit {
            break;
        }

        let Some(summary) = articles.summary(article_id)? else {
            continue;
        };
        if summary.author_id == user_id {
            continue;
        }

        let s = stats.stats(article_id)?;
        let author_name = users.display_name(summary.author_id)?.unwrap_or_default();

        candidates.push(Candidate {
            summary,
            author_name,
            likes: s.likes,
            saves: s.saves,
        });
    }

    let mut hits: Vec<SearchHit> = Vec::new();

    if candidates.is_empty() {
        log::warn!("search_no_candidates");
    } else {
        log::info!("search_candidates_loaded count={}", candidates.len());

        let max_popularity = candidates
            .iter()
            .map(|c| popularity_raw(c.likes, c.saves))
            .fold(0.0_f64, f64::max);

        for c in &candidates {
            let title = text::normalize(&c.summary.title);
            let content = text::normalize(&c.summary.content);
            let author_name = text::normalize(&c.author_name);

            let phrase = if !query_norm.is_empty()
                && (title.contains(&query_norm)
                    || content.contains(&query_norm)
                    || author_name.contains(&query_norm))
            {
                1.0
            } else {
                0.0
            };

            let token = f64::max(
                text::token_overlap(query, &author_name),
                0.7 * text::token_overlap(query, &title)
                    + 0.3 * text::token_overlap(query, &content),
            );

            let popularity = normalize(popularity_raw(c.likes, c.saves), max_popularity);
            let recency = recency_score(c.summary.created_at, now);

            let score = PHRASE_WEIGHT * phrase
                + TOKEN_WEIGHT * token
                + POPULARITY_WEIGHT * popularity
                + RECENCY_WEIGHT * recency;

            if score < MIN_SCORE {
                continue;
            }

            hits.push(SearchHit {
                article_id: c.summary.article_id,
                title: c.summary.title.clone(),
                content: c.summary.content.clone(),
                author_id: c.summary.author_id,
                created_at: c.summary.created_at,
                likes: c.likes,
                score: round4(score),
            });
        }
    }

    // Top up with popular/recent published articles when scoring left the
    // list short of the limit. A second pass over the whole published set,
    // not just the scanned window, so heavily-liked articles outside it
    // still surface.
    if hits.len() < limit {
        log::info!("search_fallback_triggered");

        let selected: Vec<u64> = hits.iter().map(|h| h.article_id).collect();
        let mut fallback: Vec<(ArticleSummary, u64)> = Vec::new();
        for article_id in articles.list_published()? {
            if selected.contains(&article_id) {
                continue;
            }
            let Some(summary) = articles.summary(article_id)? else {
                continue;
            };
            if summary.author_id == user_id {
                continue;
            }
            let likes = stats.stats(article_id)?.likes;
            fallback.push((summary, likes));
        }

        fallback.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| b.0.created_at.cmp(&a.0.created_at))
        });

        for (summary, likes) in fallback.into_iter().take(limit - hits.len()) {
            hits.push(SearchHit {
                article_id: summary.article_id,
                title: summary.title,
                content: summary.content,
                author_id: summary.author_id,
                created_at: summary.created_at,
                likes,
                score: FALLBACK_SCORE,
            });
        }
    }

    // Stable sort by score only: ties keep insertion order, which is the
    // scoring scan order followed by the likes/recency fallback order.
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);

    let user_matches = users.matching_users(query, user_match_limit)?;

    log::info!("search_completed query='{query}' results={}", hits.len());

    Ok(SearchResponse {
        articles: hits,
        users: user_matches,
    })
}
