//! In-memory backend implementing every store contract.
//!
//! Mutex-guarded maps; doubles as the embedded backend for small
//! deployments and as the fixture for the crate's tests. The session-cache
//! mutex is the critical section that keeps the contiguous rank-position
//! invariant: a session's ranking is only ever replaced wholesale.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::sparse::SparseVector;
use crate::store::{
    ArticleId, ArticleStats, ArticleStore, ArticleSummary, CacheEntry, Interaction,
    InteractionKind, InteractionStore, RepoError, StatsStore, UserId, UserMatch, UserStore,
    VectorRepo,
};
use crate::vectors::{ArticleVector, Freshness, UserVector};

#[derive(Debug, Clone)]
struct ArticleRow {
    summary: ArticleSummary,
    tags: Vec<String>,
}

#[derive(Debug, Clone)]
struct UserRow {
    user_name: String,
    bio: Option<String>,
}

#[derive(Default)]
struct CacheState {
    /// (user, session) -> article ids in rank order
    sessions: HashMap<(UserId, String), Vec<ArticleId>>,
}

/// Everything in one place, guarded per concern.
#[derive(Default)]
pub struct MemoryStore {
    articles: Mutex<HashMap<ArticleId, ArticleRow>>,
    users: Mutex<HashMap<UserId, UserRow>>,
    interactions: Mutex<HashMap<UserId, Vec<Interaction>>>,
    stats: Mutex<HashMap<ArticleId, ArticleStats>>,
    article_vectors: Mutex<HashMap<ArticleId, ArticleVector>>,
    user_vectors: Mutex<HashMap<UserId, UserVector>>,
    cache: Mutex<CacheState>,
}

fn poisoned<T>(_: T) -> RepoError {
    RepoError::Poisoned
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- fixture helpers (also the embedded backend's write surface) --

    pub fn add_user(&self, user_id: UserId, user_name: &str, bio: Option<&str>) -> Result<(), RepoError> {
        self.users.lock().map_err(poisoned)?.insert(
            user_id,
            UserRow {
                user_name: user_name.to_string(),
                bio: bio.map(|b| b.to_string()),
            },
        );
        Ok(())
    }

    pub fn add_article(
        &self,
        article_id: ArticleId,
        author_id: UserId,
        title: &str,
        content: &str,
        tags: &[&str],
        published: bool,
    ) -> Result<(), RepoError> {
        self.add_article_at(article_id, author_id, title, content, tags, published, Utc::now())
    }

    pub fn add_article_at(
        &self,
        article_id: ArticleId,
        author_id: UserId,
        title: &str,
        content: &str,
        tags: &[&str],
        published: bool,
        created_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        self.articles.lock().map_err(poisoned)?.insert(
            article_id,
            ArticleRow {
                summary: ArticleSummary {
                    article_id,
                    title: title.to_string(),
                    content: content.to_string(),
                    author_id,
                    created_at,
                    published,
                },
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        );
        Ok(())
    }

    pub fn update_article_content(&self, article_id: ArticleId, content: &str) -> Result<(), RepoError> {
        if let Some(row) = self.articles.lock().map_err(poisoned)?.get_mut(&article_id) {
            row.summary.content = content.to_string();
        }
        Ok(())
    }

    pub fn remove_article(&self, article_id: ArticleId) -> Result<(), RepoError> {
        self.articles.lock().map_err(poisoned)?.remove(&article_id);
        Ok(())
    }

    /// Append an interaction event and bump the matching counter.
    pub fn record_interaction(
        &self,
        user_id: UserId,
        article_id: ArticleId,
        kind: InteractionKind,
    ) -> Result<(), RepoError> {
        self.interactions.lock().map_err(poisoned)?.entry(user_id).or_default().push(Interaction {
            article_id,
            kind,
            at: Utc::now(),
        });

        let mut stats = self.stats.lock().map_err(poisoned)?;
        let entry = stats.entry(article_id).or_default();
        match kind {
            InteractionKind::View => entry.views += 1,
            InteractionKind::Like => entry.likes += 1,
            InteractionKind::Save => entry.saves += 1,
        }
        Ok(())
    }

    pub fn set_stats(&self, article_id: ArticleId, views: u64, likes: u64, saves: u64) -> Result<(), RepoError> {
        self.stats
            .lock()
            .map_err(poisoned)?
            .insert(article_id, ArticleStats { views, likes, saves });
        Ok(())
    }
}

impl ArticleStore for MemoryStore {
    fn article_text(&self, article_id: ArticleId) -> Result<Option<(String, Vec<String>)>, RepoError> {
        let articles = self.articles.lock().map_err(poisoned)?;
        Ok(articles
            .get(&article_id)
            .map(|row| (row.summary.content.clone(), row.tags.clone())))
    }

    fn list_all(&self) -> Result<Vec<ArticleId>, RepoError> {
        let articles = self.articles.lock().map_err(poisoned)?;
        let mut ids: Vec<ArticleId> = articles.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn list_published(&self) -> Result<Vec<ArticleId>, RepoError> {
        let articles = self.articles.lock().map_err(poisoned)?;
        let mut ids: Vec<ArticleId> = articles
            .values()
            .filter(|row| row.summary.published)
            .map(|row| row.summary.article_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn is_published(&self, article_id: ArticleId) -> Result<bool, RepoError> {
        let articles = self.articles.lock().map_err(poisoned)?;
        Ok(articles.get(&article_id).map(|r| r.summary.published).unwrap_or(false))
    }

    fn summary(&self, article_id: ArticleId) -> Result<Option<ArticleSummary>, RepoError> {
        let articles = self.articles.lock().map_err(poisoned)?;
        Ok(articles.get(&article_id).map(|row| row.summary.clone()))
    }
}

impl InteractionStore for MemoryStore {
    fn interactions(&self, user_id: UserId) -> Result<Vec<Interaction>, RepoError> {
        let interactions = self.interactions.lock().map_err(poisoned)?;
        Ok(interactions.get(&user_id).cloned().unwrap_or_default())
    }
}

impl StatsStore for MemoryStore {
    fn stats(&self, article_id: ArticleId) -> Result<ArticleStats, RepoError> {
        let stats = self.stats.lock().map_err(poisoned)?;
        Ok(stats.get(&article_id).copied().unwrap_or_default())
    }
}

impl UserStore for MemoryStore {
    fn display_name(&self, user_id: UserId) -> Result<Option<String>, RepoError> {
        let users = self.users.lock().map_err(poisoned)?;
        Ok(users.get(&user_id).map(|u| u.user_name.clone()))
    }

    fn matching_users(&self, pattern: &str, limit: usize) -> Result<Vec<UserMatch>, RepoError> {
        let needle = pattern.to_lowercase();
        let users = self.users.lock().map_err(poisoned)?;

        let mut matches: Vec<UserMatch> = users
            .iter()
            .filter(|(_, row)| row.user_name.to_lowercase().contains(&needle))
            .map(|(id, row)| UserMatch {
                user_id: *id,
                user_name: row.user_name.clone(),
                bio: row.bio.clone(),
            })
            .collect();
        matches.sort_by_key(|m| m.user_id);
        matches.truncate(limit);
        Ok(matches)
    }
}

impl VectorRepo for MemoryStore {
    fn article_vector(&self, article_id: ArticleId) -> Result<Option<ArticleVector>, RepoError> {
        let vectors = self.article_vectors.lock().map_err(poisoned)?;
        Ok(vectors.get(&article_id).cloned())
    }

    fn upsert_article_vector(
        &self,
        article_id: ArticleId,
        text_vector: SparseVector,
        tag_vector: SparseVector,
    ) -> Result<(), RepoError> {
        let mut vectors = self.article_vectors.lock().map_err(poisoned)?;
        match vectors.get_mut(&article_id) {
            Some(existing) => {
                existing.text_vector = text_vector;
                existing.tag_vector = tag_vector;
                existing.version += 1;
            }
            None => {
                vectors.insert(
                    article_id,
                    ArticleVector {
                        article_id,
                        text_vector,
                        tag_vector,
                        version: 1,
                        created_at: Utc::now(),
                    },
                );
            }
        }
        Ok(())
    }

    fn delete_article_vector(&self, article_id: ArticleId) -> Result<(), RepoError> {
        self.article_vectors.lock().map_err(poisoned)?.remove(&article_id);
        Ok(())
    }

    fn list_article_vectors(&self, limit: usize) -> Result<Vec<ArticleVector>, RepoError> {
        let vectors = self.article_vectors.lock().map_err(poisoned)?;
        let mut all: Vec<ArticleVector> = vectors.values().cloned().collect();
        all.sort_by_key(|av| av.article_id);
        all.truncate(limit);
        Ok(all)
    }

    fn user_vector(&self, user_id: UserId) -> Result<Option<UserVector>, RepoError> {
        let vectors = self.user_vectors.lock().map_err(poisoned)?;
        Ok(vectors.get(&user_id).cloned())
    }

    fn upsert_user_vector(
        &self,
        user_id: UserId,
        text_vector: SparseVector,
        tag_vector: SparseVector,
        freshness: Freshness,
    ) -> Result<(), RepoError> {
        self.user_vectors.lock().map_err(poisoned)?.insert(
            user_id,
            UserVector {
                user_id,
                text_vector,
                tag_vector,
                freshness,
            },
        );
        Ok(())
    }

    fn mark_user_vector_dirty(&self, user_id: UserId) -> Result<(), RepoError> {
        let mut vectors = self.user_vectors.lock().map_err(poisoned)?;
        if let Some(uv) = vectors.get_mut(&user_id) {
            uv.freshness = Freshness::Dirty;
        }
        Ok(())
    }

    fn delete_user_vector(&self, user_id: UserId) -> Result<(), RepoError> {
        self.user_vectors.lock().map_err(poisoned)?.remove(&user_id);
        Ok(())
    }

    fn replace_session_cache(
        &self,
        user_id: UserId,
        session_id: &str,
        ranked_article_ids: &[ArticleId],
    ) -> Result<(), RepoError> {
        let mut cache = self.cache.lock().map_err(poisoned)?;
        cache
            .sessions
            .insert((user_id, session_id.to_string()), ranked_article_ids.to_vec());
        Ok(())
    }

    fn purge_other_sessions(&self, user_id: UserId, session_id: &str) -> Result<(), RepoError> {
        let mut cache = self.cache.lock().map_err(poisoned)?;
        cache
            .sessions
            .retain(|(uid, sid), _| *uid != user_id || sid == session_id);
        Ok(())
    }

    fn session_cache_len(&self, user_id: UserId, session_id: &str) -> Result<usize, RepoError> {
        let cache = self.cache.lock().map_err(poisoned)?;
        Ok(cache
            .sessions
            .get(&(user_id, session_id.to_string()))
            .map(|v| v.len())
            .unwrap_or(0))
    }

    fn session_cache_page(
        &self,
        user_id: UserId,
        session_id: &str,
        offset: usize,
        len: usize,
    ) -> Result<Vec<CacheEntry>, RepoError> {
        let cache = self.cache.lock().map_err(poisoned)?;
        let Some(ranked) = cache.sessions.get(&(user_id, session_id.to_string())) else {
            return Ok(vec![]);
        };

        Ok(ranked
            .iter()
            .enumerate()
            .skip(offset)
            .take(len)
            .map(|(rank_position, article_id)| CacheEntry {
                article_id: *article_id,
                rank_position,
            })
            .collect())
    }

    fn purge_article_from_caches(&self, article_id: ArticleId) -> Result<(), RepoError> {
        let mut cache = self.cache.lock().map_err(poisoned)?;
        for ranked in cache.sessions.values_mut() {
            ranked.retain(|id| *id != article_id);
        }
        Ok(())
    }

    fn purge_user_cache(&self, user_id: UserId) -> Result<(), RepoError> {
        let mut cache = self.cache.lock().map_err(poisoned)?;
        cache.sessions.retain(|(uid, _), _| *uid != user_id);
        Ok(())
    }
}
