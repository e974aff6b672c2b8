//! Data contracts between the engine and the surrounding platform.
//!
//! The platform owns articles, users, interactions and stats; the engine
//! only consumes them through these traits. The engine owns the derived
//! state (article vectors, user vectors, the per-session recommendation
//! cache) behind `VectorRepo`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sparse::SparseVector;
use crate::vectors::{ArticleVector, Freshness, UserVector};

pub type ArticleId = u64;
pub type UserId = u64;

/// Persistence failure in a backing store. Vanished rows are not errors —
/// every read contract below models absence as `Option`/empty.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("storage backend failed: {0}")]
    Backend(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// How a user engaged with an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    View,
    Like,
    Save,
}

/// One interaction event from the platform's interaction log.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub article_id: ArticleId,
    pub kind: InteractionKind,
    pub at: DateTime<Utc>,
}

/// Denormalized article row used for ranking and display joins.
#[derive(Debug, Clone)]
pub struct ArticleSummary {
    pub article_id: ArticleId,
    pub title: String,
    pub content: String,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub published: bool,
}

/// View/like/save counters for one article.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArticleStats {
    pub views: u64,
    pub likes: u64,
    pub saves: u64,
}

/// A user row surfaced by the secondary name-match in search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMatch {
    pub user_id: UserId,
    pub user_name: String,
    pub bio: Option<String>,
}

/// Article text and metadata, as owned by the platform.
pub trait ArticleStore: Send + Sync {
    /// Current body text and tag names. `None` when the article is gone.
    fn article_text(&self, article_id: ArticleId) -> Result<Option<(String, Vec<String>)>, RepoError>;

    /// Every article id, published or not. Corpus source for refitting.
    fn list_all(&self) -> Result<Vec<ArticleId>, RepoError>;

    /// Published article ids only.
    fn list_published(&self) -> Result<Vec<ArticleId>, RepoError>;

    fn is_published(&self, article_id: ArticleId) -> Result<bool, RepoError>;

    /// Display/ranking row. `None` when the article is gone.
    fn summary(&self, article_id: ArticleId) -> Result<Option<ArticleSummary>, RepoError>;
}

/// The platform's interaction log, read-only from the engine's side.
pub trait InteractionStore: Send + Sync {
    fn interactions(&self, user_id: UserId) -> Result<Vec<Interaction>, RepoError>;
}

/// Per-article counters maintained by the platform.
pub trait StatsStore: Send + Sync {
    fn stats(&self, article_id: ArticleId) -> Result<ArticleStats, RepoError>;
}

/// User identity, read-only from the engine's side.
pub trait UserStore: Send + Sync {
    fn display_name(&self, user_id: UserId) -> Result<Option<String>, RepoError>;

    /// Case-insensitive substring match over display names, bounded.
    fn matching_users(&self, pattern: &str, limit: usize) -> Result<Vec<UserMatch>, RepoError>;
}

/// One row of a session's cached ranking.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub article_id: ArticleId,
    pub rank_position: usize,
}

/// Engine-owned persistence for derived vectors and the session cache.
pub trait VectorRepo: Send + Sync {
    // -- article vectors --

    fn article_vector(&self, article_id: ArticleId) -> Result<Option<ArticleVector>, RepoError>;

    /// Create with `version = 1` or overwrite in place with `version + 1`.
    fn upsert_article_vector(
        &self,
        article_id: ArticleId,
        text_vector: SparseVector,
        tag_vector: SparseVector,
    ) -> Result<(), RepoError>;

    fn delete_article_vector(&self, article_id: ArticleId) -> Result<(), RepoError>;

    /// All stored article vectors, bounded by `limit`.
    fn list_article_vectors(&self, limit: usize) -> Result<Vec<ArticleVector>, RepoError>;

    // -- user vectors --

    fn user_vector(&self, user_id: UserId) -> Result<Option<UserVector>, RepoError>;

    /// Write both vectors and the freshness flag, creating the row if absent.
    fn upsert_user_vector(
        &self,
        user_id: UserId,
        text_vector: SparseVector,
        tag_vector: SparseVector,
        freshness: Freshness,
    ) -> Result<(), RepoError>;

    /// Flip an existing row to `Dirty`. Missing row is a no-op.
    fn mark_user_vector_dirty(&self, user_id: UserId) -> Result<(), RepoError>;

    fn delete_user_vector(&self, user_id: UserId) -> Result<(), RepoError>;

    // -- recommendation cache --

    /// Atomically replace the cached ranking for `(user, session)`.
    /// Positions are the slice order; the contiguous `0..N-1` invariant
    /// holds because the whole list lands in one write.
    fn replace_session_cache(
        &self,
        user_id: UserId,
        session_id: &str,
        ranked_article_ids: &[ArticleId],
    ) -> Result<(), RepoError>;

    /// Drop cache rows for every session of this user except `session_id`.
    fn purge_other_sessions(&self, user_id: UserId, session_id: &str) -> Result<(), RepoError>;

    fn session_cache_len(&self, user_id: UserId, session_id: &str) -> Result<usize, RepoError>;

    /// Page slice ordered by rank position (`offset`, `len` in rows).
    fn session_cache_page(
        &self,
        user_id: UserId,
        session_id: &str,
        offset: usize,
        len: usize,
    ) -> Result<Vec<CacheEntry>, RepoError>;

    /// Drop all cache rows referencing this article (article deletion).
    fn purge_article_from_caches(&self, article_id: ArticleId) -> Result<(), RepoError>;

    /// Drop all cache rows for this user (account deletion).
    fn purge_user_cache(&self, user_id: UserId) -> Result<(), RepoError>;
}
