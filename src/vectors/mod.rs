//! Derived vector state and the jobs that maintain it.
//!
//! - `article`: recompute-and-store for per-article TF-IDF vectors
//! - `user`: interest-vector aggregation with the dirty/fresh lifecycle

pub mod article;
pub mod user;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sparse::SparseVector;
use crate::store::{ArticleId, UserId};

/// Freshness of a user's interest vector.
///
/// `Dirty` means interactions happened since the last aggregation and the
/// vector must be recomputed before it is scored against. Modeled as an
/// enum rather than a nullable timestamp so fresh-without-timestamp cannot
/// exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    Fresh { at: DateTime<Utc> },
    Dirty,
}

impl Freshness {
    pub fn is_dirty(&self) -> bool {
        matches!(self, Freshness::Dirty)
    }
}

/// Stored TF-IDF vectors of one article. Exactly one row per article;
/// the row may not exist yet while the background job is pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleVector {
    pub article_id: ArticleId,
    pub text_vector: SparseVector,
    pub tag_vector: SparseVector,
    /// Incremented on every recomputation.
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

/// A user's long-term interest vector in both spaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserVector {
    pub user_id: UserId,
    pub text_vector: SparseVector,
    pub tag_vector: SparseVector,
    pub freshness: Freshness,
}
