//! Article vector recomputation.
//!
//! Runs in the background after article create/edit; see the engine's task
//! queue. The upsert is last-write-wins and idempotent, so duplicate or
//! concurrent triggers for the same article converge without locking.

use std::sync::Arc;

use crate::error::EngineError;
use crate::store::{ArticleId, ArticleStore, VectorRepo};
use crate::vectorizer::Vectorizer;

/// Vectorize an article's current text and tags and upsert its vector row.
///
/// - Article vanished: logged and returned as Ok — the background trigger
///   races with deletion by design.
/// - Repeated calls with unchanged text/tags store identical vectors.
pub fn compute_and_store(
    vectorizer: &Vectorizer,
    articles: &Arc<dyn ArticleStore>,
    repo: &Arc<dyn VectorRepo>,
    article_id: ArticleId,
) -> Result<(), EngineError> {
    let Some((content, tags)) = articles.article_text(article_id)? else {
        log::warn!("article_vector_skip_missing article_id={article_id}");
        return Ok(());
    };

    let text_vector = vectorizer.transform(&content);
    let tag_vector = vectorizer.transform_tags(&tags);

    repo.upsert_article_vector(article_id, text_vector, tag_vector)?;
    log::info!("article_vector_stored article_id={article_id}");

    Ok(())
}
