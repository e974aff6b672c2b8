//! User interest-vector aggregation.
//!
//! The vector is a weighted average of the vectors of articles the user
//! liked or saved (views never count). Like/save toggles only flip the
//! dirty flag; the expensive aggregation runs lazily when a recommendation
//! request actually needs the vector, at most once per dirty period.

use std::sync::Arc;

use chrono::Utc;

use crate::error::EngineError;
use crate::sparse::WeightedAccumulator;
use crate::store::{InteractionKind, InteractionStore, StatsStore, UserId, VectorRepo};
use crate::vectors::Freshness;

/// Aggregation weight of a like interaction.
pub const LIKE_WEIGHT: f64 = 2.0;
/// Aggregation weight of a save interaction.
pub const SAVE_WEIGHT: f64 = 3.0;

fn interaction_weight(kind: InteractionKind) -> Option<f64> {
    match kind {
        InteractionKind::Like => Some(LIKE_WEIGHT),
        InteractionKind::Save => Some(SAVE_WEIGHT),
        InteractionKind::View => None,
    }
}

/// Flip the user's vector to dirty. Cheap; called on every like/save
/// toggle (create and remove both). Missing row is a no-op.
pub fn mark_dirty(repo: &Arc<dyn VectorRepo>, user_id: UserId) -> Result<(), EngineError> {
    repo.mark_user_vector_dirty(user_id)?;
    log::info!("user_vector_marked_dirty user_id={user_id}");
    Ok(())
}

/// Recompute the user's vector from their like/save history.
///
/// Weighted average over both spaces independently. Articles whose vector
/// row is missing are skipped with a warning. If nothing contributes any
/// weight the stored vector and freshness are left untouched — a no-op,
/// not a reset to empty.
pub fn recompute(
    repo: &Arc<dyn VectorRepo>,
    interactions: &Arc<dyn InteractionStore>,
    user_id: UserId,
) -> Result<(), EngineError> {
    log::info!("user_vector_recompute_start user_id={user_id}");

    let mut text_acc = WeightedAccumulator::new();
    let mut tag_acc = WeightedAccumulator::new();

    for interaction in interactions.interactions(user_id)? {
        let Some(weight) = interaction_weight(interaction.kind) else {
            continue;
        };

        let Some(av) = repo.article_vector(interaction.article_id)? else {
            log::warn!(
                "user_vector_missing_article_vector article_id={}",
                interaction.article_id
            );
            continue;
        };

        text_acc.add(&av.text_vector, weight);
        tag_acc.add(&av.tag_vector, weight);
        text_acc.add_weight(weight);
        tag_acc.add_weight(weight);
    }

    let (Some(text_vector), Some(tag_vector)) = (text_acc.average(), tag_acc.average()) else {
        log::warn!("user_vector_recompute_zero_weight user_id={user_id}");
        return Ok(());
    };

    repo.upsert_user_vector(
        user_id,
        text_vector,
        tag_vector,
        Freshness::Fresh { at: Utc::now() },
    )?;
    log::info!("user_vector_updated user_id={user_id}");

    Ok(())
}

/// Population-level cold-start vector for a brand-new user.
///
/// Averages the top `top_n` articles by `views + 2·likes + 3·saves`, using
/// that popularity score as the averaging weight, so a user with no history
/// starts from what the population engages with instead of an all-zero
/// vector. A new row is written dirty; overwriting an existing row keeps
/// its freshness.
pub fn cold_start(
    repo: &Arc<dyn VectorRepo>,
    stats: &Arc<dyn StatsStore>,
    user_id: UserId,
    top_n: usize,
    max_candidates: usize,
) -> Result<(), EngineError> {
    log::info!("default_user_vector_build_start user_id={user_id}");

    let mut ranked = Vec::new();
    for av in repo.list_article_vectors(max_candidates)? {
        let s = stats.stats(av.article_id)?;
        let weight = s.views as f64 + 2.0 * s.likes as f64 + 3.0 * s.saves as f64;
        ranked.push((av, weight));
    }

    if ranked.is_empty() {
        log::warn!("default_user_vector_no_articles user_id={user_id}");
        return Ok(());
    }

    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.article_id.cmp(&b.0.article_id))
    });
    ranked.truncate(top_n);

    let mut text_acc = WeightedAccumulator::new();
    let mut tag_acc = WeightedAccumulator::new();

    for (av, weight) in &ranked {
        if *weight <= 0.0 {
            continue;
        }
        text_acc.add(&av.text_vector, *weight);
        tag_acc.add(&av.tag_vector, *weight);
        text_acc.add_weight(*weight);
        tag_acc.add_weight(*weight);
    }

    let (Some(text_vector), Some(tag_vector)) = (text_acc.average(), tag_acc.average()) else {
        log::warn!("default_user_vector_zero_weight user_id={user_id}");
        return Ok(());
    };

    // New rows start dirty so the first request folds in any interactions
    // since registration; overwriting keeps the row's current freshness.
    let freshness = match repo.user_vector(user_id)? {
        Some(existing) => existing.freshness,
        None => Freshness::Dirty,
    };

    repo.upsert_user_vector(user_id, text_vector, tag_vector, freshness)?;
    log::info!("default_user_vector_created user_id={user_id}");

    Ok(())
}
