//! Engine facade: wires the vectorizer, the collaborator stores and the
//! ranking components together, and runs the background vector jobs.
//!
//! Vector recomputation is fire-and-forget: `trigger_vector_recompute`
//! enqueues a task and returns immediately, so article create/edit never
//! blocks on TF-IDF work. The upsert is idempotent and last-write-wins, so
//! duplicate or racing triggers for the same article converge without
//! locking.

use std::path::Path;
use std::sync::{mpsc, Arc, RwLock};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::recommend::{self, RecommendParams, RecommendationPage};
use crate::search::{self, SearchParams, SearchResponse};
use crate::store::{
    ArticleId, ArticleStore, InteractionStore, StatsStore, UserId, UserStore, VectorRepo,
};
use crate::vectorizer::Vectorizer;
use crate::vectors::{article as article_vectors, user as user_vectors};

/// Background job request.
pub enum Task {
    /// Recompute and store one article's vectors.
    RecomputeArticle { article_id: ArticleId },

    /// Refit the vectorizer from the full corpus and recompute every
    /// stored article vector against the new vocabulary.
    RefitCorpus,

    /// Request to gracefully shut down the task queue.
    Shutdown,
}

/// Collaborator stores the engine consumes. The platform owns these.
#[derive(Clone)]
pub struct Collaborators {
    pub articles: Arc<dyn ArticleStore>,
    pub interactions: Arc<dyn InteractionStore>,
    pub stats: Arc<dyn StatsStore>,
    pub users: Arc<dyn UserStore>,
}

/// Shared slot holding the currently fitted vectorizer. Swapped wholesale
/// on refit; readers clone the inner Arc and never observe a half-built
/// model.
type ModelSlot = Arc<RwLock<Option<Arc<Vectorizer>>>>;

pub struct Engine {
    config: EngineConfig,
    collaborators: Collaborators,
    repo: Arc<dyn VectorRepo>,
    model: ModelSlot,

    task_tx: Option<mpsc::Sender<Task>>,
    task_queue_handle: Option<std::thread::JoinHandle<()>>,
}

impl Engine {
    /// Create an engine with no fitted model. Call `refit` (or
    /// `load_model`) before serving recommendations or search.
    pub fn new(
        config: EngineConfig,
        collaborators: Collaborators,
        repo: Arc<dyn VectorRepo>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        Ok(Self {
            config,
            collaborators,
            repo,
            model: Arc::new(RwLock::new(None)),
            task_tx: None,
            task_queue_handle: None,
        })
    }

    /// Start the background worker. Without it, triggers run inline.
    pub fn run_queue(&mut self) {
        let (task_tx, task_rx) = mpsc::channel::<Task>();

        let handle = std::thread::spawn({
            let collaborators = self.collaborators.clone();
            let repo = self.repo.clone();
            let model = self.model.clone();
            let config = self.config.clone();

            move || {
                Self::start_queue(task_rx, collaborators, repo, model, config);
            }
        });

        self.task_queue_handle = Some(handle);
        self.task_tx = Some(task_tx);
    }

    fn start_queue(
        task_rx: mpsc::Receiver<Task>,
        collaborators: Collaborators,
        repo: Arc<dyn VectorRepo>,
        model: ModelSlot,
        config: EngineConfig,
    ) {
        while let Ok(task) = task_rx.recv() {
            match task {
                Task::RecomputeArticle { article_id } => {
                    log::info!("vector_background_job_start article_id={article_id}");
                    match Self::run_article_job(&collaborators, &repo, &model, article_id) {
                        Ok(()) => {
                            log::info!("vector_background_job_complete article_id={article_id}")
                        }
                        Err(err) => log::error!(
                            "vector_background_job_failed article_id={article_id} err={err}"
                        ),
                    }
                }
                Task::RefitCorpus => {
                    if let Err(err) = Self::run_refit(&collaborators, &repo, &model, &config) {
                        log::error!("vectorizer_refit_failed err={err}");
                    }
                }
                Task::Shutdown => break,
            }
        }
    }

    fn run_article_job(
        collaborators: &Collaborators,
        repo: &Arc<dyn VectorRepo>,
        model: &ModelSlot,
        article_id: ArticleId,
    ) -> Result<(), EngineError> {
        let vectorizer = Self::model_from(model)?;
        article_vectors::compute_and_store(&vectorizer, &collaborators.articles, repo, article_id)
    }

    fn run_refit(
        collaborators: &Collaborators,
        repo: &Arc<dyn VectorRepo>,
        model: &ModelSlot,
        config: &EngineConfig,
    ) -> Result<(), EngineError> {
        log::info!("vectorizer_refit_start");

        let article_ids = collaborators.articles.list_all()?;
        if article_ids.is_empty() {
            log::warn!("vectorizer_refit_empty_corpus");
            return Ok(());
        }

        let mut present = Vec::with_capacity(article_ids.len());
        let mut texts = Vec::with_capacity(article_ids.len());
        let mut tag_texts = Vec::with_capacity(article_ids.len());

        for article_id in article_ids {
            let Some((content, tags)) = collaborators.articles.article_text(article_id)? else {
                continue;
            };
            present.push(article_id);
            texts.push(content);
            tag_texts.push(tags.join(" "));
        }

        let fitted = Arc::new(Vectorizer::fit(
            &texts,
            &tag_texts,
            config.max_features,
            config.max_text_chars,
        ));

        {
            let mut slot = model
                .write()
                .map_err(|_| EngineError::Internal("model slot lock poisoned".into()))?;
            *slot = Some(fitted.clone());
        }

        // All stored vectors must come from the same fit to be comparable.
        for article_id in present {
            article_vectors::compute_and_store(
                &fitted,
                &collaborators.articles,
                repo,
                article_id,
            )?;
        }

        log::info!(
            "vectorizer_refit_complete text_terms={} tag_terms={}",
            fitted.text_vocabulary_size(),
            fitted.tag_vocabulary_size()
        );
        Ok(())
    }

    fn model_from(model: &ModelSlot) -> Result<Arc<Vectorizer>, EngineError> {
        model
            .read()
            .map_err(|_| EngineError::Internal("model slot lock poisoned".into()))?
            .clone()
            .ok_or(EngineError::MissingVocabulary)
    }

    fn model(&self) -> Result<Arc<Vectorizer>, EngineError> {
        Self::model_from(&self.model)
    }

    /// Fit the vectorizer from the live corpus and recompute every article
    /// vector, synchronously. The queued `Task::RefitCorpus` does the same
    /// in the background.
    pub fn refit(&self) -> Result<(), EngineError> {
        Self::run_refit(&self.collaborators, &self.repo, &self.model, &self.config)
    }

    /// Load an offline-trained vectorizer model instead of refitting.
    pub fn load_model(&self, path: &Path) -> Result<(), EngineError> {
        let vectorizer = Arc::new(Vectorizer::load(path)?);
        let mut slot = self
            .model
            .write()
            .map_err(|_| EngineError::Internal("model slot lock poisoned".into()))?;
        *slot = Some(vectorizer);
        Ok(())
    }

    /// Persist the currently fitted model.
    pub fn save_model(&self, path: &Path) -> Result<(), EngineError> {
        self.model()?.save(path)?;
        Ok(())
    }

    pub fn has_model(&self) -> bool {
        self.model().is_ok()
    }

    /// Fire-and-forget vector recomputation for a created/edited article.
    /// Runs inline when the queue is not running.
    pub fn trigger_vector_recompute(&self, article_id: ArticleId) -> Result<(), EngineError> {
        if let Some(tx) = &self.task_tx {
            if tx.send(Task::RecomputeArticle { article_id }).is_ok() {
                return Ok(());
            }
            log::warn!("task_queue_unavailable article_id={article_id}");
        }

        Self::run_article_job(&self.collaborators, &self.repo, &self.model, article_id)
    }

    /// Queue a corpus-wide refit, or run it inline without the queue.
    pub fn trigger_refit(&self) -> Result<(), EngineError> {
        if let Some(tx) = &self.task_tx {
            if tx.send(Task::RefitCorpus).is_ok() {
                return Ok(());
            }
            log::warn!("task_queue_unavailable refit");
        }

        self.refit()
    }

    /// Called by the platform on every like/save toggle (create or
    /// remove). Views must not be reported here.
    pub fn mark_user_vector_dirty(&self, user_id: UserId) -> Result<(), EngineError> {
        user_vectors::mark_dirty(&self.repo, user_id)
    }

    /// Called at user registration: seed a population-level interest
    /// vector so the first recommendation request has signal to work with.
    pub fn create_cold_start_vector(&self, user_id: UserId) -> Result<(), EngineError> {
        self.model()?; // no vocabulary, no meaningful population vector
        user_vectors::cold_start(
            &self.repo,
            &self.collaborators.stats,
            user_id,
            self.config.cold_start_top_n,
            self.config.max_candidates,
        )
    }

    /// Serve one page of personalized recommendations.
    pub fn get_recommendations(
        &self,
        user_id: UserId,
        session_id: &str,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<RecommendationPage, EngineError> {
        self.model()?;

        recommend::recommend(
            &self.repo,
            &self.collaborators.interactions,
            &self.collaborators.articles,
            &self.collaborators.users,
            RecommendParams {
                user_id,
                session_id,
                page: page.max(1),
                page_size: page_size.unwrap_or(self.config.default_page_size),
                max_candidates: self.config.max_candidates,
            },
        )
    }

    /// Hybrid keyword search plus the parallel user-name match list.
    pub fn search(
        &self,
        query: &str,
        user_id: UserId,
        limit: usize,
    ) -> Result<SearchResponse, EngineError> {
        search::search(
            &self.collaborators.articles,
            &self.collaborators.stats,
            &self.collaborators.users,
            SearchParams {
                query,
                user_id,
                limit,
                scan_limit: self.config.scan_limit,
                user_match_limit: self.config.user_match_limit,
            },
        )
    }

    /// Called when the platform deletes an article: drop its vector row
    /// and every cache row referencing it.
    pub fn purge_article(&self, article_id: ArticleId) -> Result<(), EngineError> {
        self.repo.delete_article_vector(article_id)?;
        self.repo.purge_article_from_caches(article_id)?;
        log::info!("article_purged article_id={article_id}");
        Ok(())
    }

    /// Called when the platform deletes a user account.
    pub fn purge_user(&self, user_id: UserId) -> Result<(), EngineError> {
        self.repo.delete_user_vector(user_id)?;
        self.repo.purge_user_cache(user_id)?;
        log::info!("user_purged user_id={user_id}");
        Ok(())
    }

    /// Stop the background worker, draining already-queued tasks.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.task_tx.take() {
            let _ = tx.send(Task::Shutdown);
        }
        if let Some(handle) = self.task_queue_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
