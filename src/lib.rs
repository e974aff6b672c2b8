//! feedrank — content recommendation and hybrid search ranking.
//!
//! The crate turns article text and tags into TF-IDF sparse vectors,
//! aggregates per-user interest vectors from interaction history, and
//! ranks articles two ways: personalized recommendation pages (cosine
//! similarity against the user vector, cached per session) and keyword
//! search (phrase/token/popularity/recency blend).
//!
//! [`engine::Engine`] is the entry point; the platform plugs in its own
//! stores via the traits in [`store`]. [`memory::MemoryStore`] implements
//! all of them in memory for tests and small deployments.

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod recommend;
pub mod search;
pub mod sparse;
pub mod store;
pub mod text;
pub mod vectorizer;
pub mod vectors;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use engine::{Collaborators, Engine};
pub use error::EngineError;
pub use sparse::SparseVector;
pub use vectorizer::Vectorizer;
