//! TF-IDF vectorizer over a fixed vocabulary.
//!
//! A `Vectorizer` is an explicitly constructed, immutable value: fit it once
//! (from the article corpus, or load a previously saved model) and pass it by
//! reference to every caller. Articles, user aggregates and search queries
//! must all be transformed by the *same* instance — cosine similarity across
//! spaces built from different vocabularies is meaningless.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::sparse::SparseVector;
use crate::text;

/// Errors from fitting, loading or saving a vectorizer model.
#[derive(Debug, thiserror::Error)]
pub enum VectorizerError {
    #[error("model file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("model file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The shared vectorizer: one fitted model per vector space.
///
/// Body text and tag names live in separate vocabularies (a tag vector is
/// only ever compared with other tag vectors), mirroring the two model
/// files the platform trains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vectorizer {
    text: TfidfModel,
    tags: TfidfModel,
}

impl Vectorizer {
    /// Fit both spaces from the live corpus: article bodies for the text
    /// model, space-joined tag lists for the tag model.
    pub fn fit(texts: &[String], tag_texts: &[String], max_features: usize, max_chars: usize) -> Self {
        Self {
            text: TfidfModel::fit(texts, max_features, max_chars),
            // tag strings are short; the char cap only matters for bodies
            tags: TfidfModel::fit(tag_texts, max_features, max_chars),
        }
    }

    /// Vector for article body text or a free-text query.
    pub fn transform(&self, input: &str) -> SparseVector {
        self.text.transform(input)
    }

    /// Vector for a tag list (space-joined).
    pub fn transform_tags(&self, tags: &[String]) -> SparseVector {
        self.tags.transform(&tags.join(" "))
    }

    pub fn text_vocabulary_size(&self) -> usize {
        self.text.vocabulary_size()
    }

    pub fn tag_vocabulary_size(&self) -> usize {
        self.tags.vocabulary_size()
    }

    /// Persist both fitted models as one JSON file.
    pub fn save(&self, path: &Path) -> Result<(), VectorizerError> {
        let json = serde_json::to_vec(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a model trained earlier (offline-trained asset strategy).
    pub fn load(path: &Path) -> Result<Self, VectorizerError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Immutable vocabulary + inverse-document-frequency table for one space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfModel {
    /// term -> dimension index
    vocabulary: HashMap<String, u32>,
    /// dimension index -> idf, parallel to the vocabulary indices
    idf: Vec<f64>,
    /// Input cap in characters, applied before tokenization.
    max_chars: usize,
}

impl TfidfModel {
    /// Fit vocabulary and IDF from a document corpus.
    ///
    /// Smoothed IDF: `ln((1 + n_docs) / (1 + df)) + 1`, so terms appearing
    /// in every document still carry a small positive weight. The
    /// vocabulary is capped at `max_features` terms by descending document
    /// frequency (ties broken alphabetically for determinism).
    pub fn fit(corpus: &[String], max_features: usize, max_chars: usize) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let n_docs = corpus.len();

        // token_set collapses each document to unique terms, so a term
        // counts once per document no matter how often it repeats.
        for doc in corpus {
            for token in text::token_set(truncate(doc, max_chars)) {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<(String, usize)> = doc_freq.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        terms.truncate(max_features);

        // Stable dimension assignment: alphabetical over the kept terms.
        terms.sort_by(|a, b| a.0.cmp(&b.0));

        let mut vocabulary = HashMap::with_capacity(terms.len());
        let mut idf = Vec::with_capacity(terms.len());

        for (dim, (term, df)) in terms.into_iter().enumerate() {
            vocabulary.insert(term, dim as u32);
            idf.push(((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0);
        }

        Self {
            vocabulary,
            idf,
            max_chars,
        }
    }

    /// Number of vocabulary terms (the dimensionality of produced vectors).
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Transform text into an L2-normalized TF-IDF sparse vector.
    ///
    /// Text sharing no terms with the vocabulary produces the zero vector —
    /// that is a valid result (cosine 0 against everything), not an error.
    pub fn transform(&self, input: &str) -> SparseVector {
        let mut term_freq: HashMap<u32, f64> = HashMap::new();
        for token in text::tokenize(truncate(input, self.max_chars)) {
            if let Some(&dim) = self.vocabulary.get(&token) {
                *term_freq.entry(dim).or_insert(0.0) += 1.0;
            }
        }

        if term_freq.is_empty() {
            return SparseVector::new();
        }

        let mut vector = SparseVector::from_pairs(
            term_freq
                .into_iter()
                .map(|(dim, tf)| (dim, tf * self.idf[dim as usize])),
        );

        let norm = vector.norm();
        if norm > 0.0 {
            vector.scale(1.0 / norm);
        }
        vector
    }

}

/// Cap input at `max_chars` characters on a char boundary.
fn truncate(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &input[..byte_idx],
        None => input,
    }
}
