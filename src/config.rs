//! Engine configuration.
//!
//! Every knob has a serde default so a partial YAML file works; `validate`
//! rejects values that would make scoring nonsensical.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

const COLD_START_TOP_N: usize = 20;
const MAX_CANDIDATES: usize = 1000;
const SCAN_LIMIT: usize = 400;
const USER_MATCH_LIMIT: usize = 10;
const MAX_FEATURES: usize = 50_000;
const MAX_TEXT_CHARS: usize = 20_000;
const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Top-N popular articles feeding the cold-start population vector.
    #[serde(default = "cold_start_top_n")]
    pub cold_start_top_n: usize,

    /// Upper bound on article vectors scored per recommendation build.
    #[serde(default = "max_candidates")]
    pub max_candidates: usize,

    /// Upper bound on articles scanned per search query.
    #[serde(default = "scan_limit")]
    pub scan_limit: usize,

    /// Bound on the user-name match list returned alongside search hits.
    #[serde(default = "user_match_limit")]
    pub user_match_limit: usize,

    /// Vocabulary cap per vector space.
    #[serde(default = "max_features")]
    pub max_features: usize,

    /// Article body cap in characters, applied before tokenization.
    #[serde(default = "max_text_chars")]
    pub max_text_chars: usize,

    /// Page size used when a request does not specify one.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

fn cold_start_top_n() -> usize {
    COLD_START_TOP_N
}

fn max_candidates() -> usize {
    MAX_CANDIDATES
}

fn scan_limit() -> usize {
    SCAN_LIMIT
}

fn user_match_limit() -> usize {
    USER_MATCH_LIMIT
}

fn max_features() -> usize {
    MAX_FEATURES
}

fn max_text_chars() -> usize {
    MAX_TEXT_CHARS
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cold_start_top_n: COLD_START_TOP_N,
            max_candidates: MAX_CANDIDATES,
            scan_limit: SCAN_LIMIT,
            user_match_limit: USER_MATCH_LIMIT,
            max_features: MAX_FEATURES,
            max_text_chars: MAX_TEXT_CHARS,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_features == 0 {
            return Err(EngineError::Internal("max_features must be greater than 0".into()));
        }
        if self.max_text_chars == 0 {
            return Err(EngineError::Internal("max_text_chars must be greater than 0".into()));
        }
        if self.default_page_size == 0 {
            return Err(EngineError::Internal("default_page_size must be greater than 0".into()));
        }
        if self.scan_limit == 0 || self.max_candidates == 0 {
            return Err(EngineError::Internal(
                "scan_limit and max_candidates must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Load from a YAML file, falling back to defaults when it is absent.
    pub fn load_with(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Internal(format!("config read failed: {e}")))?;
        let config: Self = serde_yml::from_str(&raw)
            .map_err(|e| EngineError::Internal(format!("config is malformed: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let raw = serde_yml::to_string(self)
            .map_err(|e| EngineError::Internal(format!("config serialize failed: {e}")))?;
        std::fs::write(path, raw)
            .map_err(|e| EngineError::Internal(format!("config write failed: {e}")))?;
        Ok(())
    }
}
