//! Production configuration.
//!
//! Constants define the evaluation protocol (MAP@25 with a 50-candidate
//! lexical pre-filter). [`EvalConfig`] bundles every tunable in one value
//! that is built once at startup and handed to the components that need it.
//!
//! # Usage
//!
//! ```
//! use miscon_core::config::{EvalConfig, RetrievalMode};
//!
//! let mut config = EvalConfig::default();
//! config.retrieval.mode = RetrievalMode::Vector;
//! config.validate().unwrap();
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// Evaluation protocol
// =============================================================================

/// Ranking cutoff for the MAP@25 metric.
pub const MAP_CUTOFF: usize = 25;

/// Default number of candidates returned by a retrieval query.
pub const DEFAULT_TOP_K: usize = MAP_CUTOFF;

/// Default number of candidates kept by the lexical pre-filter.
pub const DEFAULT_PRE_FILTER_K: usize = 50;

/// Text emitted by the generation pipeline when it produced nothing usable.
pub const FAILURE_SENTINEL: &str = "Failed to generate misconception explanation.";

/// Score assigned when the LLM judge fails or answers unparseably.
pub const JUDGE_FALLBACK_SCORE: f64 = 0.01;

/// Default number of concurrent evaluation workers.
pub const DEFAULT_WORKERS: usize = 24;

/// Default embedding dimension (matches JinaBERT v2 small).
pub const EMBEDDING_DIM: usize = 512;

/// Reciprocal rank fusion constant (Cormack et al., SIGIR 2009).
pub const RRF_K: usize = 60;

// =============================================================================
// Enums
// =============================================================================

/// How free-text predictions are turned into a ranked candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Pure embedding search over the whole taxonomy
    Vector,
    /// BM25 pre-filter followed by embedding re-rank
    #[default]
    Hybrid,
    /// Reciprocal rank fusion of the BM25 and embedding rankings
    Fused,
}

impl RetrievalMode {
    /// Lower-case name, as used in config files, CLI flags and report labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
            Self::Fused => "fused",
        }
    }

    /// Every mode, in the order `--compare` evaluates them.
    pub fn all() -> &'static [RetrievalMode] {
        &[Self::Vector, Self::Hybrid, Self::Fused]
    }
}

/// Distance used by the embedding stage. Smaller is more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`
    #[default]
    Cosine,
    /// Euclidean distance
    L2,
}

/// Which metric drives evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    /// Retrieval + MAP@25
    #[default]
    Retrieval,
    /// LLM-judged similarity to the gold misconception text
    Judge,
}

/// What to do with an answer slot that has no gold misconception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingGoldPolicy {
    /// Leave the example out of every aggregate
    #[default]
    Exclude,
    /// Score it as a miss (0.0)
    Incorrect,
    /// Score it as a hit (1.0)
    Correct,
}

impl MissingGoldPolicy {
    /// Score the evaluator gives an unlabelled example.
    ///
    /// # Returns
    ///
    /// `1.0` for [`Correct`](Self::Correct), `0.0` otherwise. `Exclude`
    /// examples are skipped before scoring, so its value is never reported.
    pub fn score(&self) -> f64 {
        match self {
            Self::Correct => 1.0,
            Self::Incorrect | Self::Exclude => 0.0,
        }
    }
}

// =============================================================================
// Config structs
// =============================================================================

/// Parameters of the retrieval index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Strategy used by [`HybridIndex::search`](crate::search::HybridIndex::search)
    /// and the retrieval metric
    pub mode: RetrievalMode,
    /// Candidates returned per query
    pub top_k: usize,
    /// Candidates kept by the lexical stage
    pub pre_filter_k: usize,
    /// Distance of the embedding re-rank stage
    pub distance: DistanceMetric,
    /// Dimension used by the hashing embedder
    pub embedding_dim: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::default(),
            top_k: DEFAULT_TOP_K,
            pre_filter_k: DEFAULT_PRE_FILTER_K,
            distance: DistanceMetric::default(),
            embedding_dim: EMBEDDING_DIM,
        }
    }
}

impl RetrievalConfig {
    /// Checks the retrieval parameters.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidValue` if `top_k` or `embedding_dim` is zero
    /// - `ConfigError::PreFilterTooSmall` if `pre_filter_k < top_k`
    ///
    /// # Examples
    ///
    /// ```
    /// use miscon_core::config::RetrievalConfig;
    /// use miscon_core::ConfigError;
    ///
    /// let config = RetrievalConfig {
    ///     top_k: 25,
    ///     pre_filter_k: 10,
    ///     ..Default::default()
    /// };
    /// assert!(matches!(
    ///     config.validate(),
    ///     Err(ConfigError::PreFilterTooSmall { top_k: 25, pre_filter_k: 10 })
    /// ));
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::InvalidValue("top_k must be positive".into()));
        }
        if self.embedding_dim == 0 {
            return Err(ConfigError::InvalidValue(
                "embedding_dim must be positive".into(),
            ));
        }
        check_pre_filter(self.top_k, self.pre_filter_k)
    }
}

/// Full evaluation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Index and query parameters (`[retrieval]` table)
    pub retrieval: RetrievalConfig,
    /// Metric driving the evaluation
    pub scorer: ScorerKind,
    /// Treatment of answer slots with no gold misconception, applied by the
    /// [`Evaluator`](crate::harness::Evaluator)
    pub missing_gold: MissingGoldPolicy,
    /// Concurrent evaluation workers
    pub workers: usize,
    /// Seed for the train/test split
    pub seed: u64,
    /// Fraction of examples held out for evaluation
    pub test_fraction: f64,
    /// Prediction text that marks a generation failure
    pub failure_sentinel: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            scorer: ScorerKind::default(),
            missing_gold: MissingGoldPolicy::default(),
            workers: DEFAULT_WORKERS,
            seed: 42,
            test_fraction: 0.8,
            failure_sentinel: FAILURE_SENTINEL.to_string(),
        }
    }
}

impl EvalConfig {
    /// Loads a TOML config file. Missing fields take their defaults.
    ///
    /// # Arguments
    ///
    /// * `path` - TOML file; top-level keys are `EvalConfig` fields and the
    ///   `[retrieval]` table holds `RetrievalConfig`
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` if the file cannot be read
    /// - `ConfigError::Parse` if it is not valid TOML for this schema
    /// - any error from [`validate`](Self::validate)
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field, including the nested retrieval config.
    ///
    /// # Errors
    ///
    /// - any error from [`RetrievalConfig::validate`]
    /// - `ConfigError::InvalidValue` if `workers` is zero or `test_fraction`
    ///   lies outside `[0, 1]`
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retrieval.validate()?;
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue("workers must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.test_fraction) {
            return Err(ConfigError::InvalidValue(format!(
                "test_fraction must be in [0, 1], got {}",
                self.test_fraction
            )));
        }
        Ok(())
    }
}

/// Checks the two-stage retrieval invariant `pre_filter_k >= top_k`.
///
/// # Errors
///
/// `ConfigError::PreFilterTooSmall` carrying both values.
pub fn check_pre_filter(top_k: usize, pre_filter_k: usize) -> Result<(), ConfigError> {
    if pre_filter_k < top_k {
        Err(ConfigError::PreFilterTooSmall {
            top_k,
            pre_filter_k,
        })
    } else {
        Ok(())
    }
}
