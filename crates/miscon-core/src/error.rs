//! Error types for miscon-core.
//!
//! Construction-time failures (`LoadError`, `ConfigError`) are fatal and are
//! surfaced to the operator. Per-query failures (`RetrievalError`,
//! `JudgeError`) are recovered by the metric adapters and mapped to a
//! fallback score after being logged.

use thiserror::Error;

/// Errors that can occur while loading the taxonomy or a dataset file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File could not be opened or read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that failed to load
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// CSV record could not be parsed
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    /// File has the wrong number of columns
    #[error("Expected {expected} columns, found {found}")]
    ColumnCount {
        /// Expected column count
        expected: usize,
        /// Actual column count in the header
        found: usize,
    },
    /// A misconception id cell is not a non-negative integer
    #[error("Invalid misconception id {value:?} on line {line}")]
    InvalidId {
        /// Raw cell contents
        value: String,
        /// 1-based line number (header is line 1)
        line: u64,
    },
    /// The same misconception id appears twice in the taxonomy
    #[error("Duplicate misconception id {0}")]
    DuplicateId(u32),
    /// Row is structurally valid CSV but semantically unusable
    #[error("Invalid row on line {line}: {reason}")]
    InvalidRow {
        /// 1-based line number
        line: u64,
        /// What was wrong with the row
        reason: String,
    },
}

/// Errors raised by invalid retrieval or evaluation parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The lexical pre-filter must keep at least as many candidates as are returned
    #[error("pre_filter_k ({pre_filter_k}) must be >= top_k ({top_k})")]
    PreFilterTooSmall {
        /// Requested number of results
        top_k: usize,
        /// Requested pre-filter size
        pre_filter_k: usize,
    },
    /// A configuration field is out of range
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Config file path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// Config file is not valid TOML for the expected schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Batch MAP@k was called with mismatched prediction/ground-truth dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// Row counts differ
    #[error("{predictions} prediction rows but {ground_truth} ground-truth labels")]
    RowMismatch {
        /// Number of prediction rows
        predictions: usize,
        /// Number of ground-truth labels
        ground_truth: usize,
    },
}

/// Errors that can occur during embedding operations.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Failed to load model weights
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    /// Failed to tokenize text
    #[error("Tokenization failed: {0}")]
    TokenizationFailed(String),
    /// Forward pass or tensor conversion failed
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A single retrieval query failed.
///
/// Never fatal to an evaluation run: [`RetrievalMetric`](crate::metric::RetrievalMetric)
/// logs it and scores the example as `0.0`.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Invalid per-call parameters
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Query embedding failed
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Query vector dimension does not match the index
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Index embedding dimension
        expected: usize,
        /// Query embedding dimension
        actual: usize,
    },
    /// Batch evaluation shape error surfaced from the ranking evaluator
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Errors from the LLM-judge similarity metric.
#[derive(Debug, Clone, Error)]
pub enum JudgeError {
    /// The judge call itself failed
    #[error("Judge call failed: {0}")]
    Call(String),
    /// The judge answered with something that is not a finite number
    #[error("Could not parse judge score from {0:?}")]
    Parse(String),
    /// The gold example has no misconception text to compare against
    #[error("Gold example has no misconception text")]
    MissingGroundTruth,
}

/// An evaluation run could not start.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The rayon worker pool could not be built
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// The external generation pipeline failed to produce an explanation.
#[derive(Debug, Clone, Error)]
#[error("Generation failed: {0}")]
pub struct GenerationError(pub String);

/// Validates that an embedding has the expected dimension.
pub fn validate_dimension(expected: usize, actual: usize) -> Result<(), RetrievalError> {
    if actual == expected {
        Ok(())
    } else {
        Err(RetrievalError::DimensionMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_dimension() {
        assert!(validate_dimension(3, 3).is_ok());
        assert!(matches!(
            validate_dimension(3, 2),
            Err(RetrievalError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_config_error_converts_to_retrieval_error() {
        let err: RetrievalError = ConfigError::PreFilterTooSmall {
            top_k: 25,
            pre_filter_k: 10,
        }
        .into();
        assert!(matches!(err, RetrievalError::Config(_)));
        assert_eq!(err.to_string(), "pre_filter_k (10) must be >= top_k (25)");
    }
}
