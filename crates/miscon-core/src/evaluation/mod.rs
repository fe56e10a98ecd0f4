//! Ranking evaluation.
//!
//! - [`metrics`]: single-label average precision at a cutoff and its batch
//!   mean (MAP@25), plus hit rate
//! - [`stats`]: bootstrap confidence intervals and paired t-tests for
//!   comparing retrieval modes on the same examples
//!
//! # Example
//!
//! ```
//! use miscon_core::evaluation::average_precision_at_k;
//! use miscon_core::taxonomy::MisconceptionId;
//!
//! let ranked: Vec<MisconceptionId> = [7, 3, 1, 9].into_iter().map(MisconceptionId::new).collect();
//! let ap = average_precision_at_k(&ranked, MisconceptionId::new(1), 25);
//! assert!((ap - 1.0 / 3.0).abs() < 1e-12);
//! ```

pub mod metrics;
pub mod stats;

pub use metrics::{
    average_precision_at_k, hit_at_k, mean, mean_average_precision_at_k,
    mean_average_precision_at_cutoff,
};
pub use stats::{bootstrap_ci, paired_ttest, BootstrapResult, TTestResult};
