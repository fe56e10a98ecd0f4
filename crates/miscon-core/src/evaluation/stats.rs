//! Statistics for comparing evaluation runs.
//!
//! - Bootstrap confidence intervals for a mean score
//! - Paired t-test for two retrieval modes scored on the same examples
//!
//! # References
//!
//! - Efron & Tibshirani (1993). "An Introduction to the Bootstrap"
//! - Smucker et al. (2007). "A comparison of statistical significance tests for IR evaluation"

use crate::error::ShapeError;
use serde::Serialize;

/// Mean with a 95% bootstrap confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BootstrapResult {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

impl BootstrapResult {
    /// Formats the result as "mean [lower, upper]".
    pub fn format(&self, precision: usize) -> String {
        format!(
            "{:.prec$} [{:.prec$}, {:.prec$}]",
            self.mean,
            self.lower,
            self.upper,
            prec = precision
        )
    }
}

/// Bootstrap 95% confidence interval of the mean.
///
/// Resamples `values` with replacement `n_bootstrap` times and takes the
/// 2.5th and 97.5th percentiles of the resampled means. Deterministic for a
/// given `seed`. Returns `None` for an empty sample.
pub fn bootstrap_ci(values: &[f64], n_bootstrap: usize, seed: u64) -> Option<BootstrapResult> {
    if values.is_empty() {
        return None;
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    if n_bootstrap == 0 {
        return Some(BootstrapResult {
            mean,
            lower: mean,
            upper: mean,
        });
    }

    let mut rng = Lcg::new(seed);
    let mut means: Vec<f64> = (0..n_bootstrap)
        .map(|_| (0..n).map(|_| values[rng.below(n)]).sum::<f64>() / n as f64)
        .collect();
    means.sort_by(f64::total_cmp);

    let last = means.len() - 1;
    let percentile = |q: f64| means[((n_bootstrap as f64 * q) as usize).min(last)];

    Some(BootstrapResult {
        mean,
        lower: percentile(0.025),
        upper: percentile(0.975),
    })
}

/// Result of a paired t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TTestResult {
    /// Positive when system A scores higher on average
    pub t_statistic: f64,
    /// Two-tailed p-value
    pub p_value: f64,
    /// Degrees of freedom
    pub df: usize,
    /// Mean of `a - b`
    pub mean_diff: f64,
}

impl TTestResult {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }

    pub fn format(&self) -> String {
        let marker = if self.is_significant(0.05) { "*" } else { "" };
        format!(
            "t({})={:.3}, p={:.4}{}",
            self.df, self.t_statistic, self.p_value, marker
        )
    }
}

/// Paired t-test of `system_a` against `system_b` (same examples, same order).
///
/// # Errors
///
/// `ShapeError::RowMismatch` if the two slices differ in length.
///
/// Fewer than two pairs, or pairs with zero variance, give `t = 0` and
/// `p = 1` unless the mean difference is non-zero, in which case `p = 0`.
pub fn paired_ttest(system_a: &[f64], system_b: &[f64]) -> Result<TTestResult, ShapeError> {
    if system_a.len() != system_b.len() {
        return Err(ShapeError::RowMismatch {
            predictions: system_a.len(),
            ground_truth: system_b.len(),
        });
    }

    let n = system_a.len();
    let diffs: Vec<f64> = system_a.iter().zip(system_b).map(|(a, b)| a - b).collect();
    let mean_diff = if n == 0 {
        0.0
    } else {
        diffs.iter().sum::<f64>() / n as f64
    };

    if n < 2 {
        return Ok(TTestResult {
            t_statistic: 0.0,
            p_value: 1.0,
            df: 0,
            mean_diff,
        });
    }

    let df = n - 1;
    let variance = diffs.iter().map(|d| (d - mean_diff).powi(2)).sum::<f64>() / df as f64;
    let se = (variance / n as f64).sqrt();

    let (t_statistic, p_value) = if se > 1e-12 {
        let t = mean_diff / se;
        (t, two_tailed_p(t.abs(), df))
    } else if mean_diff.abs() > 1e-12 {
        (mean_diff.signum() * f64::INFINITY, 0.0)
    } else {
        (0.0, 1.0)
    };

    Ok(TTestResult {
        t_statistic,
        p_value,
        df,
        mean_diff,
    })
}

// ============================================================================
// Internal: seeded RNG shared with the dataset split
// ============================================================================

/// 64-bit linear congruential generator (Knuth's MMIX constants).
pub(crate) struct Lcg {
    state: u64,
}

impl Lcg {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Uniform-ish integer in `0..bound`. Uses the high bits, which have a
    /// much longer period than the low ones.
    pub(crate) fn below(&mut self, bound: usize) -> usize {
        ((self.next_u64() >> 33) % bound as u64) as usize
    }
}

// ============================================================================
// Internal: Student t tail probability
// ============================================================================

/// Two-tailed p-value: `I_{df/(df+t^2)}(df/2, 1/2)`.
fn two_tailed_p(t_abs: f64, df: usize) -> f64 {
    if !t_abs.is_finite() {
        return 0.0;
    }
    let v = df as f64;
    regularized_beta(v / (v + t_abs * t_abs), v / 2.0, 0.5).clamp(0.0, 1.0)
}

/// Regularized incomplete beta `I_x(a, b)`.
fn regularized_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fastest on this side of the mean
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(x, a, b) / a
    } else {
        1.0 - front * beta_continued_fraction(1.0 - x, b, a) / b
    }
}

/// Lentz evaluation of the incomplete beta continued fraction.
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    const TINY: f64 = 1e-300;
    const EPS: f64 = 1e-12;
    const MAX_ITER: usize = 300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - (a + b) * x / (a + 1.0));
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let two_m = 2.0 * m;

        let even = m * (b - m) * x / ((a + two_m - 1.0) * (a + two_m));
        d = 1.0 / guard(1.0 + even * d);
        c = guard(1.0 + even / c);
        h *= d * c;

        let odd = -(a + m) * (a + b + m) * x / ((a + two_m) * (a + two_m + 1.0));
        d = 1.0 / guard(1.0 + odd * d);
        c = guard(1.0 + odd / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Lanczos approximation of `ln Γ(x)` for `x > 0` (g = 7, n = 9).
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let series = COEFFS[1..]
        .iter()
        .enumerate()
        .fold(COEFFS[0], |acc, (i, &c)| acc + c / (x + i as f64 + 1.0));
    let t = x + G + 0.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}
