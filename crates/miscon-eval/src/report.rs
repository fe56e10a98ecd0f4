//! Report types and text rendering for `miscon-eval`.

use miscon_core::evaluation::{paired_ttest, BootstrapResult, TTestResult};
use miscon_core::harness::{EvaluationReport, ExampleScore};
use serde::Serialize;

const N_BOOTSTRAP: usize = 1000;

#[derive(Debug, Serialize)]
pub struct EvalOutput {
    pub dataset: DatasetInfo,
    pub runs: Vec<RunSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comparisons: Vec<Comparison>,
}

#[derive(Debug, Serialize)]
pub struct DatasetInfo {
    pub taxonomy_size: usize,
    pub num_questions: usize,
    pub num_examples: usize,
    pub split: String,
    pub missing_predictions: usize,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub mode: String,
    pub metric: String,
    pub mean: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci: Option<BootstrapResult>,
    pub evaluated: usize,
    pub excluded: usize,
    pub generation_failures: usize,
    /// Labelled examples whose gold id was ranked first
    pub hits_at_1: usize,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_example: Option<Vec<ExampleScore>>,
}

impl RunSummary {
    pub fn new(mode: &str, report: &EvaluationReport, seed: u64, per_example: bool) -> Self {
        Self {
            mode: mode.to_string(),
            metric: report.metric.clone(),
            mean: report.mean,
            ci: report.confidence_interval(N_BOOTSTRAP, seed),
            evaluated: report.evaluated,
            excluded: report.excluded,
            generation_failures: report.generation_failures,
            hits_at_1: report.hits_at_1(),
            elapsed_ms: report.elapsed_ms,
            per_example: per_example.then(|| report.scores.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Comparison {
    pub system_a: String,
    pub system_b: String,
    pub mean_a: f64,
    pub mean_b: f64,
    pub test: TTestResult,
    pub significant: bool,
}

/// Paired t-tests for every pair of runs. Runs must cover the same examples.
pub fn compare_runs(runs: &[(String, EvaluationReport)]) -> anyhow::Result<Vec<Comparison>> {
    let mut comparisons = Vec::new();
    for (i, (name_a, a)) in runs.iter().enumerate() {
        for (name_b, b) in &runs[i + 1..] {
            let test = paired_ttest(&a.values(), &b.values())?;
            comparisons.push(Comparison {
                system_a: name_a.clone(),
                system_b: name_b.clone(),
                mean_a: a.mean,
                mean_b: b.mean,
                significant: test.is_significant(0.05),
                test,
            });
        }
    }
    Ok(comparisons)
}

pub fn print_text(output: &EvalOutput) {
    let d = &output.dataset;
    println!("\n{}", "=".repeat(80));
    println!("MISCONCEPTION RETRIEVAL EVALUATION (MAP@25)");
    println!("{}", "=".repeat(80));
    println!(
        "Taxonomy: {} misconceptions | Questions: {} | Examples: {} ({} split) | Missing predictions: {}",
        d.taxonomy_size, d.num_questions, d.num_examples, d.split, d.missing_predictions
    );

    println!("\n{}", "-".repeat(70));
    println!(
        "{:<10} {:>24} {:>10} {:>9} {:>9} {:>9}",
        "Mode", "MAP@25 [95% CI]", "Evaluated", "Excluded", "GenFail", "Hit@1"
    );
    for run in &output.runs {
        let map = run
            .ci
            .map(|ci| ci.format(4))
            .unwrap_or_else(|| format!("{:.4}", run.mean));
        println!(
            "{:<10} {:>24} {:>10} {:>9} {:>9} {:>9}",
            run.mode, map, run.evaluated, run.excluded, run.generation_failures, run.hits_at_1
        );
    }

    if !output.comparisons.is_empty() {
        println!("\n{}", "-".repeat(70));
        println!("STATISTICAL COMPARISONS (* = p < 0.05)");
        for c in &output.comparisons {
            println!(
                "  {} vs {}: {:.4} vs {:.4}, {}",
                c.system_a,
                c.system_b,
                c.mean_a,
                c.mean_b,
                c.test.format()
            );
        }
    }

    for run in &output.runs {
        let Some(scores) = &run.per_example else {
            continue;
        };
        println!("\n{}", "-".repeat(70));
        println!("PER-EXAMPLE SCORES ({})", run.mode);
        for s in scores {
            let gold = s
                .gold
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            let marker = if s.generation_failed { " (generation failed)" } else { "" };
            println!(
                "  {:<10} gold={:<6} score={:.4}{}",
                s.key.to_string(),
                gold,
                s.score,
                marker
            );
        }
    }

    println!("{}\n", "=".repeat(80));
}
