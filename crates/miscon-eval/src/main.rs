//! Misconception retrieval evaluation tool.
//!
//! Scores generated misconception explanations against the labelled
//! taxonomy: each prediction is used as a retrieval query and the rank of the
//! gold misconception is turned into MAP@25.
//!
//! # Inputs
//!
//! - `misconception_mapping.csv`: `MisconceptionId,MisconceptionName`
//! - `train.csv`: questions with four answers and per-answer misconception ids
//! - a predictions CSV: `QuestionId,Answer,Prediction`
//!
//! # Usage
//!
//! ```bash
//! # Score predictions with the configured retrieval mode
//! cargo run -p miscon-eval --release -- --predictions preds.csv
//!
//! # Compare vector, hybrid and fused retrieval with paired t-tests
//! cargo run -p miscon-eval --release -- --predictions preds.csv --compare
//!
//! # Inspect the candidates retrieved for a piece of text
//! cargo run -p miscon-eval --release -- --query "doesn't know triangle's shape"
//!
//! # Use the JinaBERT embedder
//! cargo run -p miscon-eval --release --features jina -- --model-dir models/jina --predictions preds.csv
//! ```

mod report;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use miscon_core::config::{EvalConfig, MissingGoldPolicy, RetrievalMode, ScorerKind};
use miscon_core::dataset::{
    build_examples, load_predictions, load_questions, train_test_split, EvaluationExample,
};
use miscon_core::embedding::{Embedder, HashingEmbedder};
use miscon_core::harness::Evaluator;
use miscon_core::metric::{Prediction, RetrievalMetric};
use miscon_core::search::HybridIndex;
use miscon_core::taxonomy::Taxonomy;
use report::{compare_runs, print_text, DatasetInfo, EvalOutput, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TAXONOMY_FILE: &str = "misconception_mapping.csv";
const QUESTIONS_FILE: &str = "train.csv";

// =============================================================================
// CLI
// =============================================================================

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Vector,
    Hybrid,
    Fused,
}

impl From<ModeArg> for RetrievalMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Vector => RetrievalMode::Vector,
            ModeArg::Hybrid => RetrievalMode::Hybrid,
            ModeArg::Fused => RetrievalMode::Fused,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Exclude,
    Incorrect,
    Correct,
}

impl From<PolicyArg> for MissingGoldPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Exclude => MissingGoldPolicy::Exclude,
            PolicyArg::Incorrect => MissingGoldPolicy::Incorrect,
            PolicyArg::Correct => MissingGoldPolicy::Correct,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum SplitArg {
    #[default]
    All,
    Train,
    Test,
}

#[derive(Parser, Debug)]
#[command(name = "miscon-eval", version)]
#[command(about = "Score misconception predictions with MAP@25 retrieval")]
struct Args {
    /// TOML config file (flags override its values)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding misconception_mapping.csv and train.csv
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Taxonomy CSV (defaults to <data-dir>/misconception_mapping.csv)
    #[arg(long)]
    taxonomy: Option<PathBuf>,

    /// Question CSV (defaults to <data-dir>/train.csv)
    #[arg(long)]
    questions: Option<PathBuf>,

    /// Predictions CSV with QuestionId, Answer, Prediction columns
    #[arg(long)]
    predictions: Option<PathBuf>,

    /// Retrieval mode
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Evaluate every retrieval mode and run paired t-tests
    #[arg(long)]
    compare: bool,

    /// Which part of the seeded train/test split to evaluate
    #[arg(long, value_enum, default_value_t = SplitArg::All)]
    split: SplitArg,

    /// Concurrent evaluation workers
    #[arg(long)]
    workers: Option<usize>,

    /// Scoring of answers without a gold misconception
    #[arg(long, value_enum)]
    missing_gold: Option<PolicyArg>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Include per-example scores
    #[arg(long)]
    per_example: bool,

    /// Print the top candidates for this text and exit
    #[arg(long)]
    query: Option<String>,

    /// Candidates shown by --query
    #[arg(long, default_value_t = 5)]
    top_k: usize,

    /// JinaBERT model directory (model.safetensors + tokenizer.json)
    #[arg(long, env = "MISCON_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Enable info-level logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn taxonomy_path(&self) -> PathBuf {
        self.taxonomy
            .clone()
            .unwrap_or_else(|| self.data_dir.join(TAXONOMY_FILE))
    }

    fn questions_path(&self) -> PathBuf {
        self.questions
            .clone()
            .unwrap_or_else(|| self.data_dir.join(QUESTIONS_FILE))
    }

    /// Loads the config file, if any, and applies flag overrides.
    fn eval_config(&self) -> Result<EvalConfig> {
        let mut config = match &self.config {
            Some(path) => EvalConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EvalConfig::default(),
        };
        if let Some(mode) = self.mode {
            config.retrieval.mode = mode.into();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(policy) = self.missing_gold {
            config.missing_gold = policy.into();
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

// =============================================================================
// Setup
// =============================================================================

#[cfg(feature = "jina")]
fn load_embedder(model_dir: Option<&Path>, config: &EvalConfig) -> Result<Arc<dyn Embedder>> {
    use miscon_core::embedding::{JinaBertConfig, JinaBertEmbedder};

    if let Some(dir) = model_dir {
        let embedder = JinaBertEmbedder::from_dir(dir, JinaBertConfig::default())
            .with_context(|| format!("Failed to load JinaBERT from {}", dir.display()))?;
        return Ok(Arc::new(embedder));
    }
    hashing_embedder(config)
}

#[cfg(not(feature = "jina"))]
fn load_embedder(model_dir: Option<&Path>, config: &EvalConfig) -> Result<Arc<dyn Embedder>> {
    if let Some(dir) = model_dir {
        warn!(
            "Ignoring model directory {}: built without the `jina` feature",
            dir.display()
        );
    }
    hashing_embedder(config)
}

fn hashing_embedder(config: &EvalConfig) -> Result<Arc<dyn Embedder>> {
    info!(
        "Using hashing embedder (dim {})",
        config.retrieval.embedding_dim
    );
    Ok(Arc::new(HashingEmbedder::new(config.retrieval.embedding_dim)?))
}

fn select_split(
    examples: Vec<EvaluationExample>,
    split: SplitArg,
    config: &EvalConfig,
) -> Vec<EvaluationExample> {
    match split {
        SplitArg::All => examples,
        SplitArg::Train => train_test_split(&examples, config.test_fraction, config.seed).0,
        SplitArg::Test => train_test_split(&examples, config.test_fraction, config.seed).1,
    }
}

fn progress_bar(len: usize, label: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(ProgressStyle::default_bar().template("{msg} [{bar:40}] {pos}/{len} ({eta})")?);
    pb.set_message(label.to_string());
    Ok(pb)
}

// =============================================================================
// Commands
// =============================================================================

fn run_query(index: &HybridIndex, query: &str, mode: RetrievalMode, top_k: usize) -> Result<()> {
    println!("Query: {:?} (mode {}, top {})", query, mode.name(), top_k);
    match mode {
        RetrievalMode::Hybrid => {
            let pre_filter_k = index.config().pre_filter_k.max(top_k);
            for (rank, hit) in index.hybrid_search(query, top_k, pre_filter_k)?.iter().enumerate() {
                println!(
                    "{:>3}. [{:>5}] d={:.4}  {}",
                    rank + 1,
                    hit.misconception.id.as_u32(),
                    hit.distance,
                    hit.misconception.text
                );
            }
        }
        _ => {
            for (rank, id) in index.ranked_ids(query, mode, top_k)?.iter().enumerate() {
                let text = index.taxonomy().text(*id).unwrap_or_default();
                println!("{:>3}. [{:>5}] {}", rank + 1, id.as_u32(), text);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = args.eval_config()?;
    if config.scorer == ScorerKind::Judge {
        bail!("The judge scorer needs an LLM judge; miscon-eval only scores by retrieval");
    }

    let taxonomy_path = args.taxonomy_path();
    let taxonomy = Arc::new(
        Taxonomy::load(&taxonomy_path)
            .with_context(|| format!("Failed to load taxonomy {}", taxonomy_path.display()))?,
    );

    eprintln!("Building index over {} misconceptions...", taxonomy.len());
    let embedder = load_embedder(args.model_dir.as_deref(), &config)?;
    let index = Arc::new(
        HybridIndex::build(taxonomy.clone(), embedder, config.retrieval.clone())
            .context("Failed to build retrieval index")?,
    );

    if let Some(query) = &args.query {
        return run_query(&index, query, config.retrieval.mode, args.top_k);
    }

    let predictions_path = args
        .predictions
        .as_ref()
        .context("--predictions is required unless --query is given")?;
    let predictions = load_predictions(predictions_path)
        .with_context(|| format!("Failed to load predictions {}", predictions_path.display()))?;

    let questions_path = args.questions_path();
    let questions = load_questions(&questions_path)
        .with_context(|| format!("Failed to load questions {}", questions_path.display()))?;
    let examples = select_split(build_examples(&questions, &taxonomy), args.split, &config);

    let missing_predictions = examples
        .iter()
        .filter(|e| !predictions.contains_key(&e.key()))
        .count();
    if missing_predictions > 0 {
        warn!(
            "{} examples have no prediction and will be scored as generation failures",
            missing_predictions
        );
    }

    let modes: Vec<RetrievalMode> = if args.compare {
        RetrievalMode::all().to_vec()
    } else {
        vec![config.retrieval.mode]
    };

    let evaluator = Evaluator::from_config(&config);
    let predict = |example: &EvaluationExample| {
        predictions
            .get(&example.key())
            .cloned()
            .unwrap_or_else(|| Prediction::new(config.failure_sentinel.clone()))
    };

    let mut runs = Vec::with_capacity(modes.len());
    for mode in modes {
        let metric = RetrievalMetric::new(index.clone(), &config).with_mode(mode);
        let pb = progress_bar(examples.len(), mode.name())?;
        let report = evaluator.run(&examples, &predict, &metric, |done, _| {
            pb.set_position(done as u64)
        })?;
        pb.finish_and_clear();
        runs.push((mode.name().to_string(), report));
    }

    let comparisons = if runs.len() > 1 {
        compare_runs(&runs)?
    } else {
        Vec::new()
    };

    let output = EvalOutput {
        dataset: DatasetInfo {
            taxonomy_size: taxonomy.len(),
            num_questions: questions.len(),
            num_examples: examples.len(),
            split: format!("{:?}", args.split).to_lowercase(),
            missing_predictions,
        },
        runs: runs
            .iter()
            .map(|(name, report)| RunSummary::new(name, report, config.seed, args.per_example))
            .collect(),
        comparisons,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text(&output);
    }
    Ok(())
}
