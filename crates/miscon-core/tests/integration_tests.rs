//! End-to-end tests for the evaluation pipeline.
//!
//! These tests exercise the full workflow through the public API:
//! 1. Loading: taxonomy CSV, question CSV, predictions CSV
//! 2. Indexing: BM25 pre-filter + hashing embedder
//! 3. Scoring: retrieval metric, worker pool, report aggregation
//!
//! No model files are needed; the hashing embedder is deterministic.
//! Run with: `cargo test -p miscon-core --test integration_tests`

use miscon_core::config::{MissingGoldPolicy, RetrievalMode, FAILURE_SENTINEL};
use miscon_core::dataset::{
    build_examples, load_predictions, load_questions, train_test_split, ExampleKey,
};
use miscon_core::embedding::HashingEmbedder;
use miscon_core::evaluation::mean_average_precision_at_cutoff;
use miscon_core::{
    EvalConfig, EvaluationExample, Evaluator, HybridIndex, Misconception, MisconceptionId,
    Prediction, RetrievalConfig, RetrievalMetric, Taxonomy,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

const TAXONOMY_CSV: &str = "MisconceptionId,MisconceptionName\n\
    1,Does not know that angles in a triangle sum to 180 degrees\n\
    2,Believes there are 100 degrees in a full turn\n\
    3,Confuses area and perimeter\n\
    4,\"Thinks that when you multiply fractions, you add the denominators\"\n";

const QUESTIONS_CSV: &str = "QuestionId,ConstructName,SubjectName,CorrectAnswer,QuestionText,AnswerAText,AnswerBText,AnswerCText,AnswerDText,MisconceptionAId,MisconceptionBId,MisconceptionCId,MisconceptionDId\n\
    0,Angles in a triangle,Angles,C,What do the angles in a triangle add up to?,90,100,180,360,1.0,2.0,,\n\
    1,Area of rectangles,Area,A,What is the area of a 2 by 3 rectangle?,6,10,5,12,,3.0,,\n";

fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn predictions_csv() -> String {
    format!(
        "QuestionId,Answer,Prediction\n\
         0,A,Does not know that angles in a triangle sum to 180 degrees\n\
         0,B,{}\n",
        FAILURE_SENTINEL
    )
}

fn build_index(taxonomy: Arc<Taxonomy>) -> Arc<HybridIndex> {
    let config = RetrievalConfig::default();
    let embedder = Arc::new(HashingEmbedder::new(config.embedding_dim).unwrap());
    Arc::new(HybridIndex::build(taxonomy, embedder, config).unwrap())
}

struct Loaded {
    _dir: TempDir,
    taxonomy: Arc<Taxonomy>,
    examples: Vec<EvaluationExample>,
    predictions: std::collections::HashMap<ExampleKey, Prediction>,
}

fn load_fixture() -> Loaded {
    let dir = TempDir::new().unwrap();
    let taxonomy_path = write_file(dir.path(), "misconception_mapping.csv", TAXONOMY_CSV);
    let questions_path = write_file(dir.path(), "train.csv", QUESTIONS_CSV);
    let predictions_path = write_file(dir.path(), "predictions.csv", &predictions_csv());

    let taxonomy = Arc::new(Taxonomy::load(&taxonomy_path).unwrap());
    let questions = load_questions(&questions_path).unwrap();
    let examples = build_examples(&questions, &taxonomy);
    let predictions = load_predictions(&predictions_path).unwrap();

    Loaded {
        _dir: dir,
        taxonomy,
        examples,
        predictions,
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn test_load_and_reshape() {
    let fixture = load_fixture();

    assert_eq!(fixture.taxonomy.len(), 4);
    assert_eq!(
        fixture.taxonomy.text(MisconceptionId::new(4)),
        Some("Thinks that when you multiply fractions, you add the denominators")
    );
    assert_eq!(fixture.examples.len(), 8);
    assert_eq!(fixture.examples.iter().filter(|e| e.is_labelled()).count(), 3);
    assert_eq!(fixture.predictions.len(), 2);

    let first = &fixture.examples[0];
    assert_eq!(first.key().to_string(), "0_A");
    assert_eq!(first.gold_misconception_id, Some(MisconceptionId::new(1)));
    assert!(first.question.contains("The correct answer is: C"));
}

#[test]
fn test_end_to_end_map_at_25() {
    let fixture = load_fixture();
    let index = build_index(fixture.taxonomy.clone());
    let metric = RetrievalMetric::new(index, &EvalConfig::default());

    // 0_A exact text, 0_B sentinel, 1_B no prediction
    let predict = |example: &EvaluationExample| {
        fixture
            .predictions
            .get(&example.key())
            .cloned()
            .unwrap_or_else(Prediction::failed)
    };
    let report = Evaluator::new(2)
        .run(&fixture.examples, predict, &metric, |_, _| {})
        .unwrap();

    assert_eq!(report.evaluated, 3);
    assert_eq!(report.excluded, 5);
    assert_eq!(report.generation_failures, 2);
    assert_eq!(report.values(), vec![1.0, 0.0, 0.0]);
    assert!((report.mean - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(report.hits_at_1(), 1);
}

#[test]
fn test_missing_gold_counted_as_correct() {
    let fixture = load_fixture();
    let config = EvalConfig {
        missing_gold: MissingGoldPolicy::Correct,
        ..Default::default()
    };
    let metric = RetrievalMetric::new(build_index(fixture.taxonomy.clone()), &config);

    let report = Evaluator::from_config(&config)
        .run(
            &fixture.examples,
            |_: &EvaluationExample| Prediction::new("Confuses area and perimeter"),
            &metric,
            |_, _| {},
        )
        .unwrap();

    // Five unlabelled slots score 1; of the labelled ones only id 3 is ranked first.
    assert_eq!(report.evaluated, 8);
    assert_eq!(report.excluded, 0);
    assert_eq!(report.values().iter().filter(|&&v| v >= 1.0).count(), 6);
    assert_eq!(report.hits_at_1(), 1);
}

#[test]
fn test_report_serializes_to_json() {
    let fixture = load_fixture();
    let metric = RetrievalMetric::new(
        build_index(fixture.taxonomy.clone()),
        &EvalConfig::default(),
    )
    .with_mode(RetrievalMode::Fused);

    let report = Evaluator::new(1)
        .run(
            &fixture.examples,
            |_: &EvaluationExample| Prediction::failed(),
            &metric,
            |_, _| {},
        )
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["metric"], "map@25 (fused)");
    assert_eq!(json["evaluated"], 3);
    assert_eq!(json["scores"].as_array().unwrap().len(), 3);
    assert_eq!(json["scores"][0]["generation_failed"], true);
}

// ============================================================================
// Retrieval through the public API
// ============================================================================

#[test]
fn test_triangle_query_ranks_triangle_first() {
    let taxonomy = Arc::new(
        Taxonomy::from_rows(vec![
            Misconception::new(1, "doesn't know triangle's shape"),
            Misconception::new(2, "confuses area and perimeter"),
        ])
        .unwrap(),
    );
    let index = build_index(taxonomy);

    for &mode in RetrievalMode::all() {
        let ranked = index
            .ranked_ids("doesn't know triangle's shape", mode, 25)
            .unwrap();
        assert_eq!(ranked.first(), Some(&MisconceptionId::new(1)), "{}", mode.name());
    }
}

#[test]
fn test_batch_map_on_exact_gold_text() {
    let fixture = load_fixture();
    let index = build_index(fixture.taxonomy.clone());

    let labelled: Vec<&EvaluationExample> =
        fixture.examples.iter().filter(|e| e.is_labelled()).collect();
    let preds: Vec<Vec<MisconceptionId>> = labelled
        .iter()
        .map(|e| {
            let text = e.gold_text.as_deref().unwrap_or_default();
            index.ranked_ids(text, RetrievalMode::Hybrid, 25).unwrap()
        })
        .collect();
    let gold: Vec<MisconceptionId> = labelled
        .iter()
        .filter_map(|e| e.gold_misconception_id)
        .collect();

    let map = mean_average_precision_at_cutoff(&preds, &gold).unwrap();
    assert_eq!(map, 1.0);
}

// ============================================================================
// Configuration and splitting
// ============================================================================

#[test]
fn test_config_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        dir.path(),
        "eval.toml",
        "workers = 4\nmissing_gold = \"incorrect\"\n\n[retrieval]\nmode = \"vector\"\npre_filter_k = 30\n",
    );
    let config = EvalConfig::load(&path).unwrap();

    assert_eq!(config.workers, 4);
    assert_eq!(config.missing_gold, MissingGoldPolicy::Incorrect);
    assert_eq!(config.retrieval.mode, RetrievalMode::Vector);
    assert_eq!(config.retrieval.pre_filter_k, 30);
    assert_eq!(config.retrieval.top_k, 25);
}

#[test]
fn test_config_file_invalid_pre_filter() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        dir.path(),
        "eval.toml",
        "[retrieval]\ntop_k = 25\npre_filter_k = 10\n",
    );
    assert!(EvalConfig::load(&path).is_err());
}

#[test]
fn test_split_is_reproducible_and_disjoint() {
    let fixture = load_fixture();
    let keys: Vec<ExampleKey> = fixture.examples.iter().map(|e| e.key()).collect();

    let (train_a, test_a) = train_test_split(&keys, 0.25, 7);
    let (train_b, test_b) = train_test_split(&keys, 0.25, 7);

    assert_eq!(train_a, train_b);
    assert_eq!(test_a, test_b);
    assert_eq!(test_a.len(), 2);
    assert_eq!(train_a.len() + test_a.len(), keys.len());
    assert!(test_a.iter().all(|k| !train_a.contains(k)));
}
