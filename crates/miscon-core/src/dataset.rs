//! Example builder and dataset files.
//!
//! A question row carries four answer options, each with its own optional
//! misconception id. [`build_examples`] reshapes every row into one
//! [`EvaluationExample`] per answer option, which is the unit the metric
//! scores. Predictions produced by the external generation pipeline are read
//! from a separate CSV keyed by question id and answer label.

use crate::error::LoadError;
use crate::evaluation::stats::Lcg;
use crate::metric::Prediction;
use crate::taxonomy::{MisconceptionId, Taxonomy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Answer option labels, in column order.
pub const ANSWER_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// One answer option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub label: char,
    pub text: String,
    pub misconception_id: Option<MisconceptionId>,
}

/// A parsed row of the question file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: u32,
    pub construct_name: String,
    pub subject_name: String,
    pub correct_answer: String,
    pub question_text: String,
    pub answers: [AnswerOption; 4],
}

impl Question {
    /// The prompt shown to the generation pipeline for this question.
    pub fn prompt(&self) -> String {
        let mut prompt = format!(
            "The question is: {}\nAnd here is the possible answers.",
            self.question_text
        );
        for answer in &self.answers {
            prompt.push_str(&format!("\n{}: {}", answer.label, answer.text));
        }
        prompt.push_str(&format!("\nThe correct answer is: {}", self.correct_answer));
        prompt
    }
}

/// Column layout of the question CSV.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QuestionRecord {
    question_id: u32,
    #[serde(default)]
    construct_name: String,
    #[serde(default)]
    subject_name: String,
    correct_answer: String,
    question_text: String,
    answer_a_text: String,
    answer_b_text: String,
    answer_c_text: String,
    answer_d_text: String,
    #[serde(default)]
    misconception_a_id: String,
    #[serde(default)]
    misconception_b_id: String,
    #[serde(default)]
    misconception_c_id: String,
    #[serde(default)]
    misconception_d_id: String,
}

impl QuestionRecord {
    fn into_question(self, line: u64) -> Result<Question, LoadError> {
        let parse = |cell: &str| {
            MisconceptionId::parse_cell(cell).map_err(|value| LoadError::InvalidId { value, line })
        };
        let option = |label: char, text: String, cell: &str| -> Result<AnswerOption, LoadError> {
            Ok(AnswerOption {
                label,
                text,
                misconception_id: parse(cell)?,
            })
        };

        Ok(Question {
            question_id: self.question_id,
            answers: [
                option('A', self.answer_a_text, &self.misconception_a_id)?,
                option('B', self.answer_b_text, &self.misconception_b_id)?,
                option('C', self.answer_c_text, &self.misconception_c_id)?,
                option('D', self.answer_d_text, &self.misconception_d_id)?,
            ],
            construct_name: self.construct_name,
            subject_name: self.subject_name,
            correct_answer: self.correct_answer.trim().to_string(),
            question_text: self.question_text,
        })
    }
}

fn open(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Loads the question file (`train.csv` layout).
pub fn load_questions(path: &Path) -> Result<Vec<Question>, LoadError> {
    let questions = questions_from_reader(open(path)?)?;
    info!("Loaded {} questions from {}", questions.len(), path.display());
    Ok(questions)
}

/// Parses questions from any CSV source with a header row.
pub fn questions_from_reader<R: Read>(reader: R) -> Result<Vec<Question>, LoadError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut questions = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let raw: QuestionRecord = record.deserialize(Some(&headers))?;
        questions.push(raw.into_question(line)?);
    }
    Ok(questions)
}

/// Identifies one answer slot of one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExampleKey {
    pub question_id: u32,
    pub answer: char,
}

impl fmt::Display for ExampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.question_id, self.answer)
    }
}

/// A labelled evaluation unit: one answer option of one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationExample {
    pub question_id: u32,
    /// Answer label (`A`..`D`) whose misconception is being explained
    pub answer: char,
    /// Full prompt including every option and the correct answer
    pub question: String,
    /// `None` when no misconception applies to this answer
    pub gold_misconception_id: Option<MisconceptionId>,
    /// Taxonomy text of the gold misconception, if it exists
    pub gold_text: Option<String>,
}

impl EvaluationExample {
    pub fn key(&self) -> ExampleKey {
        ExampleKey {
            question_id: self.question_id,
            answer: self.answer,
        }
    }

    pub fn is_labelled(&self) -> bool {
        self.gold_misconception_id.is_some()
    }
}

/// Reshapes questions into one example per answer option.
///
/// Gold ids that are absent from the taxonomy are kept (with no gold text);
/// they can never be retrieved and therefore score zero.
pub fn build_examples(questions: &[Question], taxonomy: &Taxonomy) -> Vec<EvaluationExample> {
    let mut examples = Vec::with_capacity(questions.len() * ANSWER_LABELS.len());
    let mut unknown = 0usize;

    for question in questions {
        let prompt = question.prompt();
        for answer in &question.answers {
            let gold_text = answer
                .misconception_id
                .and_then(|id| taxonomy.text(id))
                .map(str::to_string);
            if answer.misconception_id.is_some() && gold_text.is_none() {
                unknown += 1;
            }
            examples.push(EvaluationExample {
                question_id: question.question_id,
                answer: answer.label,
                question: format!("{}\nThe answer to explain is: {}", prompt, answer.label),
                gold_misconception_id: answer.misconception_id,
                gold_text,
            });
        }
    }

    let labelled = examples.iter().filter(|e| e.is_labelled()).count();
    info!(
        "Built {} examples ({} labelled, {} with ids missing from the taxonomy)",
        examples.len(),
        labelled,
        unknown
    );
    examples
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PredictionRecord {
    question_id: u32,
    answer: String,
    prediction: String,
}

/// Generated explanations keyed by answer slot.
pub type PredictionTable = HashMap<ExampleKey, Prediction>;

/// Loads a predictions CSV with `QuestionId`, `Answer`, `Prediction` columns.
pub fn load_predictions(path: &Path) -> Result<PredictionTable, LoadError> {
    let table = predictions_from_reader(open(path)?)?;
    info!("Loaded {} predictions from {}", table.len(), path.display());
    Ok(table)
}

/// Parses predictions from any CSV source with a header row.
///
/// # Errors
///
/// `LoadError::InvalidRow` for an answer label outside `A`..`D` or a
/// repeated (question, answer) pair.
pub fn predictions_from_reader<R: Read>(reader: R) -> Result<PredictionTable, LoadError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut table = PredictionTable::new();
    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let raw: PredictionRecord = record.deserialize(Some(&headers))?;

        let answer = parse_label(&raw.answer).ok_or_else(|| LoadError::InvalidRow {
            line,
            reason: format!("answer label {:?} is not one of A, B, C, D", raw.answer),
        })?;
        let key = ExampleKey {
            question_id: raw.question_id,
            answer,
        };
        if table.insert(key, Prediction::new(raw.prediction)).is_some() {
            return Err(LoadError::InvalidRow {
                line,
                reason: format!("duplicate prediction for {}", key),
            });
        }
    }
    debug!("Parsed {} prediction rows", table.len());
    Ok(table)
}

fn parse_label(raw: &str) -> Option<char> {
    let mut chars = raw.trim().chars();
    let c = chars.next()?.to_ascii_uppercase();
    (chars.next().is_none() && ANSWER_LABELS.contains(&c)).then_some(c)
}

/// Deterministic shuffle-then-split.
///
/// Returns `(train, test)` where `test` holds `ceil(len * test_fraction)`
/// items. The same `seed` always yields the same partition.
pub fn train_test_split<T: Clone>(items: &[T], test_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let n = items.len();
    let n_test = ((n as f64) * test_fraction.clamp(0.0, 1.0)).ceil() as usize;

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = Lcg::new(seed);
    for i in (1..n).rev() {
        order.swap(i, rng.below(i + 1));
    }

    let (test_idx, train_idx) = order.split_at(n_test.min(n));
    let pick = |idx: &[usize]| idx.iter().map(|&i| items[i].clone()).collect::<Vec<T>>();
    (pick(train_idx), pick(test_idx))
}
