use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{debug, info};

use super::model::{LinearTextModel, SparseVector, TfidfVectorizer, sigmoid};
use crate::models::SentimentLabel;

/// A human-labeled training row
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    pub text: String,
    pub is_complaint: bool,
}

#[derive(Debug, Deserialize)]
struct LabeledRow {
    text: String,
    label: String,
}

/// Read labeled JSONL rows of `{"text": ..., "label": ...}`.
///
/// "Complaint" is the positive class; any other known label is negative.
/// Rows with blank text are skipped.
pub fn load_labeled_jsonl(path: &Path) -> Result<Vec<LabeledExample>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read training data: {:?}", path))?;

    let mut examples = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: LabeledRow = serde_json::from_str(line)
            .with_context(|| format!("Invalid JSON on line {}", line_no + 1))?;
        let label: SentimentLabel = row
            .label
            .parse()
            .map_err(|e: String| anyhow::anyhow!("Line {}: {}", line_no + 1, e))?;

        if row.text.trim().is_empty() {
            debug!("Skipping blank text on line {}", line_no + 1);
            continue;
        }
        examples.push(LabeledExample {
            text: row.text,
            is_complaint: label == SentimentLabel::Complaint,
        });
    }
    Ok(examples)
}

/// Training hyperparameters
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Refuse to train on fewer rows than this
    pub min_examples: usize,
    /// Share of each class held out for evaluation
    pub test_fraction: f64,
    pub max_features: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            min_examples: 50,
            test_fraction: 0.2,
            max_features: 50_000,
            epochs: 300,
            learning_rate: 0.5,
            l2: 1e-4,
            seed: 42,
        }
    }
}

/// Held-out evaluation of a trained model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, actual: bool, predicted: bool) {
        match (actual, predicted) {
            (false, false) => self.true_negative += 1,
            (false, true) => self.false_positive += 1,
            (true, false) => self.false_negative += 1,
            (true, true) => self.true_positive += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_negative + self.true_positive, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "                 pred non  pred complaint")?;
        writeln!(
            f,
            "non-complaint    {:>8}  {:>14}",
            self.true_negative, self.false_positive
        )?;
        writeln!(
            f,
            "complaint        {:>8}  {:>14}",
            self.false_negative, self.true_positive
        )?;
        write!(
            f,
            "accuracy {:.4}  precision {:.4}  recall {:.4}",
            self.accuracy(),
            self.precision(),
            self.recall()
        )
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Trained model plus its held-out evaluation
#[derive(Debug)]
pub struct TrainOutcome {
    pub model: LinearTextModel,
    pub evaluation: ConfusionMatrix,
    pub train_size: usize,
    pub test_size: usize,
}

/// Train a class-balanced, L2-regularized logistic regression over TF-IDF features
pub fn train(examples: &[LabeledExample], config: &TrainConfig) -> Result<TrainOutcome> {
    if examples.len() < config.min_examples {
        bail!(
            "Not enough labeled data to train: found {} rows, need at least {}",
            examples.len(),
            config.min_examples
        );
    }

    let (train_idx, test_idx) = stratified_split(examples, config.test_fraction, config.seed)?;
    info!(
        "Training on {} rows, evaluating on {}",
        train_idx.len(),
        test_idx.len()
    );

    let train_texts: Vec<&str> = train_idx.iter().map(|&i| examples[i].text.as_str()).collect();
    let vectorizer = TfidfVectorizer::fit(&train_texts, config.max_features);
    let features: Vec<SparseVector> = train_texts.iter().map(|t| vectorizer.transform(t)).collect();
    let targets: Vec<bool> = train_idx.iter().map(|&i| examples[i].is_complaint).collect();

    let (weights, bias) = fit_logistic(&features, &targets, vectorizer.len(), config);
    if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
        bail!(
            "Training diverged to non-finite weights (learning rate {}); lower it and retry",
            config.learning_rate
        );
    }
    let model = LinearTextModel {
        vectorizer,
        weights,
        bias,
    };

    let mut evaluation = ConfusionMatrix::default();
    for &i in &test_idx {
        let p = sigmoid(model.decision(&model.vectorizer.transform(&examples[i].text)));
        evaluation.record(examples[i].is_complaint, p >= 0.5);
    }

    Ok(TrainOutcome {
        model,
        evaluation,
        train_size: train_idx.len(),
        test_size: test_idx.len(),
    })
}

/// Split indices so each class keeps its share in the held-out set
fn stratified_split(
    examples: &[LabeledExample],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [false, true] {
        let mut indices: Vec<usize> = examples
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_complaint == class)
            .map(|(i, _)| i)
            .collect();
        if indices.len() < 2 {
            bail!(
                "Need at least two examples of each class, found {} {}",
                indices.len(),
                if class { "complaints" } else { "non-complaints" }
            );
        }
        indices.shuffle(&mut rng);

        let n_test = ((indices.len() as f64 * test_fraction).round() as usize).clamp(1, indices.len() - 1);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Full-batch gradient descent on the weighted log loss
fn fit_logistic(
    features: &[SparseVector],
    targets: &[bool],
    dims: usize,
    config: &TrainConfig,
) -> (Vec<f64>, f64) {
    let n = targets.len() as f64;
    let positives = targets.iter().filter(|&&t| t).count() as f64;
    let negatives = n - positives;
    // balanced class weights: n / (2 * n_class)
    let class_weight = |t: bool| if t { n / (2.0 * positives) } else { n / (2.0 * negatives) };

    let mut weights = vec![0.0; dims];
    let mut bias = 0.0;
    let mut grad = vec![0.0; dims];

    for epoch in 0..config.epochs {
        grad.iter_mut().for_each(|g| *g = 0.0);
        let mut grad_bias = 0.0;
        let mut loss = 0.0;

        for (x, &t) in features.iter().zip(targets) {
            let z = bias + x.iter().map(|(i, v)| weights[*i] * v).sum::<f64>();
            let p = sigmoid(z);
            let y = if t { 1.0 } else { 0.0 };
            let cw = class_weight(t);
            let err = cw * (p - y);

            for (i, v) in x {
                grad[*i] += err * v;
            }
            grad_bias += err;
            loss -= cw * (y * p.max(1e-12).ln() + (1.0 - y) * (1.0 - p).max(1e-12).ln());
        }

        for (w, g) in weights.iter_mut().zip(&grad) {
            *w -= config.learning_rate * (g / n + config.l2 * *w);
        }
        bias -= config.learning_rate * grad_bias / n;

        if epoch % 50 == 0 {
            debug!("epoch {} loss {:.4}", epoch, loss / n);
        }
    }

    (weights, bias)
}
