use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

/// Sparse feature vector as (feature index, value) pairs
pub type SparseVector = Vec<(usize, f64)>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier artifact not found at {0:?}; train it first")]
    NotFound(PathBuf),
    #[error("failed to read classifier artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed classifier artifact: {0}")]
    Malformed(String),
    #[error("scoring failed: {0}")]
    Scoring(String),
}

/// Anything that can estimate `[p_non_complaint, p_complaint]` for a text
pub trait ComplaintModel: Send + Sync {
    fn predict_probability(&self, text: &str) -> Result<[f64; 2], ClassifierError>;
}

/// Lowercased word unigrams and bigrams (words of two or more characters)
pub fn ngrams(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = TOKEN_RE.find_iter(&lower).map(|m| m.as_str()).collect();

    let mut grams: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    grams.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    grams
}

/// TF-IDF feature space with smoothed idf and l2-normalized rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn the vocabulary (the `max_features` most frequent n-grams) and idf weights
    pub fn fit<S: AsRef<str>>(documents: &[S], max_features: usize) -> Self {
        let mut term_counts: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let grams = ngrams(doc.as_ref());
            let mut seen = std::collections::HashSet::new();
            for gram in grams {
                *term_counts.entry(gram.clone()).or_insert(0) += 1;
                if seen.insert(gram.clone()) {
                    *doc_freq.entry(gram).or_insert(0) += 1;
                }
            }
        }

        let mut terms: Vec<(String, usize)> = term_counts.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        terms.truncate(max_features);

        let mut kept: Vec<String> = terms.into_iter().map(|(t, _)| t).collect();
        kept.sort();

        let n = documents.len() as f64;
        let idf = kept
            .iter()
            .map(|t| {
                let df = doc_freq.get(t).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let vocabulary = kept.into_iter().enumerate().map(|(i, t)| (t, i)).collect();

        Self { vocabulary, idf }
    }

    pub fn len(&self) -> usize {
        self.idf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    /// Project a text into the feature space
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for gram in ngrams(text) {
            if let Some(&index) = self.vocabulary.get(&gram) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut features: SparseVector = counts
            .into_iter()
            .map(|(i, tf)| (i, tf * self.idf[i]))
            .collect();
        features.sort_by_key(|(i, _)| *i);

        let norm = features.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut features {
                *v /= norm;
            }
        }
        features
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if let Some((term, &index)) = self.vocabulary.iter().find(|(_, i)| **i >= self.idf.len()) {
            return Err(ClassifierError::Malformed(format!(
                "term {:?} maps to index {} beyond {} idf weights",
                term,
                index,
                self.idf.len()
            )));
        }
        Ok(())
    }
}

/// Linear classifier over TF-IDF features with a sigmoid output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearTextModel {
    pub vectorizer: TfidfVectorizer,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LinearTextModel {
    /// Load a JSON artifact; a missing file is reported as `NotFound`
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClassifierError::NotFound(path.to_path_buf())
            } else {
                ClassifierError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let model: Self = serde_json::from_str(&content)
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    /// Write the artifact as JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        let io_err = |source| ClassifierError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string(self).map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        std::fs::write(path, json).map_err(io_err)
    }

    /// Raw decision value for a feature vector
    pub fn decision(&self, features: &SparseVector) -> f64 {
        self.bias
            + features
                .iter()
                .map(|(i, v)| self.weights.get(*i).copied().unwrap_or(0.0) * v)
                .sum::<f64>()
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        self.vectorizer.validate()?;
        if self.weights.len() != self.vectorizer.len() {
            return Err(ClassifierError::Malformed(format!(
                "{} weights for {} features",
                self.weights.len(),
                self.vectorizer.len()
            )));
        }
        Ok(())
    }
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ComplaintModel for LinearTextModel {
    fn predict_probability(&self, text: &str) -> Result<[f64; 2], ClassifierError> {
        let features = self.vectorizer.transform(text);
        let p = sigmoid(self.decision(&features));
        if !p.is_finite() {
            return Err(ClassifierError::Scoring(format!("non-finite probability {}", p)));
        }
        Ok([1.0 - p, p])
    }
}
