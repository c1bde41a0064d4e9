use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;

use super::error::ClassifierError;

/// A single token produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The surface form as it appears in the input text
    pub form: String,
    /// Whether the token is made only of whitespace
    pub is_whitespace: bool,
}

impl Token {
    pub fn word(form: impl Into<String>) -> Self {
        Self { form: form.into(), is_whitespace: false }
    }

    pub fn space(form: impl Into<String>) -> Self {
        Self { form: form.into(), is_whitespace: true }
    }
}

/// Tokens of one sentence in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    pub tokens: Vec<Token>,
}

impl Sentence {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }
}

/// The sentences of a tokenized gloss, in reading order.
pub type TokenizedInput = Vec<Sentence>;

/// Scores over the label set, index-aligned with [`LabelSet`].
pub type ScoreVector = Vec<f32>;

/// Token forms per sentence, with whitespace tokens removed.
///
/// Importance scores returned by a classifier are positional over this view,
/// so it is the only place whitespace gets filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierInput {
    sentences: Vec<Vec<String>>,
}

impl ClassifierInput {
    pub fn from_sentences(sentences: &[Sentence]) -> Self {
        let sentences = sentences
            .iter()
            .map(|sentence| {
                sentence
                    .tokens
                    .iter()
                    .filter(|token| !token.is_whitespace)
                    .map(|token| token.form.clone())
                    .collect()
            })
            .collect();
        Self { sentences }
    }

    pub fn sentences(&self) -> &[Vec<String>] {
        &self.sentences
    }

    /// Number of sentences, including sentences left empty by filtering.
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Total count of non-whitespace tokens across all sentences.
    pub fn token_count(&self) -> usize {
        self.sentences.iter().map(Vec::len).sum()
    }
}

impl From<Vec<Vec<String>>> for ClassifierInput {
    fn from(sentences: Vec<Vec<String>>) -> Self {
        Self { sentences }
    }
}

/// The ordered, immutable list of class names a classifier can output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Creates a label set, rejecting empty sets and duplicate names.
    pub fn new(labels: Vec<impl Into<String>>) -> Result<Self, ClassifierError> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(ClassifierError::Build("Label set cannot be empty".into()));
        }
        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if label.is_empty() {
                return Err(ClassifierError::Build("Class label cannot be empty".into()));
            }
            if !seen.insert(label.as_str()) {
                return Err(ClassifierError::Build(format!("Duplicate class label '{}'", label)));
            }
        }
        Ok(Self { labels })
    }

    /// Loads a label set from a file with one class name per line.
    ///
    /// Trailing whitespace is trimmed and blank lines are skipped.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ClassifierError::Build(format!("Failed to read classes file {:?}: {}", path, e))
        })?;
        Self::new(
            contents
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.is_empty())
                .collect::<Vec<&str>>(),
        )
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// One label with its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionEntry {
    #[serde(rename = "class")]
    pub class_name: String,
    pub score: f32,
}

/// One non-whitespace token with its importance for the classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceEntry {
    pub token: String,
    pub score: f32,
}

/// The full outcome of a scored classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredClassification {
    #[serde(rename = "class")]
    pub top_class: String,
    /// Every label, sorted by descending score
    pub distribution: Vec<DistributionEntry>,
    /// One list per sentence, one entry per non-whitespace token
    pub importance_scores: Vec<Vec<ImportanceEntry>>,
}
