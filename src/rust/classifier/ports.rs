use super::error::ClassifierError;
use super::types::{ClassifierInput, ScoreVector, TokenizedInput};

/// Splits raw text into sentences of tokens.
///
/// Implementations hold no per-call state, so a single instance is shared by
/// every request through an `Arc`.
///
/// Contract:
/// - Identical text yields identical output for a fixed loaded model
/// - Empty or whitespace-only text yields zero sentences, never an error
pub trait TokenizationPort: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<TokenizedInput, ClassifierError>;
}

/// Scores a tokenized gloss against a fixed set of classes.
///
/// `last_importance_scores` reads state left behind by the preceding
/// `classify` call on the same instance. The two calls must therefore run as
/// one exclusive unit per request; [`super::pool::ClassifierPool`] enforces
/// that by handing out instances behind a mutex.
pub trait ClassificationPort: Send {
    /// Number of scores produced by every `classify` call
    fn output_size(&self) -> usize;

    /// Returns one score per class for the given input.
    ///
    /// # Errors
    /// - `Inference` if the underlying model raises a runtime fault
    fn classify(&mut self, input: &ClassifierInput) -> Result<ScoreVector, ClassifierError>;

    /// Returns per-sentence, per-token importance scores for the input most
    /// recently passed to `classify`.
    ///
    /// # Errors
    /// - `Inference` if no classification has run on this instance yet
    fn last_importance_scores(&self) -> Result<Vec<Vec<f32>>, ClassifierError>;
}
