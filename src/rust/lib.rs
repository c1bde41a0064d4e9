//! A thread-safe gloss classification service built around a hierarchical
//! attention network (HAN) running on ONNX Runtime.
//!
//! The service tokenizes a gloss into sentences, feeds the non-whitespace
//! tokens to the classifier and reports the winning class label, optionally
//! with the full score distribution and per-token importance.
//!
//! # Basic Usage
//!
//! Tokenizer and classifier are plugged in through [`TokenizationPort`] and
//! [`ClassificationPort`]:
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use glossclass::{
//!     ClassificationPort, ClassifierError, ClassifierInput, GlossClassifier, ScoreVector,
//!     Sentence, Token, TokenizationPort, TokenizedInput,
//! };
//!
//! struct Words;
//!
//! impl TokenizationPort for Words {
//!     fn tokenize(&self, text: &str) -> Result<TokenizedInput, ClassifierError> {
//!         let tokens = text.split_whitespace().map(Token::word).collect();
//!         Ok(vec![Sentence::new(tokens)])
//!     }
//! }
//!
//! struct Fixed;
//!
//! impl ClassificationPort for Fixed {
//!     fn output_size(&self) -> usize {
//!         2
//!     }
//!     fn classify(&mut self, _input: &ClassifierInput) -> Result<ScoreVector, ClassifierError> {
//!         Ok(vec![0.2, 0.8])
//!     }
//!     fn last_importance_scores(&self) -> Result<Vec<Vec<f32>>, ClassifierError> {
//!         Ok(vec![vec![0.5, 0.5]])
//!     }
//! }
//!
//! let classifier = GlossClassifier::builder()
//!     .with_tokenizer(Words)
//!     .with_classifier(Fixed)
//!     .with_labels(vec!["ANIMAL", "PLANT"])?
//!     .build()?;
//!
//! assert_eq!(classifier.classify("a red rose")?, "PLANT");
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! [`GlossClassifier`] is `Send + Sync` and is meant to be shared through an
//! `Arc`. Each call borrows one classifier instance from its pool for the
//! whole classify-then-explain sequence, so importance scores always belong
//! to the request that produced them.

pub mod adapters;
pub mod classifier;
pub mod model_manager;
pub mod runtime;
pub mod server;

pub use adapters::{HanModelConfig, HanOnnxClassifier, Vocabulary, WordTokenizer};
pub use classifier::{
    ClassificationPort, ClassifierError, ClassifierInfo, ClassifierInput, ClassifierPool,
    DistributionEntry, ErrorCategory, GlossClassifier, GlossClassifierBuilder, ImportanceEntry,
    LabelSet, ScoreVector, ScoredClassification, Sentence, Token, TokenizationPort, TokenizedInput,
};
pub use model_manager::{ModelError, ModelManager};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use server::{HttpReply, Router};

/// Initializes `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
pub fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).try_init();
}
