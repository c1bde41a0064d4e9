mod error;
mod classifier;
mod pool;
mod utils;
pub mod builder;
pub mod ports;
pub mod types;

pub use error::{ClassifierError, ErrorCategory};
pub use classifier::GlossClassifier;
pub use builder::GlossClassifierBuilder;
pub use pool::ClassifierPool;
pub use ports::{ClassificationPort, TokenizationPort};
pub use types::{
    ClassifierInput, DistributionEntry, ImportanceEntry, LabelSet, ScoreVector,
    ScoredClassification, Sentence, Token, TokenizedInput,
};

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Number of classes the classifier can output
    pub num_classes: usize,
    /// Labels of the classes, in score order
    pub class_labels: Vec<String>,
    /// Number of classifier instances serving requests
    pub pool_size: usize,
}
