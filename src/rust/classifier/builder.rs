use std::path::Path;
use std::sync::Arc;

use log::{error, info};

use super::classifier::GlossClassifier;
use super::error::ClassifierError;
use super::pool::ClassifierPool;
use super::ports::{ClassificationPort, TokenizationPort};
use super::types::LabelSet;
use super::utils::verify_compatibility;

/// A builder for constructing a GlossClassifier with a fluent interface.
///
/// `build` is where the label set is checked against every classifier
/// instance; a mismatch means the service must not start.
#[derive(Default)]
pub struct GlossClassifierBuilder {
    tokenizer: Option<Arc<dyn TokenizationPort>>,
    classifiers: Vec<Box<dyn ClassificationPort>>,
    labels: Option<LabelSet>,
}

impl GlossClassifierBuilder {
    /// Creates a new empty GlossClassifierBuilder
    pub fn new() -> Self {
        Self {
            tokenizer: None,
            classifiers: Vec::new(),
            labels: None,
        }
    }

    /// Sets the tokenizer used to split glosses into sentences
    pub fn with_tokenizer(self, tokenizer: impl TokenizationPort + 'static) -> Self {
        self.with_shared_tokenizer(Arc::new(tokenizer))
    }

    /// Sets a tokenizer that is already shared elsewhere
    pub fn with_shared_tokenizer(mut self, tokenizer: Arc<dyn TokenizationPort>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Adds one classifier instance to the pool
    ///
    /// Adding several instances of the same model lets that many requests run
    /// inference concurrently.
    pub fn with_classifier(mut self, classifier: impl ClassificationPort + 'static) -> Self {
        self.classifiers.push(Box::new(classifier));
        self
    }

    /// Adds several boxed classifier instances to the pool
    pub fn with_classifiers(mut self, classifiers: Vec<Box<dyn ClassificationPort>>) -> Self {
        self.classifiers.extend(classifiers);
        self
    }

    /// Sets the ordered class names
    ///
    /// # Errors
    /// - `Build` if labels were already set
    /// - `Build` if the list is empty, or has empty or duplicate names
    pub fn with_labels(self, labels: Vec<impl Into<String>>) -> Result<Self, ClassifierError> {
        let labels = LabelSet::new(labels)?;
        self.with_label_set(labels)
    }

    /// Loads the ordered class names from a file, one per line
    pub fn with_labels_file(self, path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let labels = LabelSet::from_file(path).map_err(|e| {
            error!("Failed to load classes from {:?}: {}", path, e);
            e
        })?;
        info!("Loaded {} classes from {:?}", labels.len(), path);
        self.with_label_set(labels)
    }

    pub fn with_label_set(mut self, labels: LabelSet) -> Result<Self, ClassifierError> {
        if self.labels.is_some() {
            return Err(ClassifierError::Build("Labels already set".to_string()));
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// Builds and returns the final GlossClassifier instance
    ///
    /// # Returns
    /// * `Result<GlossClassifier, ClassifierError>` - The constructed classifier if successful,
    ///   or an error if:
    ///   - No tokenizer, classifier, or labels were provided
    ///   - The number of labels differs from a classifier's output size
    pub fn build(self) -> Result<GlossClassifier, ClassifierError> {
        let tokenizer = self
            .tokenizer
            .ok_or_else(|| ClassifierError::Build("No tokenizer set".into()))?;
        let labels = self
            .labels
            .ok_or_else(|| ClassifierError::Build("No labels set".into()))?;
        if self.classifiers.is_empty() {
            return Err(ClassifierError::Build("At least one classifier must be added".into()));
        }

        for (i, classifier) in self.classifiers.iter().enumerate() {
            verify_compatibility(labels.len(), classifier.output_size()).map_err(|e| {
                error!("Classifier instance {} is incompatible with the label set: {}", i, e);
                e
            })?;
        }

        let pool = ClassifierPool::new(self.classifiers)?;
        info!(
            "Classifier ready: {} classes, {} instance(s)",
            labels.len(),
            pool.len()
        );

        Ok(GlossClassifier::from_parts(tokenizer, pool, Arc::new(labels)))
    }
}
