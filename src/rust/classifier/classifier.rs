use std::sync::Arc;

use log::debug;

use super::error::ClassifierError;
use super::pool::ClassifierPool;
use super::ports::TokenizationPort;
use super::types::{ClassifierInput, LabelSet, ScoredClassification};
use super::utils::{align_importance, argmax_first, rank_distribution};

/// A thread-safe gloss classifier built on a tokenizer and a pool of HAN classifiers.
///
/// # Thread Safety
///
/// The tokenizer and label set are shared through `Arc`. Classifier instances
/// live in a [`ClassifierPool`]; each request holds one instance for the whole
/// classify + explain sequence, so concurrent requests never read each
/// other's importance scores.
///
/// ```rust,ignore
/// use glossclass::GlossClassifier;
///
/// let classifier = GlossClassifier::builder()
///     .with_tokenizer(tokenizer)
///     .with_classifier(han)
///     .with_labels(vec!["ANIMAL", "PLANT", "OBJECT"])?
///     .build()?;
///
/// let class = classifier.classify("a red rose")?;
/// ```
pub struct GlossClassifier {
    tokenizer: Arc<dyn TokenizationPort>,
    classifiers: ClassifierPool,
    labels: Arc<LabelSet>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<GlossClassifier>();
    }
};

impl std::fmt::Debug for GlossClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlossClassifier")
            .field("classifiers", &self.classifiers)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl GlossClassifier {
    /// Creates a new GlossClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::GlossClassifierBuilder {
        super::builder::GlossClassifierBuilder::new()
    }

    /// Assembles a classifier from already-verified parts.
    pub(crate) fn from_parts(
        tokenizer: Arc<dyn TokenizationPort>,
        classifiers: ClassifierPool,
        labels: Arc<LabelSet>,
    ) -> Self {
        Self { tokenizer, classifiers, labels }
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> super::ClassifierInfo {
        super::ClassifierInfo {
            num_classes: self.labels.len(),
            class_labels: self.labels.as_slice().to_vec(),
            pool_size: self.classifiers.len(),
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Returns the name of the best-matching class for the given gloss.
    ///
    /// Ties go to the class listed first in the label set. Empty text is
    /// passed through to the classifier like any other input.
    ///
    /// # Errors
    /// - `Tokenizer` if the tokenizer fails on the text
    /// - `Inference` if the classifier fails or returns a non-finite score
    /// - `InternalConsistency` if the classifier breaks its output-size contract
    pub fn classify(&self, gloss: &str) -> Result<String, ClassifierError> {
        let input = self.prepare(gloss)?;
        let scores = self.classifiers.with_instance(|classifier| classifier.classify(&input))?;
        self.check_scores(&scores)?;

        let best = argmax_first(&scores).ok_or_else(no_scores)?;
        self.label_at(best)
    }

    /// Classifies the gloss and returns the ranked distribution over all
    /// classes together with the importance of every non-whitespace token.
    ///
    /// # Errors
    /// - `Tokenizer` if the tokenizer fails on the text
    /// - `Inference` if the classifier fails or returns a non-finite score
    /// - `InternalConsistency` if scores and tokens cannot be lined up
    pub fn classify_with_score(
        &self,
        gloss: &str,
    ) -> Result<ScoredClassification, ClassifierError> {
        let input = self.prepare(gloss)?;

        // Importance scores are only valid for the instance that just classified.
        let (scores, importance) = self.classifiers.with_instance(|classifier| {
            let scores = classifier.classify(&input)?;
            let importance = classifier.last_importance_scores()?;
            Ok((scores, importance))
        })?;
        self.check_scores(&scores)?;

        let best = argmax_first(&scores).ok_or_else(no_scores)?;
        let top_class = self.label_at(best)?;

        let distribution = rank_distribution(&self.labels, &scores);
        match distribution.first() {
            Some(first) if first.class_name == top_class => {}
            first => {
                return Err(ClassifierError::InternalConsistency(format!(
                    "Top class '{}' disagrees with ranked distribution head {:?}",
                    top_class,
                    first.map(|entry| entry.class_name.as_str())
                )));
            }
        }

        if importance.iter().flatten().any(|score| !score.is_finite()) {
            return Err(ClassifierError::Inference(
                "Classifier returned non-finite importance scores".into(),
            ));
        }
        let importance_scores = align_importance(&input, importance)?;

        Ok(ScoredClassification { top_class, distribution, importance_scores })
    }

    fn prepare(&self, gloss: &str) -> Result<ClassifierInput, ClassifierError> {
        let sentences = self.tokenizer.tokenize(gloss)?;
        let input = ClassifierInput::from_sentences(&sentences);
        debug!(
            "Tokenized gloss into {} sentences, {} tokens",
            input.len(),
            input.token_count()
        );
        Ok(input)
    }

    fn check_scores(&self, scores: &[f32]) -> Result<(), ClassifierError> {
        if scores.len() != self.labels.len() {
            return Err(ClassifierError::InternalConsistency(format!(
                "Classifier returned {} scores for {} classes",
                scores.len(),
                self.labels.len()
            )));
        }
        if let Some(i) = scores.iter().position(|score| !score.is_finite()) {
            return Err(ClassifierError::Inference(format!(
                "Classifier returned non-finite score {} for class {}",
                scores[i], i
            )));
        }
        Ok(())
    }

    fn label_at(&self, index: usize) -> Result<String, ClassifierError> {
        self.labels
            .get(index)
            .map(str::to_string)
            .ok_or_else(|| {
                ClassifierError::InternalConsistency(format!("No class at index {}", index))
            })
    }
}

fn no_scores() -> ClassifierError {
    ClassifierError::InternalConsistency("Classifier returned no scores".into())
}
