use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::{error, info, warn};
use ndarray::Array2;
use ort::session::Session;
use ort::value::{Tensor, ValueType};
use tokenizers::Tokenizer;

use crate::classifier::{ClassificationPort, ClassifierError, ClassifierInput, ScoreVector};
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Names of the tensors exchanged with the exported HAN graph.
///
/// The model is expected to:
/// - Accept `token_ids` and `token_mask`, both int64 `[sentences, max_tokens]`
/// - Output class scores as `[classes]` or `[1, classes]`
/// - Output token importance as `[sentences, max_tokens]`
#[derive(Debug, Clone)]
pub struct HanModelConfig {
    pub token_ids_input: String,
    pub token_mask_input: String,
    pub scores_output: String,
    pub importance_output: String,
    /// Vocabulary entry used for forms the model has never seen
    pub unknown_token: String,
    /// Retry unknown forms in lowercase before falling back to `unknown_token`
    pub lowercase_fallback: bool,
}

impl Default for HanModelConfig {
    fn default() -> Self {
        Self {
            token_ids_input: "token_ids".to_string(),
            token_mask_input: "token_mask".to_string(),
            scores_output: "scores".to_string(),
            importance_output: "importance".to_string(),
            unknown_token: "[UNK]".to_string(),
            lowercase_fallback: true,
        }
    }
}

/// Maps token forms to the ids the HAN embeddings were trained on.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    ids: HashMap<String, i64>,
    unknown_id: i64,
    lowercase_fallback: bool,
}

impl Vocabulary {
    pub fn new(
        ids: HashMap<String, i64>,
        unknown_token: &str,
        lowercase_fallback: bool,
    ) -> Result<Self, ClassifierError> {
        let unknown_id = *ids.get(unknown_token).ok_or_else(|| {
            let message = format!("Unknown token '{}' is not in the vocabulary", unknown_token);
            ClassifierError::Build(message)
        })?;
        Ok(Self { ids, unknown_id, lowercase_fallback })
    }

    /// Uses the vocabulary of a HuggingFace tokenizer, added tokens included.
    pub fn from_tokenizer(
        tokenizer: &Tokenizer,
        config: &HanModelConfig,
    ) -> Result<Self, ClassifierError> {
        let ids = tokenizer
            .get_vocab(true)
            .into_iter()
            .map(|(form, id)| (form, i64::from(id)))
            .collect();
        Self::new(ids, &config.unknown_token, config.lowercase_fallback)
    }

    pub fn id(&self, form: &str) -> i64 {
        if let Some(&id) = self.ids.get(form) {
            return id;
        }
        if self.lowercase_fallback {
            if let Some(&id) = self.ids.get(&form.to_lowercase()) {
                return id;
            }
        }
        self.unknown_id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A hierarchical attention network classifier running on ONNX Runtime.
///
/// The session and vocabulary are shared between replicas; each replica keeps
/// its own importance scores from its last `classify` call.
#[derive(Debug)]
pub struct HanOnnxClassifier {
    session: Arc<Session>,
    vocabulary: Arc<Vocabulary>,
    config: Arc<HanModelConfig>,
    output_size: usize,
    last_importance: Option<Vec<Vec<f32>>>,
}

impl HanOnnxClassifier {
    /// Loads the HAN graph and validates its inputs and outputs.
    ///
    /// # Errors
    /// - `Build` if the file is missing or the session cannot be created
    /// - `Build` if a configured input or output is absent from the graph
    /// - `Inference` if the output size has to be probed and the probe fails
    pub fn from_file(
        model_path: impl AsRef<Path>,
        vocabulary: Vocabulary,
        config: HanModelConfig,
        runtime: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(ClassifierError::Build(format!("Model file not found: {:?}", model_path)));
        }

        let session = create_session_builder(runtime)?
            .commit_from_file(model_path)
            .map_err(|e| {
                error!("Failed to load HAN model: {}", e);
                let message = format!("Failed to load HAN model from {:?}: {}", model_path, e);
                ClassifierError::Build(message)
            })?;

        Self::validate_model(&session, &config)?;
        info!("HAN model loaded from {:?}", model_path);

        let mut classifier = Self {
            session: Arc::new(session),
            vocabulary: Arc::new(vocabulary),
            config: Arc::new(config),
            output_size: 0,
            last_importance: None,
        };

        let declared = declared_output_size(&classifier.session, &classifier.config);
        classifier.output_size = match declared {
            Some(size) => size,
            None => {
                warn!("Model declares a dynamic class dimension, probing it with a test input");
                let unknown = classifier.config.unknown_token.clone();
                let probe = ClassifierInput::from(vec![vec![unknown]]);
                classifier.run(&probe)?.0.len()
            }
        };
        info!("HAN model outputs {} class scores", classifier.output_size);

        Ok(classifier)
    }

    /// Creates another instance over the same session, with its own state.
    pub fn replicate(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            vocabulary: Arc::clone(&self.vocabulary),
            config: Arc::clone(&self.config),
            output_size: self.output_size,
            last_importance: None,
        }
    }

    fn validate_model(session: &Session, config: &HanModelConfig) -> Result<(), ClassifierError> {
        for name in [&config.token_ids_input, &config.token_mask_input] {
            if !session.inputs.iter().any(|input| &input.name == name) {
                return Err(ClassifierError::Build(format!("Model has no input named '{}'", name)));
            }
        }
        for name in [&config.scores_output, &config.importance_output] {
            if !session.outputs.iter().any(|output| &output.name == name) {
                return Err(ClassifierError::Build(format!("Model has no output named '{}'", name)));
            }
        }
        Ok(())
    }

    /// Runs the graph, returning flat scores and the padded importance grid.
    fn run(&self, input: &ClassifierInput) -> Result<(Vec<f32>, Vec<Vec<f32>>), ClassifierError> {
        let (ids, mask) = build_batch(input, &self.vocabulary);
        let columns = ids.ncols();

        let ids_dyn = ids.into_dyn();
        let token_ids = ids_dyn.as_standard_layout();
        let mask_dyn = mask.into_dyn();
        let token_mask = mask_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.config.token_ids_input.as_str(),
            Tensor::from_array(&token_ids)
                .map_err(|e| inference_error("Failed to create ids tensor", e))?,
        );
        input_tensors.insert(
            self.config.token_mask_input.as_str(),
            Tensor::from_array(&token_mask)
                .map_err(|e| inference_error("Failed to create mask tensor", e))?,
        );

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| inference_error("Failed to run model", e))?;

        let scores: Vec<f32> = outputs
            .get(self.config.scores_output.as_str())
            .ok_or_else(|| missing_output(&self.config.scores_output))?
            .try_extract_tensor::<f32>()
            .map_err(|e| inference_error("Failed to extract scores", e))?
            .iter()
            .copied()
            .collect();

        let importance: Vec<f32> = outputs
            .get(self.config.importance_output.as_str())
            .ok_or_else(|| missing_output(&self.config.importance_output))?
            .try_extract_tensor::<f32>()
            .map_err(|e| inference_error("Failed to extract importance", e))?
            .iter()
            .copied()
            .collect();

        let grid = importance.chunks(columns).map(<[f32]>::to_vec).collect();
        Ok((scores, grid))
    }
}

impl ClassificationPort for HanOnnxClassifier {
    fn output_size(&self) -> usize {
        self.output_size
    }

    fn classify(&mut self, input: &ClassifierInput) -> Result<ScoreVector, ClassifierError> {
        self.last_importance = None;
        let (scores, grid) = self.run(input)?;
        if scores.len() != self.output_size {
            return Err(ClassifierError::Inference(format!(
                "Model returned {} scores, expected {}",
                scores.len(),
                self.output_size
            )));
        }
        self.last_importance = Some(trim_importance(input, grid)?);
        Ok(scores)
    }

    fn last_importance_scores(&self) -> Result<Vec<Vec<f32>>, ClassifierError> {
        self.last_importance
            .clone()
            .ok_or_else(|| {
                ClassifierError::Inference("No classification has run on this instance".into())
            })
    }
}

fn inference_error(context: &str, err: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::Inference(format!("{}: {}", context, err))
}

fn missing_output(name: &str) -> ClassifierError {
    ClassifierError::Inference(format!("Output '{}' missing", name))
}

fn declared_output_size(session: &Session, config: &HanModelConfig) -> Option<usize> {
    session
        .outputs
        .iter()
        .find(|output| output.name == config.scores_output)
        .and_then(|output| match &output.output_type {
            ValueType::Tensor { dimensions, .. } => dimensions.last().copied(),
            _ => None,
        })
        .filter(|&size| size > 0)
        .and_then(|size| usize::try_from(size).ok())
}

/// Lays the input out as `[sentences, max_tokens]` id and mask matrices.
///
/// An empty input still yields one fully masked slot so the model always
/// has something to score.
fn build_batch(input: &ClassifierInput, vocabulary: &Vocabulary) -> (Array2<i64>, Array2<i64>) {
    let rows = input.len().max(1);
    let columns = input.sentences().iter().map(Vec::len).max().unwrap_or(0).max(1);

    let mut ids = Array2::<i64>::zeros((rows, columns));
    let mut mask = Array2::<i64>::zeros((rows, columns));
    for (i, sentence) in input.sentences().iter().enumerate() {
        for (j, form) in sentence.iter().enumerate() {
            ids[[i, j]] = vocabulary.id(form);
            mask[[i, j]] = 1;
        }
    }
    (ids, mask)
}

/// Cuts the padded importance grid back to the real tokens of each sentence.
fn trim_importance(
    input: &ClassifierInput,
    grid: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, ClassifierError> {
    if grid.len() < input.len() {
        return Err(ClassifierError::Inference(format!(
            "Model returned importance for {} sentences, expected {}",
            grid.len(),
            input.len()
        )));
    }

    input
        .sentences()
        .iter()
        .zip(grid)
        .map(|(sentence, mut row)| {
            if row.len() < sentence.len() {
                return Err(ClassifierError::Inference(format!(
                    "Model returned {} importance scores for a sentence of {} tokens",
                    row.len(),
                    sentence.len()
                )));
            }
            row.truncate(sentence.len());
            Ok(row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocabulary() -> Vocabulary {
        let ids = [("[UNK]", 1), ("a", 2), ("rose", 3)]
            .into_iter()
            .map(|(form, id)| (form.to_string(), id))
            .collect();
        Vocabulary::new(ids, "[UNK]", true).unwrap()
    }

    fn input(sentences: &[&[&str]]) -> ClassifierInput {
        ClassifierInput::from(
            sentences
                .iter()
                .map(|s| s.iter().map(|f| f.to_string()).collect())
                .collect::<Vec<Vec<String>>>(),
        )
    }

    #[test]
    fn test_vocabulary_lookup() {
        let vocabulary = vocabulary();
        assert_eq!(vocabulary.id("rose"), 3);
        assert_eq!(vocabulary.id("Rose"), 3);
        assert_eq!(vocabulary.id("tulip"), 1);
        assert!(Vocabulary::new(HashMap::new(), "[UNK]", true).is_err());
    }

    #[test]
    fn test_build_batch_pads_and_masks() {
        let (ids, mask) = build_batch(&input(&[&["a", "rose"], &["rose"]]), &vocabulary());
        assert_eq!(ids.shape(), &[2, 2]);
        assert_eq!(ids.row(0).to_vec(), vec![2, 3]);
        assert_eq!(ids.row(1).to_vec(), vec![3, 0]);
        assert_eq!(mask.row(1).to_vec(), vec![1, 0]);
    }

    #[test]
    fn test_build_batch_empty_input() {
        let (ids, mask) = build_batch(&ClassifierInput::default(), &vocabulary());
        assert_eq!(ids.shape(), &[1, 1]);
        assert_eq!(mask[[0, 0]], 0);
    }

    #[test]
    fn test_trim_importance() -> Result<(), ClassifierError> {
        let input = input(&[&["a", "rose"], &["rose"]]);
        let trimmed = trim_importance(&input, vec![vec![0.4, 0.6], vec![1.0, 0.0]])?;
        assert_eq!(trimmed, vec![vec![0.4, 0.6], vec![1.0]]);

        // The padding row of an empty input is dropped
        let trimmed = trim_importance(&ClassifierInput::default(), vec![vec![0.0]])?;
        assert!(trimmed.is_empty());

        assert!(trim_importance(&input, vec![vec![0.4, 0.6]]).is_err());
        Ok(())
    }
}
