#![allow(dead_code)]

use glossclass::{
    ClassificationPort, ClassifierError, ClassifierInput, GlossClassifier, ScoreVector, Sentence,
    Token, TokenizationPort, TokenizedInput,
};

pub const LABELS: [&str; 3] = ["ANIMAL", "PLANT", "OBJECT"];

// Initialize test logger
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// Splits on spaces and ends a sentence after every `.`.
pub struct SimpleTokenizer;

impl TokenizationPort for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenizedInput, ClassifierError> {
        let mut sentences = Vec::new();
        let mut current = Vec::new();
        for (i, piece) in text.split(' ').enumerate() {
            if i > 0 {
                current.push(Token::space(" "));
            }
            if piece.is_empty() {
                continue;
            }
            match piece.strip_suffix('.') {
                Some(word) => {
                    if !word.is_empty() {
                        current.push(Token::word(word));
                    }
                    current.push(Token::word("."));
                    sentences.push(Sentence::new(std::mem::take(&mut current)));
                }
                None => current.push(Token::word(piece)),
            }
        }
        if current.iter().any(|token| !token.is_whitespace) {
            sentences.push(Sentence::new(current));
        }
        Ok(sentences)
    }
}

/// Votes for a class per keyword; importance is 1.0 on keywords, 0.1 elsewhere.
///
/// Without any keyword all classes score the same.
#[derive(Default)]
pub struct KeywordClassifier {
    last: Option<Vec<Vec<f32>>>,
}

fn keyword_class(token: &str) -> Option<usize> {
    match token {
        "cat" | "dog" | "bird" => Some(0),
        "rose" | "tree" | "fern" => Some(1),
        "chair" | "lamp" | "cup" => Some(2),
        _ => None,
    }
}

impl ClassificationPort for KeywordClassifier {
    fn output_size(&self) -> usize {
        LABELS.len()
    }

    fn classify(&mut self, input: &ClassifierInput) -> Result<ScoreVector, ClassifierError> {
        let mut votes = vec![1.0_f32; LABELS.len()];
        let mut importance = Vec::with_capacity(input.len());
        for sentence in input.sentences() {
            let mut row = Vec::with_capacity(sentence.len());
            for token in sentence {
                match keyword_class(token) {
                    Some(class) => {
                        votes[class] += 1.0;
                        row.push(1.0);
                    }
                    None => row.push(0.1),
                }
            }
            importance.push(row);
        }
        self.last = Some(importance);

        let total: f32 = votes.iter().sum();
        Ok(votes.into_iter().map(|v| v / total).collect())
    }

    fn last_importance_scores(&self) -> Result<Vec<Vec<f32>>, ClassifierError> {
        self.last
            .clone()
            .ok_or_else(|| ClassifierError::Inference("No classification has run".into()))
    }
}

/// Returns the same scores for every input and flat importance.
pub struct FixedClassifier {
    pub scores: Vec<f32>,
    last: Option<Vec<Vec<f32>>>,
}

impl FixedClassifier {
    pub fn new(scores: Vec<f32>) -> Self {
        Self { scores, last: None }
    }
}

impl ClassificationPort for FixedClassifier {
    fn output_size(&self) -> usize {
        self.scores.len()
    }

    fn classify(&mut self, input: &ClassifierInput) -> Result<ScoreVector, ClassifierError> {
        self.last = Some(input.sentences().iter().map(|s| vec![0.5; s.len()]).collect());
        Ok(self.scores.clone())
    }

    fn last_importance_scores(&self) -> Result<Vec<Vec<f32>>, ClassifierError> {
        self.last
            .clone()
            .ok_or_else(|| ClassifierError::Inference("No classification has run".into()))
    }
}

/// Sleeps before answering, like a model under load.
pub struct SlowClassifier {
    pub delay: std::time::Duration,
}

impl ClassificationPort for SlowClassifier {
    fn output_size(&self) -> usize {
        LABELS.len()
    }

    fn classify(&mut self, _input: &ClassifierInput) -> Result<ScoreVector, ClassifierError> {
        std::thread::sleep(self.delay);
        Ok(vec![0.2, 0.5, 0.3])
    }

    fn last_importance_scores(&self) -> Result<Vec<Vec<f32>>, ClassifierError> {
        Ok(vec![])
    }
}

/// Fails every call the way a broken model would.
pub struct FailingClassifier;

impl ClassificationPort for FailingClassifier {
    fn output_size(&self) -> usize {
        LABELS.len()
    }

    fn classify(&mut self, _input: &ClassifierInput) -> Result<ScoreVector, ClassifierError> {
        Err(ClassifierError::Inference("tensor 'token_ids' has invalid shape [0, 0]".into()))
    }

    fn last_importance_scores(&self) -> Result<Vec<Vec<f32>>, ClassifierError> {
        Err(ClassifierError::Inference("No classification has run".into()))
    }
}

pub fn keyword_service(instances: usize) -> Result<GlossClassifier, ClassifierError> {
    let mut builder = GlossClassifier::builder()
        .with_tokenizer(SimpleTokenizer)
        .with_labels(LABELS.to_vec())?;
    for _ in 0..instances {
        builder = builder.with_classifier(KeywordClassifier::default());
    }
    builder.build()
}

pub fn fixed_service(scores: Vec<f32>) -> Result<GlossClassifier, ClassifierError> {
    GlossClassifier::builder()
        .with_tokenizer(SimpleTokenizer)
        .with_classifier(FixedClassifier::new(scores))
        .with_labels(LABELS.to_vec())?
        .build()
}
