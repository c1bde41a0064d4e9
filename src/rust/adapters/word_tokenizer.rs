use std::path::Path;

use log::{error, info};
use tokenizers::Tokenizer;

use crate::classifier::{ClassifierError, Sentence, Token, TokenizationPort, TokenizedInput};

/// Sentence and word segmentation on top of a HuggingFace tokenizer.
///
/// The tokenizer decides where words are; subword pieces of one word are
/// merged back into the original surface form using their offsets. Text the
/// tokenizer skips becomes whitespace tokens (or word tokens if it is not
/// whitespace). A sentence ends after a token made only of `.`, `!` or `?`.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    tokenizer: Tokenizer,
}

impl WordTokenizer {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Loads a tokenizer from a `tokenizer.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            error!("Failed to load tokenizer: {}", e);
            ClassifierError::Build(format!("Failed to load tokenizer from {:?}: {}", path, e))
        })?;
        info!("Tokenizer loaded from {:?}", path);
        Ok(Self::new(tokenizer))
    }

    pub fn inner(&self) -> &Tokenizer {
        &self.tokenizer
    }
}

impl TokenizationPort for WordTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenizedInput, ClassifierError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| ClassifierError::Tokenizer(e.to_string()))?;

        let spans = word_spans(encoding.get_offsets(), encoding.get_word_ids());
        Ok(segment(text, &spans))
    }
}

/// Byte ranges of whole words, merging pieces that share a word id.
fn word_spans(offsets: &[(usize, usize)], word_ids: &[Option<u32>]) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = Vec::with_capacity(offsets.len());
    let mut last_word: Option<u32> = None;

    for (i, &(start, end)) in offsets.iter().enumerate() {
        if start >= end {
            continue;
        }
        let word = word_ids.get(i).copied().flatten();
        match spans.last_mut() {
            Some(span) if word.is_some() && word == last_word => {
                span.0 = span.0.min(start);
                span.1 = span.1.max(end);
            }
            _ => spans.push((start, end)),
        }
        last_word = word;
    }
    spans
}

/// Builds sentences of word and whitespace tokens covering all of `text`.
fn segment(text: &str, spans: &[(usize, usize)]) -> TokenizedInput {
    let mut builder = SentenceBuilder::default();
    let mut cursor = 0;

    for &(start, end) in spans {
        let start = start.max(cursor);
        let (Some(gap), Some(form)) = (text.get(cursor..start), text.get(start..end)) else {
            continue;
        };
        builder.push_gap(gap);
        if !form.is_empty() {
            builder.push(Token::word(form));
        }
        cursor = end;
    }
    if let Some(rest) = text.get(cursor..) {
        builder.push_gap(rest);
    }
    builder.finish()
}

#[derive(Default)]
struct SentenceBuilder {
    sentences: Vec<Sentence>,
    current: Vec<Token>,
}

impl SentenceBuilder {
    /// Splits uncovered text into alternating whitespace and non-whitespace runs.
    fn push_gap(&mut self, gap: &str) {
        let mut run_start = 0;
        let mut run_is_space = None;
        for (i, c) in gap.char_indices() {
            let is_space = c.is_whitespace();
            if run_is_space.is_some_and(|previous| previous != is_space) {
                self.push_run(&gap[run_start..i], !is_space);
                run_start = i;
            }
            run_is_space = Some(is_space);
        }
        if let Some(is_space) = run_is_space {
            self.push_run(&gap[run_start..], is_space);
        }
    }

    fn push_run(&mut self, run: &str, is_space: bool) {
        if is_space {
            self.push(Token::space(run));
        } else {
            self.push(Token::word(run));
        }
    }

    fn push(&mut self, token: Token) {
        // Whitespace right after a sentence end stays with that sentence
        if token.is_whitespace && self.current.is_empty() {
            if let Some(previous) = self.sentences.last_mut() {
                previous.tokens.push(token);
                return;
            }
        }

        let ends_sentence = !token.is_whitespace && is_terminator(&token.form);
        self.current.push(token);
        if ends_sentence {
            self.sentences.push(Sentence::new(std::mem::take(&mut self.current)));
        }
    }

    fn finish(mut self) -> TokenizedInput {
        if self.current.iter().any(|token| !token.is_whitespace) {
            self.sentences.push(Sentence::new(self.current));
        } else if let Some(previous) = self.sentences.last_mut() {
            previous.tokens.append(&mut self.current);
        }
        self.sentences
    }
}

fn is_terminator(form: &str) -> bool {
    !form.is_empty() && form.chars().all(|c| matches!(c, '.' | '!' | '?'))
}
