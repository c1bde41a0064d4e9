//! Concrete tokenizer and classifier implementations behind the service ports.

mod han_onnx;
mod word_tokenizer;

pub use han_onnx::{HanModelConfig, HanOnnxClassifier, Vocabulary};
pub use word_tokenizer::WordTokenizer;
