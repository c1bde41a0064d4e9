use glossclass::{HanModelConfig, Sentence, TokenizationPort, Vocabulary, WordTokenizer};
use tokenizers::Tokenizer;

const TOKENIZER_JSON: &str = r#"{
  "version": "1.0",
  "truncation": null,
  "padding": null,
  "added_tokens": [],
  "normalizer": null,
  "pre_tokenizer": { "type": "Whitespace" },
  "post_processor": null,
  "decoder": null,
  "model": {
    "type": "WordLevel",
    "vocab": { "[UNK]": 0, "a": 1, "red": 2, "rose": 3, "cat": 4, ".": 5, "!": 6 },
    "unk_token": "[UNK]"
  }
}"#;

fn word_tokenizer() -> Result<WordTokenizer, Box<dyn std::error::Error + Send + Sync>> {
    let tokenizer = Tokenizer::from_bytes(TOKENIZER_JSON.as_bytes())?;
    Ok(WordTokenizer::new(tokenizer))
}

fn forms(sentence: &Sentence) -> Vec<&str> {
    sentence.tokens.iter().map(|t| t.form.as_str()).collect()
}

#[test]
fn test_empty_text_has_no_sentences() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let tokenizer = word_tokenizer()?;
    assert!(tokenizer.tokenize("")?.is_empty());
    assert!(tokenizer.tokenize(" \n\t ")?.is_empty());
    Ok(())
}

#[test]
fn test_sentences_and_whitespace() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let tokenizer = word_tokenizer()?;
    let sentences = tokenizer.tokenize("a red rose. A cat!")?;

    assert_eq!(sentences.len(), 2);
    assert_eq!(forms(&sentences[0]), vec!["a", " ", "red", " ", "rose", ".", " "]);
    assert_eq!(forms(&sentences[1]), vec!["A", " ", "cat", "!"]);
    assert!(sentences[0].tokens[1].is_whitespace);
    assert!(!sentences[0].tokens[5].is_whitespace);
    Ok(())
}

#[test]
fn test_unknown_words_keep_their_surface_form() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let tokenizer = word_tokenizer()?;
    let sentences = tokenizer.tokenize("a zebra")?;
    assert_eq!(forms(&sentences[0]), vec!["a", " ", "zebra"]);
    Ok(())
}

#[test]
fn test_tokenization_is_deterministic() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let tokenizer = word_tokenizer()?;
    let text = "a cat.  a rose!";
    assert_eq!(tokenizer.tokenize(text)?, tokenizer.tokenize(text)?);
    Ok(())
}

#[test]
fn test_vocabulary_from_tokenizer() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let tokenizer = word_tokenizer()?;
    let vocabulary = Vocabulary::from_tokenizer(tokenizer.inner(), &HanModelConfig::default())?;

    assert_eq!(vocabulary.len(), 7);
    assert_eq!(vocabulary.id("rose"), 3);
    assert_eq!(vocabulary.id("Rose"), 3);
    assert_eq!(vocabulary.id("zebra"), 0);

    let strict = HanModelConfig {
        lowercase_fallback: false,
        ..HanModelConfig::default()
    };
    let vocabulary = Vocabulary::from_tokenizer(tokenizer.inner(), &strict)?;
    assert_eq!(vocabulary.id("Rose"), 0);

    let missing_unknown = HanModelConfig {
        unknown_token: "<unk>".to_string(),
        ..HanModelConfig::default()
    };
    assert!(Vocabulary::from_tokenizer(tokenizer.inner(), &missing_unknown).is_err());
    Ok(())
}
