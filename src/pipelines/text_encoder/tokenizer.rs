//! Tokenizer resolution and text-to-ids conversion.

use tokenizers::{Tokenizer, TruncationParams, TruncationStrategy};

use crate::error::{EncoderError, Result};
use crate::loaders::TokenizerLoader;
use crate::models::ModelBinding;

/// Returns the tokenizer the encoder will use.
///
/// A tokenizer supplied at construction is used as-is; composing a custom
/// tokenizer with the checkpoint's own is future work, not implemented.
/// Otherwise the checkpoint's tokenizer is fetched and configured to
/// truncate at the model's position limit.
pub(crate) fn resolve_tokenizer(
    custom: Option<Tokenizer>,
    binding: &ModelBinding,
) -> Result<Tokenizer> {
    let Some(tokenizer) = custom else {
        let mut tokenizer = TokenizerLoader::new(binding.checkpoint).load()?;
        let truncation = TruncationParams {
            max_length: binding.max_positions,
            strategy: TruncationStrategy::LongestFirst,
            ..Default::default()
        };
        tokenizer.with_truncation(Some(truncation)).map_err(|e| {
            EncoderError::Tokenization(format!("failed to configure truncation: {e}"))
        })?;
        return Ok(tokenizer);
    };
    Ok(tokenizer)
}

/// Converts one column value into token ids.
///
/// Missing values are treated as the empty string, never propagated as
/// nulls. A checkpoint whose tokenizer yields no ids for the degenerate
/// input (GPT-2 on `""`) gets a single pad/end-of-text token instead, so the
/// backbone always has a sequence to run.
pub(crate) fn tokenize(tokenizer: &Tokenizer, text: Option<&str>) -> Result<Vec<u32>> {
    let text = text.unwrap_or("");
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| EncoderError::Tokenization(format!("tokenization failed: {e}")))?;
    let mut ids = encoding.get_ids().to_vec();
    if ids.is_empty() {
        let fallback = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .unwrap_or(0);
        ids.push(fallback);
    }
    Ok(ids)
}

/// Word-level tokenizer for offline tests.
#[cfg(test)]
pub(crate) fn test_word_tokenizer() -> Tokenizer {
    use ahash::AHashMap;

    use tokenizers::models::wordlevel::WordLevel;
    use tokenizers::pre_tokenizers::whitespace::Whitespace;

    let vocab: AHashMap<String, u32> = [("[UNK]", 0u32), ("hello", 1), ("world", 2)]
        .into_iter()
        .map(|(token, id)| (token.to_string(), id))
        .collect();
    let model = WordLevel::builder()
        .vocab(vocab)
        .unk_token("[UNK]".to_string())
        .build()
        .unwrap();
    let mut tokenizer = Tokenizer::new(model);
    tokenizer.with_pre_tokenizer(Some(Whitespace {}));
    tokenizer
}

#[cfg(test)]
mod tests {
    use super::{test_word_tokenizer, tokenize};

    #[test]
    fn missing_text_is_treated_as_empty() {
        let tokenizer = test_word_tokenizer();
        let from_none = tokenize(&tokenizer, None).unwrap();
        let from_empty = tokenize(&tokenizer, Some("")).unwrap();
        assert_eq!(from_none, from_empty);
    }

    #[test]
    fn degenerate_input_still_yields_a_sequence() {
        let tokenizer = test_word_tokenizer();
        let ids = tokenize(&tokenizer, Some("")).unwrap();
        assert!(!ids.is_empty());
    }

    #[test]
    fn known_words_map_to_their_ids() {
        let tokenizer = test_word_tokenizer();
        let ids = tokenize(&tokenizer, Some("hello world")).unwrap();
        assert_eq!(ids, vec![1, 2]);
    }
}
