//! The text-encoder facade: prepare once, then encode column data.

use candle_core::{DType, Device};
use tokenizers::Tokenizer;

use super::builder::EncoderConfig;
use super::pooling;
use super::tokenizer::{resolve_tokenizer, tokenize};
use crate::error::{EncoderError, Result};
use crate::loaders::{CheckpointLoader, ModelFiles};
use crate::models::{EmbeddingBackbone, ModelBinding, ModelFamily};

/// Operating mode of a prepared encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelMode {
    /// The backbone is a pure feature extractor.
    EmbeddingsGenerator,
    /// A classification head was fine-tuned on the target column. Not
    /// reachable yet; `prepare` rejects the fine-tuning path.
    FineTunedClassifier,
}

struct PreparedState {
    tokenizer: Tokenizer,
    backbone: Box<dyn EmbeddingBackbone>,
    mode: ModelMode,
    /// Cached checkpoint files, kept so [`TextEncoder::to`] can re-map the
    /// weights onto another device.
    files: ModelFiles,
}

fn dtype_for(device: &Device) -> DType {
    // Reduced precision where the device supports it.
    if device.is_cuda() {
        DType::F16
    } else {
        DType::F32
    }
}

/// Encodes a text column into fixed-size sentence vectors with a pretrained
/// language model.
///
/// The encoder is a two-state machine: construction via
/// [`TextEncoderBuilder`](super::TextEncoderBuilder) yields an unprepared
/// instance; [`prepare`](Self::prepare) loads the tokenizer and backbone
/// exactly once; [`encode`](Self::encode) is only valid afterwards.
///
/// # Examples
///
/// ```rust,no_run
/// use text_encoders::TextEncoderBuilder;
///
/// # fn main() -> text_encoders::Result<()> {
/// let mut encoder = TextEncoderBuilder::from_model_name("distilbert").build()?;
/// encoder.prepare()?;
///
/// let vectors = encoder.encode(&[Some("hello world"), None])?;
/// assert_eq!(vectors.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct TextEncoder {
    config: EncoderConfig,
    binding: &'static ModelBinding,
    custom_tokenizer: Option<Tokenizer>,
    device: Device,
    state: Option<PreparedState>,
}

impl TextEncoder {
    pub(crate) fn new(
        config: EncoderConfig,
        custom_tokenizer: Option<Tokenizer>,
        device: Device,
    ) -> Self {
        let binding = config.model_family.binding();
        Self {
            config,
            binding,
            custom_tokenizer,
            device,
            state: None,
        }
    }

    /// Loads the tokenizer and the pretrained backbone, transitioning the
    /// encoder to its prepared state.
    ///
    /// # Errors
    ///
    /// [`EncoderError::AlreadyPrepared`] on a second call,
    /// [`EncoderError::Unimplemented`] when the encoder was configured with
    /// `custom_train`, and [`EncoderError::Download`] when checkpoint
    /// artifacts cannot be fetched.
    pub fn prepare(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Err(EncoderError::AlreadyPrepared);
        }

        let tokenizer = resolve_tokenizer(self.custom_tokenizer.clone(), self.binding)?;

        if self.config.custom_train {
            return Err(EncoderError::Unimplemented(
                "fine-tuning on the target column".to_string(),
            ));
        }

        tracing::info!(
            checkpoint = self.binding.checkpoint,
            "loading embeddings generator"
        );
        let files = CheckpointLoader::new(self.binding.checkpoint).load()?;
        let backbone = (self.binding.build_backbone)(&files, &self.device, dtype_for(&self.device))?;

        self.state = Some(PreparedState {
            tokenizer,
            backbone,
            mode: ModelMode::EmbeddingsGenerator,
            files,
        });
        Ok(())
    }

    /// Encodes a column of nullable text values into one vector per value.
    ///
    /// Inputs are processed strictly in order, one forward pass each; row
    /// `i` of the result corresponds to input `i`. Missing values encode
    /// exactly like the empty string.
    ///
    /// # Errors
    ///
    /// [`EncoderError::NotPrepared`] before [`prepare`](Self::prepare).
    pub fn encode(&self, column_data: &[Option<&str>]) -> Result<Vec<Vec<f32>>> {
        let state = self.state.as_ref().ok_or(EncoderError::NotPrepared)?;

        match state.mode {
            ModelMode::EmbeddingsGenerator => {
                let mut encoded = Vec::with_capacity(column_data.len());
                for text in column_data {
                    let ids = tokenize(&state.tokenizer, *text)?;
                    let hidden = state.backbone.forward(&ids)?;
                    encoded.push(pooling::pool(&hidden, self.config.pooling)?);
                }
                tracing::debug!(rows = encoded.len(), "encoded text column");
                Ok(encoded)
            }
            ModelMode::FineTunedClassifier => Err(EncoderError::Unimplemented(
                "encoding with a fine-tuned classifier".to_string(),
            )),
        }
    }

    /// Decoding sentence vectors back into text is not supported.
    pub fn decode(&self, _encoded: &[Vec<f32>]) -> Result<Vec<String>> {
        Err(EncoderError::Unimplemented(
            "decoding embeddings back to text".to_string(),
        ))
    }

    /// Moves the backbone (and a fine-tuning head, once one exists) to
    /// another device. Idempotent; returns the encoder for chaining.
    pub fn to(&mut self, device: Device) -> Result<&mut Self> {
        if device.location() == self.device.location() {
            return Ok(self);
        }
        if let Some(state) = self.state.as_mut() {
            // candle weights cannot be moved in place; re-map the cached
            // checkpoint files onto the target device.
            state.backbone =
                (self.binding.build_backbone)(&state.files, &device, dtype_for(&device))?;
        }
        self.device = device;
        Ok(self)
    }

    /// Whether this column is the prediction target.
    pub fn is_target(&self) -> bool {
        self.config.is_target
    }

    /// Whether [`prepare`](Self::prepare) has run.
    pub fn is_prepared(&self) -> bool {
        self.state.is_some()
    }

    /// The model family the encoder was built for.
    pub fn family(&self) -> ModelFamily {
        self.config.model_family
    }

    /// The resolved registry entry (checkpoint and family).
    pub fn binding(&self) -> &ModelBinding {
        self.binding
    }

    /// Device the encoder runs on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The configuration the encoder was built with.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Width of the sentence vectors. Only known once prepared.
    pub fn embedding_dim(&self) -> Result<usize> {
        let state = self.state.as_ref().ok_or(EncoderError::NotPrepared)?;
        Ok(state.backbone.hidden_size())
    }
}

#[cfg(test)]
mod tests {
    use super::super::builder::TextEncoderBuilder;
    use super::super::tokenizer::test_word_tokenizer;
    use crate::error::EncoderError;
    use crate::models::ModelFamily;

    #[test]
    fn encode_before_prepare_fails() {
        let encoder = TextEncoderBuilder::new(ModelFamily::Gpt2)
            .cpu()
            .build()
            .unwrap();
        let err = encoder.encode(&[Some("hello")]).unwrap_err();
        assert!(matches!(err, EncoderError::NotPrepared));
    }

    #[test]
    fn decode_fails_while_unprepared() {
        let encoder = TextEncoderBuilder::new(ModelFamily::DistilBert)
            .cpu()
            .build()
            .unwrap();
        let err = encoder.decode(&[]).unwrap_err();
        assert!(matches!(err, EncoderError::Unimplemented(_)));
    }

    #[test]
    fn custom_train_is_rejected_at_prepare() {
        // A pre-supplied tokenizer keeps this offline: the fine-tuning gate
        // fires before any checkpoint is fetched.
        let mut encoder = TextEncoderBuilder::new(ModelFamily::Gpt2)
            .cpu()
            .custom_train(true)
            .custom_tokenizer(test_word_tokenizer())
            .build()
            .unwrap();
        let err = encoder.prepare().unwrap_err();
        assert!(matches!(err, EncoderError::Unimplemented(_)));
        assert!(!encoder.is_prepared());
    }

    #[test]
    fn embedding_dim_requires_prepare() {
        let encoder = TextEncoderBuilder::new(ModelFamily::Albert)
            .cpu()
            .build()
            .unwrap();
        assert!(matches!(
            encoder.embedding_dim().unwrap_err(),
            EncoderError::NotPrepared
        ));
    }

    #[test]
    fn builder_state_is_reflected_in_accessors() {
        let encoder = TextEncoderBuilder::new(ModelFamily::Bart)
            .cpu()
            .is_target(true)
            .build()
            .unwrap();
        assert!(encoder.is_target());
        assert!(!encoder.is_prepared());
        assert_eq!(encoder.family(), ModelFamily::Bart);
        assert_eq!(encoder.binding().checkpoint, "facebook/bart-large");
    }
}
