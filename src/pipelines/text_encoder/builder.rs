//! Construction-time configuration for [`TextEncoder`].

use tokenizers::Tokenizer;

use super::pipeline::TextEncoder;
use super::pooling::PoolingStrategy;
use crate::error::Result;
use crate::models::ModelFamily;
use crate::pipelines::utils::DeviceRequest;

/// Encoder configuration, immutable after [`TextEncoderBuilder::build`].
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub model_family: ModelFamily,
    /// Marks this column as the prediction target.
    pub is_target: bool,
    /// Convergence threshold for the (external) training loop; unused at
    /// inference time.
    pub desired_error: f64,
    /// Training budget in seconds; recorded, not enforced here.
    pub max_training_time: u64,
    /// Whether to fine-tune on the target column. The true path is not
    /// implemented.
    pub custom_train: bool,
    pub pooling: PoolingStrategy,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            model_family: ModelFamily::Gpt2,
            is_target: false,
            desired_error: 0.01,
            max_training_time: 7200,
            custom_train: false,
            pooling: PoolingStrategy::Mean,
        }
    }
}

/// Builder for [`TextEncoder`] instances.
///
/// # Examples
///
/// ```rust,no_run
/// use text_encoders::{ModelFamily, TextEncoderBuilder};
///
/// # fn main() -> text_encoders::Result<()> {
/// let encoder = TextEncoderBuilder::new(ModelFamily::DistilBert)
///     .cpu()
///     .build()?;
/// assert!(!encoder.is_prepared());
/// # Ok(())
/// # }
/// ```
pub struct TextEncoderBuilder {
    pub(crate) config: EncoderConfig,
    custom_tokenizer: Option<Tokenizer>,
    device_request: DeviceRequest,
}

impl TextEncoderBuilder {
    /// Creates a builder for the given model family.
    pub fn new(family: ModelFamily) -> Self {
        Self {
            config: EncoderConfig {
                model_family: family,
                ..Default::default()
            },
            custom_tokenizer: None,
            device_request: DeviceRequest::Default,
        }
    }

    /// Creates a builder from a model-name key.
    ///
    /// Unrecognized names select the default GPT-2 family.
    pub fn from_model_name(name: &str) -> Self {
        Self::new(ModelFamily::from_name(name))
    }

    /// Marks the encoded column as the prediction target.
    pub fn is_target(mut self, is_target: bool) -> Self {
        self.config.is_target = is_target;
        self
    }

    /// Convergence threshold handed to an external training loop.
    pub fn desired_error(mut self, desired_error: f64) -> Self {
        self.config.desired_error = desired_error;
        self
    }

    /// Training time budget in seconds, recorded for an external training
    /// loop.
    pub fn max_training_time(mut self, seconds: u64) -> Self {
        self.config.max_training_time = seconds;
        self
    }

    /// Requests fine-tuning on the target column. `prepare` currently
    /// rejects this with an unimplemented-capability error.
    pub fn custom_train(mut self, custom_train: bool) -> Self {
        self.config.custom_train = custom_train;
        self
    }

    /// Supplies a pre-built tokenizer, used as-is instead of the
    /// checkpoint's own.
    pub fn custom_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.custom_tokenizer = Some(tokenizer);
        self
    }

    /// Selects the sentence-embedding strategy by its configuration key
    /// (`"mean_norm"`, `"last_token"`).
    pub fn sent_embedder(mut self, name: &str) -> Self {
        self.config.pooling = PoolingStrategy::from_name(name);
        self
    }

    /// Selects the pooling strategy directly.
    pub fn pooling(mut self, strategy: PoolingStrategy) -> Self {
        self.config.pooling = strategy;
        self
    }

    /// Force the encoder to run on CPU.
    pub fn cpu(mut self) -> Self {
        self.device_request = DeviceRequest::Cpu;
        self
    }

    /// Use a specific CUDA GPU.
    pub fn cuda(mut self, index: usize) -> Self {
        self.device_request = DeviceRequest::Cuda(index);
        self
    }

    /// Resolves the compute device and returns an unprepared encoder.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly requested CUDA device cannot be
    /// initialized.
    pub fn build(self) -> Result<TextEncoder> {
        let device = self.device_request.resolve()?;
        tracing::debug!(device = ?device, "resolved compute device");
        Ok(TextEncoder::new(self.config, self.custom_tokenizer, device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_gpt2_family() {
        let config = EncoderConfig::default();
        assert_eq!(config.model_family, ModelFamily::Gpt2);
        assert!(!config.is_target);
        assert!((config.desired_error - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.max_training_time, 7200);
        assert!(!config.custom_train);
        assert_eq!(config.pooling, PoolingStrategy::Mean);
    }

    #[test]
    fn unknown_model_names_build_the_default_family() {
        let encoder = TextEncoderBuilder::from_model_name("word2vec")
            .cpu()
            .build()
            .unwrap();
        assert_eq!(encoder.family(), ModelFamily::Gpt2);
        assert_eq!(encoder.binding().checkpoint, "gpt2");
    }

    #[test]
    fn sent_embedder_keys_select_pooling() {
        let mean = TextEncoderBuilder::new(ModelFamily::Gpt2).sent_embedder("mean_norm");
        let last = TextEncoderBuilder::new(ModelFamily::Gpt2).sent_embedder("last_token");
        assert_eq!(mean.config.pooling, PoolingStrategy::Mean);
        assert_eq!(last.config.pooling, PoolingStrategy::LastToken);
    }
}
