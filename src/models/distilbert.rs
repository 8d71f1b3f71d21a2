//! DistilBERT backbone, wrapping `candle_transformers::models::distilbert`.

use candle_core::{DType, Device, Tensor};
use candle_transformers::models::distilbert::{Config, DistilBertModel};
use serde::Deserialize;

use super::EmbeddingBackbone;
use crate::error::Result;
use crate::loaders::ModelFiles;

/// The one config field the wrapper needs beyond what the candle body
/// parses for itself.
#[derive(Debug, Deserialize)]
struct Dims {
    dim: usize,
}

pub struct DistilBertBackbone {
    model: DistilBertModel,
    hidden_size: usize,
    device: Device,
}

impl DistilBertBackbone {
    pub(crate) fn boxed(
        files: &ModelFiles,
        device: &Device,
        dtype: DType,
    ) -> Result<Box<dyn EmbeddingBackbone>> {
        let config_str = std::fs::read_to_string(&files.config)?;
        let config: Config = serde_json::from_str(&config_str)?;
        let dims: Dims = serde_json::from_str(&config_str)?;

        let vb = super::load_var_builder(files, device, dtype)?;
        // Base checkpoints store the body under the `distilbert.` prefix.
        let model = DistilBertModel::load(vb.pp("distilbert"), &config)?;

        Ok(Box::new(Self {
            model,
            hidden_size: dims.dim,
            device: device.clone(),
        }))
    }
}

impl EmbeddingBackbone for DistilBertBackbone {
    fn forward(&self, token_ids: &[u32]) -> Result<Tensor> {
        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        // Single unpadded sequence: nothing to mask. The candle body treats
        // nonzero mask entries as masked-out positions.
        let seq_len = token_ids.len();
        let mask = Tensor::zeros((seq_len, seq_len), DType::U8, &self.device)?;
        let hidden = self.model.forward(&input_ids, &mask)?;
        Ok(hidden.squeeze(0)?)
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
