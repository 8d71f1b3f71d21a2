//! ALBERT model body (embeddings generator, no task head).
//!
//! ALBERT factorizes the token embedding (`embedding_size` < `hidden_size`)
//! and shares one layer group across all transformer depths; both properties
//! are reflected in the `albert-base-v2` checkpoint layout this loader
//! follows.

use candle_core::{DType, Device, Tensor};
use candle_nn::{
    embedding, layer_norm, linear, Activation, Embedding, LayerNorm, Linear, Module, VarBuilder,
};
use serde::Deserialize;

use super::EmbeddingBackbone;
use crate::error::Result;
use crate::loaders::ModelFiles;

fn default_layer_norm_eps() -> f64 {
    1e-12
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub vocab_size: usize,
    pub embedding_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_hidden_groups: usize,
    pub inner_group_num: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub max_position_embeddings: usize,
    pub type_vocab_size: usize,
    #[serde(default)]
    pub hidden_act: Activation,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
}

struct Embeddings {
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    token_type_embeddings: Embedding,
    layer_norm: LayerNorm,
}

impl Embeddings {
    fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            word_embeddings: embedding(
                config.vocab_size,
                config.embedding_size,
                vb.pp("word_embeddings"),
            )?,
            position_embeddings: embedding(
                config.max_position_embeddings,
                config.embedding_size,
                vb.pp("position_embeddings"),
            )?,
            token_type_embeddings: embedding(
                config.type_vocab_size,
                config.embedding_size,
                vb.pp("token_type_embeddings"),
            )?,
            layer_norm: layer_norm(
                config.embedding_size,
                config.layer_norm_eps,
                vb.pp("LayerNorm"),
            )?,
        })
    }

    fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let (_b, t) = input_ids.dims2()?;
        let positions = Tensor::arange(0u32, t as u32, input_ids.device())?.unsqueeze(0)?;
        // Single-segment input: token type ids are all zero.
        let token_types = input_ids.zeros_like()?;
        let xs = self
            .word_embeddings
            .forward(input_ids)?
            .broadcast_add(&self.position_embeddings.forward(&positions)?)?;
        let xs = (xs + self.token_type_embeddings.forward(&token_types)?)?;
        Ok(self.layer_norm.forward(&xs)?)
    }
}

struct Attention {
    query: Linear,
    key: Linear,
    value: Linear,
    dense: Linear,
    layer_norm: LayerNorm,
    num_heads: usize,
}

impl Attention {
    fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        let h = config.hidden_size;
        Ok(Self {
            query: linear(h, h, vb.pp("query"))?,
            key: linear(h, h, vb.pp("key"))?,
            value: linear(h, h, vb.pp("value"))?,
            dense: linear(h, h, vb.pp("dense"))?,
            layer_norm: layer_norm(h, config.layer_norm_eps, vb.pp("LayerNorm"))?,
            num_heads: config.num_attention_heads,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (b, t, h) = xs.dims3()?;
        let head_dim = h / self.num_heads;
        let shape = (b, t, self.num_heads, head_dim);
        let q = self.query.forward(xs)?.reshape(shape)?.transpose(1, 2)?.contiguous()?;
        let k = self.key.forward(xs)?.reshape(shape)?.transpose(1, 2)?.contiguous()?;
        let v = self.value.forward(xs)?.reshape(shape)?.transpose(1, 2)?.contiguous()?;

        let scale = 1f64 / (head_dim as f64).sqrt();
        let scores = (q.matmul(&k.transpose(2, 3)?)? * scale)?;
        let weights = candle_nn::ops::softmax_last_dim(&scores)?;

        let context = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, t, h))?;
        let context = self.dense.forward(&context)?;
        Ok(self.layer_norm.forward(&(xs + context)?)?)
    }
}

struct AlbertLayer {
    attention: Attention,
    ffn: Linear,
    ffn_output: Linear,
    full_layer_layer_norm: LayerNorm,
    activation: Activation,
}

impl AlbertLayer {
    fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            attention: Attention::load(config, vb.pp("attention"))?,
            ffn: linear(config.hidden_size, config.intermediate_size, vb.pp("ffn"))?,
            ffn_output: linear(
                config.intermediate_size,
                config.hidden_size,
                vb.pp("ffn_output"),
            )?,
            full_layer_layer_norm: layer_norm(
                config.hidden_size,
                config.layer_norm_eps,
                vb.pp("full_layer_layer_norm"),
            )?,
            activation: config.hidden_act,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let attn = self.attention.forward(xs)?;
        let ffn = self.ffn.forward(&attn)?.apply(&self.activation)?;
        let ffn = self.ffn_output.forward(&ffn)?;
        Ok(self.full_layer_layer_norm.forward(&(&attn + ffn)?)?)
    }
}

struct LayerGroup {
    layers: Vec<AlbertLayer>,
}

impl LayerGroup {
    fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        let layers = (0..config.inner_group_num)
            .map(|i| AlbertLayer::load(config, vb.pp(format!("albert_layers.{i}"))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in &self.layers {
            xs = layer.forward(&xs)?;
        }
        Ok(xs)
    }
}

pub struct AlbertModel {
    embeddings: Embeddings,
    embedding_hidden_mapping_in: Linear,
    layer_groups: Vec<LayerGroup>,
    num_hidden_layers: usize,
    num_hidden_groups: usize,
}

impl AlbertModel {
    pub fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        let embeddings = Embeddings::load(config, vb.pp("embeddings"))?;
        let encoder = vb.pp("encoder");
        let embedding_hidden_mapping_in = linear(
            config.embedding_size,
            config.hidden_size,
            encoder.pp("embedding_hidden_mapping_in"),
        )?;
        let layer_groups = (0..config.num_hidden_groups)
            .map(|i| LayerGroup::load(config, encoder.pp(format!("albert_layer_groups.{i}"))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            embeddings,
            embedding_hidden_mapping_in,
            layer_groups,
            num_hidden_layers: config.num_hidden_layers,
            num_hidden_groups: config.num_hidden_groups,
        })
    }

    /// Hidden states for a `(1, tokens)` batch of token ids.
    pub fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let xs = self.embeddings.forward(input_ids)?;
        let mut xs = self.embedding_hidden_mapping_in.forward(&xs)?;
        // The same group weights are applied at every depth.
        for i in 0..self.num_hidden_layers {
            let group = i * self.num_hidden_groups / self.num_hidden_layers;
            xs = self.layer_groups[group].forward(&xs)?;
        }
        Ok(xs)
    }
}

pub struct AlbertBackbone {
    model: AlbertModel,
    hidden_size: usize,
    device: Device,
}

impl AlbertBackbone {
    pub(crate) fn boxed(
        files: &ModelFiles,
        device: &Device,
        dtype: DType,
    ) -> Result<Box<dyn EmbeddingBackbone>> {
        let config: Config = serde_json::from_str(&std::fs::read_to_string(&files.config)?)?;
        let vb = super::load_var_builder(files, device, dtype)?;
        let model = AlbertModel::load(&config, vb.pp("albert"))?;
        Ok(Box::new(Self {
            hidden_size: config.hidden_size,
            model,
            device: device.clone(),
        }))
    }
}

impl EmbeddingBackbone for AlbertBackbone {
    fn forward(&self, token_ids: &[u32]) -> Result<Tensor> {
        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        let hidden = self.model.forward(&input_ids)?;
        Ok(hidden.squeeze(0)?)
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
