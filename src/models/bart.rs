//! BART encoder body (embeddings generator).
//!
//! Only the encoder stack is loaded from `facebook/bart-large`; the decoder
//! has no role in feature extraction. Positions use BART's learned table
//! with its +2 offset.

use candle_core::{DType, Device, Tensor};
use candle_nn::{
    embedding, layer_norm, linear, Activation, Embedding, LayerNorm, Linear, Module, VarBuilder,
};
use serde::Deserialize;

use super::EmbeddingBackbone;
use crate::error::Result;
use crate::loaders::ModelFiles;

/// BART's learned position table is shifted by two slots.
const POSITION_OFFSET: usize = 2;

const LAYER_NORM_EPS: f64 = 1e-5;

fn default_activation() -> Activation {
    Activation::Gelu
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub vocab_size: usize,
    pub d_model: usize,
    pub encoder_layers: usize,
    pub encoder_attention_heads: usize,
    pub encoder_ffn_dim: usize,
    pub max_position_embeddings: usize,
    #[serde(default)]
    pub scale_embedding: bool,
    #[serde(default = "default_activation")]
    pub activation_function: Activation,
}

struct SelfAttention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    num_heads: usize,
}

impl SelfAttention {
    fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        let d = config.d_model;
        Ok(Self {
            q_proj: linear(d, d, vb.pp("q_proj"))?,
            k_proj: linear(d, d, vb.pp("k_proj"))?,
            v_proj: linear(d, d, vb.pp("v_proj"))?,
            out_proj: linear(d, d, vb.pp("out_proj"))?,
            num_heads: config.encoder_attention_heads,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (b, t, d) = xs.dims3()?;
        let head_dim = d / self.num_heads;
        let shape = (b, t, self.num_heads, head_dim);
        let q = self.q_proj.forward(xs)?.reshape(shape)?.transpose(1, 2)?.contiguous()?;
        let k = self.k_proj.forward(xs)?.reshape(shape)?.transpose(1, 2)?.contiguous()?;
        let v = self.v_proj.forward(xs)?.reshape(shape)?.transpose(1, 2)?.contiguous()?;

        let scale = 1f64 / (head_dim as f64).sqrt();
        let scores = (q.matmul(&k.transpose(2, 3)?)? * scale)?;
        let weights = candle_nn::ops::softmax_last_dim(&scores)?;

        let context = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, t, d))?;
        Ok(self.out_proj.forward(&context)?)
    }
}

struct EncoderLayer {
    self_attn: SelfAttention,
    self_attn_layer_norm: LayerNorm,
    fc1: Linear,
    fc2: Linear,
    final_layer_norm: LayerNorm,
    activation: Activation,
}

impl EncoderLayer {
    fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            self_attn: SelfAttention::load(config, vb.pp("self_attn"))?,
            self_attn_layer_norm: layer_norm(
                config.d_model,
                LAYER_NORM_EPS,
                vb.pp("self_attn_layer_norm"),
            )?,
            fc1: linear(config.d_model, config.encoder_ffn_dim, vb.pp("fc1"))?,
            fc2: linear(config.encoder_ffn_dim, config.d_model, vb.pp("fc2"))?,
            final_layer_norm: layer_norm(config.d_model, LAYER_NORM_EPS, vb.pp("final_layer_norm"))?,
            activation: config.activation_function,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        // Post-norm residual blocks, as in the original architecture.
        let attn = self.self_attn.forward(xs)?;
        let xs = self.self_attn_layer_norm.forward(&(xs + attn)?)?;
        let ffn = self.fc1.forward(&xs)?.apply(&self.activation)?;
        let ffn = self.fc2.forward(&ffn)?;
        Ok(self.final_layer_norm.forward(&(&xs + ffn)?)?)
    }
}

pub struct BartEncoder {
    embed_tokens: Embedding,
    embed_positions: Embedding,
    layernorm_embedding: LayerNorm,
    layers: Vec<EncoderLayer>,
    embed_scale: f64,
}

impl BartEncoder {
    pub fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        let encoder = vb.pp("encoder");
        // Tied token embeddings may only survive safetensors conversion
        // under the shared name.
        let embed_tokens = embedding(config.vocab_size, config.d_model, encoder.pp("embed_tokens"))
            .or_else(|_| embedding(config.vocab_size, config.d_model, vb.pp("shared")))?;
        let embed_positions = embedding(
            config.max_position_embeddings + POSITION_OFFSET,
            config.d_model,
            encoder.pp("embed_positions"),
        )?;
        let layernorm_embedding = layer_norm(
            config.d_model,
            LAYER_NORM_EPS,
            encoder.pp("layernorm_embedding"),
        )?;
        let layers = (0..config.encoder_layers)
            .map(|i| EncoderLayer::load(config, encoder.pp(format!("layers.{i}"))))
            .collect::<Result<Vec<_>>>()?;
        let embed_scale = if config.scale_embedding {
            (config.d_model as f64).sqrt()
        } else {
            1.0
        };
        Ok(Self {
            embed_tokens,
            embed_positions,
            layernorm_embedding,
            layers,
            embed_scale,
        })
    }

    /// Hidden states for a `(1, tokens)` batch of token ids.
    pub fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let (_b, t) = input_ids.dims2()?;
        let positions = Tensor::arange(
            POSITION_OFFSET as u32,
            (t + POSITION_OFFSET) as u32,
            input_ids.device(),
        )?
        .unsqueeze(0)?;
        let tok = (self.embed_tokens.forward(input_ids)? * self.embed_scale)?;
        let xs = tok.broadcast_add(&self.embed_positions.forward(&positions)?)?;
        let mut xs = self.layernorm_embedding.forward(&xs)?;
        for layer in &self.layers {
            xs = layer.forward(&xs)?;
        }
        Ok(xs)
    }
}

pub struct BartEncoderBackbone {
    model: BartEncoder,
    hidden_size: usize,
    device: Device,
}

impl BartEncoderBackbone {
    pub(crate) fn boxed(
        files: &ModelFiles,
        device: &Device,
        dtype: DType,
    ) -> Result<Box<dyn EmbeddingBackbone>> {
        let config: Config = serde_json::from_str(&std::fs::read_to_string(&files.config)?)?;
        let vb = super::load_var_builder(files, device, dtype)?;
        let model = BartEncoder::load(&config, vb.pp("model"))?;
        Ok(Box::new(Self {
            hidden_size: config.d_model,
            model,
            device: device.clone(),
        }))
    }
}

impl EmbeddingBackbone for BartEncoderBackbone {
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
