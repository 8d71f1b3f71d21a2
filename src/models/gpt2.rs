//! GPT-2 model body (embeddings generator, no language-model head).
//!
//! Follows the `gpt2` checkpoint tensor layout. Projections use the Conv1D
//! convention of the original checkpoint: weights are stored `(in, out)` and
//! applied as `x @ w + b`.

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{embedding, layer_norm, Activation, Embedding, LayerNorm, Module, VarBuilder};
use serde::Deserialize;

use super::EmbeddingBackbone;
use crate::error::Result;
use crate::loaders::ModelFiles;

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub vocab_size: usize,
    pub n_positions: usize,
    pub n_embd: usize,
    pub n_layer: usize,
    pub n_head: usize,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
}

/// Checkpoint-convention projection: weight stored `(in, out)`.
#[derive(Debug)]
struct Conv1D {
    weight: Tensor,
    bias: Tensor,
}

impl Conv1D {
    fn load(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get((in_dim, out_dim), "weight")?;
        let bias = vb.get(out_dim, "bias")?;
        Ok(Self { weight, bias })
    }
}

impl Module for Conv1D {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (b, t, _) = xs.dims3()?;
        let in_dim = self.weight.dim(0)?;
        let out_dim = self.weight.dim(1)?;
        let xs = xs.reshape((b * t, in_dim))?;
        let ys = xs.matmul(&self.weight)?.broadcast_add(&self.bias)?;
        ys.reshape((b, t, out_dim))
    }
}

fn masked_fill(on_false: &Tensor, mask: &Tensor, on_true: f32) -> Result<Tensor> {
    let shape = mask.shape();
    let on_true = Tensor::new(on_true, on_false.device())?
        .to_dtype(on_false.dtype())?
        .broadcast_as(shape.dims())?;
    Ok(mask.where_cond(&on_true, on_false)?)
}

fn causal_mask(t: usize, device: &Device) -> Result<Tensor> {
    let mask: Vec<u8> = (0..t)
        .flat_map(|i| (0..t).map(move |j| u8::from(j > i)))
        .collect();
    Ok(Tensor::from_vec(mask, (t, t), device)?)
}

struct Attention {
    c_attn: Conv1D,
    c_proj: Conv1D,
    n_head: usize,
}

impl Attention {
    fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        let n_embd = config.n_embd;
        let c_attn = Conv1D::load(n_embd, 3 * n_embd, vb.pp("c_attn"))?;
        let c_proj = Conv1D::load(n_embd, n_embd, vb.pp("c_proj"))?;
        Ok(Self {
            c_attn,
            c_proj,
            n_head: config.n_head,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (b, t, c) = xs.dims3()?;
        let head_dim = c / self.n_head;
        let qkv = self.c_attn.forward(xs)?;
        let q = qkv.narrow(D::Minus1, 0, c)?;
        let k = qkv.narrow(D::Minus1, c, c)?;
        let v = qkv.narrow(D::Minus1, 2 * c, c)?;

        let shape = (b, t, self.n_head, head_dim);
        let q = q.reshape(shape)?.transpose(1, 2)?.contiguous()?;
        let k = k.reshape(shape)?.transpose(1, 2)?.contiguous()?;
        let v = v.reshape(shape)?.transpose(1, 2)?.contiguous()?;

        let scale = 1f64 / (head_dim as f64).sqrt();
        let scores = (q.matmul(&k.transpose(2, 3)?)? * scale)?;
        let mask = causal_mask(t, xs.device())?.broadcast_as(scores.shape())?;
        let scores = masked_fill(&scores, &mask, f32::NEG_INFINITY)?;
        let weights = candle_nn::ops::softmax_last_dim(&scores)?;

        let context = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, t, c))?;
        Ok(self.c_proj.forward(&context)?)
    }
}

struct Mlp {
    c_fc: Conv1D,
    c_proj: Conv1D,
    act: Activation,
}

impl Mlp {
    fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        let n_embd = config.n_embd;
        let c_fc = Conv1D::load(n_embd, 4 * n_embd, vb.pp("c_fc"))?;
        let c_proj = Conv1D::load(4 * n_embd, n_embd, vb.pp("c_proj"))?;
        Ok(Self {
            c_fc,
            c_proj,
            act: Activation::NewGelu,
        })
    }
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.c_fc.forward(xs)?.apply(&self.act)?;
        self.c_proj.forward(&xs)
    }
}

struct Block {
    ln_1: LayerNorm,
    attn: Attention,
    ln_2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        let ln_1 = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_1"))?;
        let attn = Attention::load(config, vb.pp("attn"))?;
        let ln_2 = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_2"))?;
        let mlp = Mlp::load(config, vb.pp("mlp"))?;
        Ok(Self {
            ln_1,
            attn,
            ln_2,
            mlp,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = (xs + self.attn.forward(&self.ln_1.forward(xs)?)?)?;
        let xs = (&xs + self.mlp.forward(&self.ln_2.forward(&xs)?)?)?;
        Ok(xs)
    }
}

pub struct Gpt2Model {
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
}

impl Gpt2Model {
    pub fn load(config: &Config, vb: VarBuilder) -> Result<Self> {
        let wte = embedding(config.vocab_size, config.n_embd, vb.pp("wte"))?;
        let wpe = embedding(config.n_positions, config.n_embd, vb.pp("wpe"))?;
        let blocks = (0..config.n_layer)
            .map(|i| Block::load(config, vb.pp(format!("h.{i}"))))
            .collect::<Result<Vec<_>>>()?;
        let ln_f = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_f"))?;
        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
        })
    }

    /// Hidden states for a `(1, tokens)` batch of token ids.
    pub fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let (_b, t) = input_ids.dims2()?;
        let positions = Tensor::arange(0u32, t as u32, input_ids.device())?.unsqueeze(0)?;
        let tok = self.wte.forward(input_ids)?;
        let pos = self.wpe.forward(&positions)?;
        let mut xs = tok.broadcast_add(&pos)?;
        for block in &self.blocks {
            xs = block.forward(&xs)?;
        }
        Ok(self.ln_f.forward(&xs)?)
    }
}

pub struct Gpt2Backbone {
    model: Gpt2Model,
    hidden_size: usize,
    device: Device,
}

impl Gpt2Backbone {
    pub(crate) fn boxed(
        files: &ModelFiles,
        device: &Device,
        dtype: DType,
    ) -> Result<Box<dyn EmbeddingBackbone>> {
        let config: Config = serde_json::from_str(&std::fs::read_to_string(&files.config)?)?;
        let vb = super::load_var_builder(files, device, dtype)?;
        let model = Gpt2Model::load(&config, vb)?;
        Ok(Box::new(Self {
            hidden_size: config.n_embd,
            model,
            device: device.clone(),
        }))
    }
}

impl EmbeddingBackbone for Gpt2Backbone {
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
