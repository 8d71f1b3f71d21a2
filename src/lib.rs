//! # text-encoders
//!
//! Pretrained language-model text encoders for tabular feature pipelines,
//! built on [candle](https://github.com/huggingface/candle).
//!
//! A [`TextEncoder`] turns a column of nullable text values into one
//! fixed-size vector per value. Model families are selected by name through
//! a registry (GPT-2 by default), checkpoints are fetched from the Hugging
//! Face Hub, and per-token hidden states are pooled into sentence vectors.
//!
//! ```rust,no_run
//! use text_encoders::{ModelFamily, TextEncoderBuilder};
//!
//! # fn main() -> text_encoders::Result<()> {
//! let mut encoder = TextEncoderBuilder::new(ModelFamily::Gpt2).build()?;
//! encoder.prepare()?;
//!
//! let vectors = encoder.encode(&[Some("hello world"), None])?;
//! assert_eq!(vectors.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loaders;
pub mod models;
pub mod pipelines;

pub use error::{EncoderError, Result};
pub use models::{EmbeddingBackbone, ModelBinding, ModelFamily};
pub use pipelines::text_encoder::{
    EncoderConfig, ModelMode, PoolingStrategy, TextEncoder, TextEncoderBuilder,
};
