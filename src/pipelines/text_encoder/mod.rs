//! Text-column encoding pipeline backed by pretrained language models.
//!
//! Converts a column of nullable text values into fixed-size sentence
//! vectors usable as features by downstream predictors: checkpoint selection
//! through the model registry, tokenization, a forward pass through the
//! pretrained body, and pooling over the token axis.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use text_encoders::TextEncoderBuilder;
//!
//! # fn main() -> text_encoders::Result<()> {
//! let mut encoder = TextEncoderBuilder::from_model_name("distilbert").build()?;
//! encoder.prepare()?;
//!
//! let column = [Some("hello world"), None, Some("a longer sentence")];
//! let vectors = encoder.encode(&column)?;
//! assert_eq!(vectors.len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! # Supported Models
//!
//! | Family | Checkpoint | Hidden size |
//! |--------|------------|-------------|
//! | DistilBERT | `distilbert-base-uncased` | 768 |
//! | ALBERT | `albert-base-v2` | 768 |
//! | BART | `facebook/bart-large` | 1024 |
//! | GPT-2 (default) | `gpt2` | 768 |

// ============ Internal API ============

pub(crate) mod builder;
pub(crate) mod pipeline;
pub(crate) mod tokenizer;

pub mod pooling;

// ============ Public API ============

pub use crate::models::ModelFamily;
pub use builder::{EncoderConfig, TextEncoderBuilder};
pub use pipeline::{ModelMode, TextEncoder};
pub use pooling::PoolingStrategy;
