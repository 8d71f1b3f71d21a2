//! Model registry and embedding backbones.
//!
//! The registry maps a model family to its pretrained checkpoint and the
//! backbone that runs it. DistilBERT wraps the body from
//! `candle_transformers`; the remaining families are implemented in this
//! crate.

// ============ Internal API ============

pub(crate) mod albert;
pub(crate) mod bart;
pub(crate) mod distilbert;
pub(crate) mod gpt2;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use crate::error::Result;
use crate::loaders::ModelFiles;

/// A pretrained transformer body that produces per-token hidden states.
///
/// Implementations are feature extractors only: no task head, no gradient
/// updates.
pub trait EmbeddingBackbone: Send {
    /// Runs a forward pass over one tokenized input.
    ///
    /// Returns hidden states with shape `(tokens, hidden_size)`.
    fn forward(&self, token_ids: &[u32]) -> Result<Tensor>;

    /// Width of the hidden states (the embedding dimensionality).
    fn hidden_size(&self) -> usize;

    /// Device the backbone is placed on.
    fn device(&self) -> &Device;
}

type BackboneFactory = fn(&ModelFiles, &Device, DType) -> Result<Box<dyn EmbeddingBackbone>>;

/// Supported pretrained model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelFamily {
    DistilBert,
    Albert,
    Bart,
    #[default]
    Gpt2,
}

impl ModelFamily {
    /// Resolves a family from its lookup key.
    ///
    /// Unrecognized keys resolve to [`ModelFamily::Gpt2`] rather than
    /// failing; the registry is deliberately permissive.
    pub fn from_name(name: &str) -> Self {
        match name {
            "distilbert" => Self::DistilBert,
            "albert" => Self::Albert,
            "bart" => Self::Bart,
            _ => Self::Gpt2,
        }
    }

    /// The registry entry for this family. Pure lookup, no side effects.
    pub fn binding(self) -> &'static ModelBinding {
        match self {
            Self::DistilBert => &DISTILBERT,
            Self::Albert => &ALBERT,
            Self::Bart => &BART,
            Self::Gpt2 => &GPT2,
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DistilBert => "distilbert",
            Self::Albert => "albert",
            Self::Bart => "bart",
            Self::Gpt2 => "gpt2",
        };
        write!(f, "{name}")
    }
}

/// Everything the encoder needs to know about one model family.
///
/// Resolved once at construction; exactly one binding is active per encoder
/// instance. Sequence-classification heads for fine-tuning are not wired up
/// yet; `prepare` rejects `custom_train` before a head would be resolved.
pub struct ModelBinding {
    pub family: ModelFamily,
    /// Checkpoint identifier on the Hugging Face Hub.
    pub checkpoint: &'static str,
    /// Longest sequence the checkpoint's position table supports.
    pub max_positions: usize,
    pub(crate) build_backbone: BackboneFactory,
}

static DISTILBERT: ModelBinding = ModelBinding {
    family: ModelFamily::DistilBert,
    checkpoint: "distilbert-base-uncased",
    max_positions: 512,
    build_backbone: distilbert::DistilBertBackbone::boxed,
};

static ALBERT: ModelBinding = ModelBinding {
    family: ModelFamily::Albert,
    checkpoint: "albert-base-v2",
    max_positions: 512,
    build_backbone: albert::AlbertBackbone::boxed,
};

static BART: ModelBinding = ModelBinding {
    family: ModelFamily::Bart,
    checkpoint: "facebook/bart-large",
    max_positions: 1024,
    build_backbone: bart::BartEncoderBackbone::boxed,
};

static GPT2: ModelBinding = ModelBinding {
    family: ModelFamily::Gpt2,
    checkpoint: "gpt2",
    max_positions: 1024,
    build_backbone: gpt2::Gpt2Backbone::boxed,
};

/// Maps a checkpoint's weight file into a [`VarBuilder`] on the target
/// device and dtype.
pub(crate) fn load_var_builder(
    files: &ModelFiles,
    device: &Device,
    dtype: DType,
) -> Result<VarBuilder<'static>> {
    let vb = if files.weights.extension().is_some_and(|e| e == "safetensors") {
        // SAFETY: mmap'd safetensors file — safe as long as the file is not
        // modified while the model is in use.
        unsafe { VarBuilder::from_mmaped_safetensors(&[&files.weights], dtype, device)? }
    } else {
        VarBuilder::from_pth(&files.weights, dtype, device)?
    };
    Ok(vb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_every_family() {
        for (name, family) in [
            ("distilbert", ModelFamily::DistilBert),
            ("albert", ModelFamily::Albert),
            ("bart", ModelFamily::Bart),
            ("gpt2", ModelFamily::Gpt2),
        ] {
            assert_eq!(ModelFamily::from_name(name), family);
            assert_eq!(family.binding().family, family);
        }
    }

    #[test]
    fn unrecognized_names_fall_back_to_gpt2() {
        for name in ["bert-large", "t5", "", "GPT2"] {
            let family = ModelFamily::from_name(name);
            assert_eq!(family, ModelFamily::Gpt2);
            assert_eq!(family.binding().checkpoint, "gpt2");
        }
    }

    #[test]
    fn display_round_trips_through_from_name() {
        for family in [
            ModelFamily::DistilBert,
            ModelFamily::Albert,
            ModelFamily::Bart,
            ModelFamily::Gpt2,
        ] {
            assert_eq!(ModelFamily::from_name(&family.to_string()), family);
        }
    }

    #[test]
    fn bindings_carry_the_original_checkpoints() {
        assert_eq!(
            ModelFamily::DistilBert.binding().checkpoint,
            "distilbert-base-uncased"
        );
        assert_eq!(ModelFamily::Albert.binding().checkpoint, "albert-base-v2");
        assert_eq!(ModelFamily::Bart.binding().checkpoint, "facebook/bart-large");
        assert_eq!(ModelFamily::Gpt2.binding().checkpoint, "gpt2");
    }
}
