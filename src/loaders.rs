//! Checkpoint and tokenizer loading from the Hugging Face Hub.
//!
//! Artifacts are resolved by checkpoint name through `hf-hub`, which caches
//! files locally so repeated loads stay offline. Failures surface unchanged
//! as [`EncoderError::Download`].
//!
//! ## Main Types
//!
//! - [`HfLoader`] - Fetches a single file from a model repository
//! - [`TokenizerLoader`] - Loads the tokenizer attached to a checkpoint
//! - [`CheckpointLoader`] - Resolves a checkpoint's config and weight files

use std::path::PathBuf;

use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;

use crate::error::{EncoderError, Result};

/// Fetches a single file from a Hugging Face model repository.
#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub filename: String,
}

impl HfLoader {
    pub fn new(repo: &str, filename: &str) -> Self {
        Self {
            repo: repo.into(),
            filename: filename.into(),
        }
    }

    pub fn load(&self) -> Result<PathBuf> {
        let api = Api::new()?;
        let repo = api.repo(Repo::new(self.repo.clone(), RepoType::Model));
        Ok(repo.get(&self.filename)?)
    }
}

/// Loads the tokenizer attached to a checkpoint.
#[derive(Debug, Clone)]
pub struct TokenizerLoader {
    tokenizer_file: HfLoader,
}

impl TokenizerLoader {
    pub fn new(repo: &str) -> Self {
        Self {
            tokenizer_file: HfLoader::new(repo, "tokenizer.json"),
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let tokenizer_file_path = self.tokenizer_file.load()?;

        Tokenizer::from_file(tokenizer_file_path)
            .map_err(|e| EncoderError::Tokenization(format!("failed to load tokenizer: {e}")))
    }
}

/// Local paths of a fetched checkpoint.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub weights: PathBuf,
}

/// Resolves a checkpoint's `config.json` and weight file.
///
/// Prefers `model.safetensors`, falling back to `pytorch_model.bin` for
/// checkpoints that were never converted.
#[derive(Debug, Clone)]
pub struct CheckpointLoader {
    pub repo: String,
}

impl CheckpointLoader {
    pub fn new(repo: &str) -> Self {
        Self { repo: repo.into() }
    }

    pub fn load(&self) -> Result<ModelFiles> {
        let api = Api::new()?;
        let repo = api.repo(Repo::new(self.repo.clone(), RepoType::Model));

        let config = repo.get("config.json")?;
        let weights = repo
            .get("model.safetensors")
            .or_else(|_| repo.get("pytorch_model.bin"))?;

        Ok(ModelFiles { config, weights })
    }
}
