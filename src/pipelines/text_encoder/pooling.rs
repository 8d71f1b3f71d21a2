//! Sentence pooling: reducing per-token hidden states to one fixed vector.

use candle_core::{DType, Tensor};

use crate::error::Result;

/// How a per-token hidden-state sequence becomes one sentence vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolingStrategy {
    /// Arithmetic mean over the token axis.
    #[default]
    Mean,
    /// Hidden state of the final token.
    LastToken,
}

impl PoolingStrategy {
    /// Resolves a strategy from its configuration key.
    ///
    /// `"last_token"` selects [`PoolingStrategy::LastToken`]; anything else
    /// (including the default `"mean_norm"`) selects mean pooling.
    pub fn from_name(name: &str) -> Self {
        match name {
            "last_token" => Self::LastToken,
            _ => Self::Mean,
        }
    }
}

/// Pools `(tokens, hidden)` hidden states into a sentence vector.
///
/// Both strategies currently route to [`mean`]; the last-token reduction is
/// implemented but not wired up, matching the behavior the selection key has
/// always had.
pub(crate) fn pool(hidden_states: &Tensor, strategy: PoolingStrategy) -> Result<Vec<f32>> {
    match strategy {
        PoolingStrategy::Mean | PoolingStrategy::LastToken => mean(hidden_states),
    }
}

/// Averages all token embeddings into one vector.
///
/// This path is inference-only: the result is detached from any graph
/// tracking and handed back as plain `f32`s.
pub fn mean(hidden_states: &Tensor) -> Result<Vec<f32>> {
    let pooled = hidden_states.mean(0)?;
    Ok(pooled.detach().to_dtype(DType::F32)?.to_vec1::<f32>()?)
}

/// Takes the final token's embedding only.
pub fn last_token(hidden_states: &Tensor) -> Result<Vec<f32>> {
    let (tokens, _hidden) = hidden_states.dims2()?;
    let last = hidden_states.narrow(0, tokens - 1, 1)?.squeeze(0)?;
    Ok(last.detach().to_dtype(DType::F32)?.to_vec1::<f32>()?)
}

#[cfg(test)]
mod tests {
    use candle_core::{Device, Tensor};

    use super::*;

    fn hidden(rows: &[[f32; 4]]) -> Tensor {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::from_vec(flat, (rows.len(), 4), &Device::Cpu).unwrap()
    }

    #[test]
    fn mean_is_invariant_under_token_permutation() {
        let original = hidden(&[
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [0.0, -1.0, 2.5, 3.5],
        ]);
        let permuted = hidden(&[
            [0.0, -1.0, 2.5, 3.5],
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
        ]);
        let a = mean(&original).unwrap();
        let b = mean(&permuted).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn pool_routes_last_token_to_mean() {
        let states = hidden(&[[1.0, 1.0, 1.0, 1.0], [3.0, 3.0, 3.0, 3.0]]);
        let as_mean = pool(&states, PoolingStrategy::Mean).unwrap();
        let as_last = pool(&states, PoolingStrategy::LastToken).unwrap();
        assert_eq!(as_mean, as_last);
        assert_eq!(as_mean, vec![2.0; 4]);
    }

    #[test]
    fn last_token_takes_the_final_row() {
        let states = hidden(&[[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]]);
        assert_eq!(last_token(&states).unwrap(), vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn pooled_width_matches_hidden_size() {
        let states = hidden(&[[0.5, 0.25, -0.5, 1.0]]);
        assert_eq!(mean(&states).unwrap().len(), 4);
    }

    #[test]
    fn strategy_keys_resolve_like_the_config_surface() {
        assert_eq!(PoolingStrategy::from_name("last_token"), PoolingStrategy::LastToken);
        assert_eq!(PoolingStrategy::from_name("mean_norm"), PoolingStrategy::Mean);
        assert_eq!(PoolingStrategy::from_name("anything"), PoolingStrategy::Mean);
    }
}
