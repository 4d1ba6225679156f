//! Backbone configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// LXMERT backbone configuration
///
/// All geometry the backbone needs is fixed here at construction time.
/// Task-specific geometry (answer count, codebook size, grid layout) lives in
/// the per-task config structs, not on this shared object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LxmertConfig {
    /// Vocabulary size of the language stream
    pub vocab_size: usize,
    /// Hidden size shared by both streams
    pub hidden_size: usize,
    /// Number of token type (segment) embeddings
    pub type_vocab_size: usize,
    /// Maximum text sequence length
    pub max_text_length: usize,
    /// Dimension of the raw visual features fed to the visual stream
    pub visual_feat_dim: usize,
    /// Dimension of the visual position encoding (normalized box coordinates)
    pub visual_pos_dim: usize,
    /// Number of attention heads
    pub num_heads: usize,
    /// Feed-forward intermediate size
    pub intermediate_size: usize,
    /// Number of language-only self-attention layers
    pub l_layers: usize,
    /// Number of cross-modality layers
    pub x_layers: usize,
    /// Number of visual-only self-attention layers
    pub r_layers: usize,
    /// Dropout probability applied to embeddings and sub-layer outputs
    pub dropout: f64,
    /// Standard deviation for normal weight initialization of task heads
    pub initializer_range: f64,
}

impl LxmertConfig {
    /// Standard LXMERT-base geometry
    pub fn base() -> Self {
        Self {
            vocab_size: 30522,
            hidden_size: 768,
            type_vocab_size: 2,
            max_text_length: 20,
            visual_feat_dim: 2048,
            visual_pos_dim: 4,
            num_heads: 12,
            intermediate_size: 3072,
            l_layers: 9,
            x_layers: 5,
            r_layers: 5,
            dropout: 0.1,
            initializer_range: 0.02,
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Size of each attention head.
    ///
    /// The hidden size must split evenly across heads.
    pub fn head_dim(&self) -> usize {
        assert_eq!(
            self.hidden_size % self.num_heads,
            0,
            "hidden size {} is not divisible by {} heads",
            self.hidden_size,
            self.num_heads
        );
        self.hidden_size / self.num_heads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_base() {
        let config = LxmertConfig::base();
        assert_eq!(config.hidden_size, 768);
        assert_eq!(config.num_heads, 12);
        assert_eq!(config.head_dim(), 64);
        assert_eq!(config.l_layers, 9);
        assert_eq!(config.x_layers, 5);
        assert_eq!(config.r_layers, 5);
    }

    #[test]
    #[should_panic(expected = "not divisible")]
    fn test_head_dim_uneven_split_panics() {
        let mut config = LxmertConfig::base();
        config.hidden_size = 30;
        config.num_heads = 4;
        config.head_dim();
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = LxmertConfig::base();
        let json = serde_json::to_string(&config).unwrap();
        let back: LxmertConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.vocab_size, config.vocab_size);
        assert_eq!(back.visual_feat_dim, config.visual_feat_dim);
    }
}
