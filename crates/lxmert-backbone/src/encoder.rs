//! Encoder layers: single-modality transformer blocks and cross-modality blocks

use burn::nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::gelu;

use crate::attention::MultiHeadAttention;
use crate::config::LxmertConfig;

/// Feed-forward network with GELU activation
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    pub fn new(config: &LxmertConfig, device: &B::Device) -> Self {
        Self {
            fc1: LinearConfig::new(config.hidden_size, config.intermediate_size).init(device),
            fc2: LinearConfig::new(config.intermediate_size, config.hidden_size).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = gelu(self.fc1.forward(x));
        self.dropout.forward(self.fc2.forward(x))
    }
}

/// Single-modality transformer block.
///
/// Post-norm residual layout (`LayerNorm(x + sublayer(x))`), matching the
/// BERT lineage of the backbone rather than the pre-norm layout of more
/// recent encoders.
#[derive(Module, Debug)]
pub struct TransformerBlock<B: Backend> {
    pub attn: MultiHeadAttention<B>,
    pub attn_norm: LayerNorm<B>,
    pub ffn: FeedForward<B>,
    pub ffn_norm: LayerNorm<B>,
    pub dropout: Dropout,
}

impl<B: Backend> TransformerBlock<B> {
    pub fn new(config: &LxmertConfig, device: &B::Device) -> Self {
        Self {
            attn: MultiHeadAttention::new(config, device),
            attn_norm: LayerNormConfig::new(config.hidden_size).init(device),
            ffn: FeedForward::new(config, device),
            ffn_norm: LayerNormConfig::new(config.hidden_size).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<Tensor<B, 4>>) -> Tensor<B, 3> {
        let attn_out = self.dropout.forward(self.attn.forward(x.clone(), x.clone(), mask));
        let x = self.attn_norm.forward(x + attn_out);

        let ffn_out = self.ffn.forward(x.clone());
        self.ffn_norm.forward(x + ffn_out)
    }
}

/// Cross-modality block.
///
/// One cross-attention module is shared by both directions (language
/// attending visual and visual attending language), followed by per-stream
/// self-attention and feed-forward sub-layers.
#[derive(Module, Debug)]
pub struct CrossModalityBlock<B: Backend> {
    pub cross_attn: MultiHeadAttention<B>,
    pub lang_cross_norm: LayerNorm<B>,
    pub visn_cross_norm: LayerNorm<B>,
    pub lang_self: TransformerBlock<B>,
    pub visn_self: TransformerBlock<B>,
    pub dropout: Dropout,
}

impl<B: Backend> CrossModalityBlock<B> {
    pub fn new(config: &LxmertConfig, device: &B::Device) -> Self {
        Self {
            cross_attn: MultiHeadAttention::new(config, device),
            lang_cross_norm: LayerNormConfig::new(config.hidden_size).init(device),
            visn_cross_norm: LayerNormConfig::new(config.hidden_size).init(device),
            lang_self: TransformerBlock::new(config, device),
            visn_self: TransformerBlock::new(config, device),
            dropout: DropoutConfig::new(config.dropout).init(),
        }
    }

    /// Fuse the two streams.
    ///
    /// `lang_mask` masks language keys wherever the language stream serves as
    /// attention context. `visn_mask` applies to visual self-attention only:
    /// a causal `[1, 1, N, N]` mask restricts grid-to-grid attention, while
    /// language queries may still see every grid.
    pub fn forward(
        &self,
        lang: Tensor<B, 3>,
        visn: Tensor<B, 3>,
        lang_mask: Option<Tensor<B, 4>>,
        visn_mask: Option<Tensor<B, 4>>,
    ) -> (Tensor<B, 3>, Tensor<B, 3>) {
        // Bidirectional cross-attention with shared weights
        let lang_ctx = self
            .dropout
            .forward(self.cross_attn.forward(lang.clone(), visn.clone(), None));
        let visn_ctx = self.dropout.forward(self.cross_attn.forward(
            visn.clone(),
            lang.clone(),
            lang_mask.clone(),
        ));

        let lang = self.lang_cross_norm.forward(lang + lang_ctx);
        let visn = self.visn_cross_norm.forward(visn + visn_ctx);

        // Per-stream self-attention + feed-forward
        let lang = self.lang_self.forward(lang, lang_mask);
        let visn = self.visn_self.forward(visn, visn_mask);

        (lang, visn)
    }
}
