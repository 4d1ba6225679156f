//! Input embeddings for the language and visual streams

use burn::nn::{
    Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig, Linear,
    LinearConfig,
};
use burn::prelude::*;
use burn::tensor::Int;

use crate::config::LxmertConfig;

/// BERT-style text embeddings: word + learned position + token type,
/// followed by layer norm and dropout.
#[derive(Module, Debug)]
pub struct TextEmbeddings<B: Backend> {
    pub word: Embedding<B>,
    pub position: Embedding<B>,
    pub token_type: Embedding<B>,
    pub norm: LayerNorm<B>,
    pub dropout: Dropout,
}

impl<B: Backend> TextEmbeddings<B> {
    pub fn new(config: &LxmertConfig, device: &B::Device) -> Self {
        Self {
            word: EmbeddingConfig::new(config.vocab_size, config.hidden_size).init(device),
            position: EmbeddingConfig::new(config.max_text_length, config.hidden_size).init(device),
            token_type: EmbeddingConfig::new(config.type_vocab_size, config.hidden_size)
                .init(device),
            norm: LayerNormConfig::new(config.hidden_size).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
        }
    }

    /// Embed token ids and token type ids `[batch, text_len]` into
    /// `[batch, text_len, hidden]`.
    pub fn forward(
        &self,
        token_ids: Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch, len] = token_ids.dims();
        let device = token_ids.device();

        let positions = Tensor::<B, 1, Int>::arange(0..len as i64, &device)
            .reshape([1, len])
            .expand([batch, len]);

        let x = self.word.forward(token_ids)
            + self.position.forward(positions)
            + self.token_type.forward(token_type_ids);

        self.dropout.forward(self.norm.forward(x))
    }
}

/// Visual embeddings: project grid features and normalized box positions
/// into the shared hidden space and average the two projections.
#[derive(Module, Debug)]
pub struct VisualEmbeddings<B: Backend> {
    pub feat_proj: Linear<B>,
    pub feat_norm: LayerNorm<B>,
    pub pos_proj: Linear<B>,
    pub pos_norm: LayerNorm<B>,
    pub dropout: Dropout,
}

impl<B: Backend> VisualEmbeddings<B> {
    pub fn new(config: &LxmertConfig, device: &B::Device) -> Self {
        Self {
            feat_proj: LinearConfig::new(config.visual_feat_dim, config.hidden_size).init(device),
            feat_norm: LayerNormConfig::new(config.hidden_size).init(device),
            pos_proj: LinearConfig::new(config.visual_pos_dim, config.hidden_size).init(device),
            pos_norm: LayerNormConfig::new(config.hidden_size).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
        }
    }

    /// Embed features `[batch, n, feat_dim]` and positions `[batch, n, pos_dim]`
    /// into `[batch, n, hidden]`.
    pub fn forward(&self, feats: Tensor<B, 3>, pos: Tensor<B, 3>) -> Tensor<B, 3> {
        let f = self.feat_norm.forward(self.feat_proj.forward(feats));
        let p = self.pos_norm.forward(self.pos_proj.forward(pos));

        self.dropout.forward((f + p) / 2.0)
    }
}
