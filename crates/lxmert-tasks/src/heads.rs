//! Task-specific output heads
//!
//! Small projection modules mapping backbone hidden states to task logits.
//! All heads use normal(0, initializer_range) weight initialization with zero
//! biases, matching the backbone's pretraining initialization.

use burn::nn::{Initializer, LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::gelu;

use lxmert_backbone::LxmertConfig;

fn head_linear<B: Backend>(
    input: usize,
    output: usize,
    config: &LxmertConfig,
    device: &B::Device,
) -> Linear<B> {
    LinearConfig::new(input, output)
        .with_initializer(Initializer::Normal {
            mean: 0.0,
            std: config.initializer_range,
        })
        .init(device)
}

/// Answer classification head: pooled output -> answer logits.
///
/// hidden -> 2*hidden, GELU, layer norm, -> num_answers.
#[derive(Module, Debug)]
pub struct AnswerHead<B: Backend> {
    pub dense: Linear<B>,
    pub norm: LayerNorm<B>,
    pub decoder: Linear<B>,
}

impl<B: Backend> AnswerHead<B> {
    pub fn new(config: &LxmertConfig, num_answers: usize, device: &B::Device) -> Self {
        let hidden = config.hidden_size;
        Self {
            dense: head_linear(hidden, hidden * 2, config, device),
            norm: LayerNormConfig::new(hidden * 2).init(device),
            decoder: head_linear(hidden * 2, num_answers, config, device),
        }
    }

    /// `[batch, hidden]` -> `[batch, num_answers]`
    pub fn forward(&self, pooled: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.norm.forward(gelu(self.dense.forward(pooled)));
        self.decoder.forward(x)
    }
}

/// Masked language modeling head: language hidden states -> vocabulary logits
#[derive(Module, Debug)]
pub struct LanguageHead<B: Backend> {
    pub transform: Linear<B>,
    pub norm: LayerNorm<B>,
    pub decoder: Linear<B>,
}

impl<B: Backend> LanguageHead<B> {
    pub fn new(config: &LxmertConfig, device: &B::Device) -> Self {
        let hidden = config.hidden_size;
        Self {
            transform: head_linear(hidden, hidden, config, device),
            norm: LayerNormConfig::new(hidden).init(device),
            decoder: head_linear(hidden, config.vocab_size, config, device),
        }
    }

    /// `[batch, text_len, hidden]` -> `[batch, text_len, vocab_size]`
    pub fn forward(&self, language: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.norm.forward(gelu(self.transform.forward(language)));
        self.decoder.forward(x)
    }
}

/// Image-text matching head: pooled output -> matched/unmatched logits
#[derive(Module, Debug)]
pub struct MatchedHead<B: Backend> {
    pub decoder: Linear<B>,
}

impl<B: Backend> MatchedHead<B> {
    pub fn new(config: &LxmertConfig, device: &B::Device) -> Self {
        Self {
            decoder: head_linear(config.hidden_size, 2, config, device),
        }
    }

    /// `[batch, hidden]` -> `[batch, 2]`
    pub fn forward(&self, pooled: Tensor<B, 2>) -> Tensor<B, 2> {
        self.decoder.forward(pooled)
    }
}

/// Visual prediction head with a shared transform and two decoders:
/// codebook-class logits and a regressed feature vector.
#[derive(Module, Debug)]
pub struct VisualHead<B: Backend> {
    pub transform: Linear<B>,
    pub norm: LayerNorm<B>,
    pub code_decoder: Linear<B>,
    pub feat_decoder: Linear<B>,
}

impl<B: Backend> VisualHead<B> {
    pub fn new(config: &LxmertConfig, n_codebook: usize, device: &B::Device) -> Self {
        let hidden = config.hidden_size;
        Self {
            transform: head_linear(hidden, hidden, config, device),
            norm: LayerNormConfig::new(hidden).init(device),
            code_decoder: head_linear(hidden, n_codebook, config, device),
            feat_decoder: head_linear(hidden, config.visual_feat_dim, config, device),
        }
    }

    fn transformed(&self, vision: Tensor<B, 3>) -> Tensor<B, 3> {
        self.norm.forward(gelu(self.transform.forward(vision)))
    }

    /// `[batch, n_grids, hidden]` -> `[batch, n_grids, n_codebook]`
    pub fn code_logits(&self, vision: Tensor<B, 3>) -> Tensor<B, 3> {
        self.code_decoder.forward(self.transformed(vision))
    }

    /// `[batch, n_grids, hidden]` -> `[batch, n_grids, visual_feat_dim]`
    pub fn regressed_feats(&self, vision: Tensor<B, 3>) -> Tensor<B, 3> {
        self.feat_decoder.forward(self.transformed(vision))
    }
}
