//! The cross-modality backbone model

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::Int;

use crate::attention::{causal_mask, padding_mask};
use crate::config::LxmertConfig;
use crate::embeddings::{TextEmbeddings, VisualEmbeddings};
use crate::encoder::{CrossModalityBlock, TransformerBlock};

/// Language-stream inputs, all `[batch, text_len]`
#[derive(Debug, Clone)]
pub struct TextInputs<B: Backend> {
    pub token_ids: Tensor<B, 2, Int>,
    pub token_type_ids: Tensor<B, 2, Int>,
    /// 1: attend, 0: padding
    pub attention_mask: Tensor<B, 2, Int>,
}

/// Visual-stream inputs
#[derive(Debug, Clone)]
pub struct VisualInputs<B: Backend> {
    /// Grid features `[batch, n_grids, visual_feat_dim]`
    pub feats: Tensor<B, 3>,
    /// Normalized box positions `[batch, n_grids, visual_pos_dim]`
    pub pos: Tensor<B, 3>,
}

/// The three backbone outputs
#[derive(Debug, Clone)]
pub struct BackboneOutput<B: Backend> {
    /// Per-token language hidden states `[batch, text_len, hidden]`
    pub language: Tensor<B, 3>,
    /// Per-grid visual hidden states `[batch, n_grids, hidden]`
    pub vision: Tensor<B, 3>,
    /// Pooled `[CLS]` summary `[batch, hidden]`
    pub pooled: Tensor<B, 2>,
}

/// Pooler: first language token through a linear layer and tanh
#[derive(Module, Debug)]
pub struct Pooler<B: Backend> {
    pub dense: Linear<B>,
}

impl<B: Backend> Pooler<B> {
    pub fn new(config: &LxmertConfig, device: &B::Device) -> Self {
        Self {
            dense: LinearConfig::new(config.hidden_size, config.hidden_size).init(device),
        }
    }

    pub fn forward(&self, language: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, _, hidden] = language.dims();
        let cls = language.slice([0..batch, 0..1, 0..hidden]).reshape([batch, hidden]);
        self.dense.forward(cls).tanh()
    }
}

/// LXMERT-style two-stream backbone with cross-modality fusion.
#[derive(Module, Debug)]
pub struct LxmertBackbone<B: Backend> {
    pub text_embeddings: TextEmbeddings<B>,
    pub visual_embeddings: VisualEmbeddings<B>,
    pub lang_layers: Vec<TransformerBlock<B>>,
    pub visn_layers: Vec<TransformerBlock<B>>,
    pub cross_layers: Vec<CrossModalityBlock<B>>,
    pub pooler: Pooler<B>,
}

impl<B: Backend> LxmertBackbone<B> {
    /// Creates a new backbone from the configuration
    pub fn new(config: &LxmertConfig, device: &B::Device) -> Self {
        let lang_layers = (0..config.l_layers)
            .map(|_| TransformerBlock::new(config, device))
            .collect();
        let visn_layers = (0..config.r_layers)
            .map(|_| TransformerBlock::new(config, device))
            .collect();
        let cross_layers = (0..config.x_layers)
            .map(|_| CrossModalityBlock::new(config, device))
            .collect();

        Self {
            text_embeddings: TextEmbeddings::new(config, device),
            visual_embeddings: VisualEmbeddings::new(config, device),
            lang_layers,
            visn_layers,
            cross_layers,
            pooler: Pooler::new(config, device),
        }
    }

    /// Run both streams and the cross-modality stack.
    ///
    /// `visual_ar` installs a causal mask over grid positions so each grid may
    /// only attend to earlier grids (autoregressive visual decoding).
    ///
    /// All inputs must share the batch dimension; mismatches panic.
    pub fn forward(
        &self,
        text: &TextInputs<B>,
        visual: &VisualInputs<B>,
        visual_ar: bool,
    ) -> BackboneOutput<B> {
        let [batch, _] = text.token_ids.dims();
        let [v_batch, n_grids, _] = visual.feats.dims();
        assert_eq!(
            batch, v_batch,
            "text batch {} does not match visual batch {}",
            batch, v_batch
        );

        let lang_mask = Some(padding_mask(text.attention_mask.clone()));
        let visn_mask = if visual_ar {
            Some(causal_mask::<B>(n_grids, &visual.feats.device()))
        } else {
            None
        };

        let mut lang = self
            .text_embeddings
            .forward(text.token_ids.clone(), text.token_type_ids.clone());
        let mut visn = self
            .visual_embeddings
            .forward(visual.feats.clone(), visual.pos.clone());

        for layer in &self.lang_layers {
            lang = layer.forward(lang, lang_mask.clone());
        }
        for layer in &self.visn_layers {
            visn = layer.forward(visn, visn_mask.clone());
        }
        for layer in &self.cross_layers {
            let (l, v) = layer.forward(lang, visn, lang_mask.clone(), visn_mask.clone());
            lang = l;
            visn = v;
        }

        let pooled = self.pooler.forward(lang.clone());

        BackboneOutput {
            language: lang,
            vision: visn,
            pooled,
        }
    }
}
