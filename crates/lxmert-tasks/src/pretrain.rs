//! Masked multimodal pretraining model
//!
//! Three pretraining tasks over one backbone:
//!
//! - **word mask**: predict masked text tokens from the joint representation
//! - **matched**: classify whether the text describes the image
//! - **visual mask**: predict the codebook id of masked grid cells and
//!   regenerate the full image from grid codes through the generator
//!
//! Each task is a typed method with a typed output, so the set of produced
//! tensors is fixed at compile time instead of varying by string key.

use burn::module::Param;
use burn::prelude::*;
use burn::tensor::Int;
use thiserror::Error;

use lxmert_backbone::{LxmertBackbone, LxmertConfig, TextInputs, VisualInputs};
use lxmert_generator::{GridGenerator, GridGeneratorConfig};

use crate::codebook::{CodebookEmbedding, CodebookError};
use crate::heads::{LanguageHead, MatchedHead, VisualHead};
use crate::loss::masked_cross_entropy;

/// Pretraining task selector, used by data pipelines that sample one task
/// per batch and dispatch to the matching method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PretrainTask {
    WordMask,
    VisMask,
    Matched,
}

/// Errors raised by the pretraining model
#[derive(Error, Debug)]
pub enum PretrainError {
    #[error("visual codebook not loaded; call set_codebook before the visual-mask task")]
    CodebookNotSet,
}

/// Pretraining model configuration
#[derive(Debug, Clone)]
pub struct PretrainConfig {
    pub backbone: LxmertConfig,
    /// Number of grid cells per image
    pub n_grids: usize,
    /// Side length of the grid (`n_grids == grid_size * grid_size`)
    pub grid_size: usize,
    /// Number of visual codebook entries
    pub n_codebook: usize,
    /// Embedding dimension of each codebook entry; must equal the backbone's
    /// `visual_feat_dim`, since grid features are codebook embeddings
    pub codebook_dim: usize,
    pub generator: GridGeneratorConfig,
}

impl PretrainConfig {
    /// Standard X-LXMERT pretraining setup: 8x8 grid, 10k-entry codebook
    pub fn base() -> Self {
        let backbone = LxmertConfig::base();
        let codebook_dim = backbone.visual_feat_dim;
        Self {
            backbone,
            n_grids: 64,
            grid_size: 8,
            n_codebook: 10_000,
            codebook_dim,
            generator: GridGeneratorConfig::new(codebook_dim),
        }
    }
}

/// Word-mask task output
#[derive(Debug, Clone)]
pub enum WordMaskOutput<B: Backend> {
    /// Scalar masked language modeling loss
    Loss(Tensor<B, 1>),
    /// Raw vocabulary logits `[batch, text_len, vocab_size]`
    Logits(Tensor<B, 3>),
}

/// Source of the decoder input codes during visual-mask training
#[derive(Debug, Clone)]
pub enum DecoderCodes<B: Backend> {
    /// Feed ground-truth code ids `[batch, n_grids]` (teacher forcing)
    TeacherForcing(Tensor<B, 2, Int>),
    /// Feed the model's own argmax predictions (input feeding)
    Predicted,
}

/// Labels for visual-mask training
#[derive(Debug, Clone)]
pub struct VisMaskLabels<B: Backend> {
    /// Codebook class per grid cell `[batch, n_grids]`, `-1` to exclude
    pub code_labels: Tensor<B, 2, Int>,
    pub decoder_codes: DecoderCodes<B>,
}

/// Visual-mask task output
#[derive(Debug, Clone)]
pub enum VisMaskOutput<B: Backend> {
    /// Training: masked code classification loss plus the image regenerated
    /// from the decoder input codes
    Train {
        code_loss: Tensor<B, 1>,
        fake_img: Tensor<B, 4>,
    },
    /// Inference: everything a sampler needs
    Infer {
        /// `[batch, n_grids, n_codebook]`
        code_logits: Tensor<B, 3>,
        /// Argmax over the class dimension `[batch, n_grids]`
        pred_code_ids: Tensor<B, 2, Int>,
        /// Frozen codebook embeddings of the predictions `[batch, n_grids, codebook_dim]`
        pred_codes: Tensor<B, 3>,
        /// Image generated from the predicted codes
        fake_img: Tensor<B, 4>,
        /// Regressed grid features `[batch, n_grids, visual_feat_dim]`
        regressed_feats: Tensor<B, 3>,
    },
}

/// Masked multimodal pretraining model.
///
/// Owns the backbone, the three task heads, the learned grid mask feature,
/// the frozen codebook (once loaded) and the image generator.
#[derive(Module, Debug)]
pub struct PretrainModel<B: Backend> {
    pub backbone: LxmertBackbone<B>,
    pub lang_head: LanguageHead<B>,
    pub matched_head: MatchedHead<B>,
    pub visual_head: VisualHead<B>,
    /// Learned feature substituted at masked grid positions
    pub mask_feat: Param<Tensor<B, 1>>,
    /// Frozen centroid table; `None` until [`Self::set_codebook`]
    pub codebook: Option<CodebookEmbedding<B>>,
    pub generator: GridGenerator<B>,
    pub n_grids: usize,
    pub grid_size: usize,
    pub n_codebook: usize,
    pub codebook_dim: usize,
    pub vocab_size: usize,
}

impl<B: Backend> PretrainModel<B> {
    pub fn new(config: &PretrainConfig, device: &B::Device) -> Self {
        assert_eq!(
            config.n_grids,
            config.grid_size * config.grid_size,
            "n_grids {} does not match grid_size {}",
            config.n_grids,
            config.grid_size
        );
        assert_eq!(
            config.codebook_dim, config.backbone.visual_feat_dim,
            "codebook_dim must equal the backbone visual_feat_dim"
        );
        assert_eq!(
            config.generator.code_dim, config.codebook_dim,
            "generator code_dim must equal codebook_dim"
        );

        Self {
            backbone: LxmertBackbone::new(&config.backbone, device),
            lang_head: LanguageHead::new(&config.backbone, device),
            matched_head: MatchedHead::new(&config.backbone, device),
            visual_head: VisualHead::new(&config.backbone, config.n_codebook, device),
            mask_feat: Param::from_tensor(Tensor::zeros([config.codebook_dim], device)),
            codebook: None,
            generator: GridGenerator::new(&config.generator, device),
            n_grids: config.n_grids,
            grid_size: config.grid_size,
            n_codebook: config.n_codebook,
            codebook_dim: config.codebook_dim,
            vocab_size: config.backbone.vocab_size,
        }
    }

    /// Install the frozen visual codebook from a `[n_codebook, codebook_dim]`
    /// centroid table.
    ///
    /// The mask feature is untouched: it is created once at construction and
    /// trained like any other parameter.
    pub fn set_codebook(&mut self, centroids: Tensor<B, 2>) -> Result<(), CodebookError> {
        let dims = centroids.dims();
        if dims != [self.n_codebook, self.codebook_dim] {
            return Err(CodebookError::GeometryMismatch {
                expected_codes: self.n_codebook,
                expected_dim: self.codebook_dim,
                actual: dims.to_vec(),
            });
        }

        self.codebook = Some(CodebookEmbedding::new(centroids));
        Ok(())
    }

    /// Replace grid features at positions where `grid_mask == 1` with the
    /// learned mask feature; other positions pass through unchanged.
    pub fn apply_grid_mask(
        &self,
        feats: Tensor<B, 3>,
        grid_mask: &Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch, n, dim] = feats.dims();
        assert_eq!(
            grid_mask.dims(),
            [batch, n],
            "grid mask shape {:?} does not match features [{}, {}]",
            grid_mask.dims(),
            batch,
            n
        );

        let mask = grid_mask
            .clone()
            .equal_elem(1)
            .unsqueeze_dim::<3>(2)
            .expand([batch, n, dim]);
        let fill: Tensor<B, 3> = self
            .mask_feat
            .val()
            .reshape([1, 1, dim])
            .expand([batch, n, dim]);

        feats.mask_where(mask, fill)
    }

    /// Masked language modeling.
    ///
    /// With labels (`-1` excluded) returns the scalar word loss; without,
    /// the raw vocabulary logits.
    pub fn word_mask(
        &self,
        text: &TextInputs<B>,
        visual: &VisualInputs<B>,
        labels: Option<Tensor<B, 2, Int>>,
    ) -> WordMaskOutput<B> {
        let [batch, text_len] = text.token_ids.dims();

        let out = self.backbone.forward(text, visual, false);
        let logits = self.lang_head.forward(out.language);
        assert_eq!(logits.dims(), [batch, text_len, self.vocab_size]);

        match labels {
            Some(labels) => {
                let loss = masked_cross_entropy(
                    logits.reshape([batch * text_len, self.vocab_size]),
                    labels.reshape([batch * text_len]),
                );
                WordMaskOutput::Loss(loss)
            }
            None => WordMaskOutput::Logits(logits),
        }
    }

    /// Image-text matching loss.
    ///
    /// Labels `[batch]` are 1 for a matching pair, 0 otherwise. This task is
    /// loss-only, so labels are required by the signature.
    pub fn matched(
        &self,
        text: &TextInputs<B>,
        visual: &VisualInputs<B>,
        labels: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        let batch = text.token_ids.dims()[0];
        assert_eq!(labels.dims(), [batch]);

        let out = self.backbone.forward(text, visual, false);
        let logits = self.matched_head.forward(out.pooled);

        masked_cross_entropy(logits, labels)
    }

    /// Masked grid-code prediction and image regeneration.
    ///
    /// Grid features flagged by `grid_mask` are replaced with the learned
    /// mask feature before the backbone runs. With labels, returns the code
    /// classification loss and the image decoded from the teacher-forced (or,
    /// with [`DecoderCodes::Predicted`], self-predicted) codes. Without
    /// labels, returns logits, predictions, their embeddings, the generated
    /// image and the regressed features.
    ///
    /// `visual_ar` restricts visual self-attention to earlier grid positions.
    pub fn vis_mask(
        &self,
        text: &TextInputs<B>,
        visual: &VisualInputs<B>,
        grid_mask: &Tensor<B, 2, Int>,
        labels: Option<VisMaskLabels<B>>,
        visual_ar: bool,
    ) -> Result<VisMaskOutput<B>, PretrainError> {
        let [batch, n, _] = visual.feats.dims();
        assert_eq!(
            n, self.n_grids,
            "expected {} grid cells, got {}",
            self.n_grids, n
        );

        let codebook = self.codebook.as_ref().ok_or(PretrainError::CodebookNotSet)?;

        let masked = VisualInputs {
            feats: self.apply_grid_mask(visual.feats.clone(), grid_mask),
            pos: visual.pos.clone(),
        };

        let out = self.backbone.forward(text, &masked, visual_ar);

        let code_logits = self.visual_head.code_logits(out.vision.clone());
        assert_eq!(code_logits.dims(), [batch, self.n_grids, self.n_codebook]);

        match labels {
            Some(VisMaskLabels {
                code_labels,
                decoder_codes,
            }) => {
                assert_eq!(code_labels.dims(), [batch, self.n_grids]);

                let code_loss = masked_cross_entropy(
                    code_logits.clone().reshape([batch * self.n_grids, self.n_codebook]),
                    code_labels.reshape([batch * self.n_grids]),
                );

                let input_code_ids = match decoder_codes {
                    DecoderCodes::TeacherForcing(ids) => {
                        assert_eq!(ids.dims(), [batch, self.n_grids]);
                        ids
                    }
                    DecoderCodes::Predicted => self.predict_code_ids(code_logits),
                };

                let code_grid = codebook.lookup_grid(input_code_ids, self.grid_size);
                let fake_img = self.generator.forward(code_grid);

                Ok(VisMaskOutput::Train {
                    code_loss,
                    fake_img,
                })
            }
            None => {
                let regressed_feats = self.visual_head.regressed_feats(out.vision);

                let pred_code_ids = self.predict_code_ids(code_logits.clone());
                let pred_codes = codebook.lookup(pred_code_ids.clone());
                assert_eq!(
                    pred_codes.dims(),
                    [batch, self.n_grids, self.codebook_dim]
                );

                let code_grid = codebook.lookup_grid(pred_code_ids.clone(), self.grid_size);
                let fake_img = self.generator.forward(code_grid);

                Ok(VisMaskOutput::Infer {
                    code_logits,
                    pred_code_ids,
                    pred_codes,
                    fake_img,
                    regressed_feats,
                })
            }
        }
    }

    /// Argmax over the class dimension of `[batch, n_grids, n_codebook]` logits
    fn predict_code_ids(&self, code_logits: Tensor<B, 3>) -> Tensor<B, 2, Int> {
        code_logits.argmax(2).squeeze(2)
    }
}
