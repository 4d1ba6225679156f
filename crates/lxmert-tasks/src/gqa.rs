//! GQA visual question answering model

use burn::prelude::*;

use lxmert_backbone::{LxmertBackbone, LxmertConfig, TextInputs, VisualInputs};

use crate::heads::AnswerHead;

/// GQA model configuration
#[derive(Debug, Clone)]
pub struct GqaConfig {
    pub backbone: LxmertConfig,
    /// Size of the answer vocabulary
    pub num_answers: usize,
}

impl GqaConfig {
    /// Standard GQA setup over the base backbone
    pub fn base(num_answers: usize) -> Self {
        Self {
            backbone: LxmertConfig::base(),
            num_answers,
        }
    }
}

/// Classification output
#[derive(Debug, Clone)]
pub struct GqaOutput<B: Backend> {
    /// Answer logits `[batch, num_answers]`
    pub logits: Tensor<B, 2>,
}

/// Question answering classifier: backbone plus an answer head over the
/// pooled output.
///
/// No loss is computed here; classification loss is the trainer's concern.
#[derive(Module, Debug)]
pub struct GqaModel<B: Backend> {
    pub backbone: LxmertBackbone<B>,
    pub answer_head: AnswerHead<B>,
    pub num_answers: usize,
}

impl<B: Backend> GqaModel<B> {
    pub fn new(config: &GqaConfig, device: &B::Device) -> Self {
        Self {
            backbone: LxmertBackbone::new(&config.backbone, device),
            answer_head: AnswerHead::new(&config.backbone, config.num_answers, device),
            num_answers: config.num_answers,
        }
    }

    /// Classify a question over an image
    pub fn forward(&self, text: &TextInputs<B>, visual: &VisualInputs<B>) -> GqaOutput<B> {
        let batch = text.token_ids.dims()[0];

        let out = self.backbone.forward(text, visual, false);
        let logits = self.answer_head.forward(out.pooled);
        assert_eq!(logits.dims(), [batch, self.num_answers]);

        GqaOutput { logits }
    }
}
