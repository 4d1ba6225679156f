//! Task Models on the LXMERT Backbone
//!
//! Two model wrappers built on [`lxmert_backbone`]:
//!
//! - [`GqaModel`] - visual question answering classifier: pooled backbone
//!   output through an answer head, producing `[batch, num_answers]` logits.
//! - [`PretrainModel`] - masked multimodal pretraining: masked language
//!   modeling over text, image-text matching over the pooled output, and
//!   masked grid-code prediction with image regeneration through the
//!   [`lxmert_generator::GridGenerator`].
//!
//! Every loss uses `-1` as the ignore sentinel: positions labeled `-1`
//! contribute nothing to the reduction.
//!
//! # Example
//!
//! ```ignore
//! use lxmert_tasks::{PretrainConfig, PretrainModel, VisMaskLabels, DecoderCodes};
//!
//! let config = PretrainConfig::base();
//! let mut model = PretrainModel::<Backend>::new(&config, &device);
//! model.set_codebook(centroids)?;
//!
//! let labels = VisMaskLabels {
//!     code_labels,
//!     decoder_codes: DecoderCodes::TeacherForcing(input_code_ids),
//! };
//! let out = model.vis_mask(&text, &visual, &grid_mask, Some(labels), false)?;
//! ```

pub mod codebook;
pub mod gqa;
pub mod heads;
pub mod loss;
pub mod pretrain;

pub use codebook::{load_centroids, CodebookEmbedding, CodebookError};
pub use gqa::{GqaConfig, GqaModel, GqaOutput};
pub use heads::{AnswerHead, LanguageHead, MatchedHead, VisualHead};
pub use loss::{masked_cross_entropy, IGNORE_INDEX};
pub use pretrain::{
    DecoderCodes, PretrainConfig, PretrainError, PretrainModel, PretrainTask, VisMaskLabels,
    VisMaskOutput, WordMaskOutput,
};
