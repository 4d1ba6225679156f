//! X-LXMERT vision-language models.
//!
//! Umbrella crate re-exporting the workspace:
//!
//! - [`backbone`] - the cross-modality transformer encoder
//! - [`generator`] - the grid-code image generator and image output helpers
//! - [`tasks`] - the GQA classifier and the masked multimodal pretraining model

pub use lxmert_backbone as backbone;
pub use lxmert_generator as generator;
pub use lxmert_tasks as tasks;

pub use lxmert_backbone::{
    BackboneOutput, LxmertBackbone, LxmertConfig, TextInputs, VisualInputs,
};
pub use lxmert_generator::{GridGenerator, GridGeneratorConfig};
pub use lxmert_tasks::{
    load_centroids, CodebookEmbedding, DecoderCodes, GqaConfig, GqaModel, GqaOutput,
    PretrainConfig, PretrainModel, PretrainTask, VisMaskLabels, VisMaskOutput, WordMaskOutput,
};
