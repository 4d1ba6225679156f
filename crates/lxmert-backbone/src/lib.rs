//! LXMERT Cross-Modality Backbone
//!
//! This crate provides the two-stream vision-language transformer that the
//! task models are built on: a language encoder, a visual (grid feature)
//! encoder, and a stack of cross-modality layers fusing the two.
//!
//! # Outputs
//!
//! The backbone produces three tensors per forward pass:
//!
//! - per-token language hidden states `[batch, text_len, hidden]`
//! - per-grid visual hidden states `[batch, n_grids, hidden]`
//! - a pooled summary vector `[batch, hidden]` from the `[CLS]` position
//!
//! # Example
//!
//! ```ignore
//! use lxmert_backbone::{LxmertBackbone, LxmertConfig, TextInputs, VisualInputs};
//!
//! let config = LxmertConfig::base();
//! let backbone = LxmertBackbone::<Backend>::new(&config, &device);
//!
//! let out = backbone.forward(&text, &visual, false);
//! let pooled = out.pooled; // [batch, hidden]
//! ```

pub mod attention;
pub mod config;
pub mod embeddings;
pub mod encoder;
pub mod model;

pub use attention::{
    causal_mask, padding_mask, scaled_dot_product_attention, MultiHeadAttention,
};
pub use config::{ConfigError, LxmertConfig};
pub use encoder::{CrossModalityBlock, FeedForward, TransformerBlock};
pub use model::{BackboneOutput, LxmertBackbone, Pooler, TextInputs, VisualInputs};
