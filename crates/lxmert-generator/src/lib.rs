//! Grid-Code Image Generator
//!
//! Decodes a spatial grid of visual codebook embeddings into an RGB image.
//! This is the generator half of the X-LXMERT image generation pipeline: the
//! pretraining model predicts a discrete code per grid cell, looks the codes
//! up in the frozen codebook, reshapes them into a
//! `[batch, codebook_dim, grid, grid]` map, and hands that map to the
//! [`GridGenerator`] here.
//!
//! # Example
//!
//! ```ignore
//! use lxmert_generator::{GridGenerator, GridGeneratorConfig};
//!
//! let config = GridGeneratorConfig::new(256);
//! let generator = GridGenerator::<Backend>::new(&config, &device);
//!
//! // [batch, 256, 8, 8] codes -> [batch, 3, 64, 64] image in [-1, 1]
//! let image = generator.forward(code_grid);
//! ```

pub mod generator;
pub mod image_io;

pub use generator::{GridGenerator, GridGeneratorConfig, ResidualBlock, UpsampleStage};
pub use image_io::{save_rgb8, tensor_to_rgb8};
