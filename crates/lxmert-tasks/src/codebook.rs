//! Frozen visual codebook
//!
//! The codebook is a fixed table of cluster centroids discretizing image
//! grid features. It is loaded once from precomputed centroids and never
//! trained: the table is stored as a constant tensor, so no gradient ever
//! flows into it.

use std::fs::File;
use std::path::Path;

use burn::prelude::*;
use burn::tensor::Int;
use half::f16;
use memmap2::MmapOptions;
use safetensors::{Dtype, SafeTensors};
use thiserror::Error;

/// Tensor name expected in a centroids safetensors file
pub const CENTROIDS_KEY: &str = "centroids";

/// Errors raised when loading or installing a codebook
#[derive(Error, Debug)]
pub enum CodebookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Safetensors error: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),

    #[error("Tensor not found: {0}")]
    TensorNotFound(String),

    #[error("Unsupported dtype: {0:?}")]
    UnsupportedDtype(Dtype),

    #[error("Centroid geometry mismatch: expected [{expected_codes}, {expected_dim}], got {actual:?}")]
    GeometryMismatch {
        expected_codes: usize,
        expected_dim: usize,
        actual: Vec<usize>,
    },
}

/// Frozen embedding table over visual cluster centroids.
///
/// The `centroids` field is a plain (non-`Param`) tensor: burn treats it as a
/// module constant, which is exactly the "frozen embedding" contract.
#[derive(Module, Debug)]
pub struct CodebookEmbedding<B: Backend> {
    /// `[n_codes, dim]` centroid table
    pub centroids: Tensor<B, 2>,
}

impl<B: Backend> CodebookEmbedding<B> {
    /// Wrap a `[n_codes, dim]` centroid table
    pub fn new(centroids: Tensor<B, 2>) -> Self {
        Self { centroids }
    }

    /// Number of codes in the table
    pub fn n_codes(&self) -> usize {
        self.centroids.dims()[0]
    }

    /// Embedding dimension of each code
    pub fn dim(&self) -> usize {
        self.centroids.dims()[1]
    }

    /// Look up code ids `[batch, n]` in the table, giving `[batch, n, dim]`
    pub fn lookup(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch, n] = ids.dims();
        let dim = self.dim();

        let flat: Tensor<B, 1, Int> = ids.reshape([batch * n]);
        self.centroids.clone().select(0, flat).reshape([batch, n, dim])
    }

    /// Look up code ids and arrange them as a spatial code grid
    /// `[batch, dim, grid_size, grid_size]` for the generator.
    pub fn lookup_grid(&self, ids: Tensor<B, 2, Int>, grid_size: usize) -> Tensor<B, 4> {
        let [batch, n] = ids.dims();
        assert_eq!(
            n,
            grid_size * grid_size,
            "{} codes cannot fill a {}x{} grid",
            n,
            grid_size,
            grid_size
        );

        // [batch, n, dim] -> [batch, dim, n] -> [batch, dim, g, g]
        self.lookup(ids)
            .swap_dims(1, 2)
            .reshape([batch, self.dim(), grid_size, grid_size])
    }
}

/// Load a `[n_codes, dim]` centroid table from a safetensors file.
///
/// The file must contain a tensor named `centroids` in f32 or f16.
pub fn load_centroids<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<Tensor<B, 2>, CodebookError> {
    let file = File::open(path)?;
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    let st = SafeTensors::deserialize(&mmap)?;

    let view = st
        .tensor(CENTROIDS_KEY)
        .map_err(|_| CodebookError::TensorNotFound(CENTROIDS_KEY.to_string()))?;

    let shape = view.shape().to_vec();
    if shape.len() != 2 {
        return Err(CodebookError::GeometryMismatch {
            expected_codes: 0,
            expected_dim: 0,
            actual: shape,
        });
    }

    let floats: Vec<f32> = match view.dtype() {
        Dtype::F32 => view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        Dtype::F16 => view
            .data()
            .chunks_exact(2)
            .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
        other => return Err(CodebookError::UnsupportedDtype(other)),
    };

    let data = TensorData::new(floats, [shape[0], shape[1]]);
    Ok(Tensor::from_data(data, device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn toy_codebook(device: &<TestBackend as Backend>::Device) -> CodebookEmbedding<TestBackend> {
        // 4 codes of dimension 2: code i is [i, 10 + i]
        let centroids = Tensor::from_floats(
            [[0.0, 10.0], [1.0, 11.0], [2.0, 12.0], [3.0, 13.0]],
            device,
        );
        CodebookEmbedding::new(centroids)
    }

    #[test]
    fn test_lookup_rows() {
        let device = Default::default();
        let codebook = toy_codebook(&device);

        let ids = Tensor::<TestBackend, 2, Int>::from_ints([[3, 0], [1, 1]], &device);
        let codes = codebook.lookup(ids);
        assert_eq!(codes.dims(), [2, 2, 2]);

        let data: Vec<f32> = codes.into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(&data[0..2], &[3.0, 13.0]);
        assert_eq!(&data[2..4], &[0.0, 10.0]);
        assert_eq!(&data[4..6], &[1.0, 11.0]);
    }

    #[test]
    fn test_lookup_grid_preserves_elements() {
        let device = Default::default();
        let codebook = toy_codebook(&device);

        let ids = Tensor::<TestBackend, 2, Int>::zeros([2, 4], &device);
        let grid = codebook.lookup_grid(ids, 2);

        // batch * dim * grid * grid elements survive the reshape
        assert_eq!(grid.dims(), [2, 2, 2, 2]);
        assert_eq!(grid.dims().iter().product::<usize>(), 2 * 2 * 2 * 2);
    }

    #[test]
    #[should_panic(expected = "grid")]
    fn test_lookup_grid_wrong_count_panics() {
        let device = Default::default();
        let codebook = toy_codebook(&device);

        let ids = Tensor::<TestBackend, 2, Int>::zeros([1, 3], &device);
        codebook.lookup_grid(ids, 2);
    }
}
