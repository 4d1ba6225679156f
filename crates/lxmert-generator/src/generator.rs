//! Convolutional decoder from code grids to RGB images

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{GroupNorm, GroupNormConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::silu;

/// Generator configuration
#[derive(Debug, Clone)]
pub struct GridGeneratorConfig {
    /// Channels of the input code grid (the codebook embedding dimension)
    pub code_dim: usize,
    /// Output image channels (3 for RGB)
    pub out_channels: usize,
    /// Base channel multiplier
    pub base_channels: usize,
    /// Channel multipliers per stage, highest first; every stage except the
    /// last doubles the spatial resolution
    pub channel_mult: Vec<usize>,
    /// Residual blocks per stage
    pub num_res_blocks: usize,
    /// Groups for group normalization
    pub norm_groups: usize,
}

impl GridGeneratorConfig {
    /// Default generator for a codebook of the given embedding dimension.
    ///
    /// Four stages with three upsamples: an 8x8 grid becomes a 64x64 image.
    pub fn new(code_dim: usize) -> Self {
        Self {
            code_dim,
            out_channels: 3,
            base_channels: 64,
            channel_mult: vec![8, 4, 2, 1],
            num_res_blocks: 2,
            norm_groups: 8,
        }
    }

    /// Number of 2x upsampling steps
    pub fn upsample_steps(&self) -> usize {
        self.channel_mult.len().saturating_sub(1)
    }

    /// Side length of the generated image for a given grid size
    pub fn output_size(&self, grid_size: usize) -> usize {
        grid_size << self.upsample_steps()
    }
}

/// Decoder from `[batch, code_dim, grid, grid]` code maps to
/// `[batch, 3, S, S]` RGB images with values in `[-1, 1]`.
#[derive(Module, Debug)]
pub struct GridGenerator<B: Backend> {
    pub conv_in: Conv2d<B>,
    pub stages: Vec<UpsampleStage<B>>,
    pub norm_out: GroupNorm<B>,
    pub conv_out: Conv2d<B>,
    /// Enable debug output
    pub debug: bool,
}

impl<B: Backend> GridGenerator<B> {
    /// Creates a new generator
    pub fn new(config: &GridGeneratorConfig, device: &B::Device) -> Self {
        let ch = config.base_channels;
        let groups = config.norm_groups;

        let block_in = ch * config.channel_mult[0];
        let conv_in = Conv2dConfig::new([config.code_dim, block_in], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let mut stages = Vec::new();
        let mut in_ch = block_in;
        let last = config.channel_mult.len() - 1;

        for (i, &mult) in config.channel_mult.iter().enumerate() {
            let out_ch = ch * mult;
            // No upsample on the final stage
            stages.push(UpsampleStage::new(
                in_ch,
                out_ch,
                config.num_res_blocks,
                i < last,
                groups,
                device,
            ));
            in_ch = out_ch;
        }

        let norm_out = GroupNormConfig::new(groups, in_ch).init(device);
        let conv_out = Conv2dConfig::new([in_ch, config.out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        Self {
            conv_in,
            stages,
            norm_out,
            conv_out,
            debug: false,
        }
    }

    /// Enable debug output
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Decode a code grid to an image.
    ///
    /// Input: `[batch, code_dim, grid, grid]`
    /// Output: `[batch, 3, grid * 2^steps, grid * 2^steps]` in `[-1, 1]`
    pub fn forward(&self, codes: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.debug {
            eprintln!("[generator] input code grid: {:?}", codes.dims());
        }

        let mut h = self.conv_in.forward(codes);

        for (i, stage) in self.stages.iter().enumerate() {
            h = stage.forward(h);
            if self.debug {
                eprintln!("[generator] stage {}: {:?}", i, h.dims());
            }
        }

        let h = silu(self.norm_out.forward(h));
        self.conv_out.forward(h).tanh()
    }
}

/// One generator stage: residual blocks followed by optional 2x upsampling
#[derive(Module, Debug)]
pub struct UpsampleStage<B: Backend> {
    pub res_blocks: Vec<ResidualBlock<B>>,
    pub upsample: Option<Conv2d<B>>,
}

impl<B: Backend> UpsampleStage<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        num_blocks: usize,
        upsample: bool,
        groups: usize,
        device: &B::Device,
    ) -> Self {
        let mut res_blocks = Vec::new();

        // First block handles the channel change
        res_blocks.push(ResidualBlock::new(in_channels, out_channels, groups, device));
        for _ in 1..num_blocks {
            res_blocks.push(ResidualBlock::new(out_channels, out_channels, groups, device));
        }

        let upsample = upsample.then(|| {
            Conv2dConfig::new([out_channels, out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        });

        Self {
            res_blocks,
            upsample,
        }
    }

    pub fn forward(&self, mut x: Tensor<B, 4>) -> Tensor<B, 4> {
        use burn::tensor::module::interpolate;
        use burn::tensor::ops::{InterpolateMode, InterpolateOptions};

        for block in &self.res_blocks {
            x = block.forward(x);
        }

        match &self.upsample {
            Some(conv) => {
                let [_b, _c, h, w] = x.dims();
                let x = interpolate(
                    x,
                    [h * 2, w * 2],
                    InterpolateOptions::new(InterpolateMode::Nearest),
                );
                conv.forward(x)
            }
            None => x,
        }
    }
}

/// Residual block with group norm, SiLU and an optional channel-matching skip
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    pub norm1: GroupNorm<B>,
    pub conv1: Conv2d<B>,
    pub norm2: GroupNorm<B>,
    pub conv2: Conv2d<B>,
    pub skip_conv: Option<Conv2d<B>>,
}

impl<B: Backend> ResidualBlock<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        groups: usize,
        device: &B::Device,
    ) -> Self {
        let norm1 = GroupNormConfig::new(groups, in_channels).init(device);
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let norm2 = GroupNormConfig::new(groups, out_channels).init(device);
        let conv2 = Conv2dConfig::new([out_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let skip_conv = (in_channels != out_channels)
            .then(|| Conv2dConfig::new([in_channels, out_channels], [1, 1]).init(device));

        Self {
            norm1,
            conv1,
            norm2,
            conv2,
            skip_conv,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = match &self.skip_conv {
            Some(conv) => conv.forward(x.clone()),
            None => x.clone(),
        };

        let h = self.conv1.forward(silu(self.norm1.forward(x)));
        let h = self.conv2.forward(silu(self.norm2.forward(h)));

        h + residual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn tiny_config() -> GridGeneratorConfig {
        GridGeneratorConfig {
            code_dim: 16,
            out_channels: 3,
            base_channels: 8,
            channel_mult: vec![2, 1],
            num_res_blocks: 1,
            norm_groups: 4,
        }
    }

    #[test]
    fn test_config_geometry() {
        let config = GridGeneratorConfig::new(256);
        assert_eq!(config.upsample_steps(), 3);
        assert_eq!(config.output_size(8), 64);
    }

    #[test]
    fn test_generator_output_shape() {
        let device = Default::default();
        let config = tiny_config();
        let generator = GridGenerator::<TestBackend>::new(&config, &device);

        let codes = Tensor::zeros([2, 16, 4, 4], &device);
        let img = generator.forward(codes);
        assert_eq!(img.dims(), [2, 3, 8, 8]);
    }

    #[test]
    fn test_generator_output_range() {
        let device = Default::default();
        let config = tiny_config();
        let generator = GridGenerator::<TestBackend>::new(&config, &device);

        let codes = Tensor::ones([1, 16, 4, 4], &device) * 5.0;
        let img = generator.forward(codes);

        // tanh output stays in [-1, 1]
        let data: Vec<f32> = img.into_data().convert::<f32>().to_vec().unwrap();
        assert!(data.iter().all(|v| (-1.0..=1.0).contains(v)));
    }
}
