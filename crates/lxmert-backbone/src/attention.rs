//! Attention primitives shared by the language, visual and cross-modality layers

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::Int;

use crate::config::LxmertConfig;

/// Large negative value used to suppress masked attention positions.
///
/// Finite (rather than -inf) so fully masked rows still produce a valid
/// softmax instead of NaN.
const MASK_VALUE: f32 = -10_000.0;

/// Convert an integer keep/drop mask `[batch, len]` (1: attend, 0: ignore)
/// into an additive mask `[batch, 1, 1, len]` for attention scores.
pub fn padding_mask<B: Backend>(mask: Tensor<B, 2, Int>) -> Tensor<B, 4> {
    let [batch, len] = mask.dims();
    let additive = (mask.float() - 1.0) * f64::from(-MASK_VALUE);
    additive.reshape([batch, 1, 1, len])
}

/// Causal mask `[1, 1, len, len]` forbidding attention to later positions.
///
/// Used by the visual stream when decoding grid codes autoregressively.
pub fn causal_mask<B: Backend>(len: usize, device: &B::Device) -> Tensor<B, 4> {
    let mut data = vec![0.0f32; len * len];
    for i in 0..len {
        for j in (i + 1)..len {
            data[i * len + j] = MASK_VALUE;
        }
    }
    Tensor::<B, 2>::from_data(TensorData::new(data, [len, len]), device)
        .reshape([1, 1, len, len])
}

/// Compute scaled dot-product attention over `[batch, heads, len, head_dim]`
/// tensors with an optional additive mask.
///
/// Uses numerically stable softmax (max-subtraction) for f16 compatibility.
pub fn scaled_dot_product_attention<B: Backend>(
    q: Tensor<B, 4>,
    k: Tensor<B, 4>,
    v: Tensor<B, 4>,
    mask: Option<Tensor<B, 4>>,
    head_dim: usize,
) -> Tensor<B, 4> {
    let scale = (head_dim as f64).powf(-0.5);
    let attn = q.matmul(k.transpose()) * scale;

    let attn = match mask {
        Some(m) => attn + m,
        None => attn,
    };

    // Stable softmax: subtract max before exp
    let attn_max = attn.clone().max_dim(3);
    let attn = (attn - attn_max).exp();
    let attn = attn.clone() / attn.clone().sum_dim(3);

    attn.matmul(v)
}

/// Multi-head attention over a query stream and a context stream.
///
/// Self-attention passes the same tensor as query and context; the
/// cross-modality layers pass the opposite stream as context.
#[derive(Module, Debug)]
pub struct MultiHeadAttention<B: Backend> {
    pub q_proj: Linear<B>,
    pub k_proj: Linear<B>,
    pub v_proj: Linear<B>,
    pub out_proj: Linear<B>,
    pub num_heads: usize,
    pub head_dim: usize,
}

impl<B: Backend> MultiHeadAttention<B> {
    /// Creates a new multi-head attention layer
    pub fn new(config: &LxmertConfig, device: &B::Device) -> Self {
        let hidden = config.hidden_size;

        Self {
            q_proj: LinearConfig::new(hidden, hidden).init(device),
            k_proj: LinearConfig::new(hidden, hidden).init(device),
            v_proj: LinearConfig::new(hidden, hidden).init(device),
            out_proj: LinearConfig::new(hidden, hidden).init(device),
            num_heads: config.num_heads,
            head_dim: config.head_dim(),
        }
    }

    /// Attend from `x` over `context`.
    ///
    /// `x`: `[batch, q_len, hidden]`, `context`: `[batch, kv_len, hidden]`.
    /// The mask is additive over the context positions.
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        context: Tensor<B, 3>,
        mask: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 3> {
        let [batch, q_len, _] = x.dims();
        let [_, kv_len, _] = context.dims();

        let q = self.q_proj.forward(x);
        let k = self.k_proj.forward(context.clone());
        let v = self.v_proj.forward(context);

        // [batch, len, hidden] -> [batch, heads, len, head_dim]
        let q = q
            .reshape([batch, q_len, self.num_heads, self.head_dim])
            .swap_dims(1, 2);
        let k = k
            .reshape([batch, kv_len, self.num_heads, self.head_dim])
            .swap_dims(1, 2);
        let v = v
            .reshape([batch, kv_len, self.num_heads, self.head_dim])
            .swap_dims(1, 2);

        let out = scaled_dot_product_attention(q, k, v, mask, self.head_dim);

        let out = out
            .swap_dims(1, 2)
            .reshape([batch, q_len, self.num_heads * self.head_dim]);

        self.out_proj.forward(out)
    }
}
