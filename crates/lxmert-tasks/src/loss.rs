//! Cross-entropy with ignore-index semantics

use burn::prelude::*;
use burn::tensor::{activation, Int};

/// Sentinel label excluded from loss aggregation
pub const IGNORE_INDEX: i64 = -1;

/// Cross-entropy over `[n, classes]` logits, averaged over the positions
/// whose target is not `-1`.
///
/// Positions labeled `-1` contribute exactly zero regardless of their logits.
/// If every position is ignored the result is a zero scalar rather than NaN.
///
/// Returns a one-element tensor (scalar loss).
pub fn masked_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    let [n, _classes] = logits.dims();
    assert_eq!(
        n,
        targets.dims()[0],
        "logits rows {} do not match target count {}",
        n,
        targets.dims()[0]
    );

    let ignored = targets.clone().equal_elem(IGNORE_INDEX);
    // Sentinels become class 0 so the gather stays in bounds; their
    // contribution is zeroed below.
    let safe_targets = targets.mask_fill(ignored.clone(), 0);

    let log_probs = activation::log_softmax(logits, 1);
    let gathered = log_probs.gather(1, safe_targets.unsqueeze_dim(1));
    let nll: Tensor<B, 1> = gathered.squeeze(1).neg();

    let valid = ignored.bool_not().float();
    let total = (nll * valid.clone()).sum();

    // clamp keeps the all-ignored case at 0/1 = 0 instead of 0/0
    total / valid.sum().clamp_min(1.0)
}
