//! End-to-end pretraining task tests on a small model.
//!
//! Geometry: batch 2, 4x4 grid (16 cells), 10k-entry codebook of
//! dimension 256, which is also the backbone's visual feature dimension.

use burn::prelude::*;
use burn::tensor::Int;
use burn_ndarray::NdArray;

use lxmert_backbone::{LxmertConfig, TextInputs, VisualInputs};
use lxmert_generator::GridGeneratorConfig;
use lxmert_tasks::{
    DecoderCodes, PretrainConfig, PretrainModel, PretrainTask, VisMaskLabels, VisMaskOutput,
    WordMaskOutput,
};

type TestBackend = NdArray<f32>;
type TestDevice = <TestBackend as Backend>::Device;

const N_GRIDS: usize = 16;
const GRID_SIZE: usize = 4;
const N_CODEBOOK: usize = 10_000;
const CODEBOOK_DIM: usize = 256;

fn small_config() -> PretrainConfig {
    PretrainConfig {
        backbone: LxmertConfig {
            vocab_size: 120,
            hidden_size: 32,
            type_vocab_size: 2,
            max_text_length: 8,
            visual_feat_dim: CODEBOOK_DIM,
            visual_pos_dim: 4,
            num_heads: 4,
            intermediate_size: 64,
            l_layers: 1,
            x_layers: 1,
            r_layers: 1,
            dropout: 0.0,
            initializer_range: 0.02,
        },
        n_grids: N_GRIDS,
        grid_size: GRID_SIZE,
        n_codebook: N_CODEBOOK,
        codebook_dim: CODEBOOK_DIM,
        generator: GridGeneratorConfig {
            code_dim: CODEBOOK_DIM,
            out_channels: 3,
            base_channels: 8,
            channel_mult: vec![2, 1],
            num_res_blocks: 1,
            norm_groups: 4,
        },
    }
}

fn small_model(device: &TestDevice) -> PretrainModel<TestBackend> {
    let mut model = PretrainModel::new(&small_config(), device);
    let floats: Vec<f32> = (0..N_CODEBOOK * CODEBOOK_DIM)
        .map(|i| (i % 97) as f32 * 0.01)
        .collect();
    let centroids = Tensor::from_data(TensorData::new(floats, [N_CODEBOOK, CODEBOOK_DIM]), device);
    model.set_codebook(centroids).unwrap();
    model
}

fn inputs(device: &TestDevice) -> (TextInputs<TestBackend>, VisualInputs<TestBackend>) {
    let text = TextInputs {
        token_ids: Tensor::ones([2, 8], device),
        token_type_ids: Tensor::zeros([2, 8], device),
        attention_mask: Tensor::ones([2, 8], device),
    };
    let visual = VisualInputs {
        feats: Tensor::ones([2, N_GRIDS, CODEBOOK_DIM], device),
        pos: Tensor::zeros([2, N_GRIDS, 4], device),
    };
    (text, visual)
}

#[test]
fn word_mask_returns_loss_with_labels_and_logits_without() {
    let device = Default::default();
    let model = small_model(&device);
    let (text, visual) = inputs(&device);

    // Two supervised positions, everything else excluded
    let labels = Tensor::<TestBackend, 2, Int>::from_ints(
        [
            [5, -1, -1, -1, -1, -1, -1, -1],
            [-1, -1, 7, -1, -1, -1, -1, -1],
        ],
        &device,
    );
    let out = model.word_mask(&text, &visual, Some(labels));
    let loss = match out {
        WordMaskOutput::Loss(loss) => loss.into_scalar(),
        WordMaskOutput::Logits(_) => panic!("expected a loss"),
    };
    assert!(loss.is_finite());
    assert!(loss >= 0.0);

    let out = model.word_mask(&text, &visual, None);
    match out {
        WordMaskOutput::Logits(logits) => assert_eq!(logits.dims(), [2, 8, 120]),
        WordMaskOutput::Loss(_) => panic!("expected logits"),
    }
}

#[test]
fn word_mask_all_ignored_labels_give_zero_loss() {
    let device = Default::default();
    let model = small_model(&device);
    let (text, visual) = inputs(&device);

    let labels = Tensor::<TestBackend, 2, Int>::zeros([2, 8], &device) - 1;
    let out = model.word_mask(&text, &visual, Some(labels));
    match out {
        WordMaskOutput::Loss(loss) => assert_eq!(loss.into_scalar(), 0.0),
        WordMaskOutput::Logits(_) => panic!("expected a loss"),
    }
}

#[test]
fn matched_loss_is_finite() {
    let device = Default::default();
    let model = small_model(&device);
    let (text, visual) = inputs(&device);

    let labels = Tensor::<TestBackend, 1, Int>::from_ints([1, 0], &device);
    let loss: f32 = model.matched(&text, &visual, labels).into_scalar();
    assert!(loss.is_finite());
    assert!(loss >= 0.0);
}

#[test]
fn vis_mask_training_with_teacher_forcing() {
    let device = Default::default();
    let model = small_model(&device);
    let (text, visual) = inputs(&device);

    let grid_mask = Tensor::<TestBackend, 2, Int>::ones([2, N_GRIDS], &device);
    let code_labels = Tensor::<TestBackend, 2, Int>::ones([2, N_GRIDS], &device);
    let decoder_codes =
        DecoderCodes::TeacherForcing(Tensor::<TestBackend, 2, Int>::ones([2, N_GRIDS], &device));

    let out = model
        .vis_mask(
            &text,
            &visual,
            &grid_mask,
            Some(VisMaskLabels {
                code_labels,
                decoder_codes,
            }),
            false,
        )
        .unwrap();

    match out {
        VisMaskOutput::Train {
            code_loss,
            fake_img,
        } => {
            let loss: f32 = code_loss.into_scalar();
            assert!(loss.is_finite());
            assert!(loss >= 0.0);
            // 4x4 grid upsampled once
            assert_eq!(fake_img.dims(), [2, 3, 8, 8]);
        }
        VisMaskOutput::Infer { .. } => panic!("expected the training output"),
    }
}

#[test]
fn vis_mask_all_ignored_code_labels_give_zero_loss() {
    let device = Default::default();
    let model = small_model(&device);
    let (text, visual) = inputs(&device);

    let grid_mask = Tensor::<TestBackend, 2, Int>::zeros([2, N_GRIDS], &device);
    let code_labels = Tensor::<TestBackend, 2, Int>::zeros([2, N_GRIDS], &device) - 1;

    let out = model
        .vis_mask(
            &text,
            &visual,
            &grid_mask,
            Some(VisMaskLabels {
                code_labels,
                decoder_codes: DecoderCodes::Predicted,
            }),
            false,
        )
        .unwrap();

    match out {
        VisMaskOutput::Train { code_loss, .. } => {
            assert_eq!(code_loss.into_scalar(), 0.0);
        }
        VisMaskOutput::Infer { .. } => panic!("expected the training output"),
    }
}

#[test]
fn vis_mask_inference_predictions_match_argmax() {
    let device = Default::default();
    let model = small_model(&device);
    let (text, visual) = inputs(&device);

    let grid_mask = Tensor::<TestBackend, 2, Int>::ones([2, N_GRIDS], &device);
    let out = model
        .vis_mask(&text, &visual, &grid_mask, None, false)
        .unwrap();

    match out {
        VisMaskOutput::Infer {
            code_logits,
            pred_code_ids,
            pred_codes,
            fake_img,
            regressed_feats,
        } => {
            assert_eq!(code_logits.dims(), [2, N_GRIDS, N_CODEBOOK]);
            assert_eq!(pred_code_ids.dims(), [2, N_GRIDS]);
            assert_eq!(pred_codes.dims(), [2, N_GRIDS, CODEBOOK_DIM]);
            assert_eq!(fake_img.dims(), [2, 3, 8, 8]);
            assert_eq!(regressed_feats.dims(), [2, N_GRIDS, CODEBOOK_DIM]);

            let expected: Tensor<TestBackend, 2, Int> = code_logits.argmax(2).squeeze(2);
            let expected: Vec<i64> = expected.into_data().convert::<i64>().to_vec().unwrap();
            let actual: Vec<i64> = pred_code_ids.into_data().convert::<i64>().to_vec().unwrap();
            assert_eq!(actual, expected);
        }
        VisMaskOutput::Train { .. } => panic!("expected the inference output"),
    }
}

#[test]
fn vis_mask_autoregressive_flag_keeps_shapes() {
    let device = Default::default();
    let model = small_model(&device);
    let (text, visual) = inputs(&device);

    let grid_mask = Tensor::<TestBackend, 2, Int>::ones([2, N_GRIDS], &device);
    let out = model
        .vis_mask(&text, &visual, &grid_mask, None, true)
        .unwrap();

    match out {
        VisMaskOutput::Infer { code_logits, .. } => {
            assert_eq!(code_logits.dims(), [2, N_GRIDS, N_CODEBOOK]);
        }
        VisMaskOutput::Train { .. } => panic!("expected the inference output"),
    }
}

#[test]
fn task_dispatch_covers_every_variant() {
    let device = Default::default();
    let model = small_model(&device);
    let (text, visual) = inputs(&device);

    for task in [PretrainTask::WordMask, PretrainTask::Matched, PretrainTask::VisMask] {
        let loss: f32 = match task {
            PretrainTask::WordMask => {
                let labels = Tensor::<TestBackend, 2, Int>::zeros([2, 8], &device);
                match model.word_mask(&text, &visual, Some(labels)) {
                    WordMaskOutput::Loss(loss) => loss.into_scalar(),
                    WordMaskOutput::Logits(_) => panic!("expected a loss"),
                }
            }
            PretrainTask::Matched => {
                let labels = Tensor::<TestBackend, 1, Int>::from_ints([1, 1], &device);
                model.matched(&text, &visual, labels).into_scalar()
            }
            PretrainTask::VisMask => {
                let grid_mask = Tensor::<TestBackend, 2, Int>::ones([2, N_GRIDS], &device);
                let labels = VisMaskLabels {
                    code_labels: Tensor::<TestBackend, 2, Int>::zeros([2, N_GRIDS], &device),
                    decoder_codes: DecoderCodes::Predicted,
                };
                match model
                    .vis_mask(&text, &visual, &grid_mask, Some(labels), false)
                    .unwrap()
                {
                    VisMaskOutput::Train { code_loss, .. } => code_loss.into_scalar(),
                    VisMaskOutput::Infer { .. } => panic!("expected the training output"),
                }
            }
        };
        assert!(loss.is_finite(), "{task:?} loss not finite");
    }
}
