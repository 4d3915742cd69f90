// External imports
use burn::tensor::Tensor;
use burn_ndarray::{NdArray, NdArrayDevice};

// Internal imports
use crate::constants::TIME_FEATURE_DIM;
use crate::transformer::step_4_transformer_model_arch::{
    Activation, TimeSeriesTransformer, TransformerConfig,
};
use crate::transformer::TimeEncoding;

type TestBackend = NdArray<f32>;

fn small_config() -> TransformerConfig {
    TransformerConfig {
        n_past: 16,
        horizon: 4,
        model_dim: 16,
        n_heads: 2,
        fcn_dim: 32,
        num_encoder_layers: 2,
        num_decoder_layers: 1,
        start_token_len: 8,
        dropout: 0.0,
        ..Default::default()
    }
}

fn inputs(
    device: &NdArrayDevice,
    batch: usize,
    n_past: usize,
    horizon: usize,
    n_features: usize,
) -> (
    Tensor<TestBackend, 3>,
    Tensor<TestBackend, 3>,
    Tensor<TestBackend, 3>,
) {
    let past_n: usize = batch * n_past * n_features;
    let past_data: Vec<f32> = (0..past_n).map(|i| ((i % 11) as f32 - 5.0) * 0.1).collect();
    let past = Tensor::<TestBackend, 1>::from_floats(past_data.as_slice(), device)
        .reshape([batch, n_past, n_features]);
    let past_marks = Tensor::<TestBackend, 3>::zeros([batch, n_past, TIME_FEATURE_DIM], device);
    let future_marks = Tensor::<TestBackend, 3>::zeros([batch, horizon, TIME_FEATURE_DIM], device);
    (past, past_marks, future_marks)
}

#[test]
fn test_forward_output_shape_all_channels() {
    let device = NdArrayDevice::default();
    let config = small_config();
    let n_features = 3;
    let model = TimeSeriesTransformer::<TestBackend>::new(&config, n_features, &device);

    let (past, past_marks, future_marks) = inputs(&device, 2, config.n_past, config.horizon, n_features);
    let out = model.forward(past, past_marks, future_marks);
    assert_eq!(out.dims(), [2, config.horizon, n_features]);
}

#[test]
fn test_forward_single_target_channel() {
    let device = NdArrayDevice::default();
    let config = TransformerConfig {
        target_seq_index: Some(1),
        ..small_config()
    };
    let n_features = 3;
    let model = TimeSeriesTransformer::<TestBackend>::new(&config, n_features, &device);
    assert_eq!(model.output_size(), 1);

    let (past, past_marks, future_marks) = inputs(&device, 2, config.n_past, config.horizon, n_features);
    let out = model.forward(past, past_marks, future_marks);
    assert_eq!(out.dims(), [2, config.horizon, 1]);
}

#[test]
fn test_forward_without_start_token() {
    let device = NdArrayDevice::default();
    let config = TransformerConfig {
        start_token_len: 0,
        ..small_config()
    };
    let n_features = 2;
    let model = TimeSeriesTransformer::<TestBackend>::new(&config, n_features, &device);

    let (past, past_marks, future_marks) = inputs(&device, 1, config.n_past, config.horizon, n_features);
    let out = model.forward(past, past_marks, future_marks);
    assert_eq!(out.dims(), [1, config.horizon, n_features]);
}

#[test]
fn test_forward_distillation_on_and_off() {
    // Distillation halves the encoder sequence between layers; either way
    // the decoder must still produce the configured horizon.
    let device = NdArrayDevice::default();
    let n_features = 2;
    for distil in [true, false] {
        let config = TransformerConfig {
            distil,
            num_encoder_layers: 3,
            ..small_config()
        };
        let model = TimeSeriesTransformer::<TestBackend>::new(&config, n_features, &device);
        let (past, past_marks, future_marks) =
            inputs(&device, 1, config.n_past, config.horizon, n_features);
        let out = model.forward(past, past_marks, future_marks);
        assert_eq!(out.dims(), [1, config.horizon, n_features], "distil={}", distil);
    }
}

#[test]
fn test_relu_activation_variant() {
    let device = NdArrayDevice::default();
    let config = TransformerConfig {
        activation: Activation::Relu,
        time_encoding: TimeEncoding::Fixed,
        ..small_config()
    };
    let n_features = 2;
    let model = TimeSeriesTransformer::<TestBackend>::new(&config, n_features, &device);
    let (past, past_marks, future_marks) = inputs(&device, 1, config.n_past, config.horizon, n_features);
    let out = model.forward(past, past_marks, future_marks);
    assert_eq!(out.dims(), [1, config.horizon, n_features]);
}

#[test]
fn test_losses_non_negative_and_zero_at_match() {
    let device = NdArrayDevice::default();
    let config = small_config();
    let model = TimeSeriesTransformer::<TestBackend>::new(&config, 2, &device);

    let pred = Tensor::<TestBackend, 3>::ones([2, 4, 2], &device);
    let target = Tensor::<TestBackend, 3>::ones([2, 4, 2], &device) * 0.5;

    let mse = model.mse_loss(pred.clone(), target.clone());
    let mse_val = mse.to_data().convert::<f32>().as_slice::<f32>().unwrap()[0];
    assert!((mse_val - 0.25).abs() < 1e-6);

    let huber = model.huber_loss(pred.clone(), target, 1.0);
    let huber_val = huber.to_data().convert::<f32>().as_slice::<f32>().unwrap()[0];
    // Inside the quadratic region Huber is half the MSE
    assert!((huber_val - 0.125).abs() < 1e-6);

    let zero = model.mse_loss(pred.clone(), pred);
    let zero_val = zero.to_data().convert::<f32>().as_slice::<f32>().unwrap()[0];
    assert!(zero_val.abs() < 1e-7);
}

#[test]
fn test_default_config_matches_reference_values() {
    let config = TransformerConfig::default();
    assert_eq!(config.num_encoder_layers, 2);
    assert_eq!(config.num_decoder_layers, 1);
    assert_eq!(config.start_token_len, 0);
    assert_eq!(config.factor, 3);
    assert_eq!(config.model_dim, 512);
    assert_eq!(config.n_heads, 8);
    assert_eq!(config.fcn_dim, 2048);
    assert!(config.distil);
    assert_eq!(config.activation, Activation::Gelu);
    assert_eq!(config.time_encoding, TimeEncoding::TimeF);
}
