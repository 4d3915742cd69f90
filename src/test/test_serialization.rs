// External imports
use burn::tensor::Tensor;
use burn_ndarray::{NdArray, NdArrayDevice};
use tempfile::tempdir;

// Internal imports
use crate::constants::TIME_FEATURE_DIM;
use crate::transformer::step_1_tensor_preparation::NormalizationStats;
use crate::transformer::step_7_model_serialization::{
    load_model_with_metadata, save_model_with_metadata, verify_model, ModelMetadata,
};
use crate::transformer::{TimeSeriesTransformer, TransformerConfig};

type TestBackend = NdArray<f32>;

fn small_config() -> TransformerConfig {
    TransformerConfig {
        n_past: 12,
        horizon: 3,
        model_dim: 8,
        n_heads: 2,
        fcn_dim: 16,
        num_encoder_layers: 1,
        num_decoder_layers: 1,
        start_token_len: 4,
        dropout: 0.0,
        distil: false,
        ..Default::default()
    }
}

fn metadata(config: &TransformerConfig) -> ModelMetadata {
    let columns = vec!["a".to_string(), "b".to_string()];
    ModelMetadata::new(config, &columns, NormalizationStats::default())
}

#[test]
fn test_model_save_load_round_trip() {
    let device = NdArrayDevice::default();
    let config = small_config();
    let model = TimeSeriesTransformer::<TestBackend>::new(&config, 2, &device);

    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("model");
    save_model_with_metadata(&model, &metadata(&config), &path).unwrap();

    assert!(path.with_extension("bin").exists());
    assert!(path.with_extension("meta.json").exists());

    let (loaded, meta) = load_model_with_metadata::<TestBackend>(&path, &device).unwrap();
    assert_eq!(meta.feature_columns.len(), 2);
    assert_eq!(meta.config.model_dim, config.model_dim);

    // Same weights must mean same outputs
    let past = Tensor::<TestBackend, 3>::ones([1, config.n_past, 2], &device) * 0.3;
    let past_marks =
        Tensor::<TestBackend, 3>::zeros([1, config.n_past, TIME_FEATURE_DIM], &device);
    let future_marks =
        Tensor::<TestBackend, 3>::zeros([1, config.horizon, TIME_FEATURE_DIM], &device);

    let out_a = model.forward(past.clone(), past_marks.clone(), future_marks.clone());
    let out_b = loaded.forward(past, past_marks, future_marks);

    let a = out_a.to_data().convert::<f32>();
    let b = out_b.to_data().convert::<f32>();
    let a = a.as_slice::<f32>().unwrap();
    let b = b.as_slice::<f32>().unwrap();
    for i in 0..a.len() {
        assert!((a[i] - b[i]).abs() < 1e-6, "output {} differs after reload", i);
    }
}

#[test]
fn test_verify_model() {
    let device = NdArrayDevice::default();
    let config = small_config();
    let model = TimeSeriesTransformer::<TestBackend>::new(&config, 2, &device);

    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("model");

    assert!(!verify_model(&path).unwrap());
    save_model_with_metadata(&model, &metadata(&config), &path).unwrap();
    assert!(verify_model(&path).unwrap());
}

#[test]
fn test_metadata_json_round_trip() {
    let config = small_config();
    let meta = metadata(&config);
    let json = serde_json::to_string(&meta).unwrap();
    let back: ModelMetadata = serde_json::from_str(&json).unwrap();
    assert_eq!(back.config.n_past, config.n_past);
    assert_eq!(back.config.horizon, config.horizon);
    assert_eq!(back.feature_columns, meta.feature_columns);
}
