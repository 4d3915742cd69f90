// External imports
use burn_ndarray::{NdArray, NdArrayDevice};

// Internal imports
use crate::constants::TIME_COLUMN;
use crate::transformer::step_1_tensor_preparation::NormalizationStats;
use crate::transformer::step_6_prediction::{forecast, forecast_accuracy};
use crate::transformer::{ModelMetadata, TimeSeriesTransformer, TransformerConfig};
use crate::util::test_utils::generate_test_dataframe;

type TestBackend = NdArray<f32>;

fn small_config() -> TransformerConfig {
    TransformerConfig {
        n_past: 24,
        horizon: 6,
        model_dim: 8,
        n_heads: 2,
        fcn_dim: 16,
        num_encoder_layers: 1,
        num_decoder_layers: 1,
        start_token_len: 8,
        dropout: 0.0,
        distil: false,
        ..Default::default()
    }
}

fn feature_names() -> Vec<String> {
    vec![
        "load".to_string(),
        "temperature".to_string(),
        "humidity".to_string(),
    ]
}

#[test]
fn test_forecast_frame_layout() {
    let device = NdArrayDevice::default();
    let df = generate_test_dataframe(100).unwrap();
    let columns = feature_names();
    let config = small_config();

    let stats = NormalizationStats::fit(&df, &columns).unwrap();
    let metadata = ModelMetadata::new(&config, &columns, stats);
    let model = TimeSeriesTransformer::<TestBackend>::new(&config, columns.len(), &device);

    let result = forecast(&model, &df, &metadata, &device).unwrap();
    assert_eq!(result.height(), config.horizon);
    assert!(result.column(TIME_COLUMN).is_ok());
    for col in &columns {
        assert!(result.column(col).is_ok(), "missing forecast column {}", col);
    }

    // Future timestamps continue the hourly grid
    let times = result.column(TIME_COLUMN).unwrap();
    let first = times.str().unwrap().get(0).unwrap();
    assert_eq!(first, "2024-01-05 04:00:00"); // row 100 of an hourly series
}

#[test]
fn test_forecast_single_target() {
    let device = NdArrayDevice::default();
    let df = generate_test_dataframe(100).unwrap();
    let columns = feature_names();
    let config = TransformerConfig {
        target_seq_index: Some(0),
        ..small_config()
    };

    let stats = NormalizationStats::fit(&df, &columns).unwrap();
    let metadata = ModelMetadata::new(&config, &columns, stats);
    let model = TimeSeriesTransformer::<TestBackend>::new(&config, columns.len(), &device);

    let result = forecast(&model, &df, &metadata, &device).unwrap();
    assert_eq!(result.height(), config.horizon);
    // time + the single target column
    assert_eq!(result.width(), 2);
    assert!(result.column("load").is_ok());
}

#[test]
fn test_forecast_rejects_short_history() {
    let device = NdArrayDevice::default();
    let df = generate_test_dataframe(10).unwrap();
    let columns = feature_names();
    let config = small_config();

    let stats = NormalizationStats::fit(&df, &columns).unwrap();
    let metadata = ModelMetadata::new(&config, &columns, stats);
    let model = TimeSeriesTransformer::<TestBackend>::new(&config, columns.len(), &device);

    assert!(forecast(&model, &df, &metadata, &device).is_err());
}

#[test]
fn test_forecast_accuracy_metrics() {
    let predicted = vec![1.0, 2.0, 3.0];
    let actual = vec![1.0, 2.0, 5.0];
    let (rmse, mae) = forecast_accuracy(&predicted, &actual);
    assert!((mae - 2.0 / 3.0).abs() < 1e-9);
    assert!((rmse - (4.0f64 / 3.0).sqrt()).abs() < 1e-9);

    let (rmse_empty, mae_empty) = forecast_accuracy(&[], &[]);
    assert_eq!(rmse_empty, 0.0);
    assert_eq!(mae_empty, 0.0);
}
