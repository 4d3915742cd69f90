//! End-to-end walkthrough on generated data - no CSV needed.
//!
//! Usage: `cargo run --example synthetic_forecast`

use burn_ndarray::NdArrayDevice;

use tempoformer::transformer::{
    step_5_train_model, step_6_prediction, ModelMetadata, TimeEncoding, TrainingConfig,
    TransformerConfig,
};
use tempoformer::util::test_utils::generate_test_dataframe;

fn main() -> anyhow::Result<()> {
    println!("Transformer example - synthetic hourly series");

    let device = NdArrayDevice::default();
    let df = generate_test_dataframe(600)?;
    println!("Generated dataframe with {} rows", df.height());

    // Forecast only the load channel, with a learned calendar embedding
    let model_config = TransformerConfig {
        n_past: 48,
        horizon: 24,
        model_dim: 32,
        n_heads: 4,
        fcn_dim: 64,
        start_token_len: 12,
        time_encoding: TimeEncoding::Learned,
        target_seq_index: Some(0),
        ..Default::default()
    };
    let training_config = TrainingConfig {
        epochs: 3,
        batch_size: 32,
        ..Default::default()
    };

    let (model, report) = step_5_train_model::train_model(
        df.clone(),
        model_config.clone(),
        training_config,
        &device,
        "synthetic",
    )?;
    println!("Best validation RMSE: {:.6}", report.best_val_rmse);

    let metadata = ModelMetadata::new(&model_config, &report.feature_columns, report.stats.clone());
    let forecast = step_6_prediction::forecast(&model, &df, &metadata, &device)?;
    println!("Load forecast for the next day:");
    println!("{}", forecast);

    Ok(())
}
