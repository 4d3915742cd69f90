//! Trains a transformer forecaster on a CSV file and prints a forecast.
//!
//! Usage: `cargo run --example train_and_forecast -- path/to/series.csv`
//! The CSV needs a `time` column plus numeric feature columns.

use burn_ndarray::NdArrayDevice;
use std::path::PathBuf;
use std::time::Instant;

use tempoformer::transformer::{
    step_5_train_model, step_6_prediction, ModelMetadata, TrainingConfig, TransformerConfig,
};
use tempoformer::util::model_logger::ModelExperiment;
use tempoformer::util::pre_processor;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let csv_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("data/series.csv");
    println!("Transformer example - training and forecasting from {}", csv_path);

    let device = NdArrayDevice::default();

    let df = pre_processor::load_and_preprocess(&PathBuf::from(csv_path))?;
    println!("Loaded dataframe with {} rows", df.height());

    // Hold the last fifth back so the forecast can be compared to actuals
    let n_samples = df.height();
    let train_size = (n_samples as f64 * 0.8) as usize;
    let train_df = df.slice(0, train_size);
    let test_df = df.slice(train_size as i64, n_samples - train_size);
    println!(
        "Training dataset size: {} rows, held out: {} rows",
        train_df.height(),
        test_df.height()
    );

    let model_config = TransformerConfig {
        n_past: 48,
        horizon: 12,
        model_dim: 64,
        n_heads: 4,
        fcn_dim: 128,
        num_encoder_layers: 2,
        num_decoder_layers: 1,
        start_token_len: 24,
        ..Default::default()
    };
    let training_config = TrainingConfig {
        epochs: 5,
        batch_size: 16,
        ..Default::default()
    };

    let mut experiment = ModelExperiment::new(
        "train_and_forecast",
        "transformer",
        model_config.model_dim,
        model_config.n_heads,
        model_config.num_encoder_layers,
        model_config.num_decoder_layers,
        model_config.n_past,
        model_config.horizon,
        training_config.batch_size,
        training_config.learning_rate,
    );

    println!("Starting transformer model training...");
    let start_time = Instant::now();
    let (model, report) = step_5_train_model::train_model(
        train_df.clone(),
        model_config.clone(),
        training_config,
        &device,
        "demo",
    )?;
    let elapsed = start_time.elapsed();
    println!("Training completed in {:?}", elapsed);

    experiment.set_train_loss(*report.loss_history.last().unwrap_or(&0.0));
    experiment.set_val_rmse(report.best_val_rmse);
    experiment.set_training_time(elapsed.as_secs_f64());
    experiment.append_to_log("models/experiments.csv")?;

    let metadata = ModelMetadata::new(&model_config, &report.feature_columns, report.stats.clone());
    let forecast = step_6_prediction::forecast(&model, &train_df, &metadata, &device)?;
    println!("Forecast for the next {} steps:", model_config.horizon);
    println!("{}", forecast);

    // Compare against the held-out actuals where available
    if test_df.height() >= model_config.horizon {
        let target = &report.feature_columns[0];
        let actual: Vec<f64> = test_df
            .column(target)?
            .cast(&polars::prelude::DataType::Float64)?
            .f64()?
            .into_iter()
            .take(model_config.horizon)
            .map(|v| v.unwrap_or(0.0))
            .collect();
        let predicted: Vec<f64> = forecast
            .column(target)?
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();
        let (rmse, mae) = step_6_prediction::forecast_accuracy(&predicted, &actual);
        println!("Held-out accuracy on {}: RMSE {:.4}, MAE {:.4}", target, rmse, mae);
    }

    Ok(())
}
