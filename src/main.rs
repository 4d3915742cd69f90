// External crates
use burn_ndarray::NdArrayDevice;
use std::env;
use std::path::PathBuf;
use std::time::Instant;

// Local modules
use tempoformer::transformer::{
    step_5_train_model, step_6_prediction, TrainingConfig, TransformerConfig,
};
use tempoformer::util::pre_processor;

fn main() -> anyhow::Result<()> {
    // Accept dataset path and horizon as command-line arguments
    let args: Vec<String> = env::args().collect();
    let csv_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("data/series.csv");
    let horizon: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(12);
    let dataset_name = PathBuf::from(csv_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "series".to_string());
    println!("Using dataset: {} | horizon: {}", dataset_name, horizon);

    let device = NdArrayDevice::default();

    let df = pre_processor::load_and_preprocess(&PathBuf::from(csv_path))?;
    println!("Loaded dataframe with {} rows", df.height());
    println!("Columns: {:?}", df.get_column_names());

    // A compact model; the library defaults target larger datasets
    let model_config = TransformerConfig {
        n_past: 48,
        horizon,
        model_dim: 64,
        n_heads: 4,
        fcn_dim: 128,
        start_token_len: 24,
        ..Default::default()
    };
    let training_config = TrainingConfig::default();

    println!("Starting transformer model training...");
    let start_time = Instant::now();
    let (model, report) = step_5_train_model::train_model(
        df.clone(),
        model_config.clone(),
        training_config,
        &device,
        &dataset_name,
    )?;
    println!(
        "Training completed in {:?} (best val RMSE {:.6})",
        start_time.elapsed(),
        report.best_val_rmse
    );

    // Forecast from the end of the history
    let metadata = tempoformer::transformer::ModelMetadata::new(
        &model_config,
        &report.feature_columns,
        report.stats.clone(),
    );
    let forecast = step_6_prediction::forecast(&model, &df, &metadata, &device)?;
    println!("Forecast for the next {} steps:", horizon);
    println!("{}", forecast);

    Ok(())
}
