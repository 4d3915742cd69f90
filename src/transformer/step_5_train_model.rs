// External imports
use anyhow::Result;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::Tensor;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use log::info;
use polars::prelude::DataFrame;

// Internal imports
use super::step_1_tensor_preparation::{
    dataframe_to_windows, impute_missing_values, normalize_features, split_windows,
    NormalizationStats, WindowTensors,
};
use super::step_4_transformer_model_arch::{TimeSeriesTransformer, TransformerConfig};
use super::step_7_model_serialization::ModelMetadata;
use crate::constants::{MODEL_FILE_NAME, VALIDATION_SPLIT_RATIO};
use crate::util::model_utils;
use crate::util::pre_processor;

pub type BurnBackend = Autodiff<NdArray<f32>>;
pub type BurnDevice = <BurnBackend as burn::tensor::backend::Backend>::Device;

/// Configuration for training the model
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub validation_split: f64,
    pub patience: usize,
    pub min_delta: f64,
    pub use_huber_loss: bool,
    pub checkpoint_epochs: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            batch_size: 32,
            epochs: 10,
            validation_split: VALIDATION_SPLIT_RATIO,
            patience: 3,
            min_delta: 0.001,
            use_huber_loss: true,
            checkpoint_epochs: 5,
        }
    }
}

/// Summary of a completed training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub loss_history: Vec<f64>,
    pub best_val_rmse: f64,
    pub epochs_run: usize,
    pub stats: NormalizationStats,
    pub feature_columns: Vec<String>,
}

fn get_batches<const D: usize>(
    data: &Tensor<BurnBackend, D>,
    batch_size: usize,
) -> Vec<Tensor<BurnBackend, D>> {
    let num_samples = data.dims()[0];
    let mut batches = Vec::new();
    let mut start = 0;
    while start < num_samples {
        let end = usize::min(start + batch_size, num_samples);
        batches.push(data.clone().narrow(0, start, end - start));
        start = end;
    }
    batches
}

fn validation_rmse(
    model: &TimeSeriesTransformer<BurnBackend>,
    val: &WindowTensors<BurnBackend>,
) -> f64 {
    let preds = model.forward(
        val.past.clone(),
        val.past_marks.clone(),
        val.future_marks.clone(),
    );
    let diff = preds - val.targets.clone();
    let mse_tensor = (diff.clone() * diff).mean();
    let mse_data = mse_tensor.to_data().convert::<f32>();
    let mse = mse_data.as_slice::<f32>().unwrap()[0] as f64;
    mse.sqrt()
}

/// Train the transformer model on a preprocessed DataFrame
///
/// The frame must carry a time column plus numeric feature columns. It is
/// normalized in place here; the fitted statistics are returned with the
/// report and stored in the model metadata for later denormalization.
pub fn train_model(
    df: DataFrame,
    model_config: TransformerConfig,
    config: TrainingConfig,
    device: &BurnDevice,
    dataset_name: &str,
) -> Result<(TimeSeriesTransformer<BurnBackend>, TrainingReport)> {
    info!("Starting transformer training on dataset {}", dataset_name);

    let mut df = df;
    let feature_columns = pre_processor::feature_columns(&df);
    if feature_columns.is_empty() {
        return Err(anyhow::anyhow!("No numeric feature columns found"));
    }
    pre_processor::cast_features_to_f64(&mut df, &feature_columns)?;
    impute_missing_values(&mut df, &feature_columns)?;
    let stats = normalize_features(&mut df, &feature_columns)?;

    let windows = dataframe_to_windows::<BurnBackend>(
        &df,
        &feature_columns,
        model_config.n_past,
        model_config.horizon,
        model_config.time_encoding,
        model_config.target_seq_index,
        device,
    )?;
    info!(
        "Prepared {} windows of shape past {:?} / targets {:?}",
        windows.len(),
        windows.past.dims(),
        windows.targets.dims()
    );

    let val_size = (windows.len() as f64 * config.validation_split).round() as usize;
    if val_size == 0 || val_size >= windows.len() {
        return Err(anyhow::anyhow!(
            "Not enough windows ({}) for a {}% validation split",
            windows.len(),
            config.validation_split * 100.0
        ));
    }
    let (train, val) = split_windows(&windows, config.validation_split);

    let mut model =
        TimeSeriesTransformer::<BurnBackend>::new(&model_config, feature_columns.len(), device);
    let mut optimizer = AdamConfig::new().init();

    let mut best_model = model.clone();
    let mut best_val_rmse = f64::INFINITY;
    let mut epochs_no_improve = 0;
    let mut loss_history = Vec::new();
    let mut epochs_run = 0;

    let model_name = format!("{}{}", dataset_name, MODEL_FILE_NAME);
    let metadata = ModelMetadata::new(&model_config, &feature_columns, stats.clone());

    for epoch in 1..=config.epochs {
        epochs_run = epoch;

        // Linear learning rate decay
        let mut current_lr = config.learning_rate * (1.0 - (epoch as f64 - 1.0) / config.epochs as f64);
        if current_lr < 1e-8 {
            current_lr = 1e-8;
        }

        let past_batches = get_batches(&train.past, config.batch_size);
        let past_marks_batches = get_batches(&train.past_marks, config.batch_size);
        let future_marks_batches = get_batches(&train.future_marks, config.batch_size);
        let target_batches = get_batches(&train.targets, config.batch_size);

        let mut epoch_loss = 0.0;
        for i in 0..past_batches.len() {
            let predictions = model.forward(
                past_batches[i].clone(),
                past_marks_batches[i].clone(),
                future_marks_batches[i].clone(),
            );
            let loss_tensor = if config.use_huber_loss {
                model.huber_loss(predictions, target_batches[i].clone(), 1.0)
            } else {
                model.mse_loss(predictions, target_batches[i].clone())
            };
            let loss_data = loss_tensor.to_data().convert::<f32>();
            epoch_loss += loss_data.as_slice::<f32>().unwrap()[0] as f64;

            let grads = loss_tensor.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(current_lr, model, grads);
        }
        let avg_loss = epoch_loss / past_batches.len() as f64;
        loss_history.push(avg_loss);

        let val_rmse = validation_rmse(&model, &val);
        info!(
            "Epoch {} - loss {:.6}, val RMSE {:.6}, lr {:.2e}",
            epoch, avg_loss, val_rmse, current_lr
        );

        // Early stopping on validation RMSE
        if best_val_rmse - val_rmse > config.min_delta {
            best_val_rmse = val_rmse;
            best_model = model.clone();
            epochs_no_improve = 0;
        } else {
            epochs_no_improve += 1;
            if epochs_no_improve >= config.patience {
                info!(
                    "Early stopping triggered at epoch {} (best val RMSE = {:.6})",
                    epoch, best_val_rmse
                );
                model = best_model.clone();
                break;
            }
        }

        if config.checkpoint_epochs > 0 && epoch % config.checkpoint_epochs == 0 {
            let _ = model_utils::save_model_checkpoint(
                &model,
                &metadata,
                dataset_name,
                "transformer",
                &model_name,
                epoch,
            );
        }
    }

    model_utils::save_trained_model(&model, &metadata, dataset_name, "transformer", &model_name)?;
    info!("Training completed and model saved.");

    Ok((
        model,
        TrainingReport {
            loss_history,
            best_val_rmse,
            epochs_run,
            stats,
            feature_columns,
        },
    ))
}

/// Evaluate a trained model on a held-out DataFrame, returning the RMSE
/// over normalized values
pub fn evaluate_model(
    model: &TimeSeriesTransformer<BurnBackend>,
    test_df: DataFrame,
    stats: &NormalizationStats,
    model_config: &TransformerConfig,
    device: &BurnDevice,
) -> Result<f64> {
    if test_df.height() == 0 {
        return Ok(0.0);
    }
    let mut df = test_df;
    let feature_columns = pre_processor::feature_columns(&df);
    pre_processor::cast_features_to_f64(&mut df, &feature_columns)?;
    impute_missing_values(&mut df, &feature_columns)?;
    stats.apply(&mut df)?;

    let windows = dataframe_to_windows::<BurnBackend>(
        &df,
        &feature_columns,
        model_config.n_past,
        model_config.horizon,
        model_config.time_encoding,
        model_config.target_seq_index,
        device,
    )?;
    Ok(validation_rmse(model, &windows))
}
