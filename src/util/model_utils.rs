use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use std::path::PathBuf;

use crate::constants::MODEL_PATH;
use crate::transformer::step_4_transformer_model_arch::TimeSeriesTransformer;
use crate::transformer::step_7_model_serialization::{
    load_model_with_metadata, save_model_with_metadata, ModelMetadata,
};

/// Get the default path for saving models
pub fn get_model_path(dataset_name: &str, model_type: &str) -> PathBuf {
    PathBuf::from(MODEL_PATH).join(dataset_name).join(model_type)
}

/// Save a trained model with its metadata under MODEL_PATH
pub fn save_trained_model<B: Backend>(
    model: &TimeSeriesTransformer<B>,
    metadata: &ModelMetadata,
    dataset_name: &str,
    model_type: &str,
    model_name: &str,
) -> Result<PathBuf> {
    let model_dir = get_model_path(dataset_name, model_type);
    std::fs::create_dir_all(&model_dir).context("Failed to create models directory")?;

    let model_path = model_dir.join(model_name);
    save_model_with_metadata(model, metadata, &model_path).context("Failed to save model")?;

    log::info!("Model saved successfully to: {}", model_path.display());
    Ok(model_path)
}

/// Load a trained model with its metadata from MODEL_PATH
pub fn load_trained_model<B: Backend>(
    dataset_name: &str,
    model_type: &str,
    model_name: &str,
    device: &B::Device,
) -> Result<(TimeSeriesTransformer<B>, ModelMetadata)> {
    let model_path = get_model_path(dataset_name, model_type).join(model_name);
    log::info!("Loading model from: {}", model_path.display());
    load_model_with_metadata(&model_path, device).context("Failed to load model")
}

/// Save a model checkpoint during training
pub fn save_model_checkpoint<B: Backend>(
    model: &TimeSeriesTransformer<B>,
    metadata: &ModelMetadata,
    dataset_name: &str,
    model_type: &str,
    model_name: &str,
    epoch: usize,
) -> Result<PathBuf> {
    let checkpoint_name = format!("{}_epoch_{}", model_name, epoch);
    save_trained_model(model, metadata, dataset_name, model_type, &checkpoint_name)
}
