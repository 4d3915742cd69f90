use anyhow::{Context, Result};
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::SystemTime;

use super::step_1_tensor_preparation::NormalizationStats;
use super::step_4_transformer_model_arch::{TimeSeriesTransformer, TransformerConfig};

/// Everything needed to rebuild a saved model and denormalize its output
#[derive(Serialize, Deserialize, Clone)]
pub struct ModelMetadata {
    pub version: String,
    pub timestamp: u64,
    pub config: TransformerConfig,
    pub feature_columns: Vec<String>,
    pub norm_stats: NormalizationStats,
}

impl ModelMetadata {
    pub fn new(
        config: &TransformerConfig,
        feature_columns: &[String],
        norm_stats: NormalizationStats,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            config: config.clone(),
            feature_columns: feature_columns.to_vec(),
            norm_stats,
        }
    }
}

/// Save the model with metadata to a file
///
/// Writes `<path>.bin` (weights) and `<path>.meta.json` (metadata).
pub fn save_model_with_metadata<B: Backend>(
    model: &TimeSeriesTransformer<B>,
    metadata: &ModelMetadata,
    path: impl AsRef<Path>,
) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent).context("Failed to create model parent directory")?;
    }
    let model_path = path.as_ref().with_extension("bin");
    model
        .clone()
        .save_file::<BinFileRecorder<FullPrecisionSettings>, _>(&model_path, &Default::default())
        .context("Failed to save model")?;
    let metadata_path = path.as_ref().with_extension("meta.json");
    let metadata_json =
        serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;
    std::fs::write(&metadata_path, metadata_json).context("Failed to write metadata file")?;
    Ok(())
}

/// Load the model and its metadata from a file
pub fn load_model_with_metadata<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(TimeSeriesTransformer<B>, ModelMetadata)> {
    let metadata_path = path.as_ref().with_extension("meta.json");
    let metadata_json =
        std::fs::read_to_string(&metadata_path).context("Failed to read metadata file")?;
    let metadata: ModelMetadata =
        serde_json::from_str(&metadata_json).context("Failed to parse metadata")?;

    // Rebuild the module skeleton from the saved config, then restore weights
    let model_path = path.as_ref().with_extension("bin");
    let skeleton = TimeSeriesTransformer::new(
        &metadata.config,
        metadata.feature_columns.len(),
        device,
    );
    let model = skeleton
        .load_file::<BinFileRecorder<FullPrecisionSettings>, _>(
            &model_path,
            &Default::default(),
            device,
        )
        .context("Failed to load model")?;
    Ok((model, metadata))
}

/// Check if a model file exists and is valid
pub fn verify_model(path: impl AsRef<Path>) -> Result<bool> {
    let model_path = path.as_ref().with_extension("bin");
    let metadata_path = path.as_ref().with_extension("meta.json");

    if !model_path.exists() || !metadata_path.exists() {
        return Ok(false);
    }

    let metadata_json =
        std::fs::read_to_string(&metadata_path).context("Failed to read metadata file")?;
    let _: ModelMetadata =
        serde_json::from_str(&metadata_json).context("Failed to parse metadata")?;

    Ok(true)
}
