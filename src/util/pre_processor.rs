// External crates
use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

// Local modules
use crate::constants::TIME_COLUMN;

/// Loads and preprocesses a CSV file into a DataFrame
///
/// The file must contain a `time` column plus one or more numeric feature
/// columns. Rows are sorted by time and rows with missing values dropped.
///
/// # Arguments
///
/// * `full_path` - Path to the CSV file
///
/// # Returns
///
/// Returns a Result containing the preprocessed DataFrame or an error
pub fn load_and_preprocess(full_path: &Path) -> Result<DataFrame> {
    log::info!("Loading data from: {}", full_path.display());

    if !full_path.exists() {
        return Err(anyhow::anyhow!("File not found: {}", full_path.display()));
    }

    let file = std::fs::File::open(full_path)
        .with_context(|| format!("Failed to open {}", full_path.display()))?;
    let mut df = CsvReader::new(file)
        .finish()
        .context("Failed to parse CSV")?;

    if df.column(TIME_COLUMN).is_err() {
        return Err(anyhow::anyhow!(
            "Required column {} not found",
            TIME_COLUMN
        ));
    }

    df = df.sort(vec![TIME_COLUMN], SortMultipleOptions::default())?;

    // Drop any rows with missing values
    df = df.drop_nulls::<String>(None)?;

    Ok(df)
}

/// Returns the names of all numeric columns usable as model features
///
/// The time column is excluded; so is any non-numeric column (symbols,
/// labels and the like).
pub fn feature_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| {
            col.name().as_str() != TIME_COLUMN
                && matches!(
                    col.dtype(),
                    DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32
                )
        })
        .map(|col| col.name().to_string())
        .collect()
}

/// Casts every feature column to Float64 so downstream code can assume a
/// single numeric dtype
pub fn cast_features_to_f64(df: &mut DataFrame, columns: &[String]) -> PolarsResult<()> {
    for col in columns {
        if df.column(col)?.dtype() != &DataType::Float64 {
            let cast = df.column(col)?.cast(&DataType::Float64)?;
            df.replace(col, cast.as_materialized_series().clone())?;
        }
    }
    Ok(())
}
