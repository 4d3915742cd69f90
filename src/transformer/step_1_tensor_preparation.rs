// External crates
use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// Internal modules
use crate::constants::{TIME_COLUMN, TIME_FEATURE_DIM};
use crate::transformer::step_3_embedding::TimeEncoding;
use crate::util::feature_engineering::{calendar_marks, parse_time_column, time_features};

/// Errors raised while turning a DataFrame into model tensors
#[derive(Debug, Error)]
pub enum DataError {
    #[error("empty DataFrame")]
    EmptyFrame,
    #[error("missing required column: {0}")]
    MissingColumn(String),
    #[error("column {0} is not numeric")]
    NonNumeric(String),
    #[error("not enough rows: need at least {needed}, got {got}")]
    NotEnoughRows { needed: usize, got: usize },
    #[error("invalid target index {index} for {n_features} feature columns")]
    InvalidTargetIndex { index: usize, n_features: usize },
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Per-column mean and standard deviation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStats {
    pub mean: f64,
    pub std: f64,
}

/// Z-score normalization parameters, kept for denormalizing forecasts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub columns: HashMap<String, ColumnStats>,
}

impl NormalizationStats {
    /// Computes per-column statistics without modifying the frame
    pub fn fit(df: &DataFrame, columns: &[String]) -> Result<Self, DataError> {
        if df.height() == 0 {
            return Err(DataError::EmptyFrame);
        }
        let mut stats = HashMap::new();
        for col in columns {
            let series = df
                .column(col)
                .map_err(|_| DataError::MissingColumn(col.clone()))?;
            let f_series = series.f64().map_err(|_| DataError::NonNumeric(col.clone()))?;
            let mean = f_series.mean().unwrap_or(0.0);
            let std = f_series.std(1).unwrap_or(1.0);
            // Constant columns would divide by zero
            let std = if std.is_nan() || std.abs() < 1e-10 { 1.0 } else { std };
            stats.insert(col.clone(), ColumnStats { mean, std });
        }
        Ok(Self { columns: stats })
    }

    /// Applies z-score normalization in place using the stored statistics
    pub fn apply(&self, df: &mut DataFrame) -> Result<(), DataError> {
        for (col, st) in &self.columns {
            let series = df
                .column(col)
                .map_err(|_| DataError::MissingColumn(col.clone()))?;
            let f_series = series.f64().map_err(|_| DataError::NonNumeric(col.clone()))?;
            let normalized: Vec<f64> = f_series
                .into_iter()
                .map(|opt_v| match opt_v {
                    Some(v) if !v.is_nan() => (v - st.mean) / st.std,
                    _ => 0.0,
                })
                .collect();
            df.replace(col, Series::new(col.as_str().into(), normalized))?;
        }
        Ok(())
    }

    /// Maps normalized values for a column back to the original scale
    pub fn invert(&self, column: &str, values: &[f64]) -> Vec<f64> {
        match self.columns.get(column) {
            Some(st) => values.iter().map(|v| v * st.std + st.mean).collect(),
            None => values.to_vec(),
        }
    }
}

/// Fits z-score statistics on the given columns and normalizes in place
pub fn normalize_features(
    df: &mut DataFrame,
    columns: &[String],
) -> Result<NormalizationStats, DataError> {
    let stats = NormalizationStats::fit(df, columns)?;
    stats.apply(df)?;
    Ok(stats)
}

/// Imputes missing values in the specified DataFrame columns
///
/// Forward fill first; any leading NaN left over is replaced with the
/// column median.
pub fn impute_missing_values(df: &mut DataFrame, columns: &[String]) -> Result<(), DataError> {
    for col in columns {
        let series = df
            .column(col)
            .map_err(|_| DataError::MissingColumn(col.clone()))?;
        let f_series = series.f64().map_err(|_| DataError::NonNumeric(col.clone()))?;

        let has_gaps = f_series.null_count() > 0
            || f_series.into_iter().any(|v| v.map_or(true, f64::is_nan));
        if !has_gaps {
            continue;
        }

        let median = f_series.median().unwrap_or(0.0);
        let mut values: Vec<f64> = Vec::with_capacity(f_series.len());
        let mut last_valid: Option<f64> = None;
        for opt_v in f_series.into_iter() {
            match opt_v {
                Some(v) if !v.is_nan() => {
                    last_valid = Some(v);
                    values.push(v);
                }
                _ => values.push(last_valid.unwrap_or(median)),
            }
        }
        df.replace(col, Series::new(col.as_str().into(), values))?;
    }
    Ok(())
}

/// Splits the DataFrame into training and validation sets, time ordered
pub fn split_data(df: &DataFrame, validation_split: f64) -> Result<(DataFrame, DataFrame), DataError> {
    if df.height() == 0 {
        return Err(DataError::EmptyFrame);
    }
    let n_samples = df.height();
    let split_idx = (n_samples as f64 * (1.0 - validation_split)) as usize;
    let train_df = df.slice(0, split_idx);
    let val_df = df.slice(split_idx as i64, n_samples - split_idx);
    Ok((train_df, val_df))
}

/// Tensors for one batch of encoder-decoder training windows
///
/// Shapes: `past` [n, n_past, n_features], `past_marks` [n, n_past, m],
/// `future_marks` [n, horizon, m], `targets` [n, horizon, c_out].
#[derive(Debug, Clone)]
pub struct WindowTensors<B: Backend> {
    pub past: Tensor<B, 3>,
    pub past_marks: Tensor<B, 3>,
    pub future_marks: Tensor<B, 3>,
    pub targets: Tensor<B, 3>,
}

impl<B: Backend> WindowTensors<B> {
    pub fn len(&self) -> usize {
        self.past.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows `start..start + len` of every tensor
    pub fn narrow(&self, start: usize, len: usize) -> Self {
        Self {
            past: self.past.clone().narrow(0, start, len),
            past_marks: self.past_marks.clone().narrow(0, start, len),
            future_marks: self.future_marks.clone().narrow(0, start, len),
            targets: self.targets.clone().narrow(0, start, len),
        }
    }
}

/// Splits windows into train and validation parts, preserving time order
pub fn split_windows<B: Backend>(
    tensors: &WindowTensors<B>,
    validation_split: f64,
) -> (WindowTensors<B>, WindowTensors<B>) {
    let n = tensors.len();
    let val_size = (n as f64 * validation_split).round() as usize;
    let train_size = n - val_size;
    (
        tensors.narrow(0, train_size),
        tensors.narrow(train_size, val_size),
    )
}

/// Converts a DataFrame into sliding-window tensors for the transformer
///
/// Each window pairs `n_past` steps of history (values + time marks) with
/// the following `horizon` steps of time marks and target values. The time
/// marks are real-valued features for `TimeEncoding::TimeF` and integer
/// calendar fields (stored as floats) for the fixed/learned embeddings.
///
/// # Arguments
///
/// * `df` - Input DataFrame containing normalized features and a time column
/// * `feature_columns` - Names of the model's input columns
/// * `n_past` - Number of past steps per window
/// * `horizon` - Number of future steps per window
/// * `time_encoding` - Which temporal embedding the marks feed
/// * `target_seq_index` - Forecast a single column instead of all of them
/// * `device` - The device to create tensors on
pub fn dataframe_to_windows<B: Backend>(
    df: &DataFrame,
    feature_columns: &[String],
    n_past: usize,
    horizon: usize,
    time_encoding: TimeEncoding,
    target_seq_index: Option<usize>,
    device: &B::Device,
) -> Result<WindowTensors<B>, DataError> {
    if df.height() == 0 {
        return Err(DataError::EmptyFrame);
    }
    let n_rows = df.height();
    let needed = n_past + horizon;
    if n_rows < needed {
        return Err(DataError::NotEnoughRows { needed, got: n_rows });
    }
    if let Some(idx) = target_seq_index {
        if idx >= feature_columns.len() {
            return Err(DataError::InvalidTargetIndex {
                index: idx,
                n_features: feature_columns.len(),
            });
        }
    }

    let timestamps = df
        .column(TIME_COLUMN)
        .map_err(|_| DataError::MissingColumn(TIME_COLUMN.to_string()))
        .and_then(|_| parse_time_column(df, TIME_COLUMN).map_err(DataError::from))?;

    // Column-major copies of the features for cheap window extraction
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(feature_columns.len());
    for col in feature_columns {
        let series = df
            .column(col)
            .map_err(|_| DataError::MissingColumn(col.clone()))?;
        let f_series = series.f64().map_err(|_| DataError::NonNumeric(col.clone()))?;
        columns.push(f_series.into_iter().map(|v| v.unwrap_or(0.0)).collect());
    }

    let marks: Vec<[f32; TIME_FEATURE_DIM]> = match time_encoding {
        TimeEncoding::TimeF => time_features(&timestamps),
        TimeEncoding::Fixed | TimeEncoding::Learned => calendar_marks(&timestamps)
            .into_iter()
            .map(|m| {
                let mut row = [0.0f32; TIME_FEATURE_DIM];
                for (dst, src) in row.iter_mut().zip(m.iter()) {
                    *dst = *src as f32;
                }
                row
            })
            .collect(),
    };

    let n_features = feature_columns.len();
    let n_windows = n_rows - needed + 1;
    let target_cols: Vec<usize> = match target_seq_index {
        Some(idx) => vec![idx],
        None => (0..n_features).collect(),
    };
    let c_out = target_cols.len();

    // One buffer bundle per window, built in parallel
    struct WindowBuffers {
        past: Vec<f32>,
        past_marks: Vec<f32>,
        future_marks: Vec<f32>,
        targets: Vec<f32>,
    }

    let buffers: Vec<WindowBuffers> = (0..n_windows)
        .into_par_iter()
        .map(|w| {
            let mut past = Vec::with_capacity(n_past * n_features);
            let mut past_marks = Vec::with_capacity(n_past * TIME_FEATURE_DIM);
            let mut future_marks = Vec::with_capacity(horizon * TIME_FEATURE_DIM);
            let mut targets = Vec::with_capacity(horizon * c_out);

            for row in w..w + n_past {
                for col in &columns {
                    past.push(col[row] as f32);
                }
                past_marks.extend_from_slice(&marks[row]);
            }
            for row in w + n_past..w + n_past + horizon {
                future_marks.extend_from_slice(&marks[row]);
                for &col_idx in &target_cols {
                    targets.push(columns[col_idx][row] as f32);
                }
            }

            WindowBuffers {
                past,
                past_marks,
                future_marks,
                targets,
            }
        })
        .collect();

    let mut past_buf = Vec::with_capacity(n_windows * n_past * n_features);
    let mut past_marks_buf = Vec::with_capacity(n_windows * n_past * TIME_FEATURE_DIM);
    let mut future_marks_buf = Vec::with_capacity(n_windows * horizon * TIME_FEATURE_DIM);
    let mut targets_buf = Vec::with_capacity(n_windows * horizon * c_out);
    for b in buffers {
        past_buf.extend(b.past);
        past_marks_buf.extend(b.past_marks);
        future_marks_buf.extend(b.future_marks);
        targets_buf.extend(b.targets);
    }

    let past = Tensor::<B, 1>::from_floats(past_buf.as_slice(), device)
        .reshape(Shape::new([n_windows, n_past, n_features]));
    let past_marks = Tensor::<B, 1>::from_floats(past_marks_buf.as_slice(), device)
        .reshape(Shape::new([n_windows, n_past, TIME_FEATURE_DIM]));
    let future_marks = Tensor::<B, 1>::from_floats(future_marks_buf.as_slice(), device)
        .reshape(Shape::new([n_windows, horizon, TIME_FEATURE_DIM]));
    let targets = Tensor::<B, 1>::from_floats(targets_buf.as_slice(), device)
        .reshape(Shape::new([n_windows, horizon, c_out]));

    Ok(WindowTensors {
        past,
        past_marks,
        future_marks,
        targets,
    })
}
