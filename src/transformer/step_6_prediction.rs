// External imports
use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor};
use polars::prelude::*;

// Internal imports
use super::step_1_tensor_preparation::impute_missing_values;
use super::step_3_embedding::TimeEncoding;
use super::step_4_transformer_model_arch::TimeSeriesTransformer;
use super::step_7_model_serialization::ModelMetadata;
use crate::constants::{TIME_COLUMN, TIME_FEATURE_DIM};
use crate::util::feature_engineering::{
    calendar_marks, future_timestamps, infer_frequency, parse_time_column, time_features,
};
use crate::util::pre_processor;

/// Flattens time marks for the given encoding into a row-major f32 buffer
fn marks_buffer(
    timestamps: &[chrono::NaiveDateTime],
    time_encoding: TimeEncoding,
) -> Vec<f32> {
    match time_encoding {
        TimeEncoding::TimeF => time_features(timestamps)
            .into_iter()
            .flatten()
            .collect(),
        TimeEncoding::Fixed | TimeEncoding::Learned => calendar_marks(timestamps)
            .into_iter()
            .flat_map(|m| m.into_iter().map(|v| v as f32))
            .collect(),
    }
}

/// Forecast the configured horizon from the trailing history of a frame
///
/// The frame holds raw (unnormalized) observations with a time column; the
/// metadata carries the normalization statistics fitted during training,
/// which are applied on the way in and inverted on the way out.
///
/// Returns a DataFrame with a `time` column of future timestamps plus one
/// column per forecast output.
pub fn forecast<B: Backend>(
    model: &TimeSeriesTransformer<B>,
    df: &DataFrame,
    metadata: &ModelMetadata,
    device: &B::Device,
) -> Result<DataFrame> {
    let n_past = model.n_past();
    let horizon = model.horizon();
    let columns = &metadata.feature_columns;

    for col in columns {
        if df.column(col).is_err() {
            return Err(anyhow::anyhow!("Missing required column: {}", col));
        }
    }
    if df.height() < n_past {
        return Err(anyhow::anyhow!(
            "DataFrame has too few rows ({}) for n_past ({})",
            df.height(),
            n_past
        ));
    }

    // Trailing window, normalized with the stats fitted at training time
    let mut history = df.tail(Some(n_past));
    pre_processor::cast_features_to_f64(&mut history, columns)?;
    impute_missing_values(&mut history, columns)?;
    metadata.norm_stats.apply(&mut history)?;

    let all_timestamps = parse_time_column(df, TIME_COLUMN).context("Failed to parse time column")?;
    let past_timestamps = &all_timestamps[all_timestamps.len() - n_past..];
    let frequency = infer_frequency(&all_timestamps);
    let future = future_timestamps(*past_timestamps.last().unwrap(), frequency, horizon);

    // Build [1, n_past, n_features] past tensor
    let n_features = columns.len();
    let mut past_buf = Vec::with_capacity(n_past * n_features);
    for row in 0..n_past {
        for col in columns {
            let val = history.column(col)?.f64()?.get(row).unwrap_or(0.0) as f32;
            past_buf.push(val);
        }
    }
    let past = Tensor::<B, 1>::from_floats(past_buf.as_slice(), device)
        .reshape(Shape::new([1, n_past, n_features]));

    let time_encoding = metadata.config.time_encoding;
    let past_marks_buf = marks_buffer(past_timestamps, time_encoding);
    let future_marks_buf = marks_buffer(&future, time_encoding);
    let past_marks = Tensor::<B, 1>::from_floats(past_marks_buf.as_slice(), device)
        .reshape(Shape::new([1, n_past, TIME_FEATURE_DIM]));
    let future_marks = Tensor::<B, 1>::from_floats(future_marks_buf.as_slice(), device)
        .reshape(Shape::new([1, horizon, TIME_FEATURE_DIM]));

    // Forward pass: [1, horizon, c_out]
    let output = model.forward(past, past_marks, future_marks);
    let c_out = output.dims()[2];
    let data = output.to_data().convert::<f32>();
    let values = data.as_slice::<f32>().unwrap();

    // Which feature names the output channels correspond to
    let output_columns: Vec<String> = match metadata.config.target_seq_index {
        Some(idx) => vec![columns[idx].clone()],
        None => columns.clone(),
    };

    let mut out_columns: Vec<Column> = Vec::with_capacity(c_out + 1);
    let time_strings: Vec<String> = future
        .iter()
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .collect();
    out_columns.push(Series::new(TIME_COLUMN.into(), time_strings).into());

    for (c, name) in output_columns.iter().enumerate().take(c_out) {
        let normalized: Vec<f64> = (0..horizon)
            .map(|h| values[h * c_out + c] as f64)
            .collect();
        let denormalized = metadata.norm_stats.invert(name, &normalized);
        out_columns.push(Series::new(name.as_str().into(), denormalized).into());
    }

    DataFrame::new(out_columns).context("Failed to assemble forecast frame")
}

/// RMSE and MAE between predicted and actual values
pub fn forecast_accuracy(predicted: &[f64], actual: &[f64]) -> (f64, f64) {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return (0.0, 0.0);
    }
    let mut sq_sum = 0.0;
    let mut abs_sum = 0.0;
    for i in 0..n {
        let err = predicted[i] - actual[i];
        sq_sum += err * err;
        abs_sum += err.abs();
    }
    ((sq_sum / n as f64).sqrt(), abs_sum / n as f64)
}
