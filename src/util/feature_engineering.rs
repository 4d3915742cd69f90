// External crates
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use polars::prelude::*;

use crate::constants::{MINUTE_BUCKETS, TIME_FEATURE_DIM};

/// Parses the time column of a DataFrame into timestamps
///
/// Accepts string timestamps in the common `%Y-%m-%d %H:%M:%S` /
/// RFC3339-like / date-only formats, native Datetime and Date columns,
/// and Int64 epoch seconds.
pub fn parse_time_column(df: &DataFrame, column: &str) -> PolarsResult<Vec<NaiveDateTime>> {
    let col = df.column(column)?;

    match col.dtype() {
        DataType::String => {
            let ca = col.str()?;
            let mut out = Vec::with_capacity(ca.len());
            for i in 0..ca.len() {
                let raw = ca.get(i).ok_or_else(|| {
                    PolarsError::ComputeError(format!("Null timestamp at row {}", i).into())
                })?;
                out.push(parse_timestamp_str(raw).ok_or_else(|| {
                    PolarsError::ComputeError(
                        format!("Unparseable timestamp {:?} at row {}", raw, i).into(),
                    )
                })?);
            }
            Ok(out)
        }
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let ints = col.cast(&DataType::Int64)?;
            let ca = ints.i64()?;
            let mut out = Vec::with_capacity(ca.len());
            for i in 0..ca.len() {
                let v = ca.get(i).unwrap_or(0);
                let (secs, nanos) = match unit {
                    TimeUnit::Nanoseconds => (v.div_euclid(1_000_000_000), v.rem_euclid(1_000_000_000)),
                    TimeUnit::Microseconds => (v.div_euclid(1_000_000), v.rem_euclid(1_000_000) * 1_000),
                    TimeUnit::Milliseconds => (v.div_euclid(1_000), v.rem_euclid(1_000) * 1_000_000),
                };
                let dt = DateTime::from_timestamp(secs, nanos as u32).ok_or_else(|| {
                    PolarsError::ComputeError(format!("Invalid timestamp at row {}", i).into())
                })?;
                out.push(dt.naive_utc());
            }
            Ok(out)
        }
        DataType::Date => {
            let ints = col.cast(&DataType::Int32)?;
            let ca = ints.i32()?;
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
            let mut out = Vec::with_capacity(ca.len());
            for i in 0..ca.len() {
                let days = ca.get(i).unwrap_or(0);
                let date = epoch + Duration::days(days as i64);
                out.push(date.and_hms_opt(0, 0, 0).unwrap());
            }
            Ok(out)
        }
        DataType::Int64 => {
            let ca = col.i64()?;
            let mut out = Vec::with_capacity(ca.len());
            for i in 0..ca.len() {
                let secs = ca.get(i).unwrap_or(0);
                let dt = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                    PolarsError::ComputeError(format!("Invalid epoch at row {}", i).into())
                })?;
                out.push(dt.naive_utc());
            }
            Ok(out)
        }
        other => Err(PolarsError::ComputeError(
            format!("Unsupported time column dtype: {:?}", other).into(),
        )),
    }
}

fn parse_timestamp_str(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    None
}

/// Real-valued time features for the `timeF` embedding, scaled to [-0.5, 0.5]
///
/// Feature order: minute-of-hour, hour-of-day, day-of-week, day-of-month,
/// day-of-year.
pub fn time_features(timestamps: &[NaiveDateTime]) -> Vec<[f32; TIME_FEATURE_DIM]> {
    timestamps
        .iter()
        .map(|ts| {
            [
                ts.minute() as f32 / 59.0 - 0.5,
                ts.hour() as f32 / 23.0 - 0.5,
                ts.weekday().num_days_from_monday() as f32 / 6.0 - 0.5,
                (ts.day() - 1) as f32 / 30.0 - 0.5,
                (ts.ordinal() - 1) as f32 / 365.0 - 0.5,
            ]
        })
        .collect()
}

/// Integer calendar marks for the `fixed` and `learned` embeddings
///
/// Mark order: month (1..=12), day-of-month (1..=31), weekday (0..=6),
/// hour (0..=23), minute bucket (0..MINUTE_BUCKETS).
pub fn calendar_marks(timestamps: &[NaiveDateTime]) -> Vec<[i64; TIME_FEATURE_DIM]> {
    let bucket_width = (60 / MINUTE_BUCKETS) as u32;
    timestamps
        .iter()
        .map(|ts| {
            [
                ts.month() as i64,
                ts.day() as i64,
                ts.weekday().num_days_from_monday() as i64,
                ts.hour() as i64,
                (ts.minute() / bucket_width) as i64,
            ]
        })
        .collect()
}

/// Infers the sampling frequency of a series as the median timestamp delta
///
/// Falls back to one hour when fewer than two timestamps are available.
pub fn infer_frequency(timestamps: &[NaiveDateTime]) -> Duration {
    if timestamps.len() < 2 {
        return Duration::hours(1);
    }
    let mut deltas: Vec<i64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .filter(|&d| d > 0)
        .collect();
    if deltas.is_empty() {
        return Duration::hours(1);
    }
    deltas.sort_unstable();
    Duration::seconds(deltas[deltas.len() / 2])
}

/// Generates the forecast horizon's timestamps past the last observation
pub fn future_timestamps(
    last: NaiveDateTime,
    frequency: Duration,
    horizon: usize,
) -> Vec<NaiveDateTime> {
    (1..=horizon as i64)
        .map(|step| last + frequency * step as i32)
        .collect()
}
