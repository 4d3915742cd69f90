// External crates
use anyhow::Result;
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::constants::TIME_COLUMN;

/// Generates a synthetic multivariate series for tests and demos
///
/// Hourly timestamps with three coupled channels: a daily-cycle load, a
/// slower temperature wave and a humidity channel anti-correlated with
/// temperature, all with a little seeded noise so runs are reproducible.
pub fn generate_test_dataframe(num_rows: usize) -> Result<DataFrame> {
    generate_seeded_dataframe(num_rows, 42)
}

/// Same as [`generate_test_dataframe`] with an explicit RNG seed
pub fn generate_seeded_dataframe(num_rows: usize, seed: u64) -> Result<DataFrame> {
    let mut rng = StdRng::seed_from_u64(seed);

    let base = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let times: Vec<String> = (0..num_rows)
        .map(|i| {
            (base + Duration::hours(i as i64))
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .collect();

    let mut load = Vec::with_capacity(num_rows);
    let mut temperature = Vec::with_capacity(num_rows);
    let mut humidity = Vec::with_capacity(num_rows);

    for i in 0..num_rows {
        let hour_angle = 2.0 * PI * (i % 24) as f64 / 24.0;
        let season_angle = 2.0 * PI * i as f64 / (24.0 * 30.0);

        let temp = 15.0 + 10.0 * season_angle.sin() + 3.0 * hour_angle.sin()
            + rng.random_range(-0.5..0.5);
        let base_load = 100.0 + 40.0 * hour_angle.cos().abs() + 0.8 * temp;
        load.push(base_load + rng.random_range(-2.0..2.0));
        temperature.push(temp);
        humidity.push((70.0 - 0.9 * temp + rng.random_range(-3.0..3.0)).clamp(5.0, 100.0));
    }

    let df = DataFrame::new(vec![
        Series::new(TIME_COLUMN.into(), times).into(),
        Series::new("load".into(), load).into(),
        Series::new("temperature".into(), temperature).into(),
        Series::new("humidity".into(), humidity).into(),
    ])?;

    Ok(df)
}
