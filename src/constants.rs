// Column naming conventions
pub const TIME_COLUMN: &str = "time";

// Model parameters
pub const DEFAULT_N_PAST: usize = 48; // Number of past time steps fed to the encoder
pub const DEFAULT_HORIZON: usize = 12; // Number of future steps to forecast
pub const DEFAULT_DROPOUT: f64 = 0.05;

// Time feature encoding
pub const TIME_FEATURE_DIM: usize = 5; // minute, hour, weekday, day-of-month, day-of-year
pub const MINUTE_BUCKETS: usize = 4; // 15-minute buckets for the fixed/learned tables

// Embedding vocabulary sizes for calendar marks
pub const MONTH_VOCAB: usize = 13;
pub const DAY_VOCAB: usize = 32;
pub const WEEKDAY_VOCAB: usize = 7;
pub const HOUR_VOCAB: usize = 24;

// Data preprocessing
pub const VALIDATION_SPLIT_RATIO: f64 = 0.2; // 20% of windows for validation

// Model paths
pub const MODEL_PATH: &str = "models";
pub const MODEL_FILE_NAME: &str = "_transformer_model";
