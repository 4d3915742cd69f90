/// Test modules for the forecasting package
///
/// * `transformer` - Tests for the attention, embedding and encoder-decoder
///   architecture
/// * `test_tensor_preparation` - Tests for windowing and normalization
/// * `test_serialization` - Tests for model save/load round trips
/// * `test_prediction` - Tests for the forecasting entry point
pub mod test_prediction;
pub mod test_serialization;
pub mod transformer;
