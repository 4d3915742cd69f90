pub mod step_1_tensor_preparation;
pub mod step_2_attention;
pub mod step_3_embedding;
pub mod step_4_transformer_model_arch;
pub mod step_5_train_model;
pub mod step_6_prediction;
pub mod step_7_model_serialization;

pub use step_1_tensor_preparation::{DataError, NormalizationStats, WindowTensors};
pub use step_3_embedding::TimeEncoding;
pub use step_4_transformer_model_arch::{Activation, TimeSeriesTransformer, TransformerConfig};
pub use step_5_train_model::{TrainingConfig, TrainingReport};
pub use step_7_model_serialization::ModelMetadata;
