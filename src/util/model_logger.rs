use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// One training run's settings and outcomes, appended to an experiment log
#[derive(Serialize, Deserialize)]
pub struct ModelExperiment {
    pub timestamp: String,
    pub dataset: String,
    pub model_type: String,
    pub model_dim: usize,
    pub n_heads: usize,
    pub num_encoder_layers: usize,
    pub num_decoder_layers: usize,
    pub n_past: usize,
    pub horizon: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub train_loss: Option<f64>,
    pub val_rmse: Option<f64>,
    pub training_time_seconds: Option<f64>,
    pub notes: String,
}

impl ModelExperiment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dataset: &str,
        model_type: &str,
        model_dim: usize,
        n_heads: usize,
        num_encoder_layers: usize,
        num_decoder_layers: usize,
        n_past: usize,
        horizon: usize,
        batch_size: usize,
        learning_rate: f64,
    ) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            dataset: dataset.to_string(),
            model_type: model_type.to_string(),
            model_dim,
            n_heads,
            num_encoder_layers,
            num_decoder_layers,
            n_past,
            horizon,
            batch_size,
            learning_rate,
            train_loss: None,
            val_rmse: None,
            training_time_seconds: None,
            notes: String::new(),
        }
    }

    pub fn set_train_loss(&mut self, loss: f64) {
        self.train_loss = Some(loss);
    }

    pub fn set_val_rmse(&mut self, rmse: f64) {
        self.val_rmse = Some(rmse);
    }

    pub fn set_training_time(&mut self, seconds: f64) {
        self.training_time_seconds = Some(seconds);
    }

    fn csv_header() -> &'static str {
        "timestamp,dataset,model_type,model_dim,n_heads,num_encoder_layers,num_decoder_layers,\
         n_past,horizon,batch_size,learning_rate,train_loss,val_rmse,training_time_seconds,notes"
    }

    fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.timestamp,
            self.dataset,
            self.model_type,
            self.model_dim,
            self.n_heads,
            self.num_encoder_layers,
            self.num_decoder_layers,
            self.n_past,
            self.horizon,
            self.batch_size,
            self.learning_rate,
            self.train_loss.map_or(String::new(), |v| v.to_string()),
            self.val_rmse.map_or(String::new(), |v| v.to_string()),
            self.training_time_seconds
                .map_or(String::new(), |v| format!("{:.1}", v)),
            self.notes.replace(',', ";"),
        )
    }

    /// Appends this experiment to a CSV log, writing the header on first use
    pub fn append_to_log(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let is_new = !path.exists();
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        if is_new {
            writeln!(file, "{}", Self::csv_header())?;
        }
        writeln!(file, "{}", self.csv_row())?;
        Ok(())
    }
}
