// External imports
use burn::module::Module;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig, PaddingConfig1d};
use burn::tensor::{backend::Backend, Int, Tensor};
use serde::{Deserialize, Serialize};

// Internal imports
use crate::constants::{DAY_VOCAB, HOUR_VOCAB, MINUTE_BUCKETS, MONTH_VOCAB, TIME_FEATURE_DIM, WEEKDAY_VOCAB};

/// How timestamps are turned into embedding inputs
///
/// `TimeF` projects real-valued time features; `Fixed` looks calendar
/// indices up in sinusoidal tables, `Learned` in trainable ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeEncoding {
    TimeF,
    Fixed,
    Learned,
}

impl Default for TimeEncoding {
    fn default() -> Self {
        TimeEncoding::TimeF
    }
}

/// Sinusoidal values for one table/sequence position
fn sinusoid_row(pos: usize, d_model: usize, out: &mut Vec<f32>) {
    for i in 0..d_model {
        let exponent = (2 * (i / 2)) as f64 / d_model as f64;
        let angle = pos as f64 / 10000f64.powf(exponent);
        out.push(if i % 2 == 0 { angle.sin() } else { angle.cos() } as f32);
    }
}

/// Fixed sinusoidal positional encoding, shape [1, seq_len, d_model]
pub fn positional_encoding<B: Backend>(
    seq_len: usize,
    d_model: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    let mut data = Vec::with_capacity(seq_len * d_model);
    for pos in 0..seq_len {
        sinusoid_row(pos, d_model, &mut data);
    }
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([1, seq_len, d_model])
}

/// Sinusoidal lookup table over a calendar vocabulary, shape [vocab, d_model]
fn fixed_table<B: Backend>(vocab: usize, d_model: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut data = Vec::with_capacity(vocab * d_model);
    for pos in 0..vocab {
        sinusoid_row(pos, d_model, &mut data);
    }
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([vocab, d_model])
}

/// Projects raw observations into the model width with a kernel-3
/// convolution along time, padded circularly
#[derive(Module, Debug)]
pub struct TokenEmbedding<B: Backend> {
    conv: Conv1d<B>,
}

impl<B: Backend> TokenEmbedding<B> {
    pub fn new(c_in: usize, d_model: usize, device: &B::Device) -> Self {
        let conv = Conv1dConfig::new(c_in, d_model, 3)
            .with_padding(PaddingConfig1d::Valid)
            .with_bias(false)
            .init(device);
        Self { conv }
    }

    /// [b, seq, c_in] -> [b, seq, d_model]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let seq_len = x.dims()[1];
        // Circular padding by one step on both ends; burn's Conv1d padding
        // options do not include wrap-around
        let last = x.clone().narrow(1, seq_len - 1, 1);
        let first = x.clone().narrow(1, 0, 1);
        let padded = Tensor::cat(vec![last, x, first], 1);
        let out = self.conv.forward(padded.swap_dims(1, 2));
        out.swap_dims(1, 2)
    }
}

/// Trainable calendar embeddings (month, day, weekday, hour, minute bucket)
#[derive(Module, Debug)]
pub struct TemporalEmbedding<B: Backend> {
    month_embed: Embedding<B>,
    day_embed: Embedding<B>,
    weekday_embed: Embedding<B>,
    hour_embed: Embedding<B>,
    minute_embed: Embedding<B>,
}

impl<B: Backend> TemporalEmbedding<B> {
    pub fn new(d_model: usize, device: &B::Device) -> Self {
        Self {
            month_embed: EmbeddingConfig::new(MONTH_VOCAB, d_model).init(device),
            day_embed: EmbeddingConfig::new(DAY_VOCAB, d_model).init(device),
            weekday_embed: EmbeddingConfig::new(WEEKDAY_VOCAB, d_model).init(device),
            hour_embed: EmbeddingConfig::new(HOUR_VOCAB, d_model).init(device),
            minute_embed: EmbeddingConfig::new(MINUTE_BUCKETS, d_model).init(device),
        }
    }

    /// `marks` [b, seq, 5] with columns month/day/weekday/hour/minute
    pub fn forward(&self, marks: Tensor<B, 3, Int>) -> Tensor<B, 3> {
        let [batch, seq_len, _] = marks.dims();
        let field = |i: usize| -> Tensor<B, 2, Int> {
            marks.clone().narrow(2, i, 1).reshape([batch, seq_len])
        };

        self.month_embed.forward(field(0))
            + self.day_embed.forward(field(1))
            + self.weekday_embed.forward(field(2))
            + self.hour_embed.forward(field(3))
            + self.minute_embed.forward(field(4))
    }
}

/// Non-trainable calendar embedding via sinusoidal tables
fn fixed_temporal_embedding<B: Backend>(
    marks: Tensor<B, 3, Int>,
    d_model: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    let [batch, seq_len, _] = marks.dims();
    let vocabs = [MONTH_VOCAB, DAY_VOCAB, WEEKDAY_VOCAB, HOUR_VOCAB, MINUTE_BUCKETS];

    let mut total: Option<Tensor<B, 3>> = None;
    for (i, vocab) in vocabs.into_iter().enumerate() {
        let idx: Tensor<B, 1, Int> = marks
            .clone()
            .narrow(2, i, 1)
            .reshape([batch * seq_len]);
        let table = fixed_table::<B>(vocab, d_model, device);
        let looked_up = table.select(0, idx).reshape([batch, seq_len, d_model]);
        total = Some(match total {
            Some(t) => t + looked_up,
            None => looked_up,
        });
    }
    total.expect("at least one calendar field")
}

/// Combined embedding: token conv + positional + temporal, then dropout
///
/// This is the entry point both the encoder and the decoder share; only
/// the input width differs between the two instances.
#[derive(Module, Debug)]
pub struct DataEmbedding<B: Backend> {
    value_embedding: TokenEmbedding<B>,
    time_feature_projection: Option<Linear<B>>,
    temporal_embedding: Option<TemporalEmbedding<B>>,
    fixed_tables: bool,
    d_model: usize,
    dropout: Dropout,
}

impl<B: Backend> DataEmbedding<B> {
    pub fn new(
        c_in: usize,
        d_model: usize,
        time_encoding: TimeEncoding,
        dropout: f64,
        device: &B::Device,
    ) -> Self {
        let (time_feature_projection, temporal_embedding, fixed_tables) = match time_encoding {
            TimeEncoding::TimeF => (
                Some(
                    LinearConfig::new(TIME_FEATURE_DIM, d_model)
                        .with_bias(false)
                        .init(device),
                ),
                None,
                false,
            ),
            TimeEncoding::Learned => (None, Some(TemporalEmbedding::new(d_model, device)), false),
            TimeEncoding::Fixed => (None, None, true),
        };

        Self {
            value_embedding: TokenEmbedding::new(c_in, d_model, device),
            time_feature_projection,
            temporal_embedding,
            fixed_tables,
            d_model,
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    /// `x` [b, seq, c_in]; `marks` [b, seq, TIME_FEATURE_DIM] -> [b, seq, d_model]
    pub fn forward(&self, x: Tensor<B, 3>, marks: Tensor<B, 3>) -> Tensor<B, 3> {
        let seq_len = x.dims()[1];
        let device = x.device();

        let mut out = self.value_embedding.forward(x)
            + positional_encoding::<B>(seq_len, self.d_model, &device);

        if let Some(projection) = &self.time_feature_projection {
            out = out + projection.forward(marks);
        } else if let Some(temporal) = &self.temporal_embedding {
            out = out + temporal.forward(marks.int());
        } else if self.fixed_tables {
            out = out + fixed_temporal_embedding(marks.int(), self.d_model, &device);
        }

        self.dropout.forward(out)
    }
}
