// External imports
use burn::module::Module;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::pool::{MaxPool1d, MaxPool1dConfig};
use burn::nn::{
    BatchNorm, BatchNormConfig, Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear,
    LinearConfig, PaddingConfig1d,
};
use burn::tensor::{activation, backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

// Internal imports
use crate::constants::{DEFAULT_DROPOUT, DEFAULT_HORIZON, DEFAULT_N_PAST};
use crate::transformer::step_2_attention::{AttentionLayer, FullAttention};
use crate::transformer::step_3_embedding::{DataEmbedding, TimeEncoding};

/// Activation used inside the position-wise feed-forward blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Gelu,
    Relu,
}

impl Default for Activation {
    fn default() -> Self {
        Activation::Gelu
    }
}

fn apply_activation<B: Backend>(gelu: bool, x: Tensor<B, 3>) -> Tensor<B, 3> {
    if gelu {
        activation::gelu(x)
    } else {
        activation::relu(x)
    }
}

/// Hyperparameters of the sequence-to-sequence transformer forecaster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerConfig {
    /// Number of past steps used for forecasting the future
    pub n_past: usize,
    /// Number of steps to forecast
    pub horizon: usize,
    /// Input width of the encoder; None uses the data dimension
    pub encoder_input_size: Option<usize>,
    /// Input width of the decoder; None uses the encoder input size
    pub decoder_input_size: Option<usize>,
    pub num_encoder_layers: usize,
    pub num_decoder_layers: usize,
    /// Length of the known-history slice prepended to the decoder input
    pub start_token_len: usize,
    /// Attention factor, consumed by sparse-attention variants
    pub factor: usize,
    /// Model (latent) dimension
    pub model_dim: usize,
    /// Time feature encoding type
    pub time_encoding: TimeEncoding,
    pub dropout: f64,
    pub activation: Activation,
    /// Number of attention heads
    pub n_heads: usize,
    /// Hidden dimension of the feed-forward blocks
    pub fcn_dim: usize,
    /// Whether to downsample between encoder layers
    pub distil: bool,
    /// Forecast only this feature column instead of all of them
    pub target_seq_index: Option<usize>,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            n_past: DEFAULT_N_PAST,
            horizon: DEFAULT_HORIZON,
            encoder_input_size: None,
            decoder_input_size: None,
            num_encoder_layers: 2,
            num_decoder_layers: 1,
            start_token_len: 0,
            factor: 3,
            model_dim: 512,
            time_encoding: TimeEncoding::TimeF,
            dropout: DEFAULT_DROPOUT,
            activation: Activation::Gelu,
            n_heads: 8,
            fcn_dim: 2048,
            distil: true,
            target_seq_index: None,
        }
    }
}

/// Downsampling block placed between encoder layers when distillation is on
///
/// Conv + BatchNorm + ELU + stride-2 max pooling, halving the sequence
/// length.
#[derive(Module, Debug)]
pub struct ConvLayer<B: Backend> {
    conv: Conv1d<B>,
    norm: BatchNorm<B, 1>,
    pool: MaxPool1d,
}

impl<B: Backend> ConvLayer<B> {
    pub fn new(d_model: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv1dConfig::new(d_model, d_model, 3)
                .with_padding(PaddingConfig1d::Same)
                .init(device),
            norm: BatchNormConfig::new(d_model).init(device),
            pool: MaxPool1dConfig::new(3)
                .with_stride(2)
                .with_padding(PaddingConfig1d::Explicit(1))
                .init(),
        }
    }

    /// [b, seq, d_model] -> [b, ceil(seq / 2), d_model]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.conv.forward(x.swap_dims(1, 2));
        let x = self.norm.forward(x);
        let x = elu(x);
        let x = self.pool.forward(x);
        x.swap_dims(1, 2)
    }
}

/// ELU with alpha 1: x for x > 0, exp(x) - 1 otherwise
fn elu<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 3> {
    activation::relu(x.clone()) + (x.clamp_max(0.0).exp() - 1.0)
}

/// Self-attention + feed-forward encoder block
#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    attention: AttentionLayer<B>,
    conv1: Conv1d<B>,
    conv2: Conv1d<B>,
    norm1: LayerNorm<B>,
    norm2: LayerNorm<B>,
    dropout: Dropout,
    gelu_activation: bool,
}

impl<B: Backend> EncoderLayer<B> {
    pub fn new(
        attention: AttentionLayer<B>,
        d_model: usize,
        fcn_dim: usize,
        dropout: f64,
        activation: Activation,
        device: &B::Device,
    ) -> Self {
        Self {
            attention,
            conv1: Conv1dConfig::new(d_model, fcn_dim, 1).init(device),
            conv2: Conv1dConfig::new(fcn_dim, d_model, 1).init(device),
            norm1: LayerNormConfig::new(d_model).init(device),
            norm2: LayerNormConfig::new(d_model).init(device),
            dropout: DropoutConfig::new(dropout).init(),
            gelu_activation: activation == Activation::Gelu,
        }
    }

    /// [b, seq, d_model] -> [b, seq, d_model]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let attn_out = self
            .attention
            .forward(x.clone(), x.clone(), x.clone());
        let x = self.norm1.forward(x + self.dropout.forward(attn_out));

        // Position-wise feed-forward as two kernel-1 convolutions
        let y = self.dropout.forward(apply_activation(
            self.gelu_activation,
            self.conv1.forward(x.clone().swap_dims(1, 2)),
        ));
        let y = self.dropout.forward(self.conv2.forward(y)).swap_dims(1, 2);

        self.norm2.forward(x + y)
    }
}

/// Encoder stack with optional distillation between layers
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    attn_layers: Vec<EncoderLayer<B>>,
    conv_layers: Option<Vec<ConvLayer<B>>>,
    norm: LayerNorm<B>,
}

impl<B: Backend> Encoder<B> {
    pub fn new(
        attn_layers: Vec<EncoderLayer<B>>,
        conv_layers: Option<Vec<ConvLayer<B>>>,
        d_model: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            attn_layers,
            conv_layers,
            norm: LayerNormConfig::new(d_model).init(device),
        }
    }

    pub fn forward(&self, mut x: Tensor<B, 3>) -> Tensor<B, 3> {
        for (i, layer) in self.attn_layers.iter().enumerate() {
            x = layer.forward(x);
            if let Some(convs) = &self.conv_layers {
                if let Some(conv) = convs.get(i) {
                    x = conv.forward(x);
                }
            }
        }
        self.norm.forward(x)
    }
}

/// Masked self-attention + cross-attention + feed-forward decoder block
#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    self_attention: AttentionLayer<B>,
    cross_attention: AttentionLayer<B>,
    conv1: Conv1d<B>,
    conv2: Conv1d<B>,
    norm1: LayerNorm<B>,
    norm2: LayerNorm<B>,
    norm3: LayerNorm<B>,
    dropout: Dropout,
    gelu_activation: bool,
}

impl<B: Backend> DecoderLayer<B> {
    pub fn new(
        self_attention: AttentionLayer<B>,
        cross_attention: AttentionLayer<B>,
        d_model: usize,
        fcn_dim: usize,
        dropout: f64,
        activation: Activation,
        device: &B::Device,
    ) -> Self {
        Self {
            self_attention,
            cross_attention,
            conv1: Conv1dConfig::new(d_model, fcn_dim, 1).init(device),
            conv2: Conv1dConfig::new(fcn_dim, d_model, 1).init(device),
            norm1: LayerNormConfig::new(d_model).init(device),
            norm2: LayerNormConfig::new(d_model).init(device),
            norm3: LayerNormConfig::new(d_model).init(device),
            dropout: DropoutConfig::new(dropout).init(),
            gelu_activation: activation == Activation::Gelu,
        }
    }

    /// `x` [b, dec_seq, d_model], `cross` [b, enc_seq, d_model]
    pub fn forward(&self, x: Tensor<B, 3>, cross: Tensor<B, 3>) -> Tensor<B, 3> {
        let self_out = self
            .self_attention
            .forward(x.clone(), x.clone(), x.clone());
        let x = self.norm1.forward(x + self.dropout.forward(self_out));

        let cross_out = self
            .cross_attention
            .forward(x.clone(), cross.clone(), cross);
        let x = self.norm2.forward(x + self.dropout.forward(cross_out));

        let y = self.dropout.forward(apply_activation(
            self.gelu_activation,
            self.conv1.forward(x.clone().swap_dims(1, 2)),
        ));
        let y = self.dropout.forward(self.conv2.forward(y)).swap_dims(1, 2);

        self.norm3.forward(x + y)
    }
}

/// Decoder stack with final projection to the output width
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    layers: Vec<DecoderLayer<B>>,
    norm: LayerNorm<B>,
    projection: Linear<B>,
}

impl<B: Backend> Decoder<B> {
    pub fn new(
        layers: Vec<DecoderLayer<B>>,
        d_model: usize,
        c_out: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            layers,
            norm: LayerNormConfig::new(d_model).init(device),
            projection: LinearConfig::new(d_model, c_out).init(device),
        }
    }

    pub fn forward(&self, mut x: Tensor<B, 3>, cross: Tensor<B, 3>) -> Tensor<B, 3> {
        for layer in &self.layers {
            x = layer.forward(x, cross.clone());
        }
        self.projection.forward(self.norm.forward(x))
    }
}

/// Sequence-to-sequence transformer for multivariate forecasting
///
/// The encoder contextualizes the historical window; the decoder receives
/// the trailing slice of the history (the start token) followed by zero
/// placeholders for the horizon, cross-attends to the encoder output and
/// projects back to the data width.
#[derive(Module, Debug)]
pub struct TimeSeriesTransformer<B: Backend> {
    enc_embedding: DataEmbedding<B>,
    dec_embedding: DataEmbedding<B>,
    encoder: Encoder<B>,
    decoder: Decoder<B>,
    n_past: usize,
    horizon: usize,
    start_token_len: usize,
    decoder_input_size: usize,
    c_out: usize,
    single_target: bool,
}

impl<B: Backend> TimeSeriesTransformer<B> {
    /// Builds the model for data with `n_features` input columns
    pub fn new(config: &TransformerConfig, n_features: usize, device: &B::Device) -> Self {
        let enc_in = config.encoder_input_size.unwrap_or(n_features);
        let dec_in = config.decoder_input_size.unwrap_or(enc_in);
        let c_out = enc_in;
        let d_model = config.model_dim;

        let enc_embedding = DataEmbedding::new(
            enc_in,
            d_model,
            config.time_encoding,
            config.dropout,
            device,
        );
        let dec_embedding = DataEmbedding::new(
            dec_in,
            d_model,
            config.time_encoding,
            config.dropout,
            device,
        );

        let attn_layers = (0..config.num_encoder_layers)
            .map(|_| {
                EncoderLayer::new(
                    AttentionLayer::new(
                        FullAttention::new(false, config.dropout),
                        d_model,
                        config.n_heads,
                        device,
                    ),
                    d_model,
                    config.fcn_dim,
                    config.dropout,
                    config.activation,
                    device,
                )
            })
            .collect();
        let conv_layers = if config.distil && config.num_encoder_layers > 1 {
            Some(
                (0..config.num_encoder_layers - 1)
                    .map(|_| ConvLayer::new(d_model, device))
                    .collect(),
            )
        } else {
            None
        };
        let encoder = Encoder::new(attn_layers, conv_layers, d_model, device);

        let dec_layers = (0..config.num_decoder_layers)
            .map(|_| {
                DecoderLayer::new(
                    AttentionLayer::new(
                        FullAttention::new(true, config.dropout),
                        d_model,
                        config.n_heads,
                        device,
                    ),
                    AttentionLayer::new(
                        FullAttention::new(false, config.dropout),
                        d_model,
                        config.n_heads,
                        device,
                    ),
                    d_model,
                    config.fcn_dim,
                    config.dropout,
                    config.activation,
                    device,
                )
            })
            .collect();
        let decoder = Decoder::new(dec_layers, d_model, c_out, device);

        Self {
            enc_embedding,
            dec_embedding,
            encoder,
            decoder,
            n_past: config.n_past,
            horizon: config.horizon,
            start_token_len: config.start_token_len,
            decoder_input_size: dec_in,
            c_out,
            single_target: config.target_seq_index.is_some(),
        }
    }

    /// Number of output channels per forecast step
    pub fn output_size(&self) -> usize {
        if self.single_target {
            1
        } else {
            self.c_out
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn n_past(&self) -> usize {
        self.n_past
    }

    /// Forward pass
    ///
    /// `past` [b, n_past, enc_in]; `past_marks` [b, n_past, m];
    /// `future_marks` [b, horizon, m] -> [b, horizon, c_out] (or a single
    /// channel when a target column is configured).
    pub fn forward(
        &self,
        past: Tensor<B, 3>,
        past_marks: Tensor<B, 3>,
        future_marks: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let [batch, past_len, _] = past.dims();
        let device = past.device();

        // Decoder input: start token from recent history, zeros for the horizon
        let placeholders =
            Tensor::<B, 3>::zeros([batch, self.horizon, self.decoder_input_size], &device);
        let (dec_inp, dec_marks) = if self.start_token_len > 0 {
            let start = past_len - self.start_token_len;
            let start_token = past.clone().narrow(1, start, self.start_token_len);
            let start_marks = past_marks.clone().narrow(1, start, self.start_token_len);
            (
                Tensor::cat(vec![start_token, placeholders], 1),
                Tensor::cat(vec![start_marks, future_marks], 1),
            )
        } else {
            (placeholders, future_marks)
        };

        let enc_out = self.encoder.forward(self.enc_embedding.forward(past, past_marks));
        let dec_out = self
            .decoder
            .forward(self.dec_embedding.forward(dec_inp, dec_marks), enc_out);

        let dec_len = dec_out.dims()[1];
        let out = dec_out.narrow(1, dec_len - self.horizon, self.horizon);
        if self.single_target {
            out.narrow(2, 0, 1)
        } else {
            out
        }
    }

    /// Calculate MSE loss
    pub fn mse_loss(&self, pred: Tensor<B, 3>, target: Tensor<B, 3>) -> Tensor<B, 1> {
        let diff = pred - target;
        (diff.clone() * diff).mean()
    }

    /// Huber loss, a combination of MSE and MAE that is more robust to outliers
    pub fn huber_loss(&self, pred: Tensor<B, 3>, target: Tensor<B, 3>, delta: f64) -> Tensor<B, 1> {
        let abs_diff = (pred - target).abs();
        let quadratic = abs_diff.clone().clamp_max(delta);
        let linear = abs_diff - quadratic.clone();
        (quadratic.clone() * quadratic * 0.5 + linear * delta).mean()
    }
}
