// External imports
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};
use std::marker::PhantomData;

/// Builds a causal mask of shape [seq_q, seq_kv]
///
/// Position i may attend to positions j <= i only; later positions are
/// marked 0.0 and get filled with -inf before the softmax.
fn causal_mask<B: Backend>(seq_q: usize, seq_kv: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut mask_data = Vec::with_capacity(seq_q * seq_kv);
    for i in 0..seq_q {
        for j in 0..seq_kv {
            mask_data.push(if j <= i { 1.0f32 } else { 0.0f32 });
        }
    }
    Tensor::<B, 1>::from_floats(mask_data.as_slice(), device).reshape([seq_q, seq_kv])
}

/// Scaled dot-product attention over multi-head tensors
///
/// Inputs are [batch, heads, seq, head_dim]. With `mask_flag` set the
/// attention is causal, which is what the decoder's self-attention needs.
#[derive(Module, Debug)]
pub struct FullAttention<B: Backend> {
    mask_flag: bool,
    dropout: Dropout,
    _phantom: PhantomData<B>,
}

impl<B: Backend> FullAttention<B> {
    pub fn new(mask_flag: bool, attention_dropout: f64) -> Self {
        Self {
            mask_flag,
            dropout: DropoutConfig::new(attention_dropout).init(),
            _phantom: PhantomData,
        }
    }

    /// Forward pass
    ///
    /// `queries` [b, h, l_q, e], `keys` [b, h, l_kv, e], `values`
    /// [b, h, l_kv, d] -> [b, h, l_q, d]
    pub fn forward(
        &self,
        queries: Tensor<B, 4>,
        keys: Tensor<B, 4>,
        values: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, heads, seq_q, head_dim] = queries.dims();
        let seq_kv = keys.dims()[2];
        let scale = 1.0 / (head_dim as f64).sqrt();

        // [b, h, l_q, l_kv]
        let mut scores = queries.matmul(keys.swap_dims(2, 3)) * scale;

        if self.mask_flag {
            let mask = causal_mask::<B>(seq_q, seq_kv, &scores.device())
                .unsqueeze::<4>()
                .expand([batch, heads, seq_q, seq_kv]);
            scores = scores.mask_fill(mask.equal_elem(0.0), f32::NEG_INFINITY);
        }

        let attn = self.dropout.forward(activation::softmax(scores, 3));
        attn.matmul(values)
    }
}

/// Multi-head attention layer
///
/// Projects queries/keys/values into `n_heads` subspaces, runs the inner
/// attention per head and merges the heads back through an output
/// projection.
#[derive(Module, Debug)]
pub struct AttentionLayer<B: Backend> {
    inner_attention: FullAttention<B>,
    query_projection: Linear<B>,
    key_projection: Linear<B>,
    value_projection: Linear<B>,
    out_projection: Linear<B>,
    n_heads: usize,
}

impl<B: Backend> AttentionLayer<B> {
    pub fn new(
        inner_attention: FullAttention<B>,
        d_model: usize,
        n_heads: usize,
        device: &B::Device,
    ) -> Self {
        let d_keys = d_model / n_heads;
        let d_values = d_model / n_heads;

        Self {
            inner_attention,
            query_projection: LinearConfig::new(d_model, d_keys * n_heads).init(device),
            key_projection: LinearConfig::new(d_model, d_keys * n_heads).init(device),
            value_projection: LinearConfig::new(d_model, d_values * n_heads).init(device),
            out_projection: LinearConfig::new(d_values * n_heads, d_model).init(device),
            n_heads,
        }
    }

    /// Forward pass with separate query/key/value sources
    ///
    /// `queries` [b, l_q, d_model], `keys`/`values` [b, l_kv, d_model]
    /// -> [b, l_q, d_model]. Cross-attention passes the encoder output as
    /// keys and values.
    pub fn forward(
        &self,
        queries: Tensor<B, 3>,
        keys: Tensor<B, 3>,
        values: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let [batch, seq_q, _] = queries.dims();
        let seq_kv = keys.dims()[1];
        let heads = self.n_heads;

        let q = self.query_projection.forward(queries);
        let k = self.key_projection.forward(keys);
        let v = self.value_projection.forward(values);

        let head_dim = q.dims()[2] / heads;

        // [b, l, h*e] -> [b, h, l, e]
        let q = q.reshape([batch, seq_q, heads, head_dim]).swap_dims(1, 2);
        let k = k.reshape([batch, seq_kv, heads, head_dim]).swap_dims(1, 2);
        let v = v.reshape([batch, seq_kv, heads, head_dim]).swap_dims(1, 2);

        let out = self.inner_attention.forward(q, k, v);

        // [b, h, l_q, e] -> [b, l_q, h*e]
        let out = out
            .swap_dims(1, 2)
            .reshape([batch, seq_q, heads * head_dim]);

        self.out_projection.forward(out)
    }
}
