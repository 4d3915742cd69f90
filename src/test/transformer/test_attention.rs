// External imports
use burn::tensor::Tensor;
use burn_ndarray::{NdArray, NdArrayDevice};

// Internal imports
use crate::transformer::step_2_attention::{AttentionLayer, FullAttention};

type TestBackend = NdArray<f32>;

fn ramp_tensor(dims: [usize; 4], device: &NdArrayDevice) -> Tensor<TestBackend, 4> {
    let n: usize = dims.iter().product();
    let data: Vec<f32> = (0..n).map(|i| (i % 7) as f32 * 0.1 - 0.3).collect();
    Tensor::<TestBackend, 1>::from_floats(data.as_slice(), device).reshape(dims)
}

#[test]
fn test_full_attention_output_shape() {
    let device = NdArrayDevice::default();
    let attention = FullAttention::<TestBackend>::new(false, 0.0);

    let q = ramp_tensor([2, 2, 5, 4], &device);
    let k = ramp_tensor([2, 2, 5, 4], &device);
    let v = ramp_tensor([2, 2, 5, 4], &device);

    let out = attention.forward(q, k, v);
    assert_eq!(out.dims(), [2, 2, 5, 4]);
}

#[test]
fn test_cross_attention_shapes_differ() {
    // Query length and key/value length need not match (cross-attention)
    let device = NdArrayDevice::default();
    let attention = FullAttention::<TestBackend>::new(false, 0.0);

    let q = ramp_tensor([1, 2, 3, 4], &device);
    let k = ramp_tensor([1, 2, 8, 4], &device);
    let v = ramp_tensor([1, 2, 8, 4], &device);

    let out = attention.forward(q, k, v);
    assert_eq!(out.dims(), [1, 2, 3, 4]);
}

#[test]
fn test_causal_mask_blocks_future() {
    // With the causal mask on, the output at position t must not change
    // when inputs strictly after t change.
    let device = NdArrayDevice::default();
    let attention = FullAttention::<TestBackend>::new(true, 0.0);

    let seq_len = 6;
    let q = ramp_tensor([1, 1, seq_len, 4], &device);
    let kv_a = ramp_tensor([1, 1, seq_len, 4], &device);

    // Perturb only the last position of keys/values
    let perturbation = Tensor::<TestBackend, 4>::ones([1, 1, 1, 4], &device) * 5.0;
    let kv_b = Tensor::cat(
        vec![
            kv_a.clone().narrow(2, 0, seq_len - 1),
            kv_a.clone().narrow(2, seq_len - 1, 1) + perturbation,
        ],
        2,
    );

    let out_a = attention.forward(q.clone(), kv_a.clone(), kv_a);
    let out_b = attention.forward(q, kv_b.clone(), kv_b);

    let a = out_a.narrow(2, 0, seq_len - 1).to_data().convert::<f32>();
    let b = out_b.narrow(2, 0, seq_len - 1).to_data().convert::<f32>();
    let a = a.as_slice::<f32>().unwrap();
    let b = b.as_slice::<f32>().unwrap();
    for i in 0..a.len() {
        assert!(
            (a[i] - b[i]).abs() < 1e-5,
            "position {} leaked future information: {} vs {}",
            i,
            a[i],
            b[i]
        );
    }
}

#[test]
fn test_unmasked_attention_sees_future() {
    // Sanity check for the test above: without the mask the earlier
    // positions do react to the perturbation.
    let device = NdArrayDevice::default();
    let attention = FullAttention::<TestBackend>::new(false, 0.0);

    let seq_len = 6;
    let q = ramp_tensor([1, 1, seq_len, 4], &device);
    let kv_a = ramp_tensor([1, 1, seq_len, 4], &device);
    let perturbation = Tensor::<TestBackend, 4>::ones([1, 1, 1, 4], &device) * 5.0;
    let kv_b = Tensor::cat(
        vec![
            kv_a.clone().narrow(2, 0, seq_len - 1),
            kv_a.clone().narrow(2, seq_len - 1, 1) + perturbation,
        ],
        2,
    );

    let out_a = attention.forward(q.clone(), kv_a.clone(), kv_a);
    let out_b = attention.forward(q, kv_b.clone(), kv_b);

    let a = out_a.narrow(2, 0, 1).to_data().convert::<f32>();
    let b = out_b.narrow(2, 0, 1).to_data().convert::<f32>();
    let a = a.as_slice::<f32>().unwrap();
    let b = b.as_slice::<f32>().unwrap();
    let max_delta = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0f32, f32::max);
    assert!(max_delta > 1e-6, "expected unmasked attention to attend ahead");
}

#[test]
fn test_attention_layer_projects_back_to_model_dim() {
    let device = NdArrayDevice::default();
    let d_model = 16;
    let layer = AttentionLayer::<TestBackend>::new(
        FullAttention::new(false, 0.0),
        d_model,
        4,
        &device,
    );

    let x = Tensor::<TestBackend, 3>::ones([3, 10, d_model], &device);
    let out = layer.forward(x.clone(), x.clone(), x);
    assert_eq!(out.dims(), [3, 10, d_model]);
}
