// External imports
use burn::tensor::Tensor;
use burn_ndarray::{NdArray, NdArrayDevice};
use chrono::{Duration, NaiveDate};

// Internal imports
use crate::constants::TIME_FEATURE_DIM;
use crate::transformer::step_3_embedding::{
    positional_encoding, DataEmbedding, TimeEncoding, TokenEmbedding,
};
use crate::util::feature_engineering::{calendar_marks, time_features};

type TestBackend = NdArray<f32>;

fn hourly_timestamps(n: usize) -> Vec<chrono::NaiveDateTime> {
    let base = NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n).map(|i| base + Duration::hours(i as i64)).collect()
}

fn marks_tensor(
    device: &NdArrayDevice,
    n: usize,
    encoding: TimeEncoding,
) -> Tensor<TestBackend, 3> {
    let ts = hourly_timestamps(n);
    let flat: Vec<f32> = match encoding {
        TimeEncoding::TimeF => time_features(&ts).into_iter().flatten().collect(),
        _ => calendar_marks(&ts)
            .into_iter()
            .flat_map(|m| m.into_iter().map(|v| v as f32))
            .collect(),
    };
    Tensor::<TestBackend, 1>::from_floats(flat.as_slice(), device).reshape([
        1,
        n,
        TIME_FEATURE_DIM,
    ])
}

#[test]
fn test_token_embedding_preserves_sequence_length() {
    let device = NdArrayDevice::default();
    let embedding = TokenEmbedding::<TestBackend>::new(3, 8, &device);

    let x = Tensor::<TestBackend, 3>::ones([2, 24, 3], &device);
    let out = embedding.forward(x);
    assert_eq!(out.dims(), [2, 24, 8]);
}

#[test]
fn test_positional_encoding_bounded() {
    let device = NdArrayDevice::default();
    let pe = positional_encoding::<TestBackend>(32, 16, &device);
    assert_eq!(pe.dims(), [1, 32, 16]);

    let data = pe.to_data().convert::<f32>();
    for &v in data.as_slice::<f32>().unwrap() {
        assert!((-1.0..=1.0).contains(&v));
    }
}

#[test]
fn test_data_embedding_shapes_for_all_encodings() {
    let device = NdArrayDevice::default();
    let (c_in, d_model, seq_len) = (3, 16, 24);
    let x = Tensor::<TestBackend, 3>::ones([1, seq_len, c_in], &device);

    for encoding in [TimeEncoding::TimeF, TimeEncoding::Fixed, TimeEncoding::Learned] {
        let embedding = DataEmbedding::<TestBackend>::new(c_in, d_model, encoding, 0.0, &device);
        let marks = marks_tensor(&device, seq_len, encoding);
        let out = embedding.forward(x.clone(), marks);
        assert_eq!(out.dims(), [1, seq_len, d_model], "encoding {:?}", encoding);
    }
}

#[test]
fn test_data_embedding_uses_time_marks() {
    // Two identical value sequences with different timestamps must embed
    // differently, otherwise the temporal branch is dead.
    let device = NdArrayDevice::default();
    let (c_in, d_model, seq_len) = (2, 8, 12);
    let embedding =
        DataEmbedding::<TestBackend>::new(c_in, d_model, TimeEncoding::TimeF, 0.0, &device);

    let x = Tensor::<TestBackend, 3>::ones([1, seq_len, c_in], &device);
    let marks_a = marks_tensor(&device, seq_len, TimeEncoding::TimeF);
    let marks_b = marks_a.clone() + 0.3;

    let out_a = embedding.forward(x.clone(), marks_a);
    let out_b = embedding.forward(x, marks_b);

    let a = out_a.to_data().convert::<f32>();
    let b = out_b.to_data().convert::<f32>();
    let a = a.as_slice::<f32>().unwrap();
    let b = b.as_slice::<f32>().unwrap();
    let max_delta = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0f32, f32::max);
    assert!(max_delta > 1e-6);
}
