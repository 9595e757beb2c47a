// ============================================================
// Layer 5: Frozen Word Embeddings + Word Dropout
// ============================================================
// The embedding matrix is a parameter that never receives a
// gradient. It still lives in the module record, so a saved
// checkpoint carries its own vectors.
//
// Word dropout builds the decoder's teacher-forced input:
//
//   targets:  [w1  w2  w3  EOS]
//   dropped:  [w1  PAD w3  EOS]     (each kept with prob keep)
//   shifted:  [GO  w1  PAD w3 ]     (last column dropped)
//
// Reference: Bowman et al. (2016) Generating Sentences from
//            a Continuous Space, §3.2

use anyhow::{ensure, Result};
use burn::{
    module::Param,
    prelude::*,
    tensor::{module::embedding, Distribution, TensorData},
};

use crate::infra::embeddings::EmbeddingMatrix;

#[derive(Module, Debug)]
pub struct WordEmbedder<B: Backend> {
    pub weight: Param<Tensor<B, 2>>,
}

impl<B: Backend> WordEmbedder<B> {
    /// Upload a prebuilt matrix. Fails if its shape does not match the model.
    pub fn from_matrix(
        matrix:     &EmbeddingMatrix,
        vocab_size: usize,
        dim:        usize,
        device:     &B::Device,
    ) -> Result<Self> {
        ensure!(
            matrix.rows() == vocab_size && matrix.dim() == dim,
            "Embedding matrix is {}x{} but the model expects {}x{}",
            matrix.rows(), matrix.dim(), vocab_size, dim
        );
        let weight = Tensor::<B, 2>::from_data(
            TensorData::new(matrix.values().to_vec(), [vocab_size, dim]),
            device,
        );
        Ok(Self::frozen(weight))
    }

    /// Zero matrix, used as a placeholder before a checkpoint is loaded.
    pub fn zeros(vocab_size: usize, dim: usize, device: &B::Device) -> Self {
        Self::frozen(Tensor::zeros([vocab_size, dim], device))
    }

    fn frozen(weight: Tensor<B, 2>) -> Self {
        Self { weight: Param::from_tensor(weight).set_require_grad(false) }
    }

    /// ids `[batch, steps]` → vectors `[batch, steps, dim]`
    pub fn forward(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        embedding(self.weight.val(), ids)
    }

    pub fn dim(&self) -> usize {
        self.weight.dims()[1]
    }
}

/// Decoder input ids for teacher forcing with word dropout.
///
/// Every target id is kept with probability `keep_prob`, otherwise it is
/// replaced by `placeholder_id`; the result is shifted right by one with
/// `go_id` in front. Draws come from the backend RNG.
pub fn word_dropout<B: Backend>(
    targets:        Tensor<B, 2, Int>,
    keep_prob:      f64,
    go_id:          u32,
    placeholder_id: u32,
) -> Tensor<B, 2, Int> {
    let [batch, steps] = targets.dims();
    let device = targets.device();
    let go = Tensor::<B, 2, Int>::full([batch, 1], go_id as i64, &device);
    if steps <= 1 {
        return go;
    }

    let kept = if keep_prob >= 1.0 {
        targets
    } else {
        let draws = Tensor::<B, 2>::random([batch, steps], Distribution::Default, &device);
        targets.mask_fill(draws.greater_equal_elem(keep_prob), placeholder_id as i64)
    };

    Tensor::cat(vec![go, kept.slice([0..batch, 0..steps - 1])], 1)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn ids(rows: &[[i64; 4]]) -> Tensor<TestBackend, 2, Int> {
        let flat: Vec<i64> = rows.iter().flatten().copied().collect();
        Tensor::<TestBackend, 1, Int>::from_ints(flat.as_slice(), &Default::default())
            .reshape([rows.len(), 4])
    }

    fn to_vec(t: Tensor<TestBackend, 2, Int>) -> Vec<i64> {
        t.into_data().convert::<i64>().to_vec::<i64>().unwrap()
    }

    #[test]
    fn test_keep_one_is_plain_teacher_forcing() {
        let targets = ids(&[[5, 6, 7, 2], [8, 2, 0, 0]]);
        let out = word_dropout(targets, 1.0, 1, 0);
        assert_eq!(to_vec(out), vec![1, 5, 6, 7, 1, 8, 2, 0]);
    }

    #[test]
    fn test_keep_zero_leaves_only_go() {
        let targets = ids(&[[5, 6, 7, 2], [8, 9, 10, 2]]);
        let out = word_dropout(targets, 0.0, 1, 0);
        assert_eq!(to_vec(out), vec![1, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_from_matrix_checks_shape() {
        let device = Default::default();
        let matrix = EmbeddingMatrix::zeros(10, 4);
        assert!(WordEmbedder::<TestBackend>::from_matrix(&matrix, 10, 4, &device).is_ok());
        assert!(WordEmbedder::<TestBackend>::from_matrix(&matrix, 12, 4, &device).is_err());
    }

    #[test]
    fn test_pad_row_embeds_to_zero() {
        let device = Default::default();
        let matrix = EmbeddingMatrix::random(6, 3, 11, 0).unwrap();
        let embedder = WordEmbedder::<TestBackend>::from_matrix(&matrix, 6, 3, &device).unwrap();
        let out = embedder.forward(ids(&[[0, 4, 0, 5]]));
        assert_eq!(out.dims(), [1, 4, 3]);
        let values = out.into_data().to_vec::<f32>().unwrap();
        assert!(values[0..3].iter().all(|&v| v == 0.0));
        assert!(values[3..6].iter().any(|&v| v != 0.0));
    }
}
