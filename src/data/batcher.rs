// ============================================================
// Layer 4: Sentence Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<SentenceSample>
// into id tensors.
//
// How batching works here:
//   Input:  N samples, each padded to num_tokens ids
//   Output: SentenceBatch with
//             inputs  [N, L]
//             targets [N, L]
//             lengths [N]
//           where L is the longest true length in the batch
//
// Columns past L are padding in every row, so they are cut
// before the tensors are built. The encoder and the teacher-
// forced decoder then never unroll over steps that are pure
// padding for the whole batch.
//
// The model is an autoencoder, so targets equal inputs; they
// are kept as separate tensors because the decoder consumes
// targets (through word dropout) and the encoder consumes inputs.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::SentenceSample;

// ─── SentenceBatch ────────────────────────────────────────────────────────────
/// A batch of encoded sentences ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct SentenceBatch<B: Backend> {
    /// Encoder input ids, shape: [batch_size, max_length]
    pub inputs: Tensor<B, 2, Int>,

    /// Decoder target ids, shape: [batch_size, max_length]
    pub targets: Tensor<B, 2, Int>,

    /// True sentence lengths (words + EOS), shape: [batch_size]
    pub lengths: Tensor<B, 1, Int>,
}

// ─── SentenceBatcher ──────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SentenceBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SentenceBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<SentenceSample, SentenceBatch<B>> for SentenceBatcher<B> {
    fn batch(&self, items: Vec<SentenceSample>) -> SentenceBatch<B> {
        let batch_size = items.len();
        let max_length = items
            .iter()
            .map(|s| s.length.min(s.ids.len()))
            .max()
            .unwrap_or(0)
            .max(1);

        // Row-major [batch, max_length], padding rows that are shorter
        let ids_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| {
                (0..max_length).map(move |t| s.ids.get(t).copied().unwrap_or(0) as i32)
            })
            .collect();

        let lengths: Vec<i32> = items
            .iter()
            .map(|s| s.length.min(max_length) as i32)
            .collect();

        let inputs = Tensor::<B, 1, Int>::from_ints(
            ids_flat.as_slice(), &self.device
        ).reshape([batch_size, max_length]);

        let lengths = Tensor::<B, 1, Int>::from_ints(
            lengths.as_slice(), &self.device
        );

        SentenceBatch {
            targets: inputs.clone(),
            inputs,
            lengths,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn sample(ids: &[u32], length: usize) -> SentenceSample {
        SentenceSample { ids: ids.to_vec(), length }
    }

    #[test]
    fn test_batch_is_trimmed_to_longest_sentence() {
        let batcher = SentenceBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![
            sample(&[5, 6, 2, 0, 0, 0], 3),
            sample(&[7, 2, 0, 0, 0, 0], 2),
        ]);

        assert_eq!(batch.inputs.dims(), [2, 3]);
        assert_eq!(batch.targets.dims(), [2, 3]);
        assert_eq!(batch.lengths.dims(), [2]);

        let ids = batch.inputs.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(ids, vec![5, 6, 2, 7, 2, 0]);
        let lengths = batch.lengths.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(lengths, vec![3, 2]);
    }

    #[test]
    fn test_full_length_rows_keep_every_column() {
        let batcher = SentenceBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![sample(&[4, 5, 6, 7], 4)]);
        assert_eq!(batch.inputs.dims(), [1, 4]);
    }
}
