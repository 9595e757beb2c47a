// ============================================================
// Layer 5: VAE Loss
// ============================================================
// Per example:
//
//   reconstruction = Σ_t mask_t · nll_t / (Σ_t mask_t + 1e-12)
//   kl             = -½ Σ_d (1 + 2·logσ − μ² − e^{2·logσ})
//
// and the scalar used for backpropagation:
//
//   total = reduce(reconstruction + λ · kl)
//
// λ only ever scales the KL term. Positions past a sentence's
// length have mask 0 and contribute nothing.
//
// Reference: Kingma & Welling (2014) Auto-Encoding Variational Bayes, App. B

use burn::{prelude::*, tensor::activation::log_softmax};
use serde::{Deserialize, Serialize};

use crate::ml::latent::kl_divergence;

const MASK_EPSILON: f64 = 1e-12;

/// How per-example losses are combined into the training scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BatchReduction {
    #[default]
    Sum,
    Mean,
}

/// Total loss plus the unscaled per-example terms for monitoring.
#[derive(Debug, Clone)]
pub struct VaeLoss<B: Backend> {
    /// `[1]`
    pub total:          Tensor<B, 1>,
    /// `[batch]`
    pub reconstruction: Tensor<B, 1>,
    /// `[batch]`
    pub kl:             Tensor<B, 1>,
}

/// 1.0 where `t < lengths[b]`, 0.0 elsewhere. Shape `[batch, steps]`.
pub fn sequence_mask<B: Backend>(lengths: Tensor<B, 1, Int>, steps: usize) -> Tensor<B, 2> {
    let [batch] = lengths.dims();
    let device = lengths.device();
    let positions = Tensor::<B, 1, Int>::arange(0..steps as i64, &device)
        .unsqueeze::<2>()
        .expand([batch, steps]);
    let lengths = lengths.reshape([batch, 1]).expand([batch, steps]);
    positions.lower(lengths).float()
}

/// Masked token cross-entropy averaged over each sentence's valid steps.
///
/// `logits` is `[batch, steps, vocab]`, `targets` is `[batch, steps]`.
pub fn reconstruction_loss<B: Backend>(
    logits:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    lengths: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    let [batch, steps, _] = logits.dims();
    let mask = sequence_mask(lengths, steps);

    let nll = log_softmax(logits, 2)
        .gather(2, targets.reshape([batch, steps, 1]))
        .reshape([batch, steps])
        .neg();

    let summed = (nll * mask.clone()).sum_dim(1).reshape([batch]);
    let counts = mask.sum_dim(1).reshape([batch]).add_scalar(MASK_EPSILON);
    summed / counts
}

pub fn vae_loss<B: Backend>(
    logits:    Tensor<B, 3>,
    targets:   Tensor<B, 2, Int>,
    lengths:   Tensor<B, 1, Int>,
    mean:      Tensor<B, 2>,
    log_sigma: Tensor<B, 2>,
    kl_weight: f64,
    reduction: BatchReduction,
) -> VaeLoss<B> {
    let reconstruction = reconstruction_loss(logits, targets, lengths);
    let kl = kl_divergence(mean, log_sigma);

    let per_example = reconstruction.clone() + kl.clone().mul_scalar(kl_weight);
    let total = match reduction {
        BatchReduction::Sum  => per_example.sum(),
        BatchReduction::Mean => per_example.mean(),
    };

    VaeLoss { total, reconstruction, kl }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn ints(values: &[i64], shape: [usize; 2]) -> Tensor<TestBackend, 2, Int> {
        Tensor::<TestBackend, 1, Int>::from_ints(values, &Default::default()).reshape(shape)
    }

    fn lengths(values: &[i64]) -> Tensor<TestBackend, 1, Int> {
        Tensor::from_ints(values, &Default::default())
    }

    #[test]
    fn test_sequence_mask() {
        let mask = sequence_mask(lengths(&[1, 3]), 4);
        let values = mask.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_reconstruction_ignores_padding_content() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::random([2, 4, 7], Distribution::Default, &device);

        let a = reconstruction_loss(logits.clone(), ints(&[3, 4, 2, 0, 5, 2, 0, 0], [2, 4]), lengths(&[3, 2]));
        let b = reconstruction_loss(logits, ints(&[3, 4, 2, 6, 5, 2, 1, 4], [2, 4]), lengths(&[3, 2]));

        let a = a.into_data().to_vec::<f32>().unwrap();
        let b = b.into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kl_weight_scales_only_kl() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::random([2, 3, 5], Distribution::Default, &device);
        let targets = ints(&[1, 2, 0, 3, 2, 0], [2, 3]);
        let mean = Tensor::<TestBackend, 2>::random([2, 4], Distribution::Normal(0.0, 1.0), &device);
        let log_sigma = Tensor::<TestBackend, 2>::random([2, 4], Distribution::Normal(0.0, 0.5), &device);

        let zero = vae_loss(
            logits.clone(), targets.clone(), lengths(&[2, 2]),
            mean.clone(), log_sigma.clone(), 0.0, BatchReduction::Sum,
        );
        let half = vae_loss(logits, targets, lengths(&[2, 2]), mean, log_sigma, 0.5, BatchReduction::Sum);

        let recon: f32 = zero.reconstruction.clone().sum().into_scalar();
        let kl: f32 = half.kl.clone().sum().into_scalar();
        let total_zero: f32 = zero.total.into_scalar();
        let total_half: f32 = half.total.into_scalar();

        assert!((total_zero - recon).abs() < 1e-4);
        assert!((total_half - (recon + 0.5 * kl)).abs() < 1e-4);
    }

    #[test]
    fn test_mean_reduction_divides_by_batch() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::random([2, 3, 5], Distribution::Default, &device);
        let targets = ints(&[1, 2, 0, 3, 2, 0], [2, 3]);
        let mean = Tensor::<TestBackend, 2>::zeros([2, 4], &device);
        let log_sigma = Tensor::<TestBackend, 2>::zeros([2, 4], &device);

        let sum = vae_loss(
            logits.clone(), targets.clone(), lengths(&[3, 2]),
            mean.clone(), log_sigma.clone(), 1.0, BatchReduction::Sum,
        );
        let avg = vae_loss(logits, targets, lengths(&[3, 2]), mean, log_sigma, 1.0, BatchReduction::Mean);

        let sum: f32 = sum.total.into_scalar();
        let avg: f32 = avg.total.into_scalar();
        assert!((sum / 2.0 - avg).abs() < 1e-5);
    }
}
