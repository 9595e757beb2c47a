// ============================================================
// Layer 5: Gaussian Latent Space
// ============================================================
// Two affine heads map the encoder summary to a diagonal
// Gaussian posterior q(z|x) = N(μ, σ²):
//
//   μ    = W_μ h + b_μ
//   logσ = W_σ h + b_σ
//
// Sampling uses the reparameterisation trick. The noise ε is
// passed in by the caller, so gradients reach μ and logσ only:
//
//   z = μ + T · ε · exp(logσ)        ε ~ N(0, I)
//
// T is the sampling temperature (0 → z = μ).
//
// Reference: Kingma & Welling (2014) Auto-Encoding Variational Bayes

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::{Distribution, TensorData},
};

#[derive(Config, Debug)]
pub struct GaussianLatentConfig {
    pub d_input:    usize,
    pub latent_dim: usize,
}

impl GaussianLatentConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GaussianLatent<B> {
        GaussianLatent {
            mean:      LinearConfig::new(self.d_input, self.latent_dim).init(device),
            log_sigma: LinearConfig::new(self.d_input, self.latent_dim).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct GaussianLatent<B: Backend> {
    pub mean:      Linear<B>,
    pub log_sigma: Linear<B>,
}

impl<B: Backend> GaussianLatent<B> {
    /// summary `[batch, d_input]` → (mean, log_sigma), each `[batch, latent_dim]`
    pub fn forward(&self, summary: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let mean = self.mean.forward(summary.clone());
        let log_sigma = self.log_sigma.forward(summary);
        (mean, log_sigma)
    }

    pub fn latent_dim(&self) -> usize {
        self.mean.weight.dims()[1]
    }
}

/// `mean + temperature · noise · exp(log_sigma)`
///
/// At temperature 0 the mean is returned as is, even where `exp(log_sigma)`
/// overflows.
pub fn sample<B: Backend>(
    mean:        Tensor<B, 2>,
    log_sigma:   Tensor<B, 2>,
    noise:       Tensor<B, 2>,
    temperature: f64,
) -> Tensor<B, 2> {
    if temperature == 0.0 {
        return mean;
    }
    mean + noise.mul_scalar(temperature) * log_sigma.exp()
}

/// KL(q(z|x) ‖ N(0, I)) per example, shape `[batch]`.
pub fn kl_divergence<B: Backend>(mean: Tensor<B, 2>, log_sigma: Tensor<B, 2>) -> Tensor<B, 1> {
    let [batch, _] = mean.dims();
    let two_log_sigma = log_sigma.mul_scalar(2.0);
    let inner = two_log_sigma.clone().add_scalar(1.0) - mean.clone() * mean - two_log_sigma.exp();
    inner.sum_dim(1).reshape([batch]).mul_scalar(-0.5)
}

/// `n` codes drawn from the prior N(0, I).
pub fn standard_normal_codes<B: Backend>(n: usize, latent_dim: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::random([n, latent_dim], Distribution::Normal(0.0, 1.0), device)
}

/// `steps` evenly spaced fractions from 0 to 1 inclusive.
pub fn linspace(steps: usize) -> Vec<f32> {
    match steps {
        0 => Vec::new(),
        1 => vec![0.0],
        n => (0..n).map(|i| i as f32 / (n - 1) as f32).collect(),
    }
}

/// Points on the segment from `a` to `b` (both `[latent_dim]`), shape `[steps, latent_dim]`.
pub fn interpolate<B: Backend>(a: Tensor<B, 1>, b: Tensor<B, 1>, steps: usize) -> Tensor<B, 2> {
    let [dim] = a.dims();
    let device = a.device();

    let fractions = Tensor::<B, 1>::from_data(TensorData::new(linspace(steps), [steps]), &device)
        .reshape([steps, 1])
        .expand([steps, dim]);
    let start = a.unsqueeze::<2>().expand([steps, dim]);
    let end = b.unsqueeze::<2>().expand([steps, dim]);

    start.clone() + (end - start) * fractions
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_kl_is_non_negative() {
        let device = Default::default();
        for _ in 0..5 {
            let mean = Tensor::<TestBackend, 2>::random([8, 6], Distribution::Normal(0.0, 2.0), &device);
            let log_sigma = Tensor::<TestBackend, 2>::random([8, 6], Distribution::Normal(0.0, 1.0), &device);
            let kl = values(kl_divergence(mean, log_sigma));
            assert_eq!(kl.len(), 8);
            assert!(kl.iter().all(|&v| v >= -1e-5), "negative KL: {kl:?}");
        }
    }

    #[test]
    fn test_kl_of_standard_normal_is_zero() {
        let device = Default::default();
        let zeros = Tensor::<TestBackend, 2>::zeros([3, 4], &device);
        let kl = values(kl_divergence(zeros.clone(), zeros));
        assert!(kl.iter().all(|&v| v.abs() < 1e-7));
    }

    #[test]
    fn test_zero_temperature_returns_mean() {
        let device = Default::default();
        let mean = Tensor::<TestBackend, 2>::random([4, 3], Distribution::Normal(0.0, 1.0), &device);
        let log_sigma = Tensor::<TestBackend, 2>::random([4, 3], Distribution::Normal(0.0, 1.0), &device);
        let noise = standard_normal_codes::<TestBackend>(4, 3, &device);
        let z = sample(mean.clone(), log_sigma, noise, 0.0);
        assert_eq!(values(z), values(mean));
    }

    #[test]
    fn test_zero_temperature_ignores_overflowing_sigma() {
        let device = Default::default();
        let mean = Tensor::<TestBackend, 2>::from_floats([[0.5f32, 1.0]], &device);
        let log_sigma = Tensor::<TestBackend, 2>::from_floats([[100.0f32, 0.0]], &device);
        let noise = Tensor::<TestBackend, 2>::from_floats([[0.3f32, 0.3]], &device);
        let z = values(sample(mean, log_sigma, noise, 0.0));
        assert_eq!(z, vec![0.5, 1.0]);
    }

    #[test]
    fn test_interpolating_a_code_with_itself() {
        let device = Default::default();
        let code = Tensor::<TestBackend, 1>::from_floats([0.5f32, -1.25, 3.0], &device);
        let path = values(interpolate(code.clone(), code, 5));
        for step in path.chunks(3) {
            assert_eq!(step, &[0.5, -1.25, 3.0]);
        }
    }

    #[test]
    fn test_interpolation_endpoints() {
        let device = Default::default();
        let a = Tensor::<TestBackend, 1>::from_floats([0.0f32, 0.0], &device);
        let b = Tensor::<TestBackend, 1>::from_floats([2.0f32, 4.0], &device);
        let path = values(interpolate(a, b, 3));
        assert_eq!(path, vec![0.0, 0.0, 1.0, 2.0, 2.0, 4.0]);
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(1), vec![0.0]);
        assert_eq!(linspace(3), vec![0.0, 0.5, 1.0]);
        assert!(linspace(0).is_empty());
    }
}
