// ============================================================
// Layer 5: Inferencer
// ============================================================
// Loads a trained checkpoint and exposes every way of using it:
//
//   predict                reconstruct sentences, score with BLEU
//   encode                 posterior (mean, log σ), no sampling
//   generate               decode caller-supplied latent codes
//   random_samples         decode codes drawn from N(0, I)
//   random_samples_to_file the same, written one per line
//   interpolate_random     walk between two prior codes
//   interpolate_sentences  walk between two encoded sentences
//   neighbourhood          repeated samples around one sentence
//   diversity              entropy and distinct-n of samples
//
// All decoding is greedy in inference mode.
use anyhow::{ensure, Context, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use std::{fs, io::Write, path::Path};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{SentenceBatch, SentenceBatcher},
    dataset::SentenceSample,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    scoring::{bleu_1_to_4, entropy, ngram_diversity},
    vocabulary::Vocabulary,
};
use crate::ml::{
    decoder::DecodeMode,
    latent::{interpolate, standard_normal_codes},
    model::SentenceVae,
    readback::float_rows,
};

pub type InferBackend = burn::backend::Wgpu;

/// One input sentence and the samples drawn around it.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbourhood {
    pub actual:  String,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiversityScores {
    pub entropy:    f64,
    pub distinct_1: f64,
    pub distinct_2: f64,
}

pub struct Inferencer<B: Backend> {
    model:      SentenceVae<B>,
    vocab:      Vocabulary,
    num_tokens: usize,
    z_temp:     f64,
    batch_size: usize,
    device:     B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: SentenceVae<B>, vocab: Vocabulary, cfg: &TrainConfig, device: &B::Device) -> Self {
        Self {
            model,
            vocab,
            num_tokens: cfg.num_tokens,
            z_temp:     cfg.z_temp,
            batch_size: cfg.batch_size.max(1),
            device:     device.clone(),
        }
    }

    /// Rebuild the architecture from the saved config, then overwrite every
    /// parameter from the checkpoint of `epoch` (latest when `None`).
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        epoch:        Option<usize>,
        device:       &B::Device,
    ) -> Result<Self> {
        let cfg   = ckpt_manager.load_config()?;
        let vocab = ckpt_manager.load_vocabulary()?;
        ensure!(
            vocab.len() == cfg.vocab_size,
            "Vocabulary has {} entries but the checkpoint expects {}",
            vocab.len(),
            cfg.vocab_size
        );

        let model = cfg.model_config().init_for_restore::<B>(device);
        let model = ckpt_manager.load_model(model, epoch, device)?;
        tracing::info!("Model loaded from checkpoint");

        Ok(Self::new(model, vocab, &cfg, device))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn latent_dim(&self) -> usize {
        self.model.latent_dim()
    }

    // ─── Reconstruction ──────────────────────────────────────────────────────

    /// Reconstruct each sentence at `z_temp` and score against the input.
    pub fn predict(&self, sentences: &[String]) -> Result<(Vec<String>, [f64; 4])> {
        let samples = self.samples(sentences)?;
        let generated = self.reconstruct_samples(&samples, self.z_temp)?;

        let references: Vec<Vec<Vec<String>>> = samples
            .iter()
            .map(|s| vec![self.vocab.words(&s.ids)])
            .collect();
        let hypotheses: Vec<Vec<String>> = generated.iter().map(|row| self.vocab.words(row)).collect();
        let bleu = bleu_1_to_4(&references, &hypotheses);

        tracing::info!(
            "BLEU 1 to 4: {:.4} | {:.4} | {:.4} | {:.4}",
            bleu[0], bleu[1], bleu[2], bleu[3]
        );
        Ok((hypotheses.iter().map(|w| w.join(" ")).collect(), bleu))
    }

    /// Posterior mean and log σ for each sentence.
    pub fn encode(&self, sentences: &[String]) -> Result<(Vec<Vec<f32>>, Vec<Vec<f32>>)> {
        let samples = self.samples(sentences)?;
        let mut means  = Vec::with_capacity(samples.len());
        let mut sigmas = Vec::with_capacity(samples.len());

        for chunk in samples.chunks(self.batch_size) {
            let batch = self.batch(chunk);
            let (mean, log_sigma) = self.model.encode(batch.inputs, batch.lengths);
            means.extend(float_rows(mean)?);
            sigmas.extend(float_rows(log_sigma)?);
        }
        Ok((means, sigmas))
    }

    // ─── Generation from latent codes ────────────────────────────────────────

    /// Decode each code (`latent_dim` values) into a sentence.
    pub fn generate(&self, codes: &[Vec<f32>]) -> Result<Vec<String>> {
        let dim = self.latent_dim();
        for (i, code) in codes.iter().enumerate() {
            ensure!(code.len() == dim, "Latent code {} has {} values, expected {}", i, code.len(), dim);
        }
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let flat: Vec<f32> = codes.iter().flatten().copied().collect();
        let z = Tensor::<B, 2>::from_data(TensorData::new(flat, [codes.len(), dim]), &self.device);
        self.decode_codes(z)
    }

    pub fn random_samples(&self, n: usize) -> Result<Vec<String>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let z = standard_normal_codes::<B>(n, self.latent_dim(), &self.device);
        self.decode_codes(z)
    }

    /// Write `batches × batch_size` prior samples to `path`, one per line.
    pub fn random_samples_to_file(&self, path: &Path, batches: usize) -> Result<usize> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let mut file = fs::File::create(path)
            .with_context(|| format!("Cannot create sample file '{}'", path.display()))?;

        let mut written = 0;
        for _ in 0..batches {
            for sentence in self.random_samples(self.batch_size)? {
                writeln!(file, "{sentence}")?;
                written += 1;
            }
        }
        tracing::info!("Wrote {} samples to '{}'", written, path.display());
        Ok(written)
    }

    // ─── Interpolation ───────────────────────────────────────────────────────

    /// `num_samples` sentences on the line between two prior codes.
    pub fn interpolate_random(&self, num_samples: usize) -> Result<Vec<String>> {
        let ends = standard_normal_codes::<B>(2, self.latent_dim(), &self.device);
        self.interpolate_codes(ends, num_samples)
    }

    /// `num_samples` sentences on the line between the posterior means
    /// of `start` and `end`.
    pub fn interpolate_sentences(&self, start: &str, end: &str, num_samples: usize) -> Result<Vec<String>> {
        let samples = self.samples(&[start.to_string(), end.to_string()])?;
        let batch = self.batch(&samples);
        let (mean, _) = self.model.encode(batch.inputs, batch.lengths);
        self.interpolate_codes(mean, num_samples)
    }

    fn interpolate_codes(&self, ends: Tensor<B, 2>, num_samples: usize) -> Result<Vec<String>> {
        if num_samples == 0 {
            return Ok(Vec::new());
        }
        let [_, dim] = ends.dims();
        let a = ends.clone().slice([0..1, 0..dim]).reshape([dim]);
        let b = ends.slice([1..2, 0..dim]).reshape([dim]);
        self.decode_codes(interpolate(a, b, num_samples))
    }

    // ─── Sampling around inputs ──────────────────────────────────────────────

    /// Reconstruct every sentence `num_samples` times at `temperature`.
    pub fn neighbourhood(
        &self,
        sentences:   &[String],
        temperature: f64,
        num_samples: usize,
    ) -> Result<Vec<Neighbourhood>> {
        let samples = self.samples(sentences)?;
        let generated = self.reconstruct_samples(&repeat(&samples, num_samples), temperature)?;

        Ok(samples
            .iter()
            .zip(generated.chunks(num_samples.max(1)))
            .map(|(actual, rows)| Neighbourhood {
                actual:  self.vocab.decode(&actual.ids),
                samples: rows.iter().map(|row| self.vocab.decode(row)).collect(),
            })
            .collect())
    }

    /// Unigram entropy and distinct-1/2 of the samples drawn for each
    /// sentence, averaged over sentences and then over iterations.
    pub fn diversity(
        &self,
        sentences:      &[String],
        num_samples:    usize,
        num_iterations: usize,
    ) -> Result<DiversityScores> {
        ensure!(num_samples > 0, "num_samples must be positive");
        ensure!(num_iterations > 0, "num_iterations must be positive");

        let samples = self.samples(sentences)?;
        ensure!(!samples.is_empty(), "No sentences to sample from");
        let repeated = repeat(&samples, num_samples);

        let mut totals = [0.0f64; 3];
        for iteration in 0..num_iterations {
            let generated = self.reconstruct_samples(&repeated, self.z_temp)?;

            let mut sums = [0.0f64; 3];
            for rows in generated.chunks(num_samples) {
                let pooled: Vec<String> = rows.iter().flat_map(|row| self.vocab.words(row)).collect();
                let (d1, d2) = ngram_diversity(&pooled);
                sums[0] += entropy(&pooled);
                sums[1] += d1;
                sums[2] += d2;
            }

            let n = samples.len() as f64;
            tracing::debug!(
                "Diversity iteration {}: entropy={:.3} distinct-1={:.3} distinct-2={:.3}",
                iteration + 1, sums[0] / n, sums[1] / n, sums[2] / n
            );
            for (total, sum) in totals.iter_mut().zip(sums) {
                *total += sum / n;
            }
        }

        let runs = num_iterations as f64;
        let scores = DiversityScores {
            entropy:    totals[0] / runs,
            distinct_1: totals[1] / runs,
            distinct_2: totals[2] / runs,
        };
        tracing::info!(
            "Entropy = {:.3} | Distinct-1 = {:.3} | Distinct-2 = {:.3}",
            scores.entropy, scores.distinct_1, scores.distinct_2
        );
        Ok(scores)
    }

    // ─── Helpers ─────────────────────────────────────────────────────────────

    fn samples(&self, sentences: &[String]) -> Result<Vec<SentenceSample>> {
        sentences
            .iter()
            .map(|s| self.vocab.encode(s, self.num_tokens).map(SentenceSample::from))
            .collect()
    }

    fn batch(&self, samples: &[SentenceSample]) -> SentenceBatch<B> {
        SentenceBatcher::<B>::new(self.device.clone()).batch(samples.to_vec())
    }

    fn reconstruct_samples(&self, samples: &[SentenceSample], temperature: f64) -> Result<Vec<Vec<u32>>> {
        let mut rows = Vec::with_capacity(samples.len());
        for chunk in samples.chunks(self.batch_size) {
            let batch = self.batch(chunk);
            rows.extend(self.model.reconstruct(
                batch.inputs,
                batch.lengths,
                temperature,
                self.num_tokens,
                DecodeMode::Inference,
            )?);
        }
        Ok(rows)
    }

    fn decode_codes(&self, z: Tensor<B, 2>) -> Result<Vec<String>> {
        let rows = self.model.generate(z, self.num_tokens)?;
        Ok(rows.iter().map(|row| self.vocab.decode(row)).collect())
    }
}

/// Each sample `times` times in a row, keeping input order.
fn repeat(samples: &[SentenceSample], times: usize) -> Vec<SentenceSample> {
    samples
        .iter()
        .flat_map(|s| std::iter::repeat(s.clone()).take(times))
        .collect()
}
