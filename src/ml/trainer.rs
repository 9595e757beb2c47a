// ============================================================
// Layer 5: Training Loop
// ============================================================
// Epoch loop for the sentence VAE using Burn's DataLoader.
//
// Per batch:
//   λ = kl_schedule(iteration)
//   logits, μ, log σ = forward_train(batch, word_keep, z_temp)
//   loss = Σ_b [ CE_b + λ · KL_b ]        (or mean, see BatchReduction)
//   skip the update if loss is not finite
//   θ = optim.step(lr, θ, clip(∇loss))
//
// Per epoch:
//   greedy validation decode → BLEU-1..4 against the inputs
//   checkpoint + bleu_history.json + metrics.csv
//   learning rate and word-dropout keep probability advance
//
// Backends:
//   - Training runs on an AutodiffBackend for gradients
//   - model.valid() returns the model on B::InnerBackend, which
//     also turns dropout off for validation
//   - The validation batcher therefore uses B::InnerBackend
//
// Reference: Bowman et al. (2016) Generating Sentences from a
//            Continuous Space

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{SentenceBatch, SentenceBatcher},
    dataset::SentenceDataset,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    embeddings::EmbeddingMatrix,
    metrics::{BleuHistory, EpochMetrics, MetricsLogger},
    scoring::bleu_1_to_4,
    vocabulary::Vocabulary,
};
use crate::ml::{
    decoder::DecodeMode,
    latent::standard_normal_codes,
    loss::vae_loss,
    model::SentenceVae,
    optim::{self, OptimizerKind},
    readback::{id_rows, scalar},
};

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

const LOGGED_PAIRS: usize = 20;
const LOGGED_PRIOR_SAMPLES: usize = 10;

/// What a finished run produced, beyond the files on disk.
#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    pub epochs:     Vec<EpochMetrics>,
    pub bleu:       BleuHistory,
    pub iterations: usize,
}

impl TrainingReport {
    pub fn last_epoch(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}

pub fn run_training(
    cfg:           &TrainConfig,
    vocab:         &Vocabulary,
    embeddings:    &EmbeddingMatrix,
    train_dataset: SentenceDataset,
    val_dataset:   SentenceDataset,
    ckpt_manager:  &CheckpointManager,
) -> Result<TrainingReport> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train::<MyBackend>(cfg, vocab, embeddings, train_dataset, val_dataset, ckpt_manager, &device)
}

/// Backend-generic entry point: seeds the backend and builds a fresh model.
pub fn train<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    vocab:         &Vocabulary,
    embeddings:    &EmbeddingMatrix,
    train_dataset: SentenceDataset,
    val_dataset:   SentenceDataset,
    ckpt_manager:  &CheckpointManager,
    device:        &B::Device,
) -> Result<TrainingReport> {
    B::seed(cfg.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let model: SentenceVae<B> = cfg.model_config().init(embeddings, device)?;
    tracing::info!(
        "Model ready: {} layer(s), hidden={}, latent={}, vocab={}",
        cfg.num_layers, cfg.lstm_hidden_units, cfg.latent_dim, cfg.vocab_size
    );

    let (_, report) = train_model(cfg, vocab, model, train_dataset, val_dataset, ckpt_manager, device)?;
    Ok(report)
}

/// Run the epoch loop on an already built model and hand it back trained.
pub fn train_model<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    vocab:         &Vocabulary,
    model:         SentenceVae<B>,
    train_dataset: SentenceDataset,
    val_dataset:   SentenceDataset,
    ckpt_manager:  &CheckpointManager,
    device:        &B::Device,
) -> Result<(SentenceVae<B>, TrainingReport)> {
    let run = TrainingRun { cfg, vocab, ckpt_manager, device: device.clone() };

    // ── Optimiser (all clip gradients to ±5) ──────────────────────────────────
    tracing::info!("Optimizer: {}", cfg.optimizer);
    match cfg.optimizer {
        OptimizerKind::Adam    => run.fit(model, optim::adam().init::<B, SentenceVae<B>>(), train_dataset, val_dataset),
        OptimizerKind::Sgd     => run.fit(model, optim::sgd().init::<B, SentenceVae<B>>(), train_dataset, val_dataset),
        OptimizerKind::Rmsprop => run.fit(model, optim::rmsprop().init::<B, SentenceVae<B>>(), train_dataset, val_dataset),
    }
}

struct TrainingRun<'a, B: AutodiffBackend> {
    cfg:          &'a TrainConfig,
    vocab:        &'a Vocabulary,
    ckpt_manager: &'a CheckpointManager,
    device:       B::Device,
}

/// Running sums for one epoch of training batches.
#[derive(Default)]
struct EpochTotals {
    loss:           f64,
    reconstruction: f64,
    kl:             f64,
    batches:        usize,
    skipped:        usize,
}

impl EpochTotals {
    fn average(sum: f64, batches: usize) -> f64 {
        if batches > 0 { sum / batches as f64 } else { f64::NAN }
    }
}

impl<'a, B: AutodiffBackend> TrainingRun<'a, B> {
    fn fit<O>(
        &self,
        mut model:     SentenceVae<B>,
        mut optim:     O,
        train_dataset: SentenceDataset,
        val_dataset:   SentenceDataset,
    ) -> Result<(SentenceVae<B>, TrainingReport)>
    where
        O: Optimizer<SentenceVae<B>, B>,
    {
        let cfg = self.cfg;
        let kl_schedule   = cfg.kl_schedule();
        let word_schedule = cfg.word_dropout_schedule();
        let lr_schedule   = cfg.learning_rate_schedule();

        // ── Training data loader (AutodiffBackend) ────────────────────────────
        let train_loader = DataLoaderBuilder::new(SentenceBatcher::<B>::new(self.device.clone()))
            .batch_size(cfg.batch_size)
            .shuffle(cfg.seed)
            .num_workers(1)
            .build(train_dataset);

        // ── Validation data loader (InnerBackend, no autodiff overhead) ───────
        let val_loader = DataLoaderBuilder::new(SentenceBatcher::<B::InnerBackend>::new(self.device.clone()))
            .batch_size(cfg.batch_size)
            .num_workers(1)
            .build(val_dataset);

        let metrics_logger = MetricsLogger::new(self.ckpt_manager.dir_string())?;
        let mut report = TrainingReport::default();
        let mut iteration = 0usize;

        // ── Epoch loop ────────────────────────────────────────────────────────
        for epoch in 1..=cfg.n_epochs {
            let learning_rate = lr_schedule.rate(epoch);
            let word_keep     = word_schedule.keep(epoch);
            let mut totals    = EpochTotals::default();
            let mut kl_weight = kl_schedule.weight(iteration);

            // ── Training phase ────────────────────────────────────────────────
            for batch in train_loader.iter() {
                kl_weight = kl_schedule.weight(iteration);
                iteration += 1;

                let output = model.forward_train(
                    batch.inputs,
                    batch.targets.clone(),
                    batch.lengths.clone(),
                    word_keep,
                    cfg.z_temp,
                )?;
                let loss = vae_loss(
                    output.logits,
                    batch.targets,
                    batch.lengths,
                    output.mean,
                    output.log_sigma,
                    kl_weight,
                    cfg.batch_reduction,
                );

                let loss_val = scalar(loss.total.clone());
                if !loss_val.is_finite() {
                    tracing::warn!(
                        "Iteration {}: non-finite loss ({}), skipping batch",
                        iteration, loss_val
                    );
                    totals.skipped += 1;
                    continue;
                }

                totals.loss           += loss_val;
                totals.reconstruction += scalar(loss.reconstruction.clone().mean());
                totals.kl             += scalar(loss.kl.clone().mean());
                totals.batches        += 1;

                // Backward pass + clipped update
                let grads = loss.total.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(learning_rate, model, grads);
            }

            // ── Validation phase ──────────────────────────────────────────────
            // model.valid() → SentenceVae<B::InnerBackend>, dropout disabled
            let model_valid = model.valid();
            let bleu = self.validate(&model_valid, &val_loader, epoch)?;

            let metrics = EpochMetrics {
                epoch,
                train_loss:     EpochTotals::average(totals.loss, totals.batches),
                reconstruction: EpochTotals::average(totals.reconstruction, totals.batches),
                kl:             EpochTotals::average(totals.kl, totals.batches),
                kl_weight,
                word_keep,
                learning_rate,
                bleu,
                skipped:        totals.skipped,
            };

            println!(
                "Epoch {:>3}/{} | loss={:.4} | rec={:.4} | kl={:.4} | λ={:.4} | keep={:.2} | lr={:.2e} | bleu={:.4}/{:.4}/{:.4}/{:.4}",
                epoch, cfg.n_epochs, metrics.train_loss, metrics.reconstruction, metrics.kl,
                kl_weight, word_keep, learning_rate,
                bleu[0], bleu[1], bleu[2], bleu[3],
            );

            let best = report.bleu.bleu_4.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if metrics.is_improvement(best) {
                tracing::info!("Epoch {}: new best BLEU-4 {:.4}", epoch, bleu[3]);
            }

            // ── Persist ───────────────────────────────────────────────────────
            self.ckpt_manager.save_model(&model, epoch)?;
            report.bleu.push(bleu);
            report.bleu.save(&self.ckpt_manager.bleu_history_path())?;
            metrics_logger.log(&metrics)?;
            tracing::info!("Checkpoint saved for epoch {}", epoch);

            report.epochs.push(metrics);
        }

        report.iterations = iteration;
        tracing::info!("Training complete after {} iterations", iteration);
        Ok((model, report))
    }

    /// Greedy reconstruction of every validation sentence, scored with BLEU.
    fn validate(
        &self,
        model:      &SentenceVae<B::InnerBackend>,
        val_loader: &Arc<dyn DataLoader<SentenceBatch<B::InnerBackend>>>,
        epoch:      usize,
    ) -> Result<[f64; 4]> {
        let cfg = self.cfg;
        let mut references: Vec<Vec<Vec<String>>> = Vec::new();
        let mut hypotheses: Vec<Vec<String>>      = Vec::new();

        for batch in val_loader.iter() {
            let actual = id_rows(batch.inputs.clone())?;
            let generated = model.reconstruct(
                batch.inputs,
                batch.lengths,
                cfg.z_temp,
                cfg.num_tokens,
                DecodeMode::Validation,
            )?;

            for (a, g) in actual.iter().zip(&generated) {
                references.push(vec![self.vocab.words(a)]);
                hypotheses.push(self.vocab.words(g));
            }
        }

        if hypotheses.is_empty() {
            tracing::warn!("Epoch {}: validation set is empty, BLEU reported as 0", epoch);
            return Ok([0.0; 4]);
        }

        for (reference, hypothesis) in references.iter().zip(&hypotheses).take(LOGGED_PAIRS) {
            tracing::info!("G: {}", hypothesis.join(" "));
            tracing::info!("A: {}", reference[0].join(" "));
        }

        // ── Prior samples, to watch what the decoder makes of N(0, I) ─────────
        let z = standard_normal_codes::<B::InnerBackend>(LOGGED_PRIOR_SAMPLES, model.latent_dim(), &self.device);
        for row in model.generate(z, cfg.num_tokens)? {
            tracing::info!("S: {}", self.vocab.decode(&row));
        }

        Ok(bleu_1_to_4(&references, &hypotheses))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        data::dataloader::batcher::Batcher,
        module::Param,
    };

    use crate::ml::loss::BatchReduction;

    type TestBackend = Autodiff<NdArray>;

    fn corpus() -> Vec<String> {
        [
            "a man is sleeping .",
            "a dog runs outside .",
            "the woman is reading .",
            "two kids play football .",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn small_config(dir: &str) -> TrainConfig {
        TrainConfig {
            checkpoint_dir:    dir.to_string(),
            lstm_hidden_units: 8,
            embedding_size:    6,
            latent_dim:        4,
            vocab_size:        20,
            num_tokens:        6,
            batch_size:        2,
            n_epochs:          1,
            ..TrainConfig::default()
        }
    }

    fn temp_dir(tag: &str) -> String {
        std::env::temp_dir()
            .join(format!("sentence_vae_{tag}_{}", std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    fn max_change(before: &[f32], after: &[f32]) -> f32 {
        before.iter().zip(after).map(|(a, b)| (a - b).abs()).fold(0.0, f32::max)
    }

    /// Vocabulary, config and a freshly initialised model for the tiny corpus.
    fn setup(dir: &str) -> (Vocabulary, TrainConfig, SentenceVae<TestBackend>) {
        let vocab = Vocabulary::build(&corpus(), 20).unwrap();
        let mut cfg = small_config(dir);
        cfg.vocab_size = vocab.len();
        let embeddings = EmbeddingMatrix::random(vocab.len(), cfg.embedding_size, cfg.seed, vocab.pad()).unwrap();
        let model = cfg.model_config().init(&embeddings, &Default::default()).unwrap();
        (vocab, cfg, model)
    }

    #[test]
    fn test_sgd_step_clips_gradients_and_keeps_embeddings_frozen() {
        let device = Default::default();
        let (vocab, cfg, model) = setup("unused");
        let dataset = SentenceDataset::from_sentences(&corpus(), &vocab, cfg.num_tokens).unwrap();
        let batch = SentenceBatcher::<TestBackend>::new(device).batch(dataset.samples().to_vec());

        let output = model
            .forward_train(batch.inputs, batch.targets.clone(), batch.lengths.clone(), 1.0, 1.0)
            .unwrap();
        let loss = vae_loss(
            output.logits, batch.targets, batch.lengths, output.mean, output.log_sigma,
            1.0, BatchReduction::Sum,
        );
        let grads = loss.total.mul_scalar(1e6).backward();
        let grads = GradientsParams::from_grads(grads, &model);

        let emb_before = values(model.embedder.weight.val());
        let out_before = values(model.decoder.output.weight.val());
        let mut sgd = optim::sgd().init::<TestBackend, SentenceVae<TestBackend>>();
        let model = sgd.step(1.0, model, grads);

        let out_delta = max_change(&out_before, &values(model.decoder.output.weight.val()));
        assert!(out_delta > 0.0, "output projection did not move");
        assert!(out_delta <= 5.0 + 1e-4, "update of {out_delta} exceeds the clip");
        assert_eq!(values(model.embedder.weight.val()), emb_before);
    }

    #[test]
    fn test_non_finite_loss_skips_every_update() {
        let dir = temp_dir("skip");
        let device = Default::default();
        let (vocab, cfg, mut model) = setup(&dir);

        // exp(log σ) overflows, so the KL term is infinite for every batch
        model.latent.log_sigma.bias = Some(Param::from_tensor(
            Tensor::<TestBackend, 1>::full([cfg.latent_dim], 1e4, &device),
        ));
        let out_before = values(model.decoder.output.weight.val());
        let enc_before = values(model.latent.mean.weight.val());

        let train_ds = SentenceDataset::from_sentences(&corpus(), &vocab, cfg.num_tokens).unwrap();
        let val_ds   = SentenceDataset::from_sentences(&corpus(), &vocab, cfg.num_tokens).unwrap();
        let ckpt = CheckpointManager::new(dir.clone()).unwrap();

        let result = train_model(&cfg, &vocab, model, train_ds, val_ds, &ckpt, &device);
        std::fs::remove_dir_all(&dir).ok();
        let (model, report) = result.unwrap();

        assert_eq!(report.epochs.len(), 1);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.last_epoch().unwrap().skipped, 2);
        assert_eq!(values(model.decoder.output.weight.val()), out_before);
        assert_eq!(values(model.latent.mean.weight.val()), enc_before);
    }

    #[test]
    fn test_one_epoch_on_tiny_corpus() {
        let dir = temp_dir("train");
        let device = Default::default();

        let sentences = corpus();
        let vocab = Vocabulary::build(&sentences, 20).unwrap();
        let mut cfg = small_config(&dir);
        cfg.vocab_size = vocab.len();

        let embeddings = EmbeddingMatrix::random(vocab.len(), cfg.embedding_size, cfg.seed, vocab.pad()).unwrap();
        let train_ds = SentenceDataset::from_sentences(&sentences, &vocab, cfg.num_tokens).unwrap();
        let val_ds   = SentenceDataset::from_sentences(&sentences, &vocab, cfg.num_tokens).unwrap();
        let ckpt = CheckpointManager::new(dir.clone()).unwrap();

        let report = train::<TestBackend>(&cfg, &vocab, &embeddings, train_ds, val_ds, &ckpt, &device).unwrap();
        let saved_epoch = ckpt.latest_epoch();
        let history = BleuHistory::load(&ckpt.bleu_history_path());
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(report.epochs.len(), 1);
        assert_eq!(report.iterations, 2);
        let last = report.last_epoch().unwrap();
        assert!(last.train_loss.is_finite(), "loss {}", last.train_loss);
        assert!(last.train_loss >= 0.0);
        for score in last.bleu {
            assert!((0.0..=1.0).contains(&score), "bleu {score}");
        }
        assert_eq!(saved_epoch.unwrap(), 1);
        assert_eq!(history.unwrap().bleu_4.len(), 1);
    }
}
