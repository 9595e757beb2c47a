// ============================================================
// Layer 2: TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the sentence corpus      (Layer 4 - data)
//   Step 2: Split train/validation        (Layer 4 - data)
//   Step 3: Build / load the vocabulary   (Layer 6 - infra)
//   Step 4: Prepare the embedding matrix  (Layer 6 - infra)
//   Step 5: Encode datasets               (Layer 4 - data)
//   Step 6: Save config                   (Layer 6 - infra)
//   Step 7: Run the training loop         (Layer 5 - ml)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{dataset::SentenceDataset, loader::CorpusLoader, splitter::split_train_val};
use crate::domain::traits::SentenceSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    embeddings::EmbeddingMatrix,
    vocabulary::{Vocabulary, VocabularyStore},
};
use crate::ml::{
    loss::BatchReduction,
    model::SentenceVaeConfig,
    optim::OptimizerKind,
    schedule::{AnnealType, KlSchedule, LearningRateSchedule, WordDropoutSchedule},
    trainer::{run_training, TrainingReport},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every hyperparameter of a run. Saved next to the checkpoints so
// the sampling commands can rebuild the same model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    // ── paths ──
    pub corpus_path:     String,
    pub embeddings_path: Option<String>,
    pub checkpoint_dir:  String,

    // ── architecture ──
    pub lstm_hidden_units: usize,
    pub embedding_size:    usize,
    pub latent_dim:        usize,
    pub num_layers:        usize,
    /// Upper bound while building; replaced by the real size once built.
    pub vocab_size:        usize,
    pub num_tokens:        usize,

    // ── regularisation ──
    pub dropout_keep_prob:             f64,
    pub word_dropout_keep_probability: f64,
    pub word_dropout_step:             f64,
    pub z_temp:                        f64,

    // ── optimisation ──
    pub optimizer:             OptimizerKind,
    pub initial_learning_rate: f64,
    pub learning_rate_decay:   f64,
    pub min_learning_rate:     f64,
    pub batch_size:            usize,
    pub n_epochs:              usize,
    pub batch_reduction:       BatchReduction,

    // ── KL annealing ──
    pub anneal_type:   AnnealType,
    pub anneal_till:   usize,
    pub lambda_val:    f64,
    pub kl_ceiling:    f64,
    pub anneal_offset: f64,
    pub anneal_width:  f64,

    pub val_fraction: f64,
    pub seed:         u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            corpus_path:     "data/sentences.txt".to_string(),
            embeddings_path: None,
            checkpoint_dir:  "checkpoints".to_string(),

            lstm_hidden_units: 100,
            embedding_size:    300,
            latent_dim:        100,
            num_layers:        1,
            vocab_size:        20_000,
            num_tokens:        20,

            dropout_keep_prob:             0.8,
            word_dropout_keep_probability: 0.5,
            word_dropout_step:             0.05,
            z_temp:                        1.0,

            optimizer:             OptimizerKind::Adam,
            initial_learning_rate: 1e-3,
            learning_rate_decay:   0.9,
            min_learning_rate:     1e-5,
            batch_size:            128,
            n_epochs:              20,
            batch_reduction:       BatchReduction::Sum,

            anneal_type:   AnnealType::Linear,
            anneal_till:   3500,
            lambda_val:    1.0,
            kl_ceiling:    1.0,
            anneal_offset: 4500.0,
            anneal_width:  1000.0,

            val_fraction: 0.1,
            seed:         42,
        }
    }
}

impl TrainConfig {
    /// Reject values that would make training meaningless.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.num_tokens > 0, "num_tokens must be positive");
        ensure!(self.latent_dim > 0, "latent_dim must be positive");
        ensure!(self.lstm_hidden_units > 0, "lstm_hidden_units must be positive");
        ensure!(self.num_layers > 0, "num_layers must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.dropout_keep_prob),
            "dropout_keep_prob must be in [0, 1]"
        );
        ensure!(
            (0.0..=1.0).contains(&self.word_dropout_keep_probability),
            "word_dropout_keep_probability must be in [0, 1]"
        );
        ensure!(
            (0.0..1.0).contains(&self.val_fraction),
            "val_fraction must be in [0, 1)"
        );
        Ok(())
    }

    pub fn model_config(&self) -> SentenceVaeConfig {
        SentenceVaeConfig::new(
            self.vocab_size,
            self.embedding_size,
            self.lstm_hidden_units,
            self.latent_dim,
        )
        .with_num_layers(self.num_layers)
        .with_dropout_keep_prob(self.dropout_keep_prob)
    }

    pub fn kl_schedule(&self) -> KlSchedule {
        KlSchedule {
            anneal_type: self.anneal_type,
            lambda_val:  self.lambda_val,
            ceiling:     self.kl_ceiling,
            anneal_till: self.anneal_till,
            offset:      self.anneal_offset,
            width:       self.anneal_width,
        }
    }

    pub fn word_dropout_schedule(&self) -> WordDropoutSchedule {
        WordDropoutSchedule {
            floor: self.word_dropout_keep_probability,
            step:  self.word_dropout_step,
        }
    }

    pub fn learning_rate_schedule(&self) -> LearningRateSchedule {
        LearningRateSchedule {
            initial: self.initial_learning_rate,
            decay:   self.learning_rate_decay,
            minimum: self.min_learning_rate,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
/// Everything the training loop needs, after steps 1 to 6.
pub struct PreparedRun {
    pub config:        TrainConfig,
    pub vocab:         Vocabulary,
    pub embeddings:    EmbeddingMatrix,
    pub train_dataset: SentenceDataset,
    pub val_dataset:   SentenceDataset,
    pub ckpt_manager:  CheckpointManager,
}

pub struct TrainUseCase {
    config: TrainConfig,
    source: Box<dyn SentenceSource>,
}

impl TrainUseCase {
    /// Train on the text corpus at `config.corpus_path`.
    pub fn new(config: TrainConfig) -> Self {
        let source = Box::new(CorpusLoader::new(&config.corpus_path));
        Self::with_source(config, source)
    }

    pub fn with_source(config: TrainConfig, source: Box<dyn SentenceSource>) -> Self {
        Self { config, source }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingReport> {
        let run = self.prepare()?;

        // ── Step 7: Training loop (Layer 5) ───────────────────────────────────
        run_training(
            &run.config,
            &run.vocab,
            &run.embeddings,
            run.train_dataset,
            run.val_dataset,
            &run.ckpt_manager,
        )
    }

    pub fn prepare(&self) -> Result<PreparedRun> {
        let mut cfg = self.config.clone();
        cfg.validate()?;

        // ── Step 1: Load sentences ────────────────────────────────────────────
        tracing::info!("Loading corpus from '{}'", cfg.corpus_path);
        let sentences = self.source.load_all()?;
        ensure!(!sentences.is_empty(), "Corpus '{}' contains no sentences", cfg.corpus_path);

        // ── Step 2: Train / validation split ──────────────────────────────────
        let (train_sentences, val_sentences) =
            split_train_val(sentences, 1.0 - cfg.val_fraction, cfg.seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_sentences.len(),
            val_sentences.len()
        );

        // ── Step 3: Vocabulary ────────────────────────────────────────────────
        // An existing tokenizer.json in the checkpoint dir is reused so ids
        // stay stable across resumed runs.
        let vocab = VocabularyStore::new(&cfg.checkpoint_dir)
            .load_or_build(&train_sentences, cfg.vocab_size)?;
        cfg.vocab_size = vocab.len();

        // ── Step 4: Embedding matrix ──────────────────────────────────────────
        let embeddings = match &cfg.embeddings_path {
            Some(path) => EmbeddingMatrix::from_glove(Path::new(path), &vocab, cfg.embedding_size, cfg.seed)?,
            None => {
                tracing::info!("No pretrained embeddings given, using random vectors");
                EmbeddingMatrix::random(vocab.len(), cfg.embedding_size, cfg.seed, vocab.pad())?
            }
        };

        // ── Step 5: Encode datasets ───────────────────────────────────────────
        let train_dataset = SentenceDataset::from_sentences(&train_sentences, &vocab, cfg.num_tokens)?;
        let val_dataset   = SentenceDataset::from_sentences(&val_sentences, &vocab, cfg.num_tokens)?;

        // ── Step 6: Save config + vocabulary for the sampling commands ────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(&cfg)?;
        ckpt_manager.save_vocabulary(&vocab)?;

        Ok(PreparedRun {
            config: cfg,
            vocab,
            embeddings,
            train_dataset,
            val_dataset,
            ckpt_manager,
        })
    }
}
