// ============================================================
// Layer 6: Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. Model weights (.mpk.gz file), one per epoch, including
//      the frozen embedding matrix
//   2. latest_epoch.json     which epoch was last saved
//   3. train_config.json     hyperparameters, so sampling can
//                            rebuild the same architecture
//   4. tokenizer.json        the vocabulary the ids refer to
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1
//     model_epoch_2.mpk.gz   ← weights after epoch 2
//     ...
//     latest_epoch.json
//     train_config.json
//     tokenizer.json
//     bleu_history.json      (written by the trainer)
//     metrics.csv            (written by the trainer)
//
// Restoring replaces every recorded parameter of the freshly
// built model. A record whose structure does not match the
// model fails to load instead of being partially applied.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::infra::vocabulary::{Vocabulary, VocabularyStore};
use crate::ml::model::SentenceVae;

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const CONFIG_FILE: &str = "train_config.json";
const BLEU_HISTORY_FILE: &str = "bleu_history.json";

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory if needed.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir_string(&self) -> String {
        self.dir.to_string_lossy().into_owned()
    }

    pub fn bleu_history_path(&self) -> PathBuf {
        self.dir.join(BLEU_HISTORY_FILE)
    }

    /// Save model weights for `epoch` and mark it as the latest.
    pub fn save_model<B: Backend>(&self, model: &SentenceVae<B>, epoch: usize) -> Result<()> {
        // recorder adds the extension
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join(LATEST_EPOCH_FILE);
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {LATEST_EPOCH_FILE}"))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load weights into `model` from `epoch`, or from the latest epoch
    /// when `epoch` is `None`.
    pub fn load_model<B: Backend>(
        &self,
        model:  SentenceVae<B>,
        epoch:  Option<usize>,
        device: &B::Device,
    ) -> Result<SentenceVae<B>> {
        let epoch = match epoch {
            Some(e) => e,
            None    => self.latest_epoch()?,
        };
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration written by `train`.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' before sampling.",
                    path.display()
                )
            })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Invalid config in '{}'", path.display()))
    }

    pub fn save_vocabulary(&self, vocab: &Vocabulary) -> Result<()> {
        VocabularyStore::new(self.dir_string()).save(vocab)
    }

    pub fn load_vocabulary(&self) -> Result<Vocabulary> {
        VocabularyStore::new(self.dir_string()).load()
    }

    /// Epoch number stored in latest_epoch.json.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_EPOCH_FILE);

        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{LATEST_EPOCH_FILE}'. Have you run 'train' first?"))?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::embeddings::EmbeddingMatrix;
    use crate::ml::model::SentenceVaeConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn scratch_dir(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("sentence_vae_ckpt_{}_{}", name, std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    fn weights(model: &SentenceVae<TestBackend>) -> (Vec<f32>, Vec<f32>) {
        (
            model.embedder.weight.val().into_data().to_vec::<f32>().unwrap(),
            model.latent.mean.weight.val().into_data().to_vec::<f32>().unwrap(),
        )
    }

    #[test]
    fn test_save_and_restore_round_trip() {
        let dir = scratch_dir("roundtrip");
        let device = Default::default();
        let cfg = SentenceVaeConfig::new(12, 4, 3, 2);
        let matrix = EmbeddingMatrix::random(12, 4, 9, 0).unwrap();
        let trained: SentenceVae<TestBackend> = cfg.init(&matrix, &device).unwrap();

        let manager = CheckpointManager::new(dir.clone()).unwrap();
        manager.save_model(&trained, 3).unwrap();
        assert_eq!(manager.latest_epoch().unwrap(), 3);

        let restored = manager
            .load_model(cfg.init_for_restore::<TestBackend>(&device), None, &device)
            .unwrap();
        fs::remove_dir_all(&dir).ok();

        // CompactRecorder stores half precision
        let (restored_emb, restored_mean) = weights(&restored);
        let (trained_emb, trained_mean) = weights(&trained);
        for (a, b) in restored_emb.iter().chain(&restored_mean).zip(trained_emb.iter().chain(&trained_mean)) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir = scratch_dir("missing");
        let device = Default::default();
        let manager = CheckpointManager::new(dir.clone()).unwrap();
        let model = SentenceVaeConfig::new(12, 4, 3, 2).init_for_restore::<TestBackend>(&device);
        let result = manager.load_model(model, Some(7), &device);
        fs::remove_dir_all(&dir).ok();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_and_vocabulary_round_trip() {
        let dir = scratch_dir("config");
        let manager = CheckpointManager::new(dir.clone()).unwrap();

        let cfg = TrainConfig { latent_dim: 7, ..TrainConfig::default() };
        manager.save_config(&cfg).unwrap();
        let vocab = Vocabulary::build(&["a man sleeps".to_string()], 20).unwrap();
        manager.save_vocabulary(&vocab).unwrap();

        let loaded_cfg = manager.load_config().unwrap();
        let loaded_vocab = manager.load_vocabulary().unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(loaded_cfg.latent_dim, 7);
        assert_eq!(loaded_vocab.len(), vocab.len());
        assert_eq!(loaded_vocab.encode_words("man").unwrap(), vocab.encode_words("man").unwrap());
    }
}
