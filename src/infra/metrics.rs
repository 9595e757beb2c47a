// ============================================================
// Layer 6: Metrics Logger
// ============================================================
// Records one row per training epoch to a CSV file, and keeps
// the validation BLEU history as JSON.
//
// Metrics recorded per epoch:
//   - epoch:          the epoch number (1, 2, 3, ...)
//   - train_loss:     mean total loss (reconstruction + λ·KL)
//   - reconstruction: mean per-sentence cross-entropy
//   - kl:             mean unweighted KL divergence
//   - kl_weight:      λ at the end of the epoch
//   - word_keep:      word-dropout keep probability used
//   - learning_rate:  learning rate used
//   - bleu_1..4:      validation BLEU of greedy reconstructions
//   - skipped:        batches skipped for a non-finite loss
//
// Output files:
//   checkpoints/metrics.csv
//   checkpoints/bleu_history.json
//
// How to read the metrics:
//   - A KL that collapses to ~0 while reconstruction keeps
//     falling means the decoder is ignoring z
//   - BLEU should climb as reconstruction improves

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:          usize,
    pub train_loss:     f64,
    pub reconstruction: f64,
    pub kl:             f64,
    pub kl_weight:      f64,
    pub word_keep:      f64,
    pub learning_rate:  f64,
    /// BLEU-1..4 on the validation set, each in [0, 1]
    pub bleu:           [f64; 4],
    pub skipped:        usize,
}

impl EpochMetrics {
    /// Returns true if this epoch's BLEU-4 beats the previous best
    pub fn is_improvement(&self, best_bleu_4: f64) -> bool {
        self.bleu[3] > best_bleu_4
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    /// Full path to the CSV file
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");

        // Header only on a new file so reruns append
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(
                f,
                "epoch,train_loss,reconstruction,kl,kl_weight,word_keep,learning_rate,\
                 bleu_1,bleu_2,bleu_3,bleu_4,skipped"
            )?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.4},{:.8},{:.6},{:.6},{:.6},{:.6},{}",
            m.epoch,
            m.train_loss,
            m.reconstruction,
            m.kl,
            m.kl_weight,
            m.word_keep,
            m.learning_rate,
            m.bleu[0],
            m.bleu[1],
            m.bleu[2],
            m.bleu[3],
            m.skipped,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, bleu_4={:.4}",
            m.epoch,
            m.train_loss,
            m.bleu[3],
        );

        Ok(())
    }
}

// ─── BleuHistory ──────────────────────────────────────────────────────────────
/// Append-only per-epoch validation BLEU, one list per order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BleuHistory {
    pub bleu_1: Vec<f64>,
    pub bleu_2: Vec<f64>,
    pub bleu_3: Vec<f64>,
    pub bleu_4: Vec<f64>,
}

impl BleuHistory {
    pub fn push(&mut self, scores: [f64; 4]) {
        self.bleu_1.push(scores[0]);
        self.bleu_2.push(scores[1]);
        self.bleu_3.push(scores[2]);
        self.bleu_4.push(scores[3]);
    }

    /// Overwrite `path` with the full history.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write BLEU history to '{}'", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read BLEU history from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}
