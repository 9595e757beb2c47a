// ============================================================
// Layer 2: Sample Use Case
// ============================================================
// Everything done with a trained checkpoint:
//
//   1. Restore the model, config and vocabulary      (Layer 6)
//   2. Read test sentences when the command needs them (Layer 4)
//   3. Delegate to the Inferencer                     (Layer 5)
//
// Results are returned to the CLI for printing.

use anyhow::{ensure, Context, Result};
use serde::Serialize;
use std::{fs, path::Path};

use crate::data::loader::CorpusLoader;
use crate::domain::traits::SentenceSource;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::{DiversityScores, InferBackend, Inferencer, Neighbourhood};

/// A reconstruction next to the sentence it came from.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub actual:    String,
    pub generated: String,
}

/// Posterior parameters of one sentence, as written by `encode`.
#[derive(Debug, Clone, Serialize)]
pub struct EncodedSentence {
    pub sentence:  String,
    pub mean:      Vec<f32>,
    pub log_sigma: Vec<f32>,
}

pub struct SampleUseCase {
    inferencer: Inferencer<InferBackend>,
}

impl SampleUseCase {
    pub fn new(checkpoint_dir: &str, epoch: Option<usize>) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        let ckpt = CheckpointManager::new(checkpoint_dir)?;
        let inferencer = Inferencer::from_checkpoint(&ckpt, epoch, &device)?;
        Ok(Self { inferencer })
    }

    pub fn predict(&self, test_path: &str) -> Result<(Vec<Reconstruction>, [f64; 4])> {
        let sentences = read_sentences(test_path)?;
        let (generated, bleu) = self.inferencer.predict(&sentences)?;
        let vocab = self.inferencer.vocabulary();

        let pairs = sentences
            .iter()
            .zip(generated)
            .map(|(actual, generated)| {
                let words = vocab.encode_words(actual)?;
                Ok(Reconstruction { actual: vocab.decode(&words), generated })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((pairs, bleu))
    }

    pub fn sample(&self, count: usize) -> Result<Vec<String>> {
        self.inferencer.random_samples(count)
    }

    pub fn sample_to_file(&self, path: &str, batches: usize) -> Result<usize> {
        self.inferencer.random_samples_to_file(Path::new(path), batches)
    }

    /// `rounds` independent walks between pairs of prior codes.
    pub fn interpolate_random(&self, num_samples: usize, rounds: usize) -> Result<Vec<Vec<String>>> {
        (0..rounds)
            .map(|_| self.inferencer.interpolate_random(num_samples))
            .collect()
    }

    pub fn interpolate_sentences(&self, start: &str, end: &str, num_samples: usize) -> Result<Vec<String>> {
        self.inferencer.interpolate_sentences(start, end, num_samples)
    }

    pub fn neighbours(&self, test_path: &str, temperature: f64, num_samples: usize) -> Result<Vec<Neighbourhood>> {
        ensure!(num_samples > 0, "num_samples must be positive");
        let sentences = read_sentences(test_path)?;
        self.inferencer.neighbourhood(&sentences, temperature, num_samples)
    }

    pub fn diversity(&self, test_path: &str, num_samples: usize, iterations: usize) -> Result<DiversityScores> {
        let sentences = read_sentences(test_path)?;
        self.inferencer.diversity(&sentences, num_samples, iterations)
    }

    /// Encode every test sentence; written as JSON lines when `output` is given.
    pub fn encode(&self, test_path: &str, output: Option<&str>) -> Result<Vec<EncodedSentence>> {
        let sentences = read_sentences(test_path)?;
        let (means, log_sigmas) = self.inferencer.encode(&sentences)?;

        let encoded: Vec<EncodedSentence> = sentences
            .into_iter()
            .zip(means.into_iter().zip(log_sigmas))
            .map(|(sentence, (mean, log_sigma))| EncodedSentence { sentence, mean, log_sigma })
            .collect();

        if let Some(path) = output {
            let lines = encoded
                .iter()
                .map(serde_json::to_string)
                .collect::<serde_json::Result<Vec<_>>>()?;
            fs::write(path, lines.join("\n") + "\n")
                .with_context(|| format!("Cannot write codes to '{path}'"))?;
            tracing::info!("Wrote {} codes to '{}'", encoded.len(), path);
        }
        Ok(encoded)
    }
}

fn read_sentences(path: &str) -> Result<Vec<String>> {
    let sentences = CorpusLoader::new(path).load_all()?;
    ensure!(!sentences.is_empty(), "No sentences found in '{path}'");
    Ok(sentences)
}
