// ============================================================
// Layer 6: Embedding Matrix
// ============================================================
// The word vectors fed to both encoder and decoder. They are
// built once before training and never updated by the
// optimiser:
//
//   - from_glove: pretrained vectors for known words, small
//                 random vectors for the rest
//   - random:     small random vectors for every word
//
// In both cases the PAD row is all zeros, so padding and
// word-dropout placeholders carry no signal.

use anyhow::{bail, Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::{fs, path::Path};

use crate::infra::vocabulary::Vocabulary;

const INIT_STD: f32 = 0.1;

/// Dense `rows x dim` matrix in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    values: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self { rows, dim, values: vec![0.0; rows * dim] }
    }

    /// Gaussian rows (std 0.1) from a seeded generator, PAD row zeroed.
    pub fn random(rows: usize, dim: usize, seed: u64, pad: u32) -> Result<Self> {
        let normal = Normal::new(0.0f32, INIT_STD)
            .map_err(|e| anyhow::anyhow!("Invalid embedding init distribution: {e}"))?;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut matrix = Self {
            rows,
            dim,
            values: (0..rows * dim).map(|_| normal.sample(&mut rng)).collect(),
        };
        matrix.clear_row(pad);
        Ok(matrix)
    }

    /// Load GloVe-format vectors (`word v1 v2 ... vD` per line) for the
    /// words in `vocab`. Words missing from the file keep random vectors.
    pub fn from_glove(path: &Path, vocab: &Vocabulary, dim: usize, seed: u64) -> Result<Self> {
        let mut matrix = Self::random(vocab.len(), dim, seed, vocab.pad())?;
        let entries = vocab.entries();

        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read embeddings from '{}'", path.display()))?;

        let mut found = 0usize;
        for (line_no, line) in text.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else { continue };
            let Some(&id) = entries.get(word) else { continue };

            let vector: Vec<f32> = fields
                .map(str::parse::<f32>)
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("Bad number on line {} of '{}'", line_no + 1, path.display()))?;
            if vector.len() != dim {
                bail!(
                    "Embedding for '{}' has {} values but embedding_size is {}",
                    word, vector.len(), dim
                );
            }
            matrix.row_mut(id).copy_from_slice(&vector);
            found += 1;
        }
        matrix.clear_row(vocab.pad());

        tracing::info!(
            "Loaded pretrained vectors for {}/{} vocabulary entries",
            found,
            vocab.len()
        );
        Ok(matrix)
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn dim(&self) -> usize { self.dim }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn row(&self, id: u32) -> &[f32] {
        let start = id as usize * self.dim;
        &self.values[start..start + self.dim]
    }

    fn row_mut(&mut self, id: u32) -> &mut [f32] {
        let start = id as usize * self.dim;
        &mut self.values[start..start + self.dim]
    }

    fn clear_row(&mut self, id: u32) {
        if (id as usize) < self.rows {
            self.row_mut(id).fill(0.0);
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_is_seeded_and_pad_is_zero() {
        let a = EmbeddingMatrix::random(10, 4, 7, 0).unwrap();
        let b = EmbeddingMatrix::random(10, 4, 7, 0).unwrap();
        assert_eq!(a, b);
        assert!(a.row(0).iter().all(|&v| v == 0.0));
        assert!(a.row(5).iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_from_glove_overrides_known_words() {
        let vocab = Vocabulary::build(&["the cat".to_string()], 20).unwrap();
        let cat = vocab.encode_words("cat").unwrap()[0];

        let path = std::env::temp_dir().join(format!("sentence_vae_glove_{}.txt", std::process::id()));
        fs::write(&path, "cat 1.0 2.0 3.0\nunseen 9.0 9.0 9.0\n").unwrap();
        let matrix = EmbeddingMatrix::from_glove(&path, &vocab, 3, 1).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(matrix.rows(), vocab.len());
        assert_eq!(matrix.row(cat), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_from_glove_rejects_wrong_dimension() {
        let vocab = Vocabulary::build(&["the cat".to_string()], 20).unwrap();
        let path = std::env::temp_dir().join(format!("sentence_vae_glove_bad_{}.txt", std::process::id()));
        fs::write(&path, "cat 1.0 2.0\n").unwrap();
        let result = EmbeddingMatrix::from_glove(&path, &vocab, 3, 1);
        fs::remove_file(&path).ok();
        assert!(result.is_err());
    }
}
