use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::sentence::TokenSequence;
use crate::infra::vocabulary::Vocabulary;

/// One encoded sentence: `num_tokens` ids ending in EOS, then PAD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceSample {
    pub ids:    Vec<u32>,
    pub length: usize,
}

impl From<TokenSequence> for SentenceSample {
    fn from(seq: TokenSequence) -> Self {
        Self { ids: seq.ids, length: seq.length }
    }
}

pub struct SentenceDataset {
    samples: Vec<SentenceSample>,
}

impl SentenceDataset {
    pub fn new(samples: Vec<SentenceSample>) -> Self { Self { samples } }

    /// Encode raw sentences with `vocab`, padding or truncating to `num_tokens`.
    pub fn from_sentences(sentences: &[String], vocab: &Vocabulary, num_tokens: usize) -> anyhow::Result<Self> {
        let samples = sentences
            .iter()
            .map(|s| vocab.encode(s, num_tokens).map(SentenceSample::from))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::new(samples))
    }

    pub fn samples(&self) -> &[SentenceSample] {
        &self.samples
    }
}

impl Dataset<SentenceSample> for SentenceDataset {
    fn get(&self, index: usize) -> Option<SentenceSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
