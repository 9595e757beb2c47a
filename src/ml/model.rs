use anyhow::Result;
use burn::prelude::*;

use crate::infra::embeddings::EmbeddingMatrix;
use crate::ml::{
    decoder::{DecodeMode, Decoder, DecoderConfig, GreedyFeedback, SpecialIds, TeacherForcing},
    embedding::{word_dropout, WordEmbedder},
    encoder::{BiLstmEncoder, BiLstmEncoderConfig},
    latent::{sample, standard_normal_codes, GaussianLatent, GaussianLatentConfig},
    loss::sequence_mask,
};

#[derive(Config, Debug)]
pub struct SentenceVaeConfig {
    pub vocab_size:        usize,
    pub embedding_size:    usize,
    pub lstm_hidden_units: usize,
    pub latent_dim:        usize,
    #[config(default = 1)]
    pub num_layers:        usize,
    #[config(default = 1.0)]
    pub dropout_keep_prob: f64,
    #[config(default = 0)]
    pub pad_id:            usize,
    #[config(default = 1)]
    pub go_id:             usize,
    #[config(default = 2)]
    pub eos_id:            usize,
}

impl SentenceVaeConfig {
    /// Build a fresh model around a prepared embedding matrix.
    pub fn init<B: Backend>(&self, embeddings: &EmbeddingMatrix, device: &B::Device) -> Result<SentenceVae<B>> {
        let embedder = WordEmbedder::from_matrix(embeddings, self.vocab_size, self.embedding_size, device)?;
        Ok(self.assemble(embedder, device))
    }

    /// Build a model whose embeddings are zero; meant to be overwritten
    /// by a checkpoint record.
    pub fn init_for_restore<B: Backend>(&self, device: &B::Device) -> SentenceVae<B> {
        let embedder = WordEmbedder::zeros(self.vocab_size, self.embedding_size, device);
        self.assemble(embedder, device)
    }

    fn assemble<B: Backend>(&self, embedder: WordEmbedder<B>, device: &B::Device) -> SentenceVae<B> {
        let dropout = (1.0 - self.dropout_keep_prob).clamp(0.0, 1.0);
        let summary = 2 * self.lstm_hidden_units;

        let encoder = BiLstmEncoderConfig::new(self.embedding_size, self.lstm_hidden_units)
            .with_num_layers(self.num_layers)
            .with_dropout(dropout)
            .init(device);
        let latent = GaussianLatentConfig::new(summary, self.latent_dim).init(device);
        let decoder = DecoderConfig::new(self.embedding_size, self.latent_dim, summary, self.vocab_size)
            .with_dropout(dropout)
            .init(device);

        SentenceVae {
            embedder,
            encoder,
            latent,
            decoder,
            pad_id: self.pad_id,
            go_id:  self.go_id,
            eos_id: self.eos_id,
        }
    }
}

/// Embeddings → BiLSTM encoder → Gaussian latent → LSTM decoder.
#[derive(Module, Debug)]
pub struct SentenceVae<B: Backend> {
    pub embedder: WordEmbedder<B>,
    pub encoder:  BiLstmEncoder<B>,
    pub latent:   GaussianLatent<B>,
    pub decoder:  Decoder<B>,
    pub pad_id:   usize,
    pub go_id:    usize,
    pub eos_id:   usize,
}

/// Everything the loss needs from one teacher-forced pass.
pub struct TrainOutput<B: Backend> {
    /// `[batch, steps, vocab]`
    pub logits:    Tensor<B, 3>,
    pub mean:      Tensor<B, 2>,
    pub log_sigma: Tensor<B, 2>,
}

impl<B: Backend> SentenceVae<B> {
    pub fn special_ids(&self) -> SpecialIds {
        SpecialIds {
            pad: self.pad_id as u32,
            go:  self.go_id as u32,
            eos: self.eos_id as u32,
        }
    }

    pub fn latent_dim(&self) -> usize {
        self.latent.latent_dim()
    }

    /// Posterior parameters (mean, log_sigma) for `inputs` `[batch, steps]`.
    pub fn encode(
        &self,
        inputs:  Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [_, steps] = inputs.dims();
        let mask = sequence_mask(lengths, steps);
        let summary = self.encoder.forward(self.embedder.forward(inputs), mask);
        self.latent.forward(summary)
    }

    /// Reparameterised sample of z for `inputs` at the given temperature.
    pub fn sample_latent(
        &self,
        inputs:      Tensor<B, 2, Int>,
        lengths:     Tensor<B, 1, Int>,
        temperature: f64,
    ) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>) {
        let (mean, log_sigma) = self.encode(inputs, lengths);
        let [batch, latent_dim] = mean.dims();
        let noise = standard_normal_codes(batch, latent_dim, &mean.device());
        let z = sample(mean.clone(), log_sigma.clone(), noise, temperature);
        (z, mean, log_sigma)
    }

    /// Teacher-forced pass with word dropout, as used for training.
    pub fn forward_train(
        &self,
        inputs:      Tensor<B, 2, Int>,
        targets:     Tensor<B, 2, Int>,
        lengths:     Tensor<B, 1, Int>,
        word_keep:   f64,
        temperature: f64,
    ) -> Result<TrainOutput<B>> {
        let [_, steps] = targets.dims();
        let (z, mean, log_sigma) = self.sample_latent(inputs, lengths.clone(), temperature);

        let special = self.special_ids();
        let decoder_ids = word_dropout(targets, word_keep, special.go, special.pad);
        let policy = TeacherForcing::new(self.embedder.forward(decoder_ids), sequence_mask(lengths, steps));
        let logits = self.decoder.run(z, policy)?;

        Ok(TrainOutput { logits, mean, log_sigma })
    }

    /// Greedy decode of `num_tokens` ids per latent code.
    pub fn greedy_decode(&self, z: Tensor<B, 2>, num_tokens: usize, mode: DecodeMode) -> Result<Vec<Vec<u32>>> {
        let [batch, _] = z.dims();
        let policy = GreedyFeedback::new(&self.embedder, batch, num_tokens, self.special_ids(), mode, &z.device());
        self.decoder.run(z, policy)
    }

    /// Encode, sample at `temperature`, then decode greedily.
    pub fn reconstruct(
        &self,
        inputs:      Tensor<B, 2, Int>,
        lengths:     Tensor<B, 1, Int>,
        temperature: f64,
        num_tokens:  usize,
        mode:        DecodeMode,
    ) -> Result<Vec<Vec<u32>>> {
        let (z, _, _) = self.sample_latent(inputs, lengths, temperature);
        self.greedy_decode(z, num_tokens, mode)
    }

    /// Inference-mode decoding of caller-supplied latent codes.
    pub fn generate(&self, z: Tensor<B, 2>, num_tokens: usize) -> Result<Vec<Vec<u32>>> {
        self.greedy_decode(z, num_tokens, DecodeMode::Inference)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn model() -> SentenceVae<TestBackend> {
        let device = Default::default();
        let matrix = EmbeddingMatrix::random(20, 6, 3, 0).unwrap();
        SentenceVaeConfig::new(20, 6, 5, 4)
            .with_num_layers(2)
            .init(&matrix, &device)
            .unwrap()
    }

    fn batch() -> (Tensor<TestBackend, 2, Int>, Tensor<TestBackend, 1, Int>) {
        let device = Default::default();
        let ids = Tensor::<TestBackend, 1, Int>::from_ints([4, 5, 6, 2, 7, 8, 2, 0], &device).reshape([2, 4]);
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([4, 3], &device);
        (ids, lengths)
    }

    #[test]
    fn test_forward_train_shapes() {
        let vae = model();
        let (ids, lengths) = batch();
        let out = vae.forward_train(ids.clone(), ids, lengths, 0.9, 1.0).unwrap();
        assert_eq!(out.logits.dims(), [2, 4, 20]);
        assert_eq!(out.mean.dims(), [2, 4]);
        assert_eq!(out.log_sigma.dims(), [2, 4]);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let vae = model();
        let (ids, lengths) = batch();
        let (a, _) = vae.encode(ids.clone(), lengths.clone());
        let (b, _) = vae.encode(ids, lengths);
        assert_eq!(
            a.into_data().to_vec::<f32>().unwrap(),
            b.into_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_zero_temperature_reconstruction_is_repeatable() {
        let vae = model();
        let (ids, lengths) = batch();
        let a = vae.reconstruct(ids.clone(), lengths.clone(), 0.0, 6, DecodeMode::Validation).unwrap();
        let b = vae.reconstruct(ids, lengths, 0.0, 6, DecodeMode::Inference).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|row| row.len() == 6));
    }
}
