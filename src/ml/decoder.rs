// ============================================================
// Layer 5: Decoder
// ============================================================
// One layer-normalised LSTM cell (2H units) plus an output
// projection 2H → vocab. At every step the cell sees
//
//   [ embedding(previous token) ; z ]
//
// and starts from a zero state. What "previous token" means is
// decided by a FeedPolicy:
//
//   TeacherForcing  → the (word-dropped) ground truth, for
//                     training; returns logits [B, T, V]
//   GreedyFeedback  → the argmax of the previous step, starting
//                     from GO; returns ids [B, num_tokens]
//
// Validation and inference both use GreedyFeedback, so with the
// same z they produce identical ids. The DecodeMode tag only
// shows up in traces.

use anyhow::Result;
use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};
use std::fmt;

use crate::ml::{
    cell::{LayerNormLstmCell, LayerNormLstmConfig, LstmState},
    embedding::WordEmbedder,
    readback::id_rows,
};

#[derive(Config, Debug)]
pub struct DecoderConfig {
    pub d_embedding: usize,
    pub latent_dim:  usize,
    pub d_hidden:    usize,
    pub vocab_size:  usize,
    #[config(default = 0.0)]
    pub dropout:     f64,
}

impl DecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Decoder<B> {
        Decoder {
            cell: LayerNormLstmConfig::new(self.d_embedding + self.latent_dim, self.d_hidden)
                .with_dropout(self.dropout)
                .init(device),
            output: LinearConfig::new(self.d_hidden, self.vocab_size).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    pub cell:   LayerNormLstmCell<B>,
    pub output: Linear<B>,
}

// ─── FeedPolicy ───────────────────────────────────────────────────────────────
/// Decides what the decoder reads at each step and collects what it writes.
pub trait FeedPolicy<B: Backend> {
    type Output;

    /// Embedded input `[batch, d_embedding]` for `step`, or `None` to stop.
    fn next_input(&mut self, step: usize) -> Option<Tensor<B, 2>>;

    /// Logits `[batch, vocab]` produced at `step`.
    fn record(&mut self, step: usize, logits: Tensor<B, 2>) -> Result<()>;

    fn finish(self) -> Result<Self::Output>;
}

impl<B: Backend> Decoder<B> {
    /// Unroll the cell under `policy`, conditioning every step on `z` `[batch, latent]`.
    pub fn run<P: FeedPolicy<B>>(&self, z: Tensor<B, 2>, mut policy: P) -> Result<P::Output> {
        let [batch, _] = z.dims();
        let mut state = LstmState::zeros(batch, self.cell.d_hidden(), &z.device());

        let mut step = 0;
        while let Some(embedded) = policy.next_input(step) {
            let input = Tensor::cat(vec![embedded, z.clone()], 1);
            state = self.cell.step(input, state);
            policy.record(step, self.output.forward(state.hidden.clone()))?;
            step += 1;
        }

        policy.finish()
    }
}

// ─── TeacherForcing ───────────────────────────────────────────────────────────
/// Feeds pre-embedded inputs `[batch, steps, d]`; logits past each
/// sentence's length are zeroed.
pub struct TeacherForcing<B: Backend> {
    inputs: Tensor<B, 3>,
    mask:   Tensor<B, 2>,
    logits: Vec<Tensor<B, 2>>,
}

impl<B: Backend> TeacherForcing<B> {
    pub fn new(inputs: Tensor<B, 3>, mask: Tensor<B, 2>) -> Self {
        let [_, steps, _] = inputs.dims();
        Self { inputs, mask, logits: Vec::with_capacity(steps) }
    }
}

impl<B: Backend> FeedPolicy<B> for TeacherForcing<B> {
    type Output = Tensor<B, 3>;

    fn next_input(&mut self, step: usize) -> Option<Tensor<B, 2>> {
        let [batch, steps, d] = self.inputs.dims();
        (step < steps).then(|| {
            self.inputs
                .clone()
                .slice([0..batch, step..step + 1, 0..d])
                .reshape([batch, d])
        })
    }

    fn record(&mut self, step: usize, logits: Tensor<B, 2>) -> Result<()> {
        let [batch, vocab] = logits.dims();
        let alive = self.mask.clone().slice([0..batch, step..step + 1]).expand([batch, vocab]);
        self.logits.push(logits * alive);
        Ok(())
    }

    fn finish(self) -> Result<Tensor<B, 3>> {
        Ok(Tensor::stack(self.logits, 1))
    }
}

// ─── GreedyFeedback ───────────────────────────────────────────────────────────
/// Which caller is decoding greedily; only used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    Validation,
    Inference,
}

impl fmt::Display for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeMode::Validation => write!(f, "validation"),
            DecodeMode::Inference  => write!(f, "inference"),
        }
    }
}

/// Reserved ids the greedy loop needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialIds {
    pub pad: u32,
    pub go:  u32,
    pub eos: u32,
}

/// Feeds back the argmax of each step. A row is finished once it has
/// emitted EOS; from then on it emits PAD. Stops when every row is
/// finished or after `max_steps`.
pub struct GreedyFeedback<'a, B: Backend> {
    embedder:  &'a WordEmbedder<B>,
    special:   SpecialIds,
    max_steps: usize,
    mode:      DecodeMode,
    device:    B::Device,
    previous:  Vec<u32>,
    finished:  Vec<bool>,
    rows:      Vec<Vec<u32>>,
}

impl<'a, B: Backend> GreedyFeedback<'a, B> {
    pub fn new(
        embedder:  &'a WordEmbedder<B>,
        batch:     usize,
        max_steps: usize,
        special:   SpecialIds,
        mode:      DecodeMode,
        device:    &B::Device,
    ) -> Self {
        Self {
            embedder,
            special,
            max_steps,
            mode,
            device:   device.clone(),
            previous: vec![special.go; batch],
            finished: vec![false; batch],
            rows:     vec![Vec::with_capacity(max_steps); batch],
        }
    }
}

impl<'a, B: Backend> FeedPolicy<B> for GreedyFeedback<'a, B> {
    type Output = Vec<Vec<u32>>;

    fn next_input(&mut self, step: usize) -> Option<Tensor<B, 2>> {
        if step >= self.max_steps || self.finished.iter().all(|&f| f) {
            return None;
        }
        let batch = self.previous.len();
        let ids: Vec<i32> = self.previous.iter().map(|&id| id as i32).collect();
        let ids = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device).reshape([batch, 1]);
        let embedded = self.embedder.forward(ids);
        let [_, _, d] = embedded.dims();
        Some(embedded.reshape([batch, d]))
    }

    fn record(&mut self, _step: usize, logits: Tensor<B, 2>) -> Result<()> {
        let [batch, _] = logits.dims();
        let best = id_rows(logits.argmax(1).reshape([batch, 1]))?;

        for (row, ids) in best.iter().enumerate() {
            let token = if self.finished[row] { self.special.pad } else { ids[0] };
            if token == self.special.eos {
                self.finished[row] = true;
            }
            self.rows[row].push(token);
            self.previous[row] = token;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Vec<u32>>> {
        let emitted = self.rows.first().map_or(0, Vec::len);
        for row in &mut self.rows {
            row.resize(self.max_steps, self.special.pad);
        }
        tracing::debug!(
            "Greedy {} decode: {} rows, {} steps, {} finished",
            self.mode,
            self.rows.len(),
            emitted,
            self.finished.iter().filter(|&&f| f).count(),
        );
        Ok(self.rows)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::embeddings::EmbeddingMatrix;
    use crate::ml::loss::sequence_mask;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    const SPECIAL: SpecialIds = SpecialIds { pad: 0, go: 1, eos: 2 };

    fn setup() -> (Decoder<TestBackend>, WordEmbedder<TestBackend>) {
        let device = Default::default();
        let decoder = DecoderConfig::new(4, 3, 8, 12).init(&device);
        let matrix = EmbeddingMatrix::random(12, 4, 5, 0).unwrap();
        let embedder = WordEmbedder::from_matrix(&matrix, 12, 4, &device).unwrap();
        (decoder, embedder)
    }

    fn greedy(
        decoder:  &Decoder<TestBackend>,
        embedder: &WordEmbedder<TestBackend>,
        z:        Tensor<TestBackend, 2>,
        mode:     DecodeMode,
    ) -> Vec<Vec<u32>> {
        let [batch, _] = z.dims();
        let policy = GreedyFeedback::new(embedder, batch, 7, SPECIAL, mode, &Default::default());
        decoder.run(z, policy).unwrap()
    }

    #[test]
    fn test_validation_and_inference_agree() {
        let (decoder, embedder) = setup();
        let z = Tensor::<TestBackend, 2>::random([3, 3], Distribution::Normal(0.0, 1.0), &Default::default());
        let a = greedy(&decoder, &embedder, z.clone(), DecodeMode::Validation);
        let b = greedy(&decoder, &embedder, z, DecodeMode::Inference);
        assert_eq!(a, b);
    }

    #[test]
    fn test_greedy_rows_are_padded_after_eos() {
        let (decoder, embedder) = setup();
        let z = Tensor::<TestBackend, 2>::random([4, 3], Distribution::Normal(0.0, 1.0), &Default::default());
        for row in greedy(&decoder, &embedder, z, DecodeMode::Inference) {
            assert_eq!(row.len(), 7);
            if let Some(eos_at) = row.iter().position(|&id| id == SPECIAL.eos) {
                assert!(row[eos_at + 1..].iter().all(|&id| id == SPECIAL.pad));
            }
        }
    }

    #[test]
    fn test_teacher_forcing_zeroes_finished_steps() {
        let (decoder, embedder) = setup();
        let device = Default::default();
        let ids = Tensor::<TestBackend, 1, Int>::from_ints([1, 5, 6, 7, 1, 8, 0, 0], &device).reshape([2, 4]);
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([4, 2], &device);
        let z = Tensor::<TestBackend, 2>::zeros([2, 3], &device);

        let policy = TeacherForcing::new(embedder.forward(ids), sequence_mask(lengths, 4));
        let logits = decoder.run(z, policy).unwrap();
        assert_eq!(logits.dims(), [2, 4, 12]);

        let values = logits.into_data().to_vec::<f32>().unwrap();
        // second row, steps 2 and 3
        let tail = &values[(4 + 2) * 12..];
        assert!(tail.iter().all(|&v| v == 0.0));
    }
}
