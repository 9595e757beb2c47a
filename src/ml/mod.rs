// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// All tensor code lives in this layer.
//
// What's in this layer:
//
//   cell.rs       layer-normalised LSTM cell
//   embedding.rs  frozen word embeddings + word dropout
//   encoder.rs    stacked bidirectional LSTM, length-masked
//   latent.rs     mean / log σ heads, reparameterised sampling,
//                 closed-form KL, interpolation
//   decoder.rs    one LSTM decoder driven by a feed policy:
//                 teacher forcing or greedy feedback
//   loss.rs       masked cross-entropy + weighted KL
//   schedule.rs   KL weight, word-dropout keep, learning rate
//   optim.rs      adam / sgd / rmsprop with clipping
//   readback.rs   tensor → host vectors
//   model.rs      the assembled SentenceVae
//   trainer.rs    epoch loop, validation BLEU, checkpoints
//   inferencer.rs everything done with a trained checkpoint
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Bowman et al. (2016) Generating Sentences from a
//            Continuous Space

/// Layer-normalised LSTM cell shared by encoder and decoder
pub mod cell;

/// Frozen embedding lookup and word dropout
pub mod embedding;

/// Bidirectional LSTM sentence encoder
pub mod encoder;

/// Gaussian latent space
pub mod latent;

/// Three-mode LSTM decoder
pub mod decoder;

/// Reconstruction + KL loss
pub mod loss;

/// Annealing and learning-rate schedules
pub mod schedule;

/// Optimiser selection with gradient clipping
pub mod optim;

/// Device to host copies
pub mod readback;

/// The sentence VAE model
pub mod model;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Prediction and sampling from a checkpoint
pub mod inferencer;
