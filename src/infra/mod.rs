// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Handles the cross-cutting concerns that don't belong in
// any specific business layer:
//
//   checkpoint.rs  Saving and loading model weights with
//                  Burn's CompactRecorder, plus the
//                  TrainConfig and vocabulary beside them
//                  so inference can rebuild the model.
//
//   vocabulary.rs  Word-level tokenizer with the reserved
//                  PAD / GO / EOS / UNK tokens. Built from
//                  the training corpus or loaded from disk.
//
//   embeddings.rs  The frozen embedding matrix, from GloVe
//                  text vectors or seeded random values.
//
//   metrics.rs     Epoch metrics CSV and BLEU history.
//
//   scoring.rs     BLEU, entropy and distinct-n.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Vocabulary building, saving, and loading
pub mod vocabulary;

/// Pretrained or random embedding matrices
pub mod embeddings;

/// Training metrics CSV logger
pub mod metrics;

/// BLEU and diversity scores
pub mod scoring;
