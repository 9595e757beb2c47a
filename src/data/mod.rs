// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything from a text corpus to id tensor batches.
//
// The pipeline flows in this order:
//
//   corpus (.txt, one sentence per line)
//       │
//       ▼
//   CorpusLoader      → reads lines
//       │
//       ▼
//   Preprocessor      → normalises whitespace and control chars
//       │
//       ▼
//   split_train_val   → seeded shuffle, train / validation
//       │
//       ▼
//   Vocabulary        → word ids + EOS, padded to num_tokens
//       │
//       ▼
//   SentenceDataset   → implements Burn's Dataset trait
//       │
//       ▼
//   SentenceBatcher   → stacks samples into [B, L] tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads sentence corpora from text files
pub mod loader;

/// Cleans and normalises raw corpus lines
pub mod preprocessor;

/// Implements Burn's Dataset trait for encoded sentences
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded shuffle and train/validation split
pub mod splitter;
