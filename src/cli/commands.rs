// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Defines the subcommands and all their configurable flags:
//
//   train        fit the VAE on a sentence corpus
//   predict      reconstruct test sentences, report BLEU
//   sample       decode random prior codes
//   interpolate  walk between two codes (random or sentences)
//   neighbours   repeated samples around test sentences
//   diversity    entropy / distinct-n of samples
//   encode       posterior mean and log σ of test sentences
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::ml::{loss::BatchReduction, optim::OptimizerKind, schedule::AnnealType};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the sentence VAE on a text corpus (one sentence per line)
    Train(TrainArgs),

    /// Reconstruct test sentences and report BLEU-1..4
    Predict(PredictArgs),

    /// Generate sentences from random latent codes
    Sample(SampleArgs),

    /// Decode points on a line between two latent codes
    Interpolate(InterpolateArgs),

    /// Sample repeatedly around each test sentence
    Neighbours(NeighboursArgs),

    /// Entropy and distinct-1/2 of reconstructions
    Diversity(DiversityArgs),

    /// Print or save the posterior of each test sentence
    Encode(EncodeArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Text file, or directory of .txt files, with one sentence per line
    #[arg(long, default_value = "data/sentences.txt")]
    pub corpus_path: String,

    /// GloVe-format text vectors; random embeddings when omitted
    #[arg(long)]
    pub embeddings_path: Option<String>,

    /// Directory to save checkpoints, vocabulary and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value_t = 100)]
    pub lstm_hidden_units: usize,

    #[arg(long, default_value_t = 300)]
    pub embedding_size: usize,

    #[arg(long, default_value_t = 100)]
    pub latent_dim: usize,

    /// Stacked bidirectional encoder layers
    #[arg(long, default_value_t = 1)]
    pub num_layers: usize,

    /// Upper bound on vocabulary size, reserved tokens included
    #[arg(long, default_value_t = 20_000)]
    pub vocab_size: usize,

    /// Fixed sentence length in ids (words + EOS), also the decode limit
    #[arg(long, default_value_t = 20)]
    pub num_tokens: usize,

    /// Keep probability for LSTM input dropout
    #[arg(long, default_value_t = 0.8)]
    pub dropout_keep_prob: f64,

    /// Floor of the word-dropout keep probability
    #[arg(long, default_value_t = 0.5)]
    pub word_dropout_keep_probability: f64,

    /// Per-epoch decrease of the word-dropout keep probability
    #[arg(long, default_value_t = 0.05)]
    pub word_dropout_step: f64,

    /// Sampling temperature for z
    #[arg(long, default_value_t = 1.0)]
    pub z_temp: f64,

    #[arg(long, value_enum, default_value_t = OptimizerKind::Adam)]
    pub optimizer: OptimizerKind,

    #[arg(long, default_value_t = 1e-3)]
    pub initial_learning_rate: f64,

    #[arg(long, default_value_t = 0.9)]
    pub learning_rate_decay: f64,

    #[arg(long, default_value_t = 1e-5)]
    pub min_learning_rate: f64,

    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 20)]
    pub n_epochs: usize,

    /// Sum or average per-sentence losses over the batch
    #[arg(long, value_enum, default_value_t = BatchReduction::Sum)]
    pub batch_reduction: BatchReduction,

    #[arg(long, value_enum, default_value_t = AnnealType::Linear)]
    pub anneal_type: AnnealType,

    /// Iteration at which linear annealing reaches its ceiling
    #[arg(long, default_value_t = 3500)]
    pub anneal_till: usize,

    /// KL weight used when annealing is off
    #[arg(long, default_value_t = 1.0)]
    pub lambda_val: f64,

    /// Largest KL weight the annealing reaches
    #[arg(long, default_value_t = 1.0)]
    pub kl_ceiling: f64,

    /// Iteration at the centre of tanh annealing
    #[arg(long, default_value_t = 4500.0)]
    pub anneal_offset: f64,

    /// Width in iterations of the tanh ramp
    #[arg(long, default_value_t = 1000.0)]
    pub anneal_width: f64,

    /// Fraction of the corpus held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub val_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            corpus_path:                   a.corpus_path,
            embeddings_path:               a.embeddings_path,
            checkpoint_dir:                a.checkpoint_dir,
            lstm_hidden_units:             a.lstm_hidden_units,
            embedding_size:                a.embedding_size,
            latent_dim:                    a.latent_dim,
            num_layers:                    a.num_layers,
            vocab_size:                    a.vocab_size,
            num_tokens:                    a.num_tokens,
            dropout_keep_prob:             a.dropout_keep_prob,
            word_dropout_keep_probability: a.word_dropout_keep_probability,
            word_dropout_step:             a.word_dropout_step,
            z_temp:                        a.z_temp,
            optimizer:                     a.optimizer,
            initial_learning_rate:         a.initial_learning_rate,
            learning_rate_decay:           a.learning_rate_decay,
            min_learning_rate:             a.min_learning_rate,
            batch_size:                    a.batch_size,
            n_epochs:                      a.n_epochs,
            batch_reduction:               a.batch_reduction,
            anneal_type:                   a.anneal_type,
            anneal_till:                   a.anneal_till,
            lambda_val:                    a.lambda_val,
            kl_ceiling:                    a.kl_ceiling,
            anneal_offset:                 a.anneal_offset,
            anneal_width:                  a.anneal_width,
            val_fraction:                  a.val_fraction,
            seed:                          a.seed,
        }
    }
}

/// Which checkpoint to sample from.
#[derive(Args, Debug)]
pub struct CheckpointArgs {
    /// Directory where training saved its checkpoints
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Epoch to restore; the latest when omitted
    #[arg(long)]
    pub epoch: Option<usize>,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[command(flatten)]
    pub checkpoint: CheckpointArgs,

    /// Test sentences, one per line
    #[arg(long)]
    pub test_path: String,
}

#[derive(Args, Debug)]
pub struct SampleArgs {
    #[command(flatten)]
    pub checkpoint: CheckpointArgs,

    /// Number of sentences to print
    #[arg(long, default_value_t = 10)]
    pub count: usize,

    /// Write samples here (one per line) instead of printing
    #[arg(long)]
    pub output: Option<String>,

    /// Batches of samples to write with --output
    #[arg(long, default_value_t = 1)]
    pub batches: usize,
}

#[derive(Args, Debug)]
pub struct InterpolateArgs {
    #[command(flatten)]
    pub checkpoint: CheckpointArgs,

    /// First sentence; random codes are used unless both ends are given
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Points on each line, both ends included
    #[arg(long, default_value_t = 8)]
    pub num_samples: usize,

    /// Independent random walks (random mode only)
    #[arg(long, default_value_t = 1)]
    pub rounds: usize,
}

#[derive(Args, Debug)]
pub struct NeighboursArgs {
    #[command(flatten)]
    pub checkpoint: CheckpointArgs,

    #[arg(long)]
    pub test_path: String,

    /// Sampling temperature for z
    #[arg(long, default_value_t = 1.0)]
    pub temperature: f64,

    /// Samples per test sentence
    #[arg(long, default_value_t = 10)]
    pub num_samples: usize,
}

#[derive(Args, Debug)]
pub struct DiversityArgs {
    #[command(flatten)]
    pub checkpoint: CheckpointArgs,

    #[arg(long)]
    pub test_path: String,

    #[arg(long, default_value_t = 10)]
    pub num_samples: usize,

    #[arg(long, default_value_t = 3)]
    pub num_iterations: usize,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub checkpoint: CheckpointArgs,

    #[arg(long)]
    pub test_path: String,

    /// Write JSON lines here instead of printing
    #[arg(long)]
    pub output: Option<String>,
}
