// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All work is delegated to Layer 2 (application); this layer
// only routes and prints.
//
// Output conventions for the sampling commands:
//   A: <sentence>   an actual input sentence
//   G: <sentence>   a generated sentence
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{
    Commands, DiversityArgs, EncodeArgs, InterpolateArgs, NeighboursArgs, PredictArgs, SampleArgs,
    TrainArgs,
};

use crate::application::{sample_use_case::SampleUseCase, train_use_case::TrainUseCase};

#[derive(Parser, Debug)]
#[command(
    name = "sentence-vae",
    version = "0.1.0",
    about = "Train a variational LSTM autoencoder on sentences, then sample from it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)       => run_train(args),
            Commands::Predict(args)     => run_predict(args),
            Commands::Sample(args)      => run_sample(args),
            Commands::Interpolate(args) => run_interpolate(args),
            Commands::Neighbours(args)  => run_neighbours(args),
            Commands::Diversity(args)   => run_diversity(args),
            Commands::Encode(args)      => run_encode(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    tracing::info!("Starting training on corpus: {}", args.corpus_path);

    let report = TrainUseCase::new(args.into()).execute()?;

    match report.last_epoch() {
        Some(last) => println!(
            "Training complete after {} iterations. Final BLEU-4: {:.4}",
            report.iterations, last.bleu[3]
        ),
        None => println!("Training finished without running any epoch."),
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let use_case = SampleUseCase::new(&args.checkpoint.checkpoint_dir, args.checkpoint.epoch)?;
    let (pairs, bleu) = use_case.predict(&args.test_path)?;

    for pair in &pairs {
        println!("A: {}", pair.actual);
        println!("G: {}\n", pair.generated);
    }
    println!("BLEU 1 to 4 : {:.4} | {:.4} | {:.4} | {:.4}", bleu[0], bleu[1], bleu[2], bleu[3]);
    Ok(())
}

fn run_sample(args: SampleArgs) -> Result<()> {
    let use_case = SampleUseCase::new(&args.checkpoint.checkpoint_dir, args.checkpoint.epoch)?;

    if let Some(path) = &args.output {
        let written = use_case.sample_to_file(path, args.batches)?;
        println!("Wrote {written} samples to {path}");
        return Ok(());
    }

    for sentence in use_case.sample(args.count)? {
        println!("G: {sentence}");
    }
    Ok(())
}

fn run_interpolate(args: InterpolateArgs) -> Result<()> {
    let use_case = SampleUseCase::new(&args.checkpoint.checkpoint_dir, args.checkpoint.epoch)?;

    let walks = match (&args.start, &args.end) {
        (Some(start), Some(end)) => vec![use_case.interpolate_sentences(start, end, args.num_samples)?],
        _ => use_case.interpolate_random(args.num_samples, args.rounds)?,
    };

    for walk in walks {
        for sentence in walk {
            println!("G: {sentence}");
        }
        println!();
    }
    Ok(())
}

fn run_neighbours(args: NeighboursArgs) -> Result<()> {
    let use_case = SampleUseCase::new(&args.checkpoint.checkpoint_dir, args.checkpoint.epoch)?;

    for hood in use_case.neighbours(&args.test_path, args.temperature, args.num_samples)? {
        println!("\nA: {}", hood.actual);
        for sample in hood.samples {
            println!("G: {sample}");
        }
    }
    Ok(())
}

fn run_diversity(args: DiversityArgs) -> Result<()> {
    let use_case = SampleUseCase::new(&args.checkpoint.checkpoint_dir, args.checkpoint.epoch)?;
    let scores = use_case.diversity(&args.test_path, args.num_samples, args.num_iterations)?;

    println!(
        "Entropy = {:.3} | Distinct-1 = {:.3} | Distinct-2 = {:.3}",
        scores.entropy, scores.distinct_1, scores.distinct_2
    );
    Ok(())
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    let use_case = SampleUseCase::new(&args.checkpoint.checkpoint_dir, args.checkpoint.epoch)?;
    let encoded = use_case.encode(&args.test_path, args.output.as_deref())?;

    if args.output.is_none() {
        for code in &encoded {
            println!("{}", serde_json::to_string(code)?);
        }
    }
    Ok(())
}
