// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and delegates to Layer 2.
//
//   1. `train`     — k-fold training on MAMI annotations
//   2. `predict`   — score an unlabeled file with a trained fold
//   3. `summarize` — print the class distribution of a dataset
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, DataArgs, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "mami",
    version = "0.1.0",
    about = "Train and evaluate a multi-label misogyny classifier on MAMI meme annotations."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Routes to the use case; never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)     => run_train(args),
            Commands::Predict(args)   => run_predict(args),
            Commands::Summarize(args) => run_summarize(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on annotations in: {}", args.data.data_dir);
    let outcomes = TrainUseCase::new(args.into()).execute()?;

    for o in &outcomes {
        println!("fold {}: best score {:.4} (epoch {})", o.fold, o.best_score, o.best_epoch);
    }
    println!("Training complete. Checkpoints saved.");
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let use_case = PredictUseCase::new(&args.checkpoint_dir)?;
    let (predictions, path) =
        use_case.execute(&args.data_dir, &args.text_file, args.fold, args.output)?;

    println!("Wrote {} predictions to {}", predictions.len(), path.display());
    Ok(())
}

fn run_summarize(args: DataArgs) -> Result<()> {
    use crate::application::summarize_use_case::SummarizeUseCase;

    let summary = SummarizeUseCase::new(args.into()).execute()?;
    println!("{summary}");
    Ok(())
}
