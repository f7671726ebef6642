// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `prepare` — pairs raws with masks into x_train / y_train arrays
//   2. `train`   — trains the U-Net and writes weight checkpoints
//   3. `predict` — loads trained weights and writes one mask per raw
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, PrepareArgs, TrainArgs};

/// The main CLI struct, parsed by clap's derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "unet-segmenter",
    version,
    about = "Prepare image/mask pairs, train a U-Net segmenter, and predict masks."
)]
pub struct Cli {
    /// The subcommand to run (prepare, train or predict)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare(args) => Self::run_prepare(args),
            Commands::Train(args)   => Self::run_train(args),
            Commands::Predict(args) => Self::run_predict(args),
        }
    }

    fn run_prepare(args: PrepareArgs) -> Result<()> {
        use crate::application::prepare_use_case::PrepareUseCase;

        tracing::info!("Pairing '{}' with '{}'", args.raws_dir, args.masks_dir);

        let set = PrepareUseCase::new(args.into()).execute()?;

        println!(
            "Prepared {} samples of shape {:?}.",
            set.ids.len(),
            &set.images.shape()[1..]
        );
        Ok(())
    }

    /// Converts CLI args into a TrainConfig and hands off to Layer 2.
    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training on arrays in: {}", args.data_dir);

        let use_case = TrainUseCase::new(args.into());
        let report   = use_case.execute()?;

        if let Some(last) = report.epochs.last() {
            println!("Final epoch: train_dice={:.4} | val_dice={:.4}", last.train_dice, last.val_dice);
        }
        println!(
            "Training complete. {} steps, {} step checkpoints, best loss {:.4}.",
            report.steps, report.checkpoints, report.best_loss
        );
        Ok(())
    }

    fn run_predict(args: PredictArgs) -> Result<()> {
        use crate::application::predict_use_case::PredictUseCase;
        use crate::ml::{inferencer::InferBackend, trainer::default_device};

        let use_case = PredictUseCase::<InferBackend>::new(args.into(), default_device())?;
        let written  = use_case.execute()?;

        println!("Wrote {written} masks.");
        Ok(())
    }
}
