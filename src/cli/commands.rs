// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `prepare`, `train`, `predict`
// and all their configurable flags.
//
// `train` starts from a profile preset; any network or optimiser
// flag given explicitly overrides the preset value.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{
    predict_use_case::PredictConfig,
    prepare_use_case::PrepareConfig,
    train_use_case::{OptimizerKind, Profile, TrainConfig},
};
use crate::domain::normalization::Normalization;

/// The three top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pair raw photos with masks and save x_train.npy / y_train.npy
    Prepare(PrepareArgs),

    /// Train the U-Net on prepared arrays
    Train(TrainArgs),

    /// Predict a mask for every raw photo in a directory
    Predict(PredictArgs),
}

/// All arguments for the `prepare` command
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Directory containing <id>_raw.jpg files
    #[arg(long, default_value = "raws")]
    pub raws_dir: String,

    /// Directory containing <id>_mask.jpg files
    #[arg(long, default_value = "masks")]
    pub masks_dir: String,

    /// Where x_train.npy, y_train.npy and train_ids.json are written
    #[arg(long, default_value = ".")]
    pub output_dir: String,

    /// Preset that fixes the expected image size (rgb-mask | binary-mask)
    #[arg(long, default_value = "rgb-mask")]
    pub profile: Profile,

    #[arg(long)]
    pub height: Option<usize>,

    #[arg(long)]
    pub width: Option<usize>,
}

impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        let (height, width) = a.profile.image_size();
        PrepareConfig {
            raws_dir:   a.raws_dir,
            masks_dir:  a.masks_dir,
            output_dir: a.output_dir,
            height:     a.height.unwrap_or(height),
            width:      a.width.unwrap_or(width),
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory containing x_train.npy and y_train.npy
    #[arg(long, default_value = ".")]
    pub data_dir: String,

    /// Directory for weight files and train_config.json
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Directory for metrics.csv and preview images
    #[arg(long, default_value = "logs")]
    pub logs_dir: String,

    /// Network and optimiser preset (rgb-mask | binary-mask)
    #[arg(long, default_value = "rgb-mask")]
    pub profile: Profile,

    #[arg(long)]
    pub height: Option<usize>,

    #[arg(long)]
    pub width: Option<usize>,

    /// Number of encoder stages; H and W must divide by 2^depth
    #[arg(long)]
    pub depth: Option<usize>,

    /// Filters in the first stage, doubled at every stage below it
    #[arg(long)]
    pub base_filters: Option<usize>,

    #[arg(long)]
    pub dropout: Option<f64>,

    /// adam | adagrad
    #[arg(long)]
    pub optimizer: Option<OptimizerKind>,

    #[arg(long)]
    pub lr: Option<f64>,

    /// Per-step learning rate decay (adagrad only)
    #[arg(long)]
    pub lr_decay: Option<f64>,

    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 5)]
    pub epochs: usize,

    /// Save weights every N training steps
    #[arg(long, default_value_t = 1)]
    pub checkpoint_every: usize,

    /// Trailing fraction of the arrays held out for validation
    #[arg(long, default_value_t = 0.2)]
    pub validation_split: f64,

    /// unit-scale | standardize
    #[arg(long, default_value = "unit-scale")]
    pub normalization: Normalization,

    /// Shuffle seed for training batches (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let mut cfg = TrainConfig::for_profile(a.profile);

        if let Some(h) = a.height       { cfg.model.height       = h; }
        if let Some(w) = a.width        { cfg.model.width        = w; }
        if let Some(d) = a.depth        { cfg.model.depth        = d; }
        if let Some(f) = a.base_filters { cfg.model.base_filters = f; }
        if let Some(p) = a.dropout      { cfg.model.dropout      = p; }
        if let Some(o) = a.optimizer    { cfg.optimizer          = o; }
        if let Some(lr) = a.lr          { cfg.lr                 = lr; }
        if let Some(d) = a.lr_decay     { cfg.lr_decay           = d; }

        TrainConfig {
            data_dir:         a.data_dir,
            checkpoint_dir:   a.checkpoint_dir,
            logs_dir:         a.logs_dir,
            batch_size:       a.batch_size,
            epochs:           a.epochs,
            checkpoint_every: a.checkpoint_every,
            validation_split: a.validation_split,
            normalization:    a.normalization,
            seed:             a.seed.unwrap_or_else(rand::random),
            ..cfg
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Directory containing <id>_raw.jpg files
    #[arg(long, default_value = "predict_raws")]
    pub input_dir: String,

    /// Where <id>_mask.png files are written
    #[arg(long, default_value = "predict_masks")]
    pub output_dir: String,

    /// Directory where training saved weights and train_config.json
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Weights file to load instead of the best/final weights
    #[arg(long)]
    pub weights: Option<String>,

    /// Images per forward pass
    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,
}

impl From<PredictArgs> for PredictConfig {
    fn from(a: PredictArgs) -> Self {
        PredictConfig {
            input_dir:      a.input_dir,
            output_dir:     a.output_dir,
            checkpoint_dir: a.checkpoint_dir,
            weights:        a.weights,
            batch_size:     a.batch_size,
        }
    }
}
