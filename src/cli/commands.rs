// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands `train`, `predict` and
// `summarize` and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::data::splitter::DEFAULT_SEED;
use crate::domain::label::LabelField;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// K-fold training and evaluation on MAMI annotations
    Train(TrainArgs),

    /// Score an unlabeled annotation file with a trained fold
    Predict(PredictArgs),

    /// Print the dataset summary and class distribution
    Summarize(DataArgs),
}

/// Where the annotations live
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Directory containing the images and annotation files
    #[arg(long, default_value = "data/TRAINING")]
    pub data_dir: String,

    /// Tab-separated annotation file inside data_dir.
    /// Files whose name contains ".csv" must start with a header row.
    #[arg(long, default_value = "training.csv")]
    pub text_file: String,

    /// Optional tab-separated labels file inside data_dir
    /// (file_name + five 0/1 labels), merged by file_name
    #[arg(long)]
    pub labels_file: Option<String>,

    /// Directory for checkpoints, tokenizer, reports and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Existing tokenizer.json to use instead of building a vocabulary
    #[arg(long)]
    pub tokenizer: Option<String>,

    /// Number of cross-validation folds
    #[arg(long, default_value_t = 5)]
    pub k_folds: usize,

    /// Seed for the fold shuffle and the training loader
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Train only this fold (0-based); all folds when omitted
    #[arg(long)]
    pub fold: Option<usize>,

    /// Tokens per text, after truncation / padding
    #[arg(long, default_value_t = 64)]
    pub text_max_length: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 2e-4)]
    pub lr: f64,

    /// Hidden dimension of the transformer
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 4)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Upper bound on the vocabulary built from the training texts
    #[arg(long, default_value_t = 30000)]
    pub vocab_size: usize,

    /// Positive samples per class for the loss weights, as five
    /// comma-separated counts in label order
    /// (misogynous,shaming,stereotype,objectification,violence).
    /// Measured on each fold's training view when omitted.
    #[arg(long, value_parser = parse_positive_counts)]
    pub positive_counts: Option<BTreeMap<LabelField, usize>>,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:        a.data.data_dir,
            text_file:       a.data.text_file,
            labels_file:     a.data.labels_file,
            checkpoint_dir:  a.data.checkpoint_dir,
            tokenizer:       a.data.tokenizer,
            text_max_length: a.text_max_length,
            k_folds:         a.data.k_folds,
            fold:            a.fold,
            seed:            a.data.seed,
            batch_size:      a.batch_size,
            epochs:          a.epochs,
            lr:              a.lr,
            d_model:         a.d_model,
            num_heads:       a.num_heads,
            num_layers:      a.num_layers,
            d_ff:            a.d_ff,
            dropout:         a.dropout,
            vocab_size:      a.vocab_size,
            positive_counts: a.positive_counts,
        }
    }
}

impl From<DataArgs> for TrainConfig {
    fn from(a: DataArgs) -> Self {
        TrainConfig {
            data_dir:       a.data_dir,
            text_file:      a.text_file,
            labels_file:    a.labels_file,
            checkpoint_dir: a.checkpoint_dir,
            tokenizer:      a.tokenizer,
            k_folds:        a.k_folds,
            seed:           a.seed,
            ..TrainConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Directory containing the images and the annotation file
    #[arg(long, default_value = "data/test")]
    pub data_dir: String,

    /// Tab-separated annotation file inside data_dir
    #[arg(long, default_value = "Test.csv")]
    pub text_file: String,

    /// Directory where `train` saved its checkpoints
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Which fold's weights to use
    #[arg(long, default_value_t = 0)]
    pub fold: usize,

    /// Where to write the predictions JSON
    /// (default: <checkpoint_dir>/fold_<k>/test_predictions.json)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

fn parse_positive_counts(s: &str) -> Result<BTreeMap<LabelField, usize>, String> {
    let counts: Vec<usize> = s
        .split(',')
        .map(|v| v.trim().parse::<usize>().map_err(|e| format!("'{v}': {e}")))
        .collect::<Result<_, _>>()?;
    if counts.len() != LabelField::COUNT {
        return Err(format!(
            "expected {} counts ({}), got {}",
            LabelField::COUNT,
            LabelField::ALL.map(|f| f.as_str()).join(","),
            counts.len()
        ));
    }
    Ok(LabelField::ALL.into_iter().zip(counts).collect())
}
