// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full k-fold training run:
//
//   Step 1: Load and merge annotation files   (Layer 4 - data)
//   Step 2: Build / load tokenizer            (Layer 6 - infra)
//   Step 3: Build the dataset view            (Layer 4 - data)
//   Step 4: Save config                       (Layer 6 - infra)
//   Step 5: Cross-validate                    (Layer 5 - ml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::data::{
    dataset::MisogynyDataset,
    loader::AnnotationLoader,
    splitter::{KFold, DEFAULT_SEED},
};
use crate::domain::{label::LabelField, record::Record, traits::RecordSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    tokenizer_store::{embedding_size, TokenizerStore},
};
use crate::ml::{
    model::MamiClassifierConfig,
    trainer::{run_training, FoldOutcome},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Saved as train_config.json so `predict` can rebuild the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Directory holding the images and annotation files
    pub data_dir:        String,
    /// Primary annotation file, relative to data_dir
    pub text_file:       String,
    /// Optional secondary labels file, relative to data_dir
    pub labels_file:     Option<String>,
    pub checkpoint_dir:  String,
    /// tokenizer.json to import; a word-level vocabulary is built
    /// from the training texts when absent
    pub tokenizer:       Option<String>,
    pub text_max_length: usize,
    pub k_folds:         usize,
    /// Train a single fold instead of all of them
    pub fold:            Option<usize>,
    pub seed:            u64,
    pub batch_size:      usize,
    pub epochs:          usize,
    pub lr:              f64,
    pub d_model:         usize,
    pub num_heads:       usize,
    pub num_layers:      usize,
    pub d_ff:            usize,
    pub dropout:         f64,
    /// Cap when building a vocabulary; replaced by the tokenizer's
    /// embedding size before the config is saved
    pub vocab_size:      usize,
    /// Positive samples per class for the loss weights; measured
    /// on each fold's training view when absent
    pub positive_counts: Option<BTreeMap<LabelField, usize>>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:        "data/TRAINING".to_string(),
            text_file:       "training.csv".to_string(),
            labels_file:     None,
            checkpoint_dir:  "checkpoints".to_string(),
            tokenizer:       None,
            text_max_length: 64,
            k_folds:         5,
            fold:            None,
            seed:            DEFAULT_SEED,
            batch_size:      16,
            epochs:          10,
            lr:              2e-4,
            d_model:         256,
            num_heads:       8,
            num_layers:      4,
            d_ff:            1024,
            dropout:         0.1,
            vocab_size:      30000,
            positive_counts: None,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> MamiClassifierConfig {
        MamiClassifierConfig::new(
            self.vocab_size, self.text_max_length, self.d_model,
            self.num_heads, self.num_layers, self.d_ff, self.dropout,
        )
    }

    pub fn text_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.text_file)
    }

    pub fn labels_path(&self) -> Option<PathBuf> {
        self.labels_file.as_ref().map(|f| Path::new(&self.data_dir).join(f))
    }

    /// Reject settings that would only fail deep inside a fold.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.k_folds >= 2, "k_folds must be at least 2, got {}", self.k_folds);
        if let Some(k) = self.fold {
            anyhow::ensure!(k < self.k_folds, "fold {k} is out of range for {} folds", self.k_folds);
        }
        anyhow::ensure!(self.batch_size > 0, "batch_size must be positive");
        anyhow::ensure!(self.text_max_length > 0, "text_max_length must be positive");
        anyhow::ensure!(
            self.d_model % self.num_heads == 0,
            "d_model ({}) must be divisible by num_heads ({})",
            self.d_model, self.num_heads
        );
        Ok(())
    }
}

/// Load the annotation files of `cfg` into a dataset view named `name`.
pub fn load_dataset(name: &str, cfg: &TrainConfig, tokenizer: Arc<Tokenizer>) -> Result<MisogynyDataset> {
    let records = AnnotationLoader::new(cfg.text_path())
        .with_labels(cfg.labels_path())
        .load_all()?;
    tracing::info!("Loaded {} records from '{}'", records.len(), cfg.text_path().display());

    Ok(MisogynyDataset::new(
        name,
        &cfg.data_dir,
        records,
        tokenizer,
        cfg.text_max_length,
        KFold::new(cfg.k_folds, cfg.seed),
    ))
}

/// Tokenizer for a run: imported from `cfg.tokenizer` when given,
/// otherwise the one stored in the checkpoint directory, built from
/// `texts` if there is none yet.
pub fn prepare_tokenizer(cfg: &TrainConfig, texts: &[String]) -> Result<Tokenizer> {
    let store = TokenizerStore::new(&cfg.checkpoint_dir);
    match &cfg.tokenizer {
        Some(path) => store.import(Path::new(path)),
        None       => store.load_or_build(texts, cfg.vocab_size),
    }
}

/// Texts a new vocabulary is built from. A single-fold run only sees
/// that fold's training view. A full cross-validation shares one
/// vocabulary across folds, so every record contributes; the vocabulary
/// carries no labels.
pub fn vocabulary_texts(cfg: &TrainConfig, records: &[Record]) -> Result<Vec<String>> {
    let indices: Vec<usize> = match cfg.fold {
        Some(k) => {
            let mut splits = KFold::new(cfg.k_folds, cfg.seed).split(records.len())?;
            anyhow::ensure!(k < splits.len(), "fold {k} is out of range for {} folds", splits.len());
            splits.swap_remove(k).train
        }
        None => (0..records.len()).collect(),
    };
    Ok(indices.iter().filter_map(|&i| records[i].text.clone()).collect())
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<FoldOutcome>> {
        let mut cfg = self.config.clone();
        cfg.validate()?;

        // ── Step 1: Load annotation files ─────────────────────────────────────
        let records = AnnotationLoader::new(cfg.text_path())
            .with_labels(cfg.labels_path())
            .load_all()?;

        // ── Step 2: Tokenizer ─────────────────────────────────────────────────
        let ckpt      = CheckpointManager::new(&cfg.checkpoint_dir)?;
        let tokenizer = prepare_tokenizer(&cfg, &vocabulary_texts(&cfg, &records)?)?;

        // ── Step 3: Dataset view ──────────────────────────────────────────────
        let dataset = MisogynyDataset::new(
            "training",
            &cfg.data_dir,
            records,
            Arc::new(tokenizer),
            cfg.text_max_length,
            KFold::new(cfg.k_folds, cfg.seed),
        );
        cfg.vocab_size = embedding_size(dataset.tokenizer());
        tracing::info!("Tokenizer ready: embedding size {}", cfg.vocab_size);
        tracing::info!("{}", dataset.summarize());

        // ── Step 4: Save config for predict ───────────────────────────────────
        ckpt.save_config(&cfg)?;

        // ── Step 5: Cross-validation (Layer 5) ────────────────────────────────
        run_training(&cfg, &dataset, &ckpt).context("training failed")
    }
}
