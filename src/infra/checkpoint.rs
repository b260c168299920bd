// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder,
// plus the JSON artefacts of every fold.
//
// File layout:
//   checkpoints/
//     train_config.json      ← run configuration (model architecture)
//     tokenizer.json         ← vocabulary used for training
//     metrics.csv            ← one row per (fold, epoch)
//     fold_0/
//       model.mpk.gz         ← weights of the best epoch
//       best_epoch.json      ← which epoch that was
//       reports.json         ← per-class classification reports
//       predictions.json     ← image path → per-class probability
//     fold_1/
//     ...
//
// The config is needed to rebuild the exact architecture before
// the weights can be loaded into it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;

const CONFIG_FILE: &str = "train_config.json";
const MODEL_FILE:  &str = "model";
const EPOCH_FILE:  &str = "best_epoch.json";

/// Manages saving and loading of model checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn fold_dir(&self, fold: usize) -> PathBuf {
        self.dir.join(format!("fold_{fold}"))
    }

    fn ensure_fold_dir(&self, fold: usize) -> Result<PathBuf> {
        let dir = self.fold_dir(fold);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        Ok(dir)
    }

    /// Save the weights of `fold`'s best model, replacing any
    /// earlier one, and record which epoch produced it.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, fold: usize, epoch: usize) -> Result<()> {
        let dir  = self.ensure_fold_dir(fold)?;
        let path = dir.join(MODEL_FILE);

        Recorder::<B>::record(&CompactRecorder::new(), model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(dir.join(EPOCH_FILE), serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {EPOCH_FILE} for fold {fold}"))?;

        tracing::debug!("Saved checkpoint: fold {} epoch {}", fold, epoch);
        Ok(())
    }

    /// Load `fold`'s saved weights into `model`, which must have
    /// the architecture the checkpoint was trained with.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, fold: usize, device: &B::Device) -> Result<M> {
        let path = self.fold_dir(fold).join(MODEL_FILE);
        tracing::info!("Loading checkpoint of fold {} (epoch {})", fold, self.best_epoch(fold)?);

        let record: M::Record = Recorder::<B>::load(&CompactRecorder::new(), path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained this fold?", path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Epoch whose weights are stored for `fold`
    pub fn best_epoch(&self, fold: usize) -> Result<usize> {
        let path = self.fold_dir(fold).join(EPOCH_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Have you run 'train' first?", path.display()))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }

    /// Pretty-printed JSON file inside `fold`'s directory
    pub fn save_json<T: Serialize + ?Sized>(&self, fold: usize, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.ensure_fold_dir(fold)?.join(file_name);
        write_json(&path, value)?;
        Ok(path)
    }

    /// Must be called before training starts.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        write_json(&path, cfg)?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'predict'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid config in '{}'", path.display()))
    }
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))
}
