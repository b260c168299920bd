// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Scores an unlabeled annotation file with a trained fold:
//
//   1. Read train_config.json and the saved tokenizer
//   2. Rebuild the model architecture and load the fold's weights
//   3. Run the forward-only loop and write predictions JSON

use anyhow::{Context, Result};
use burn::{data::dataloader::DataLoaderBuilder, prelude::*};
use std::path::PathBuf;
use std::sync::Arc;

use crate::application::train_use_case::{load_dataset, TrainConfig};
use crate::data::{batcher::MamiBatcher, dataset::MisogynyDataset};
use crate::infra::{
    checkpoint::{write_json, CheckpointManager},
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    model::MamiClassifier,
    trainer::{predict_with, Predictions},
};

type InferBackend = burn::backend::Wgpu;

pub struct PredictUseCase {
    ckpt:   CheckpointManager,
    config: TrainConfig,
}

impl PredictUseCase {
    pub fn new(checkpoint_dir: &str) -> Result<Self> {
        let ckpt   = CheckpointManager::new(checkpoint_dir)?;
        let config = ckpt.load_config()?;
        Ok(Self { ckpt, config })
    }

    /// Predict every record of `data_dir/text_file` with `fold`'s
    /// weights. Returns the predictions and the JSON file they were
    /// written to (`output`, or `fold_{k}/test_predictions.json`).
    pub fn execute(
        &self,
        data_dir:  &str,
        text_file: &str,
        fold:      usize,
        output:    Option<PathBuf>,
    ) -> Result<(Predictions, PathBuf)> {
        let cfg = TrainConfig {
            data_dir:    data_dir.to_string(),
            text_file:   text_file.to_string(),
            labels_file: None,
            ..self.config.clone()
        };
        let tokenizer = TokenizerStore::new(&self.config.checkpoint_dir)
            .load()
            .context("predict needs the tokenizer saved by 'train'")?;
        let dataset = load_dataset("test", &cfg, Arc::new(tokenizer))?;

        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        let predictions = predict_fold::<InferBackend>(&self.config, &self.ckpt, dataset, fold, device)?;

        let path = output.unwrap_or_else(|| self.ckpt.fold_dir(fold).join("test_predictions.json"));
        write_json(&path, &predictions)?;
        tracing::info!("Wrote {} predictions to '{}'", predictions.len(), path.display());
        Ok((predictions, path))
    }
}

/// Rebuild the model described by `cfg`, load `fold`'s weights
/// and predict every sample of `dataset`.
pub fn predict_fold<B: Backend>(
    cfg:     &TrainConfig,
    ckpt:    &CheckpointManager,
    dataset: MisogynyDataset,
    fold:    usize,
    device:  B::Device,
) -> Result<Predictions> {
    let model: MamiClassifier<B> = cfg.model_config().init(&device);
    let model = ckpt.load_model(model, fold, &device)?;

    let name   = dataset.name().to_string();
    let loader = DataLoaderBuilder::new(MamiBatcher::<B>::new(device))
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(dataset);

    predict_with(&model, loader.as_ref(), &name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::splitter::{KFold, DEFAULT_SEED};
    use crate::domain::{label::LabelField, record::Record};
    use crate::infra::tokenizer_store::embedding_size;
    use burn::backend::NdArray;
    use tempfile::TempDir;

    #[test]
    fn test_predict_fold_from_saved_checkpoint() {
        let dir   = TempDir::new().unwrap();
        let ckpt  = CheckpointManager::new(dir.path()).unwrap();
        let texts = vec!["women belong nowhere".to_string(), "a cat meme".to_string()];
        let tok   = TokenizerStore::new(dir.path()).load_or_build(&texts, 50).unwrap();

        let cfg = TrainConfig {
            checkpoint_dir:  dir.path().to_string_lossy().into_owned(),
            text_max_length: 6,
            batch_size:      1,
            d_model:         8,
            num_heads:       2,
            num_layers:      1,
            d_ff:            16,
            vocab_size:      embedding_size(&tok),
            ..TrainConfig::default()
        };
        let device = Default::default();
        let model: MamiClassifier<NdArray> = cfg.model_config().init(&device);
        ckpt.save_model(&model, 0, 1).unwrap();

        let records = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Record::new(format!("{i}.jpg")).with_text(t.clone()))
            .collect();
        let dataset = MisogynyDataset::new(
            "test", "img", records, Arc::new(tok), cfg.text_max_length, KFold::new(2, DEFAULT_SEED),
        );

        let predictions = predict_fold::<NdArray>(&cfg, &ckpt, dataset, 0, device).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions["img/1.jpg"].len(), LabelField::COUNT);
    }

    #[test]
    fn test_missing_fold_checkpoint_is_error() {
        let dir   = TempDir::new().unwrap();
        let ckpt  = CheckpointManager::new(dir.path()).unwrap();
        let texts = vec!["text".to_string()];
        let tok   = TokenizerStore::new(dir.path()).load_or_build(&texts, 50).unwrap();
        let cfg   = TrainConfig {
            d_model: 8, num_heads: 2, num_layers: 1, d_ff: 16,
            vocab_size: embedding_size(&tok),
            ..TrainConfig::default()
        };
        let dataset = MisogynyDataset::new(
            "test", "img", vec![Record::new("a.jpg").with_text("text")], Arc::new(tok), 4, KFold::new(2, DEFAULT_SEED),
        );

        assert!(predict_fold::<NdArray>(&cfg, &ckpt, dataset, 3, Default::default()).is_err());
    }
}
