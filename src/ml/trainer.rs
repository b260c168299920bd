// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train / eval / predict over Burn data loaders, plus the
// k-fold driver that runs them for every selected fold.
//
//   - train() runs on the autodiff backend and updates weights
//   - eval() and predict() run on model.valid(), i.e. the inner
//     backend with dropout disabled; their loaders must be built
//     with MamiBatcher<B::InnerBackend>
//   - a fresh LabelAccumulator is created per call
//
// Burn's DataLoader silently stops at the first item whose
// Dataset::get returned None, so every call compares the number
// of samples it saw with loader.num_items() and fails on a
// shortfall.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{anyhow, bail, Context, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{activation::sigmoid, backend::AutodiffBackend},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{MamiBatch, MamiBatcher},
    dataset::MisogynyDataset,
};
use crate::domain::label::LabelField;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    aggregator::LabelAccumulator,
    loss::WeightedBceLoss,
    model::{MamiClassifier, MultiLabelClassifier},
    report::{summarize_scores, Reports},
};

/// image path → per-class probability
pub type Predictions = BTreeMap<String, BTreeMap<LabelField, f32>>;

pub type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub struct MamiTrainer<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + MultiLabelClassifier<B>,
    M::InnerModule: MultiLabelClassifier<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    model:    M,
    optim:    O,
    loss:     WeightedBceLoss,
    lr:       f64,
    _backend: PhantomData<B>,
}

impl<B, M, O> MamiTrainer<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + MultiLabelClassifier<B>,
    M::InnerModule: MultiLabelClassifier<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    pub fn new(model: M, optim: O, loss: WeightedBceLoss, lr: f64) -> Self {
        Self { model, optim, loss, lr, _backend: PhantomData }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// One pass over `loader` with weight updates.
    /// Returns the sum of the batch losses.
    pub fn train(&mut self, loader: &dyn DataLoader<MamiBatch<B>>, name: &str) -> Result<f64> {
        let progress        = progress_bar(loader.num_items(), name);
        let mut accumulator = LabelAccumulator::new();
        let mut total       = 0.0f64;
        let mut seen        = 0usize;

        for (index, batch) in loader.iter().enumerate() {
            let size = batch.len();
            let batch_loss = self
                .train_batch(batch, &mut accumulator)
                .with_context(|| format!("{name}: batch {index}"))?;

            total += batch_loss;
            seen  += size;
            progress.inc(size as u64);
            progress.set_message(format!("{batch_loss:.4}"));
        }
        progress.finish_and_clear();

        check_sample_count(name, seen, loader.num_items())?;
        tracing::debug!(
            "{name}: {seen} samples, loss sum {total:.4}, score {:.4}",
            summarize_scores(&accumulator.reports()?)
        );
        Ok(total)
    }

    fn train_batch(&mut self, batch: MamiBatch<B>, accumulator: &mut LabelAccumulator) -> Result<f64> {
        let rows   = batch.len();
        let device = batch.input_ids.device();
        let logits = self.model.forward_logits(batch.input_ids, batch.attention_mask);

        // Targets come back from the accumulator; labels are checked there
        let probs   = sigmoid_scores(logits.clone().detach())?;
        let targets = accumulator.calculate(&probs, &batch.outputs, &batch.keys)?;
        let targets = Tensor::<B, 2>::from_data(
            TensorData::new(targets, [rows, LabelField::COUNT]),
            &device,
        );

        let loss = self.loss.forward(logits, targets);
        let value: f64 = loss.clone().into_scalar().elem::<f64>();

        // Backward pass + Adam update
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(self.lr, self.model.clone(), grads);

        Ok(value)
    }

    /// Metrics and predictions on the validation model.
    pub fn eval(
        &self,
        loader: &dyn DataLoader<MamiBatch<B::InnerBackend>>,
        name:   &str,
    ) -> Result<(Reports, Predictions)> {
        let model           = self.model.valid();
        let progress        = progress_bar(loader.num_items(), name);
        let mut accumulator = LabelAccumulator::new();
        let mut predictions = Predictions::new();
        let mut seen        = 0usize;

        for (index, batch) in loader.iter().enumerate() {
            let size   = batch.len();
            let probs  = probabilities(&model, &batch)
                .with_context(|| format!("{name}: batch {index}"))?;
            accumulator
                .calculate(&probs, &batch.outputs, &batch.keys)
                .with_context(|| format!("{name}: batch {index}"))?;
            record_predictions(&mut predictions, &batch.images, &probs);

            seen += size;
            progress.inc(size as u64);
        }
        progress.finish_and_clear();

        check_sample_count(name, seen, loader.num_items())?;
        Ok((accumulator.reports()?, predictions))
    }

    /// Predictions only; labels are not read.
    pub fn predict(
        &self,
        loader: &dyn DataLoader<MamiBatch<B::InnerBackend>>,
        name:   &str,
    ) -> Result<Predictions> {
        predict_with(&self.model.valid(), loader, name)
    }
}

/// Forward-only pass of any classifier over `loader`.
pub fn predict_with<B, M>(model: &M, loader: &dyn DataLoader<MamiBatch<B>>, name: &str) -> Result<Predictions>
where
    B: Backend,
    M: MultiLabelClassifier<B>,
{
    let progress        = progress_bar(loader.num_items(), name);
    let mut predictions = Predictions::new();
    let mut seen        = 0usize;

    for (index, batch) in loader.iter().enumerate() {
        let probs = probabilities(model, &batch)
            .with_context(|| format!("{name}: batch {index}"))?;
        record_predictions(&mut predictions, &batch.images, &probs);

        seen += batch.len();
        progress.inc(batch.len() as u64);
    }
    progress.finish_and_clear();

    check_sample_count(name, seen, loader.num_items())?;
    Ok(predictions)
}

fn probabilities<B: Backend, M: MultiLabelClassifier<B>>(model: &M, batch: &MamiBatch<B>) -> Result<Vec<f32>> {
    sigmoid_scores(model.forward_logits(batch.input_ids.clone(), batch.attention_mask.clone()))
}

/// Sigmoid scores, row-major [batch × 5]
fn sigmoid_scores<B: Backend>(logits: Tensor<B, 2>) -> Result<Vec<f32>> {
    sigmoid(logits)
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("cannot read model output: {e:?}"))
}

fn record_predictions(predictions: &mut Predictions, images: &[String], probs: &[f32]) {
    for (image, scores) in images.iter().zip(probs.chunks(LabelField::COUNT)) {
        let per_class = LabelField::ALL.iter().zip(scores).map(|(f, p)| (*f, *p)).collect();
        predictions.insert(image.clone(), per_class);
    }
}

fn check_sample_count(name: &str, seen: usize, expected: usize) -> Result<()> {
    if seen < expected {
        bail!("{name}: only {seen} of {expected} samples could be loaded (see earlier errors)");
    }
    Ok(())
}

fn progress_bar(items: usize, name: &str) -> ProgressBar {
    let progress = ProgressBar::new(items as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{prefix:>10} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        progress.set_style(style);
    }
    progress.set_prefix(name.to_string());
    progress
}

// ─── K-fold driver ────────────────────────────────────────────────────────────

/// Best epoch of one fold
#[derive(Debug, Clone, PartialEq)]
pub struct FoldOutcome {
    pub fold:       usize,
    pub best_epoch: usize,
    pub best_score: f64,
}

pub fn run_training(cfg: &TrainConfig, dataset: &MisogynyDataset, ckpt: &CheckpointManager) -> Result<Vec<FoldOutcome>> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    cross_validate::<MyBackend>(cfg, dataset, ckpt, device)
}

/// Train and evaluate every selected fold, keeping the best
/// epoch's checkpoint, reports and predictions per fold.
pub fn cross_validate<B: AutodiffBackend>(
    cfg:     &TrainConfig,
    dataset: &MisogynyDataset,
    ckpt:    &CheckpointManager,
    device:  B::Device,
) -> Result<Vec<FoldOutcome>> {
    let folds: Vec<usize> = match cfg.fold {
        Some(k) => vec![k],
        None    => (0..dataset.k_folds()).collect(),
    };
    let metrics = MetricsLogger::new(ckpt.dir())?;

    let mut outcomes = Vec::with_capacity(folds.len());
    for fold in folds {
        let outcome = train_fold::<B>(cfg, dataset, ckpt, &metrics, fold, device.clone())
            .with_context(|| format!("fold {fold}"))?;
        tracing::info!(
            "Fold {} done: best score {:.4} at epoch {}",
            outcome.fold, outcome.best_score, outcome.best_epoch
        );
        outcomes.push(outcome);
    }

    if !outcomes.is_empty() {
        let mean = outcomes.iter().map(|o| o.best_score).sum::<f64>() / outcomes.len() as f64;
        tracing::info!("Mean best score over {} fold(s): {:.4}", outcomes.len(), mean);
    }
    Ok(outcomes)
}

fn train_fold<B: AutodiffBackend>(
    cfg:     &TrainConfig,
    dataset: &MisogynyDataset,
    ckpt:    &CheckpointManager,
    metrics: &MetricsLogger,
    fold:    usize,
    device:  B::Device,
) -> Result<FoldOutcome> {
    let (train_view, eval_view) = dataset.derive_fold(fold)?;
    tracing::info!(
        "Fold {}: {} train / {} eval samples",
        fold, train_view.sample_count(), eval_view.sample_count()
    );

    let counts = cfg
        .positive_counts
        .clone()
        .unwrap_or_else(|| train_view.class_distribution());
    let loss = WeightedBceLoss::from_positive_counts(&counts)?;
    tracing::debug!("Positive weights: {:?}", loss.pos_weight());

    let model: MamiClassifier<B> = cfg.model_config().init(&device);
    let optim = AdamConfig::new()
        .with_epsilon(1e-8)
        .init::<B, MamiClassifier<B>>();
    let mut trainer = MamiTrainer::new(model, optim, loss, cfg.lr);

    let train_name = train_view.name().to_string();
    let eval_name  = eval_view.name().to_string();

    let train_loader = DataLoaderBuilder::new(MamiBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_view);
    let eval_loader = DataLoaderBuilder::new(MamiBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(eval_view);

    let mut best: Option<FoldOutcome> = None;
    for epoch in 1..=cfg.epochs {
        let train_loss            = trainer.train(train_loader.as_ref(), &train_name)?;
        let (reports, predictions) = trainer.eval(eval_loader.as_ref(), &eval_name)?;
        let score                 = summarize_scores(&reports);

        tracing::info!(
            "Fold {} epoch {:>3}/{} | train_loss={:.4} | score={:.4}",
            fold, epoch, cfg.epochs, train_loss, score
        );
        let row = EpochMetrics::from_reports(fold, epoch, train_loss, score, &reports);
        metrics.log(&row)?;

        if best.as_ref().map_or(true, |b| row.is_improvement(b.best_score)) {
            for report in reports.values() {
                tracing::debug!("\n{report}");
            }
            ckpt.save_model(&trainer.model().valid(), fold, epoch)?;
            ckpt.save_json(fold, "reports.json", &reports)?;
            ckpt.save_json(fold, "predictions.json", &predictions)?;
            best = Some(FoldOutcome { fold, best_epoch: epoch, best_score: score });
        }
    }

    best.ok_or_else(|| anyhow!("no epochs were run (epochs = {})", cfg.epochs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::splitter::{KFold, DEFAULT_SEED};
    use crate::domain::record::Record;
    use crate::infra::tokenizer_store::{embedding_size, TokenizerStore};
    use burn::backend::{Autodiff, NdArray};
    use std::sync::Arc;
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    const MAX_LEN: usize = 12;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::new(format!("{i}.jpg"))
                    .with_text(format!("post {i} about women in the kitchen"))
                    .with_label(LabelField::Misogynous, i % 2 == 0)
                    .with_label(LabelField::Shaming, i % 3 == 0)
                    .with_label(LabelField::Stereotype, i % 2 == 0)
                    .with_label(LabelField::Objectification, i % 4 == 0)
                    .with_label(LabelField::Violence, i == 0 || i == 5)
            })
            .collect()
    }

    fn dataset(dir: &TempDir, n: usize) -> MisogynyDataset {
        let recs  = records(n);
        let texts: Vec<String> = recs.iter().filter_map(|r| r.text.clone()).collect();
        let tok   = TokenizerStore::new(dir.path()).load_or_build(&texts, 100).unwrap();
        MisogynyDataset::new("training", "images", recs, Arc::new(tok), MAX_LEN, KFold::new(2, DEFAULT_SEED))
    }

    fn config(dir: &TempDir, data: &MisogynyDataset) -> TrainConfig {
        TrainConfig {
            checkpoint_dir:  dir.path().join("ckpt").to_string_lossy().into_owned(),
            text_max_length: MAX_LEN,
            k_folds:         2,
            fold:            None,
            batch_size:      3,
            epochs:          2,
            lr:              1e-3,
            d_model:         16,
            num_heads:       2,
            num_layers:      1,
            d_ff:            32,
            dropout:         0.0,
            vocab_size:      embedding_size(data.tokenizer()),
            // fold views are too small to guarantee a positive per class
            positive_counts: Some(data.class_distribution()),
            ..TrainConfig::default()
        }
    }

    fn trainer(cfg: &TrainConfig, data: &MisogynyDataset) -> MamiTrainer<
        TestBackend,
        MamiClassifier<TestBackend>,
        impl Optimizer<MamiClassifier<TestBackend>, TestBackend>,
    > {
        let device = Default::default();
        let model: MamiClassifier<TestBackend> = cfg.model_config().init(&device);
        let loss  = WeightedBceLoss::from_positive_counts(&data.class_distribution()).unwrap();
        let optim = AdamConfig::new().init::<TestBackend, MamiClassifier<TestBackend>>();
        MamiTrainer::new(model, optim, loss, cfg.lr)
    }

    #[test]
    fn test_train_eval_predict_over_loaders() {
        let dir  = TempDir::new().unwrap();
        let data = dataset(&dir, 8);
        let cfg  = config(&dir, &data);
        let mut trainer = trainer(&cfg, &data);

        let device = Default::default();
        let train_loader = DataLoaderBuilder::new(MamiBatcher::<TestBackend>::new(device))
            .batch_size(3)
            .build(data.clone());
        let eval_loader = DataLoaderBuilder::new(MamiBatcher::<NdArray>::new(device))
            .batch_size(3)
            .build(data.clone());

        let loss = trainer.train(train_loader.as_ref(), "training").unwrap();
        assert!(loss.is_finite());
        assert!(loss > 0.0);

        let (reports, predictions) = trainer.eval(eval_loader.as_ref(), "training").unwrap();
        assert_eq!(reports.len(), LabelField::COUNT);
        assert_eq!(reports[&LabelField::Misogynous].weighted_avg.support, 8);
        assert_eq!(predictions.len(), 8);
        for scores in predictions.values() {
            assert_eq!(scores.len(), LabelField::COUNT);
            assert!(scores.values().all(|p| (0.0..=1.0).contains(p)));
        }

        let predicted = trainer.predict(eval_loader.as_ref(), "training").unwrap();
        assert_eq!(predicted.keys().collect::<Vec<_>>(), predictions.keys().collect::<Vec<_>>());
        assert!(predicted.contains_key("images/0.jpg"));
    }

    #[test]
    fn test_missing_label_names_dataset_and_batch() {
        let dir      = TempDir::new().unwrap();
        let complete = dataset(&dir, 4);
        let mut recs = records(4);
        recs.push(Record::new("unlabeled.jpg").with_text("post about women"));
        let data = MisogynyDataset::new(
            "eval_0", "images", recs, complete.tokenizer().clone(), MAX_LEN, KFold::new(2, DEFAULT_SEED),
        );
        let cfg     = config(&dir, &complete);
        let trainer = trainer(&cfg, &complete);

        let loader = DataLoaderBuilder::new(MamiBatcher::<NdArray>::new(Default::default()))
            .batch_size(4)
            .build(data);
        let err = trainer.eval(loader.as_ref(), "eval_0").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("eval_0: batch 1"), "{msg}");
        assert!(msg.contains("unlabeled.jpg"), "{msg}");
    }

    #[test]
    fn test_train_fails_on_missing_label() {
        let dir      = TempDir::new().unwrap();
        let complete = dataset(&dir, 4);
        let mut recs = records(4);
        recs.push(Record::new("unlabeled.jpg").with_text("post about women"));
        let data = MisogynyDataset::new(
            "train_0", "images", recs, complete.tokenizer().clone(), MAX_LEN, KFold::new(2, DEFAULT_SEED),
        );
        let cfg         = config(&dir, &complete);
        let mut trainer = trainer(&cfg, &complete);

        let loader = DataLoaderBuilder::new(MamiBatcher::<TestBackend>::new(Default::default()))
            .batch_size(4)
            .build(data);
        let err = trainer.train(loader.as_ref(), "train_0").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("train_0: batch 1"), "{msg}");
        assert!(msg.contains("unlabeled.jpg"), "{msg}");
        assert!(msg.contains("'misogynous'"), "{msg}");
    }

    #[test]
    fn test_unloadable_sample_fails_every_pass() {
        let dir      = TempDir::new().unwrap();
        let complete = dataset(&dir, 4);
        let mut recs = records(4);
        // labelled, but nothing to tokenise
        let mut blank = Record::new("blank.jpg");
        for field in LabelField::ALL {
            blank.labels.set(field, false);
        }
        recs.push(blank);
        let data = MisogynyDataset::new(
            "train_1", "images", recs, complete.tokenizer().clone(), MAX_LEN, KFold::new(2, DEFAULT_SEED),
        );
        let cfg         = config(&dir, &complete);
        let mut trainer = trainer(&cfg, &complete);

        let train_loader = DataLoaderBuilder::new(MamiBatcher::<TestBackend>::new(Default::default()))
            .batch_size(2)
            .build(data.clone());
        let err = trainer.train(train_loader.as_ref(), "train_1").unwrap_err().to_string();
        assert!(err.contains("train_1: only 4 of 5 samples"), "{err}");

        let eval_loader = DataLoaderBuilder::new(MamiBatcher::<NdArray>::new(Default::default()))
            .batch_size(2)
            .build(data);
        let err = trainer.eval(eval_loader.as_ref(), "eval_1").unwrap_err().to_string();
        assert!(err.contains("only 4 of 5"), "{err}");
        let err = trainer.predict(eval_loader.as_ref(), "test").unwrap_err().to_string();
        assert!(err.contains("only 4 of 5"), "{err}");
    }

    #[test]
    fn test_predict_does_not_need_labels() {
        let dir      = TempDir::new().unwrap();
        let complete = dataset(&dir, 4);
        let recs     = vec![Record::new("new.jpg").with_text("another post")];
        let data     = MisogynyDataset::new(
            "test", "images", recs, complete.tokenizer().clone(), MAX_LEN, KFold::new(2, DEFAULT_SEED),
        );
        let cfg     = config(&dir, &complete);
        let trainer = trainer(&cfg, &complete);

        let loader = DataLoaderBuilder::new(MamiBatcher::<NdArray>::new(Default::default()))
            .batch_size(2)
            .build(data);
        let predictions = trainer.predict(loader.as_ref(), "test").unwrap();
        assert_eq!(predictions.len(), 1);
    }

    #[test]
    fn test_cross_validate_writes_fold_artifacts() {
        let dir  = TempDir::new().unwrap();
        let data = dataset(&dir, 8);
        let cfg  = config(&dir, &data);
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();

        let outcomes = cross_validate::<TestBackend>(&cfg, &data, &ckpt, Default::default()).unwrap();
        assert_eq!(outcomes.len(), 2);

        for outcome in &outcomes {
            assert!((1..=2).contains(&outcome.best_epoch));
            assert!((0.0..=1.0).contains(&outcome.best_score));
            let fold_dir = ckpt.fold_dir(outcome.fold);
            assert!(fold_dir.join("reports.json").exists());
            assert!(fold_dir.join("predictions.json").exists());
            assert_eq!(ckpt.best_epoch(outcome.fold).unwrap(), outcome.best_epoch);
        }

        let csv = std::fs::read_to_string(ckpt.dir().join("metrics.csv")).unwrap();
        // header + 2 folds × 2 epochs
        assert_eq!(csv.lines().count(), 5);
    }

    #[test]
    fn test_single_fold_selection() {
        let dir  = TempDir::new().unwrap();
        let data = dataset(&dir, 8);
        let cfg  = TrainConfig { fold: Some(1), epochs: 1, ..config(&dir, &data) };
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();

        let outcomes = cross_validate::<TestBackend>(&cfg, &data, &ckpt, Default::default()).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].fold, 1);
        assert!(!ckpt.fold_dir(0).join("reports.json").exists());
    }
}
