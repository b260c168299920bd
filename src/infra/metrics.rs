// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per (fold, epoch) so learning curves can
// be plotted after a run.
//
// Output file: checkpoints/metrics.csv
//
//   fold,epoch,train_loss,score,misogynous_f1,shaming_f1,...
//   0,1,3.124500,0.210000,0.612000,0.180000,...
//   0,2,2.890100,0.254000,0.655000,0.231000,...
//
// train_loss is the summed batch loss of the epoch, score is the
// headline sub-type F1 and the *_f1 columns are the positive
// class F1 of each label field on the eval view.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::label::LabelField;
use crate::ml::report::Reports;

const FILE_NAME: &str = "metrics.csv";

/// One row of metrics for a single fold and epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub fold:       usize,
    /// Starts at 1
    pub epoch:      usize,
    pub train_loss: f64,
    pub score:      f64,
    /// Positive-class F1 per label field, in LabelField order
    pub f1:         [f64; LabelField::COUNT],
}

impl EpochMetrics {
    pub fn from_reports(fold: usize, epoch: usize, train_loss: f64, score: f64, reports: &Reports) -> Self {
        let mut f1 = [0.0; LabelField::COUNT];
        for (field, report) in reports {
            f1[field.index()] = report.positive.f1_score;
        }
        Self { fold, epoch, train_loss, score, f1 }
    }

    /// Returns true if this epoch beats the previous best score
    pub fn is_improvement(&self, best_score: f64) -> bool {
        self.score > best_score
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so
    /// later runs append to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join(FILE_NAME);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{}", header())?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let f1: Vec<String> = m.f1.iter().map(|v| format!("{v:.6}")).collect();
        writeln!(
            f,
            "{},{},{:.6},{:.6},{}",
            m.fold,
            m.epoch,
            m.train_loss,
            m.score,
            f1.join(","),
        )?;

        tracing::debug!(
            "Logged fold {} epoch {} metrics: train_loss={:.4}, score={:.4}",
            m.fold, m.epoch, m.train_loss, m.score,
        );
        Ok(())
    }
}

fn header() -> String {
    let mut columns = vec!["fold".to_string(), "epoch".into(), "train_loss".into(), "score".into()];
    columns.extend(LabelField::ALL.iter().map(|f| format!("{f}_f1")));
    columns.join(",")
}
