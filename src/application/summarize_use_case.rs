// ============================================================
// Layer 2 — SummarizeUseCase
// ============================================================
// Loads the annotation files of a config and returns the
// dataset summary (name, data dir, class distribution).
// Read-only: nothing is written to the checkpoint directory.

use anyhow::Result;
use std::path::Path;

use crate::application::train_use_case::TrainConfig;
use crate::data::{dataset::summarize_records, loader::AnnotationLoader};
use crate::domain::traits::RecordSource;

pub struct SummarizeUseCase {
    config: TrainConfig,
}

impl SummarizeUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<String> {
        let cfg = &self.config;
        let records = AnnotationLoader::new(cfg.text_path())
            .with_labels(cfg.labels_path())
            .load_all()?;
        Ok(summarize_records("training", Path::new(&cfg.data_dir), &records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_summary_counts_positive_labels() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("training.csv"),
            "file_name\tmisogynous\tshaming\tstereotype\tobjectification\tviolence\tText Transcription\n\
             1.jpg\t1\t0\t1\t0\t0\tfirst\n\
             2.jpg\t1\t1\t0\t0\t0\tsecond\n\
             3.jpg\t0\t0\t0\t0\t0\tthird\n",
        )
        .unwrap();

        let ckpt = dir.path().join("ckpt");
        let cfg = TrainConfig {
            data_dir:       dir.path().to_string_lossy().into_owned(),
            checkpoint_dir: ckpt.to_string_lossy().into_owned(),
            ..TrainConfig::default()
        };
        let summary = SummarizeUseCase::new(cfg).execute().unwrap();

        // A later `train` must not pick up a vocabulary built here
        assert!(!ckpt.join("tokenizer.json").exists());

        assert!(summary.contains("Dataset: training"));
        assert!(summary.lines().any(|l| l.contains("misogynous") && l.contains('2')));
        assert!(summary.lines().any(|l| l.contains("violence") && l.contains('0')));
    }
}
