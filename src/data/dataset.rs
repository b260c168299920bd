use burn::data::dataset::Dataset;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::data::splitter::KFold;
use crate::domain::error::{DatasetError, DatasetResult};
use crate::domain::label::LabelField;
use crate::domain::record::{LabelSet, Record};
use crate::infra::tokenizer_store::pad_id;

/// Model input half of a sample.
#[derive(Debug, Clone)]
pub struct SampleInput {
    /// data_dir joined with the record's file name
    pub image:          String,
    pub text:           String,
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
}

/// One tokenised sample: model input plus ground-truth labels.
#[derive(Debug, Clone)]
pub struct MamiSample {
    pub input:  SampleInput,
    pub output: LabelSet,
    /// Record key, kept for error messages
    pub key:    String,
}

/// Named, immutable view over a list of records.
#[derive(Clone)]
pub struct MisogynyDataset {
    name:            String,
    data_dir:        PathBuf,
    records:         Arc<Vec<Record>>,
    tokenizer:       Arc<Tokenizer>,
    text_max_length: usize,
    folds:           KFold,
}

impl MisogynyDataset {
    pub fn new(
        name:            impl Into<String>,
        data_dir:        impl Into<PathBuf>,
        records:         Vec<Record>,
        tokenizer:       Arc<Tokenizer>,
        text_max_length: usize,
        folds:           KFold,
    ) -> Self {
        Self {
            name: name.into(),
            data_dir: data_dir.into(),
            records: Arc::new(records),
            tokenizer,
            text_max_length,
            folds,
        }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn tokenizer(&self) -> &Arc<Tokenizer> { &self.tokenizer }

    pub fn k_folds(&self) -> usize { self.folds.n_splits() }

    pub fn sample_count(&self) -> usize { self.records.len() }

    /// Tokenise the record at `index`.
    pub fn sample(&self, index: usize) -> DatasetResult<MamiSample> {
        let record = self.records.get(index).ok_or_else(|| DatasetError::IndexOutOfRange {
            dataset: self.name.clone(),
            index,
            len: self.records.len(),
        })?;
        let text = record.require_text()?;

        let (input_ids, attention_mask) = self.encode(text).map_err(|e| {
            DatasetError::Tokenization {
                key:    record.file_name.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(MamiSample {
            input: SampleInput {
                image: self.data_dir.join(&record.file_name).to_string_lossy().into_owned(),
                text: text.to_string(),
                input_ids,
                attention_mask,
            },
            output: record.labels,
            key:    record.file_name.clone(),
        })
    }

    /// Encode `text` to exactly `text_max_length` ids plus mask.
    fn encode(&self, text: &str) -> tokenizers::Result<(Vec<u32>, Vec<u32>)> {
        let enc = self.tokenizer.encode(text, true)?;

        // Padding added by the tokenizer itself is not text
        let (ids, special): (Vec<u32>, Vec<u32>) = enc
            .get_ids()
            .iter()
            .zip(enc.get_special_tokens_mask())
            .zip(enc.get_attention_mask())
            .filter(|&(_, &attend)| attend == 1)
            .map(|((&id, &special), _)| (id, special))
            .unzip();

        Ok(fit_to_length(&ids, &special, self.text_max_length, pad_id(&self.tokenizer)))
    }

    /// Train/eval views for fold `k`, named `train_{k}` / `eval_{k}`.
    pub fn derive_fold(&self, k: usize) -> DatasetResult<(MisogynyDataset, MisogynyDataset)> {
        let k_folds = self.folds.n_splits();
        if k >= k_folds {
            return Err(DatasetError::InvalidConfiguration(format!(
                "fold {k} requested but dataset '{}' has {k_folds} folds",
                self.name
            )));
        }

        let mut splits = self.folds.split(self.records.len())?;
        let split = splits.swap_remove(k);

        let pick = |indices: &[usize]| -> Vec<Record> {
            indices.iter().map(|&i| self.records[i].clone()).collect()
        };

        let train = self.derived(format!("train_{k}"), pick(&split.train));
        let test  = self.derived(format!("eval_{k}"), pick(&split.test));

        tracing::debug!(
            "Fold {}: {} train / {} eval records",
            k, train.sample_count(), test.sample_count()
        );
        Ok((train, test))
    }

    fn derived(&self, name: String, records: Vec<Record>) -> MisogynyDataset {
        MisogynyDataset::new(
            name,
            self.data_dir.clone(),
            records,
            Arc::clone(&self.tokenizer),
            self.text_max_length,
            self.folds,
        )
    }

    pub fn class_distribution(&self) -> BTreeMap<LabelField, usize> {
        class_distribution(&self.records)
    }

    pub fn summarize(&self) -> String {
        summarize_records(&self.name, &self.data_dir, &self.records)
    }
}

/// Number of records labelled "1" per field. All five fields
/// are present; absent labels are not counted.
pub fn class_distribution(records: &[Record]) -> BTreeMap<LabelField, usize> {
    let mut counts: BTreeMap<LabelField, usize> =
        LabelField::ALL.iter().map(|&f| (f, 0)).collect();
    for record in records {
        for field in LabelField::ALL {
            if record.labels.is_positive(field) {
                *counts.entry(field).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Human-readable dataset summary with a class distribution table.
/// Needs no tokenizer.
pub fn summarize_records(name: &str, data_dir: &Path, records: &[Record]) -> String {
    let rule = "-".repeat(45);
    format!(
        "\n{rule}\nDataset: {}\nData Dir: {}\n{short}\nClass wise distribution\n{short}\n{}\n{rule}\n",
        name,
        data_dir.display(),
        distribution_table(&class_distribution(records)),
        short = "-".repeat(24),
    )
}

impl Dataset<MamiSample> for MisogynyDataset {
    fn get(&self, index: usize) -> Option<MamiSample> {
        match self.sample(index) {
            Ok(sample) => {
                tracing::trace!("Dataset '{}' [{}] {}: {:?}", self.name, index, sample.key, sample.input.text);
                Some(sample)
            }
            Err(e) => {
                tracing::error!("Dataset '{}': {}", self.name, e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Truncate or pad `ids` to exactly `max_len`.
///
/// When truncating, a trailing special token (e.g. `[SEP]`) is
/// kept in the last position. Returns (ids, attention_mask).
pub fn fit_to_length(ids: &[u32], special_mask: &[u32], max_len: usize, pad: u32) -> (Vec<u32>, Vec<u32>) {
    let mut out: Vec<u32> = ids.iter().copied().take(max_len).collect();

    if ids.len() > max_len && max_len > 0 && special_mask.last() == Some(&1) {
        out[max_len - 1] = ids[ids.len() - 1];
    }

    let real = out.len();
    let mut mask = vec![1u32; real];
    out.resize(max_len, pad);
    mask.resize(max_len, 0);
    (out, mask)
}

fn distribution_table(counts: &BTreeMap<LabelField, usize>) -> String {
    let width = LabelField::ALL
        .iter()
        .map(|f| f.as_str().len())
        .max()
        .unwrap_or(5);

    let mut table = String::new();
    let _ = writeln!(table, "{:<width$}  {:>5}", "Class", "Count");
    let _ = writeln!(table, "{}  {}", "-".repeat(width), "-".repeat(5));
    for (field, count) in counts {
        let _ = writeln!(table, "{:<width$}  {:>5}", field.as_str(), count);
    }
    table.trim_end().to_string()
}
