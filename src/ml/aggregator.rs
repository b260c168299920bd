// ============================================================
// Layer 5 — Label Accumulator
// ============================================================
// Collects, per label field, the ground-truth and predicted
// decisions of every sample seen during one train/eval call,
// then turns them into classification reports.
//
// A fresh accumulator is created at the start of each call and
// dropped (or turned into reports) at its end; nothing is kept
// between epochs.
//
// calculate() also returns the batch's ground truth as a flat
// row-major [batch × 5] vector of 0.0 / 1.0 in LabelField
// order, ready to be reshaped into the loss target tensor.

use std::collections::BTreeMap;

use crate::domain::error::{DatasetError, DatasetResult};
use crate::domain::label::LabelField;
use crate::domain::record::LabelSet;
use crate::ml::report::{ClassificationReport, Reports};

/// Probability at or above which a label is predicted positive
pub const DECISION_THRESHOLD: f32 = 0.5;

#[derive(Debug, Default, Clone)]
pub struct LabelAccumulator {
    actual:    [Vec<bool>; LabelField::COUNT],
    predicted: [Vec<bool>; LabelField::COUNT],
}

impl LabelAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch.
    ///
    /// * `probabilities` - post-sigmoid scores, row-major [batch × 5]
    /// * `outputs`       - ground-truth labels, one per row
    /// * `keys`          - record keys, one per row (error context)
    ///
    /// Nothing is recorded if any row is missing a label.
    pub fn calculate(
        &mut self,
        probabilities: &[f32],
        outputs:       &[LabelSet],
        keys:          &[String],
    ) -> DatasetResult<Vec<f32>> {
        if probabilities.len() != outputs.len() * LabelField::COUNT {
            return Err(DatasetError::InvalidConfiguration(format!(
                "model produced {} scores for {} samples ({} classes)",
                probabilities.len(),
                outputs.len(),
                LabelField::COUNT
            )));
        }

        let targets = target_vector(outputs, keys)?;

        for (row, scores) in probabilities.chunks(LabelField::COUNT).enumerate() {
            for field in LabelField::ALL {
                let i = field.index();
                self.actual[i].push(targets[row * LabelField::COUNT + i] > 0.5);
                self.predicted[i].push(scores[i] >= DECISION_THRESHOLD);
            }
        }

        Ok(targets)
    }

    pub fn actual(&self, field: LabelField) -> &[bool] {
        &self.actual[field.index()]
    }

    pub fn predicted(&self, field: LabelField) -> &[bool] {
        &self.predicted[field.index()]
    }

    /// One binary classification report per label field
    pub fn reports(&self) -> DatasetResult<Reports> {
        LabelField::ALL
            .iter()
            .map(|&field| {
                let report = ClassificationReport::for_field(field, self.actual(field), self.predicted(field))?;
                Ok((field, report))
            })
            .collect::<DatasetResult<BTreeMap<_, _>>>()
    }
}

/// Flatten ground truth into [batch × 5] 0.0/1.0 values.
///
/// # Errors
/// `MissingField` naming the record key and field for the
/// first absent label.
fn target_vector(outputs: &[LabelSet], keys: &[String]) -> DatasetResult<Vec<f32>> {
    let mut targets = Vec::with_capacity(outputs.len() * LabelField::COUNT);
    for (row, labels) in outputs.iter().enumerate() {
        let key = keys.get(row).map(String::as_str).unwrap_or("<unknown>");
        for field in LabelField::ALL {
            let value = labels.require(field, key)?;
            targets.push(if value { 1.0 } else { 0.0 });
        }
    }
    Ok(targets)
}
