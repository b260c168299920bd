// ============================================================
// Layer 5 — Classification Report
// ============================================================
// Binary classification report for one label field, laid out
// like the familiar per-class report:
//
//                   precision  recall  f1-score  support
//   !misogynous        0.8000  0.6667    0.7273        6
//   misogynous         0.6000  0.7500    0.6667        4
//   accuracy                             0.7000       10
//   macro avg          0.7000  0.7083    0.6970       10
//   weighted avg       0.7200  0.7000    0.7030       10
//
// Undefined ratios (0 / 0) are reported as 0.0.
//
// The JSON form uses the same keys ("!k", "k", "accuracy",
// "macro avg", "weighted avg") so reports written by earlier
// tooling can be compared directly.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::error::{DatasetError, DatasetResult};
use crate::domain::label::LabelField;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall:    f64,
    #[serde(rename = "f1-score")]
    pub f1_score:  f64,
    pub support:   usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub negative_name: String,
    pub positive_name: String,
    pub negative:      ClassMetrics,
    pub positive:      ClassMetrics,
    pub accuracy:      f64,
    pub macro_avg:     ClassMetrics,
    pub weighted_avg:  ClassMetrics,
}

pub type Reports = BTreeMap<LabelField, ClassificationReport>;

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

impl ClassificationReport {
    /// Report for `field` with target names `!field` / `field`.
    ///
    /// # Errors
    /// `InvalidConfiguration` if the two sequences differ in length.
    pub fn for_field(field: LabelField, actual: &[bool], predicted: &[bool]) -> DatasetResult<Self> {
        if actual.len() != predicted.len() {
            return Err(DatasetError::InvalidConfiguration(format!(
                "{field}: {} actual labels but {} predictions",
                actual.len(),
                predicted.len()
            )));
        }

        let (mut tp, mut fp, mut tn, mut fn_count) = (0usize, 0usize, 0usize, 0usize);
        for (&a, &p) in actual.iter().zip(predicted.iter()) {
            match (a, p) {
                (true, true)   => tp += 1,
                (false, true)  => fp += 1,
                (false, false) => tn += 1,
                (true, false)  => fn_count += 1,
            }
        }

        let total = actual.len();

        let pos_p = ratio(tp, tp + fp);
        let pos_r = ratio(tp, tp + fn_count);
        let positive = ClassMetrics {
            precision: pos_p,
            recall:    pos_r,
            f1_score:  f1(pos_p, pos_r),
            support:   tp + fn_count,
        };

        let neg_p = ratio(tn, tn + fn_count);
        let neg_r = ratio(tn, tn + fp);
        let negative = ClassMetrics {
            precision: neg_p,
            recall:    neg_r,
            f1_score:  f1(neg_p, neg_r),
            support:   tn + fp,
        };

        let macro_avg = ClassMetrics {
            precision: (negative.precision + positive.precision) / 2.0,
            recall:    (negative.recall + positive.recall) / 2.0,
            f1_score:  (negative.f1_score + positive.f1_score) / 2.0,
            support:   total,
        };

        let weighted = |neg: f64, pos: f64| -> f64 {
            if total == 0 {
                0.0
            } else {
                (neg * negative.support as f64 + pos * positive.support as f64) / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weighted(negative.precision, positive.precision),
            recall:    weighted(negative.recall, positive.recall),
            f1_score:  weighted(negative.f1_score, positive.f1_score),
            support:   total,
        };

        Ok(Self {
            negative_name: format!("!{field}"),
            positive_name: field.to_string(),
            negative,
            positive,
            accuracy: ratio(tp + tn, total),
            macro_avg,
            weighted_avg,
        })
    }
}

impl Serialize for ClassificationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry(&self.negative_name, &self.negative)?;
        map.serialize_entry(&self.positive_name, &self.positive)?;
        map.serialize_entry("accuracy", &self.accuracy)?;
        map.serialize_entry("macro avg", &self.macro_avg)?;
        map.serialize_entry("weighted avg", &self.weighted_avg)?;
        map.end()
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = self.negative_name.len().max("weighted avg".len());
        writeln!(f, "{:>w$}  {:>9}  {:>9}  {:>9}  {:>9}", "", "precision", "recall", "f1-score", "support")?;
        let row = |f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics| {
            writeln!(
                f,
                "{:>w$}  {:>9.4}  {:>9.4}  {:>9.4}  {:>9}",
                name, m.precision, m.recall, m.f1_score, m.support
            )
        };
        row(f, &self.negative_name, &self.negative)?;
        row(f, &self.positive_name, &self.positive)?;
        writeln!(f, "{:>w$}  {:>9}  {:>9}  {:>9.4}  {:>9}", "accuracy", "", "", self.accuracy, self.macro_avg.support)?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}

/// Headline score: mean positive-class F1 over the four
/// misogyny sub-types (misogynous itself is excluded).
pub fn summarize_scores(reports: &Reports) -> f64 {
    let subtypes = LabelField::subtypes();
    let sum: f64 = subtypes
        .iter()
        .map(|field| reports.get(field).map(|r| r.positive.f1_score).unwrap_or(0.0))
        .sum();
    sum / subtypes.len() as f64
}
