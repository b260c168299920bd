// ============================================================
// Layer 5 — Weighted Multi-Label BCE Loss
// ============================================================
// Binary cross-entropy on raw logits with a per-class weight on
// the positive term, computed in the numerically stable form:
//
//   l = (1 - t)·x + (1 + (w - 1)·t) · (log(1 + e^-|x|) + max(-x, 0))
//
// where x is the logit, t the 0/1 target and w the class's
// positive weight. The loss is the mean over every element.
//
// Positive weights come from the number of positive training
// samples per class:  w[c] = 0.5 / positive_count[c]
// and stay fixed for the whole run.

use burn::prelude::*;
use burn::tensor::activation::relu;
use std::collections::BTreeMap;

use crate::domain::error::{DatasetError, DatasetResult};
use crate::domain::label::LabelField;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedBceLoss {
    pos_weight: Vec<f32>,
}

impl WeightedBceLoss {
    pub fn new(pos_weight: Vec<f32>) -> Self {
        Self { pos_weight }
    }

    /// Weights `0.5 / count` for every label field.
    ///
    /// # Errors
    /// `InvalidConfiguration` when a field is missing or has no
    /// positive samples.
    pub fn from_positive_counts(counts: &BTreeMap<LabelField, usize>) -> DatasetResult<Self> {
        let pos_weight = LabelField::ALL
            .iter()
            .map(|field| match counts.get(field) {
                Some(&n) if n > 0 => Ok(0.5 / n as f32),
                _ => Err(DatasetError::InvalidConfiguration(format!(
                    "no positive samples for '{field}', cannot weight its loss"
                ))),
            })
            .collect::<DatasetResult<Vec<f32>>>()?;
        Ok(Self::new(pos_weight))
    }

    pub fn pos_weight(&self) -> &[f32] {
        &self.pos_weight
    }

    /// logits, targets: [batch, classes] → scalar loss [1]
    pub fn forward<B: Backend>(&self, logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        let [batch_size, num_classes] = logits.dims();
        let device = logits.device();

        let pos_weight = Tensor::<B, 1>::from_data(
            TensorData::new(self.pos_weight.clone(), [num_classes]),
            &device,
        )
        .reshape([1, num_classes])
        .repeat_dim(0, batch_size);

        // 1 + (w - 1)·t
        let log_weight = pos_weight.sub_scalar(1.0).mul(targets.clone()).add_scalar(1.0);

        // log(1 + e^-|x|) + max(-x, 0)
        let softplus = logits.clone().abs().neg().exp().log1p() + relu(logits.clone().neg());

        let loss = targets.neg().add_scalar(1.0).mul(logits) + log_weight.mul(softplus);
        loss.mean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn scalar(t: Tensor<B, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    #[test]
    fn test_unit_weight_matches_plain_bce() {
        let device  = Default::default();
        let loss    = WeightedBceLoss::new(vec![1.0]);
        let logits  = Tensor::<B, 2>::from_data(TensorData::new(vec![0.0f32], [1, 1]), &device);
        let targets = Tensor::<B, 2>::from_data(TensorData::new(vec![1.0f32], [1, 1]), &device);

        let value = scalar(loss.forward(logits, targets));
        assert!((value - std::f64::consts::LN_2).abs() < 1e-5, "loss={value}");
    }

    #[test]
    fn test_positive_weight_scales_positive_term_only() {
        let device  = Default::default();
        let loss    = WeightedBceLoss::new(vec![2.0]);
        let logits  = Tensor::<B, 2>::from_data(TensorData::new(vec![0.0f32, 0.0], [2, 1]), &device);
        let targets = Tensor::<B, 2>::from_data(TensorData::new(vec![1.0f32, 0.0], [2, 1]), &device);

        // positive row: 2·ln2, negative row: ln2
        let value    = scalar(loss.forward(logits, targets));
        let expected = 1.5 * std::f64::consts::LN_2;
        assert!((value - expected).abs() < 1e-5, "loss={value}");
    }

    #[test]
    fn test_large_logits_stay_finite() {
        let device  = Default::default();
        let loss    = WeightedBceLoss::new(vec![1.0, 1.0]);
        let logits  = Tensor::<B, 2>::from_data(TensorData::new(vec![80.0f32, -80.0], [1, 2]), &device);
        let targets = Tensor::<B, 2>::from_data(TensorData::new(vec![1.0f32, 0.0], [1, 2]), &device);

        let value = scalar(loss.forward(logits, targets));
        assert!(value.is_finite());
        assert!(value < 1e-6);
    }

    #[test]
    fn test_weights_from_positive_counts() {
        let counts: BTreeMap<LabelField, usize> =
            LabelField::ALL.iter().zip([5000, 1000, 2000, 500, 250]).map(|(f, n)| (*f, n)).collect();
        let loss = WeightedBceLoss::from_positive_counts(&counts).unwrap();
        assert_eq!(loss.pos_weight(), &[0.5 / 5000.0, 0.5 / 1000.0, 0.5 / 2000.0, 0.5 / 500.0, 0.5 / 250.0]);
    }

    #[test]
    fn test_zero_count_is_invalid() {
        let counts: BTreeMap<LabelField, usize> = LabelField::ALL.iter().map(|f| (*f, 0)).collect();
        assert!(matches!(
            WeightedBceLoss::from_positive_counts(&counts),
            Err(DatasetError::InvalidConfiguration(_))
        ));
    }
}
