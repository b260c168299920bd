// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that touches tensors after batching:
//
//   model.rs      — MultiLabelClassifier trait and the default
//                   transformer text encoder (masked mean pooling,
//                   five-logit head)
//
//   loss.rs       — class-weighted multi-label BCE on logits
//
//   aggregator.rs — per-class actual / predicted accumulation
//
//   report.rs     — binary classification reports and the
//                   headline sub-type score
//
//   trainer.rs    — train / eval / predict loops and the k-fold
//                   driver
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

/// Classifier trait and transformer encoder
pub mod model;

/// Weighted BCE-with-logits loss
pub mod loss;

/// Label accumulator for one train/eval call
pub mod aggregator;

/// Classification reports and summary score
pub mod report;

/// Training loop and cross-validation
pub mod trainer;
