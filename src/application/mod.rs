// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: each use case wires the data,
// ml and infra layers together for one CLI command. No tensor
// code and no printing here.

/// K-fold training run
pub mod train_use_case;

/// Scoring an unlabeled file with a trained fold
pub mod predict_use_case;

/// Dataset summary
pub mod summarize_use_case;
