// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw annotation files to tensor batches:
//
//   training.csv / labels.txt
//       │
//       ▼
//   AnnotationLoader  → parses and merges records by file_name
//       │
//       ▼
//   MisogynyDataset   → named record view; tokenises on access
//       │                (derive_fold uses KFold for train/eval)
//       ▼
//   MamiBatcher       → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Parses tab-delimited annotation files into merged records
pub mod loader;

/// Deterministic k-fold partitioning of record indices
pub mod splitter;

/// Dataset view: tokenisation, fold derivation, class counts
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
