// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence used by the training and
// prediction workflows:
//
//   checkpoint.rs      — model weights per fold (CompactRecorder),
//                        TrainConfig and fold artefacts as JSON
//
//   tokenizer_store.rs — loads a tokenizer.json, or builds a
//                        word-level vocabulary from the training
//                        texts, and keeps it next to the checkpoints
//
//   metrics.rs         — per-(fold, epoch) CSV log
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
