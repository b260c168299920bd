// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits instead
// of concrete loaders, so a different annotation source can be
// swapped in without touching the training workflow.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::record::Record;

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Any component that can produce merged MAMI records.
///
/// Implementations:
///   - AnnotationLoader → tab-delimited text + labels files
pub trait RecordSource {
    /// Load every record in first-seen order.
    fn load_all(&self) -> Result<Vec<Record>>;
}
