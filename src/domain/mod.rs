// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits describing a MAMI post
// and the five labels attached to it.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §6 (Enums), §10 (Traits)

// The five label fields in their fixed output order
pub mod label;

// One annotated meme: file name, transcription, labels
pub mod record;

// Typed errors raised while building and reading datasets
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
