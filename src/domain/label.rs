// ============================================================
// Layer 3 — Label Fields
// ============================================================
// MAMI annotates every meme with five binary labels. The first
// one (`misogynous`) is the aggregate label, the other four are
// the misogyny sub-types.
//
// The order of `LabelField::ALL` is the order of the model's
// output logits and of every flat target vector, so it must
// never change.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelField {
    Misogynous,
    Shaming,
    Stereotype,
    Objectification,
    Violence,
}

impl LabelField {
    /// All label fields in output order
    pub const ALL: [LabelField; 5] = [
        LabelField::Misogynous,
        LabelField::Shaming,
        LabelField::Stereotype,
        LabelField::Objectification,
        LabelField::Violence,
    ];

    /// Number of output classes
    pub const COUNT: usize = Self::ALL.len();

    /// Column name used in the annotation files
    pub fn as_str(self) -> &'static str {
        match self {
            LabelField::Misogynous      => "misogynous",
            LabelField::Shaming         => "shaming",
            LabelField::Stereotype      => "stereotype",
            LabelField::Objectification => "objectification",
            LabelField::Violence        => "violence",
        }
    }

    /// Position of this field in `ALL`
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up a field by its column name
    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }

    /// The sub-type labels, i.e. everything except `misogynous`
    pub fn subtypes() -> &'static [LabelField] {
        &Self::ALL[1..]
    }
}

impl fmt::Display for LabelField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_output_order() {
        for (i, field) in LabelField::ALL.iter().enumerate() {
            assert_eq!(field.index(), i);
        }
    }

    #[test]
    fn test_from_column_round_trips_names() {
        assert_eq!(LabelField::from_column("violence"), Some(LabelField::Violence));
        assert_eq!(LabelField::from_column("Text Transcription"), None);
    }

    #[test]
    fn test_subtypes_exclude_misogynous() {
        let subtypes = LabelField::subtypes();
        assert_eq!(subtypes.len(), 4);
        assert!(!subtypes.contains(&LabelField::Misogynous));
    }

    #[test]
    fn test_serializes_as_column_name() {
        let json = serde_json::to_string(&LabelField::Objectification).unwrap();
        assert_eq!(json, "\"objectification\"");
    }
}
