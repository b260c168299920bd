// ============================================================
// Layer 3 — Record Domain Type
// ============================================================
// One annotated MAMI post: the meme's image file name (which is
// also the record's unique key), its text transcription, and
// the five binary labels.
//
// Text and labels may come from different files, so both are
// optional until the files have been merged. A label that was
// never supplied stays `None`; it is NOT the same as "0".

use crate::domain::error::{DatasetError, DatasetResult};
use crate::domain::label::LabelField;

/// Column holding the meme transcription in the annotation files
pub const TEXT_COLUMN: &str = "Text Transcription";

/// Column holding the record key
pub const KEY_COLUMN: &str = "file_name";

/// Per-field label values. `None` means the field was absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelSet {
    values: [Option<bool>; LabelField::COUNT],
}

impl LabelSet {
    pub fn get(&self, field: LabelField) -> Option<bool> {
        self.values[field.index()]
    }

    pub fn set(&mut self, field: LabelField, value: bool) {
        self.values[field.index()] = Some(value);
    }

    /// True only when the field is present and equal to "1"
    pub fn is_positive(&self, field: LabelField) -> bool {
        self.get(field) == Some(true)
    }

    /// Present value of `field`, or a MissingField error naming `key`
    pub fn require(&self, field: LabelField, key: &str) -> DatasetResult<bool> {
        self.get(field).ok_or_else(|| DatasetError::MissingField {
            key:   key.to_string(),
            field: field.as_str().to_string(),
        })
    }
}

/// Parse an annotation label value. Only "0" and "1" are valid.
pub fn parse_label(value: &str) -> Option<bool> {
    match value {
        "1" => Some(true),
        "0" => Some(false),
        _   => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub file_name: String,
    pub text:      Option<String>,
    pub labels:    LabelSet,
}

impl Record {
    /// An empty record for `file_name`; columns are merged in later
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            text:      None,
            labels:    LabelSet::default(),
        }
    }

    /// The transcription, or a MissingField error
    pub fn require_text(&self) -> DatasetResult<&str> {
        self.text.as_deref().ok_or_else(|| DatasetError::MissingField {
            key:   self.file_name.clone(),
            field: TEXT_COLUMN.to_string(),
        })
    }
}

#[cfg(test)]
impl Record {
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_label(mut self, field: LabelField, value: bool) -> Self {
        self.labels.set(field, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_label_is_not_negative() {
        let labels = LabelSet::default();
        assert_eq!(labels.get(LabelField::Shaming), None);
        assert!(!labels.is_positive(LabelField::Shaming));
    }

    #[test]
    fn test_require_reports_missing_field() {
        let labels = LabelSet::default();
        let err = labels.require(LabelField::Violence, "1.jpg").unwrap_err();
        match err {
            DatasetError::MissingField { key, field } => {
                assert_eq!(key, "1.jpg");
                assert_eq!(field, "violence");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_label_values_and_absent_fields() {
        let record = Record::new("a.jpg")
            .with_label(LabelField::Misogynous, true)
            .with_label(LabelField::Shaming, false);
        assert_eq!(record.labels.get(LabelField::Misogynous), Some(true));
        assert_eq!(record.labels.get(LabelField::Shaming), Some(false));
        assert_eq!(record.labels.get(LabelField::Violence), None);
    }

    #[test]
    fn test_parse_label_rejects_other_values() {
        assert_eq!(parse_label("1"), Some(true));
        assert_eq!(parse_label("0"), Some(false));
        assert_eq!(parse_label("yes"), None);
        assert_eq!(parse_label(""), None);
    }

    #[test]
    fn test_require_text() {
        let record = Record::new("b.jpg");
        assert!(record.require_text().is_err());
        let record = record.with_text("hello");
        assert_eq!(record.require_text().unwrap(), "hello");
    }
}
