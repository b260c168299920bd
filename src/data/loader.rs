// ============================================================
// Layer 4 — Annotation Loader
// ============================================================
// Reads the MAMI annotation files and merges them into Records.
//
// File formats (tab-delimited, UTF-8, optional byte order mark):
//
//   training.csv — has a header row, e.g.
//     file_name  misogynous  shaming  stereotype  objectification  violence  Text Transcription
//
//   *.txt        — no header row; the columns are implicitly
//     file_name  misogynous  shaming  stereotype  objectification  violence
//
// Whether the first line is a header is decided from the file
// name: anything containing ".csv" has one. The same rule is
// used for the optional labels file.
//
// Merging: every line is keyed by its `file_name` value. A
// second file adds (or overwrites) columns of records created
// by the first, so a transcription-only test file can be joined
// with a separate gold-labels file. Records come out in the
// order their key was first seen.
//
// Reference: Rust Book §8 (Strings, HashMaps)
//            Rust Book §9 (Error Handling)

use anyhow::Result;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::domain::error::{DatasetError, DatasetResult};
use crate::domain::label::LabelField;
use crate::domain::record::{parse_label, Record, KEY_COLUMN, TEXT_COLUMN};
use crate::domain::traits::RecordSource;

/// Columns assumed for files without a header row
const IMPLICIT_HEADER: [&str; 6] = [
    KEY_COLUMN,
    "misogynous",
    "shaming",
    "stereotype",
    "objectification",
    "violence",
];

/// What a header column maps to in a Record
#[derive(Debug, Clone, PartialEq)]
enum Column {
    Key,
    Text,
    Label(LabelField),
    Other(String),
}

impl Column {
    fn from_name(name: &str) -> Self {
        if name == KEY_COLUMN {
            Column::Key
        } else if name == TEXT_COLUMN {
            Column::Text
        } else if let Some(field) = LabelField::from_column(name) {
            Column::Label(field)
        } else {
            Column::Other(name.to_string())
        }
    }
}

/// Loads records from a primary annotation file and an optional
/// labels file. Implements the RecordSource trait from Layer 3.
pub struct AnnotationLoader {
    text_file:   PathBuf,
    labels_file: Option<PathBuf>,
}

impl AnnotationLoader {
    pub fn new(text_file: impl Into<PathBuf>) -> Self {
        Self { text_file: text_file.into(), labels_file: None }
    }

    /// Merge a second file (usually gold labels) into the records
    pub fn with_labels(mut self, labels_file: Option<impl Into<PathBuf>>) -> Self {
        self.labels_file = labels_file.map(Into::into);
        self
    }
}

impl RecordSource for AnnotationLoader {
    fn load_all(&self) -> Result<Vec<Record>> {
        let mut store = RecordStore::default();

        let n = store.merge_file(&self.text_file)?;
        tracing::debug!("Merged {} lines from '{}' ({} records)", n, self.text_file.display(), store.len());

        if let Some(labels_file) = &self.labels_file {
            let n = store.merge_file(labels_file)?;
            tracing::debug!("Merged {} lines from '{}' ({} records)", n, labels_file.display(), store.len());
        }

        let records = store.into_records();
        tracing::info!("Loaded {} records", records.len());
        Ok(records)
    }
}

/// Insertion-ordered map from `file_name` to Record.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    index:   HashMap<String, usize>,
}

impl RecordStore {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Read `path` from disk and merge it. Returns the number of
    /// data lines merged.
    pub fn merge_file(&mut self, path: &Path) -> DatasetResult<usize> {
        let content = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge_str(path, has_header_row(path), &content)
    }

    /// Merge already-read file `content`. `file` is only used for
    /// error messages.
    pub fn merge_str(&mut self, file: &Path, has_header: bool, content: &str) -> DatasetResult<usize> {
        // utf-8-sig: drop the byte order mark if present
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let mut columns: Option<Vec<Column>> = if has_header {
            None
        } else {
            Some(IMPLICIT_HEADER.iter().map(|c| Column::from_name(c)).collect())
        };
        let mut key_index = 0usize;
        let mut merged    = 0usize;

        for (i, line) in content.lines().enumerate() {
            let line_no = i + 1;
            if line.trim().is_empty() {
                continue;
            }

            let values: Vec<&str> = line.split('\t').map(str::trim).collect();

            let cols = match &columns {
                Some(cols) => cols,
                None => {
                    let header: Vec<Column> = values.iter().map(|v| Column::from_name(v)).collect();
                    key_index = header
                        .iter()
                        .position(|c| *c == Column::Key)
                        .ok_or_else(|| DatasetError::MissingColumn {
                            file:   file.to_path_buf(),
                            column: KEY_COLUMN.to_string(),
                        })?;
                    for col in &header {
                        if let Column::Other(name) = col {
                            tracing::debug!("Ignoring column '{}' in '{}'", name, file.display());
                        }
                    }
                    columns = Some(header);
                    continue;
                }
            };

            if values.len() != cols.len() {
                return Err(DatasetError::MalformedRecord {
                    file:   file.to_path_buf(),
                    line:   line_no,
                    reason: format!("expected {} columns, found {}", cols.len(), values.len()),
                });
            }

            let key = values[key_index];
            if key.is_empty() {
                return Err(DatasetError::MalformedRecord {
                    file:   file.to_path_buf(),
                    line:   line_no,
                    reason: format!("empty '{KEY_COLUMN}'"),
                });
            }

            let record = self.entry(key);
            for (col, value) in cols.iter().zip(values.iter()) {
                match col {
                    Column::Key | Column::Other(_) => {}
                    Column::Text => record.text = Some((*value).to_string()),
                    Column::Label(field) => {
                        let parsed = parse_label(value).ok_or_else(|| DatasetError::MalformedRecord {
                            file:   file.to_path_buf(),
                            line:   line_no,
                            reason: format!("invalid value '{value}' for '{field}' (expected 0 or 1)"),
                        })?;
                        record.labels.set(*field, parsed);
                    }
                }
            }
            merged += 1;
        }

        Ok(merged)
    }

    /// The record for `key`, created at the end if not yet present
    fn entry(&mut self, key: &str) -> &mut Record {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.records.push(Record::new(key));
                let idx = self.records.len() - 1;
                self.index.insert(key.to_string(), idx);
                idx
            }
        };
        &mut self.records[idx]
    }
}

/// Files whose name contains ".csv" start with a header row
fn has_header_row(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains(".csv"))
        .unwrap_or(false)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_merges_text_and_labels_files() {
        let dir    = TempDir::new().unwrap();
        let text   = write(&dir, "Test.csv", "file_name\tText Transcription\nA\tx\n");
        let labels = write(&dir, "labels.csv", "file_name\tmisogynous\nA\t1\n");

        let records = AnnotationLoader::new(text)
            .with_labels(Some(labels))
            .load_all()
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "A");
        assert_eq!(records[0].text.as_deref(), Some("x"));
        assert_eq!(records[0].labels.get(LabelField::Misogynous), Some(true));
        // never supplied → absent, not "0"
        assert_eq!(records[0].labels.get(LabelField::Shaming), None);
    }

    #[test]
    fn test_implicit_header_for_txt_files() {
        let dir  = TempDir::new().unwrap();
        let path = write(&dir, "test_labels.txt", "1.jpg\t1\t0\t1\t0\t0\n2.jpg\t0\t0\t0\t0\t0\n");

        let records = AnnotationLoader::new(path).load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert!(LabelField::ALL.iter().all(|&f| records[0].labels.get(f).is_some()));
        assert!(records[0].labels.is_positive(LabelField::Stereotype));
        assert_eq!(records[1].labels.get(LabelField::Misogynous), Some(false));
        assert!(records[0].text.is_none());
    }

    #[test]
    fn test_labels_only_key_creates_new_record() {
        let dir    = TempDir::new().unwrap();
        let text   = write(&dir, "Test.csv", "file_name\tText Transcription\nA\tx\n");
        let labels = write(&dir, "truth.txt", "B\t1\t1\t0\t0\t0\n");

        let records = AnnotationLoader::new(text)
            .with_labels(Some(labels))
            .load_all()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].file_name, "B");
        assert!(records[1].text.is_none());
    }

    #[test]
    fn test_preserves_first_seen_order() {
        let mut store = RecordStore::default();
        let content   = "file_name\tText Transcription\nc\t3\na\t1\nb\t2\na\tagain\n";
        store.merge_str(Path::new("x.csv"), true, content).unwrap();

        let records = store.into_records();
        let keys: Vec<_> = records.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(keys, ["c", "a", "b"]);
        // later lines overwrite earlier values
        assert_eq!(records[1].text.as_deref(), Some("again"));
    }

    #[test]
    fn test_strips_byte_order_mark() {
        let mut store = RecordStore::default();
        let content   = "\u{feff}file_name\tText Transcription\nA\thi\n";
        store.merge_str(Path::new("x.csv"), true, content).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_column_count_mismatch_is_malformed() {
        let mut store = RecordStore::default();
        let content   = "file_name\tText Transcription\nA\thi\nB\thi\textra\n";
        let err = store.merge_str(Path::new("train.csv"), true, content).unwrap_err();
        match err {
            DatasetError::MalformedRecord { file, line, .. } => {
                assert_eq!(file, PathBuf::from("train.csv"));
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_label_value_is_malformed() {
        let mut store = RecordStore::default();
        let err = store
            .merge_str(Path::new("t.txt"), false, "A\t1\t0\t2\t0\t0\n")
            .unwrap_err();
        assert!(matches!(err, DatasetError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_header_without_key_column() {
        let mut store = RecordStore::default();
        let err = store
            .merge_str(Path::new("t.csv"), true, "name\tText Transcription\nA\tx\n")
            .unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { .. }));
    }

    #[test]
    fn test_blank_lines_and_crlf_are_tolerated() {
        let mut store = RecordStore::default();
        let content   = "file_name\tText Transcription\r\nA\tx\r\n\r\nB\ty\r\n";
        let merged = store.merge_str(Path::new("t.csv"), true, content).unwrap();
        assert_eq!(merged, 2);
    }

    #[test]
    fn test_empty_transcription_keeps_its_column() {
        let mut store = RecordStore::default();
        let content   = "file_name\tmisogynous\tText Transcription\nA\t1\t\n";
        store.merge_str(Path::new("t.csv"), true, content).unwrap();
        let records = store.into_records();
        assert_eq!(records[0].text.as_deref(), Some(""));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RecordStore::default()
            .merge_file(Path::new("/nonexistent/training.csv"))
            .unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }

    #[test]
    fn test_header_detection_uses_file_name() {
        assert!(has_header_row(Path::new("data/training.csv")));
        assert!(!has_header_row(Path::new("data.csv.d/test_labels.txt")));
    }
}
