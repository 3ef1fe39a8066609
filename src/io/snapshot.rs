use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{read_json, write_json};
use crate::models::{LabeledUtterance, Requirement};

/// Provenance recorded with the normalized records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedMeta {
    /// Checksum of the classified snapshot the records were built from
    pub input_sha256: String,
    pub model: String,
    pub temperature: f64,
    pub profile_path: String,
    pub profile_sha256: String,
}

/// Full snapshot of the synthesized (pre-reconciliation) records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSnapshot {
    #[serde(default)]
    pub meta: NormalizedMeta,
    #[serde(default)]
    pub records: Vec<Requirement>,
}

impl NormalizedSnapshot {
    pub fn write(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    pub fn read(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

pub fn write_classified(path: &Path, labeled: &[LabeledUtterance]) -> Result<()> {
    write_json(path, labeled)
}

pub fn read_classified(path: &Path) -> Result<Vec<LabeledUtterance>> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, Label, Utterance};

    #[test]
    fn test_classified_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classified.json");
        let labeled = vec![
            LabeledUtterance::new(
                Utterance::new("A", "2024-05-01T10:00:00", "通知はメールで送る"),
                Classification {
                    label: Label::Decision,
                    topic: "通知".to_string(),
                    reason: "確定".to_string(),
                },
            )
            .with_corrected_text("通知はメールで送る"),
        ];

        write_classified(&path, &labeled).unwrap();

        assert_eq!(read_classified(&path).unwrap(), labeled);
    }

    #[test]
    fn test_normalized_snapshot_tolerates_missing_meta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("normalized.json");
        std::fs::write(
            &path,
            r#"{"records": [{
                "id": "FR-001",
                "feature": "通知",
                "category": "functional",
                "statement": "通知を送る",
                "priority": "Should",
                "status": "検討中",
                "source": {"speaker": "A", "timestamp": "2024-05-01T10:00:00"},
                "tags": ["通知"]
            }]}"#,
        )
        .unwrap();

        let snapshot = NormalizedSnapshot::read(&path).unwrap();

        assert_eq!(snapshot.meta, NormalizedMeta::default());
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].id.as_deref(), Some("FR-001"));
        assert!(snapshot.records[0].acceptance_criteria.is_empty());
    }
}
