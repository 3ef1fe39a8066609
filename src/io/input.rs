use std::path::Path;

use anyhow::{Context, Result};

use crate::models::Utterance;

/// Parse a transcript file (JSON array of utterances)
pub fn parse_utterance_file(path: &Path) -> Result<Vec<Utterance>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_utterances_json(&content)
}

/// Parse a JSON array of `{speaker, timestamp, text}` objects
pub fn parse_utterances_json(json: &str) -> Result<Vec<Utterance>> {
    serde_json::from_str(json).context("Failed to parse utterance JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utterances_json() {
        let json = r#"[
            {"speaker": "佐藤", "timestamp": "2024-05-01T10:00:00", "text": "ログイン後はダッシュボードを表示したい"},
            {"speaker": "鈴木", "timestamp": "2024-05-01T10:01:00", "text": "了解です"}
        ]"#;

        let utterances = parse_utterances_json(json).unwrap();

        assert_eq!(utterances.len(), 2);
        assert_eq!(utterances[0].speaker, "佐藤");
        assert_eq!(utterances[1].text, "了解です");
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(parse_utterances_json(r#"{"speaker": "A"}"#).is_err());
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        std::fs::write(&path, r#"[{"speaker": "A", "timestamp": "", "text": "x"}]"#).unwrap();

        let utterances = parse_utterance_file(&path).unwrap();
        assert_eq!(utterances.len(), 1);

        assert!(parse_utterance_file(&dir.path().join("missing.json")).is_err());
    }
}
