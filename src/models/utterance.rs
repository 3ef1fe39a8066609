use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::OTHER;

/// One speaker turn from the meeting transcript - immutable input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    #[serde(default, deserialize_with = "lenient_string")]
    pub speaker: String,
    /// ISO8601-like timestamp, parsed leniently when ordering decisions
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,
}

impl Utterance {
    pub fn new(
        speaker: impl Into<String>,
        timestamp: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            speaker: speaker.into(),
            timestamp: timestamp.into(),
            text: text.into(),
        }
    }
}

/// Accept strings, numbers and nulls for free-text fields
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

/// Discourse role of an utterance, as assigned by the classifier
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// A policy or requirement was clearly settled
    Decision,
    /// A suggestion or request
    Proposal,
    /// A clarification or question
    Question,
    /// Small talk
    Chitchat,
    #[default]
    Other,
}

impl Label {
    pub const ALL: [Label; 5] = [
        Label::Decision,
        Label::Proposal,
        Label::Question,
        Label::Chitchat,
        Label::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Decision => "decision",
            Label::Proposal => "proposal",
            Label::Question => "question",
            Label::Chitchat => "chitchat",
            Label::Other => "other",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown label: {0:?}")]
pub struct UnknownLabel(pub String);

impl FromStr for Label {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Label::ALL
            .into_iter()
            .find(|label| label.as_str() == normalized)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Classifier output for a single utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    pub topic: String,
    pub reason: String,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            label: Label::Other,
            topic: OTHER.to_string(),
            reason: String::new(),
        }
    }
}

/// An utterance with its classification attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledUtterance {
    #[serde(flatten)]
    pub utterance: Utterance,
    #[serde(default)]
    pub label: Label,
    #[serde(default = "other_topic")]
    pub topic: String,
    /// Classifier's short reasoning
    #[serde(default, rename = "label_reason", alias = "rationale")]
    pub rationale: String,
    /// Text after profile replacements, as it was shown to the classifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_text: Option<String>,
}

fn other_topic() -> String {
    OTHER.to_string()
}

impl LabeledUtterance {
    pub fn new(utterance: Utterance, classification: Classification) -> Self {
        Self {
            utterance,
            label: classification.label,
            topic: classification.topic,
            rationale: classification.reason,
            corrected_text: None,
        }
    }

    pub fn with_corrected_text(mut self, text: impl Into<String>) -> Self {
        self.corrected_text = Some(text.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        assert_eq!("decision".parse::<Label>().unwrap(), Label::Decision);
        assert_eq!(" Proposal ".parse::<Label>().unwrap(), Label::Proposal);
        assert!("verdict".parse::<Label>().is_err());
    }

    #[test]
    fn test_lenient_utterance_fields() {
        let json = r#"[
            {"speaker": "A", "timestamp": "2024-05-01T10:00:00", "text": "hello"},
            {"speaker": 3, "timestamp": null, "text": "numeric speaker"},
            {"text": "no speaker"}
        ]"#;

        let utterances: Vec<Utterance> = serde_json::from_str(json).unwrap();

        assert_eq!(utterances[0].speaker, "A");
        assert_eq!(utterances[1].speaker, "3");
        assert_eq!(utterances[1].timestamp, "");
        assert_eq!(utterances[2].speaker, "");
        assert_eq!(utterances[2].text, "no speaker");
    }

    #[test]
    fn test_labeled_utterance_snapshot_format() {
        let labeled = LabeledUtterance::new(
            Utterance::new("A", "2024-05-01T10:00:00", "通知はメールで送る"),
            Classification {
                label: Label::Decision,
                topic: "通知".to_string(),
                reason: "方針が確定".to_string(),
            },
        );

        let value = serde_json::to_value(&labeled).unwrap();
        assert_eq!(value["speaker"], "A");
        assert_eq!(value["label"], "decision");
        assert_eq!(value["label_reason"], "方針が確定");
        assert!(value.get("corrected_text").is_none());

        let back: LabeledUtterance = serde_json::from_value(value).unwrap();
        assert_eq!(back, labeled);
    }

    #[test]
    fn test_labeled_utterance_defaults() {
        let labeled: LabeledUtterance =
            serde_json::from_str(r#"{"speaker": "B", "timestamp": "", "text": "x"}"#).unwrap();
        assert_eq!(labeled.label, Label::Other);
        assert_eq!(labeled.topic, OTHER);
        assert!(labeled.rationale.is_empty());
    }
}
