use serde::{Deserialize, Serialize};

use crate::models::Requirement;

/// Completes an elliptical decision ("decided with that wording") from the
/// most recent FR/NFR record that it must be referring to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRule {
    /// The decision statement starts with one of these
    #[serde(default)]
    pub starts_with: Vec<String>,
    /// ...or contains one of these
    #[serde(default)]
    pub contains: Vec<String>,
    /// A candidate record is a referent if its statement mentions any of these
    pub reference_keywords: Vec<String>,
    /// Rewritten statement is `rewrite_prefix + referent statement`
    pub rewrite_prefix: String,
}

impl CompletionRule {
    pub fn applies_to(&self, decision_statement: &str) -> bool {
        self.starts_with
            .iter()
            .any(|p| decision_statement.starts_with(p.as_str()))
            || self
                .contains
                .iter()
                .any(|m| decision_statement.contains(m.as_str()))
    }

    /// Scan from the end so the latest referent wins
    pub fn complete(&self, candidates: &[&Requirement]) -> Option<String> {
        candidates
            .iter()
            .rev()
            .find(|r| {
                self.reference_keywords
                    .iter()
                    .any(|kw| r.statement.contains(kw.as_str()))
            })
            .map(|r| format!("{}{}", self.rewrite_prefix, r.statement))
    }
}
