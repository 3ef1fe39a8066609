pub mod completion;
pub mod conflict;
pub mod dedup;

pub use completion::*;
pub use conflict::*;
pub use dedup::*;

use serde::{Deserialize, Serialize};

use crate::models::Requirement;

/// Domain rules consulted during reconciliation.
///
/// These live in the profile so new per-topic rules are data rather than
/// new code paths. Defaults reproduce the built-in rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileRules {
    /// A governing decision containing any of these moves its topic's
    /// FR/NFR records to Out-of-Scope
    pub exclusion_markers: Vec<String>,
    /// Per-topic "decided value vs proposed value" conflicts
    pub conflicts: Vec<ConflictRule>,
    /// Elliptical decisions completed from an earlier proposal
    pub completions: Vec<CompletionRule>,
}

impl Default for ReconcileRules {
    fn default() -> Self {
        Self {
            exclusion_markers: vec!["除外".to_string(), "範囲から除外".to_string()],
            conflicts: vec![ConflictRule::new("ボタン位置", &["中央下", "右下"])],
            completions: vec![CompletionRule {
                starts_with: vec!["文言".to_string()],
                contains: vec!["その文言で決定".to_string()],
                reference_keywords: vec![
                    "エラーメッセージ".to_string(),
                    "文言".to_string(),
                    "メッセージ".to_string(),
                ],
                rewrite_prefix: "エラーメッセージ文言を確定: ".to_string(),
            }],
        }
    }
}

impl ReconcileRules {
    pub fn is_exclusion(&self, decision_statement: &str) -> bool {
        self.exclusion_markers
            .iter()
            .any(|m| decision_statement.contains(m.as_str()))
    }

    /// First conflict rule for `topic` that the pair violates
    pub fn find_conflict(
        &self,
        topic: &str,
        decision_statement: &str,
        statement: &str,
    ) -> Option<&ConflictRule> {
        self.conflicts
            .iter()
            .filter(|rule| rule.topic == topic)
            .find(|rule| rule.conflicts(decision_statement, statement))
    }

    /// Rewritten statement for an elliptical decision, if any rule resolves it
    pub fn complete_statement(
        &self,
        decision_statement: &str,
        candidates: &[&Requirement],
    ) -> Option<String> {
        self.completions
            .iter()
            .filter(|rule| rule.applies_to(decision_statement))
            .find_map(|rule| rule.complete(candidates))
    }
}
