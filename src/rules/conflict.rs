use serde::{Deserialize, Serialize};

/// Mutually exclusive values for one topic.
///
/// When the topic's governing decision names one alternative and a
/// functional requirement names a different one, the requirement is a
/// superseded alternative and is dropped outright (it does not go to
/// Out-of-Scope). Add entries to cover new topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    pub topic: String,
    pub alternatives: Vec<String>,
}

impl ConflictRule {
    pub fn new(topic: &str, alternatives: &[&str]) -> Self {
        Self {
            topic: topic.to_string(),
            alternatives: alternatives.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Decision mentions alternative `i`, statement mentions alternative `j != i`
    pub fn conflicts(&self, decision_statement: &str, statement: &str) -> bool {
        self.alternatives.iter().enumerate().any(|(i, decided)| {
            decision_statement.contains(decided.as_str())
                && self
                    .alternatives
                    .iter()
                    .enumerate()
                    .any(|(j, proposed)| i != j && statement.contains(proposed.as_str()))
        })
    }
}
