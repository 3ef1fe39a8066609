use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Label, parse_timestamp};

/// Requirement category; also selects the id namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Functional,
    Nonfunctional,
    Decision,
}

impl Category {
    /// Prefix of the `{PREFIX}-{seq:03}` id namespace
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Category::Functional => "FR",
            Category::Nonfunctional => "NFR",
            Category::Decision => "DEC",
        }
    }

    fn slot(&self) -> usize {
        match self {
            Category::Functional => 0,
            Category::Nonfunctional => 1,
            Category::Decision => 2,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Functional => write!(f, "functional"),
            Category::Nonfunctional => write!(f, "nonfunctional"),
            Category::Decision => write!(f, "decision"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Must,
    Should,
}

impl Priority {
    /// Only decisions are binding
    pub fn from_label(label: Label) -> Self {
        if label == Label::Decision {
            Priority::Must
        } else {
            Priority::Should
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "決定")]
    Decided,
    #[serde(rename = "検討中")]
    UnderDiscussion,
    #[serde(rename = "情報")]
    Info,
}

impl Status {
    pub fn from_label(label: Label) -> Self {
        match label {
            Label::Decision => Status::Decided,
            Label::Proposal | Label::Question => Status::UnderDiscussion,
            Label::Chitchat | Label::Other => Status::Info,
        }
    }
}

/// Provenance of a record - never altered after creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Output of the statement normalizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedStatement {
    pub statement: String,
    pub acceptance_criteria: Vec<String>,
}

impl NormalizedStatement {
    /// Pass-through used when the normalizer answer is unusable
    pub fn fallback(text: &str) -> Self {
        Self {
            statement: text.to_string(),
            acceptance_criteria: vec![],
        }
    }
}

/// A formal requirement synthesized from exactly one labeled utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Assigned only after reconciliation has finalized the category
    #[serde(default)]
    pub id: Option<String>,
    pub feature: String,
    pub category: Category,
    pub statement: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    pub priority: Priority,
    pub status: Status,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub supersedes: Vec<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Requirement {
    /// Parsed source timestamp; `None` orders as oldest
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.source.timestamp)
    }
}

/// Assign `{PREFIX}-{seq:03}` ids in slice order, one counter per category
pub fn assign_ids(records: &mut [Requirement]) {
    let mut counters = [0usize; 3];
    for record in records.iter_mut() {
        let counter = &mut counters[record.category.slot()];
        *counter += 1;
        record.id = Some(format!("{}-{:03}", record.category.id_prefix(), counter));
    }
}
