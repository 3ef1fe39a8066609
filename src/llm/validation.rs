use serde::Deserialize;

use crate::models::{Classification, Label, NormalizedStatement, OTHER};

/// Raw classifier tool input
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationResponse {
    #[serde(default)]
    pub items: Vec<ClassificationItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationItem {
    pub index: i64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub reason: String,
}

/// Classifier output joined back onto the input by index
#[derive(Debug, Clone)]
pub struct ClassificationAlignment {
    /// Exactly one entry per input utterance
    pub classifications: Vec<Classification>,
    /// Input indices the classifier skipped (filled with the default)
    pub missing: Vec<usize>,
    /// Items whose index pointed outside the input
    pub out_of_range: usize,
    /// Items whose label was not in the label set (mapped to `other`)
    pub unknown_labels: usize,
}

/// Align classifier items to `expected` inputs.
///
/// Index is the only join key. When an index repeats, the later item wins.
pub fn align_classifications(
    items: Vec<ClassificationItem>,
    expected: usize,
) -> ClassificationAlignment {
    let mut slots: Vec<Option<Classification>> = vec![None; expected];
    let mut out_of_range = 0;
    let mut unknown_labels = 0;

    for item in items {
        let slot = match usize::try_from(item.index)
            .ok()
            .and_then(|i| slots.get_mut(i))
        {
            Some(slot) => slot,
            None => {
                out_of_range += 1;
                continue;
            }
        };

        let label = item.label.parse::<Label>().unwrap_or_else(|_| {
            unknown_labels += 1;
            Label::Other
        });
        let topic = match item.topic.trim() {
            "" => OTHER.to_string(),
            topic => topic.to_string(),
        };

        *slot = Some(Classification {
            label,
            topic,
            reason: item.reason.trim().to_string(),
        });
    }

    let missing = slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_none())
        .map(|(i, _)| i)
        .collect();

    ClassificationAlignment {
        classifications: slots.into_iter().map(Option::unwrap_or_default).collect(),
        missing,
        out_of_range,
        unknown_labels,
    }
}

/// Clean a normalizer answer; `None` means it is unusable and the caller
/// should fall back to the utterance text.
pub fn validate_normalized(normalized: NormalizedStatement) -> Option<NormalizedStatement> {
    let statement = normalized.statement.trim();
    if statement.is_empty() {
        return None;
    }

    Some(NormalizedStatement {
        statement: statement.to_string(),
        acceptance_criteria: normalized
            .acceptance_criteria
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
    })
}
