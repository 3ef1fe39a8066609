use std::collections::BTreeSet;
use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt, stream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{LlmError, PipelineError};
use crate::llm::{Normalizer, validate_normalized};
use crate::models::{
    Category, Label, LabeledUtterance, NormalizedStatement, Priority, Profile, Requirement,
    Source, Status, TextCorrector,
};

/// Configuration for Stage 1
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Normalizer calls in flight at once
    pub concurrency: usize,
    /// Deadline for a single normalizer call
    pub call_timeout: Duration,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// A kept utterance waiting for its normalized statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRecord {
    /// Position in the labeled input
    pub index: usize,
    /// Replacement-corrected text
    pub text: String,
    pub feature: String,
    pub category: Category,
    pub label: Label,
    pub topic: String,
    pub rationale: String,
    pub source: Source,
}

impl DraftRecord {
    pub fn into_record(self, normalized: NormalizedStatement) -> Requirement {
        Requirement {
            id: None,
            feature: self.feature,
            category: self.category,
            statement: normalized.statement,
            acceptance_criteria: normalized.acceptance_criteria,
            priority: Priority::from_label(self.label),
            status: Status::from_label(self.label),
            source: self.source,
            rationale: self.rationale,
            dependencies: Vec::new(),
            supersedes: Vec::new(),
            tags: BTreeSet::from([self.topic]),
        }
    }
}

/// Decide whether an utterance becomes a record, and under which feature
/// and category. `None` means it is filler and is discarded.
pub fn plan_record(
    index: usize,
    labeled: &LabeledUtterance,
    profile: &Profile,
    corrector: &TextCorrector,
) -> Option<DraftRecord> {
    let text = corrector.apply(labeled.utterance.text.trim());

    if labeled.label == Label::Chitchat || profile.is_non_requirement(&text) {
        return None;
    }

    let feature = profile.feature_of(&text).to_string();
    let category = if labeled.label == Label::Decision {
        Category::Decision
    } else if profile.is_nonfunctional(&feature) {
        Category::Nonfunctional
    } else {
        Category::Functional
    };

    Some(DraftRecord {
        index,
        text,
        feature,
        category,
        label: labeled.label,
        topic: labeled.topic.clone(),
        rationale: labeled.rationale.clone(),
        source: Source {
            speaker: labeled.utterance.speaker.clone(),
            timestamp: labeled.utterance.timestamp.clone(),
        },
    })
}

/// Result of Stage 1 processing
#[derive(Debug)]
pub struct Stage1Result {
    /// Records in input order, ids unassigned
    pub records: Vec<Requirement>,
    /// Utterances discarded as chitchat or filler
    pub discarded: usize,
    /// Records whose normalizer answer was unusable
    pub fallbacks: usize,
}

/// Execute Stage 1: record synthesis
///
/// For each labeled utterance:
/// 1. Correct the text and drop filler
/// 2. Pick feature and category from the profile
/// 3. Ask the normalizer for a formal statement
/// 4. Build the record with priority, status and provenance
///
/// Normalizer calls run concurrently but results keep input order. The
/// first call that fails for any reason other than an unusable answer
/// aborts the whole stage.
pub async fn execute_stage1<N: Normalizer + ?Sized>(
    normalizer: &N,
    labeled: &[LabeledUtterance],
    profile: &Profile,
    config: &SynthesisConfig,
) -> Result<Stage1Result, PipelineError> {
    let corrector = profile.corrector();
    let drafts: Vec<DraftRecord> = labeled
        .iter()
        .enumerate()
        .filter_map(|(i, l)| plan_record(i, l, profile, &corrector))
        .collect();
    let discarded = labeled.len() - drafts.len();

    info!(
        "Stage 1: normalizing {} records ({} discarded, concurrency {})",
        drafts.len(),
        discarded,
        config.concurrency
    );

    let outcomes: Vec<(Requirement, bool)> = stream::iter(drafts)
        .map(|draft| normalize_draft(normalizer, draft, config.call_timeout))
        .buffered(config.concurrency.max(1))
        .try_collect()
        .await?;

    let fallbacks = outcomes.iter().filter(|(_, fell_back)| *fell_back).count();
    let records = outcomes.into_iter().map(|(record, _)| record).collect();

    if fallbacks > 0 {
        warn!("{} records kept their original text", fallbacks);
    }

    Ok(Stage1Result {
        records,
        discarded,
        fallbacks,
    })
}

/// Normalize one draft; the flag is true when the pass-through was used
async fn normalize_draft<N: Normalizer + ?Sized>(
    normalizer: &N,
    draft: DraftRecord,
    call_timeout: Duration,
) -> Result<(Requirement, bool), PipelineError> {
    let call = normalizer.normalize(draft.category, &draft.feature, &draft.text);
    let result = match timeout(call_timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout),
    };

    let normalized = match result {
        Ok(normalized) => validate_normalized(normalized),
        Err(e) if e.is_malformed() => {
            debug!("Utterance {}: {}", draft.index, e);
            None
        }
        Err(source) => {
            return Err(PipelineError::Normalizer {
                index: draft.index,
                source,
            });
        }
    };

    match normalized {
        Some(normalized) => Ok((draft.into_record(normalized), false)),
        None => {
            warn!(
                "Utterance {}: unusable normalizer answer, using original text",
                draft.index
            );
            let fallback = NormalizedStatement::fallback(&draft.text);
            Ok((draft.into_record(fallback), true))
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::models::{Classification, Utterance};

    fn labeled(label: Label, text: &str) -> LabeledUtterance {
        LabeledUtterance::new(
            Utterance::new("佐藤", "2024-05-01T10:00:00", text),
            Classification {
                label,
                topic: "通知".to_string(),
                reason: "理由".to_string(),
            },
        )
    }

    fn plan(label: Label, text: &str) -> Option<DraftRecord> {
        let profile = Profile::default();
        plan_record(0, &labeled(label, text), &profile, &profile.corrector())
    }

    struct Echo;

    #[async_trait]
    impl Normalizer for Echo {
        async fn normalize(
            &self,
            category: Category,
            feature: &str,
            text: &str,
        ) -> Result<NormalizedStatement, LlmError> {
            Ok(NormalizedStatement {
                statement: format!("{}。", text),
                acceptance_criteria: vec![format!("{}:{}", category, feature), " ".to_string()],
            })
        }
    }

    #[test]
    fn test_chitchat_and_filler_are_discarded() {
        assert!(plan(Label::Chitchat, "通知はメールで送る").is_none());
        assert!(plan(Label::Proposal, "なるほど、ありがとうございます").is_none());
        assert!(plan(Label::Proposal, "通知はメールで送る").is_some());
    }

    #[test]
    fn test_category_selection() {
        assert_eq!(
            plan(Label::Decision, "表示は3秒以内").unwrap().category,
            Category::Decision
        );
        assert_eq!(
            plan(Label::Proposal, "表示は3秒以内").unwrap().category,
            Category::Nonfunctional
        );
        assert_eq!(
            plan(Label::Question, "通知はどうする？").unwrap().category,
            Category::Functional
        );
    }

    #[test]
    fn test_feature_defaults_to_other() {
        let draft = plan(Label::Other, "今日の議題").unwrap();

        assert_eq!(draft.feature, crate::models::OTHER);
        assert_eq!(draft.category, Category::Functional);
    }

    #[test]
    fn test_replacements_run_before_feature_lookup() {
        let draft = plan(Label::Proposal, "  req: 通知  ").unwrap();

        assert_eq!(draft.text, "要件: 通知");
        assert_eq!(draft.feature, "通知");
    }

    #[test]
    fn test_into_record_fields() {
        let draft = plan(Label::Decision, "通知はメールで送る").unwrap();

        let record = draft.into_record(NormalizedStatement::fallback("通知はメールで送る"));

        assert_eq!(record.priority, Priority::Must);
        assert_eq!(record.status, Status::Decided);
        assert_eq!(record.source.speaker, "佐藤");
        assert_eq!(record.rationale, "理由");
        assert!(record.tags.contains("通知"));
        assert!(record.id.is_none());
    }

    #[tokio::test]
    async fn test_execute_stage1_keeps_order_and_cleans_criteria() {
        let input = vec![
            labeled(Label::Proposal, "ログイン画面を作る"),
            labeled(Label::Chitchat, "おはようございます"),
            labeled(Label::Decision, "通知はメールで送る"),
        ];

        let result = execute_stage1(&Echo, &input, &Profile::default(), &SynthesisConfig::default())
            .await
            .unwrap();

        assert_eq!(result.discarded, 1);
        assert_eq!(result.fallbacks, 0);
        let statements: Vec<_> = result.records.iter().map(|r| r.statement.as_str()).collect();
        assert_eq!(statements, vec!["ログイン画面を作る。", "通知はメールで送る。"]);
        assert_eq!(
            result.records[1].acceptance_criteria,
            vec!["decision:通知".to_string()]
        );
    }
}
