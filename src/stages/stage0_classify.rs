use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::{LlmError, PipelineError};
use crate::llm::Classifier;
use crate::models::{Label, LabeledUtterance, Profile, Utterance};

/// Perform Stage 0: classification
///
/// This stage:
/// 1. Applies the profile's text replacements to every utterance
/// 2. Sends the corrected texts to the classifier in one call
/// 3. Attaches label, topic and rationale index by index
///
/// The raw text is kept on the utterance; the corrected text is stored
/// next to it so later stages and the snapshot see what was classified.
pub async fn classify<C: Classifier + ?Sized>(
    classifier: &C,
    utterances: &[Utterance],
    profile: &Profile,
) -> Result<Vec<LabeledUtterance>, PipelineError> {
    if utterances.is_empty() {
        info!("Stage 0: no utterances, skipping classifier");
        return Ok(Vec::new());
    }

    let corrector = profile.corrector();
    let corrected: Vec<Utterance> = utterances
        .iter()
        .map(|u| Utterance {
            text: corrector.apply(&u.text),
            ..u.clone()
        })
        .collect();

    info!("Stage 0: classifying {} utterances", corrected.len());
    let classifications = classifier
        .classify(&corrected)
        .await
        .map_err(PipelineError::Classifier)?;

    if classifications.len() != utterances.len() {
        return Err(PipelineError::Classifier(LlmError::InvalidResponse(format!(
            "expected {} classifications, got {}",
            utterances.len(),
            classifications.len()
        ))));
    }

    let labeled: Vec<LabeledUtterance> = utterances
        .iter()
        .zip(corrected)
        .zip(classifications)
        .map(|((raw, corrected), classification)| {
            LabeledUtterance::new(raw.clone(), classification).with_corrected_text(corrected.text)
        })
        .collect();

    let mut counts: BTreeMap<Label, usize> = BTreeMap::new();
    for l in &labeled {
        *counts.entry(l.label).or_default() += 1;
        debug!("[{}] {} / {}: {}", l.label, l.topic, l.utterance.speaker, l.utterance.text);
    }
    info!(
        "Labels: {}",
        counts
            .iter()
            .map(|(label, n)| format!("{}={}", label, n))
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(labeled)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::{Classification, TextReplacement};

    /// Records what it was asked and answers `decision` for everything
    struct Recording {
        seen: Mutex<Vec<String>>,
        drop_last: bool,
    }

    #[async_trait]
    impl Classifier for Recording {
        async fn classify(
            &self,
            utterances: &[Utterance],
        ) -> Result<Vec<Classification>, LlmError> {
            self.seen
                .lock()
                .unwrap()
                .extend(utterances.iter().map(|u| u.text.clone()));
            let mut out: Vec<Classification> = utterances
                .iter()
                .map(|_| Classification {
                    label: Label::Decision,
                    topic: "通知".to_string(),
                    reason: "確定表現".to_string(),
                })
                .collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }
    }

    fn recording(drop_last: bool) -> Recording {
        Recording {
            seen: Mutex::new(Vec::new()),
            drop_last,
        }
    }

    #[tokio::test]
    async fn test_classifier_sees_corrected_text() {
        let classifier = recording(false);
        let profile = Profile {
            text_replacements: vec![TextReplacement::new("メール通知", "通知メール")],
            ..Profile::default()
        };
        let utterances = vec![Utterance::new("A", "2024-05-01T10:00:00", "メール通知を送る")];

        let labeled = classify(&classifier, &utterances, &profile).await.unwrap();

        assert_eq!(*classifier.seen.lock().unwrap(), vec!["通知メールを送る"]);
        assert_eq!(labeled[0].utterance.text, "メール通知を送る");
        assert_eq!(labeled[0].corrected_text.as_deref(), Some("通知メールを送る"));
        assert_eq!(labeled[0].label, Label::Decision);
        assert_eq!(labeled[0].rationale, "確定表現");
    }

    #[tokio::test]
    async fn test_empty_input_skips_call() {
        let classifier = recording(false);

        let labeled = classify(&classifier, &[], &Profile::default()).await.unwrap();

        assert!(labeled.is_empty());
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_mismatch_is_fatal() {
        let classifier = recording(true);
        let utterances = vec![
            Utterance::new("A", "", "通知はメールで送る"),
            Utterance::new("B", "", "ログイン画面を作る"),
        ];

        let err = classify(&classifier, &utterances, &Profile::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Classifier(LlmError::InvalidResponse(_))
        ));
    }
}
