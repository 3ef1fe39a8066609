use async_trait::async_trait;
use tracing::{info, warn};

use super::{
    AnthropicClient, CLASSIFIER_SYSTEM_PROMPT, ClassificationResponse, align_classifications,
    build_classifier_prompt, classification_tool,
};
use crate::error::LlmError;
use crate::models::{Classification, Utterance};

/// Assigns a discourse label, topic and rationale to each utterance.
///
/// Implementations must return exactly one classification per input, in
/// input order.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, utterances: &[Utterance]) -> Result<Vec<Classification>, LlmError>;
}

#[async_trait]
impl Classifier for AnthropicClient {
    async fn classify(&self, utterances: &[Utterance]) -> Result<Vec<Classification>, LlmError> {
        let prompt = build_classifier_prompt(utterances);
        let response: ClassificationResponse = self
            .send_with_tool(CLASSIFIER_SYSTEM_PROMPT, &prompt, classification_tool())
            .await?;

        let alignment = align_classifications(response.items, utterances.len());

        if !alignment.missing.is_empty() {
            warn!(
                "Classifier skipped {} utterances (defaulted to other): {:?}",
                alignment.missing.len(),
                alignment.missing
            );
        }
        if alignment.out_of_range > 0 || alignment.unknown_labels > 0 {
            warn!(
                "Classifier returned {} out-of-range indices and {} unknown labels",
                alignment.out_of_range, alignment.unknown_labels
            );
        }
        info!("Classified {} utterances", alignment.classifications.len());

        Ok(alignment.classifications)
    }
}
