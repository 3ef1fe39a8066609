use async_trait::async_trait;

use super::{
    AnthropicClient, NORMALIZER_SYSTEM_PROMPT, build_normalizer_prompt, normalization_tool,
};
use crate::error::LlmError;
use crate::models::{Category, NormalizedStatement};

/// Rewrites a colloquial utterance as a formal requirement statement.
///
/// A response that arrives but cannot be used must be reported as
/// [`LlmError::InvalidResponse`] so the caller can fall back to the raw
/// text; any other error is fatal for the run.
#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(
        &self,
        category: Category,
        feature: &str,
        text: &str,
    ) -> Result<NormalizedStatement, LlmError>;
}

#[async_trait]
impl Normalizer for AnthropicClient {
    async fn normalize(
        &self,
        category: Category,
        feature: &str,
        text: &str,
    ) -> Result<NormalizedStatement, LlmError> {
        let prompt = build_normalizer_prompt(category, feature, text);
        self.send_with_tool(NORMALIZER_SYSTEM_PROMPT, &prompt, normalization_tool())
            .await
    }
}
