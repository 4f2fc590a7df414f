//! Question refinement.
//!
//! Rewrites a raw user question into a precise dataframe query with one
//! completion call. No retries; callers decide what to do on failure.

use crate::error::RefinementError;
use crate::llm::client::{ChatMessage, CompletionClient};
use std::sync::Arc;
use tracing::debug;

/// Fixed instruction sent with every refinement request.
pub const REFINE_SYSTEM_PROMPT: &str = "You are an EV analytics expert. \
Refine the user query to be precise and relevant for a dataframe analysis on electric vehicle charging station reviews. \
If the prompt implies a chart or graph, ask for X and Y values. Avoid vague terms. Respond with only the refined query.";

/// Rewrites questions through a completion client.
pub struct QueryRefiner {
    client: Arc<dyn CompletionClient>,
}

impl QueryRefiner {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Return the refined question, trimmed of surrounding whitespace.
    pub async fn refine(&self, question: &str) -> Result<String, RefinementError> {
        let messages = [
            ChatMessage::system(REFINE_SYSTEM_PROMPT),
            ChatMessage::user(question),
        ];

        let refined = self.client.complete(&messages).await?;
        let refined = refined.trim().to_string();
        debug!(
            "{} refined '{}' into '{}'",
            self.client.model_name(),
            question,
            refined
        );

        Ok(refined)
    }
}
