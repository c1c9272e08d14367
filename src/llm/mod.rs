//! Chat-completion collaborator used to estimate macros from free text.

pub mod openai;

use async_trait::async_trait;

pub use openai::OpenAiClient;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that estimates macro nutrient \
information from meal descriptions. Provide the output in a structured format. Output only the \
key-value pairs, no extra text. Example: Meal description: Grilled Chicken Salad 'Meal: Grilled \
Chicken Salad, Calories: 350kcal, Protein: 40g, Fat: 15g, Cholesterol: 80mg, Carbs: 20g'";

pub fn user_prompt(description: &str) -> String {
    format!("Extract macros for: {description}")
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("completion request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("completion API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("completion response had no content")]
    EmptyResponse,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the assistant text for a single system + user exchange.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Replies with a fixed text and remembers the last user message.
    pub struct CannedCompletion {
        reply: Option<String>,
        pub last_user: Mutex<Option<String>>,
    }

    impl CannedCompletion {
        pub fn replying(text: &str) -> Self {
            Self {
                reply: Some(text.to_string()),
                last_user: Mutex::new(None),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                last_user: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for CannedCompletion {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            *self.last_user.lock().unwrap() = Some(user.to_string());
            self.reply.clone().ok_or(LlmError::Api {
                status: 503,
                message: "unavailable".into(),
            })
        }
    }
}
