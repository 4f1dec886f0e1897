pub mod gigachat;

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use std::sync::Arc;

use self::gigachat::GigaChatClient;
use super::CompletionError;
use crate::config::settings::ProviderSettings;
use crate::models::chat::{ ChatMessage, Role, SamplingParams };
use crate::state::ConversationState;

/// Everything one completion call needs, borrowed from the session.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub transcript: &'a [ChatMessage],
    pub system_prompt: &'a str,
    pub model_name: &'a str,
    pub params: SamplingParams,
}

impl<'a> ChatRequest<'a> {
    pub fn from_state(state: &'a ConversationState) -> Self {
        Self {
            transcript: &state.messages,
            system_prompt: &state.system_prompt,
            model_name: &state.model_name,
            params: state.sampling_params,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

/// System prompt first (when non-empty), then the transcript in order with coerced roles.
pub fn build_wire_messages(system_prompt: &str, transcript: &[ChatMessage]) -> Vec<WireMessage> {
    let system = (!system_prompt.is_empty()).then(|| WireMessage {
        role: Role::System,
        content: system_prompt.to_string(),
    });

    system
        .into_iter()
        .chain(
            transcript.iter().map(|m| WireMessage {
                role: m.wire_role(),
                content: m.content.clone(),
            })
        )
        .collect()
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Performs exactly one completion call and returns the first choice's raw text.
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, CompletionError>;

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

pub fn new_client(settings: ProviderSettings) -> Arc<dyn ChatClient> {
    Arc::new(GigaChatClient::new(settings))
}
