use log::{ error, info };
use serde_json::Map;
use std::sync::Arc;

use crate::config::prompt::ModeRegistry;
use crate::llm::chat::{ ChatClient, ChatRequest };
use crate::llm::reply::normalize;
use crate::llm::CompletionError;
use crate::models::chat::Role;
use crate::state::ConversationState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The normalized assistant text that was appended to the transcript.
    Replied(String),
    /// The message stored in `last_error`.
    Failed(String),
}

/// Dispatches turns for any number of independent sessions. Holds only read-only
/// collaborators; all mutable state lives in the caller's [`ConversationState`].
#[derive(Clone)]
pub struct ChatAgent {
    registry: Arc<ModeRegistry>,
    chat_client: Arc<dyn ChatClient>,
}

impl ChatAgent {
    pub fn new(registry: Arc<ModeRegistry>, chat_client: Arc<dyn ChatClient>) -> Self {
        Self { registry, chat_client }
    }

    pub fn registry(&self) -> &ModeRegistry {
        &self.registry
    }

    pub fn new_session(&self) -> ConversationState {
        ConversationState::new(&self.registry)
    }

    /// Runs one turn. This is the only place provider failures are caught: on error the
    /// session keeps the user message, records `last_error` and stays usable.
    pub async fn submit_turn(&self, state: &mut ConversationState, user_text: &str) -> TurnOutcome {
        begin_turn(state, user_text);
        let result = self.chat_client.complete(&ChatRequest::from_state(state)).await;
        finish_turn(state, result)
    }
}

/// Idle -> Dispatched: clears the stale error, records the user message and marks the
/// session as waiting for a reply.
pub fn begin_turn(state: &mut ConversationState, user_text: &str) {
    state.set_error(None);
    state.append(Role::User, user_text, Map::new());
    state.pending_reply = true;
}

/// Dispatched -> Idle: appends the normalized reply, or records the failure without
/// touching the transcript.
pub fn finish_turn(
    state: &mut ConversationState,
    result: Result<String, CompletionError>
) -> TurnOutcome {
    state.pending_reply = false;

    match result {
        Ok(raw) => {
            let text = normalize(&raw);
            info!(
                "Reply received (mode={}, model={}, {} chars)",
                state.active_mode,
                state.model_name,
                text.chars().count()
            );
            state.append(Role::Assistant, text.clone(), Map::new());
            TurnOutcome::Replied(text)
        }
        Err(e) => {
            error!("Completion failed: {}", e);
            let message = format!("Ошибка при обращении к GigaChat: {}", e);
            state.set_error(Some(message.clone()));
            TurnOutcome::Failed(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderError;

    fn session() -> ConversationState {
        ConversationState::new(&ModeRegistry::builtin())
    }

    #[test]
    fn begin_turn_marks_dispatched() {
        let mut state = session();
        state.set_error(Some("stale".into()));

        begin_turn(&mut state, "привет");

        assert!(state.pending_reply);
        assert_eq!(state.last_error, None);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].role, "user");
    }

    #[test]
    fn finish_turn_success_returns_to_idle() {
        let mut state = session();
        begin_turn(&mut state, "привет");

        let outcome = finish_turn(&mut state, Ok(r#"{"answer":{"user":"Здравствуйте"}}"#.into()));

        assert_eq!(outcome, TurnOutcome::Replied("Здравствуйте".into()));
        assert!(!state.pending_reply);
        assert_eq!(state.last_assistant_reply(), Some("Здравствуйте"));
    }

    #[test]
    fn finish_turn_failure_returns_to_idle_without_reply() {
        let mut state = session();
        begin_turn(&mut state, "привет");

        let err = ProviderError::MalformedResponse("response has no choices".into());
        let outcome = finish_turn(&mut state, Err(err.into()));

        assert!(matches!(outcome, TurnOutcome::Failed(_)));
        assert!(!state.pending_reply);
        assert_eq!(state.messages.len(), 1);
        assert!(state.last_error.as_deref().unwrap().contains("response has no choices"));
    }
}
