//! Per-session conversation state.
//!
//! A session owns exactly one [`ConversationState`]; nothing here is shared between
//! sessions. Hosts that keep loosely-typed session storage describe it as a
//! [`PartialState`] and run it through [`initialize`] on every interaction cycle.

use log::debug;
use serde_json::{ Map, Value as JsonValue };

use crate::config::prompt::ModeRegistry;
use crate::models::chat::{ ChatMessage, Role, SamplingParams, AVAILABLE_MODELS };

/// Session fields that may not have been set yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialState {
    pub messages: Option<Vec<ChatMessage>>,
    pub active_mode: Option<String>,
    pub system_prompt: Option<String>,
    pub model_name: Option<String>,
    pub sampling_params: Option<SamplingParams>,
    pub pending_reply: Option<bool>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    pub active_mode: String,
    pub system_prompt: String,
    pub model_name: String,
    pub sampling_params: SamplingParams,
    pub pending_reply: bool,
    pub last_error: Option<String>,
}

impl From<ConversationState> for PartialState {
    fn from(state: ConversationState) -> Self {
        Self {
            messages: Some(state.messages),
            active_mode: Some(state.active_mode),
            system_prompt: Some(state.system_prompt),
            model_name: Some(state.model_name),
            sampling_params: Some(state.sampling_params),
            pending_reply: Some(state.pending_reply),
            last_error: state.last_error,
        }
    }
}

/// Fills every absent field from the registry and keeps every present one.
///
/// A mode that the registry does not know is replaced by the first registry entry,
/// so `active_mode` always names a registered mode.
pub fn initialize(partial: PartialState, registry: &ModeRegistry) -> ConversationState {
    let active_mode = match partial.active_mode {
        Some(mode) if registry.contains(&mode) => mode,
        Some(mode) => {
            debug!("Unknown mode '{}' in session, using '{}'", mode, registry.first().name);
            registry.first().name.clone()
        }
        None => registry.first().name.clone(),
    };

    let system_prompt = partial.system_prompt.unwrap_or_else(|| {
        registry.resolve(&active_mode).system_prompt.clone()
    });

    ConversationState {
        messages: partial.messages.unwrap_or_default(),
        active_mode,
        system_prompt,
        model_name: partial.model_name.unwrap_or_else(|| registry.default_model.clone()),
        sampling_params: partial.sampling_params.unwrap_or(registry.default_params),
        pending_reply: partial.pending_reply.unwrap_or(false),
        last_error: partial.last_error,
    }
}

impl ConversationState {
    pub fn new(registry: &ModeRegistry) -> Self {
        initialize(PartialState::default(), registry)
    }

    pub fn append(
        &mut self,
        role: impl Into<String>,
        content: impl Into<String>,
        meta: Map<String, JsonValue>
    ) {
        self.messages.push(ChatMessage::new(role, content).with_meta(meta));
    }

    /// Drops the transcript and the last error; mode, model and parameters stay.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_error = None;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    /// Switches mode. The system prompt is reset only when the mode actually changes,
    /// so an overridden prompt survives re-selecting the current mode.
    pub fn select_mode(&mut self, registry: &ModeRegistry, name: &str) {
        let mode = registry.resolve(name);
        if mode.name != self.active_mode {
            self.active_mode = mode.name.clone();
            self.system_prompt = mode.system_prompt.clone();
        }
    }

    /// Unknown model names fall back to the first available model.
    pub fn select_model(&mut self, name: &str) {
        self.model_name = AVAILABLE_MODELS.iter()
            .find(|m| **m == name)
            .unwrap_or(&AVAILABLE_MODELS[0])
            .to_string();
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.sampling_params.temperature = temperature;
    }

    pub fn set_max_tokens(&mut self, max_tokens: u32) {
        self.sampling_params.max_tokens = max_tokens;
    }

    pub fn override_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    pub fn last_assistant_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant.as_str())
            .map(|m| m.content.as_str())
    }
}
