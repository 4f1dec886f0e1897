//! Full turns through `ChatAgent`: state transitions, normalization and error capture.

use async_trait::async_trait;
use gigachat_vsa::agent::{ begin_turn, finish_turn, ChatAgent, TurnOutcome };
use gigachat_vsa::config::prompt::ModeRegistry;
use gigachat_vsa::config::settings::ProviderSettings;
use gigachat_vsa::llm::chat::{ build_wire_messages, new_client, ChatClient, ChatRequest, WireMessage };
use gigachat_vsa::llm::{ CompletionError, ProviderError };
use gigachat_vsa::models::chat::Role;
use serde_json::Map;
use std::sync::{ Arc, Mutex };

/// Returns a fixed result and records what it was asked.
struct ScriptedClient {
    reply: Option<String>,
    seen: Mutex<Vec<(Vec<WireMessage>, String)>>,
}

impl ScriptedClient {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self { reply: Some(text.to_string()), seen: Mutex::new(Vec::new()) })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { reply: None, seen: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, CompletionError> {
        self.seen
            .lock()
            .unwrap()
            .push((
                build_wire_messages(request.system_prompt, request.transcript),
                request.model_name.to_string(),
            ));
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None =>
                Err(
                    ProviderError::Api {
                        status: 503,
                        body: "service unavailable".into(),
                    }.into()
                ),
        }
    }
}

fn agent_with(client: Arc<dyn ChatClient>) -> ChatAgent {
    ChatAgent::new(Arc::new(ModeRegistry::builtin()), client)
}

#[tokio::test]
async fn coder_turn_unwraps_envelope() {
    let client = ScriptedClient::replying(
        r#"{"answer":{"reasoning":"...","user":"def add(a,b): return a+b"}}"#
    );
    let agent = agent_with(client.clone());
    let mut state = agent.new_session();
    state.select_mode(agent.registry(), "Кодер");

    let outcome = agent.submit_turn(&mut state, "напиши функцию сложения").await;

    assert_eq!(outcome, TurnOutcome::Replied("def add(a,b): return a+b".into()));
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].role, "user");
    assert_eq!(state.messages[0].content, "напиши функцию сложения");
    assert_eq!(state.messages[1].role, "assistant");
    assert_eq!(state.messages[1].content, "def add(a,b): return a+b");
    assert_eq!(state.last_error, None);
    assert!(!state.pending_reply);

    let seen = client.seen.lock().unwrap();
    let (wire, model) = &seen[0];
    assert_eq!(model, "GigaChat-2");
    assert_eq!(wire[0].role, Role::System);
    assert_eq!(wire[0].content, agent.registry().get("Кодер").unwrap().system_prompt);
    assert_eq!(wire[1].content, "напиши функцию сложения");
}

#[tokio::test]
async fn plain_reply_is_stored_as_is() {
    let agent = agent_with(ScriptedClient::replying("Просто текст"));
    let mut state = agent.new_session();

    agent.submit_turn(&mut state, "привет").await;

    assert_eq!(state.last_assistant_reply(), Some("Просто текст"));
}

#[tokio::test]
async fn provider_failure_records_error_without_reply() {
    let agent = agent_with(ScriptedClient::failing());
    let mut state = agent.new_session();

    let outcome = agent.submit_turn(&mut state, "привет").await;

    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].role, "user");
    let error = state.last_error.as_deref().unwrap();
    assert!(error.contains("service unavailable"), "{}", error);
    assert!(!state.pending_reply);
}

#[tokio::test]
async fn next_turn_clears_stale_error() {
    let failing = agent_with(ScriptedClient::failing());
    let mut state = failing.new_session();
    failing.submit_turn(&mut state, "первый").await;
    assert!(state.last_error.is_some());

    let working = agent_with(ScriptedClient::replying("ok"));
    working.submit_turn(&mut state, "второй").await;

    assert_eq!(state.last_error, None);
    let roles: Vec<_> = state.messages.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, ["user", "user", "assistant"]);
}

#[tokio::test]
async fn history_is_sent_in_order() {
    let client = ScriptedClient::replying("ok");
    let agent = agent_with(client.clone());
    let mut state = agent.new_session();
    state.override_system_prompt("");
    state.append("observer", "заметка", Map::new());

    agent.submit_turn(&mut state, "раз").await;
    agent.submit_turn(&mut state, "два").await;

    let seen = client.seen.lock().unwrap();
    let contents: Vec<_> = seen[1].0.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["заметка", "раз", "ok", "два"]);
    assert_eq!(seen[1].0[0].role, Role::User);
    assert_eq!(state.messages[0].role, "observer");
}

#[tokio::test]
async fn connection_error_leaves_session_usable() {
    let settings = ProviderSettings {
        credentials: Some("test-key".into()),
        scope: Some("GIGACHAT_API_PERS".into()),
        auth_url: "http://127.0.0.1:9/api/v2/oauth".into(),
        base_url: "http://127.0.0.1:9".into(),
        ..ProviderSettings::default()
    };
    let agent = agent_with(new_client(settings));
    let mut state = agent.new_session();

    let outcome = agent.submit_turn(&mut state, "привет").await;

    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    assert_eq!(state.messages.len(), 1);
    let error = state.last_error.as_deref().unwrap_or_default().to_lowercase();
    assert!(error.contains("127.0.0.1:9"), "{}", error);
    assert!(error.contains("refused"), "{}", error);
    assert!(!state.pending_reply);
}

#[tokio::test]
async fn session_is_pending_while_request_is_in_flight() {
    let client = ScriptedClient::replying("ok");
    let agent = agent_with(client.clone());
    let mut state = agent.new_session();
    state.set_error(Some("старая ошибка".into()));

    begin_turn(&mut state, "привет");

    assert!(state.pending_reply);
    assert_eq!(state.last_error, None);
    assert_eq!(state.messages.len(), 1);
    assert!(client.seen.lock().unwrap().is_empty());

    let result = client.complete(&ChatRequest::from_state(&state)).await;
    assert!(state.pending_reply);

    let outcome = finish_turn(&mut state, result);

    assert_eq!(outcome, TurnOutcome::Replied("ok".into()));
    assert!(!state.pending_reply);
    assert_eq!(state.messages.len(), 2);
}

#[tokio::test]
async fn missing_credentials_fail_the_turn() {
    let agent = agent_with(new_client(ProviderSettings::default()));
    let mut state = agent.new_session();

    agent.submit_turn(&mut state, "привет").await;

    let error = state.last_error.as_deref().unwrap();
    assert!(error.contains("credentials"), "{}", error);
    assert_eq!(state.messages.len(), 1);
}
