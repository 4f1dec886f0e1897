//! Line-oriented terminal front-end over [`ChatAgent`].

use std::error::Error;
use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader };

use crate::agent::{ ChatAgent, TurnOutcome };
use crate::models::chat::AVAILABLE_MODELS;
use crate::state::ConversationState;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Modes,
    Mode(String),
    Models,
    Model(String),
    Temperature(f32),
    MaxTokens(u32),
    Clear,
    History,
    Help,
    Quit,
    Message(String),
    Invalid(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Message(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match (name, arg) {
        ("modes", _) => Command::Modes,
        ("models", _) => Command::Models,
        ("mode", a) if !a.is_empty() => Command::Mode(a.to_string()),
        ("model", a) if !a.is_empty() => Command::Model(a.to_string()),
        ("temperature", a) =>
            a
                .parse()
                .map(Command::Temperature)
                .unwrap_or_else(|_| Command::Invalid(format!("Некорректная температура: '{}'", a))),
        ("max_tokens", a) =>
            a
                .parse()
                .map(Command::MaxTokens)
                .unwrap_or_else(|_| Command::Invalid(format!("Некорректная длина ответа: '{}'", a))),
        ("clear", _) => Command::Clear,
        ("history", _) => Command::History,
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        _ => Command::Invalid(format!("Неизвестная команда: '{}'. Введите /help", line)),
    }
}

fn status_line(state: &ConversationState) -> String {
    format!(
        "Текущий режим: {} · Модель: {} · Температура: {} · Длина ответа: {}",
        state.active_mode,
        state.model_name,
        state.sampling_params.temperature,
        state.sampling_params.max_tokens
    )
}

/// Renders the visible transcript: system messages are hidden, every non-user role
/// is shown as the assistant. A pending error is appended last.
pub fn render_transcript(state: &ConversationState) -> String {
    let mut lines: Vec<String> = state.messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| {
            let speaker = if m.role == "user" { "Вы" } else { "GigaChat" };
            format!("{}: {}", speaker, m.content)
        })
        .collect();

    if let Some(error) = &state.last_error {
        lines.push(format!("Ошибка: {}", error));
    }
    if lines.is_empty() {
        return "История пуста".to_string();
    }
    lines.join("\n")
}

const HELP: &str =
    "/modes, /mode <имя>, /models, /model <имя>, /temperature <0.0-1.0>, \
     /max_tokens <256-4096>, /history, /clear, /quit";

/// Reads user lines from stdin until EOF or `/quit`, one turn per message.
pub async fn run_console(
    agent: &ChatAgent,
    mut state: ConversationState
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout.write_all(
        format!("{} v{}\n{}\n", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), status_line(&state)).as_bytes()
    ).await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let output = match parse_command(&line) {
            Command::Quit => {
                break;
            }
            Command::Help => HELP.to_string(),
            Command::Modes => agent.registry().names().join(", "),
            Command::Models => AVAILABLE_MODELS.join(", "),
            Command::Mode(name) => {
                state.select_mode(agent.registry(), &name);
                status_line(&state)
            }
            Command::Model(name) => {
                state.select_model(&name);
                status_line(&state)
            }
            Command::Temperature(t) => {
                state.set_temperature(t);
                status_line(&state)
            }
            Command::MaxTokens(n) => {
                state.set_max_tokens(n);
                status_line(&state)
            }
            Command::Clear => {
                state.clear();
                "Диалог очищен".to_string()
            }
            Command::History => render_transcript(&state),
            Command::Invalid(message) => message,
            Command::Message(text) => {
                stdout.write_all("Агент формирует ответ...\n".as_bytes()).await?;
                stdout.flush().await?;
                match agent.submit_turn(&mut state, &text).await {
                    TurnOutcome::Replied(reply) => reply,
                    TurnOutcome::Failed(error) => format!("Ошибка: {}", error),
                }
            }
        };

        stdout.write_all(format!("{}\n", output).as_bytes()).await?;
    }

    Ok(())
}
