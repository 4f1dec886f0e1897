use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use log::{ info, warn };

use crate::models::chat::{ SamplingParams, AVAILABLE_MODELS };

const ASSISTANT_FALLBACK: &str =
    "Ты умный и лаконичный ассистент. Отвечай чётко и по сути, \
     используя понятные формулировки и по возможности примеры.";

const CODER_FALLBACK: &str =
    "Ты опытный разработчик. Объясняй решение кратко, приводя примеры кода \
     и минимально необходимую теорию.";

const ANALYST_FALLBACK: &str =
    "Ты бизнес-аналитик. Отвечай структурированно, выделяй ключевые тезисы, \
     делай короткие выводы и рекомендации.";

/// Built-in modes in display order: (mode name, prompt file, fallback text).
const BUILTIN_MODES: [(&str, &str, &str); 3] = [
    ("Ассистент", "Assistent.txt", ASSISTANT_FALLBACK),
    ("Кодер", "Coder.txt", CODER_FALLBACK),
    ("Аналитик", "Analyst.txt", ANALYST_FALLBACK),
];

#[derive(Debug)]
pub enum PromptError {
    EmptyRegistry,
    IoError(std::io::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::EmptyRegistry => write!(f, "Mode registry must contain at least one mode"),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    pub name: String,
    pub system_prompt: String,
}

/// Read-only table of modes plus the defaults every new session starts from.
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    modes: Vec<Mode>,
    pub default_params: SamplingParams,
    pub default_model: String,
}

fn read_prompt(path: &Path) -> Result<String, PromptError> {
    let text = fs::read_to_string(path)?;
    Ok(text.trim().to_string())
}

impl ModeRegistry {
    pub fn new(modes: Vec<Mode>) -> Result<Self, PromptError> {
        if modes.is_empty() {
            return Err(PromptError::EmptyRegistry);
        }
        Ok(Self {
            modes,
            default_params: SamplingParams::default(),
            default_model: AVAILABLE_MODELS[0].to_string(),
        })
    }

    /// Loads every built-in mode's prompt from `dir`, falling back to the built-in text
    /// for any file that is missing or unreadable.
    pub fn load<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        let modes = BUILTIN_MODES.iter()
            .map(|(name, file, fallback)| {
                let path = dir.join(file);
                let system_prompt = match read_prompt(&path) {
                    Ok(text) => {
                        info!("Loaded prompt for mode '{}' from {}", name, path.display());
                        text
                    }
                    Err(e) => {
                        warn!(
                            "Using built-in prompt for mode '{}' ({}: {})",
                            name,
                            path.display(),
                            e
                        );
                        fallback.trim().to_string()
                    }
                };
                Mode { name: name.to_string(), system_prompt }
            })
            .collect();

        Self {
            modes,
            default_params: SamplingParams::default(),
            default_model: AVAILABLE_MODELS[0].to_string(),
        }
    }

    pub fn builtin() -> Self {
        let modes = BUILTIN_MODES.iter()
            .map(|(name, _, fallback)| Mode {
                name: name.to_string(),
                system_prompt: fallback.trim().to_string(),
            })
            .collect();

        Self {
            modes,
            default_params: SamplingParams::default(),
            default_model: AVAILABLE_MODELS[0].to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn get(&self, name: &str) -> Option<&Mode> {
        self.modes.iter().find(|m| m.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn first(&self) -> &Mode {
        // constructors guarantee at least one mode
        &self.modes[0]
    }

    /// Returns the named mode, or the first mode when the name is unknown.
    pub fn resolve(&self, name: &str) -> &Mode {
        self.get(name).unwrap_or_else(|| self.first())
    }

    pub fn names(&self) -> Vec<&str> {
        self.modes.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }
}
