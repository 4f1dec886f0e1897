use serde::{ Serialize, Deserialize };
use serde_json::{ Map, Value as JsonValue };
use std::fmt;

pub const AVAILABLE_MODELS: [&str; 3] = ["GigaChat-2", "GigaChat-2-Pro", "GigaChat-2-Max"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Maps a stored role string onto the wire role. Anything unrecognised is sent as `user`.
    pub fn coerce(role: &str) -> Role {
        match role {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// One transcript turn. `role` is kept exactly as the caller supplied it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, JsonValue>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            meta: Map::new(),
        }
    }

    pub fn with_meta(mut self, meta: Map<String, JsonValue>) -> Self {
        self.meta = meta;
        self
    }

    pub fn wire_role(&self) -> Role {
        Role::coerce(&self.role)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 8192,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_coerce_to_user() {
        assert_eq!(Role::coerce("tool"), Role::User);
        assert_eq!(Role::coerce(""), Role::User);
        assert_eq!(Role::coerce("Assistant"), Role::User);
        assert_eq!(Role::coerce("assistant"), Role::Assistant);
        assert_eq!(Role::coerce("system"), Role::System);
    }

    #[test]
    fn message_keeps_raw_role() {
        let msg = ChatMessage::new("function", "hi");
        assert_eq!(msg.role, "function");
        assert_eq!(msg.wire_role(), Role::User);
    }

    #[test]
    fn empty_meta_is_not_serialized() {
        let json = serde_json::to_value(ChatMessage::new(Role::User, "x")).unwrap();
        assert!(json.get("meta").is_none());
        assert_eq!(json["role"], "user");
    }
}
