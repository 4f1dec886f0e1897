use serde_json::Value as JsonValue;

/// Outcome of unwrapping a raw model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The reply was an `{"answer": {"user": ...}}` envelope.
    Parsed(String),
    /// Anything else; carries the raw text unchanged.
    Fallback(String),
}

impl Reply {
    pub fn parse(raw: &str) -> Reply {
        let user_text = serde_json::from_str::<JsonValue>(raw)
            .ok()
            .as_ref()
            .and_then(|root| root.get("answer"))
            .and_then(|answer| answer.get("user"))
            .and_then(|user| user.as_str())
            .filter(|text| !text.is_empty())
            .map(str::to_string);

        match user_text {
            Some(text) => Reply::Parsed(text),
            None => Reply::Fallback(raw.to_string()),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Reply::Parsed(text) | Reply::Fallback(text) => text,
        }
    }
}

/// Extracts the user-facing text from a model reply, falling back to the raw text.
pub fn normalize(raw: &str) -> String {
    Reply::parse(raw).into_text()
}
