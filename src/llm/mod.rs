pub mod chat;
pub mod reply;

use std::error::Error as StdError;
use thiserror::Error;

pub use crate::config::settings::ConfigurationError;

/// Failures of the completion call itself. `Display` keeps the underlying message.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{}", error_chain(.0))]
    Transport(#[from] reqwest::Error),
    #[error("authorization failed with status {status}: {body}")]
    Auth {
        status: u16,
        body: String,
    },
    #[error("API request failed with status {status}: {body}")]
    Api {
        status: u16,
        body: String,
    },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl CompletionError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, CompletionError::Configuration(_))
    }
}

/// Renders an error with every cause in its `source()` chain, joined by ": ".
///
/// `std::io::Error` hides a wrapped custom error from `source()`, so it is unwrapped here.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut next = next_source(err);
    while let Some(e) = next {
        let text = e.to_string();
        if parts.last().map_or(true, |last| !last.ends_with(&text)) {
            parts.push(text);
        }
        next = next_source(e);
    }
    parts.join(": ")
}

fn next_source<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a (dyn StdError + 'static)> {
    if let Some(inner) = err.downcast_ref::<std::io::Error>().and_then(|io| io.get_ref()) {
        return Some(inner);
    }
    err.source()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, Error)]
    #[error("error sending request for url (http://127.0.0.1:9/api/v2/oauth)")]
    struct Outer(#[source] io::Error);

    #[test]
    fn chain_includes_wrapped_causes() {
        let cause = io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused (os error 111)");
        let text = error_chain(&Outer(cause));
        assert_eq!(
            text,
            "error sending request for url (http://127.0.0.1:9/api/v2/oauth): Connection refused (os error 111)"
        );
    }

    #[test]
    fn single_error_is_unchanged() {
        let err = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(error_chain(&err), "boom");
    }
}
