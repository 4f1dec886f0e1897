use std::collections::HashMap;
use std::fs;
use std::path::{ Path, PathBuf };
use log::{ info, warn };
use thiserror::Error;

use crate::models::chat::AVAILABLE_MODELS;

pub const CREDENTIALS: &str = "credentials";
pub const SCOPE: &str = "scope";
pub const MODEL: &str = "model";
pub const CA_BUNDLE_FILE: &str = "ca_bundle_file";
pub const AUTH_URL: &str = "auth_url";
pub const BASE_URL: &str = "base_url";

const KEYS: [&str; 6] = [CREDENTIALS, SCOPE, MODEL, CA_BUNDLE_FILE, AUTH_URL, BASE_URL];

pub const DEFAULT_AUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
pub const DEFAULT_BASE_URL: &str = "https://gigachat.devices.sberbank.ru";

/// Secrets files keep provider settings under this table.
const SECRETS_TABLE: &str = "gigachat";

/// One configuration source as plain key/value pairs.
pub type ConfigLayer = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(
        "GigaChat parameter '{0}' is not set. Provide it in the secrets file [gigachat] table or via environment variables."
    )]
    MissingField(&'static str),
    #[error("Failed to load CA bundle '{path}': {reason}")]
    CaBundle {
        path: PathBuf,
        reason: String,
    },
    #[error("GigaChat SSL certificate verification failed. Check ca_bundle_file='{path}': {reason}")]
    TlsVerification {
        path: PathBuf,
        reason: String,
    },
    #[error("Failed to parse secrets file '{path}': {reason}")]
    Secrets {
        path: PathBuf,
        reason: String,
    },
}

/// Merges layers in priority order: for each key the first non-empty value wins.
pub fn merge_layers(layers: &[ConfigLayer]) -> ConfigLayer {
    let mut merged = ConfigLayer::new();
    for layer in layers {
        for (key, value) in layer {
            if value.trim().is_empty() || merged.contains_key(key) {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Builds the environment layer from `GIGACHAT_<KEY>` variables.
pub fn env_layer_from<I>(vars: I) -> ConfigLayer where I: IntoIterator<Item = (String, String)> {
    let wanted: HashMap<String, &str> = KEYS.iter()
        .map(|key| (format!("GIGACHAT_{}", key.to_uppercase()), *key))
        .collect();

    vars.into_iter()
        .filter_map(|(name, value)| wanted.get(&name).map(|key| (key.to_string(), value)))
        .collect()
}

pub fn env_layer() -> ConfigLayer {
    env_layer_from(std::env::vars())
}

/// Reads the `[gigachat]` table of a TOML secrets file. A missing file is an empty layer.
pub fn secrets_layer<P: AsRef<Path>>(path: P) -> Result<ConfigLayer, ConfigurationError> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No secrets file at {}, using environment only", path.display());
            return Ok(ConfigLayer::new());
        }
        Err(e) => {
            return Err(ConfigurationError::Secrets {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };
    secrets_layer_from_str(&content).map_err(|reason| ConfigurationError::Secrets {
        path: path.to_path_buf(),
        reason,
    })
}

fn secrets_layer_from_str(content: &str) -> Result<ConfigLayer, String> {
    let root: toml::Table = content.parse().map_err(|e: toml::de::Error| e.to_string())?;
    let Some(table) = root.get(SECRETS_TABLE).and_then(|v| v.as_table()) else {
        return Ok(ConfigLayer::new());
    };

    let mut layer = ConfigLayer::new();
    for key in KEYS {
        match table.get(key) {
            Some(toml::Value::String(s)) => {
                layer.insert(key.to_string(), s.clone());
            }
            Some(other) => {
                warn!("Ignoring non-string secrets value for '{}': {}", key, other);
            }
            None => {}
        }
    }
    Ok(layer)
}

/// Provider settings after layering. `credentials` and `scope` may still be empty here;
/// the client checks them before any request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub credentials: Option<String>,
    pub scope: Option<String>,
    pub model: String,
    pub ca_bundle_file: Option<PathBuf>,
    pub auth_url: String,
    pub base_url: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::from_layer(&ConfigLayer::new())
    }
}

impl ProviderSettings {
    pub fn from_layer(layer: &ConfigLayer) -> Self {
        let get = |key: &str| {
            layer
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            credentials: get(CREDENTIALS),
            scope: get(SCOPE),
            model: get(MODEL).unwrap_or_else(|| AVAILABLE_MODELS[0].to_string()),
            ca_bundle_file: get(CA_BUNDLE_FILE).map(PathBuf::from),
            auth_url: get(AUTH_URL).unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            base_url: get(BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// Secrets file first, then process environment.
    pub fn resolve(secrets_path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut layers = Vec::with_capacity(2);
        if let Some(path) = secrets_path {
            layers.push(secrets_layer(path)?);
        }
        layers.push(env_layer());
        Ok(Self::from_layer(&merge_layers(&layers)))
    }

    pub fn require_credentials(&self) -> Result<(&str, &str), ConfigurationError> {
        let credentials = self.credentials
            .as_deref()
            .ok_or(ConfigurationError::MissingField(CREDENTIALS))?;
        let scope = self.scope.as_deref().ok_or(ConfigurationError::MissingField(SCOPE))?;
        Ok((credentials, scope))
    }
}
