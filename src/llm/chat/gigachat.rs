use async_trait::async_trait;
use chrono::Utc;
use log::{ debug, info };
use reqwest::{ Certificate, Client as HttpClient, header::{ ACCEPT, AUTHORIZATION } };
use rustls_pemfile::certs;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{ Mutex, OnceCell };
use uuid::Uuid;

use super::{ build_wire_messages, ChatClient, ChatRequest, WireMessage };
use crate::config::settings::{ ConfigurationError, ProviderSettings };
use crate::llm::{ error_chain, CompletionError, ProviderError };

const CHAT_ROUTE: &str = "/api/v1/chat/completions";
const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(5);
/// Tokens are refreshed this long before the provider-reported expiry.
const TOKEN_EXPIRY_MARGIN_MS: i64 = 60_000;

pub struct GigaChatClient {
    settings: ProviderSettings,
    http: OnceCell<HttpClient>,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Deserialize, Debug, Clone)]
struct AccessToken {
    access_token: String,
    /// Milliseconds since the Unix epoch.
    expires_at: i64,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_at - TOKEN_EXPIRY_MARGIN_MS > Utc::now().timestamp_millis()
    }
}

#[derive(Serialize)]
struct GigaChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct GigaChatResponse {
    choices: Vec<GigaChatChoice>,
}

#[derive(Deserialize)]
struct GigaChatChoice {
    message: GigaChatMessage,
}

#[derive(Deserialize)]
struct GigaChatMessage {
    content: String,
}

fn load_ca_bundle(path: &Path) -> Result<Vec<Certificate>, ConfigurationError> {
    let bundle_error = |reason: String| ConfigurationError::CaBundle {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(path).map_err(|e| bundle_error(e.to_string()))?;
    let mut reader = BufReader::new(bytes.as_slice());
    let pem_certs = certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| bundle_error(format!("Failed to read certificate(s): {}", e)))?;

    if pem_certs.is_empty() {
        // Not PEM: the file is a single DER-encoded certificate.
        let cert = Certificate::from_der(&bytes).map_err(|e| bundle_error(error_chain(&e)))?;
        return Ok(vec![cert]);
    }

    pem_certs
        .iter()
        .map(|der| Certificate::from_der(der.as_ref()).map_err(|e| bundle_error(error_chain(&e))))
        .collect()
}

/// True when a cause of `err` is a rustls handshake or certificate failure.
///
/// The top-level reqwest error is not inspected: its message only carries the URL.
fn is_tls_error(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if e.is::<rustls::Error>() {
            return true;
        }
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.get_ref().is_some_and(|inner| inner.is::<rustls::Error>()) {
                return true;
            }
        }
        if e.to_string().contains("invalid peer certificate") {
            return true;
        }
        source = e.source();
    }
    false
}

impl GigaChatClient {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            settings,
            http: OnceCell::new(),
            token: Mutex::new(None),
        }
    }

    async fn http(&self) -> Result<&HttpClient, ConfigurationError> {
        self.http.get_or_try_init(|| self.build_http()).await
    }

    async fn build_http(&self) -> Result<HttpClient, ConfigurationError> {
        let mut builder = HttpClient::builder().use_rustls_tls();

        if let Some(path) = &self.settings.ca_bundle_file {
            info!("Using CA bundle from '{}'", path.display());
            for cert in load_ca_bundle(path)? {
                builder = builder.add_root_certificate(cert);
            }
        }

        let http = builder.build().map_err(|e| ConfigurationError::CaBundle {
            path: self.settings.ca_bundle_file.clone().unwrap_or_default(),
            reason: error_chain(&e),
        })?;

        if let Some(path) = &self.settings.ca_bundle_file {
            self.preflight(&http, path).await?;
        }

        Ok(http)
    }

    /// Checks that the provider's certificate validates against the configured bundle.
    /// Only certificate failures are reported; other errors surface on the real call.
    async fn preflight(&self, http: &HttpClient, bundle: &Path) -> Result<(), ConfigurationError> {
        match http.get(&self.settings.base_url).timeout(PREFLIGHT_TIMEOUT).send().await {
            Ok(resp) => {
                debug!("TLS pre-flight to {} answered {}", self.settings.base_url, resp.status());
                Ok(())
            }
            Err(e) if is_tls_error(&e) => {
                Err(ConfigurationError::TlsVerification {
                    path: bundle.to_path_buf(),
                    reason: error_chain(&e),
                })
            }
            Err(e) => {
                debug!("Ignoring non-TLS pre-flight error: {}", error_chain(&e));
                Ok(())
            }
        }
    }

    async fn access_token(
        &self,
        http: &HttpClient,
        credentials: &str,
        scope: &str
    ) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        debug!("Requesting GigaChat access token for scope {}", scope);
        let resp = http
            .post(&self.settings.auth_url)
            .header(AUTHORIZATION, format!("Basic {}", credentials))
            .header("RqUID", Uuid::new_v4().to_string())
            .header(ACCEPT, "application/json")
            .form(&[("scope", scope)])
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Auth { status: status.as_u16(), body });
        }

        let token = resp
            .json::<AccessToken>().await
            .map_err(|e| ProviderError::MalformedResponse(format!("token response: {}", error_chain(&e))))?;
        let value = token.access_token.clone();
        *cached = Some(token);
        Ok(value)
    }
}

#[async_trait]
impl ChatClient for GigaChatClient {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, CompletionError> {
        let (credentials, scope) = self.settings.require_credentials()?;
        let http = self.http().await?;
        let token = self.access_token(http, credentials, scope).await?;

        let url = format!("{}{}", self.settings.base_url.trim_end_matches('/'), CHAT_ROUTE);
        let body = GigaChatRequest {
            model: request.model_name,
            messages: build_wire_messages(request.system_prompt, request.transcript),
            temperature: request.params.temperature,
            max_tokens: request.params.max_tokens,
        };
        debug!(
            "Sending {} message(s) to {} (model={}, temperature={}, max_tokens={})",
            body.messages.len(),
            url,
            body.model,
            body.temperature,
            body.max_tokens
        );

        let resp = http
            .post(&url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send().await
            .map_err(ProviderError::from)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = if status == reqwest::StatusCode::UNAUTHORIZED {
                *self.token.lock().await = None;
                ProviderError::Auth { status: status.as_u16(), body }
            } else {
                ProviderError::Api { status: status.as_u16(), body }
            };
            return Err(err.into());
        }

        let data = resp
            .json::<GigaChatResponse>().await
            .map_err(|e| ProviderError::MalformedResponse(error_chain(&e)))?;

        data.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("response has no choices".into()).into())
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.settings.base_url.clone())
    }
}
