// HTTP transport to the scoring/generation backend.
//
// Performs exactly three remote operations and folds every failure into a
// `TransportError` so nothing from reqwest leaks into the session layer.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::protocol::{
    GeneratedPhrase, PhrasePayload, PhraseRequest, Term, TermPayload, Verdict, VerifyPayload,
    VerifyRequest,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const RANDOM_TERM_PATH: &str = "palavra-aleatoria";
const VERIFY_PATH: &str = "verificar";
const GENERATE_PHRASE_PATH: &str = "gerar-frase";

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Every way a remote call can fail, as seen by the session orchestrator.
///
/// The `Display` text is what the user reads in the feedback panel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("Connection timed out. Check that the backend is running.")]
    Timeout,

    #[error("Could not connect to the server. Check that the backend is running.")]
    Unreachable,

    #[error("No word found in the database.")]
    NotFound,

    #[error(
        "API error ({status}): {}",
        .detail.as_deref().unwrap_or("no detail provided")
    )]
    ServerError { status: u16, detail: Option<String> },

    #[error("Invalid data received from the server: {0}")]
    InvalidPayload(String),
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// The three backend operations the session depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a random term. Fails with `InvalidPayload` unless the term has
    /// both text and a definition.
    async fn fetch_random_term(&self) -> Result<Term, TransportError>;

    /// Score `answer` against `term`. Callers must reject blank answers
    /// before calling.
    async fn verify(&self, term: &str, answer: &str) -> Result<Verdict, TransportError>;

    /// Ask the backend for one more example sentence. Callers must have
    /// checked the quota and that the term id is real.
    async fn generate_phrase(
        &self,
        request: &PhraseRequest,
    ) -> Result<GeneratedPhrase, TransportError>;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// reqwest-backed [`Transport`] with a fixed per-request deadline.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        Self::new(config.base_url.clone(), config.timeout())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Send `request`, classify the outcome, and decode a success body as `T`.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        debug!(operation, "issuing backend request");
        let result = self.send_inner(request).await;
        if let Err(err) = &result {
            warn!(operation, ?err, "backend request failed");
        }
        result
    }

    async fn send_inner<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = request.send().await.map_err(|e| classify_reqwest_error(&e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        if status == StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound);
        }
        if !status.is_success() {
            return Err(TransportError::ServerError {
                status: status.as_u16(),
                detail: extract_detail(&body),
            });
        }

        serde_json::from_slice(&body)
            .map_err(|e| TransportError::InvalidPayload(format!("malformed response: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_random_term(&self) -> Result<Term, TransportError> {
        let request = self.http.get(self.endpoint(RANDOM_TERM_PATH));
        let payload: TermPayload = self.send("fetch_random_term", request).await?;
        let term = Term::try_from(payload).inspect_err(|err| {
            warn!(?err, "rejecting term payload");
        })?;
        debug!(term_id = term.id, "fetched term");
        Ok(term)
    }

    async fn verify(&self, term: &str, answer: &str) -> Result<Verdict, TransportError> {
        let body = VerifyRequest {
            term: term.to_string(),
            answer: answer.to_string(),
        };
        let request = self.http.post(self.endpoint(VERIFY_PATH)).json(&body);
        let payload: VerifyPayload = self.send("verify", request).await?;
        Ok(Verdict::from(payload))
    }

    async fn generate_phrase(
        &self,
        request: &PhraseRequest,
    ) -> Result<GeneratedPhrase, TransportError> {
        let http_request = self.http.post(self.endpoint(GENERATE_PHRASE_PATH)).json(request);
        let payload: PhrasePayload = self.send("generate_phrase", http_request).await?;
        GeneratedPhrase::try_from(payload)
    }
}

// ---------------------------------------------------------------------------
// Classification helpers
// ---------------------------------------------------------------------------

/// Map a reqwest failure onto the taxonomy. Anything that never produced a
/// response (connect, DNS, reset, malformed URL) counts as `Unreachable`.
fn classify_reqwest_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if err.is_decode() {
        return TransportError::InvalidPayload(err.to_string());
    }
    match err.status() {
        Some(StatusCode::NOT_FOUND) => TransportError::NotFound,
        Some(status) => TransportError::ServerError {
            status: status.as_u16(),
            detail: None,
        },
        None => TransportError::Unreachable,
    }
}

/// Pull the backend's `{"detail": ...}` text out of an error body.
///
/// String details are returned as-is; structured ones (validation error
/// lists) are returned as compact JSON.
pub(crate) fn extract_detail(body: &[u8]) -> Option<String> {
    let v: Value = serde_json::from_slice(body).ok()?;
    match v.get("detail")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::String(_) | Value::Null => None,
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
