use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

/// One call to the generative capability.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    /// Stage name; used for logging and for routing scripted responses.
    pub label: String,
    pub system_instruction: String,
    pub user_instruction: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Ask the backend for a JSON document instead of free text.
    pub structured: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("authentication rejected: {0}")]
    Authentication(String),
    #[error("rate limited by backend")]
    RateLimited,
    #[error("generation timed out after {after_secs}s")]
    Timeout { after_secs: u64 },
    #[error("backend returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("backend returned an empty response")]
    EmptyResponse,
    #[error("generative client misconfigured: {0}")]
    Configuration(String),
}

impl GenerationError {
    /// Faults worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited | Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Authentication(_) | Self::EmptyResponse | Self::Configuration(_) => false,
        }
    }
}

/// Opaque text-generation capability: instructions in, raw text out.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T> GenerativeClient for Arc<T>
where
    T: GenerativeClient + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        (**self).invoke(request).await
    }
}

/// Adds a per-call timeout and bounded exponential backoff for transient
/// faults to any backend.
pub struct ResilientClient<C> {
    inner: C,
    timeout: Duration,
    max_retries: u32,
    base_backoff: Duration,
}

impl<C> ResilientClient<C> {
    pub fn new(inner: C, timeout: Duration, max_retries: u32) -> Self {
        Self { inner, timeout, max_retries, base_backoff: Duration::from_millis(500) }
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[async_trait]
impl<C> GenerativeClient for ResilientClient<C>
where
    C: GenerativeClient,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, self.inner.invoke(request)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(GenerationError::Timeout { after_secs: self.timeout.as_secs() }),
            };

            match outcome {
                Ok(text) => return Ok(text),
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        event_name = "generation.retry",
                        backend = self.inner.name(),
                        label = %request.label,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "transient generation failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

type Responder = dyn Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync;

/// In-process backend driven by a closure. Records every request it sees.
#[derive(Clone)]
pub struct ScriptedClient {
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl ScriptedClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Self { responder: Arc::new(responder), calls: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Answers each label with a fixed text; unknown labels fail.
    pub fn by_label<I, L, T>(responses: I) -> Self
    where
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: Into<String>,
    {
        let responses = responses
            .into_iter()
            .map(|(label, text)| (label.into(), text.into()))
            .collect::<HashMap<String, String>>();
        Self::new(move |request| {
            responses.get(&request.label).cloned().ok_or_else(|| {
                GenerationError::Configuration(format!(
                    "no scripted response for `{}`",
                    request.label
                ))
            })
        })
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|request| request.label).collect()
    }
}

#[async_trait]
impl GenerativeClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }
        (self.responder)(request)
    }
}
