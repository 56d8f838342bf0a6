//! Health probes.
//!
//! # Responsibilities
//! - Issue one GET to a service's health endpoint
//! - Enforce the probe deadline
//! - Classify the result as a [`HealthCheckOutcome`]
//!
//! # Design Decisions
//! - A probe never returns an error to its caller; failures are outcomes
//! - The HTTP status code is not consulted, only the body (a 503 with a
//!   well-formed DOWN payload is a reported DOWN, not a transport failure)
//! - [`HealthProbe`] is the seam the breaker is tested through

use std::error::Error as _;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;

use crate::config::ServiceDescriptor;
use crate::health::payload::{HealthCheckOutcome, HealthPayload};
use crate::resilience::timeouts::{with_timeout, TimeoutError};

const USER_AGENT: &str = concat!("service-breaker/", env!("CARGO_PKG_VERSION"));

/// Longest body excerpt kept in an [`ProbeError::InvalidPayload`] message.
const BODY_EXCERPT_LEN: usize = 200;

/// Why a probe produced no usable payload.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum ProbeError {
    #[error("Health check request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Invalid JSON response: {0}")]
    InvalidPayload(String),

    #[error("Invalid health endpoint URL: {0}")]
    InvalidUrl(String),
}

impl ProbeError {
    pub fn label(&self) -> &'static str {
        match self {
            ProbeError::Timeout { .. } => "timeout",
            ProbeError::Transport(_) => "transport",
            ProbeError::InvalidPayload(_) => "invalid_payload",
            ProbeError::InvalidUrl(_) => "invalid_url",
        }
    }

    fn from_reqwest(e: reqwest::Error, deadline: Duration) -> Self {
        if e.is_timeout() {
            return ProbeError::Timeout {
                after_ms: deadline.as_millis() as u64,
            };
        }
        // reqwest's top-level message hides the root cause (refused, dns, ...)
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        ProbeError::Transport(message)
    }
}

/// Something that can check a service's health once.
pub trait HealthProbe: Send + Sync {
    fn probe<'a>(&'a self, service: &'a ServiceDescriptor) -> BoxFuture<'a, HealthCheckOutcome>;
}

/// HTTP(S) probe backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a probe with the given hard deadline per request.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .no_proxy()
            .build()?;
        Ok(Self { client, timeout })
    }

    async fn fetch(&self, service: &ServiceDescriptor) -> Result<HealthPayload, ProbeError> {
        let url = service
            .health_url()
            .map_err(|e| ProbeError::InvalidUrl(e.to_string()))?;

        let request = async {
            let response = self.client.get(url).send().await?;
            Ok::<_, reqwest::Error>(response.bytes().await?)
        };

        let body = match with_timeout(self.timeout, request).await {
            Ok(body) => body,
            Err(TimeoutError::Elapsed(d)) => {
                return Err(ProbeError::Timeout {
                    after_ms: d.as_millis() as u64,
                })
            }
            Err(TimeoutError::Inner(e)) => return Err(ProbeError::from_reqwest(e, self.timeout)),
        };

        serde_json::from_slice(&body).map_err(|_| ProbeError::InvalidPayload(excerpt(&body)))
    }
}

impl HealthProbe for HttpProbe {
    fn probe<'a>(&'a self, service: &'a ServiceDescriptor) -> BoxFuture<'a, HealthCheckOutcome> {
        Box::pin(async move {
            match self.fetch(service).await {
                Ok(payload) => HealthCheckOutcome::Reported(payload),
                Err(e) => HealthCheckOutcome::Failed(e),
            }
        })
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.into_owned(),
    }
}
