//! Remote pinning of content-addressed files
//!
//! Best-effort maintenance task: every file with a content address is
//! submitted to the configured pinning service. An "already pinned"
//! duplicate counts as success; any other failure is reported to the
//! caller but must not abort the remaining pins. No retries.

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Client for a Pinata-compatible pinning endpoint.
pub struct PinClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

/// How a single pin request concluded successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    Pinned,
    AlreadyPinned,
}

#[derive(Serialize)]
struct PinRequest<'a> {
    cid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl PinClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    /// Request persistence of one content address.
    pub async fn pin(&self, cid: &str, name: Option<&str>) -> Result<PinOutcome, PinError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&PinRequest { cid, name })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(PinOutcome::Pinned);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && is_duplicate(&body) {
            return Ok(PinOutcome::AlreadyPinned);
        }
        Err(PinError::Upstream {
            cid: cid.to_string(),
            status,
            body,
        })
    }
}

fn is_duplicate(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/reason")
                .and_then(|reason| reason.as_str())
                .map(|reason| reason == "DUPLICATE_OBJECT")
        })
        .unwrap_or(false)
}

/// Errors from a single pin request
#[derive(Debug, Error)]
pub enum PinError {
    #[error("pin request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("pinning service returned {status} for {cid}: {body}")]
    Upstream {
        cid: String,
        status: StatusCode,
        body: String,
    },
}
