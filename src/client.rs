//! HTTP client for a running step-battle server.
//!
//! The server owns the record log, so command-line reports go through its
//! API instead of writing the log directly.

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

/// Errors from talking to the server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server rejected report ({status}): {message}")]
    Rejected { status: u16, message: String },
}

pub struct StepsClient {
    client: reqwest::Client,
    base_url: String,
}

impl StepsClient {
    pub fn new(base_url: impl Into<String>, timeout_seconds: u64) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// POST a report to `/steps`. Values are sent as given; the server
    /// validates them.
    pub async fn report(&self, uuid: &str, prefecture_id: i64, steps: i64) -> Result<(), ClientError> {
        let url = format!("{}/steps", self.base_url);
        debug!("Posting report for {} to {}", uuid, url);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "uuid": uuid,
                "prefectureId": prefecture_id,
                "steps": steps,
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body["error"]["message"]
            .as_str()
            .unwrap_or("unknown error")
            .to_string();

        Err(ClientError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
