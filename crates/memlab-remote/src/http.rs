//! HTTP backend for the memlab problem, evaluation and session services.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::instrument;

use memlab_core::model::{Game, Problem};
use memlab_core::traits::{
    EvaluateRequest, EvaluateResponse, Evaluator, ProblemSource, SavePayload, SessionStore,
};

use crate::error::RemoteError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Client for the memlab backend's `/api` endpoints.
pub struct HttpBackend {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let base = if base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base.trim_end_matches('/').to_string(),
            timeout_secs,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the games the backend can generate problems for.
    #[instrument(skip(self))]
    pub async fn list_games(&self) -> anyhow::Result<Vec<Game>> {
        let response = self
            .client
            .get(format!("{}/api/games", self.base_url))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let body = checked_body(response).await?;
        Ok(decode(&body)?)
    }

    fn transport_error(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            RemoteError::NetworkError(format!(
                "memlab backend not reachable at {}",
                self.base_url
            ))
        } else {
            RemoteError::NetworkError(e.to_string())
        }
    }
}

/// Read the body of a response, turning error statuses into [`RemoteError`].
async fn checked_body(response: reqwest::Response) -> Result<String, RemoteError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| RemoteError::NetworkError(format!("failed to read response: {e}")))?;
    if status >= 400 {
        return Err(RemoteError::ApiError {
            status,
            message: body,
        });
    }
    Ok(body)
}

/// Decode a JSON body, recognizing the backend's `{"error": "..."}` replies.
fn decode<T: DeserializeOwned>(body: &str) -> Result<T, RemoteError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| RemoteError::MalformedResponse(format!("invalid JSON: {e}")))?;
    if let Some(message) = value.get("error").and_then(|v| v.as_str()) {
        return Err(RemoteError::ServerError(message.to_string()));
    }
    serde_json::from_value(value).map_err(|e| RemoteError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl ProblemSource for HttpBackend {
    #[instrument(skip(self))]
    async fn fetch_problem(&self, game_id: &str) -> anyhow::Result<Problem> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/problem", self.base_url),
            &[("id", game_id)],
        )
        .map_err(|e| RemoteError::NetworkError(format!("invalid backend URL: {e}")))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let body = checked_body(response).await?;
        Ok(decode(&body)?)
    }
}

#[async_trait]
impl Evaluator for HttpBackend {
    #[instrument(skip(self, request), fields(problem = %request.problem.name))]
    async fn evaluate(&self, request: &EvaluateRequest) -> anyhow::Result<f64> {
        let response = self
            .client
            .post(format!("{}/api/evaluate", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let body = checked_body(response).await?;
        let evaluation: EvaluateResponse = decode(&body)?;
        Ok(evaluation.score)
    }
}

#[async_trait]
impl SessionStore for HttpBackend {
    #[instrument(skip(self, payload), fields(records = payload.records.len()))]
    async fn save(&self, payload: &SavePayload) -> anyhow::Result<()> {
        let response = self
            .client
            .post(format!("{}/api/save", self.base_url))
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        checked_body(response).await?;
        Ok(())
    }
}
