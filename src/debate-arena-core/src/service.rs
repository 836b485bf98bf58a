//! Client for the remote debate generation service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clip_store::DebateResponse;
use crate::config::ServiceConfig;
use crate::error::{CatalogError, GenerationError};
use crate::generation::GenerationRequest;
use crate::voices::Voice;

/// The generation service as seen by the pipeline.
#[async_trait]
pub trait DebateService: Send + Sync {
    /// Submit a validated request and return the raw response.
    async fn generate(&self, request: &GenerationRequest)
    -> Result<DebateResponse, GenerationError>;
}

/// JSON body of `POST /api/debate`.
#[derive(Debug, Clone, Serialize)]
pub struct DebateRequestBody<'a> {
    pub topic: &'a str,
    pub persona_a: &'a str,
    pub persona_b: &'a str,
    pub turns: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humor_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_a_voice_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_b_voice_id: Option<&'a str>,
}

impl<'a> From<&'a GenerationRequest> for DebateRequestBody<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        Self {
            topic: request.topic(),
            persona_a: &request.persona_a().label,
            persona_b: &request.persona_b().label,
            turns: request.turns(),
            humor_mode: request.options().humor_mode,
            persona_a_voice_id: request.persona_a().voice_id.as_deref(),
            persona_b_voice_id: request.persona_b().voice_id.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<Voice>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// HTTP implementation of [`DebateService`].
#[derive(Debug, Clone)]
pub struct HttpDebateService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDebateService {
    pub fn new(base_url: impl Into<String>, config: &ServiceConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch the voice catalog used to pick persona voices.
    pub async fn voices(&self) -> Result<Vec<Voice>, CatalogError> {
        let response = self.client.get(self.url("/api/voices")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
            });
        }

        let body: VoicesResponse = response.json().await?;
        debug!(count = body.voices.len(), "Loaded voice catalog");
        Ok(body.voices)
    }

    /// Whether the service reports itself healthy.
    pub async fn health(&self) -> Result<bool, GenerationError> {
        let response = self.client.get(self.url("/health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        let body: HealthResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        Ok(body.status == "ok")
    }
}

#[async_trait]
impl DebateService for HttpDebateService {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<DebateResponse, GenerationError> {
        info!(
            topic = request.topic(),
            turns = request.turns(),
            "Submitting debate generation request"
        );

        let response = self
            .client
            .post(self.url("/api/debate"))
            .json(&DebateRequestBody::from(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GenerationError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
    }
}
