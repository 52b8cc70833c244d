//! HTTP-backed generative model provider
//!
//! Speaks a part-list JSON dialect over HTTPS: inline images are base64
//! encoded into the request body, and the response's candidate parts are
//! scanned back into [`ContentPart`] values. Transport failures and
//! non-success statuses surface as retryable errors; response bodies are
//! never leaked into user-facing messages.

use crate::backends::{ContentPart, GenerativeModel, ModelRequest, ModelResponse};
use crate::error::{MaskGuardError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default request timeout for generation calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP provider for a single model endpoint
#[derive(Debug, Clone)]
pub struct HttpGenerativeModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpGenerativeModel {
    /// Create a provider for the given endpoint and model id
    ///
    /// # Errors
    /// - Failed to create the HTTP client
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MaskGuardError::network_error("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Create a provider reusing an existing client (shared connection pool)
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: &str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl GenerativeModel for HttpGenerativeModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let body = WireRequest::from_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                MaskGuardError::network_error(
                    format!("Failed to reach model '{}'", self.model),
                    e,
                )
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            MaskGuardError::network_error("Failed to read model response body", e)
        })?;

        if !status.is_success() {
            log::warn!("model '{}' returned HTTP {}", self.model, status);
            log::debug!(
                "upstream error body: {}",
                String::from_utf8_lossy(&bytes.slice(..bytes.len().min(512)))
            );
            return Err(MaskGuardError::upstream(format!(
                "model '{}' returned HTTP {status}",
                self.model
            )));
        }

        let wire: WireResponse = serde_json::from_slice(&bytes).map_err(|e| {
            MaskGuardError::upstream(format!(
                "model '{}' returned an unparseable response: {e}",
                self.model
            ))
        })?;

        wire.into_response()
    }
}

// Wire types. These stay private: the pipeline only ever sees the
// part-list contract.

#[derive(Debug, Serialize)]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(rename = "generationConfig")]
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContent {
    parts: Vec<WirePart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<WireInlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct WireGenerationConfig {
    temperature: f32,
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<&'static str>,
    #[serde(rename = "imageSize", skip_serializing_if = "Option::is_none")]
    image_size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireContent>,
}

impl WireRequest {
    fn from_request(request: &ModelRequest) -> Self {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => WirePart {
                    text: Some(text.clone()),
                    inline_data: None,
                },
                ContentPart::InlineImage { mime_type, data } => WirePart {
                    text: None,
                    inline_data: Some(WireInlineData {
                        mime_type: mime_type.clone(),
                        data: BASE64.encode(data),
                    }),
                },
            })
            .collect();

        Self {
            contents: vec![WireContent { parts }],
            generation_config: WireGenerationConfig {
                temperature: request.params.temperature,
                response_modalities: vec!["TEXT", "IMAGE"],
                image_size: request.params.size_hint.map(|(w, h)| format!("{w}x{h}")),
            },
        }
    }
}

impl WireResponse {
    fn into_response(self) -> Result<ModelResponse> {
        let mut parts = Vec::new();
        for candidate in self.candidates {
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                if let Some(text) = part.text {
                    parts.push(ContentPart::Text(text));
                }
                if let Some(inline) = part.inline_data {
                    let data = BASE64.decode(inline.data.as_bytes()).map_err(|e| {
                        MaskGuardError::upstream(format!(
                            "model returned undecodable inline data: {e}"
                        ))
                    })?;
                    parts.push(ContentPart::InlineImage {
                        mime_type: inline.mime_type,
                        data,
                    });
                }
            }
        }
        Ok(ModelResponse { parts })
    }
}
