// src/services/llm_service.rs
use crate::config::AppConfig;
use crate::errors::AiFailure;
use crate::services::prompt::ModelRequest;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

/// "Given an image and a prompt, return text." One attempt, no retries.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<String, AiFailure>;

    fn model_name(&self) -> &str;
}

/// Gemini `generateContent` over REST.
pub struct LLMService {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl LLMService {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Self {
        Self {
            api_key,
            model,
            base_url,
            timeout,
            client: Client::new(),
        }
    }

    /// `None` when no credential is configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        config.gemini_api_key.clone().map(|key| {
            Self::new(
                key,
                config.gemini_model.clone(),
                config.gemini_base_url.clone(),
                config.ai_timeout,
            )
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl VisionModel for LLMService {
    async fn generate(&self, request: &ModelRequest) -> Result<String, AiFailure> {
        if self.api_key.is_empty() {
            return Err(AiFailure::MissingCredential);
        }

        let base64_image = general_purpose::STANDARD.encode(&request.image);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": request.prompt },
                        {
                            "inline_data": {
                                "mime_type": request.media_type,
                                "data": base64_image
                            }
                        }
                    ]
                }],
                "generationConfig": {
                    "temperature": 0.2,
                    "maxOutputTokens": 1024
                }
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiFailure::Timeout(self.timeout.as_millis() as u64)
                } else {
                    AiFailure::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, error_text));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| AiFailure::InvalidPayload(e.to_string()))?;

        extract_text(&result)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn classify_error(status: StatusCode, body: String) -> AiFailure {
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        return AiFailure::Quota(body);
    }
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || body.contains("API_KEY_INVALID")
    {
        return AiFailure::InvalidCredential(body);
    }
    AiFailure::Rejected {
        status: status.as_u16(),
        body,
    }
}

/// Joins the text parts of the first candidate.
fn extract_text(result: &Value) -> Result<String, AiFailure> {
    if let Some(reason) = result["promptFeedback"]["blockReason"].as_str() {
        return Err(AiFailure::Refused(reason.to_string()));
    }

    let candidate = result["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| AiFailure::Refused("no candidates returned".to_string()))?;

    let text = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    match candidate["finishReason"].as_str() {
        Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
            Err(AiFailure::Refused(reason.to_string()))
        }
        _ => Err(AiFailure::EmptyResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [ { "text": "RISK_LEVEL: High" }, { "text": "ELEVATION: 3 m" } ] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(extract_text(&body).unwrap(), "RISK_LEVEL: High\nELEVATION: 3 m");
    }

    #[test]
    fn blocked_prompts_are_refusals() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert_eq!(
            extract_text(&body).unwrap_err(),
            AiFailure::Refused("SAFETY".to_string())
        );

        let body = json!({ "candidates": [{ "content": { "parts": [] }, "finishReason": "SAFETY" }] });
        assert!(matches!(extract_text(&body), Err(AiFailure::Refused(_))));
    }

    #[test]
    fn blank_text_is_an_empty_response() {
        let body = json!({ "candidates": [{ "content": { "parts": [ { "text": "  \n" } ] } }] });
        assert_eq!(extract_text(&body).unwrap_err(), AiFailure::EmptyResponse);
        assert!(matches!(
            extract_text(&json!({})),
            Err(AiFailure::Refused(_))
        ));
    }

    #[test]
    fn http_errors_are_classified() {
        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
            AiFailure::Quota(_)
        ));
        assert!(matches!(
            classify_error(
                StatusCode::BAD_REQUEST,
                r#"{"error":{"status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#.to_string()
            ),
            AiFailure::InvalidCredential(_)
        ));
        assert_eq!(
            classify_error(StatusCode::BAD_GATEWAY, "upstream".to_string()),
            AiFailure::Rejected {
                status: 502,
                body: "upstream".to_string()
            }
        );
    }

    #[test]
    fn no_service_without_credential() {
        let config = AppConfig::from_lookup(|_| None);
        assert!(LLMService::from_config(&config).is_none());

        let config = AppConfig::from_lookup(|key| (key == "GEMINI_API_KEY").then(|| "k".to_string()));
        let service = LLMService::from_config(&config).unwrap();
        assert_eq!(service.model_name(), crate::config::DEFAULT_MODEL);
        assert!(service.endpoint().ends_with(":generateContent"));
    }

    #[actix_web::test]
    async fn unreachable_endpoint_is_a_transport_failure() {
        let service = LLMService::new(
            "key".to_string(),
            "test-model".to_string(),
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(2),
        );
        let request = crate::services::prompt::PromptBuilder::build(
            bytes::Bytes::from_static(b"img"),
            "image/png",
        );
        let err = service.generate(&request).await.unwrap_err();
        assert!(matches!(err, AiFailure::Transport(_) | AiFailure::Timeout(_)));
    }
}
