//! Country classifier backed by an OpenAI-compatible chat completions API.
//!
//! The model is asked to answer with a JSON object of the form
//! `{"results": [{"shortForm", "longForm", "confidence"}, ...]}`, one entry
//! per input address and in the same order.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::classifier::Classifier;
use crate::config::LlmConfig;
use crate::error::ClassifyError;
use crate::types::{ClassificationBatchResponse, ClassificationResult};

const SYSTEM_PROMPT: &str = "You identify the country of postal addresses. \
You receive a JSON array of address strings. Reply with a JSON object \
{\"results\": [...]} containing exactly one entry per input address, in the \
same order. Each entry is {\"shortForm\": ISO 3166-1 alpha-2 code, \
\"longForm\": English country name, \"confidence\": number between 0 and 1}. \
If the country cannot be determined use \"UNKNOWN\" for both names and a \
confidence of 0.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub struct LlmClassifier {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClassifier {
    pub fn new(config: LlmConfig) -> Result<Self, ClassifyError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, http })
    }

    fn completions_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    fn build_request<'a>(&'a self, addresses: &[String]) -> Result<ChatRequest<'a>, ClassifyError> {
        Ok(ChatRequest {
            model: &self.config.model,
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(serde_json::to_string(addresses)?),
                },
            ],
        })
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    #[tracing::instrument(skip(self, addresses), fields(count = addresses.len(), model = %self.config.model))]
    async fn classify(
        &self,
        addresses: &[String],
    ) -> Result<Vec<ClassificationResult>, ClassifyError> {
        let body = self.build_request(addresses)?;

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Classification request failed");
                ClassifyError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, body));
        }

        let text = response.text().await?;
        let results = parse_completion(&text)?;
        tracing::debug!(results = results.len(), "Classification response received");
        Ok(results)
    }
}

fn status_error(status: StatusCode, retry_after: Option<Duration>, body: String) -> ClassifyError {
    match status.as_u16() {
        429 => {
            tracing::debug!(?retry_after, "Provider rate limited the request");
            ClassifyError::RateLimited { retry_after }
        }
        500 | 502 | 503 | 504 => ClassifyError::ServiceUnavailable(format!("HTTP {status}: {body}")),
        _ => ClassifyError::Other(format!("HTTP {status}: {body}")),
    }
}

/// Seconds form of `Retry-After`. HTTP-date, negative and out-of-range values
/// are ignored.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Extracts the model's JSON reply from a chat completion body.
pub(crate) fn parse_completion(body: &str) -> Result<Vec<ClassificationResult>, ClassifyError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ClassifyError::MalformedResponse("response has no message content".into()))?;

    let parsed: ClassificationBatchResponse = serde_json::from_str(strip_code_fence(&content))?;
    Ok(parsed.results)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    fn classifier(server: &MockServer) -> LlmClassifier {
        LlmClassifier::new(LlmConfig {
            api_base: format!("{}/v1/", server.uri()),
            api_key: "sk-test".to_string(),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn addresses() -> Vec<String> {
        vec!["1600 Pennsylvania Avenue NW, Washington, DC 20500".to_string()]
    }

    #[test]
    fn strips_markdown_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }

    #[test]
    fn parse_completion_rejects_non_numeric_confidence() {
        let body = completion(r#"{"results":[{"shortForm":"US","longForm":"United States","confidence":"high"}]}"#);
        assert!(matches!(
            parse_completion(&body.to_string()),
            Err(ClassifyError::MalformedResponse(_))
        ));
    }

    #[test]
    fn parse_completion_requires_content() {
        let body = serde_json::json!({"choices": []});
        assert!(matches!(
            parse_completion(&body.to_string()),
            Err(ClassifyError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn classifies_through_chat_completions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "```json\n{\"results\":[{\"shortForm\":\"US\",\"longForm\":\"United States\",\"confidence\":1.0}]}\n```",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let results = classifier(&server).classify(&addresses()).await.unwrap();
        assert_eq!(results, vec![ClassificationResult::new("US", "United States", 1.0)]);

        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["model"], "test-model");
        assert_eq!(sent["response_format"]["type"], "json_object");
        let user: Vec<String> =
            serde_json::from_str(sent["messages"][1]["content"].as_str().unwrap()).unwrap();
        assert_eq!(user, addresses());
    }

    #[tokio::test]
    async fn maps_429_to_rate_limited_with_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
            .mount(&server)
            .await;

        let err = classifier(&server).classify(&addresses()).await.unwrap_err();
        assert_eq!(
            err,
            ClassifyError::RateLimited {
                retry_after: Some(Duration::from_secs(2))
            }
        );
    }

    #[tokio::test]
    async fn unrepresentable_retry_after_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1e30"))
            .mount(&server)
            .await;

        let err = classifier(&server).classify(&addresses()).await.unwrap_err();
        assert_eq!(err, ClassifyError::RateLimited { retry_after: None });
    }

    #[test]
    fn retry_after_accepts_only_finite_non_negative_seconds() {
        let parse = |value: &str| {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(reqwest::header::RETRY_AFTER, value.parse().unwrap());
            parse_retry_after(&headers)
        };
        assert_eq!(parse(" 1.5 "), Some(Duration::from_millis(1500)));
        assert_eq!(parse("-3"), None);
        assert_eq!(parse("NaN"), None);
        assert_eq!(parse("inf"), None);
        assert_eq!(parse("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[tokio::test]
    async fn maps_503_to_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = classifier(&server).classify(&addresses()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::ServiceUnavailable(msg) if msg.contains("overloaded")));
    }

    #[tokio::test]
    async fn maps_other_client_errors_to_other() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let err = classifier(&server).classify(&addresses()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Other(msg) if msg.starts_with("HTTP 400")));
    }

    #[tokio::test]
    async fn non_json_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("I think it is the US")),
            )
            .mount(&server)
            .await;

        let err = classifier(&server).classify(&addresses()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let server = MockServer::start().await;
        let unreachable = classifier(&server);
        drop(server);

        let err = unreachable.classify(&addresses()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Transport(_)));
    }
}
