use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{field_id_from_label, CandidateField, FieldExtractor};
use crate::error::AgentError;

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_warn};

pub const API_KEY_ENV: &str = "NOTELINK_VISION_API_KEY";

const SYSTEM_PROMPT: &str = "You read screenshots of clinical documentation software. \
Return only JSON: an array of objects with keys id (snake_case), label, value, type \
(text, date, number or list) and confidence (0 to 1). Omit fields that are empty on screen.";

/// OpenAI-compatible chat-completions backend with image input.
#[derive(Debug, Clone)]
pub struct VisionExtractor {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl VisionExtractor {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: std::env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty()),
        })
    }

    fn request_body(&self, image: &[u8], hint: Option<&str>) -> Value {
        let instruction = match hint {
            Some(hint) => format!("Extract every labelled field from this {hint}."),
            None => "Extract every labelled field from this screen.".to_string(),
        };
        json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": instruction },
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:image/png;base64,{}", BASE64.encode(image)) }
                        }
                    ]
                }
            ]
        })
    }

    async fn complete(&self, image: &[u8], hint: Option<&str>) -> Result<String, AgentError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&self.request_body(image, hint));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log_warn!("vision endpoint returned {status}");
            return Err(AgentError::ExternalService(format!(
                "vision endpoint returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let reply: ChatCompletion = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AgentError::ExternalService("vision reply had no content".to_string()))
    }
}

#[async_trait]
impl FieldExtractor for VisionExtractor {
    async fn extract(&self, image: &[u8], hint: Option<&str>) -> Result<Vec<CandidateField>, AgentError> {
        let content = self.complete(image, hint).await?;
        let fields = parse_field_reply(&content)?;
        log_debug!("vision backend returned {} candidate fields", fields.len());
        Ok(fields)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default, rename = "type")]
    field_type: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Accepts a bare array, `{"fields": [...]}`, and either wrapped in a
/// markdown code fence.
pub fn parse_field_reply(content: &str) -> Result<Vec<CandidateField>, AgentError> {
    let body = strip_code_fence(content);
    let parsed: Value = serde_json::from_str(body)
        .map_err(|err| AgentError::ExternalService(format!("vision reply is not JSON: {err}")))?;

    let items = match parsed {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("fields") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(AgentError::ExternalService(
                    "vision reply has no field list".to_string(),
                ))
            }
        },
        _ => {
            return Err(AgentError::ExternalService(
                "vision reply has no field list".to_string(),
            ))
        }
    };

    let mut fields = Vec::with_capacity(items.len());
    for item in items {
        let raw: RawField = match serde_json::from_value(item) {
            Ok(raw) => raw,
            Err(err) => {
                log_warn!("skipping malformed vision field: {err}");
                continue;
            }
        };
        if let Some(field) = candidate_from_raw(raw) {
            fields.push(field);
        }
    }
    Ok(fields)
}

fn candidate_from_raw(raw: RawField) -> Option<CandidateField> {
    let label = raw.label.unwrap_or_default().trim().to_string();
    let id = raw
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| field_id_from_label(&label));
    if id.is_empty() {
        return None;
    }

    let value = match raw.value {
        Value::String(text) => text,
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    };

    let confidence = raw
        .confidence
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 1.0))
        .unwrap_or(0.0);

    Some(CandidateField {
        label: if label.is_empty() { id.clone() } else { label },
        id,
        value,
        field_type: raw.field_type,
        confidence,
    })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array() {
        let reply = r#"[{"id":"patient_name","label":"Patient Name","value":"John Smith","type":"text","confidence":0.93}]"#;
        let fields = parse_field_reply(reply).expect("parse");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].id, "patient_name");
        assert_eq!(fields[0].field_type.as_deref(), Some("text"));
        assert!((fields[0].confidence - 0.93).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_fenced_object_and_fills_missing_ids() {
        let reply = "```json\n{\"fields\": [{\"label\": \"Blood Pressure\", \"value\": \"120/80\", \"confidence\": 0.8}]}\n```";
        let fields = parse_field_reply(reply).expect("parse");
        assert_eq!(fields[0].id, "blood_pressure");
        assert_eq!(fields[0].value, "120/80");
    }

    #[test]
    fn list_values_are_joined_and_confidence_clamped() {
        let reply = r#"[{"id":"medications","label":"Medications","value":["Metformin","Ramipril"],"confidence":1.7}]"#;
        let fields = parse_field_reply(reply).expect("parse");
        assert_eq!(fields[0].value, "Metformin\nRamipril");
        assert_eq!(fields[0].confidence, 1.0);
    }

    #[test]
    fn missing_confidence_falls_below_any_threshold() {
        let reply = r#"[{"id":"notes","label":"Notes","value":"seen today"}]"#;
        let fields = parse_field_reply(reply).expect("parse");
        assert_eq!(fields[0].confidence, 0.0);
    }

    #[test]
    fn non_json_reply_is_an_external_service_error() {
        let err = parse_field_reply("I could not read the screen.").expect_err("not json");
        assert!(matches!(err, AgentError::ExternalService(_)));
    }

    #[test]
    fn request_embeds_image_as_data_url() {
        let extractor = VisionExtractor::new("http://localhost:1/v1/chat/completions", "vision-model", 5)
            .expect("build client");
        let body = extractor.request_body(b"png", Some("clinical note"));
        assert_eq!(body["model"], "vision-model");
        let url = body["messages"][1]["content"][1]["image_url"]["url"]
            .as_str()
            .expect("image url");
        assert_eq!(url, "data:image/png;base64,cG5n");
        let text = body["messages"][1]["content"][0]["text"].as_str().expect("text");
        assert!(text.contains("clinical note"));
    }
}
