use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

use super::{field_id_from_label, CandidateField, FieldExtractor};
use crate::error::AgentError;

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_warn};

/// Tesseract lines carry no per-field score; anything that parsed as
/// `Label: value` is reported at this confidence.
const OCR_CONFIDENCE: f64 = 0.8;
const MAX_LABEL_CHARS: usize = 48;

/// Runs the `tesseract` CLI over the screenshot and reads `Label: value`
/// pairs off the recognised text. Lines without a label continue the value
/// of the previous field.
#[derive(Debug, Clone)]
pub struct LocalOcrExtractor {
    tesseract_path: String,
}

impl LocalOcrExtractor {
    pub fn new(tesseract_path: impl Into<String>) -> Self {
        Self {
            tesseract_path: tesseract_path.into(),
        }
    }

    async fn recognise(&self, image: &[u8]) -> Result<String, AgentError> {
        let input: PathBuf = std::env::temp_dir().join(format!("notelink-ocr-{}.png", Uuid::new_v4()));
        tokio::fs::write(&input, image)
            .await
            .map_err(|err| AgentError::ExternalService(format!("write ocr input: {err}")))?;

        let output = Command::new(&self.tesseract_path)
            .arg(&input)
            .arg("stdout")
            .output()
            .await;
        let _ = tokio::fs::remove_file(&input).await;

        let output = output.map_err(|err| {
            AgentError::ExternalService(format!("spawn {}: {err}", self.tesseract_path))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log_warn!("tesseract failed ({}): {stderr}", output.status);
            return Err(AgentError::ExternalService(format!(
                "tesseract failed ({}): {stderr}",
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl FieldExtractor for LocalOcrExtractor {
    async fn extract(&self, image: &[u8], _hint: Option<&str>) -> Result<Vec<CandidateField>, AgentError> {
        let text = self.recognise(image).await?;
        let fields = fields_from_ocr_text(&text);
        log_debug!("ocr produced {} candidate fields", fields.len());
        Ok(fields)
    }
}

pub fn fields_from_ocr_text(text: &str) -> Vec<CandidateField> {
    let mut fields: Vec<CandidateField> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((label, value)) = split_label(line) {
            let id = field_id_from_label(label);
            if !id.is_empty() {
                fields.push(CandidateField {
                    id,
                    label: label.to_string(),
                    value: value.to_string(),
                    field_type: None,
                    confidence: OCR_CONFIDENCE,
                });
                continue;
            }
        }

        if let Some(last) = fields.last_mut() {
            if last.value.is_empty() {
                last.value = line.to_string();
            } else {
                last.value.push(' ');
                last.value.push_str(line);
            }
        }
    }

    fields
}

fn split_label(line: &str) -> Option<(&str, &str)> {
    let (label, value) = line.split_once(':')?;
    let label = label.trim();
    let starts_with_letter = label.chars().next().is_some_and(char::is_alphabetic);
    // Clock times ("10:30") and long sentences that merely contain a colon
    // are not labels.
    if !starts_with_letter || label.chars().count() > MAX_LABEL_CHARS {
        return None;
    }
    Some((label, value.trim()))
}
