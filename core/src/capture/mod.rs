//! Capture → extract boundaries and the candidate filter that feeds the
//! session merge.

pub mod merge;
pub mod ocr;
pub mod screen;
pub mod vision;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::platform::CaptureRect;

pub use merge::{merge_fields, MergeOutcome};
pub use ocr::LocalOcrExtractor;
pub use screen::MacScreenCapture;
pub use vision::VisionExtractor;

/// One extraction result before confidence filtering and merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateField {
    pub id: String,
    pub label: String,
    pub value: String,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
    pub confidence: f64,
}

pub trait ScreenCapture: Send + Sync {
    /// PNG bytes of the main display.
    fn capture_full_screen(&self) -> Result<Vec<u8>, AgentError>;
    fn capture_region(&self, rect: &CaptureRect) -> Result<Vec<u8>, AgentError>;
}

/// Turns a screenshot into candidate fields. Local OCR and remote vision
/// backends share this contract.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(&self, image: &[u8], hint: Option<&str>) -> Result<Vec<CandidateField>, AgentError>;
}

/// Drop low-confidence, blank and id-less candidates.
pub fn filter_candidates(candidates: Vec<CandidateField>, min_confidence: f64) -> Vec<CandidateField> {
    candidates
        .into_iter()
        .filter(|candidate| candidate.confidence >= min_confidence)
        .filter(|candidate| !candidate.id.trim().is_empty() && !candidate.value.trim().is_empty())
        .collect()
}

/// `"Patient Name"` → `"patient_name"`.
pub fn field_id_from_label(label: &str) -> String {
    let mut id = String::with_capacity(label.len());
    for ch in label.trim().chars() {
        if ch.is_alphanumeric() {
            id.extend(ch.to_lowercase());
        } else if !id.ends_with('_') && !id.is_empty() {
            id.push('_');
        }
    }
    id.trim_end_matches('_').to_string()
}
