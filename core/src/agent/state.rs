use serde::{Deserialize, Serialize};

use crate::error::ErrorReport;
use crate::panel::PanelPhase;
use crate::platform::WindowRef;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Capturing,
    Typing,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FieldSource {
    Capture,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionField {
    pub id: String,
    pub label: String,
    pub value: String,
    pub source: FieldSource,
}

/// The single mutable agent object. Only the controller writes it; every
/// change is broadcast to listeners as a full snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    pub status: AgentStatus,
    pub session_id: Option<String>,
    pub session_fields: Vec<SessionField>,
    pub current_index: usize,
    pub last_error: Option<ErrorReport>,
    pub panel: PanelPhase,
    pub linked_window: Option<WindowRef>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_index(&self) -> usize {
        self.session_fields.len().saturating_sub(1)
    }

    pub fn clamp_index(&mut self) {
        self.current_index = self.current_index.min(self.max_index());
    }

    pub fn select_previous(&mut self) {
        if self.session_fields.is_empty() {
            return;
        }
        self.current_index = self.current_index.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        if self.session_fields.is_empty() {
            return;
        }
        self.current_index = (self.current_index + 1).min(self.max_index());
    }

    pub fn current_field(&self) -> Option<&SessionField> {
        self.session_fields.get(self.current_index)
    }

    pub fn clear_session(&mut self) {
        self.session_id = None;
        self.session_fields.clear();
        self.current_index = 0;
    }

    /// Replace the field list after a merge, keeping the index invariant.
    pub fn apply_merge(&mut self, fields: Vec<SessionField>) {
        let was_empty = self.session_fields.is_empty();
        self.session_fields = fields;
        if was_empty {
            self.current_index = 0;
        } else {
            self.clamp_index();
        }
    }

    pub fn set_error(&mut self, report: ErrorReport) {
        self.status = AgentStatus::Error;
        self.last_error = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: &str) -> SessionField {
        SessionField {
            id: id.into(),
            label: id.into(),
            value: format!("{id} value"),
            source: FieldSource::Capture,
        }
    }

    fn state_with(count: usize) -> AgentState {
        AgentState {
            session_fields: (0..count).map(|i| field(&format!("f{i}"))).collect(),
            ..AgentState::default()
        }
    }

    #[test]
    fn navigation_is_a_no_op_on_empty_session() {
        let mut state = AgentState::new();
        state.select_next();
        state.select_previous();
        assert_eq!(state.current_index, 0);
        assert!(state.current_field().is_none());
    }

    #[test]
    fn index_stays_in_bounds_for_any_sequence() {
        for len in 0..5 {
            let mut state = state_with(len);
            // A fixed pseudo-random walk of next/previous presses.
            let mut seed: u32 = 0x9e37_79b9 ^ len as u32;
            for _ in 0..200 {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                if seed & 0x100 == 0 {
                    state.select_next();
                } else {
                    state.select_previous();
                }
                assert!(state.current_index <= len.saturating_sub(1));
            }
        }
    }

    #[test]
    fn next_stops_at_last_field() {
        let mut state = state_with(2);
        state.select_next();
        state.select_next();
        state.select_next();
        assert_eq!(state.current_index, 1);
        state.select_previous();
        state.select_previous();
        assert_eq!(state.current_index, 0);
    }

    #[test]
    fn merge_into_empty_session_resets_index() {
        let mut state = AgentState::new();
        state.current_index = 3;
        state.apply_merge(vec![field("a"), field("b")]);
        assert_eq!(state.current_index, 0);
    }

    #[test]
    fn merge_into_existing_session_keeps_selection() {
        let mut state = state_with(3);
        state.current_index = 2;
        let mut fields = state.session_fields.clone();
        fields.push(field("d"));
        state.apply_merge(fields);
        assert_eq!(state.current_index, 2);
    }

    #[test]
    fn state_serializes_camel_case() {
        let json = serde_json::to_string(&state_with(1)).expect("serialize");
        assert!(json.contains("\"sessionFields\""));
        assert!(json.contains("\"currentIndex\":0"));
        assert!(json.contains("\"status\":\"idle\""));
    }
}
