use notelink_core::{RecordProfile, RecordSession};
use serde_json::{Map, Value};
use tauri::State;

use crate::AppState;

#[tauri::command]
pub async fn fetch_record_profile(state: State<'_, AppState>) -> Result<RecordProfile, String> {
    state.records.fetch_profile().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn create_record_session(state: State<'_, AppState>) -> Result<RecordSession, String> {
    state.records.create_session().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn fetch_record_session(
    state: State<'_, AppState>,
    session_id: String,
) -> Result<RecordSession, String> {
    state
        .records
        .fetch_session(&session_id)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn update_record_session(
    state: State<'_, AppState>,
    session_id: String,
    changes: Map<String, Value>,
) -> Result<RecordSession, String> {
    state
        .records
        .update_session(&session_id, &changes)
        .await
        .map_err(|e| e.to_string())
}
