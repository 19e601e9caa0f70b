use notelink_core::{AgentController, AgentState, WindowRef};
use tauri::State;

use crate::AppState;

fn controller_from_state(state: &State<'_, AppState>) -> AgentController {
    state.agent.clone()
}

#[tauri::command]
pub async fn get_agent_state(state: State<'_, AppState>) -> Result<AgentState, String> {
    Ok(controller_from_state(&state).get_state().await)
}

#[tauri::command]
pub async fn capture_and_enrich(state: State<'_, AppState>) -> Result<AgentState, String> {
    Ok(controller_from_state(&state).capture_and_enrich().await)
}

#[tauri::command]
pub async fn select_previous_field(state: State<'_, AppState>) -> Result<AgentState, String> {
    Ok(controller_from_state(&state).select_previous().await)
}

#[tauri::command]
pub async fn select_next_field(state: State<'_, AppState>) -> Result<AgentState, String> {
    Ok(controller_from_state(&state).select_next().await)
}

#[tauri::command]
pub async fn paste_current_field(state: State<'_, AppState>) -> Result<AgentState, String> {
    Ok(controller_from_state(&state).paste_current_field().await)
}

#[tauri::command]
pub async fn clear_session(state: State<'_, AppState>) -> Result<AgentState, String> {
    Ok(controller_from_state(&state).clear_session().await)
}

#[tauri::command]
pub async fn add_manual_field(
    state: State<'_, AppState>,
    label: String,
    value: String,
) -> Result<AgentState, String> {
    Ok(controller_from_state(&state)
        .add_manual_field(&label, &value)
        .await)
}

#[tauri::command]
pub async fn acknowledge_error(state: State<'_, AppState>) -> Result<AgentState, String> {
    Ok(controller_from_state(&state).acknowledge_error().await)
}

#[tauri::command]
pub async fn list_windows(state: State<'_, AppState>) -> Result<Vec<WindowRef>, String> {
    Ok(controller_from_state(&state).list_windows().await)
}

#[tauri::command]
pub async fn set_linked_window(
    state: State<'_, AppState>,
    window: WindowRef,
) -> Result<AgentState, String> {
    Ok(controller_from_state(&state).set_linked_window(window).await)
}

#[tauri::command]
pub async fn get_linked_window(state: State<'_, AppState>) -> Result<Option<WindowRef>, String> {
    Ok(controller_from_state(&state).get_linked_window().await)
}

#[tauri::command]
pub async fn toggle_panel(state: State<'_, AppState>) -> Result<AgentState, String> {
    Ok(controller_from_state(&state).toggle_panel().await)
}

#[tauri::command]
pub async fn disconnect(state: State<'_, AppState>) -> Result<AgentState, String> {
    Ok(controller_from_state(&state).disconnect().await)
}

#[tauri::command]
pub async fn start_context_polling(state: State<'_, AppState>) -> Result<(), String> {
    controller_from_state(&state).start_context_polling().await;
    Ok(())
}

#[tauri::command]
pub async fn stop_context_polling(state: State<'_, AppState>) -> Result<(), String> {
    controller_from_state(&state).stop_context_polling().await;
    Ok(())
}
