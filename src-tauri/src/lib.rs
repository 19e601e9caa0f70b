mod agent_commands;
mod permissions;
mod records_commands;
mod shortcuts;
mod surface;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use log::{info, warn};
use notelink_core::{
    AgentConfig, AgentController, AgentDeps, AgentState, ExtractorSettings, FieldExtractor,
    LocalOcrExtractor, MacOsAutomation, MacScreenCapture, RecordClient, VisionExtractor,
};
use tauri::{App, Emitter, Manager, RunEvent};

use agent_commands::{
    acknowledge_error, add_manual_field, capture_and_enrich, clear_session, disconnect,
    get_agent_state, get_linked_window, list_windows, paste_current_field, select_next_field,
    select_previous_field, set_linked_window, start_context_polling, stop_context_polling,
    toggle_panel,
};
use permissions::{open_accessibility_settings, open_screen_recording_settings};
use records_commands::{
    create_record_session, fetch_record_profile, fetch_record_session, update_record_session,
};
use surface::TauriPanelSurface;

pub const STATE_EVENT: &str = "agent-state-updated";
const CONFIG_FILE: &str = "agent.json";

pub(crate) struct AppState {
    pub(crate) agent: AgentController,
    pub(crate) records: Arc<RecordClient>,
}

fn config_path(app: &App) -> anyhow::Result<PathBuf> {
    let config_dir = app
        .path()
        .app_config_dir()
        .map_err(|err| anyhow!(err))?;
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    Ok(config_dir.join(CONFIG_FILE))
}

fn build_extractor(settings: &ExtractorSettings) -> anyhow::Result<Arc<dyn FieldExtractor>> {
    Ok(match settings {
        ExtractorSettings::LocalOcr { tesseract_path } => {
            info!("Using local OCR extractor ({tesseract_path})");
            Arc::new(LocalOcrExtractor::new(tesseract_path.clone()))
        }
        ExtractorSettings::Vision {
            endpoint,
            model,
            timeout_secs,
        } => {
            info!("Using vision extractor {model} at {endpoint}");
            Arc::new(VisionExtractor::new(endpoint.clone(), model.clone(), *timeout_secs)?)
        }
    })
}

fn setup_agent(app: &mut App) -> anyhow::Result<()> {
    let path = config_path(app)?;
    if !path.exists() {
        AgentConfig::default().save(&path)?;
        info!("Wrote default agent config to {}", path.display());
    }
    let config = AgentConfig::load(&path)?;

    let surface = Arc::new(TauriPanelSurface::new(app.handle().clone()));
    if let Err(err) = surface.prepare(config.panel_width) {
        warn!("Panel window setup incomplete: {err:#}");
    }

    let records = Arc::new(RecordClient::new(&config.records)?);
    if !records.is_configured() {
        info!("Record API not configured; record commands will report an error");
    }

    let deps = AgentDeps {
        os: Arc::new(MacOsAutomation::new()),
        capture: Arc::new(MacScreenCapture::new()),
        extractor: build_extractor(&config.extractor)?,
        surface,
    };
    let agent = AgentController::new(config, deps);

    let app_handle = app.handle().clone();
    agent.subscribe(Arc::new(move |state: &AgentState| {
        if let Err(err) = app_handle.emit(STATE_EVENT, state) {
            warn!("Failed to emit {STATE_EVENT}: {err}");
        }
    }));

    app.manage(AppState {
        agent: agent.clone(),
        records,
    });

    shortcuts::register(app)?;

    tauri::async_runtime::spawn(async move {
        agent.start_context_polling().await;
    });

    Ok(())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("notelink starting up...");

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| setup_agent(app).map_err(|err| err.into()))
        .invoke_handler(tauri::generate_handler![
            get_agent_state,
            capture_and_enrich,
            select_previous_field,
            select_next_field,
            paste_current_field,
            clear_session,
            add_manual_field,
            acknowledge_error,
            list_windows,
            set_linked_window,
            get_linked_window,
            toggle_panel,
            disconnect,
            start_context_polling,
            stop_context_polling,
            // Record API
            fetch_record_profile,
            create_record_session,
            fetch_record_session,
            update_record_session,
            // Permission remediation
            open_screen_recording_settings,
            open_accessibility_settings,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let RunEvent::Exit = event {
            if let Some(state) = app_handle.try_state::<AppState>() {
                let agent = state.agent.clone();
                tauri::async_runtime::block_on(agent.shutdown());
                log::info!("notelink shut down, windows restored");
            }
        }
    });
}
