use anyhow::{Context, Result};
use log::info;
use notelink_core::AgentController;
use tauri::{App, AppHandle, Manager};
use tauri_plugin_global_shortcut::{Code, GlobalShortcutExt, Modifiers, Shortcut, ShortcutState};

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    Capture,
    Previous,
    Next,
    Paste,
    TogglePanel,
}

/// Cmd+Shift chords, one per controller action.
pub fn bindings() -> Vec<(Shortcut, ShortcutAction)> {
    let chord = Some(Modifiers::SUPER | Modifiers::SHIFT);
    vec![
        (Shortcut::new(chord, Code::KeyE), ShortcutAction::Capture),
        (Shortcut::new(chord, Code::ArrowUp), ShortcutAction::Previous),
        (Shortcut::new(chord, Code::ArrowDown), ShortcutAction::Next),
        (Shortcut::new(chord, Code::KeyV), ShortcutAction::Paste),
        (Shortcut::new(chord, Code::KeyL), ShortcutAction::TogglePanel),
    ]
}

pub fn action_for(shortcut: &Shortcut) -> Option<ShortcutAction> {
    bindings()
        .into_iter()
        .find(|(bound, _)| bound == shortcut)
        .map(|(_, action)| action)
}

pub fn register(app: &App) -> Result<()> {
    app.handle()
        .plugin(
            tauri_plugin_global_shortcut::Builder::new()
                .with_handler(|app, shortcut, event| {
                    if event.state() != ShortcutState::Pressed {
                        return;
                    }
                    if let Some(action) = action_for(shortcut) {
                        dispatch(app, action);
                    }
                })
                .build(),
        )
        .context("failed to install global shortcut plugin")?;

    for (shortcut, action) in bindings() {
        app.global_shortcut()
            .register(shortcut)
            .with_context(|| format!("failed to register shortcut for {action:?}"))?;
    }
    info!("Registered {} global shortcuts", bindings().len());
    Ok(())
}

fn dispatch(app: &AppHandle, action: ShortcutAction) {
    let controller: AgentController = app.state::<AppState>().agent.clone();
    tauri::async_runtime::spawn(async move {
        match action {
            ShortcutAction::Capture => controller.capture_and_enrich().await,
            ShortcutAction::Previous => controller.select_previous().await,
            ShortcutAction::Next => controller.select_next().await,
            ShortcutAction::Paste => controller.paste_current_field().await,
            ShortcutAction::TogglePanel => controller.toggle_panel().await,
        };
    });
}
