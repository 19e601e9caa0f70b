//! Opens the System Settings panes a PermissionDenied error points at.

const SCREEN_RECORDING_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_ScreenCapture";
const ACCESSIBILITY_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";

#[tauri::command]
pub fn open_screen_recording_settings() -> Result<(), String> {
    #[cfg(target_os = "macos")]
    {
        tauri_plugin_opener::open_url(SCREEN_RECORDING_SETTINGS_URL, None::<&str>)
            .map_err(|e| e.to_string())
    }

    #[cfg(not(target_os = "macos"))]
    {
        let _ = SCREEN_RECORDING_SETTINGS_URL;
        Err("Screen recording settings are only available on macOS".into())
    }
}

#[tauri::command]
pub fn open_accessibility_settings() -> Result<(), String> {
    #[cfg(target_os = "macos")]
    {
        tauri_plugin_opener::open_url(ACCESSIBILITY_SETTINGS_URL, None::<&str>)
            .map_err(|e| e.to_string())
    }

    #[cfg(not(target_os = "macos"))]
    {
        let _ = ACCESSIBILITY_SETTINGS_URL;
        Err("Accessibility settings are only available on macOS".into())
    }
}
