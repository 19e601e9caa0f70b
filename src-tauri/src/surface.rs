use anyhow::{anyhow, Context, Result};
use notelink_core::PanelSurface;
use tauri::{AppHandle, LogicalPosition, LogicalSize, Manager, WebviewWindow};

pub const PANEL_LABEL: &str = "panel";
pub const ICON_LABEL: &str = "icon";
pub const PAIRING_LABEL: &str = "pairing";

/// Drives the three webview windows declared in `tauri.conf.json`.
pub struct TauriPanelSurface {
    app: AppHandle,
}

impl TauriPanelSurface {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn window(&self, label: &str) -> Result<WebviewWindow> {
        self.app
            .get_webview_window(label)
            .ok_or_else(|| anyhow!("window '{label}' is not available"))
    }

    /// Size the panel to the configured width and full screen height, and
    /// park it just past the right edge of the screen.
    pub fn prepare(&self, panel_width: i32) -> Result<()> {
        let panel = self.window(PANEL_LABEL)?;
        let (screen_width, screen_height) = match panel.primary_monitor()? {
            Some(monitor) => {
                let size = monitor.size().to_logical::<f64>(monitor.scale_factor());
                (size.width, size.height)
            }
            None => (1440.0, 900.0),
        };
        panel
            .set_size(LogicalSize::new(f64::from(panel_width), screen_height))
            .context("failed to size panel")?;
        panel
            .set_position(LogicalPosition::new(screen_width, 0.0))
            .context("failed to park panel")?;
        panel.hide().context("failed to hide panel")?;
        Ok(())
    }
}

impl PanelSurface for TauriPanelSurface {
    fn set_panel_x(&self, x: i32) -> Result<()> {
        self.window(PANEL_LABEL)?
            .set_position(LogicalPosition::new(f64::from(x), 0.0))
            .context("failed to move panel")
    }

    fn show_panel(&self) -> Result<()> {
        self.window(PANEL_LABEL)?.show().context("failed to show panel")
    }

    fn hide_panel(&self) -> Result<()> {
        self.window(PANEL_LABEL)?.hide().context("failed to hide panel")
    }

    fn show_floating_icon(&self) -> Result<()> {
        self.window(ICON_LABEL)?.show().context("failed to show icon")
    }

    fn hide_floating_icon(&self) -> Result<()> {
        self.window(ICON_LABEL)?.hide().context("failed to hide icon")
    }

    fn show_pairing(&self) -> Result<()> {
        let pairing = self.window(PAIRING_LABEL)?;
        pairing.show().context("failed to show pairing")?;
        pairing.set_focus().context("failed to focus pairing")
    }

    fn hide_pairing(&self) -> Result<()> {
        self.window(PAIRING_LABEL)?.hide().context("failed to hide pairing")
    }
}
