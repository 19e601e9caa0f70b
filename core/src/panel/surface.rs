use anyhow::Result;

/// The windows the orchestrator drives: the side panel, the idle floating
/// icon and the pairing popup. Rendering stays in the shell.
pub trait PanelSurface: Send + Sync {
    /// Logical x of the panel's left edge; the panel is pinned to the top of
    /// the screen with the configured width.
    fn set_panel_x(&self, x: i32) -> Result<()>;
    fn show_panel(&self) -> Result<()>;
    fn hide_panel(&self) -> Result<()>;
    fn show_floating_icon(&self) -> Result<()>;
    fn hide_floating_icon(&self) -> Result<()>;
    fn show_pairing(&self) -> Result<()>;
    fn hide_pairing(&self) -> Result<()>;
}
