//! OS automation boundary. The orchestrator only ever talks to the
//! [`OsAutomation`] trait; `macos` is the one real backend.

pub mod macos;
mod types;

use std::sync::Arc;

use crate::error::AgentError;

pub use macos::MacOsAutomation;
pub use types::{CaptureRect, FrontmostWindow, Keystroke, ScreenSize, WindowBounds, WindowRef};

/// Window, keyboard and clipboard operations. Calls block on the OS (process
/// spawns, Apple events) and every one of them may fail with a permission
/// error; implementations must never panic.
pub trait OsAutomation: Send + Sync {
    /// `Ok(None)` when no application window is frontmost.
    fn query_frontmost(&self) -> Result<Option<FrontmostWindow>, AgentError>;
    fn list_visible_windows(&self) -> Result<Vec<WindowRef>, AgentError>;
    fn window_bounds(&self, window: &WindowRef) -> Result<WindowBounds, AgentError>;
    fn set_window_bounds(&self, window: &WindowRef, bounds: &WindowBounds) -> Result<(), AgentError>;
    fn is_fullscreen(&self, window: &WindowRef) -> Result<bool, AgentError>;
    fn screen_size(&self) -> Result<ScreenSize, AgentError>;
    fn send_keystroke(&self, keystroke: Keystroke) -> Result<(), AgentError>;
    fn read_clipboard(&self) -> Result<String, AgentError>;
    fn write_clipboard(&self, text: &str) -> Result<(), AgentError>;
}

/// Run a blocking OS call on the blocking pool so the poll loop and the
/// other handlers keep interleaving at this await point.
pub async fn run_blocking<T, F>(os: &Arc<dyn OsAutomation>, call: F) -> Result<T, AgentError>
where
    T: Send + 'static,
    F: FnOnce(&dyn OsAutomation) -> Result<T, AgentError> + Send + 'static,
{
    let os = Arc::clone(os);
    tokio::task::spawn_blocking(move || call(os.as_ref()))
        .await
        .map_err(|err| AgentError::ExternalService(format!("os automation worker failed: {err}")))?
}
