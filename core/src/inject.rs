//! Clipboard-bracketed paste into whatever window has keyboard focus.

use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::error::AgentError;
use crate::platform::{run_blocking, Keystroke, OsAutomation};

#[derive(Debug, Clone, Copy)]
pub struct PasteTiming {
    /// Wait after writing the clipboard before the keystroke.
    pub settle: Duration,
    /// Wait after the keystroke before the clipboard is restored.
    pub land: Duration,
}

/// Save the clipboard, paste `value`, then put the saved contents back.
/// The restore runs on every path once the clipboard has been read.
pub async fn paste_value(
    os: &Arc<dyn OsAutomation>,
    value: &str,
    timing: PasteTiming,
) -> Result<(), AgentError> {
    let saved = run_blocking(os, |os| os.read_clipboard()).await?;

    let outcome = write_and_paste(os, value.to_string(), timing).await;

    if let Err(err) = run_blocking(os, move |os| os.write_clipboard(&saved)).await {
        warn!("Failed to restore clipboard after paste: {err}");
    }

    outcome
}

async fn write_and_paste(
    os: &Arc<dyn OsAutomation>,
    value: String,
    timing: PasteTiming,
) -> Result<(), AgentError> {
    run_blocking(os, move |os| os.write_clipboard(&value)).await?;
    tokio::time::sleep(timing.settle).await;
    run_blocking(os, |os| os.send_keystroke(Keystroke::Paste)).await?;
    tokio::time::sleep(timing.land).await;
    Ok(())
}
