use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;
use uuid::Uuid;

use super::ScreenCapture;
use crate::error::AgentError;
use crate::platform::CaptureRect;

/// `screencapture` CLI backend. Writes to a scratch PNG and hands back its
/// bytes; the scratch file is always removed.
#[derive(Debug, Clone, Default)]
pub struct MacScreenCapture {
    scratch_dir: Option<PathBuf>,
}

impl MacScreenCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: Some(dir.into()),
        }
    }

    fn scratch_path(&self) -> PathBuf {
        let dir = self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
        dir.join(format!("notelink-capture-{}.png", Uuid::new_v4()))
    }

    fn run(&self, extra_args: &[String]) -> Result<Vec<u8>, AgentError> {
        let output_path = self.scratch_path();
        let result = run_screencapture(extra_args, &output_path);
        let _ = fs::remove_file(&output_path);
        result
    }
}

impl ScreenCapture for MacScreenCapture {
    fn capture_full_screen(&self) -> Result<Vec<u8>, AgentError> {
        self.run(&[])
    }

    fn capture_region(&self, rect: &CaptureRect) -> Result<Vec<u8>, AgentError> {
        if rect.width <= 0 || rect.height <= 0 {
            return Err(AgentError::ExternalService(format!(
                "invalid capture region x={} y={} w={} h={}",
                rect.x, rect.y, rect.width, rect.height
            )));
        }
        self.run(&["-R".to_string(), region_arg(rect)])
    }
}

fn region_arg(rect: &CaptureRect) -> String {
    format!("{},{},{},{}", rect.x, rect.y, rect.width, rect.height)
}

fn run_screencapture(extra_args: &[String], output_path: &Path) -> Result<Vec<u8>, AgentError> {
    let output = Command::new("screencapture")
        .arg("-x")
        .args(["-t", "png"])
        .args(extra_args)
        .arg(output_path)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| AgentError::ExternalService(format!("spawn screencapture: {err}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!("screencapture failed ({}): {stderr}", output.status);
        let lowered = stderr.to_lowercase();
        if lowered.contains("not authorized") || lowered.contains("permission") {
            return Err(AgentError::PermissionDenied(stderr));
        }
        return Err(AgentError::ExternalService(format!(
            "screencapture failed ({}): {stderr}",
            output.status
        )));
    }

    // Without Screen Recording access screencapture can exit 0 and write nothing.
    let bytes = fs::read(output_path).map_err(|_| {
        AgentError::PermissionDenied("screen capture produced no image".to_string())
    })?;
    if bytes.is_empty() {
        return Err(AgentError::PermissionDenied(
            "screen capture produced an empty image".to_string(),
        ));
    }
    Ok(bytes)
}
