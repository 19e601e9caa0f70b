//! Shrinks external windows to make horizontal room for the panel and puts
//! them back afterwards.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::platform::{OsAutomation, WindowBounds, WindowRef};

/// Geometry of a window before it was pushed. Lives for one push/restore cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalBounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub app_name: String,
    pub window: WindowRef,
}

impl OriginalBounds {
    fn bounds(&self) -> WindowBounds {
        WindowBounds {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Push the frontmost window, or when the agent itself is frontmost the
/// widest other visible window wider than `reserved_width`.
pub fn push(
    os: &dyn OsAutomation,
    own_app_name: &str,
    reserved_width: i32,
) -> Result<Option<OriginalBounds>, AgentError> {
    let Some(frontmost) = os.query_frontmost()? else {
        return Ok(None);
    };

    let candidate = if frontmost.app_name.eq_ignore_ascii_case(own_app_name) {
        match widest_window(os, own_app_name, reserved_width)? {
            Some(window) => window,
            None => return Ok(None),
        }
    } else {
        frontmost.as_window_ref()
    };

    push_window(os, &candidate, reserved_width)
}

/// Push one specific window. Fullscreen windows and windows narrower than
/// `reserved_width` are left alone.
pub fn push_window(
    os: &dyn OsAutomation,
    window: &WindowRef,
    reserved_width: i32,
) -> Result<Option<OriginalBounds>, AgentError> {
    if os.is_fullscreen(window)? {
        info!("not pushing fullscreen window {} #{}", window.app_name, window.window_index());
        return Ok(None);
    }

    let bounds = os.window_bounds(window)?;
    if bounds.width < reserved_width {
        info!(
            "not pushing {} #{}: width {} < reserved {}",
            window.app_name,
            window.window_index(),
            bounds.width,
            reserved_width
        );
        return Ok(None);
    }

    let screen = os.screen_size()?;
    if screen.width <= reserved_width {
        warn!(
            "not pushing {} #{}: screen width {} leaves no room beside {}",
            window.app_name,
            window.window_index(),
            screen.width,
            reserved_width
        );
        return Ok(None);
    }
    let shrunk = WindowBounds {
        x: 0,
        y: bounds.y,
        width: screen.width - reserved_width,
        height: bounds.height,
    };
    os.set_window_bounds(window, &shrunk)?;

    Ok(Some(OriginalBounds {
        x: bounds.x,
        y: bounds.y,
        width: bounds.width,
        height: bounds.height,
        app_name: window.app_name.clone(),
        window: window.clone(),
    }))
}

/// Put a window back exactly where it was. A window or process that has
/// gone away is not an error.
pub fn restore(os: &dyn OsAutomation, original: &OriginalBounds) {
    let target = current_ref(os, &original.window);
    if let Err(err) = os.set_window_bounds(&target, &original.bounds()) {
        warn!(
            "restore of {} #{} skipped: {err}",
            original.app_name,
            original.window.window_index()
        );
    }
}

/// Window indices follow z-order, so the pushed window may have moved since.
/// Prefer a window of the same process with the recorded title.
fn current_ref(os: &dyn OsAutomation, window: &WindowRef) -> WindowRef {
    if window.window_title.is_empty() {
        return window.clone();
    }
    let windows = match os.list_visible_windows() {
        Ok(windows) => windows,
        Err(err) => {
            warn!("window listing failed before restore: {err}");
            return window.clone();
        }
    };
    windows
        .into_iter()
        .find(|candidate| {
            candidate.app_name.eq_ignore_ascii_case(&window.app_name)
                && candidate.window_title == window.window_title
        })
        .unwrap_or_else(|| window.clone())
}

fn widest_window(
    os: &dyn OsAutomation,
    own_app_name: &str,
    reserved_width: i32,
) -> Result<Option<WindowRef>, AgentError> {
    let mut best: Option<(WindowRef, WindowBounds)> = None;
    for window in os.list_visible_windows()? {
        if window.app_name.eq_ignore_ascii_case(own_app_name) {
            continue;
        }
        let Ok(bounds) = os.window_bounds(&window) else {
            continue;
        };
        if bounds.width <= reserved_width {
            continue;
        }
        let wider = match &best {
            None => true,
            Some((_, current)) => {
                bounds.width > current.width
                    || (bounds.width == current.width && bounds.area() > current.area())
            }
        };
        if wider {
            best = Some((window, bounds));
        }
    }
    Ok(best.map(|(window, _)| window))
}

/// Windows currently pushed. Non-empty means "has pushed"; `take_all`
/// empties it before any restore is attempted so a failing restore can
/// never leave the flag set.
#[derive(Debug, Default)]
pub struct PushLedger {
    pushed: Vec<OriginalBounds>,
}

impl PushLedger {
    pub fn record(&mut self, original: OriginalBounds) {
        if !self.pushed.iter().any(|entry| entry.window.is_same_window(&original.window)) {
            self.pushed.push(original);
        }
    }

    pub fn has_pushed(&self) -> bool {
        !self.pushed.is_empty()
    }

    pub fn is_pushed(&self, window: &WindowRef) -> bool {
        self.pushed.iter().any(|entry| entry.window.is_same_window(window))
    }

    pub fn take_all(&mut self) -> Vec<OriginalBounds> {
        std::mem::take(&mut self.pushed)
    }
}
