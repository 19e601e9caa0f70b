//! In-memory stand-ins for the OS, capture, extraction and UI boundaries.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::capture::{CandidateField, FieldExtractor, ScreenCapture};
use crate::error::AgentError;
use crate::panel::PanelSurface;
use crate::platform::{
    CaptureRect, FrontmostWindow, Keystroke, OsAutomation, ScreenSize, WindowBounds, WindowRef,
};

pub const FAKE_SCREEN: ScreenSize = ScreenSize {
    width: 1512,
    height: 982,
};

#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub app_name: String,
    pub title: String,
    pub bounds: WindowBounds,
    pub fullscreen: bool,
    index: u32,
}

impl FakeWindow {
    pub fn new(app_name: &str, title: &str, bounds: WindowBounds) -> Self {
        Self {
            app_name: app_name.to_string(),
            title: title.to_string(),
            bounds,
            fullscreen: false,
            index: 0,
        }
    }

    pub fn fullscreen(mut self) -> Self {
        self.fullscreen = true;
        self
    }

    fn window_ref(&self) -> WindowRef {
        WindowRef::new(self.app_name.clone(), self.title.clone(), Some(self.index))
    }
}

#[derive(Debug, Default)]
struct FakeOsState {
    windows: Vec<FakeWindow>,
    frontmost: Option<FrontmostWindow>,
    clipboard: String,
    clipboard_writes: Vec<String>,
    keystrokes: Vec<Keystroke>,
    pasted: Vec<String>,
    set_bounds_calls: usize,
    deny_permissions: bool,
    fail_frontmost: bool,
    fail_window_list: bool,
    fail_paste: bool,
    fail_clipboard_read: bool,
}

#[derive(Debug, Default)]
pub struct FakeOs {
    state: Mutex<FakeOsState>,
}

impl FakeOs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_windows(windows: Vec<FakeWindow>) -> Self {
        let os = Self::new();
        for window in windows {
            os.add_window(window);
        }
        os
    }

    fn lock(&self) -> MutexGuard<'_, FakeOsState> {
        self.state.lock().expect("fake os state poisoned")
    }

    /// Windows get 1-based indices per process in insertion order.
    pub fn add_window(&self, mut window: FakeWindow) -> WindowRef {
        let mut state = self.lock();
        let next_index = state
            .windows
            .iter()
            .filter(|existing| existing.app_name.eq_ignore_ascii_case(&window.app_name))
            .map(|existing| existing.index)
            .max()
            .unwrap_or(0)
            + 1;
        window.index = next_index;
        let window_ref = window.window_ref();
        state.windows.push(window);
        window_ref
    }

    pub fn set_frontmost(&self, app_name: &str, title: &str) {
        self.lock().frontmost = Some(FrontmostWindow {
            app_name: app_name.to_string(),
            window_title: title.to_string(),
        });
    }

    pub fn clear_frontmost(&self) {
        self.lock().frontmost = None;
    }

    pub fn bounds_of(&self, app_name: &str, index: u32) -> Option<WindowBounds> {
        self.lock()
            .windows
            .iter()
            .find(|window| window.app_name == app_name && window.index == index)
            .map(|window| window.bounds)
    }

    /// Bring a window to the front of its process, renumbering the others
    /// the way System Events does.
    pub fn raise_window(&self, app_name: &str, index: u32) {
        for window in self.lock().windows.iter_mut() {
            if window.app_name != app_name {
                continue;
            }
            if window.index == index {
                window.index = 1;
            } else if window.index < index {
                window.index += 1;
            }
        }
    }

    pub fn close_window(&self, app_name: &str, index: u32) {
        self.lock()
            .windows
            .retain(|window| !(window.app_name == app_name && window.index == index));
    }

    pub fn set_bounds_calls(&self) -> usize {
        self.lock().set_bounds_calls
    }

    pub fn set_clipboard(&self, text: &str) {
        self.lock().clipboard = text.to_string();
    }

    pub fn clipboard(&self) -> String {
        self.lock().clipboard.clone()
    }

    pub fn clipboard_writes(&self) -> Vec<String> {
        self.lock().clipboard_writes.clone()
    }

    pub fn pasted_values(&self) -> Vec<String> {
        self.lock().pasted.clone()
    }

    pub fn keystrokes(&self) -> Vec<Keystroke> {
        self.lock().keystrokes.clone()
    }

    pub fn deny_permissions(&self, deny: bool) {
        self.lock().deny_permissions = deny;
    }

    pub fn fail_frontmost(&self, fail: bool) {
        self.lock().fail_frontmost = fail;
    }

    pub fn fail_window_list(&self, fail: bool) {
        self.lock().fail_window_list = fail;
    }

    pub fn fail_paste(&self, fail: bool) {
        self.lock().fail_paste = fail;
    }

    pub fn fail_clipboard_read(&self, fail: bool) {
        self.lock().fail_clipboard_read = fail;
    }
}

fn denied(what: &str) -> AgentError {
    AgentError::PermissionDenied(format!("{what}: not allowed assistive access"))
}

fn find<'a>(state: &'a mut FakeOsState, window: &WindowRef) -> Result<&'a mut FakeWindow, AgentError> {
    state
        .windows
        .iter_mut()
        .find(|candidate| candidate.window_ref().is_same_window(window))
        .ok_or_else(|| {
            AgentError::NoMatchingWindow(format!(
                "Can't get window {} of {}",
                window.window_index(),
                window.app_name
            ))
        })
}

impl OsAutomation for FakeOs {
    fn query_frontmost(&self) -> Result<Option<FrontmostWindow>, AgentError> {
        let state = self.lock();
        if state.deny_permissions {
            return Err(denied("query frontmost"));
        }
        if state.fail_frontmost {
            return Err(AgentError::ExternalService("System Events timed out".into()));
        }
        Ok(state.frontmost.clone())
    }

    fn list_visible_windows(&self) -> Result<Vec<WindowRef>, AgentError> {
        let state = self.lock();
        if state.deny_permissions {
            return Err(denied("list windows"));
        }
        if state.fail_window_list {
            return Err(AgentError::ExternalService("System Events timed out".into()));
        }
        Ok(state.windows.iter().map(FakeWindow::window_ref).collect())
    }

    fn window_bounds(&self, window: &WindowRef) -> Result<WindowBounds, AgentError> {
        let mut state = self.lock();
        Ok(find(&mut state, window)?.bounds)
    }

    fn set_window_bounds(&self, window: &WindowRef, bounds: &WindowBounds) -> Result<(), AgentError> {
        let mut state = self.lock();
        if state.deny_permissions {
            return Err(denied("set bounds"));
        }
        state.set_bounds_calls += 1;
        find(&mut state, window)?.bounds = *bounds;
        Ok(())
    }

    fn is_fullscreen(&self, window: &WindowRef) -> Result<bool, AgentError> {
        let mut state = self.lock();
        Ok(find(&mut state, window)?.fullscreen)
    }

    fn screen_size(&self) -> Result<ScreenSize, AgentError> {
        Ok(FAKE_SCREEN)
    }

    fn send_keystroke(&self, keystroke: Keystroke) -> Result<(), AgentError> {
        let mut state = self.lock();
        if state.deny_permissions || (state.fail_paste && keystroke == Keystroke::Paste) {
            return Err(denied("keystroke"));
        }
        if keystroke == Keystroke::Paste {
            let value = state.clipboard.clone();
            state.pasted.push(value);
        }
        state.keystrokes.push(keystroke);
        Ok(())
    }

    fn read_clipboard(&self) -> Result<String, AgentError> {
        let state = self.lock();
        if state.fail_clipboard_read {
            return Err(AgentError::ExternalService("pbpaste failed".into()));
        }
        Ok(state.clipboard.clone())
    }

    fn write_clipboard(&self, text: &str) -> Result<(), AgentError> {
        let mut state = self.lock();
        state.clipboard = text.to_string();
        state.clipboard_writes.push(text.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeCapture {
    fail: Mutex<bool>,
    calls: Mutex<usize>,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.lock().expect("fake capture poisoned") = fail;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().expect("fake capture poisoned")
    }

    fn shoot(&self) -> Result<Vec<u8>, AgentError> {
        *self.calls.lock().expect("fake capture poisoned") += 1;
        if *self.fail.lock().expect("fake capture poisoned") {
            return Err(AgentError::PermissionDenied("screen capture produced no image".into()));
        }
        Ok(b"\x89PNG fake".to_vec())
    }
}

impl ScreenCapture for FakeCapture {
    fn capture_full_screen(&self) -> Result<Vec<u8>, AgentError> {
        self.shoot()
    }

    fn capture_region(&self, _rect: &CaptureRect) -> Result<Vec<u8>, AgentError> {
        self.shoot()
    }
}

/// Replays queued extraction results. An empty queue yields no fields. With
/// a gate installed every call announces itself on `started` and then waits
/// for the gate to be notified.
#[derive(Debug, Default)]
pub struct FakeExtractor {
    results: Mutex<VecDeque<Result<Vec<CandidateField>, AgentError>>>,
    hints: Mutex<Vec<Option<String>>>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(started: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            gate: Some((started, release)),
            ..Self::default()
        }
    }

    pub fn push_fields(&self, fields: Vec<CandidateField>) {
        self.results
            .lock()
            .expect("fake extractor poisoned")
            .push_back(Ok(fields));
    }

    pub fn push_error(&self, error: AgentError) {
        self.results
            .lock()
            .expect("fake extractor poisoned")
            .push_back(Err(error));
    }

    pub fn hints(&self) -> Vec<Option<String>> {
        self.hints.lock().expect("fake extractor poisoned").clone()
    }
}

#[async_trait]
impl FieldExtractor for FakeExtractor {
    async fn extract(&self, _image: &[u8], hint: Option<&str>) -> Result<Vec<CandidateField>, AgentError> {
        self.hints
            .lock()
            .expect("fake extractor poisoned")
            .push(hint.map(str::to_string));
        if let Some((started, release)) = &self.gate {
            started.notify_one();
            release.notified().await;
        }
        self.results
            .lock()
            .expect("fake extractor poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn candidate(id: &str, label: &str, value: &str, confidence: f64) -> CandidateField {
    CandidateField {
        id: id.to_string(),
        label: label.to_string(),
        value: value.to_string(),
        field_type: None,
        confidence,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    PanelX(i32),
    ShowPanel,
    HidePanel,
    ShowIcon,
    HideIcon,
    ShowPairing,
    HidePairing,
}

#[derive(Debug, Default)]
pub struct FakeSurface {
    events: Mutex<Vec<SurfaceEvent>>,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().expect("fake surface poisoned").clone()
    }

    pub fn count(&self, event: SurfaceEvent) -> usize {
        self.events().into_iter().filter(|seen| *seen == event).count()
    }

    pub fn panel_positions(&self) -> Vec<i32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SurfaceEvent::PanelX(x) => Some(x),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SurfaceEvent) -> anyhow::Result<()> {
        self.events.lock().expect("fake surface poisoned").push(event);
        Ok(())
    }
}

impl PanelSurface for FakeSurface {
    fn set_panel_x(&self, x: i32) -> anyhow::Result<()> {
        self.push(SurfaceEvent::PanelX(x))
    }

    fn show_panel(&self) -> anyhow::Result<()> {
        self.push(SurfaceEvent::ShowPanel)
    }

    fn hide_panel(&self) -> anyhow::Result<()> {
        self.push(SurfaceEvent::HidePanel)
    }

    fn show_floating_icon(&self) -> anyhow::Result<()> {
        self.push(SurfaceEvent::ShowIcon)
    }

    fn hide_floating_icon(&self) -> anyhow::Result<()> {
        self.push(SurfaceEvent::HideIcon)
    }

    fn show_pairing(&self) -> anyhow::Result<()> {
        self.push(SurfaceEvent::ShowPairing)
    }

    fn hide_pairing(&self) -> anyhow::Result<()> {
        self.push(SurfaceEvent::HidePairing)
    }
}
