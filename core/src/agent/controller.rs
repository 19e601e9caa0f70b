use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::broadcast::{Listener, Listeners, SubscriptionId};
use super::poller::PollerHandle;
use super::state::{AgentState, AgentStatus, FieldSource, SessionField};
use crate::capture::{
    field_id_from_label, filter_candidates, merge_fields, CandidateField, FieldExtractor, ScreenCapture,
};
use crate::config::AgentConfig;
use crate::context::{matches_linked, Classification, ContextTracker, FrontmostContext};
use crate::error::AgentError;
use crate::geometry::{self, OriginalBounds, PushLedger};
use crate::inject::{self, PasteTiming};
use crate::panel::{ease_in_cubic, ease_out_cubic, slide_frames, PanelMachine, PanelPhase, PanelSurface};
use crate::platform::{run_blocking, OsAutomation, WindowRef};

const ENABLE_LOGS: bool = true;
use crate::{log_error, log_info, log_warn};

/// Used for panel positions when the screen size query fails.
const FALLBACK_SCREEN_WIDTH: i32 = 1440;

/// Backends the controller drives.
pub struct AgentDeps {
    pub os: Arc<dyn OsAutomation>,
    pub capture: Arc<dyn ScreenCapture>,
    pub extractor: Arc<dyn FieldExtractor>,
    pub surface: Arc<dyn PanelSurface>,
}

/// Single owner of [`AgentState`]. Every public operation catches its own
/// failures, records them in `last_error`, broadcasts and hands back the
/// resulting snapshot, so shortcut and UI callbacks never see an error.
#[derive(Clone)]
pub struct AgentController {
    config: Arc<AgentConfig>,
    os: Arc<dyn OsAutomation>,
    capture: Arc<dyn ScreenCapture>,
    extractor: Arc<dyn FieldExtractor>,
    surface: Arc<dyn PanelSurface>,
    state: Arc<Mutex<AgentState>>,
    tracker: Arc<Mutex<ContextTracker>>,
    panel: Arc<Mutex<PanelMachine>>,
    pushed: Arc<Mutex<PushLedger>>,
    listeners: Arc<Listeners>,
    capture_guard: Arc<Mutex<()>>,
    paste_guard: Arc<Mutex<()>>,
    transition: Arc<Mutex<()>>,
    context_lost: Arc<AtomicBool>,
    poller: Arc<Mutex<Option<PollerHandle>>>,
}

impl AgentController {
    pub fn new(config: AgentConfig, deps: AgentDeps) -> Self {
        Self {
            config: Arc::new(config),
            os: deps.os,
            capture: deps.capture,
            extractor: deps.extractor,
            surface: deps.surface,
            state: Arc::new(Mutex::new(AgentState::new())),
            tracker: Arc::new(Mutex::new(ContextTracker::new())),
            panel: Arc::new(Mutex::new(PanelMachine::new())),
            pushed: Arc::new(Mutex::new(PushLedger::default())),
            listeners: Arc::new(Listeners::default()),
            capture_guard: Arc::new(Mutex::new(())),
            paste_guard: Arc::new(Mutex::new(())),
            transition: Arc::new(Mutex::new(())),
            context_lost: Arc::new(AtomicBool::new(false)),
            poller: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub async fn get_state(&self) -> AgentState {
        self.state.lock().await.clone()
    }

    pub fn subscribe(&self, listener: Listener) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    async fn update<F>(&self, apply: F) -> AgentState
    where
        F: FnOnce(&mut AgentState),
    {
        let snapshot = {
            let mut state = self.state.lock().await;
            apply(&mut state);
            state.clone()
        };
        self.listeners.broadcast(&snapshot);
        snapshot
    }

    async fn fail(&self, err: AgentError) -> AgentState {
        log_error!("{err}");
        let report = err.report();
        self.update(move |state| state.set_error(report)).await
    }

    async fn set_panel_phase(&self, phase: PanelPhase) {
        self.update(|state| state.panel = phase).await;
    }

    // ---- capture → extract → merge ----

    pub async fn capture_and_enrich(&self) -> AgentState {
        let Ok(_guard) = Arc::clone(&self.capture_guard).try_lock_owned() else {
            return self
                .fail(AgentError::StateConflict("capture already in progress".into()))
                .await;
        };

        self.update(|state| state.status = AgentStatus::Capturing).await;

        let candidates = match self.capture_candidates().await {
            Ok(candidates) => candidates,
            Err(err) => return self.fail(err).await,
        };

        self.update(move |state| {
            let outcome = merge_fields(&state.session_fields, &candidates);
            log_info!(
                "capture merged: {} appended, {} extended, {} discarded",
                outcome.appended,
                outcome.extended,
                outcome.discarded
            );
            state.apply_merge(outcome.fields);
            if state.session_id.is_none() {
                state.session_id = Some(Uuid::new_v4().to_string());
            }
            if state.status == AgentStatus::Capturing {
                state.status = AgentStatus::Idle;
            }
            state.last_error = None;
        })
        .await
    }

    async fn capture_candidates(&self) -> Result<Vec<CandidateField>, AgentError> {
        let capture = Arc::clone(&self.capture);
        let image = tokio::task::spawn_blocking(move || capture.capture_full_screen())
            .await
            .map_err(|err| AgentError::ExternalService(format!("capture worker failed: {err}")))??;

        let hint = self.config.extraction_hint.as_deref();
        let candidates = self.extractor.extract(&image, hint).await?;
        let total = candidates.len();
        let kept = filter_candidates(candidates, self.config.min_confidence);
        log_info!("extracted {total} candidates, {} above confidence threshold", kept.len());
        Ok(kept)
    }

    // ---- navigation and paste ----

    pub async fn select_previous(&self) -> AgentState {
        self.update(AgentState::select_previous).await
    }

    pub async fn select_next(&self) -> AgentState {
        self.update(AgentState::select_next).await
    }

    pub async fn paste_current_field(&self) -> AgentState {
        let Ok(_guard) = Arc::clone(&self.paste_guard).try_lock_owned() else {
            return self
                .fail(AgentError::StateConflict("paste already in progress".into()))
                .await;
        };

        let value = {
            let state = self.state.lock().await;
            match state.current_field() {
                None => Err(AgentError::NoActiveSession("no field selected".into())),
                Some(field) if field.value.trim().is_empty() => {
                    Err(AgentError::NoActiveSession("no value".into()))
                }
                Some(field) => Ok(field.value.clone()),
            }
        };
        let value = match value {
            Ok(value) => value,
            Err(err) => return self.fail(err).await,
        };

        self.update(|state| state.status = AgentStatus::Typing).await;

        let timing = PasteTiming {
            settle: self.config.paste_settle(),
            land: self.config.paste_land(),
        };
        match inject::paste_value(&self.os, &value, timing).await {
            Ok(()) => {
                self.update(|state| {
                    if state.status == AgentStatus::Typing {
                        state.status = AgentStatus::Idle;
                    }
                    state.last_error = None;
                })
                .await
            }
            Err(err) => self.fail(err).await,
        }
    }

    pub async fn clear_session(&self) -> AgentState {
        log_info!("session cleared");
        self.update(|state| {
            state.clear_session();
            if state.status == AgentStatus::Error {
                state.status = AgentStatus::Idle;
                state.last_error = None;
            }
        })
        .await
    }

    /// Add a field by hand. The id is derived from the label and made
    /// unique within the session.
    pub async fn add_manual_field(&self, label: &str, value: &str) -> AgentState {
        let label = label.trim().to_string();
        if label.is_empty() {
            return self
                .fail(AgentError::StateConflict("field label is empty".into()))
                .await;
        }
        let value = value.to_string();

        self.update(move |state| {
            let id = unique_field_id(&state.session_fields, &label);
            state.session_fields.push(SessionField {
                id,
                label,
                value,
                source: FieldSource::Manual,
            });
            if state.session_id.is_none() {
                state.session_id = Some(Uuid::new_v4().to_string());
            }
            state.clamp_index();
        })
        .await
    }

    pub async fn acknowledge_error(&self) -> AgentState {
        self.update(|state| {
            if state.status == AgentStatus::Error {
                state.status = AgentStatus::Idle;
            }
            state.last_error = None;
        })
        .await
    }

    // ---- pairing ----

    /// Visible windows that can be linked, excluding the agent's own.
    pub async fn list_windows(&self) -> Vec<WindowRef> {
        match run_blocking(&self.os, |os| os.list_visible_windows()).await {
            Ok(windows) => windows
                .into_iter()
                .filter(|window| !window.app_name.eq_ignore_ascii_case(&self.config.own_app_name))
                .collect(),
            Err(err) => {
                self.fail(err).await;
                Vec::new()
            }
        }
    }

    pub async fn set_linked_window(&self, window: WindowRef) -> AgentState {
        log_info!("linked to {} ({})", window.app_name, window.window_title);
        self.surface_call("hide pairing", self.surface.hide_pairing());

        let linked = window.clone();
        let snapshot = self.update(move |state| state.linked_window = Some(linked)).await;

        if snapshot.panel == PanelPhase::Open {
            let _transition = self.transition.lock().await;
            if self.panel.lock().await.phase() == PanelPhase::Open {
                self.push_linked(&window).await;
            }
            return self.get_state().await;
        }
        snapshot
    }

    pub async fn get_linked_window(&self) -> Option<WindowRef> {
        self.state.lock().await.linked_window.clone()
    }

    /// Forget the linked window and close the panel.
    pub async fn disconnect(&self) -> AgentState {
        let _transition = self.transition.lock().await;
        log_info!("disconnecting linked window");
        self.update(|state| state.linked_window = None).await;
        self.surface_call("hide pairing", self.surface.hide_pairing());
        if self.panel.lock().await.phase() == PanelPhase::Open {
            self.close_panel().await;
        }
        self.get_state().await
    }

    // ---- panel ----

    /// Open when closed and the gate allows it, close when open. A toggle
    /// during an animation is ignored.
    pub async fn toggle_panel(&self) -> AgentState {
        let Ok(_transition) = Arc::clone(&self.transition).try_lock_owned() else {
            log_info!("toggle ignored: panel transition in flight");
            return self.get_state().await;
        };

        let phase = self.panel.lock().await.phase();
        match phase {
            PanelPhase::Closed => self.open_panel().await,
            PanelPhase::Open => self.close_panel().await,
            PanelPhase::Opening | PanelPhase::Closing => {}
        }
        self.get_state().await
    }

    async fn observe_frontmost(&self, linked: Option<&WindowRef>) -> (Option<FrontmostContext>, bool) {
        let frontmost = match run_blocking(&self.os, |os| os.query_frontmost()).await {
            Ok(frontmost) => {
                self.regain_context().await;
                frontmost
            }
            Err(err) => {
                log_warn!("frontmost query failed: {err}");
                self.lose_context();
                None
            }
        };
        let mut tracker = self.tracker.lock().await;
        let context = tracker.observe(frontmost.as_ref(), linked, &self.config);
        let can_open = tracker.can_open(linked.is_some());
        (context, can_open)
    }

    /// Without OS context the icon and pairing prompt are hidden until a
    /// query succeeds again.
    fn lose_context(&self) {
        if !self.context_lost.swap(true, Ordering::SeqCst) {
            self.surface_call("hide icon", self.surface.hide_floating_icon());
            self.surface_call("hide pairing", self.surface.hide_pairing());
        }
    }

    async fn regain_context(&self) {
        if self.context_lost.swap(false, Ordering::SeqCst)
            && self.panel.lock().await.phase() == PanelPhase::Closed
        {
            self.surface_call("show icon", self.surface.show_floating_icon());
        }
    }

    async fn open_panel(&self) {
        let linked = self.get_linked_window().await;
        let (context, can_open) = self.observe_frontmost(linked.as_ref()).await;
        if !can_open {
            log_info!(
                "panel gate closed for {:?}",
                context.as_ref().map(|ctx| ctx.classification)
            );
            return;
        }

        if let Err(err) = self.panel.lock().await.begin_open() {
            log_warn!("{err}");
            return;
        }
        self.set_panel_phase(PanelPhase::Opening).await;

        if context.as_ref().map(|ctx| ctx.classification) != Some(Classification::LinkedTarget) {
            self.push_frontmost().await;
        }
        if let Some(linked) = linked.as_ref() {
            self.push_linked(linked).await;
        }

        self.surface_call("hide icon", self.surface.hide_floating_icon());
        let (off_screen, on_screen) = self.panel_positions().await;
        self.surface_call("position panel", self.surface.set_panel_x(off_screen));
        self.surface_call("show panel", self.surface.show_panel());
        self.animate(off_screen, on_screen, ease_out_cubic).await;

        if let Err(err) = self.panel.lock().await.finish_open() {
            log_warn!("{err}");
        }
        self.set_panel_phase(PanelPhase::Open).await;
        log_info!("panel open");

        if linked.is_none() {
            self.schedule_pairing();
        }
    }

    async fn close_panel(&self) {
        if let Err(err) = self.panel.lock().await.begin_close() {
            log_warn!("{err}");
            return;
        }
        self.set_panel_phase(PanelPhase::Closing).await;

        self.surface_call("hide pairing", self.surface.hide_pairing());
        let (off_screen, on_screen) = self.panel_positions().await;
        self.animate(on_screen, off_screen, ease_in_cubic).await;
        self.surface_call("hide panel", self.surface.hide_panel());

        self.restore_all().await;
        if !self.context_lost.load(Ordering::SeqCst) {
            self.surface_call("show icon", self.surface.show_floating_icon());
        }

        if let Err(err) = self.panel.lock().await.finish_close() {
            log_warn!("{err}");
        }
        self.set_panel_phase(PanelPhase::Closed).await;
        log_info!("panel closed");
    }

    fn schedule_pairing(&self) {
        let controller = self.clone();
        let settle = self.config.pairing_settle();
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            let open = controller.panel.lock().await.phase() == PanelPhase::Open;
            if open && controller.get_linked_window().await.is_none() {
                controller.surface_call("show pairing", controller.surface.show_pairing());
            }
        });
    }

    async fn panel_positions(&self) -> (i32, i32) {
        let width = match run_blocking(&self.os, |os| os.screen_size()).await {
            Ok(screen) => screen.width,
            Err(err) => {
                log_warn!("screen size unavailable, assuming {FALLBACK_SCREEN_WIDTH}: {err}");
                FALLBACK_SCREEN_WIDTH
            }
        };
        (width, width - self.config.panel_width)
    }

    async fn animate(&self, from: i32, to: i32, easing: fn(f64) -> f64) {
        let step = self.config.animation_step();
        for x in slide_frames(from, to, self.config.animation_steps, easing) {
            self.surface_call("position panel", self.surface.set_panel_x(x));
            if step > Duration::ZERO {
                tokio::time::sleep(step).await;
            }
        }
    }

    fn surface_call(&self, what: &str, result: anyhow::Result<()>) {
        if let Err(err) = result {
            log_warn!("surface {what} failed: {err:#}");
        }
    }

    // ---- geometry ----

    async fn push_frontmost(&self) {
        let own_app_name = self.config.own_app_name.clone();
        let reserved = self.config.panel_width;
        let result = run_blocking(&self.os, move |os| geometry::push(os, &own_app_name, reserved)).await;
        self.record_push(result).await;
    }

    async fn push_linked(&self, linked: &WindowRef) {
        if self.pushed.lock().await.is_pushed(linked) {
            return;
        }
        let window = linked.clone();
        let reserved = self.config.panel_width;
        let result = run_blocking(&self.os, move |os| geometry::push_window(os, &window, reserved)).await;
        self.record_push(result).await;
    }

    async fn record_push(&self, result: Result<Option<OriginalBounds>, AgentError>) {
        match result {
            Ok(Some(original)) => {
                log_info!(
                    "pushed {} #{} from width {}",
                    original.app_name,
                    original.window.window_index(),
                    original.width
                );
                self.pushed.lock().await.record(original);
            }
            Ok(None) => {}
            Err(AgentError::NoMatchingWindow(message)) => {
                log_warn!("push skipped, window gone: {message}");
            }
            Err(err) => {
                self.fail(err).await;
            }
        }
    }

    async fn restore_all(&self) {
        let pushed = self.pushed.lock().await.take_all();
        for original in pushed {
            let result = run_blocking(&self.os, move |os| {
                geometry::restore(os, &original);
                Ok(())
            })
            .await;
            if let Err(err) = result {
                log_warn!("restore worker failed: {err}");
            }
        }
    }

    // ---- context polling ----

    pub async fn start_context_polling(&self) {
        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            return;
        }
        *poller = Some(PollerHandle::spawn(self.clone()));
    }

    pub async fn stop_context_polling(&self) {
        let handle = self.poller.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.stop().await {
                log_warn!("{err:#}");
            }
        }
    }

    /// Stop polling and close the panel so every pushed window is put back
    /// before the process exits.
    pub async fn shutdown(&self) {
        self.stop_context_polling().await;
        let _transition = self.transition.lock().await;
        if self.panel.lock().await.phase() == PanelPhase::Open {
            self.close_panel().await;
        }
        self.restore_all().await;
    }

    /// One poll: classify the frontmost window, close the panel after
    /// enough consecutive misses, and periodically check the link.
    pub(crate) async fn poll_once(&self, tick: u64) {
        let linked = self.get_linked_window().await;
        let (_, can_open) = self.observe_frontmost(linked.as_ref()).await;

        let should_close = self
            .panel
            .lock()
            .await
            .record_poll(can_open, self.config.close_after_missed_polls);
        if should_close {
            let _transition = self.transition.lock().await;
            if self.panel.lock().await.phase() == PanelPhase::Open {
                log_info!("closing panel: context left source and target");
                self.close_panel().await;
            }
        }

        let every = u64::from(self.config.link_validation_every.max(1));
        if tick % every == 0 {
            if let Some(linked) = linked {
                self.validate_link(&linked).await;
            }
        }
    }

    async fn validate_link(&self, linked: &WindowRef) {
        let windows = match run_blocking(&self.os, |os| os.list_visible_windows()).await {
            Ok(windows) => windows,
            Err(err) => {
                log_warn!("link validation skipped: {err}");
                return;
            }
        };
        if windows.iter().any(|window| matches_linked(window, linked)) {
            return;
        }

        log_info!("linked window {} ({}) is gone", linked.app_name, linked.window_title);
        let expected = linked.clone();
        self.update(move |state| {
            if state.linked_window.as_ref() == Some(&expected) {
                state.linked_window = None;
            }
        })
        .await;
    }
}

fn unique_field_id(fields: &[SessionField], label: &str) -> String {
    let base = match field_id_from_label(label) {
        id if id.is_empty() => "field".to_string(),
        id => id,
    };
    let taken = |candidate: &str| fields.iter().any(|field| field.id == candidate);
    if !taken(&base) {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}_{suffix}");
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}
