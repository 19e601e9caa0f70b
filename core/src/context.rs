//! Frontmost-window classification and the sticky source-context tracker.

use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::platform::{FrontmostWindow, WindowRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    Source,
    LinkedTarget,
    Own,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontmostContext {
    pub app_name: String,
    pub window_title: String,
    pub classification: Classification,
}

/// Case-insensitive containment in either direction. Empty strings never
/// match, otherwise every title would contain them.
pub fn fragments_match(observed: &str, reference: &str) -> bool {
    let observed = observed.trim().to_lowercase();
    let reference = reference.trim().to_lowercase();
    if observed.is_empty() || reference.is_empty() {
        return false;
    }
    observed.contains(&reference) || reference.contains(&observed)
}

/// Whether a visible window still looks like the stored linked window. The
/// title comparison tolerates drift such as an appended unsaved marker.
pub fn matches_linked(window: &WindowRef, linked: &WindowRef) -> bool {
    window.app_name.eq_ignore_ascii_case(&linked.app_name)
        && fragments_match(&window.window_title, &linked.window_title)
}

pub fn classify(
    app_name: &str,
    window_title: &str,
    linked: Option<&WindowRef>,
    config: &AgentConfig,
) -> Classification {
    if app_name.trim().eq_ignore_ascii_case(config.own_app_name.trim()) {
        return Classification::Own;
    }

    if let Some(linked) = linked {
        if fragments_match(window_title, &linked.window_title) {
            return Classification::LinkedTarget;
        }
    }

    let is_source = config.source_markers.iter().any(|marker| {
        fragments_match(window_title, marker) || fragments_match(app_name, marker)
    });
    if is_source {
        Classification::Source
    } else {
        Classification::Other
    }
}

/// Panel gate: the panel may open over the source or the linked target, or
/// over the agent's own popups while a source context or a link is live.
pub fn can_open(context: Option<&FrontmostContext>, last_known_source_context: bool, linked: bool) -> bool {
    match context.map(|ctx| ctx.classification) {
        Some(Classification::Source | Classification::LinkedTarget) => true,
        Some(Classification::Own) => last_known_source_context || linked,
        Some(Classification::Other) | None => false,
    }
}

#[derive(Debug, Default)]
pub struct ContextTracker {
    last: Option<FrontmostContext>,
    last_known_source_context: bool,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one poll result. `None` (query failed or nothing frontmost)
    /// leaves the sticky flag alone but clears the current context.
    pub fn observe(
        &mut self,
        frontmost: Option<&FrontmostWindow>,
        linked: Option<&WindowRef>,
        config: &AgentConfig,
    ) -> Option<FrontmostContext> {
        let context = frontmost.map(|window| FrontmostContext {
            app_name: window.app_name.clone(),
            window_title: window.window_title.clone(),
            classification: classify(&window.app_name, &window.window_title, linked, config),
        });

        match context.as_ref().map(|ctx| ctx.classification) {
            Some(Classification::Source) => self.last_known_source_context = true,
            Some(Classification::Other) => self.last_known_source_context = false,
            Some(Classification::Own | Classification::LinkedTarget) | None => {}
        }

        self.last = context.clone();
        context
    }

    pub fn current(&self) -> Option<&FrontmostContext> {
        self.last.as_ref()
    }

    pub fn last_known_source_context(&self) -> bool {
        self.last_known_source_context
    }

    pub fn can_open(&self, linked: bool) -> bool {
        can_open(self.last.as_ref(), self.last_known_source_context, linked)
    }
}
