//! Panel visibility state machine and the slide animation curve.

pub mod surface;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use surface::PanelSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PanelPhase {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    BeginOpen,
    FinishOpen,
    BeginClose,
    FinishClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelTransitionError {
    InvalidTransition { from: PanelPhase, action: PanelAction },
}

impl fmt::Display for PanelTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelTransitionError::InvalidTransition { from, action } => {
                write!(f, "cannot {action:?} while panel is {from:?}")
            }
        }
    }
}

impl std::error::Error for PanelTransitionError {}

/// Phase plus the close debounce counter. Animation and geometry side
/// effects live in the controller; this type only decides what is legal.
#[derive(Debug, Default)]
pub struct PanelMachine {
    phase: PanelPhase,
    missed_polls: u32,
}

impl PanelMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PanelPhase {
        self.phase
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.phase, PanelPhase::Closed | PanelPhase::Open)
    }

    fn transition(
        &mut self,
        allowed: PanelPhase,
        to: PanelPhase,
        action: PanelAction,
    ) -> Result<(), PanelTransitionError> {
        if self.phase == allowed {
            self.phase = to;
            self.missed_polls = 0;
            Ok(())
        } else {
            Err(PanelTransitionError::InvalidTransition {
                from: self.phase,
                action,
            })
        }
    }

    pub fn begin_open(&mut self) -> Result<(), PanelTransitionError> {
        self.transition(PanelPhase::Closed, PanelPhase::Opening, PanelAction::BeginOpen)
    }

    pub fn finish_open(&mut self) -> Result<(), PanelTransitionError> {
        self.transition(PanelPhase::Opening, PanelPhase::Open, PanelAction::FinishOpen)
    }

    pub fn begin_close(&mut self) -> Result<(), PanelTransitionError> {
        self.transition(PanelPhase::Open, PanelPhase::Closing, PanelAction::BeginClose)
    }

    pub fn finish_close(&mut self) -> Result<(), PanelTransitionError> {
        self.transition(PanelPhase::Closing, PanelPhase::Closed, PanelAction::FinishClose)
    }

    /// Feed one poll result. Returns true once `threshold` consecutive
    /// polls said the panel may not stay open. Only counts while Open.
    pub fn record_poll(&mut self, can_open: bool, threshold: u32) -> bool {
        if self.phase != PanelPhase::Open || can_open {
            self.missed_polls = 0;
            return false;
        }
        self.missed_polls += 1;
        self.missed_polls >= threshold.max(1)
    }

    pub fn missed_polls(&self) -> u32 {
        self.missed_polls
    }
}

pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

pub fn ease_in_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * t
}

/// Discrete x positions for a slide from `from` to `to`. The last frame is
/// always exactly `to`.
pub fn slide_frames(from: i32, to: i32, steps: u32, easing: fn(f64) -> f64) -> Vec<i32> {
    let steps = steps.max(1);
    let distance = f64::from(to - from);
    (1..=steps)
        .map(|step| {
            if step == steps {
                return to;
            }
            let progress = easing(f64::from(step) / f64::from(steps));
            from + (distance * progress).round() as i32
        })
        .collect()
}
