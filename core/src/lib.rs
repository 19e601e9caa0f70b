//! Orchestrator for the notelink desktop agent: pairs a clinical-notes
//! window with a form-filling window, captures and merges fields from the
//! former and pastes them into the latter.

pub mod logging;

pub mod agent;
pub mod capture;
pub mod config;
pub mod context;
pub mod error;
pub mod geometry;
pub mod inject;
pub mod panel;
pub mod platform;
pub mod records;

#[cfg(test)]
mod testing;

pub use agent::{AgentController, AgentDeps, AgentState, AgentStatus, FieldSource, SessionField, SubscriptionId};
pub use capture::{CandidateField, FieldExtractor, LocalOcrExtractor, MacScreenCapture, ScreenCapture, VisionExtractor};
pub use config::{AgentConfig, ExtractorSettings, RecordSettings};
pub use error::{AgentError, ErrorKind, ErrorReport};
pub use panel::{PanelPhase, PanelSurface};
pub use platform::{MacOsAutomation, OsAutomation, WindowRef};
pub use records::{RecordClient, RecordProfile, RecordSession};
