use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "camelCase")]
pub enum ExtractorSettings {
    /// Tesseract CLI; reads `Label: value` lines off the screenshot.
    #[serde(rename_all = "camelCase")]
    LocalOcr { tesseract_path: String },
    /// OpenAI-compatible chat-completions endpoint with vision input.
    #[serde(rename_all = "camelCase")]
    Vision {
        endpoint: String,
        model: String,
        timeout_secs: u64,
    },
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        ExtractorSettings::LocalOcr {
            tesseract_path: "tesseract".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordSettings {
    pub base_url: String,
    pub email: Option<String>,
    pub third_party_id: Option<String>,
    /// Cached bearer tokens are refreshed this long before they expire.
    pub refresh_margin_secs: i64,
    pub timeout_secs: u64,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            email: None,
            third_party_id: None,
            refresh_margin_secs: 60,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    /// Process name of the agent itself, used to recognise its own windows.
    pub own_app_name: String,
    /// Title / app-name fragments that identify the clinical-notes source app.
    pub source_markers: Vec<String>,
    pub poll_interval_ms: u64,
    /// Linked-window validation runs every N context polls.
    pub link_validation_every: u32,
    pub close_after_missed_polls: u32,
    pub panel_width: i32,
    pub animation_ms: u64,
    pub animation_steps: u32,
    pub pairing_settle_ms: u64,
    pub paste_settle_ms: u64,
    pub paste_land_ms: u64,
    pub min_confidence: f64,
    pub extraction_hint: Option<String>,
    pub extractor: ExtractorSettings,
    pub records: RecordSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            own_app_name: "notelink".into(),
            source_markers: vec!["Heidi".into()],
            poll_interval_ms: 1000,
            link_validation_every: 5,
            close_after_missed_polls: 2,
            panel_width: 400,
            animation_ms: 220,
            animation_steps: 12,
            pairing_settle_ms: 300,
            paste_settle_ms: 80,
            paste_land_ms: 250,
            min_confidence: 0.7,
            extraction_hint: Some("clinical consultation note".into()),
            extractor: ExtractorSettings::default(),
            records: RecordSettings::default(),
        }
    }
}

impl AgentConfig {
    /// Missing file yields defaults; a corrupt file is logged and ignored.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read agent config from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("Ignoring corrupt agent config {}: {err}", path.display());
                    AgentConfig::default()
                }
            }
        } else {
            AgentConfig::default()
        };

        Ok(config.with_env_overrides())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write agent config to {}", path.display()))
    }

    fn with_env_overrides(mut self) -> Self {
        let debug_mode = std::env::var("NOTELINK_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            self.poll_interval_ms = self.poll_interval_ms.min(250);
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn paste_settle(&self) -> Duration {
        Duration::from_millis(self.paste_settle_ms)
    }

    pub fn paste_land(&self) -> Duration {
        Duration::from_millis(self.paste_land_ms)
    }

    pub fn pairing_settle(&self) -> Duration {
        Duration::from_millis(self.pairing_settle_ms)
    }

    pub fn animation_step(&self) -> Duration {
        Duration::from_millis(self.animation_ms / u64::from(self.animation_steps.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_returns_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = AgentConfig::load(&dir.path().join("agent.json")).expect("load");
        assert_eq!(config.panel_width, 400);
        assert_eq!(config.min_confidence, 0.7);
        assert_eq!(config.close_after_missed_polls, 2);
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("agent.json");
        std::fs::write(&path, r#"{"panelWidth": 360, "sourceMarkers": ["Scribe"]}"#).expect("write");

        let config = AgentConfig::load(&path).expect("load");
        assert_eq!(config.panel_width, 360);
        assert_eq!(config.source_markers, vec!["Scribe".to_string()]);
        assert_eq!(config.own_app_name, "notelink");
    }

    #[test]
    fn corrupt_file_returns_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("agent.json");
        std::fs::write(&path, "not valid json").expect("write corrupt file");

        let config = AgentConfig::load(&path).expect("load");
        assert_eq!(config.panel_width, AgentConfig::default().panel_width);
    }

    #[test]
    fn extractor_backend_is_tagged() {
        let json = r#"{"extractor": {"backend": "vision", "endpoint": "http://localhost:8080/v1/chat/completions", "model": "gpt-4o-mini", "timeoutSecs": 30}}"#;
        let config: AgentConfig = serde_json::from_str(json).expect("deserialize");
        match config.extractor {
            ExtractorSettings::Vision { model, timeout_secs, .. } => {
                assert_eq!(model, "gpt-4o-mini");
                assert_eq!(timeout_secs, 30);
            }
            other => panic!("expected vision backend, got {other:?}"),
        }
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("agent.json");
        let config = AgentConfig {
            panel_width: 520,
            paste_land_ms: 400,
            ..AgentConfig::default()
        };
        config.save(&path).expect("save");
        let loaded = AgentConfig::load(&path).expect("load");
        assert_eq!(loaded.panel_width, 520);
        assert_eq!(loaded.paste_land(), Duration::from_millis(400));
        assert_eq!(loaded.records, config.records);
    }
}
