//! TOML configuration.
//!
//! ```toml
//! capture_interval_ms = 10
//! capture_modifier = "either"
//! frame_ms = 16
//! steps_per_beat = 4
//! log_level = "info"
//!
//! [session]
//! bars = 4
//! watch = ["vibrato depth", "tempo"]
//! ```

use std::path::Path;

use ml_editor::{CaptureLoop, CaptureModifier};
use ml_ir::{ModRegistry, ModSettingId};
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKey {
    Control,
    Shift,
    #[default]
    Either,
}

impl From<ModifierKey> for CaptureModifier {
    fn from(key: ModifierKey) -> Self {
        match key {
            ModifierKey::Control => CaptureModifier::Control,
            ModifierKey::Shift => CaptureModifier::Shift,
            ModifierKey::Either => CaptureModifier::Either,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture re-fire interval
    pub capture_interval_ms: f64,
    pub capture_modifier: ModifierKey,
    /// Frame length of the headless loop
    pub frame_ms: f32,
    /// Editor grid resolution, used to quantize capture writes
    pub steps_per_beat: u8,
    /// Default filter when `RUST_LOG` is unset
    pub log_level: String,
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture_interval_ms: ml_editor::DEFAULT_CAPTURE_INTERVAL_MS,
            capture_modifier: ModifierKey::default(),
            frame_ms: 16.0,
            steps_per_beat: 4,
            log_level: "info".into(),
            session: SessionConfig::default(),
        }
    }
}

/// Scripted session run by the CLI.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub bars: u16,
    /// Modulator names whose live state is reported
    pub watch: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bars: 4,
            watch: vec!["vibrato depth".into()],
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn capture_loop(&self) -> CaptureLoop {
        CaptureLoop::new(
            self.capture_interval_ms,
            self.capture_modifier.into(),
            self.steps_per_beat,
        )
    }

    /// Resolve the watched modulator names.
    pub fn watched(&self, registry: &ModRegistry) -> Result<Vec<ModSettingId>> {
        self.session
            .watch
            .iter()
            .map(|name| {
                registry
                    .id(name)
                    .ok_or_else(|| Error::UnknownModulator(name.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.capture_interval_ms, 10.0);
        assert_eq!(config.capture_modifier, ModifierKey::Either);
        assert_eq!(config.steps_per_beat, 4);
        assert_eq!(config.session.bars, 4);
    }

    #[test]
    fn partial_override() {
        let config = Config::from_toml(
            "capture_modifier = \"shift\"\n[session]\nwatch = [\"tempo\"]\n",
        )
        .unwrap();
        assert_eq!(config.capture_modifier, ModifierKey::Shift);
        assert_eq!(config.session.bars, 4);
        assert_eq!(config.session.watch, vec!["tempo".to_string()]);
    }

    #[test]
    fn unknown_watch_name_is_an_error() {
        let mut config = Config::default();
        config.session.watch.push("wobble".into());
        let err = config.watched(&ModRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownModulator(ref n) if n == "wobble"));
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        assert!(matches!(Config::from_toml("frame_ms = \"x\""), Err(Error::Parse(_))));
    }
}
