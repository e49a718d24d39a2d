//! # Settings Persistence
//!
//! The transmissible form of an engine's configuration:
//! `{ key, scale, retune, humanize, gateDb, enabled }`. Hosts store it with
//! a project or send it across a bridge, then feed it back through
//! [`StatePatch`] so the same per-field validation applies on the way in.

use crate::controller::{CorrectionState, StatePatch};
use crate::error::EngineResult;
use crate::tuning;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// One of the twelve note names.
    pub key: String,
    /// A name from the scale table.
    pub scale: String,
    /// Retune time in seconds.
    pub retune: f32,
    pub humanize: f32,
    /// Gate threshold in dB.
    pub gate_db: f32,
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&CorrectionState::default())
    }
}

impl From<&CorrectionState> for Settings {
    fn from(state: &CorrectionState) -> Self {
        Self {
            key: tuning::note_name(state.key_pitch_class).to_string(),
            scale: state.scale_name.clone(),
            retune: state.retune_seconds,
            humanize: state.humanize,
            gate_db: state.gate_threshold_db,
            enabled: state.enabled,
        }
    }
}

impl From<Settings> for StatePatch {
    fn from(settings: Settings) -> Self {
        Self {
            key: Some(settings.key),
            scale: Some(settings.scale),
            retune: Some(settings.retune),
            humanize: Some(settings.humanize),
            gate_db: Some(settings.gate_db),
            enabled: Some(settings.enabled),
        }
    }
}

impl Settings {
    /// Saves the settings to a pretty-printed JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        let json_string = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }

    /// Loads settings from a JSON file.
    ///
    /// The file must be complete and well-typed. For lenient, field-by-field
    /// updates parse it as a `serde_json::Value` and use
    /// [`StatePatch::from_json`] instead.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let mut file = File::open(path)?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        Ok(serde_json::from_str(&data)?)
    }
}
