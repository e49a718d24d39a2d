//! Engine configuration.
//!
//! The numeric heuristics of the correction loop, kept as overridable
//! defaults. A JSON file may set any subset of fields; the rest fall back to
//! [`EngineConfig::default`].

use crate::audio::FRAME_SIZE;
use crate::error::EngineResult;
use crate::pitch::{DEFAULT_SILENCE_FLOOR, DEFAULT_YIN_THRESHOLD, DetectorParams};
use crate::quantize::DEFAULT_HYSTERESIS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock interval between ticks.
    pub tick_interval_ms: u64,
    /// Samples per analysis frame.
    pub frame_size: usize,
    /// Lowest detectable frequency (Hz).
    pub fmin_hz: f32,
    /// Highest detectable frequency (Hz).
    pub fmax_hz: f32,
    /// CMND threshold of the first-dip search.
    pub yin_threshold: f32,
    /// RMS silence floor of the detector (linear).
    pub silence_floor: f32,
    /// Detections below this confidence are treated as unvoiced.
    pub confidence_cutoff: f32,
    /// Quantizer hysteresis buffer (semitones).
    pub hysteresis_semitones: f32,
    /// Ramp time back to zero shift when voicing drops out.
    pub voicing_release_secs: f32,
    /// Ramp time back to zero shift on `stop()`.
    pub stop_release_secs: f32,
    /// Absolute bound on the commanded shift (semitones).
    pub max_shift_semitones: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 30,
            frame_size: FRAME_SIZE,
            fmin_hz: 80.0,
            fmax_hz: 1000.0,
            yin_threshold: DEFAULT_YIN_THRESHOLD,
            silence_floor: DEFAULT_SILENCE_FLOOR,
            confidence_cutoff: 0.4,
            hysteresis_semitones: DEFAULT_HYSTERESIS,
            voicing_release_secs: 0.2,
            stop_release_secs: 0.1,
            max_shift_semitones: 12.0,
        }
    }
}

impl EngineConfig {
    /// Reads a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            fmin: self.fmin_hz,
            fmax: self.fmax_hz,
            threshold: self.yin_threshold,
            silence_floor: self.silence_floor,
        }
    }
}
