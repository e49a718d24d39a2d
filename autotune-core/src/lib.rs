// autotune-core/src/lib.rs

//! The core logic for real-time monophonic pitch correction.
//! This crate estimates the pitch of a voice frame by frame, snaps it to
//! the nearest note of a key and scale, and drives a host-provided pitch
//! shifter toward that note. It is completely headless: the host audio
//! graph owns devices, buffers and the shifting DSP itself.

pub mod audio;
pub mod config;
pub mod controller;
pub mod engine;
pub mod pitch;
pub mod quantize;
pub mod scale;
pub mod settings;
pub mod tuning;

mod error;

#[cfg(test)]
mod testing;

pub use audio::{FrameSource, HostChain, NodeHandle, NoiseGate, PitchShifter};
pub use config::EngineConfig;
pub use controller::{CorrectionState, Corrector, StatePatch, TickOutcome};
pub use engine::{AutoTune, Effect};
pub use error::{EngineError, EngineResult};
pub use settings::Settings;

/// Represents the result of pitch detection on a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
    /// The detected fundamental in Hz, or `None` when unvoiced.
    pub frequency_hz: Option<f32>,
    /// Confidence of the detection (0.0 to 1.0); 0.0 when unvoiced.
    pub confidence: f32,
}

impl DetectionResult {
    /// No usable pitch in the frame.
    pub const UNVOICED: Self = Self {
        frequency_hz: None,
        confidence: 0.0,
    };

    /// A voiced result. Confidence is clamped into [0, 1].
    pub fn voiced(frequency_hz: f32, confidence: f32) -> Self {
        Self {
            frequency_hz: Some(frequency_hz),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn is_voiced(&self) -> bool {
        self.frequency_hz.is_some()
    }
}
