//! # Correction Controller
//!
//! Owns the correction state of one voice and runs a single tick of the
//! correction loop: read a frame, detect, quantize, command the shifter.
//!
//! The controller is synchronous and holds no timer. Scheduling and
//! cancellation live in [`crate::engine`]; this type is what each tick calls
//! into, and it can be driven by hand in tests or offline hosts.

use crate::audio::{FrameSource, NoiseGate, PitchShifter};
use crate::config::EngineConfig;
use crate::pitch::YinDetector;
use crate::quantize::ScaleQuantizer;
use crate::scale::{self, ScaleDefinition};
use crate::tuning;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shortest allowed retune time (seconds).
pub const RETUNE_MIN: f32 = 0.01;
/// Longest allowed retune time (seconds).
pub const RETUNE_MAX: f32 = 0.4;
/// Hard bound on the shift commanded to the shifter (semitones).
pub const MAX_SHIFT: f32 = 12.0;

/// Configuration and running state of one correction engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionState {
    /// Root of the key, 0 = C.
    pub key_pitch_class: u8,
    /// Canonical name of the active scale.
    pub scale_name: String,
    /// Ramp time toward the target note, within [RETUNE_MIN, RETUNE_MAX].
    pub retune_seconds: f32,
    pub humanize: f32,
    pub gate_threshold_db: f32,
    pub enabled: bool,
    /// Note the voice is being pulled toward; `None` after an unvoiced tick.
    pub target_midi: Option<i32>,
    /// Last shift successfully commanded to the shifter.
    pub last_shift_semitones: f32,
}

impl Default for CorrectionState {
    fn default() -> Self {
        Self {
            key_pitch_class: 0,
            scale_name: "major".to_string(),
            retune_seconds: 0.05,
            humanize: 0.0,
            gate_threshold_db: -50.0,
            enabled: true,
            target_midi: None,
            last_shift_semitones: 0.0,
        }
    }
}

/// Partial configuration update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    /// Note name of the key root, e.g. "C", "F#", "Bb".
    pub key: Option<String>,
    /// Scale name; unknown names select the chromatic scale.
    pub scale: Option<String>,
    /// Retune time in seconds, clamped on apply.
    pub retune: Option<f32>,
    pub humanize: Option<f32>,
    /// Gate threshold in dB, pushed to the gate immediately.
    pub gate_db: Option<f32>,
    pub enabled: Option<bool>,
}

impl StatePatch {
    /// Builds a patch from a loosely typed JSON object.
    ///
    /// Each field is type-checked on its own: a wrong-typed field is dropped
    /// and the rest of the update still applies. Unknown keys are ignored, as
    /// is anything that is not an object.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        let string = |name: &str| obj.get(name).and_then(Value::as_str).map(str::to_owned);
        let number = |name: &str| {
            obj.get(name)
                .and_then(Value::as_f64)
                .map(|v| v as f32)
                .filter(|v| v.is_finite())
        };
        Self {
            key: string("key"),
            scale: string("scale"),
            retune: number("retune"),
            humanize: number("humanize"),
            gate_db: number("gateDb"),
            enabled: obj.get("enabled").and_then(Value::as_bool),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Correction is switched off; nothing was read or commanded.
    Disabled,
    /// No usable pitch; the shift was relaxed toward zero.
    Unvoiced,
    /// A target note was chosen and a ramp toward it commanded.
    Corrected {
        target_midi: i32,
        continuous_midi: f32,
        shift: f32,
    },
    /// The frame could not be read; the shift was relaxed toward zero.
    Faulted,
}

/// Runs the correction loop for one voice against host-provided primitives.
pub struct Corrector {
    config: EngineConfig,
    state: CorrectionState,
    scale: &'static ScaleDefinition,
    detector: YinDetector,
    quantizer: ScaleQuantizer,
    frame: Vec<f32>,
    source: Box<dyn FrameSource>,
    shifter: Box<dyn PitchShifter>,
    gate: Box<dyn NoiseGate>,
}

impl Corrector {
    /// Creates a controller with default state and pushes the default gate
    /// threshold to the host gate.
    pub fn new(
        config: EngineConfig,
        source: Box<dyn FrameSource>,
        shifter: Box<dyn PitchShifter>,
        gate: Box<dyn NoiseGate>,
    ) -> Self {
        let state = CorrectionState::default();
        let mut corrector = Self {
            scale: scale::lookup(&state.scale_name),
            detector: YinDetector::new(config.detector_params()),
            quantizer: ScaleQuantizer::new(config.hysteresis_semitones),
            frame: vec![0.0; config.frame_size],
            config,
            state,
            source,
            shifter,
            gate,
        };
        corrector.push_gate_threshold();
        corrector
    }

    pub fn state(&self) -> &CorrectionState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Applies a partial update field by field.
    pub fn apply(&mut self, patch: &StatePatch) {
        let previous_key = self.state.key_pitch_class;
        let previous_scale = self.scale.name;

        if let Some(key) = &patch.key {
            match tuning::pitch_class_from_name(key) {
                Some(pc) => self.state.key_pitch_class = pc,
                None => log::debug!("ignoring unknown key name {key:?}"),
            }
        }

        if let Some(name) = &patch.scale {
            let def = scale::find(name).unwrap_or_else(|| {
                log::info!("unknown scale {name:?}, falling back to {}", scale::CHROMATIC);
                scale::chromatic()
            });
            self.scale = def;
            self.state.scale_name = def.name.to_string();
        }

        // The held target may not belong to the new key or scale.
        if self.state.key_pitch_class != previous_key || self.scale.name != previous_scale {
            self.state.target_midi = None;
        }

        if let Some(retune) = patch.retune.filter(|r| r.is_finite()) {
            self.state.retune_seconds = retune.clamp(RETUNE_MIN, RETUNE_MAX);
        }

        if let Some(humanize) = patch.humanize.filter(|h| h.is_finite()) {
            self.state.humanize = humanize;
        }

        if let Some(db) = patch.gate_db.filter(|db| db.is_finite()) {
            self.state.gate_threshold_db = db;
            self.push_gate_threshold();
        }

        if let Some(enabled) = patch.enabled {
            let was_enabled = self.state.enabled;
            self.state.enabled = enabled;
            if was_enabled && !enabled {
                // Leave the signal unshifted while bypassed.
                self.state.target_midi = None;
                self.ramp(0.0, self.config.voicing_release_secs);
            }
        }
    }

    /// Runs one tick of the correction loop.
    ///
    /// Never fails: host errors are logged and the shift falls back toward
    /// zero, so the next tick starts from a sane place.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.state.enabled {
            return TickOutcome::Disabled;
        }

        if let Err(e) = self.source.read_frame(&mut self.frame) {
            log::warn!("tick: failed to read analysis frame: {e:#}");
            self.relax();
            return TickOutcome::Faulted;
        }

        let result = self.detector.detect(&self.frame, self.source.sample_rate());
        let frequency = match result.frequency_hz {
            Some(freq) if result.confidence >= self.config.confidence_cutoff => freq,
            _ => {
                log::trace!("tick: unvoiced (confidence {:.2})", result.confidence);
                self.relax();
                return TickOutcome::Unvoiced;
            }
        };

        let continuous_midi = tuning::freq_to_midi(frequency);
        let target_midi = self.quantizer.quantize(
            continuous_midi,
            self.state.key_pitch_class,
            self.scale.offsets,
            self.state.target_midi,
        );
        self.state.target_midi = Some(target_midi);

        let limit = self.shift_limit();
        let shift = (target_midi as f32 - continuous_midi).clamp(-limit, limit);
        log::debug!(
            "tick: {frequency:.1} Hz ({:+.0} cents from {}{}, confidence {:.2}) shift {shift:+.2}",
            tuning::calculate_cents_deviation(frequency, tuning::midi_to_freq(target_midi as f32)),
            tuning::note_name(tuning::pitch_class_of(target_midi)),
            target_midi.div_euclid(12) - 1,
            result.confidence,
        );

        self.ramp(shift, self.state.retune_seconds.max(RETUNE_MIN));

        TickOutcome::Corrected {
            target_midi,
            continuous_midi,
            shift,
        }
    }

    /// Ramps the shift back to zero over the stop release time and clears
    /// the target. Returns whether the shifter accepted the command.
    pub fn release_to_zero(&mut self) -> bool {
        self.state.target_midi = None;
        self.ramp(0.0, self.config.stop_release_secs)
    }

    /// Frees detection buffers and the host's analysis handle.
    pub fn release_resources(&mut self) {
        self.detector.release();
        self.frame = Vec::new();
        self.source.release();
    }

    /// Unvoiced path: drop the target and relax toward zero.
    fn relax(&mut self) {
        self.state.target_midi = None;
        self.ramp(0.0, self.config.voicing_release_secs);
    }

    fn ramp(&mut self, semitones: f32, duration_secs: f32) -> bool {
        match self.shifter.ramp_to(semitones, duration_secs) {
            Ok(()) => {
                self.state.last_shift_semitones = semitones;
                true
            }
            Err(e) => {
                log::warn!("pitch shifter rejected ramp to {semitones:+.2} st: {e:#}");
                false
            }
        }
    }

    fn push_gate_threshold(&mut self) {
        let db = self.state.gate_threshold_db;
        if let Err(e) = self.gate.set_threshold(db) {
            log::warn!("gate rejected threshold {db} dB: {e:#}");
        }
    }

    fn shift_limit(&self) -> f32 {
        let limit = self.config.max_shift_semitones;
        if limit.is_finite() {
            limit.clamp(0.0, MAX_SHIFT)
        } else {
            MAX_SHIFT
        }
    }
}

impl std::fmt::Debug for Corrector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Corrector")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
