//! Scale quantization with hysteresis.
//!
//! Maps a continuous MIDI pitch onto the nearest note whose pitch class the
//! current key and scale allow. A small hysteresis buffer keeps the previous
//! target while the singer hovers between two neighbouring candidates.

use crate::scale;
use crate::tuning::pitch_class_of;

/// Default hysteresis buffer in semitones.
pub const DEFAULT_HYSTERESIS: f32 = 0.2;

/// Quantizer with a configurable hysteresis buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleQuantizer {
    /// A new candidate must be closer than the previous target by more
    /// than this many semitones before the target moves.
    pub hysteresis: f32,
}

impl Default for ScaleQuantizer {
    fn default() -> Self {
        Self {
            hysteresis: DEFAULT_HYSTERESIS,
        }
    }
}

impl ScaleQuantizer {
    pub fn new(hysteresis: f32) -> Self {
        Self {
            hysteresis: hysteresis.max(0.0),
        }
    }

    /// Snaps `pitch` (continuous MIDI) to an allowed note, preferring
    /// `previous_target` unless the fresh candidate is clearly closer.
    pub fn quantize(
        &self,
        pitch: f32,
        key_pitch_class: u8,
        scale_offsets: &[u8],
        previous_target: Option<i32>,
    ) -> i32 {
        let candidate = nearest_allowed(pitch, key_pitch_class, scale_offsets);
        let allowed = scale::allowed_pitch_classes(key_pitch_class, effective_offsets(scale_offsets));

        // A previous target outside the current key/scale is never held.
        match previous_target {
            Some(previous) if previous != candidate && allowed[pitch_class_of(previous) as usize] => {
                let candidate_distance = (pitch - candidate as f32).abs();
                let previous_distance = (pitch - previous as f32).abs();
                if candidate_distance < previous_distance - self.hysteresis {
                    candidate
                } else {
                    previous
                }
            }
            _ => candidate,
        }
    }
}

/// Nearest note to `pitch` whose pitch class is in the key/scale, ignoring
/// hysteresis.
///
/// Searches outward from the rounded pitch, lower neighbour first, and stops
/// at the first radius that contains an allowed note. An empty offset list is
/// treated as chromatic.
pub fn nearest_allowed(pitch: f32, key_pitch_class: u8, scale_offsets: &[u8]) -> i32 {
    let allowed = scale::allowed_pitch_classes(key_pitch_class, effective_offsets(scale_offsets));
    if !pitch.is_finite() {
        return (0..12).find(|&pc| allowed[pc as usize]).unwrap_or(0);
    }
    // Clamped so the outward search below cannot overflow.
    let base = (pitch.round() as i32).clamp(i32::MIN + 12, i32::MAX - 12);

    // Every octave holds at least one allowed pitch class, so radius 6
    // always finds one; 12 bounds the loop regardless.
    for delta in 0..=12 {
        let mut best: Option<i32> = None;
        for candidate in [base - delta, base + delta] {
            if !allowed[pitch_class_of(candidate) as usize] {
                continue;
            }
            best = match best {
                Some(b) if (pitch - b as f32).abs() <= (pitch - candidate as f32).abs() => Some(b),
                _ => Some(candidate),
            };
        }
        if let Some(found) = best {
            return found;
        }
    }
    base
}

fn effective_offsets(scale_offsets: &[u8]) -> &[u8] {
    if scale_offsets.is_empty() {
        scale::chromatic().offsets
    } else {
        scale_offsets
    }
}

/// Quantizes with the default hysteresis buffer.
pub fn quantize(
    pitch: f32,
    key_pitch_class: u8,
    scale_offsets: &[u8],
    previous_target: Option<i32>,
) -> i32 {
    ScaleQuantizer::default().quantize(pitch, key_pitch_class, scale_offsets, previous_target)
}
