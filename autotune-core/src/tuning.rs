//! # Musical Tuning Module
//!
//! Note names, pitch classes and the equal-temperament conversions between
//! frequency and MIDI note numbers used by the correction loop.
//!
//! ## Features
//! - Pitch class lookup from note names with sharps or flats
//! - Frequency ↔ continuous MIDI conversion (A4 = 440 Hz = MIDI 69)
//! - Cent deviation calculations

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Reference pitch of A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

/// MIDI note number of A4.
pub const A4_MIDI: f32 = 69.0;

/// Canonical names of the twelve pitch classes, indexed by pitch class (C = 0).
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Static map from lower-cased note spellings to pitch classes.
///
/// Both sharp and flat spellings are present so that "Db" and "C#" resolve
/// to the same pitch class. Enharmonics that cross the octave ("Cb", "B#")
/// are included as well.
static NOTE_MAP: Lazy<BTreeMap<String, u8>> = Lazy::new(|| {
    const FLAT_NAMES: [&str; 12] = [
        "C", "Db", "D", "Eb", "Fb", "F", "Gb", "G", "Ab", "A", "Bb", "Cb",
    ];
    let mut map = BTreeMap::new();
    for (pc, name) in NOTE_NAMES.iter().enumerate() {
        map.insert(name.to_ascii_lowercase(), pc as u8);
    }
    for (pc, name) in FLAT_NAMES.iter().enumerate() {
        map.insert(name.to_ascii_lowercase(), pc as u8);
    }
    map.insert("e#".to_string(), 5);
    map.insert("b#".to_string(), 0);
    map
});

/// Looks up the pitch class (0-11) of a note name such as "A", "C#" or "Bb".
///
/// Matching is case-insensitive and ignores surrounding whitespace.
/// Returns `None` for anything that is not a note name.
pub fn pitch_class_from_name(name: &str) -> Option<u8> {
    NOTE_MAP.get(&name.trim().to_ascii_lowercase()).copied()
}

/// Returns the canonical (sharp) name of a pitch class. Values above 11 wrap.
pub fn note_name(pitch_class: u8) -> &'static str {
    NOTE_NAMES[(pitch_class % 12) as usize]
}

/// Pitch class of an integer MIDI note, valid for negative notes too.
pub fn pitch_class_of(midi: i32) -> u8 {
    midi.rem_euclid(12) as u8
}

/// Converts a frequency in Hz to a continuous MIDI note number.
///
/// `69 + 12 * log2(f / 440)`. Non-positive input yields `-inf` or NaN, so
/// callers only pass detector output, which is always inside the band.
pub fn freq_to_midi(freq: f32) -> f32 {
    A4_MIDI + 12.0 * (freq / A4_FREQUENCY).log2()
}

/// Converts a (possibly fractional) MIDI note number to a frequency in Hz.
pub fn midi_to_freq(midi: f32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI) / 12.0)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values indicate sharpness, negative values flatness.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
