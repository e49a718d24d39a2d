//! # Scale Table
//!
//! Static lookup of named scales to the semitone offsets they allow above a
//! root pitch class. Unknown names fall back to the chromatic scale, which is
//! the superset of every other entry.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Name of the widest scale, used whenever a lookup misses.
pub const CHROMATIC: &str = "chromatic";

/// A named scale: the set of allowed offsets (0-11) above the key's root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleDefinition {
    pub name: &'static str,
    pub offsets: &'static [u8],
}

impl ScaleDefinition {
    /// Allowed pitch classes for this scale rooted at `key_pitch_class`,
    /// as a 12-slot membership table.
    pub fn allowed_pitch_classes(&self, key_pitch_class: u8) -> [bool; 12] {
        allowed_pitch_classes(key_pitch_class, self.offsets)
    }
}

const SCALES: &[ScaleDefinition] = &[
    ScaleDefinition { name: CHROMATIC, offsets: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11] },
    ScaleDefinition { name: "major", offsets: &[0, 2, 4, 5, 7, 9, 11] },
    ScaleDefinition { name: "minor", offsets: &[0, 2, 3, 5, 7, 8, 10] },
    ScaleDefinition { name: "harmonic_minor", offsets: &[0, 2, 3, 5, 7, 8, 11] },
    ScaleDefinition { name: "melodic_minor", offsets: &[0, 2, 3, 5, 7, 9, 11] },
    ScaleDefinition { name: "pentatonic_major", offsets: &[0, 2, 4, 7, 9] },
    ScaleDefinition { name: "pentatonic_minor", offsets: &[0, 3, 5, 7, 10] },
    ScaleDefinition { name: "blues", offsets: &[0, 3, 5, 6, 7, 10] },
    ScaleDefinition { name: "dorian", offsets: &[0, 2, 3, 5, 7, 9, 10] },
    ScaleDefinition { name: "phrygian", offsets: &[0, 1, 3, 5, 7, 8, 10] },
    ScaleDefinition { name: "lydian", offsets: &[0, 2, 4, 6, 7, 9, 11] },
    ScaleDefinition { name: "mixolydian", offsets: &[0, 2, 4, 5, 7, 9, 10] },
    ScaleDefinition { name: "locrian", offsets: &[0, 1, 3, 5, 6, 8, 10] },
    ScaleDefinition { name: "whole_tone", offsets: &[0, 2, 4, 6, 8, 10] },
];

/// Lookup table keyed by canonical scale name, plus a few common aliases.
static SCALE_TABLE: Lazy<BTreeMap<&'static str, &'static ScaleDefinition>> = Lazy::new(|| {
    let mut table: BTreeMap<&'static str, &'static ScaleDefinition> =
        SCALES.iter().map(|s| (s.name, s)).collect();
    for (alias, target) in [
        ("ionian", "major"),
        ("natural_minor", "minor"),
        ("aeolian", "minor"),
        ("minor_pentatonic", "pentatonic_minor"),
        ("major_pentatonic", "pentatonic_major"),
    ] {
        if let Some(def) = table.get(target).copied() {
            table.insert(alias, def);
        }
    }
    table
});

/// Normalises a user-facing scale name: lower case, with spaces and hyphens
/// folded to underscores ("Harmonic Minor" -> "harmonic_minor").
fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Finds a scale by name, or `None` if the name is not in the table.
pub fn find(name: &str) -> Option<&'static ScaleDefinition> {
    SCALE_TABLE.get(normalize(name).as_str()).copied()
}

/// Finds a scale by name, falling back to the chromatic scale.
pub fn lookup(name: &str) -> &'static ScaleDefinition {
    find(name).unwrap_or_else(chromatic)
}

/// The chromatic scale.
pub fn chromatic() -> &'static ScaleDefinition {
    &SCALES[0]
}

/// Canonical names of all scales in table order.
pub fn names() -> impl Iterator<Item = &'static str> {
    SCALES.iter().map(|s| s.name)
}

/// Builds the membership table `{(key + o) mod 12 : o in offsets}`.
pub fn allowed_pitch_classes(key_pitch_class: u8, offsets: &[u8]) -> [bool; 12] {
    let mut allowed = [false; 12];
    for &offset in offsets {
        allowed[((key_pitch_class as usize) + (offset as usize)) % 12] = true;
    }
    allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_major_pitch_classes() {
        let allowed = lookup("major").allowed_pitch_classes(0);
        let pcs: Vec<usize> = (0..12).filter(|&pc| allowed[pc]).collect();
        assert_eq!(pcs, vec![0, 2, 4, 5, 7, 9, 11]);
    }

    #[test]
    fn test_rooted_scale_wraps() {
        // A minor: A B C D E F G
        let allowed = lookup("minor").allowed_pitch_classes(9);
        for pc in [9, 11, 0, 2, 4, 5, 7] {
            assert!(allowed[pc], "pitch class {pc} should be in A minor");
        }
        assert!(!allowed[10]);
    }

    #[test]
    fn test_name_normalisation_and_aliases() {
        assert_eq!(lookup("Major").name, "major");
        assert_eq!(lookup("Harmonic Minor").name, "harmonic_minor");
        assert_eq!(lookup("pentatonic-major").name, "pentatonic_major");
        assert_eq!(lookup("Natural Minor").name, "minor");
    }

    #[test]
    fn test_unknown_scale_falls_back_to_chromatic() {
        assert!(find("bebop dominant").is_none());
        assert_eq!(lookup("bebop dominant").name, CHROMATIC);
        assert_eq!(lookup("").offsets.len(), 12);
    }

    #[test]
    fn test_every_scale_is_a_subset_of_chromatic() {
        for name in names() {
            let def = lookup(name);
            assert!(!def.offsets.is_empty());
            assert!(def.offsets.iter().all(|&o| o < 12), "{name} has offset >= 12");
        }
    }
}
