//! Note and key-binding tables, and resolution of input to frequencies.
//!
//! Frequencies are octave-0 values; the keyboard scales them by its octave
//! multiplier at play time.

use serde::Serialize;

/// One chromatic note at octave 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Note {
    pub name: &'static str,
    pub base_frequency: f64,
}

/// A physical key bound to a note name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub input_key: char,
    pub note_name: &'static str,
}

/// Outcome of resolving an input to a frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Bound(f64),
    Unbound,
}

impl Resolution {
    pub fn frequency(self) -> Option<f64> {
        match self {
            Resolution::Bound(f) => Some(f),
            Resolution::Unbound => None,
        }
    }
}

// ── Tables ──────────────────────────────────────────────────

/// The note table, in rendering order.
pub const NOTES: [Note; 12] = [
    Note { name: "C", base_frequency: 16.35 },
    Note { name: "C#", base_frequency: 17.32 },
    Note { name: "D", base_frequency: 18.35 },
    Note { name: "D#", base_frequency: 19.45 },
    Note { name: "E", base_frequency: 20.60 },
    Note { name: "F", base_frequency: 21.83 },
    Note { name: "F#", base_frequency: 23.12 },
    Note { name: "G", base_frequency: 24.50 },
    Note { name: "G#", base_frequency: 25.96 },
    Note { name: "A", base_frequency: 27.50 },
    Note { name: "A#", base_frequency: 29.14 },
    Note { name: "B", base_frequency: 30.87 },
];

/// Home-row layout: white keys on `a d f g h k l`, sharps on the row above.
pub const KEY_BINDINGS: [KeyBinding; 12] = [
    KeyBinding { input_key: 'a', note_name: "C" },
    KeyBinding { input_key: 'w', note_name: "C#" },
    KeyBinding { input_key: 'd', note_name: "D" },
    KeyBinding { input_key: 'r', note_name: "D#" },
    KeyBinding { input_key: 'f', note_name: "E" },
    KeyBinding { input_key: 'g', note_name: "F" },
    KeyBinding { input_key: 'y', note_name: "F#" },
    KeyBinding { input_key: 'h', note_name: "G" },
    KeyBinding { input_key: 'u', note_name: "G#" },
    KeyBinding { input_key: 'k', note_name: "A" },
    KeyBinding { input_key: 'o', note_name: "A#" },
    KeyBinding { input_key: 'l', note_name: "B" },
];

// ── Lookup ──────────────────────────────────────────────────

/// Base frequency of a note name, e.g. `"F#"`.
pub fn note_frequency(name: &str) -> Option<f64> {
    NOTES
        .iter()
        .find(|n| n.name == name)
        .map(|n| n.base_frequency)
}

/// Note name bound to a physical key, if any.
pub fn binding_for(key: char) -> Option<&'static str> {
    KEY_BINDINGS
        .iter()
        .find(|b| b.input_key == key)
        .map(|b| b.note_name)
}

pub fn is_sharp(name: &str) -> bool {
    name.contains('#')
}

/// Resolve a `KeyboardEvent.key`-style string. Only single characters from
/// the binding table are bound; matching is case-sensitive.
pub fn resolve_key(key: &str) -> Resolution {
    let mut chars = key.chars();
    let (Some(ch), None) = (chars.next(), chars.next()) else {
        return Resolution::Unbound;
    };

    binding_for(ch)
        .and_then(note_frequency)
        .map_or(Resolution::Unbound, Resolution::Bound)
}

/// Resolve the `data-frequency` attribute of a clicked element. Clicks that
/// land outside a rendered key carry no attribute and resolve to `Unbound`.
pub fn resolve_dataset(frequency: Option<&str>) -> Resolution {
    match frequency.map(str::trim).map(str::parse::<f64>) {
        Some(Ok(f)) if f.is_finite() && f > 0.0 => Resolution::Bound(f),
        _ => Resolution::Unbound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_binding_names_a_note() {
        for binding in KEY_BINDINGS {
            assert!(
                note_frequency(binding.note_name).is_some(),
                "{} is bound to unknown note {}",
                binding.input_key,
                binding.note_name
            );
        }
    }

    #[test]
    fn bindings_cover_one_chromatic_octave_in_order() {
        let names: Vec<_> = KEY_BINDINGS.iter().map(|b| b.note_name).collect();
        let table: Vec<_> = NOTES.iter().map(|n| n.name).collect();
        assert_eq!(names, table);
    }

    #[test]
    fn base_frequencies_are_octave_zero() {
        for note in NOTES {
            assert!(
                (16.0..32.0).contains(&note.base_frequency),
                "{} out of range: {}",
                note.name,
                note.base_frequency
            );
        }
        assert!(NOTES.windows(2).all(|w| w[0].base_frequency < w[1].base_frequency));
    }

    #[test]
    fn resolves_bound_keys() {
        assert_eq!(resolve_key("a"), Resolution::Bound(16.35));
        assert_eq!(resolve_key("k"), Resolution::Bound(27.50));
        assert_eq!(resolve_key("o"), Resolution::Bound(29.14));
    }

    #[test]
    fn unbound_keys_resolve_to_unbound() {
        for key in ["q", "A", "z", " ", "", "Shift", "aw"] {
            assert_eq!(resolve_key(key), Resolution::Unbound, "key {key:?}");
        }
    }

    #[test]
    fn dataset_bypasses_binding_table() {
        assert_eq!(resolve_dataset(Some("123.5")), Resolution::Bound(123.5));
        assert_eq!(resolve_dataset(Some("16.35")).frequency(), Some(16.35));
    }

    #[test]
    fn missing_or_garbage_dataset_is_unbound() {
        assert_eq!(resolve_dataset(None), Resolution::Unbound);
        assert_eq!(resolve_dataset(Some("")), Resolution::Unbound);
        assert_eq!(resolve_dataset(Some("undefined")), Resolution::Unbound);
        assert_eq!(resolve_dataset(Some("-4")), Resolution::Unbound);
        assert_eq!(resolve_dataset(Some("NaN")), Resolution::Unbound);
    }

    #[test]
    fn sharp_detection() {
        assert!(is_sharp("C#"));
        assert!(!is_sharp("C"));
    }
}
