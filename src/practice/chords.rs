//! Chord catalog - tone → diatonic chord labels, and progression parsing
//!
//! A tone lists the seven diatonic triads of a major key (scale degrees
//! I..vii°). A progression preset is a dash-separated roman-numeral template
//! resolved against a tone into concrete chord labels.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Number of diatonic scale degrees per tone
pub const DEGREES: usize = 7;

static BUILTIN: Lazy<ChordCatalog> = Lazy::new(ChordCatalog::builtin_tables);

/// Read-only tone and progression tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChordCatalog {
    tones: BTreeMap<String, Vec<String>>,
    presets: Vec<String>,
}

impl ChordCatalog {
    /// Shared built-in catalog
    pub fn builtin() -> &'static ChordCatalog {
        &BUILTIN
    }

    fn builtin_tables() -> Self {
        let rows: [(&str, [&str; DEGREES]); 8] = [
            ("C / Am", ["C", "Dm", "Em", "F", "G", "Am", "B°"]),
            ("G / Em", ["G", "Am", "Bm", "C", "D", "Em", "F#°"]),
            ("D / Bm", ["D", "Em", "F#m", "G", "A", "Bm", "C#°"]),
            ("A / F#m", ["A", "Bm", "C#m", "D", "E", "F#m", "G#°"]),
            ("E / C#m", ["E", "F#m", "G#m", "A", "B", "C#m", "D#°"]),
            ("F / Dm", ["F", "Gm", "Am", "Bb", "C", "Dm", "E°"]),
            ("Bb / Gm", ["Bb", "Cm", "Dm", "Eb", "F", "Gm", "A°"]),
            ("Eb / Cm", ["Eb", "Fm", "Gm", "Ab", "Bb", "Cm", "D°"]),
        ];

        let tones = rows
            .iter()
            .map(|(tone, chords)| {
                (
                    tone.to_string(),
                    chords.iter().map(|c| c.to_string()).collect(),
                )
            })
            .collect();

        let presets = [
            "I-V-vi-IV",
            "I-IV-V",
            "ii-V-I",
            "I-vi-IV-V",
            "vi-IV-I-V",
            "I-IV-vi-V",
            "I-V-IV-V",
            "I-iii-IV-V",
        ]
        .iter()
        .map(|p| p.to_string())
        .collect();

        Self { tones, presets }
    }

    /// Load a catalog from a JSON file of the same shape as the built-in one
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let contents = fs::read_to_string(&path).map_err(|err| SessionError::InvalidConfig {
            reason: format!("reading catalog {:?}: {}", path.as_ref(), err),
        })?;
        let catalog: ChordCatalog =
            serde_json::from_str(&contents).map_err(|err| SessionError::InvalidConfig {
                reason: format!("parsing catalog {:?}: {}", path.as_ref(), err),
            })?;

        if let Some((tone, chords)) = catalog.tones.iter().find(|(_, c)| c.len() != DEGREES) {
            return Err(SessionError::InvalidConfig {
                reason: format!("tone '{}' lists {} chords, expected {}", tone, chords.len(), DEGREES),
            });
        }
        Ok(catalog)
    }

    pub fn tones(&self) -> impl Iterator<Item = &str> {
        self.tones.keys().map(String::as_str)
    }

    pub fn presets(&self) -> &[String] {
        &self.presets
    }

    /// Diatonic chord labels for a tone
    pub fn chords_for(&self, tone: &str) -> Option<&[String]> {
        self.tones.get(tone.trim()).map(Vec::as_slice)
    }

    /// Resolve a progression against a tone into chord labels
    ///
    /// Unknown numerals are rejected unless `allow_unknown` is set, in which
    /// case they degrade to the tonic.
    pub fn resolve(
        &self,
        tone: &str,
        progression: &str,
        allow_unknown: bool,
    ) -> Result<Vec<String>, SessionError> {
        let chords = self
            .chords_for(tone)
            .ok_or_else(|| SessionError::UnknownTone {
                tone: tone.to_string(),
            })?;

        let mut resolved = Vec::new();
        for token in progression_tokens(progression) {
            let degree = match degree_index(token) {
                Some(degree) => degree,
                None if allow_unknown => {
                    log::warn!(
                        "[ChordCatalog] Unknown numeral '{}' in '{}', using tonic",
                        token,
                        progression
                    );
                    0
                }
                None => {
                    return Err(SessionError::UnknownNumeral {
                        token: token.to_string(),
                        progression: progression.to_string(),
                    })
                }
            };
            let chord = chords.get(degree).ok_or_else(|| SessionError::InvalidConfig {
                reason: format!(
                    "tone '{}' has no chord for '{}' ({} listed)",
                    tone.trim(),
                    token,
                    chords.len()
                ),
            })?;
            resolved.push(chord.clone());
        }

        if resolved.is_empty() {
            return Err(SessionError::EmptyProgression {
                progression: progression.to_string(),
            });
        }
        Ok(resolved)
    }
}

/// Split a progression template into its roman-numeral tokens
pub fn progression_tokens(progression: &str) -> impl Iterator<Item = &str> {
    progression
        .split('-')
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Scale-degree index of a roman numeral (I=0 .. vii°=6)
///
/// Case-insensitive; a trailing `°`, `o` or `dim` is ignored.
pub fn degree_index(token: &str) -> Option<usize> {
    let lowered = token.trim().to_lowercase();
    let base = lowered
        .strip_suffix('°')
        .or_else(|| lowered.strip_suffix("dim"))
        .or_else(|| lowered.strip_suffix('o'))
        .unwrap_or(&lowered);

    match base {
        "i" => Some(0),
        "ii" => Some(1),
        "iii" => Some(2),
        "iv" => Some(3),
        "v" => Some(4),
        "vi" => Some(5),
        "vii" => Some(6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_index_mapping() {
        assert_eq!(degree_index("I"), Some(0));
        assert_eq!(degree_index("ii"), Some(1));
        assert_eq!(degree_index("iii"), Some(2));
        assert_eq!(degree_index("IV"), Some(3));
        assert_eq!(degree_index("V"), Some(4));
        assert_eq!(degree_index("vi"), Some(5));
        assert_eq!(degree_index("vii°"), Some(6));
        assert_eq!(degree_index("viio"), Some(6));
        assert_eq!(degree_index("viidim"), Some(6));
        assert_eq!(degree_index("IIV"), None);
        assert_eq!(degree_index(""), None);
    }

    #[test]
    fn test_resolve_pop_progression_in_c() {
        let chords = ChordCatalog::builtin()
            .resolve("C / Am", "I-V-vi-IV", false)
            .unwrap();
        assert_eq!(chords, vec!["C", "G", "Am", "F"]);
    }

    #[test]
    fn test_resolve_tolerates_whitespace() {
        let chords = ChordCatalog::builtin()
            .resolve(" G / Em ", "ii - V - I", false)
            .unwrap();
        assert_eq!(chords, vec!["Am", "D", "G"]);
    }

    #[test]
    fn test_unknown_numeral_rejected_by_default() {
        let err = ChordCatalog::builtin()
            .resolve("C / Am", "I-IIV-V", false)
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownNumeral { ref token, .. } if token == "IIV"));
    }

    #[test]
    fn test_unknown_numeral_falls_back_to_tonic_when_allowed() {
        let chords = ChordCatalog::builtin()
            .resolve("C / Am", "I-IIV-V", true)
            .unwrap();
        assert_eq!(chords, vec!["C", "C", "G"]);
    }

    #[test]
    fn test_unknown_tone_and_empty_progression() {
        let catalog = ChordCatalog::builtin();
        assert!(matches!(
            catalog.resolve("H / X", "I", false),
            Err(SessionError::UnknownTone { .. })
        ));
        assert!(matches!(
            catalog.resolve("C / Am", " - ", false),
            Err(SessionError::EmptyProgression { .. })
        ));
    }

    fn write_catalog(name: &str, json: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "strum_trainer_catalog_{}_{}.json",
            name,
            std::process::id()
        ));
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_catalog_file_replaces_builtin_tables() {
        let path = write_catalog(
            "valid",
            r#"{
                "tones": { "Ab / Fm": ["Ab", "Bbm", "Cm", "Db", "Eb", "Fm", "G°"] },
                "presets": ["I-IV-V"]
            }"#,
        );

        let catalog = ChordCatalog::from_json_file(&path).unwrap();
        assert_eq!(catalog.tones().collect::<Vec<_>>(), vec!["Ab / Fm"]);
        assert_eq!(catalog.presets(), ["I-IV-V"]);
        assert_eq!(
            catalog.resolve("Ab / Fm", "I-IV-V", false).unwrap(),
            vec!["Ab", "Db", "Eb"]
        );
        assert!(matches!(
            catalog.resolve("C / Am", "I", false),
            Err(SessionError::UnknownTone { .. })
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_catalog_file_with_short_tone_is_rejected() {
        let path = write_catalog(
            "short",
            r#"{ "tones": { "C / Am": ["C", "Dm", "Em"] }, "presets": ["I-V"] }"#,
        );

        let err = ChordCatalog::from_json_file(&path).unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfig { ref reason } if reason.contains("lists 3 chords")));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_catalog_file_missing_or_malformed() {
        let missing = std::env::temp_dir().join("strum_trainer_catalog_absent.json");
        assert!(matches!(
            ChordCatalog::from_json_file(&missing),
            Err(SessionError::InvalidConfig { .. })
        ));

        let path = write_catalog("malformed", "{\"tones\": [");
        assert!(matches!(
            ChordCatalog::from_json_file(&path),
            Err(SessionError::InvalidConfig { .. })
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_unvalidated_short_tone_errors_instead_of_panicking() {
        let catalog: ChordCatalog = serde_json::from_str(
            r#"{ "tones": { "C / Am": ["C", "Dm", "Em"] }, "presets": [] }"#,
        )
        .unwrap();

        assert_eq!(catalog.resolve("C / Am", "I-iii", false).unwrap(), vec!["C", "Em"]);
        assert!(matches!(
            catalog.resolve("C / Am", "I-V", false),
            Err(SessionError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_every_builtin_tone_has_seven_degrees() {
        let catalog = ChordCatalog::builtin();
        for tone in catalog.tones() {
            assert_eq!(catalog.chords_for(tone).unwrap().len(), DEGREES, "{}", tone);
        }
        for preset in catalog.presets() {
            assert!(catalog.resolve("D / Bm", preset, false).is_ok(), "{}", preset);
        }
    }
}
