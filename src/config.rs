//! Configuration management for dynamic parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! so detector thresholds, matching windows and click scheduling can be
//! adjusted for a given microphone or room without recompilation.
//! Per-session musical settings live in [`SessionConfig`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::SessionError;

/// Lowest supported tempo
pub const MIN_BPM: u32 = 40;
/// Highest supported tempo
pub const MAX_BPM: u32 = 240;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub onset_detection: OnsetDetectionConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub click: ClickConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// Hysteresis onset detector parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetDetectionConfig {
    /// RMS level that arms an onset (attack threshold)
    pub energy_threshold: f32,
    /// RMS level below which the detector re-arms (must be below the attack threshold)
    pub energy_release: f32,
    /// Hard minimum time between two onsets
    pub cooldown_ms: u32,
    /// Samples per RMS analysis frame
    pub frame_size: usize,
}

impl Default for OnsetDetectionConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.08,
            energy_release: 0.05,
            cooldown_ms: 120,
            // ~94 frames per second at 48 kHz
            frame_size: 512,
        }
    }
}

/// Onset-to-slot matching parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Maximum |onset - slot| distance counted as a hit
    pub tolerance_ms: u32,
    /// Time after the last slot deadline before the cycle is force-finalized
    pub finalize_grace_ms: u32,
    /// Gap between the end of the count-in and the first slot
    pub start_epsilon_ms: u32,
    /// Resolve unknown roman numerals to the tonic instead of rejecting them
    pub allow_unknown_numerals: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: 120,
            finalize_grace_ms: 300,
            start_epsilon_ms: 20,
            allow_unknown_numerals: false,
        }
    }
}

/// Metronome look-ahead scheduling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickConfig {
    /// How far ahead of the clock pulses are queued
    pub look_ahead_ms: u32,
    /// How often the scheduler tops up the queue
    pub scheduler_period_ms: u32,
    /// Length of one rendered pulse
    pub pulse_duration_ms: u32,
    /// Pitch of the first beat of each bar
    pub accent_freq_hz: f32,
    /// Pitch of the remaining beats
    pub beat_freq_hz: f32,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            look_ahead_ms: 2000,
            scheduler_period_ms: 100,
            pulse_duration_ms: 30,
            accent_freq_hz: 1500.0,
            beat_freq_hz: 1000.0,
        }
    }
}

/// Audio engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Size of buffer pool for real-time audio transfer
    pub buffer_pool_size: usize,
    /// Size of each audio buffer in samples
    pub buffer_size: usize,
    /// Sleep between worker loop iterations when no audio is pending
    pub poll_interval_ms: u64,
    /// Minimum interval between HUD snapshot publications
    pub hud_interval_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            buffer_pool_size: 64,
            buffer_size: 2048,
            poll_interval_ms: 5,
            hud_interval_ms: 50,
        }
    }
}

/// Progress ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Accuracy percentage that counts as passing a (tone, progression) pair
    pub pass_threshold: u32,
    /// JSON file holding best accuracies
    pub store_path: String,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 60,
            store_path: "strum_progress.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Falls back to defaults (with a warning) if the file is missing or
    /// the JSON is invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file("assets/strum_config.json")
    }
}

/// Strum direction requested for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrumDirection {
    #[default]
    Down,
    Up,
}

/// Musical settings for one practice session, immutable once started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub bpm: u32,
    /// Beats per bar
    pub time_signature: u32,
    /// Slots per bar for pattern parsing; chord scheduling stays one chord per bar
    pub subdivision: u32,
    /// Key context, e.g. "C / Am"
    pub tone: String,
    /// Roman-numeral template, e.g. "I-V-vi-IV"
    pub progression_preset: String,
    /// Number of chord slots in one cycle
    pub chord_target: usize,
    pub click_enabled: bool,
    pub click_volume: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bpm: 80,
            time_signature: 4,
            subdivision: 4,
            tone: "C / Am".to_string(),
            progression_preset: "I-V-vi-IV".to_string(),
            chord_target: 20,
            click_enabled: true,
            click_volume: 0.8,
        }
    }
}

impl SessionConfig {
    /// Check ranges and normalize the click volume
    pub fn validate(&mut self) -> Result<(), SessionError> {
        if !(MIN_BPM..=MAX_BPM).contains(&self.bpm) {
            return Err(SessionError::InvalidConfig {
                reason: format!("bpm {} outside {}..={}", self.bpm, MIN_BPM, MAX_BPM),
            });
        }
        if self.time_signature == 0 {
            return Err(SessionError::InvalidConfig {
                reason: "time signature must have at least one beat per bar".to_string(),
            });
        }
        if self.subdivision == 0 {
            return Err(SessionError::InvalidConfig {
                reason: "subdivision must be positive".to_string(),
            });
        }
        if self.chord_target == 0 {
            return Err(SessionError::InvalidConfig {
                reason: "chord target must be positive".to_string(),
            });
        }
        if !self.click_volume.is_finite() {
            self.click_volume = 0.0;
        }
        self.click_volume = self.click_volume.clamp(0.0, 1.0);
        Ok(())
    }

    /// Seconds per beat
    pub fn beat_length(&self) -> f64 {
        60.0 / self.bpm as f64
    }

    /// Seconds per bar: `time_signature * 60 / bpm`
    pub fn bar_length(&self) -> f64 {
        self.time_signature as f64 * self.beat_length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.onset_detection.energy_threshold, 0.08);
        assert_eq!(config.onset_detection.energy_release, 0.05);
        assert_eq!(config.onset_detection.cooldown_ms, 120);
        assert_eq!(config.matching.tolerance_ms, 120);
        assert_eq!(config.matching.finalize_grace_ms, 300);
        assert_eq!(config.click.look_ahead_ms, 2000);
        assert_eq!(config.progress.pass_threshold, 60);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"matching": {"tolerance_ms": 90}}"#).unwrap();
        assert_eq!(parsed.matching.tolerance_ms, 90);
        assert_eq!(parsed.matching.finalize_grace_ms, 300);
        assert_eq!(parsed.onset_detection.frame_size, 512);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/strum_config.json");
        assert_eq!(config.audio.buffer_pool_size, 64);
    }

    #[test]
    fn test_bar_length_is_exact() {
        let config = SessionConfig {
            bpm: 80,
            time_signature: 4,
            ..SessionConfig::default()
        };
        assert_eq!(config.bar_length(), 3.0);
        assert_eq!(config.beat_length(), 0.75);
    }

    #[test]
    fn test_session_config_validation() {
        let mut config = SessionConfig {
            bpm: 30,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfig { .. })
        ));

        let mut config = SessionConfig {
            chord_target: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = SessionConfig {
            click_volume: 3.0,
            ..SessionConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(config.click_volume, 1.0);
    }

    #[test]
    fn test_session_config_camel_case_json() {
        let parsed: SessionConfig = serde_json::from_str(
            r#"{"bpm": 90, "timeSignature": 3, "tone": "G / Em", "progressionPreset": "I-IV-V", "chordTarget": 6}"#,
        )
        .unwrap();
        assert_eq!(parsed.time_signature, 3);
        assert_eq!(parsed.chord_target, 6);
        assert!(parsed.click_enabled);
    }
}
