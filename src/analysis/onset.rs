// OnsetDetector - RMS energy onset detection with hysteresis
//
// A strum is detected when frame energy crosses an attack threshold while the
// detector is armed. The detector only re-arms once energy falls below a lower
// release threshold, so the ripple of one sustained strum cannot re-trigger.
// A hard cooldown additionally enforces a minimum inter-onset time.
//
// States:
//   armed (below)  --rms >= threshold && cooldown elapsed-->  fired (above)  [emit onset]
//   fired (above)  --rms < release-->                          armed (below)

use serde::{Deserialize, Serialize};

use crate::config::OnsetDetectionConfig;

/// A detected strum, timestamped in audio-clock seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnsetEvent {
    /// AudioClock time of the frame that crossed the threshold
    pub time: f64,
    /// RMS magnitude of that frame
    pub energy: f32,
}

/// Compute the root-mean-square energy of a frame
///
/// Returns 0.0 for an empty frame.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = frame
        .iter()
        .map(|&sample| (sample as f64) * (sample as f64))
        .sum();
    (sum_squares / frame.len() as f64).sqrt() as f32
}

/// Hysteresis onset detector
#[derive(Debug, Clone)]
pub struct OnsetDetector {
    energy_threshold: f32,
    energy_release: f32,
    cooldown_s: f64,
    is_above_threshold: bool,
    last_onset_time: Option<f64>,
}

impl OnsetDetector {
    /// Create a detector with the default thresholds (0.08 attack, 0.05 release, 120 ms cooldown)
    pub fn new() -> Self {
        Self::with_config(&OnsetDetectionConfig::default())
    }

    /// Create a detector with explicit configuration parameters
    ///
    /// A release threshold at or above the attack threshold would disable the
    /// hysteresis band, so it is clamped just below the attack threshold.
    pub fn with_config(config: &OnsetDetectionConfig) -> Self {
        let energy_threshold = config.energy_threshold.max(f32::EPSILON);
        let mut energy_release = config.energy_release.max(0.0);
        if energy_release >= energy_threshold {
            log::warn!(
                "[OnsetDetector] release {} >= threshold {}, clamping release",
                energy_release,
                energy_threshold
            );
            energy_release = energy_threshold * 0.625;
        }

        Self {
            energy_threshold,
            energy_release,
            cooldown_s: config.cooldown_ms as f64 / 1000.0,
            is_above_threshold: false,
            last_onset_time: None,
        }
    }

    /// Feed one frame's RMS energy observed at `now` (AudioClock seconds)
    ///
    /// Returns an onset when the detector fires. Crossings inside the
    /// cooldown window are dropped, never queued.
    pub fn process(&mut self, rms: f32, now: f64) -> Option<OnsetEvent> {
        if self.is_above_threshold {
            if rms < self.energy_release {
                self.is_above_threshold = false;
            }
            return None;
        }

        if rms < self.energy_threshold {
            return None;
        }

        let cooled_down = self
            .last_onset_time
            .map(|last| now - last >= self.cooldown_s)
            .unwrap_or(true);
        if !cooled_down {
            return None;
        }

        self.is_above_threshold = true;
        self.last_onset_time = Some(now);
        Some(OnsetEvent { time: now, energy: rms })
    }

    /// Convenience wrapper computing RMS over `frame` first
    pub fn process_frame(&mut self, frame: &[f32], now: f64) -> Option<OnsetEvent> {
        self.process(rms(frame), now)
    }

    /// Clear hysteresis state so the next session starts clean
    pub fn reset(&mut self) {
        self.is_above_threshold = false;
        self.last_onset_time = None;
    }

    pub fn is_above_threshold(&self) -> bool {
        self.is_above_threshold
    }

    pub fn last_onset_time(&self) -> Option<f64> {
        self.last_onset_time
    }
}

impl Default for OnsetDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_constant_signal() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5; 256]) - 0.5).abs() < 1e-6);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_fires_on_threshold_crossing() {
        let mut detector = OnsetDetector::new();
        assert!(detector.process(0.01, 0.0).is_none());

        let onset = detector.process(0.2, 0.5).expect("should fire");
        assert_eq!(onset.time, 0.5);
        assert_eq!(onset.energy, 0.2);
        assert!(detector.is_above_threshold());
    }

    #[test]
    fn test_hysteresis_band_does_not_retrigger() {
        let mut detector = OnsetDetector::new();
        assert!(detector.process(0.1, 1.0).is_some());

        // Ripple between release (0.05) and threshold (0.08), then back above,
        // well past the cooldown: still the same strum.
        for (i, level) in [0.06, 0.07, 0.12, 0.06, 0.09].iter().enumerate() {
            let t = 1.5 + i as f64 * 0.2;
            assert!(
                detector.process(*level, t).is_none(),
                "level {} at {} must not re-trigger",
                level,
                t
            );
        }
        assert!(detector.is_above_threshold());
    }

    #[test]
    fn test_release_rearms_detector() {
        let mut detector = OnsetDetector::new();
        assert!(detector.process(0.1, 1.0).is_some());
        assert!(detector.process(0.04, 1.2).is_none());
        assert!(!detector.is_above_threshold());

        let second = detector.process(0.1, 1.4).expect("re-armed detector fires");
        assert_eq!(second.time, 1.4);
    }

    #[test]
    fn test_cooldown_drops_early_onsets() {
        let mut detector = OnsetDetector::new();
        assert!(detector.process(0.2, 2.0).is_some());
        assert!(detector.process(0.0, 2.03).is_none());

        // Re-armed but only 60 ms since the last onset
        assert!(detector.process(0.2, 2.06).is_none());
        assert!(!detector.is_above_threshold());
        assert_eq!(detector.last_onset_time(), Some(2.0));

        // Cooldown elapsed
        assert!(detector.process(0.2, 2.12).is_some());
    }

    #[test]
    fn test_reset_clears_state() {
        let mut detector = OnsetDetector::new();
        detector.process(0.3, 5.0);
        detector.reset();
        assert!(!detector.is_above_threshold());
        assert_eq!(detector.last_onset_time(), None);
        assert!(detector.process(0.3, 5.01).is_some());
    }

    #[test]
    fn test_inverted_thresholds_are_clamped() {
        let config = OnsetDetectionConfig {
            energy_threshold: 0.08,
            energy_release: 0.1,
            ..OnsetDetectionConfig::default()
        };
        let mut detector = OnsetDetector::with_config(&config);
        assert!(detector.process(0.09, 0.0).is_some());
        // 0.07 would be "below release" with the raw config; the clamped
        // release (0.05) keeps the detector latched.
        assert!(detector.process(0.07, 0.5).is_none());
        assert!(detector.is_above_threshold());
    }

    #[test]
    fn test_process_frame_uses_rms() {
        let mut detector = OnsetDetector::new();
        let quiet = vec![0.01_f32; 512];
        let loud = vec![0.3_f32; 512];
        assert!(detector.process_frame(&quiet, 0.0).is_none());
        assert!(detector.process_frame(&loud, 0.01).is_some());
    }
}
