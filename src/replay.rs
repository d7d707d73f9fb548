//! Offline replay - run a full practice cycle against a recording
//!
//! The recording stands in for the microphone and its sample position
//! stands in for the AudioClock: the count-in starts at t=0, every analysis
//! frame is fed to the session at the time of its first sample, and the
//! session is ticked at the end of each frame. Once the file runs out the
//! clock keeps advancing in frame steps until the cycle finalizes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::analysis::onset::{rms, OnsetEvent};
use crate::audio::click::ClickLog;
use crate::config::{AppConfig, SessionConfig};
use crate::error::ReplayError;
use crate::practice::{
    ChordCatalog, PracticeEvent, ProgressLedger, SessionController, SessionState, SessionSummary,
};

/// Everything a replayed cycle produced
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub summary: SessionSummary,
    pub onsets: Vec<OnsetEvent>,
    pub events: Vec<PracticeEvent>,
    /// Click pulses that were still queued when the cycle ended
    pub clicks_scheduled: usize,
}

/// Decode a PCM WAV file into mono samples in -1.0..=1.0
///
/// Multi-channel files are averaged down to mono.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32), ReplayError> {
    let path = path.as_ref();
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(ReplayError::UnsupportedFormat {
            reason: format!("{} has zero channels", path.display()),
        });
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            16 => reader
                .samples::<i16>()
                .map(|sample| sample.map(|v| v as f32 / i16::MAX as f32))
                .collect::<Result<Vec<f32>, _>>()?,
            24 | 32 => {
                let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / max))
                    .collect::<Result<Vec<f32>, _>>()?
            }
            bits => {
                return Err(ReplayError::UnsupportedFormat {
                    reason: format!("unsupported bits_per_sample={} for {}", bits, path.display()),
                })
            }
        },
    };

    if spec.channels == 1 {
        return Ok((samples, spec.sample_rate));
    }

    let channels = spec.channels as usize;
    let mono = samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

/// Replay a WAV file through one practice cycle
pub fn replay_wav<P: AsRef<Path>>(
    path: P,
    session_config: SessionConfig,
    app: &AppConfig,
    catalog: &ChordCatalog,
    ledger: Arc<Mutex<ProgressLedger>>,
) -> Result<ReplayReport, ReplayError> {
    let (samples, sample_rate) = read_wav(path)?;
    replay_samples(&samples, sample_rate, session_config, app, catalog, ledger)
}

/// Replay mono samples through one practice cycle
///
/// # Errors
/// - `Session` when the config is rejected
/// - `Incomplete` if the cycle somehow fails to finalize
pub fn replay_samples(
    samples: &[f32],
    sample_rate: u32,
    session_config: SessionConfig,
    app: &AppConfig,
    catalog: &ChordCatalog,
    ledger: Arc<Mutex<ProgressLedger>>,
) -> Result<ReplayReport, ReplayError> {
    if sample_rate == 0 {
        return Err(ReplayError::UnsupportedFormat {
            reason: "sample rate is zero".to_string(),
        });
    }

    let mut session = SessionController::new(session_config, app, catalog, ledger)?;
    let mut clicks = ClickLog::new();
    session.start(0.0, &mut clicks)?;

    let frame_size = app.onset_detection.frame_size.max(1);
    let frame_duration = frame_size as f64 / sample_rate as f64;
    let mut onsets = Vec::new();
    let mut events = Vec::new();
    let mut now = 0.0;

    for (index, frame) in samples.chunks(frame_size).enumerate() {
        let frame_time = (index * frame_size) as f64 / sample_rate as f64;
        if let Some(onset) = session.feed_energy(rms(frame), frame_time) {
            onsets.push(onset);
        }
        now = frame_time + frame.len() as f64 / sample_rate as f64;
        events.extend(session.tick(now, &mut clicks));
        if session.state() == SessionState::Finalized {
            break;
        }
    }

    // Keep the clock running past the end of the recording
    let config = session.config();
    let horizon = session.start_at().unwrap_or(0.0)
        + (config.chord_target + 1) as f64 * config.bar_length()
        + app.matching.finalize_grace_ms as f64 / 1000.0
        + 1.0;
    while session.state() != SessionState::Finalized && now < horizon {
        now += frame_duration;
        events.extend(session.tick(now, &mut clicks));
    }

    let clicks_scheduled = clicks.pending().len();
    let summary = session.summary().cloned().ok_or(ReplayError::Incomplete)?;
    session.stop(now, &mut clicks);

    tracing::info!(
        "[Replay] {} / {}: {}/{} correct ({}%), {} onset(s)",
        summary.tone,
        summary.progression,
        summary.correct,
        summary.attempts,
        summary.accuracy_percent,
        onsets.len()
    );

    Ok(ReplayReport {
        summary,
        onsets,
        events,
        clicks_scheduled,
    })
}
