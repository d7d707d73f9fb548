//! Backend abstractions for the practice engine.
//!
//! A backend owns the platform audio devices. Opening it yields the audio
//! clock, the capture queue and a click sink; everything above this layer is
//! platform independent.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::buffer_pool::AnalysisThreadChannels;
use crate::audio::click::ClickSink;
use crate::audio::clock::AudioClock;
use crate::config::{AudioConfig, ClickConfig};
use crate::error::AudioError;

/// Context provided to audio backends when opening the devices.
pub struct EngineStartContext {
    pub audio: AudioConfig,
    pub click: ClickConfig,
    /// Receives a message when the microphone fails mid-session
    pub input_errors: mpsc::UnboundedSender<String>,
}

/// Handles produced by a successfully opened backend.
pub struct AudioSession {
    pub clock: Arc<dyn AudioClock>,
    pub capture: AnalysisThreadChannels,
    pub capture_sample_rate: u32,
    pub click_sink: Box<dyn ClickSink>,
}

/// Trait implemented by platform-specific audio backends.
///
/// `open` fails with a microphone error (see
/// [`AudioError::is_microphone_failure`]) when capture is unavailable; in
/// that case nothing stays open.
pub trait AudioBackend: Send + Sync {
    fn open(&self, ctx: EngineStartContext) -> Result<AudioSession, AudioError>;
    fn close(&self) -> Result<(), AudioError>;
}

mod cpal;
pub use cpal::CpalBackend;

mod stub;
pub use stub::StubBackend;
