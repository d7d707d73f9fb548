// Audio module - audio clock, low-latency I/O and click-track scheduling

pub mod buffer_pool;
pub mod click;
pub mod clock;
pub mod engine_cpal;

// Re-export commonly used types for convenience
pub use buffer_pool::{
    AnalysisThreadChannels, AudioBuffer, AudioThreadChannels, BufferPool, BufferPoolChannels,
    DEFAULT_BUFFER_COUNT, DEFAULT_BUFFER_SIZE,
};
pub use click::{synthesize_click, ClickLog, ClickPulse, ClickSink, ClickTrack};
pub use clock::{AudioClock, FrameClock, ManualClock};
pub use engine_cpal::{AudioEngine, ClickCommand, ClickRenderer, QueuedClickSink};
