// AudioEngine - cpal input/output streams driving the AudioClock
//
// The output stream is the timing master: its callback advances the shared
// frame counter (the FrameClock) and mixes scheduled click pulses in on their
// exact frame. The input stream mono-mixes microphone frames into pooled
// buffers stamped with the FrameClock time of their first sample.
//
// Click pulses reach the output callback through an rtrb command queue, so
// neither callback ever locks or allocates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer};
use tokio::sync::mpsc;

use super::buffer_pool::{AnalysisThreadChannels, AudioThreadChannels, BufferPool};
use super::click::{synthesize_click, ClickPulse, ClickSink};
use super::clock::{AudioClock, FrameClock};
use crate::config::{AudioConfig, ClickConfig};
use crate::error::AudioError;

/// Capacity of the click command queue
const CLICK_QUEUE_CAPACITY: usize = 256;
/// Maximum number of overlapping click voices in the output callback
const MAX_VOICES: usize = 32;

/// Command sent from the practice worker to the output callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickCommand {
    Schedule { frame: u64, accent: bool, volume: f32 },
    CancelAll,
}

/// [`ClickSink`] feeding the output callback's command queue
pub struct QueuedClickSink {
    producer: Producer<ClickCommand>,
    clock: FrameClock,
}

impl QueuedClickSink {
    pub fn new(producer: Producer<ClickCommand>, clock: FrameClock) -> Self {
        Self { producer, clock }
    }
}

impl ClickSink for QueuedClickSink {
    fn schedule(&mut self, pulse: ClickPulse) {
        let command = ClickCommand::Schedule {
            frame: self.clock.frame_at(pulse.time),
            accent: pulse.accent,
            volume: pulse.volume,
        };
        if self.producer.push(command).is_err() {
            tracing::warn!(
                "[AudioEngine] Click queue full, dropping pulse at {:.3}s",
                pulse.time
            );
        }
    }

    fn cancel_all(&mut self) {
        if self.producer.push(ClickCommand::CancelAll).is_err() {
            tracing::warn!("[AudioEngine] Click queue full, cancel not delivered");
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Voice {
    start_frame: u64,
    accent: bool,
    volume: f32,
}

/// Real-time mixer for scheduled click pulses
///
/// Lives inside the output callback. Bursts are synthesized once up front;
/// voices live in a pre-allocated vector.
pub struct ClickRenderer {
    commands: Consumer<ClickCommand>,
    accent_burst: Vec<f32>,
    beat_burst: Vec<f32>,
    voices: Vec<Voice>,
}

impl ClickRenderer {
    pub fn new(commands: Consumer<ClickCommand>, config: &ClickConfig, sample_rate: u32) -> Self {
        Self {
            commands,
            accent_burst: synthesize_click(config, true, sample_rate),
            beat_burst: synthesize_click(config, false, sample_rate),
            voices: Vec::with_capacity(MAX_VOICES),
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                ClickCommand::Schedule {
                    frame,
                    accent,
                    volume,
                } => {
                    if self.voices.len() < MAX_VOICES {
                        self.voices.push(Voice {
                            start_frame: frame,
                            accent,
                            volume,
                        });
                    }
                }
                ClickCommand::CancelAll => self.voices.clear(),
            }
        }
    }

    /// Render interleaved output starting at `first_frame`
    pub fn render(&mut self, data: &mut [f32], channels: usize, first_frame: u64) {
        self.drain_commands();

        let channels = channels.max(1);
        let frame_count = data.len() / channels;
        for i in 0..frame_count {
            let frame = first_frame + i as u64;
            let mut sample = 0.0_f32;
            for voice in &self.voices {
                if frame < voice.start_frame {
                    continue;
                }
                let burst = if voice.accent {
                    &self.accent_burst
                } else {
                    &self.beat_burst
                };
                let offset = (frame - voice.start_frame) as usize;
                if let Some(value) = burst.get(offset) {
                    sample += value * voice.volume;
                }
            }
            let sample = sample.clamp(-1.0, 1.0);
            for ch in 0..channels {
                data[i * channels + ch] = sample;
            }
        }

        let end_frame = first_frame + frame_count as u64;
        let accent_len = self.accent_burst.len() as u64;
        let beat_len = self.beat_burst.len() as u64;
        self.voices.retain(|voice| {
            let len = if voice.accent { accent_len } else { beat_len };
            voice.start_frame + len > end_frame
        });
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }
}

/// Handles produced by a successfully opened engine
pub struct OpenedStreams {
    pub clock: FrameClock,
    pub capture: AnalysisThreadChannels,
    pub capture_sample_rate: u32,
    pub click_sink: QueuedClickSink,
}

/// Desktop audio engine owning both cpal streams
///
/// `cpal::Stream` is not `Send` on every host, so the engine must stay on
/// the thread that opened it.
pub struct AudioEngine {
    input_stream: Option<cpal::Stream>,
    output_stream: Option<cpal::Stream>,
}

impl AudioEngine {
    /// Open and start the default output and input devices
    ///
    /// # Errors
    /// - `DeviceUnavailable` when there is no usable output device
    /// - `MicrophoneUnavailable` when the input device is missing or refuses to open
    /// - `StreamOpenFailed` / `HardwareError` for other output failures
    pub fn open(
        audio: &AudioConfig,
        click: &ClickConfig,
        input_errors: mpsc::UnboundedSender<String>,
    ) -> Result<(Self, OpenedStreams), AudioError> {
        let host = cpal::default_host();
        let frame_counter = Arc::new(AtomicU64::new(0));

        let output_device =
            host.default_output_device()
                .ok_or_else(|| AudioError::DeviceUnavailable {
                    details: "No default output device found".to_string(),
                })?;
        let output_config =
            output_device
                .default_output_config()
                .map_err(|e| AudioError::DeviceUnavailable {
                    details: format!("Failed to get default output config: {}", e),
                })?;
        let sample_rate = output_config.sample_rate().0;
        let clock = FrameClock::new(Arc::clone(&frame_counter), sample_rate);

        let (click_producer, click_consumer) = rtrb::RingBuffer::new(CLICK_QUEUE_CAPACITY);
        let renderer = ClickRenderer::new(click_consumer, click, sample_rate);
        let output_stream = Self::build_output_stream(
            &output_device,
            output_config,
            renderer,
            Arc::clone(&frame_counter),
        )?;

        let (audio_channels, capture) =
            BufferPool::new(audio.buffer_pool_size, audio.buffer_size).split_for_threads();
        let (input_stream, capture_sample_rate) =
            Self::build_input_stream(&host, audio_channels, clock.clone(), input_errors)?;

        output_stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Output start failed: {}", e),
        })?;
        input_stream
            .play()
            .map_err(|e| AudioError::MicrophoneUnavailable {
                details: format!("Input start failed: {}", e),
            })?;

        tracing::info!(
            "[AudioEngine] Streams running (output {} Hz, input {} Hz)",
            sample_rate,
            capture_sample_rate
        );

        let engine = AudioEngine {
            input_stream: Some(input_stream),
            output_stream: Some(output_stream),
        };
        let opened = OpenedStreams {
            click_sink: QueuedClickSink::new(click_producer, clock.clone()),
            clock,
            capture,
            capture_sample_rate,
        };
        Ok((engine, opened))
    }

    fn build_output_stream(
        device: &cpal::Device,
        config: cpal::SupportedStreamConfig,
        mut renderer: ClickRenderer,
        frame_counter: Arc<AtomicU64>,
    ) -> Result<cpal::Stream, AudioError> {
        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels_count = stream_config.channels as usize;
        let err_fn = |err| tracing::error!("[AudioEngine] Output stream error: {}", err);

        match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let first_frame = frame_counter.load(Ordering::Relaxed);
                    renderer.render(data, channels_count, first_frame);
                    let frame_count = (data.len() / channels_count.max(1)) as u64;
                    frame_counter.fetch_add(frame_count, Ordering::Release);
                },
                err_fn,
                None,
            ),
            _ => {
                return Err(AudioError::StreamOpenFailed {
                    reason: "Only F32 sample format is currently supported for output".to_string(),
                })
            }
        }
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })
    }

    fn build_input_stream(
        host: &cpal::Host,
        mut channels: AudioThreadChannels,
        clock: FrameClock,
        input_errors: mpsc::UnboundedSender<String>,
    ) -> Result<(cpal::Stream, u32), AudioError> {
        let device =
            host.default_input_device()
                .ok_or_else(|| AudioError::MicrophoneUnavailable {
                    details: "No default input device found".to_string(),
                })?;
        let config =
            device
                .default_input_config()
                .map_err(|e| AudioError::MicrophoneUnavailable {
                    details: format!("Failed to get default input config: {}", e),
                })?;

        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels_count = (stream_config.channels as usize).max(1);
        let sample_rate = stream_config.sample_rate.0.max(1);
        let err_fn = move |err: cpal::StreamError| {
            tracing::error!("[AudioEngine] Input stream error: {}", err);
            let _ = input_errors.send(err.to_string());
        };

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let frames = data.len() / channels_count;
                    let time = (clock.now() - frames as f64 / sample_rate as f64).max(0.0);
                    if let Ok(mut buffer) = channels.pool_consumer.pop() {
                        buffer.fill_from(
                            data.chunks(channels_count)
                                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                            time,
                        );
                        let _ = channels.data_producer.push(buffer);
                    }
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let frames = data.len() / channels_count;
                    let time = (clock.now() - frames as f64 / sample_rate as f64).max(0.0);
                    if let Ok(mut buffer) = channels.pool_consumer.pop() {
                        buffer.fill_from(
                            data.chunks(channels_count).map(|frame| {
                                frame.iter().map(|&s| s as f32 / i16::MAX as f32).sum::<f32>()
                                    / frame.len() as f32
                            }),
                            time,
                        );
                        let _ = channels.data_producer.push(buffer);
                    }
                },
                err_fn,
                None,
            ),
            other => {
                return Err(AudioError::MicrophoneUnavailable {
                    details: format!("Unsupported input sample format {:?}", other),
                })
            }
        }
        .map_err(|e| AudioError::MicrophoneUnavailable {
            details: format!("{:?}", e),
        })?;

        Ok((stream, sample_rate))
    }

    /// Stop both streams; safe to call more than once
    pub fn stop(&mut self) {
        if let Some(stream) = self.input_stream.take() {
            if let Err(err) = stream.pause() {
                tracing::debug!("[AudioEngine] Input pause failed during stop: {}", err);
            }
        }
        if let Some(stream) = self.output_stream.take() {
            if let Err(err) = stream.pause() {
                tracing::debug!("[AudioEngine] Output pause failed during stop: {}", err);
            }
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> (Producer<ClickCommand>, ClickRenderer) {
        let (producer, consumer) = rtrb::RingBuffer::new(16);
        let renderer = ClickRenderer::new(consumer, &ClickConfig::default(), 48000);
        (producer, renderer)
    }

    #[test]
    fn test_pulse_starts_on_exact_frame() {
        let (mut producer, mut renderer) = renderer();
        producer
            .push(ClickCommand::Schedule {
                frame: 100,
                accent: true,
                volume: 1.0,
            })
            .unwrap();

        let mut data = vec![0.0_f32; 256];
        renderer.render(&mut data, 1, 0);

        assert!(data[..=100].iter().all(|&s| s == 0.0));
        assert!(data[101] != 0.0, "burst should sound right after its start frame");
        assert_eq!(renderer.active_voices(), 1);
    }

    #[test]
    fn test_stereo_output_is_duplicated() {
        let (mut producer, mut renderer) = renderer();
        producer
            .push(ClickCommand::Schedule {
                frame: 0,
                accent: false,
                volume: 0.5,
            })
            .unwrap();

        let mut data = vec![0.0_f32; 64];
        renderer.render(&mut data, 2, 0);
        for frame in data.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_cancel_all_silences_pending_pulses() {
        let (mut producer, mut renderer) = renderer();
        producer
            .push(ClickCommand::Schedule {
                frame: 10,
                accent: false,
                volume: 1.0,
            })
            .unwrap();
        producer.push(ClickCommand::CancelAll).unwrap();

        let mut data = vec![0.0_f32; 128];
        renderer.render(&mut data, 1, 0);
        assert!(data.iter().all(|&s| s == 0.0));
        assert_eq!(renderer.active_voices(), 0);
    }

    #[test]
    fn test_finished_voices_are_released() {
        let (mut producer, mut renderer) = renderer();
        producer
            .push(ClickCommand::Schedule {
                frame: 0,
                accent: false,
                volume: 1.0,
            })
            .unwrap();

        // 30 ms at 48 kHz is 1440 frames
        let mut data = vec![0.0_f32; 2048];
        renderer.render(&mut data, 1, 0);
        assert_eq!(renderer.active_voices(), 0);
    }

    #[test]
    fn test_queued_sink_converts_time_to_frames() {
        let (producer, mut consumer) = rtrb::RingBuffer::new(4);
        let clock = FrameClock::new(Arc::new(AtomicU64::new(0)), 48000);
        let mut sink = QueuedClickSink::new(producer, clock);

        sink.schedule(ClickPulse {
            time: 1.5,
            accent: true,
            volume: 0.8,
        });
        sink.cancel_all();

        assert_eq!(
            consumer.pop().unwrap(),
            ClickCommand::Schedule {
                frame: 72000,
                accent: true,
                volume: 0.8
            }
        );
        assert_eq!(consumer.pop().unwrap(), ClickCommand::CancelAll);
    }
}
