//! CPAL-based audio backend for desktop platforms (Linux, macOS, Windows)
//!
//! `cpal::Stream` cannot cross threads on every host, so the streams live on
//! a dedicated host thread. `open` waits for that thread to report the opened
//! handles; `close` signals it and joins.

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::audio::engine_cpal::AudioEngine;
use crate::error::AudioError;

use super::{AudioBackend, AudioSession, EngineStartContext};

struct HostThread {
    shutdown_tx: std_mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// CPAL-based audio backend
#[derive(Default)]
pub struct CpalBackend {
    host: Mutex<Option<HostThread>>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioBackend for CpalBackend {
    fn open(&self, ctx: EngineStartContext) -> Result<AudioSession, AudioError> {
        let mut host = self.host.lock().map_err(|_| AudioError::LockPoisoned {
            component: "cpal_host".to_string(),
        })?;
        if host.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("cpal-host".to_string())
            .spawn(move || {
                let (mut engine, opened) =
                    match AudioEngine::open(&ctx.audio, &ctx.click, ctx.input_errors) {
                        Ok(pair) => pair,
                        Err(err) => {
                            let _ = ready_tx.send(Err(err));
                            return;
                        }
                    };

                let session = AudioSession {
                    clock: Arc::new(opened.clock),
                    capture: opened.capture,
                    capture_sample_rate: opened.capture_sample_rate,
                    click_sink: Box::new(opened.click_sink),
                };
                if ready_tx.send(Ok(session)).is_err() {
                    engine.stop();
                    return;
                }

                // Blocks until close() signals or the backend is dropped
                let _ = shutdown_rx.recv();
                engine.stop();
                tracing::info!("[CpalBackend] Streams closed");
            })
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to spawn audio host thread: {}", e),
            })?;

        match ready_rx.recv() {
            Ok(Ok(session)) => {
                *host = Some(HostThread {
                    shutdown_tx,
                    handle,
                });
                Ok(session)
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::StreamOpenFailed {
                    reason: "Audio host thread exited before opening streams".to_string(),
                })
            }
        }
    }

    fn close(&self) -> Result<(), AudioError> {
        let thread = self
            .host
            .lock()
            .map_err(|_| AudioError::LockPoisoned {
                component: "cpal_host".to_string(),
            })?
            .take()
            .ok_or(AudioError::NotRunning)?;

        let _ = thread.shutdown_tx.send(());
        thread.handle.join().map_err(|_| AudioError::HardwareError {
            details: "Audio host thread panicked".to_string(),
        })
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
