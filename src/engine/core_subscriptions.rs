use tokio::runtime::Builder;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::{UnboundedReceiverStream, WatchStream};
use tokio_stream::Stream;

use super::PracticeEngine;
use crate::practice::{HudSnapshot, PracticeEvent};

impl PracticeEngine {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    /// Latest-value HUD channel; slow readers only ever see the newest snapshot
    pub fn subscribe_hud(&self) -> watch::Receiver<HudSnapshot> {
        self.hud_tx.subscribe()
    }

    pub fn hud_snapshot(&self) -> HudSnapshot {
        self.hud_tx.borrow().clone()
    }

    /// One-shot events (`PassNotice`, `MicError`, `SessionFinished`)
    pub fn subscribe_events(&self) -> broadcast::Receiver<PracticeEvent> {
        self.events_tx.subscribe()
    }

    /// Events forwarded onto an unbounded channel by a helper thread
    ///
    /// For callers without a Tokio runtime. The helper exits when the
    /// receiver is dropped or the engine goes away.
    pub fn subscribe_events_unbounded(&self) -> mpsc::UnboundedReceiver<PracticeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.events_tx.subscribe();

        std::thread::spawn(move || {
            let rt = match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(err) => {
                    tracing::error!("[PracticeEngine] Failed to create event runtime: {}", err);
                    return;
                }
            };
            rt.block_on(async move {
                loop {
                    match broadcast_rx.recv().await {
                        Ok(event) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("[PracticeEngine] Event subscriber lagged by {}", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        });

        rx
    }

    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    pub fn hud_stream(&self) -> impl Stream<Item = HudSnapshot> + Unpin {
        WatchStream::new(self.subscribe_hud())
    }

    pub fn event_stream(&self) -> impl Stream<Item = PracticeEvent> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_events_unbounded())
    }
}
