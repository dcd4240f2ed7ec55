// THEORY:
// The display is the only process-wide mutable state in the engine: the one
// `FrameResult` currently being shown. This module owns it.
//
// Key architectural principles:
// 1.  **Swap-and-release**: `DisplaySlot::handoff` publishes the new result and takes
//     back the previous one in a single `watch::Sender::send_replace`. The previous
//     result is then dropped, which releases its four buffers exactly once. Observers
//     holding an `Arc` to the old result keep it alive until they let go, so a buffer is
//     never freed while something still shows it.
// 2.  **Single writer**: the slot takes `&mut self` for every mutation. In a live
//     session the slot lives inside the `Presenter` actor task and is reached only
//     through its message channel, so handoffs are serialized by construction.
// 3.  **Whole snapshots**: readers receive a `DisplaySnapshot` containing an
//     `Option<Arc<FrameResult>>`. They see either nothing or one complete result,
//     never buffers from two different frames.

use crate::error::{VisionError, VisionResult};
use crate::pipeline::{FrameResult, View};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Counters kept by the display slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayStats {
    /// Results published.
    pub handoffs: u64,
    /// Previously displayed results released by a handoff or reset.
    pub released: u64,
    pub resets: u64,
    /// Handoffs whose sequence was older than the result they replaced.
    pub out_of_order: u64,
}

/// What an observer sees at one instant.
#[derive(Debug, Clone, Default)]
pub struct DisplaySnapshot {
    pub frame: Option<Arc<FrameResult>>,
    pub stats: DisplayStats,
}

impl DisplaySnapshot {
    pub fn labels(&self) -> DisplayLabels {
        self.frame
            .as_deref()
            .map(DisplayLabels::from_result)
            .unwrap_or_default()
    }
}

/// Human-readable captions for the four views and the timing readout.
/// All empty when nothing is displayed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayLabels {
    pub original: String,
    pub grayscale: String,
    pub black_and_white: String,
    pub edges: String,
    pub elapsed: String,
}

impl DisplayLabels {
    pub fn from_result(result: &FrameResult) -> Self {
        Self {
            original: result.resolution_label(View::Original),
            grayscale: result.resolution_label(View::Grayscale),
            black_and_white: result.resolution_label(View::BlackAndWhite),
            edges: result.resolution_label(View::Edges),
            elapsed: result.elapsed_label(),
        }
    }
}

/// Owner of the currently displayed `FrameResult`.
pub struct DisplaySlot {
    published: watch::Sender<DisplaySnapshot>,
}

impl Default for DisplaySlot {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySlot {
    pub fn new() -> Self {
        let (published, _) = watch::channel(DisplaySnapshot::default());
        Self { published }
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplaySnapshot> {
        self.published.subscribe()
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        self.published.borrow().clone()
    }

    pub fn current(&self) -> Option<Arc<FrameResult>> {
        self.published.borrow().frame.clone()
    }

    /// Publishes `next` and releases whatever was displayed before.
    pub fn handoff(&mut self, next: FrameResult) {
        let stats = {
            let shown = self.published.borrow();
            let mut stats = shown.stats.clone();
            stats.handoffs += 1;
            if let Some(previous) = shown.frame.as_deref() {
                stats.released += 1;
                if next.sequence() < previous.sequence() {
                    stats.out_of_order += 1;
                    debug!(
                        shown = previous.sequence(),
                        incoming = next.sequence(),
                        "older frame replaced a newer one"
                    );
                }
            }
            stats
        };
        let sequence = next.sequence();
        let previous = self.published.send_replace(DisplaySnapshot {
            frame: Some(Arc::new(next)),
            stats,
        });
        drop(previous);
        debug!(sequence, "frame handed off to display");
    }

    /// Clears the display and releases the shown result, if any.
    pub fn clear(&mut self) {
        let stats = {
            let shown = self.published.borrow();
            let mut stats = shown.stats.clone();
            stats.resets += 1;
            if shown.frame.is_some() {
                stats.released += 1;
            }
            stats
        };
        let previous = self.published.send_replace(DisplaySnapshot { frame: None, stats });
        drop(previous);
        debug!("display cleared");
    }
}

enum DisplayMessage {
    Present(FrameResult),
    Reset(oneshot::Sender<()>),
    Shutdown,
}

/// Actor task that owns the `DisplaySlot`. All display mutation goes through it.
pub struct Presenter {
    slot: DisplaySlot,
    inbox: mpsc::Receiver<DisplayMessage>,
}

impl Presenter {
    /// Spawns the presenter on the current tokio runtime. The task ends when every
    /// handle is dropped or `shutdown` is called, returning the final counters.
    pub fn spawn(capacity: usize) -> (PresenterHandle, JoinHandle<DisplayStats>) {
        let (tx, inbox) = mpsc::channel(capacity.max(1));
        let slot = DisplaySlot::new();
        let view = slot.subscribe();
        let presenter = Presenter { slot, inbox };
        let task = tokio::spawn(presenter.run());
        (PresenterHandle { tx, view }, task)
    }

    async fn run(mut self) -> DisplayStats {
        while let Some(msg) = self.inbox.recv().await {
            match msg {
                DisplayMessage::Present(result) => self.slot.handoff(result),
                DisplayMessage::Reset(ack) => {
                    self.slot.clear();
                    let _ = ack.send(());
                }
                DisplayMessage::Shutdown => break,
            }
        }
        if self.slot.current().is_some() {
            self.slot.clear();
        }
        self.slot.snapshot().stats
    }
}

/// Cloneable access to a running `Presenter`.
#[derive(Clone)]
pub struct PresenterHandle {
    tx: mpsc::Sender<DisplayMessage>,
    view: watch::Receiver<DisplaySnapshot>,
}

impl PresenterHandle {
    /// Queues `result` for display. Handoffs happen in the order they are queued.
    pub async fn present(&self, result: FrameResult) -> VisionResult<()> {
        self.tx
            .send(DisplayMessage::Present(result))
            .await
            .map_err(|_| VisionError::Disconnected)
    }

    /// Clears the display. Returns once every earlier message has been applied.
    pub async fn reset(&self) -> VisionResult<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(DisplayMessage::Reset(ack))
            .await
            .map_err(|_| VisionError::Disconnected)?;
        done.await.map_err(|_| VisionError::Disconnected)
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(DisplayMessage::Shutdown).await;
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplaySnapshot> {
        self.view.clone()
    }

    pub fn labels(&self) -> DisplayLabels {
        self.view.borrow().labels()
    }
}
