// THEORY:
// A live source is anything that yields `PixelBuffer`s one at a time with no pacing
// guarantee: a `futures::Stream`. Device enumeration and capture lifecycles belong to
// the caller; this module only provides the two adapters the engine needs.
//
// - `frame_channel`: a sender a capture callback can push into from any thread, and the
//   stream end a `LiveSession` consumes. Delivery never blocks the callback.
// - `synthetic_frames`: a paced test pattern (a bright square sweeping across a dark
//   gradient) for demos and tests when no camera is present.

use crate::core_modules::pixel_buffer::pixel_buffer::{Bgrx, Byte, PixelBuffer};
use crate::error::{VisionError, VisionResult};
use futures::Stream;
use futures::stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::warn;

/// Creates a connected sender/stream pair for pushing captured frames into a session.
pub fn frame_channel() -> (FrameSender, FrameStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FrameSender { tx }, FrameStream { rx })
}

/// Capture-side end of a `frame_channel`.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<PixelBuffer>,
}

impl FrameSender {
    /// Hands an owned frame to the session.
    pub fn deliver(&self, frame: PixelBuffer) -> VisionResult<()> {
        self.tx
            .send(frame)
            .map_err(|_| VisionError::SourceUnavailable("live session is not running".into()))
    }

    /// Copies a frame out of memory the capture device owns and will reuse.
    pub fn deliver_bgrx(
        &self,
        width: u32,
        height: u32,
        stride: usize,
        bytes: &[Byte],
    ) -> VisionResult<()> {
        let frame = PixelBuffer::from_bgrx(width, height, stride, bytes.to_vec())?;
        self.deliver(frame)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Session-side end of a `frame_channel`. Ends when every `FrameSender` is dropped.
pub struct FrameStream {
    rx: mpsc::UnboundedReceiver<PixelBuffer>,
}

impl Stream for FrameStream {
    type Item = PixelBuffer;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<PixelBuffer>> {
        self.rx.poll_recv(cx)
    }
}

/// Shape and pacing of the synthetic test pattern.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Stop after this many frames; `None` runs until the session stops.
    pub frames: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 30,
            frames: None,
        }
    }
}

const BACKGROUND_BASE: u32 = 30;
const TARGET_LEVEL: Byte = 230;
const TARGET_STEP: u32 = 4;

/// Renders frame `index` of the test pattern.
pub fn render_synthetic(config: &SyntheticConfig, index: u64) -> VisionResult<PixelBuffer> {
    let mut frame = PixelBuffer::new(config.width, config.height)?;
    let side = (config.width.min(config.height) / 4).max(1);
    let travel = config.width.saturating_sub(side).max(1) as u64;
    let left = ((index * TARGET_STEP as u64) % travel) as u32;
    let top = (config.height - side.min(config.height)) / 2;

    for y in 0..config.height {
        let shade = (BACKGROUND_BASE + 40 * y / config.height) as Byte;
        for x in 0..config.width {
            let inside = x >= left && x < left + side && y >= top && y < top + side;
            let px = if inside {
                Bgrx::from_rgb(TARGET_LEVEL, TARGET_LEVEL - 20, TARGET_LEVEL - 40)
            } else {
                Bgrx::from_rgb(shade, shade + 5, shade + 10)
            };
            frame.set_pixel(x, y, px)?;
        }
    }
    Ok(frame)
}

/// Opens the synthetic source. Fails up front if the pattern cannot be produced.
pub fn synthetic_frames(
    config: SyntheticConfig,
) -> VisionResult<impl Stream<Item = PixelBuffer> + Send + 'static> {
    if config.width == 0 || config.height == 0 || config.fps == 0 {
        return Err(VisionError::SourceUnavailable(format!(
            "synthetic source cannot run at {}x{} @ {} fps",
            config.width, config.height, config.fps
        )));
    }
    let period = Duration::from_secs_f64(1.0 / config.fps as f64);

    Ok(stream::unfold(
        (0u64, None::<Interval>),
        move |(index, mut ticker)| {
            let config = config.clone();
            async move {
                if config.frames.is_some_and(|limit| index >= limit) {
                    return None;
                }
                let interval = ticker.get_or_insert_with(|| {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    interval
                });
                interval.tick().await;
                match render_synthetic(&config, index) {
                    Ok(frame) => Some((frame, (index + 1, ticker))),
                    Err(err) => {
                        warn!(error = %err, "synthetic source stopped");
                        None
                    }
                }
            }
        },
    ))
}
