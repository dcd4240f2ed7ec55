// THEORY:
// A `LiveSession` connects a frame stream to the pipeline and the display. Frames
// arrive with no pacing and no backpressure, so a new frame can show up while the
// previous one is still being processed. What happens then is the session's
// `ConcurrencyPolicy`:
//
// - `AtMostOneInFlight`: the new frame is dropped. Memory stays bounded and results
//   reach the display in arrival order.
// - `UnboundedOverlap`: every frame gets its own run. Runs finish in any order and are
//   displayed in completion order, so an older frame can replace a newer one on screen.
//   The presenter counts those as `out_of_order`.
//
// Key architectural principles:
// 1.  **One driver task**: a single task reads the source, starts runs, collects
//     finished runs and forwards results to the presenter. Handoffs therefore never
//     interleave, whatever the policy.
// 2.  **Runs off the async threads**: each run is a blocking task in a `JoinSet`; the
//     transforms themselves fan out on the pipeline's rayon pool. A failing or
//     panicking run costs only its own frame; the display keeps what it showed.
// 3.  **Terminal stop**: `stop` halts delivery, lets in-flight runs finish and throws
//     their results away, then clears the display. Only after the driver has drained
//     is the reset queued, so no stale result can land after it.

use crate::core_modules::pixel_buffer::pixel_buffer::PixelBuffer;
use crate::display::PresenterHandle;
use crate::error::{VisionError, VisionResult};
use crate::pipeline::{FramePipeline, FrameResult};
use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// What to do with a frame that arrives while a run is still executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyPolicy {
    /// Drop the new frame.
    #[default]
    AtMostOneInFlight,
    /// Start another run; display results as they complete.
    UnboundedOverlap,
}

#[derive(Debug, Clone, Default)]
pub struct LiveConfig {
    pub policy: ConcurrencyPolicy,
}

/// Per-session frame accounting. Every delivered frame ends up in exactly one of
/// `published`, `dropped_busy`, `failed`, `discarded` or `unpresented`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub delivered: u64,
    /// Runs that produced a result.
    pub processed: u64,
    pub published: u64,
    /// Frames skipped because a run was already executing.
    pub dropped_busy: u64,
    /// Runs that returned an error or panicked.
    pub failed: u64,
    /// Results thrown away because the session was stopping.
    pub discarded: u64,
    /// Results the presenter refused because it had shut down.
    pub unpresented: u64,
}

type RunOutcome = Result<VisionResult<FrameResult>, JoinError>;

struct SessionDriver {
    pipeline: FramePipeline,
    presenter: PresenterHandle,
    policy: ConcurrencyPolicy,
    in_flight: JoinSet<VisionResult<FrameResult>>,
    summary: SessionSummary,
}

impl SessionDriver {
    async fn run<S>(mut self, source: S, mut stop: watch::Receiver<bool>) -> SessionSummary
    where
        S: Stream<Item = PixelBuffer> + Send + 'static,
    {
        let mut source = std::pin::pin!(source);
        let mut source_done = false;

        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                Some(outcome) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if !self.complete(outcome).await {
                        warn!("display is gone, ending live session");
                        break;
                    }
                }
                next = source.next(), if !source_done => match next {
                    Some(frame) => self.admit(frame),
                    None => {
                        debug!("frame source ended");
                        source_done = true;
                    }
                },
            }
            if source_done && self.in_flight.is_empty() {
                return self.summary;
            }
        }

        self.abandon().await;
        self.summary
    }

    fn admit(&mut self, frame: PixelBuffer) {
        self.summary.delivered += 1;
        let sequence = self.pipeline.next_sequence();
        if self.policy == ConcurrencyPolicy::AtMostOneInFlight && !self.in_flight.is_empty() {
            self.summary.dropped_busy += 1;
            debug!(sequence, "frame dropped, previous run still executing");
            return;
        }
        let pipeline = self.pipeline.clone();
        self.in_flight
            .spawn_blocking(move || pipeline.process_frame(sequence, &frame));
    }

    /// Forwards a finished run to the display. Returns false once the display is gone.
    async fn complete(&mut self, outcome: RunOutcome) -> bool {
        match outcome {
            Ok(Ok(result)) => {
                self.summary.processed += 1;
                match self.presenter.present(result).await {
                    Ok(()) => {
                        self.summary.published += 1;
                        true
                    }
                    Err(_) => {
                        self.summary.unpresented += 1;
                        false
                    }
                }
            }
            Ok(Err(err)) => {
                self.summary.failed += 1;
                if err.is_frame_local() {
                    warn!(error = %err, "frame dropped");
                } else {
                    error!(error = %err, "frame dropped");
                }
                true
            }
            Err(join_err) => {
                self.summary.failed += 1;
                error!(error = %join_err, "pipeline run aborted");
                true
            }
        }
    }

    /// Waits out every in-flight run without displaying its result.
    async fn abandon(&mut self) {
        while let Some(outcome) = self.in_flight.join_next().await {
            match outcome {
                Ok(Ok(_)) => {
                    self.summary.processed += 1;
                    self.summary.discarded += 1;
                }
                Ok(Err(_)) | Err(_) => self.summary.failed += 1,
            }
        }
    }
}

/// A running live stream: frames in, displayed results out.
pub struct LiveSession {
    stop_tx: watch::Sender<bool>,
    driver: JoinHandle<SessionSummary>,
    presenter: PresenterHandle,
}

impl LiveSession {
    /// Starts consuming `source` on the current tokio runtime.
    pub fn start<S>(
        source: S,
        pipeline: FramePipeline,
        presenter: PresenterHandle,
        config: LiveConfig,
    ) -> Self
    where
        S: Stream<Item = PixelBuffer> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let driver = SessionDriver {
            pipeline,
            presenter: presenter.clone(),
            policy: config.policy,
            in_flight: JoinSet::new(),
            summary: SessionSummary::default(),
        };
        info!(policy = ?config.policy, "live session started");
        let driver = tokio::spawn(driver.run(source, stop_rx));
        Self {
            stop_tx,
            driver,
            presenter,
        }
    }

    /// True once the source has ended and every finished run has been handed to the
    /// presenter. The presenter may still be applying the last handoffs.
    pub fn is_finished(&self) -> bool {
        self.driver.is_finished()
    }

    /// Stops the session and clears the display. This is a reset, not a pause.
    pub async fn stop(self) -> VisionResult<SessionSummary> {
        let _ = self.stop_tx.send(true);
        let summary = self
            .driver
            .await
            .map_err(|e| VisionError::TransformFailure(format!("live session driver failed: {e}")))?;
        self.presenter.reset().await?;
        info!(
            delivered = summary.delivered,
            published = summary.published,
            dropped_busy = summary.dropped_busy,
            failed = summary.failed,
            discarded = summary.discarded,
            "live session stopped"
        );
        Ok(summary)
    }
}
