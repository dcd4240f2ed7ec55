// THEORY:
// The `pipeline` module turns one input frame into the four views the viewer shows.
// It is the boundary where transform errors stop: a failed frame is logged and
// dropped, and the caller simply keeps whatever it was displaying before.
//
// Key architectural principles:
// 1.  **Clone on entry**: the input frame is copied before any work starts. A capture
//     source is free to overwrite its own buffer the moment delivery returns; nothing
//     in a `FrameResult` points back into it.
// 2.  **Fan-out after grayscale**: threshold and edge detection both consume the
//     grayscale view and nothing else, so they run side by side on the pipeline's own
//     rayon pool.
// 3.  **Whole results only**: a `FrameResult` always carries all four buffers. "No
//     image" is expressed as the absence of a result, never as a half-filled one.
// 4.  **Timing**: `elapsed` covers the three transforms only, not the entry copy and not
//     presentation.

use crate::core_modules::edges::edges;
use crate::core_modules::grayscale::grayscale;
use crate::core_modules::pixel_buffer::pixel_buffer::PixelBuffer;
use crate::core_modules::threshold::threshold;
use crate::error::{VisionError, VisionResult};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for the FramePipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Threads in the pool that runs the row-parallel transforms.
    pub worker_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

/// One of the four buffers carried by a `FrameResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Original,
    Grayscale,
    BlackAndWhite,
    Edges,
}

impl View {
    pub const ALL: [View; 4] = [
        View::Original,
        View::Grayscale,
        View::BlackAndWhite,
        View::Edges,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            View::Original => "original",
            View::Grayscale => "grayscale",
            View::BlackAndWhite => "black_and_white",
            View::Edges => "edges",
        }
    }
}

/// The four views derived from one frame, plus how long deriving them took.
#[derive(Debug)]
pub struct FrameResult {
    sequence: u64,
    original: PixelBuffer,
    grayscale: PixelBuffer,
    black_and_white: PixelBuffer,
    edges: PixelBuffer,
    elapsed: Duration,
}

impl FrameResult {
    /// Arrival number of the frame this result was derived from.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn original(&self) -> &PixelBuffer {
        &self.original
    }

    pub fn grayscale(&self) -> &PixelBuffer {
        &self.grayscale
    }

    pub fn black_and_white(&self) -> &PixelBuffer {
        &self.black_and_white
    }

    pub fn edges(&self) -> &PixelBuffer {
        &self.edges
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn view(&self, view: View) -> &PixelBuffer {
        match view {
            View::Original => &self.original,
            View::Grayscale => &self.grayscale,
            View::BlackAndWhite => &self.black_and_white,
            View::Edges => &self.edges,
        }
    }

    /// Transform latency as whole milliseconds, e.g. `"12 ms"`.
    pub fn elapsed_label(&self) -> String {
        format!("{} ms", self.elapsed.as_millis())
    }

    /// Dimensions of one view, e.g. `"640x480 px"`.
    pub fn resolution_label(&self, view: View) -> String {
        let buffer = self.view(view);
        format!("{}x{} px", buffer.width(), buffer.height())
    }
}

/// Grayscale, black-and-white and edge views, in that order.
pub(crate) type DerivedViews = (PixelBuffer, PixelBuffer, PixelBuffer);

type DeriveFn = fn(&PixelBuffer) -> VisionResult<DerivedViews>;

/// Grayscale first, then threshold and edges side by side.
pub(crate) fn derive_views(original: &PixelBuffer) -> VisionResult<DerivedViews> {
    let gray = grayscale(original)?;
    let (bw, edge_map) = rayon::join(|| threshold(&gray), || edges(&gray));
    Ok((gray, bw?, edge_map?))
}

/// Runs grayscale, threshold and edge detection over single frames.
#[derive(Clone)]
pub struct FramePipeline {
    pool: Arc<rayon::ThreadPool>,
    next_sequence: Arc<AtomicU64>,
    derive: DeriveFn,
}

impl FramePipeline {
    pub fn new(config: PipelineConfig) -> VisionResult<Self> {
        if config.worker_threads == 0 {
            return Err(VisionError::TransformFailure(
                "pipeline needs at least one worker thread".into(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("quad-vision-{i}"))
            .build()
            .map_err(|e| VisionError::TransformFailure(e.to_string()))?;
        debug!(worker_threads = config.worker_threads, "frame pipeline ready");
        Ok(Self {
            pool: Arc::new(pool),
            next_sequence: Arc::new(AtomicU64::new(0)),
            derive: derive_views,
        })
    }

    /// Swaps the transforms for `derive`, so tests can make runs fail on cue.
    #[cfg(test)]
    pub(crate) fn with_derive(mut self, derive: DeriveFn) -> Self {
        self.derive = derive;
        self
    }

    /// Hands out arrival numbers. Shared by every clone of this pipeline.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Processes a frame if there is one. A missing frame or a failed frame yields `None`;
    /// failures are logged and the caller keeps its previous state.
    pub fn process(&self, frame: Option<&PixelBuffer>) -> Option<FrameResult> {
        let Some(frame) = frame else {
            debug!("no frame delivered, pipeline not run");
            return None;
        };
        let sequence = self.next_sequence();
        match self.process_frame(sequence, frame) {
            Ok(result) => Some(result),
            Err(err) => {
                warn!(sequence, error = %err, "frame dropped");
                None
            }
        }
    }

    /// Derives all four views from `frame`. Panics inside the transforms are reported as
    /// `TransformFailure`; no partially written buffer escapes.
    pub fn process_frame(&self, sequence: u64, frame: &PixelBuffer) -> VisionResult<FrameResult> {
        let original = frame.clone();

        let started = Instant::now();
        let derive = self.derive;
        let derived = catch_unwind(AssertUnwindSafe(|| self.pool.install(|| derive(&original))))
            .map_err(|panic| VisionError::TransformFailure(panic_message(panic.as_ref())))?;
        let (grayscale, black_and_white, edges) = derived?;
        let elapsed = started.elapsed();

        debug!(
            sequence,
            width = original.width(),
            height = original.height(),
            elapsed_ms = elapsed.as_millis() as u64,
            "frame processed"
        );

        Ok(FrameResult {
            sequence,
            original,
            grayscale,
            black_and_white,
            edges,
            elapsed,
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "transform panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel_buffer::pixel_buffer::Bgrx;

    fn pipeline() -> FramePipeline {
        FramePipeline::new(PipelineConfig { worker_threads: 2 }).expect("pipeline")
    }

    fn scene(width: u32, height: u32) -> PixelBuffer {
        let mut frame = PixelBuffer::new(width, height).expect("allocate");
        frame.fill(Bgrx::from_rgb(210, 200, 190));
        for y in height / 4..height / 2 {
            for x in width / 4..width / 2 {
                frame.set_pixel(x, y, Bgrx::from_rgb(10, 30, 20)).expect("in range");
            }
        }
        frame
    }

    #[test]
    fn missing_frame_produces_no_result() {
        assert!(pipeline().process(None).is_none());
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(FramePipeline::new(PipelineConfig { worker_threads: 0 }).is_err());
    }

    #[test]
    fn all_views_share_the_original_dimensions() {
        let frame = scene(31, 17);
        let result = pipeline().process(Some(&frame)).expect("result");
        for view in View::ALL {
            assert_eq!(result.resolution_label(view), "31x17 px");
        }
        assert_eq!(result.original(), &frame);
    }

    #[test]
    fn views_are_derived_from_grayscale() {
        let frame = scene(24, 24);
        let result = pipeline().process(Some(&frame)).expect("result");
        assert_eq!(result.grayscale(), &grayscale(&frame).expect("grayscale"));
        assert_eq!(result.black_and_white(), &threshold(result.grayscale()).expect("threshold"));
        assert_eq!(result.edges(), &edges(result.grayscale()).expect("edges"));
    }

    #[test]
    fn result_does_not_alias_the_source() {
        let mut frame = scene(16, 16);
        let result = pipeline().process(Some(&frame)).expect("result");
        let snapshot = result.original().clone();
        frame.fill(Bgrx::gray(0));
        assert_eq!(result.original(), &snapshot);
        assert_ne!(result.original(), &frame);
    }

    #[test]
    fn sequences_increase_across_clones() {
        let a = pipeline();
        let b = a.clone();
        let frame = scene(8, 8);
        let first = a.process(Some(&frame)).expect("result");
        let second = b.process(Some(&frame)).expect("result");
        assert!(second.sequence() > first.sequence());
    }

    fn fails_on_narrow_frames(frame: &PixelBuffer) -> VisionResult<DerivedViews> {
        if frame.width() < 8 {
            return Err(VisionError::TransformFailure("frame too narrow".into()));
        }
        derive_views(frame)
    }

    fn panics_on_narrow_frames(frame: &PixelBuffer) -> VisionResult<DerivedViews> {
        if frame.width() < 8 {
            panic!("narrow frame");
        }
        derive_views(frame)
    }

    #[test]
    fn failed_frame_is_dropped_and_the_next_one_processed() {
        let pipeline = pipeline().with_derive(fails_on_narrow_frames);
        assert!(pipeline.process(Some(&scene(4, 4))).is_none());
        let result = pipeline.process(Some(&scene(12, 6))).expect("result");
        assert_eq!(result.resolution_label(View::Edges), "12x6 px");
    }

    #[test]
    fn panicking_transform_is_a_transform_failure() {
        let pipeline = pipeline().with_derive(panics_on_narrow_frames);
        assert_eq!(
            pipeline.process_frame(0, &scene(4, 4)).map(|r| r.sequence()),
            Err(VisionError::TransformFailure("narrow frame".into()))
        );
        assert!(pipeline.process(Some(&scene(4, 4))).is_none());
        assert!(pipeline.process(Some(&scene(16, 16))).is_some());
    }

    #[test]
    fn elapsed_label_is_whole_milliseconds() {
        let result = FrameResult {
            sequence: 0,
            original: scene(4, 4),
            grayscale: scene(4, 4),
            black_and_white: scene(4, 4),
            edges: scene(4, 4),
            elapsed: Duration::from_micros(12_900),
        };
        assert_eq!(result.elapsed_label(), "12 ms");
    }
}
