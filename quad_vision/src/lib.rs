// THEORY:
// This file is the entry point for the `quad_vision` library crate. It exposes the
// engine that turns one image into four views (original, grayscale, black/white,
// edges) and keeps a display of those views current, for a single still image or a
// live stream of frames.
//
// Layering, bottom up:
// - `core_modules`: the `PixelBuffer` container and the three transforms, plus the
//   still-image file boundary.
// - `pipeline`: one frame in, one `FrameResult` out, timed.
// - `display`: the single displayed `FrameResult` and its swap-and-release handoff.
// - `source` / `live_pipeline`: frame streams and the session that schedules pipeline
//   runs against them.

pub mod core_modules;
pub mod display;
pub mod error;
pub mod live_pipeline;
pub mod pipeline;
pub mod source;

pub use core_modules::pixel_buffer::pixel_buffer::{Bgrx, PixelBuffer};
pub use core_modules::utils::image_helper::image_helper;
pub use display::{DisplayLabels, DisplaySlot, DisplaySnapshot, DisplayStats, Presenter, PresenterHandle};
pub use error::{VisionError, VisionResult};
pub use live_pipeline::{ConcurrencyPolicy, LiveConfig, LiveSession, SessionSummary};
pub use pipeline::{FramePipeline, FrameResult, PipelineConfig, View};
pub use source::{FrameSender, FrameStream, SyntheticConfig, frame_channel, synthetic_frames};
