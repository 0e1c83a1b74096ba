// THEORY:
// This file is the main entry point for the `trail_vision` library crate.
// It defines the public API exposed to external consumers (like the `trail_tester`
// driver).
//
// The primary export is the `TrailPipeline` and its associated data structures
// (`PipelineConfig`, `FrameReport`, etc.): one synchronous call that turns a
// grayscale frame into a mask, a set of filtered blobs, the current centroid trail
// and any log records written along the way. The individual stages live in
// `core_modules` and stay usable on their own for callers that want only part of
// the chain.

pub mod config;
pub mod control;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod source;

pub use config::TrailConfig;
pub use control::{ControlCommand, ControlOutcome};
pub use core_modules::blob::{Blob, BlobObservation};
pub use core_modules::event_logger::{AppendFile, EventLogger, LogRecord, SessionState, SharedBuffer, SinkFactory};
pub use core_modules::filters::Polarity;
pub use core_modules::frame::{Frame, Mask};
pub use core_modules::params::{Parameters, SharedParameters};
pub use core_modules::preprocessor::SegmentationMode;
pub use core_modules::render::RenderOutputs;
pub use error::{Result, TrailError};
pub use pipeline::{FrameReport, PipelineConfig, TrailPipeline};
pub use source::{FrameSource, ImageSequenceSource, MemorySource};
